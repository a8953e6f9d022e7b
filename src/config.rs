//! Traversal configuration.
//!
//! Everything here is fixed for the duration of a traversal; drivers build a
//! config once and hand it to the iterators and adapters that need it.

use crate::error::{fatal, VisitError};
use crate::oop::{NarrowOop, Oop};

/// Parameters for decoding compressed (narrow) references.
///
/// A narrow reference stores `(address - base) >> shift`; zero is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedReferences {
    pub base: usize,
    pub shift: u32,
}

impl CompressedReferences {
    pub const fn new(base: usize, shift: u32) -> Self {
        Self { base, shift }
    }

    /// 解压窄引用；结果超出地址空间时终止遍历
    pub fn decode(&self, narrow: NarrowOop) -> Oop {
        self.try_decode(narrow).unwrap_or_else(|err| fatal(err))
    }

    /// 压缩一个引用；引用不在 `base` 之上的压缩范围内时终止遍历
    pub fn encode(&self, oop: Oop) -> NarrowOop {
        self.try_encode(oop).unwrap_or_else(|err| fatal(err))
    }

    pub fn try_decode(&self, narrow: NarrowOop) -> Result<Oop, VisitError> {
        if narrow.is_null() {
            return Ok(Oop::NULL);
        }
        (narrow.raw() as usize)
            .checked_shl(self.shift)
            .filter(|offset| offset >> self.shift == narrow.raw() as usize)
            .and_then(|offset| self.base.checked_add(offset))
            .map(Oop::from_raw)
            .ok_or(VisitError::EncodedOutOfRange {
                raw: narrow.raw() as u64,
                base: self.base,
            })
    }

    pub fn try_encode(&self, oop: Oop) -> Result<NarrowOop, VisitError> {
        if oop.is_null() {
            return Ok(NarrowOop::NULL);
        }
        // 窄引用 0 表示空，所以 base 本身不可编码
        oop.raw()
            .checked_sub(self.base)
            .filter(|&offset| offset != 0)
            .and_then(|offset| u32::try_from(offset >> self.shift).ok())
            .map(NarrowOop::from_raw)
            .ok_or(VisitError::ReferenceOutOfRange {
                address: oop.raw(),
                base: self.base,
            })
    }
}

impl Default for CompressedReferences {
    /// Zero-based compression with 8-byte object alignment.
    fn default() -> Self {
        Self::new(0, 3)
    }
}

#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Master switch for post-visit reference verification.
    ///
    /// Only consulted when built with debug assertions; release builds never
    /// verify.
    ///
    /// Default: true
    pub verify_references: bool,

    /// How narrow slots are decoded when a driver needs the full address.
    pub compressed: CompressedReferences,

    /// Initial capacity of a deduplicating code visitor's marker set.
    ///
    /// Default: 64
    pub code_marks_capacity: usize,
}

#[allow(dead_code)]
impl TraversalConfig {
    /// 创建默认配置：开启校验，零基址、3 位移位的压缩引用
    pub fn new() -> Self {
        Self {
            verify_references: true,
            compressed: CompressedReferences::default(),
            code_marks_capacity: 64,
        }
    }

    /// 创建配置，指定压缩引用的基址和移位
    pub fn new_with_compressed(compressed: CompressedReferences) -> Self {
        Self {
            compressed,
            ..Self::new()
        }
    }

    /// 创建配置，关闭遍历后的引用校验
    /// 适用于遍历中途会留下暂时非法引用的访问者
    pub fn new_without_verification() -> Self {
        Self {
            verify_references: false,
            ..Self::new()
        }
    }

    /// Whether this build and this config both ask for verification.
    pub fn verifies(&self) -> bool {
        cfg!(debug_assertions) && self.verify_references
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self::new()
    }
}

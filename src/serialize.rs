//! Bidirectional serialization of runtime state.
//!
//! A persistence routine is written once against [`SerializeVisitor`] and run
//! with a [`WriteStream`] to dump, or a [`ReadStream`] to restore. Both
//! directions then walk exactly the same sequence of fields.
//!
//! Streams are little-endian. Pointers and references take 8 bytes, `u32`
//! values and tags 4, regions their own length with no prefix.

use tracing::debug;

use crate::error::{fatal, VisitError};
use crate::oop::{Address, Oop};
use crate::visitor::Visitor;

pub trait SerializeVisitor: Visitor {
    fn is_reading(&self) -> bool;

    fn is_writing(&self) -> bool {
        !self.is_reading()
    }

    /// Reads or writes a raw address-sized value.
    fn visit_ptr(&mut self, slot: &mut *mut ());

    fn visit_u32(&mut self, slot: &mut u32);

    /// Reads or writes `region.len()` bytes verbatim.
    fn visit_region(&mut self, region: &mut [u8]);

    /// Writes `tag`, or reads a tag and fails if it is not `tag`.
    ///
    /// Tags mark section boundaries, so a reader that drifted out of step
    /// with the writer stops at the next one.
    fn visit_tag(&mut self, tag: i32);

    /// Reads or writes one reference, translated between its persisted and
    /// in-memory forms.
    fn visit_reference(&mut self, slot: &mut Oop);
}

/// Translates references between memory and the persisted stream.
///
/// A reference the codec cannot represent is an error, never a silently
/// different value; the streams turn it into a fatal stop.
pub trait ReferenceCodec {
    fn to_persisted(&self, oop: Oop) -> Result<u64, VisitError>;
    fn from_persisted(&self, raw: u64) -> Result<Oop, VisitError>;
}

/// Persists references as their raw address.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl ReferenceCodec for IdentityCodec {
    fn to_persisted(&self, oop: Oop) -> Result<u64, VisitError> {
        Ok(oop.raw() as u64)
    }

    fn from_persisted(&self, raw: u64) -> Result<Oop, VisitError> {
        usize::try_from(raw)
            .map(Oop::from_raw)
            .map_err(|_| VisitError::EncodedOutOfRange { raw, base: 0 })
    }
}

/// Persists references as offsets from a base address, so a snapshot dumped
/// at one base can be restored at another.
///
/// Null persists as zero and a reference at `base + n` as `n + 1`, so the
/// base itself is representable. References below the base are not.
#[derive(Debug, Clone, Copy)]
pub struct BaseRelativeCodec {
    base: Address,
}

impl BaseRelativeCodec {
    pub fn new(base: Address) -> Self {
        Self { base }
    }

    pub fn base(&self) -> Address {
        self.base
    }
}

impl ReferenceCodec for BaseRelativeCodec {
    fn to_persisted(&self, oop: Oop) -> Result<u64, VisitError> {
        if oop.is_null() {
            return Ok(0);
        }
        let base = self.base.raw();
        oop.raw()
            .checked_sub(base)
            .and_then(|offset| (offset as u64).checked_add(1))
            .ok_or(VisitError::ReferenceOutOfRange {
                address: oop.raw(),
                base,
            })
    }

    fn from_persisted(&self, raw: u64) -> Result<Oop, VisitError> {
        if raw == 0 {
            return Ok(Oop::NULL);
        }
        let base = self.base.raw();
        usize::try_from(raw - 1)
            .ok()
            .and_then(|offset| base.checked_add(offset))
            .map(Oop::from_raw)
            .ok_or(VisitError::EncodedOutOfRange { raw, base })
    }
}

/// Writes into an in-memory buffer.
pub struct WriteStream<C = IdentityCodec>
where
    C: ReferenceCodec,
{
    buf: Vec<u8>,
    codec: C,
}

impl WriteStream {
    pub fn new() -> Self {
        Self::new_with_codec(IdentityCodec)
    }
}

impl Default for WriteStream {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl<C> WriteStream<C>
where
    C: ReferenceCodec,
{
    pub fn new_with_codec(codec: C) -> Self {
        Self {
            buf: Vec::new(),
            codec,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        debug!(bytes = self.buf.len(), "serialization stream finished");
        self.buf
    }
}

impl<C> Visitor for WriteStream<C> where C: ReferenceCodec {}

impl<C> SerializeVisitor for WriteStream<C>
where
    C: ReferenceCodec,
{
    fn is_reading(&self) -> bool {
        false
    }

    fn visit_ptr(&mut self, slot: &mut *mut ()) {
        self.buf.extend_from_slice(&(*slot as usize as u64).to_le_bytes());
    }

    fn visit_u32(&mut self, slot: &mut u32) {
        self.buf.extend_from_slice(&slot.to_le_bytes());
    }

    fn visit_region(&mut self, region: &mut [u8]) {
        self.buf.extend_from_slice(region);
    }

    fn visit_tag(&mut self, tag: i32) {
        self.buf.extend_from_slice(&tag.to_le_bytes());
    }

    fn visit_reference(&mut self, slot: &mut Oop) {
        let raw = self.codec.to_persisted(*slot).unwrap_or_else(|err| fatal(err));
        self.buf.extend_from_slice(&raw.to_le_bytes());
    }
}

/// Reads from a borrowed byte buffer.
///
/// Truncation and tag mismatches are fatal: the stream is corrupt or was
/// written by a different layout, and nothing read after that can be trusted.
pub struct ReadStream<'a, C = IdentityCodec>
where
    C: ReferenceCodec,
{
    bytes: &'a [u8],
    pos: usize,
    codec: C,
}

impl<'a> ReadStream<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::new_with_codec(bytes, IdentityCodec)
    }
}

#[allow(dead_code)]
impl<'a, C> ReadStream<'a, C>
where
    C: ReferenceCodec,
{
    pub fn new_with_codec(bytes: &'a [u8], codec: C) -> Self {
        debug!(bytes = bytes.len(), "deserialization stream opened");
        Self {
            bytes,
            pos: 0,
            codec,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// 读取一个标签并比较，不匹配时返回错误而不终止
    pub fn check_tag(&mut self, expected: i32) -> Result<(), VisitError> {
        let found = self.read_i32()?;
        if found != expected {
            return Err(VisitError::TagMismatch { expected, found });
        }
        Ok(())
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], VisitError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(VisitError::UnexpectedEnd { needed, remaining });
        }
        let start = self.pos;
        self.pos += needed;
        Ok(&self.bytes[start..self.pos])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], VisitError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u64(&mut self) -> Result<u64, VisitError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_u32(&mut self) -> Result<u32, VisitError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, VisitError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }
}

impl<C> Visitor for ReadStream<'_, C> where C: ReferenceCodec {}

impl<C> SerializeVisitor for ReadStream<'_, C>
where
    C: ReferenceCodec,
{
    fn is_reading(&self) -> bool {
        true
    }

    fn visit_ptr(&mut self, slot: &mut *mut ()) {
        let raw = self.read_u64().unwrap_or_else(|err| fatal(err));
        *slot = raw as usize as *mut ();
    }

    fn visit_u32(&mut self, slot: &mut u32) {
        *slot = self.read_u32().unwrap_or_else(|err| fatal(err));
    }

    fn visit_region(&mut self, region: &mut [u8]) {
        let bytes = self.take(region.len()).unwrap_or_else(|err| fatal(err));
        region.copy_from_slice(bytes);
    }

    fn visit_tag(&mut self, tag: i32) {
        if let Err(err) = self.check_tag(tag) {
            fatal(err);
        }
    }

    fn visit_reference(&mut self, slot: &mut Oop) {
        let oop = self
            .read_u64()
            .and_then(|raw| self.codec.from_persisted(raw))
            .unwrap_or_else(|err| fatal(err));
        *slot = oop;
    }
}

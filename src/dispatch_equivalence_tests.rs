use std::cell::{Cell, RefCell};
use std::mem::{align_of, size_of};

use quickcheck::{QuickCheck, TestResult};

use crate::config::TraversalConfig;
use crate::dispatch::{Dispatch, Dynamic, Static};
use crate::iterate::FieldIterator;
use crate::metadata::{ClassLoaderData, MetadataAware, TypeMetadata};
use crate::object::{HeapObject, ObjectLayout, ReferenceFields};
use crate::oop::{FieldSlots, NarrowOop, Oop, SlotMut};
use crate::trace::{ReferenceDiscoverer, ReferenceIterationMode, ReferenceType, TracingVisitor};
use crate::visitor::{ReferenceVisitor, Visitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Full(usize),
    Narrow(u32),
}

struct Loader {
    claimed: Cell<bool>,
    handles: RefCell<Vec<Oop>>,
}

impl ClassLoaderData for Loader {
    fn try_claim(&self) -> bool {
        !self.claimed.replace(true)
    }

    fn references_do(&self, visitor: &mut dyn ReferenceVisitor) {
        for slot in self.handles.borrow_mut().iter_mut() {
            visitor.visit_oop(slot);
        }
    }
}

struct Klass<'l> {
    loader: &'l Loader,
}

impl TypeMetadata for Klass<'_> {
    fn class_loader_data(&self) -> &dyn ClassLoaderData {
        self.loader
    }
}

struct Discoverer {
    accept: bool,
}

impl ReferenceDiscoverer for Discoverer {
    fn discover_reference(&self, _obj: Oop, _kind: ReferenceType) -> bool {
        self.accept
    }
}

struct Object<'l> {
    addr: Oop,
    fields: Vec<Oop>,
    narrow: Vec<NarrowOop>,
    compressed: bool,
    kind: Option<ReferenceType>,
    referent: Oop,
    discovered: Oop,
    klass: Klass<'l>,
    mirrored: Option<Klass<'l>>,
    class_loader: Option<&'l Loader>,
}

impl HeapObject for Object<'_> {
    fn address(&self) -> Oop {
        self.addr
    }

    fn size_in_bytes(&self) -> usize {
        16 + self.fields.len() * 8 + self.narrow.len() * 4
    }

    fn layout(&mut self) -> ObjectLayout<'_> {
        let Self {
            fields,
            narrow,
            compressed,
            kind,
            referent,
            discovered,
            klass,
            mirrored,
            class_loader,
            ..
        } = self;
        ObjectLayout {
            metadata: Some(&*klass as &dyn TypeMetadata),
            mirrored: mirrored.as_ref().map(|k| k as &dyn TypeMetadata),
            class_loader: class_loader.map(|l| l as &dyn ClassLoaderData),
            fields: if *compressed {
                FieldSlots::Narrow(narrow.as_mut_slice())
            } else {
                FieldSlots::Full(fields.as_mut_slice())
            },
            reference: kind.map(move |kind| ReferenceFields {
                kind,
                referent: SlotMut::Full(referent),
                discovered: SlotMut::Full(discovered),
            }),
        }
    }
}

// 记录访问顺序，同时移动非空引用
struct Tracer<'d> {
    log: Vec<Event>,
    mode: ReferenceIterationMode,
    discoverer: Option<&'d dyn ReferenceDiscoverer>,
    idempotent: bool,
}

impl Visitor for Tracer<'_> {}

impl ReferenceVisitor for Tracer<'_> {
    fn visit_oop(&mut self, slot: &mut Oop) {
        self.log.push(Event::Full(slot.raw()));
        if !slot.is_null() {
            *slot = Oop::from_raw(slot.raw() + 0x10);
        }
    }

    fn visit_narrow_oop(&mut self, slot: &mut NarrowOop) {
        self.log.push(Event::Narrow(slot.raw()));
        if !slot.is_null() {
            *slot = NarrowOop::from_raw(slot.raw().wrapping_add(1));
        }
    }
}

impl TracingVisitor for Tracer<'_> {
    fn reference_discoverer(&self) -> Option<&dyn ReferenceDiscoverer> {
        self.discoverer
    }

    fn iteration_mode(&self) -> ReferenceIterationMode {
        self.mode
    }

    fn is_idempotent(&self) -> bool {
        self.idempotent
    }
}

#[derive(Debug, Clone)]
struct Case {
    fields: Vec<usize>,
    narrow: Vec<u32>,
    compressed: bool,
    kind: Option<ReferenceType>,
    referent: usize,
    discovered: usize,
    mode: ReferenceIterationMode,
    discoverer: Option<bool>,
    idempotent: bool,
    metadata_aware: bool,
    handles: Vec<usize>,
    // 镜像对象和类加载器对象共用第二个 loader
    mirror: bool,
    loader_object: bool,
    other_handles: Vec<usize>,
}

#[derive(Debug, PartialEq)]
struct Outcome {
    log: Vec<Event>,
    fields: Vec<Oop>,
    narrow: Vec<NarrowOop>,
    referent: Oop,
    discovered: Oop,
    handles: Vec<Oop>,
    other_handles: Vec<Oop>,
    visits_metadata: bool,
    is_idempotent: bool,
}

fn loader(handles: &[usize]) -> Loader {
    Loader {
        claimed: Cell::new(false),
        handles: RefCell::new(handles.iter().map(|&r| Oop::from_raw(r)).collect()),
    }
}

fn run<D: Dispatch>(case: &Case) -> Outcome {
    let loader = loader(&case.handles);
    let other = self::loader(&case.other_handles);
    let mut object = Object {
        addr: Oop::from_raw(0x8000),
        fields: case.fields.iter().map(|&r| Oop::from_raw(r)).collect(),
        narrow: case.narrow.iter().map(|&r| NarrowOop::from_raw(r)).collect(),
        compressed: case.compressed,
        kind: case.kind,
        referent: Oop::from_raw(case.referent),
        discovered: Oop::from_raw(case.discovered),
        klass: Klass { loader: &loader },
        mirrored: case.mirror.then(|| Klass { loader: &other }),
        class_loader: case.loader_object.then_some(&other),
    };
    let discoverer = case.discoverer.map(|accept| Discoverer { accept });
    let tracer = Tracer {
        log: Vec::new(),
        mode: case.mode,
        discoverer: discoverer.as_ref().map(|d| d as &dyn ReferenceDiscoverer),
        idempotent: case.idempotent,
    };

    // 属性测试里的地址是随机的，关掉格式校验
    let iterator = FieldIterator::<D>::new(TraversalConfig::new_without_verification());
    let (log, visits_metadata, is_idempotent) = if case.metadata_aware {
        let mut visitor = MetadataAware::new(tracer);
        iterator.iterate(&mut object, &mut visitor);
        let flags = (D::visits_metadata(&visitor), D::is_idempotent(&visitor));
        (visitor.into_inner().log, flags.0, flags.1)
    } else {
        let mut visitor = tracer;
        iterator.iterate(&mut object, &mut visitor);
        let flags = (D::visits_metadata(&visitor), D::is_idempotent(&visitor));
        (visitor.log, flags.0, flags.1)
    };

    let handles = loader.handles.borrow().clone();
    let other_handles = other.handles.borrow().clone();
    Outcome {
        log,
        fields: object.fields,
        narrow: object.narrow,
        referent: object.referent,
        discovered: object.discovered,
        handles,
        other_handles,
        visits_metadata,
        is_idempotent,
    }
}

fn reference_kind(selector: u8) -> Option<ReferenceType> {
    match selector % 5 {
        0 => None,
        1 => Some(ReferenceType::Soft),
        2 => Some(ReferenceType::Weak),
        3 => Some(ReferenceType::Final),
        _ => Some(ReferenceType::Phantom),
    }
}

fn iteration_mode(selector: u8) -> ReferenceIterationMode {
    match selector % 3 {
        0 => ReferenceIterationMode::DiscoverOnly,
        1 => ReferenceIterationMode::DiscoveredAndDiscovery,
        _ => ReferenceIterationMode::Fields,
    }
}

fn discoverer(selector: u8) -> Option<bool> {
    match selector % 3 {
        0 => None,
        1 => Some(true),
        _ => Some(false),
    }
}

#[test]
fn test_static_and_dynamic_traversals_agree() {
    fn prop(
        slots: (Vec<usize>, Vec<u32>, bool),
        reference: (u8, usize, usize),
        traits: (u8, u8, bool, bool),
        handles: Vec<usize>,
        shape: (bool, bool, Vec<usize>),
    ) -> TestResult {
        let (fields, narrow, compressed) = slots;
        let (kind, referent, discovered) = reference;
        let (mode, disc, idempotent, metadata_aware) = traits;
        let (mirror, loader_object, other_handles) = shape;
        // 避免加 0x10 时溢出
        if fields
            .iter()
            .chain(handles.iter())
            .chain(other_handles.iter())
            .chain([referent, discovered].iter())
            .any(|&r| r > usize::MAX - 0x10)
        {
            return TestResult::discard();
        }
        let case = Case {
            fields,
            narrow,
            compressed,
            kind: reference_kind(kind),
            referent,
            discovered,
            mode: iteration_mode(mode),
            discoverer: discoverer(disc),
            idempotent,
            metadata_aware,
            handles,
            mirror,
            loader_object,
            other_handles,
        };
        TestResult::from_bool(run::<Static>(&case) == run::<Dynamic>(&case))
    }
    QuickCheck::new().quickcheck(
        prop as fn(
            (Vec<usize>, Vec<u32>, bool),
            (u8, usize, usize),
            (u8, u8, bool, bool),
            Vec<usize>,
            (bool, bool, Vec<usize>),
        ) -> TestResult,
    );
}

#[test]
fn test_metadata_aware_traversal_walks_loader_before_fields() {
    let case = Case {
        fields: vec![0x100, 0],
        narrow: Vec::new(),
        compressed: false,
        kind: None,
        referent: 0,
        discovered: 0,
        mode: ReferenceIterationMode::DiscoverOnly,
        discoverer: None,
        idempotent: false,
        metadata_aware: true,
        handles: vec![0x500],
        mirror: false,
        loader_object: false,
        other_handles: Vec::new(),
    };
    for outcome in [run::<Static>(&case), run::<Dynamic>(&case)] {
        assert!(outcome.visits_metadata);
        assert_eq!(
            outcome.log,
            vec![Event::Full(0x500), Event::Full(0x100), Event::Full(0)]
        );
        assert_eq!(outcome.handles, vec![Oop::from_raw(0x510)]);
        assert_eq!(outcome.fields, vec![Oop::from_raw(0x110), Oop::NULL]);
    }
}

#[test]
fn test_plain_visitor_never_touches_metadata() {
    let case = Case {
        fields: vec![0x100],
        narrow: Vec::new(),
        compressed: false,
        kind: None,
        referent: 0,
        discovered: 0,
        mode: ReferenceIterationMode::Fields,
        discoverer: None,
        idempotent: true,
        metadata_aware: false,
        handles: vec![0x500],
        mirror: false,
        loader_object: false,
        other_handles: Vec::new(),
    };
    for outcome in [run::<Static>(&case), run::<Dynamic>(&case)] {
        assert!(!outcome.visits_metadata);
        assert!(outcome.is_idempotent);
        assert_eq!(outcome.log, vec![Event::Full(0x100)]);
        assert_eq!(outcome.handles, vec![Oop::from_raw(0x500)]);
    }
}

#[test]
fn test_narrow_fields_stay_narrow_under_both_modes() {
    let case = Case {
        fields: vec![0x100],
        narrow: vec![3, 0, 7],
        compressed: true,
        kind: None,
        referent: 0,
        discovered: 0,
        mode: ReferenceIterationMode::Fields,
        discoverer: None,
        idempotent: false,
        metadata_aware: false,
        handles: Vec::new(),
        mirror: false,
        loader_object: false,
        other_handles: Vec::new(),
    };
    for outcome in [run::<Static>(&case), run::<Dynamic>(&case)] {
        assert_eq!(
            outcome.log,
            vec![Event::Narrow(3), Event::Narrow(0), Event::Narrow(7)]
        );
        assert_eq!(
            outcome.narrow,
            vec![NarrowOop::from_raw(4), NarrowOop::NULL, NarrowOop::from_raw(8)]
        );
        // 未压缩的字段不在布局里，不应被访问
        assert_eq!(outcome.fields, vec![Oop::from_raw(0x100)]);
    }
}

#[test]
fn test_loader_object_and_mirror_share_one_claim() {
    let case = Case {
        fields: vec![0x100],
        narrow: Vec::new(),
        compressed: false,
        kind: None,
        referent: 0,
        discovered: 0,
        mode: ReferenceIterationMode::DiscoverOnly,
        discoverer: None,
        idempotent: false,
        metadata_aware: true,
        handles: vec![0x500],
        mirror: true,
        loader_object: true,
        other_handles: vec![0x700],
    };
    for outcome in [run::<Static>(&case), run::<Dynamic>(&case)] {
        // 头部类型、镜像类型、加载器数据，然后才是普通字段
        assert_eq!(
            outcome.log,
            vec![Event::Full(0x500), Event::Full(0x700), Event::Full(0x100)]
        );
        assert_eq!(outcome.other_handles, vec![Oop::from_raw(0x710)]);
    }
}

#[test]
fn test_direct_metadata_calls_agree() {
    fn drive<D: Dispatch>() -> (Vec<Event>, Vec<Oop>, Vec<Oop>) {
        let header = loader(&[0x500]);
        let data = loader(&[0x700, 0]);
        let klass = Klass { loader: &header };
        let mut visitor = MetadataAware::new(Tracer {
            log: Vec::new(),
            mode: ReferenceIterationMode::DiscoverOnly,
            discoverer: None,
            idempotent: false,
        });
        D::visit_type_metadata(&mut visitor, &klass);
        D::visit_class_loader_data(&mut visitor, &data);
        // 已认领过的节点不会再走一遍
        D::visit_class_loader_data(&mut visitor, &data);
        D::visit_type_metadata(&mut visitor, &klass);
        let handles = header.handles.borrow().clone();
        let data_handles = data.handles.borrow().clone();
        (visitor.into_inner().log, handles, data_handles)
    }

    let inlined = drive::<Static>();
    assert_eq!(inlined, drive::<Dynamic>());
    assert_eq!(
        inlined.0,
        vec![Event::Full(0x500), Event::Full(0x700), Event::Full(0)]
    );
    assert_eq!(inlined.2, vec![Oop::from_raw(0x710), Oop::NULL]);
}

#[test]
fn test_slot_representations_are_plain_words() {
    assert_eq!(size_of::<Oop>(), size_of::<usize>());
    assert_eq!(align_of::<Oop>(), align_of::<usize>());
    assert_eq!(size_of::<NarrowOop>(), size_of::<u32>());
}

//! The object heap and its collector.
//!
//! Objects live in generation-tagged slots. A handle stays valid until
//! its object is reclaimed; after that the slot's header reads
//! [`ObjectHeader::Deleted`] and its generation moves on, so a stale
//! handle is reported as use-after-free instead of reaching whatever the
//! slot holds next.
//!
//! # Collection
//!
//! Mark and sweep over one process's heap. Roots are supplied by the
//! caller (thread stacks and globals) plus the [`ExternalRoots`] table.
//! Allocation never collects; it only flags that a collection is due, and
//! the evaluator collects at its next safe point. A [`GcBarrier`] defers
//! collection until it is dropped.

mod roots;

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mu_ir::ObjectId;
use mu_types::{MachineRep, TypeId, TypeKind, TypePool, Value};

use crate::{GcConfig, HeapError};

pub use roots::ExternalRoots;

/// What occupies a heap slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectHeader {
    Live(TypeId),
    /// Reclaimed; any access through an old handle is an error.
    Deleted,
}

/// Object contents.
enum Payload {
    Empty,
    /// Fixed-size instance bytes laid out by the type.
    Fields(Box<[u8]>),
    /// Element bytes of a dynamic array.
    Elements(Vec<u8>),
    Text(String),
    Opaque(Box<dyn Any + Send + Sync>),
}

struct Slot {
    generation: u32,
    header: ObjectHeader,
    payload: Payload,
    marked: bool,
}

/// Counters accumulated over the heap's lifetime.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GcStats {
    pub collections: usize,
    pub objects_scanned: usize,
    pub objects_reclaimed: usize,
    pub allocations: usize,
}

/// While alive, collections are deferred.
#[must_use = "collection resumes as soon as the barrier is dropped"]
pub struct GcBarrier {
    depth: Arc<AtomicUsize>,
}

impl Drop for GcBarrier {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Heap of one process.
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    since_collection: usize,
    threshold: usize,
    pending: bool,
    config: GcConfig,
    barrier: Arc<AtomicUsize>,
    stats: GcStats,
    external: ExternalRoots,
}

impl Heap {
    pub fn new(config: GcConfig) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            since_collection: 0,
            threshold: config.collection_threshold,
            pending: false,
            config,
            barrier: Arc::new(AtomicUsize::new(0)),
            stats: GcStats::default(),
            external: ExternalRoots::new(),
        }
    }

    /// Number of live objects.
    #[inline]
    pub fn live_objects(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn stats(&self) -> GcStats {
        self.stats
    }

    /// The retain table; clone it to retain and release from other threads.
    #[inline]
    pub fn external_roots(&self) -> &ExternalRoots {
        &self.external
    }

    // === Allocation ===

    /// Allocate a zero-initialized instance of `ty`.
    ///
    /// Strings start empty and dynamic arrays with no elements. Opaque
    /// objects need a payload; see [`Heap::allocate_opaque`].
    pub fn allocate(&mut self, types: &TypePool, ty: TypeId) -> Result<ObjectId, HeapError> {
        let payload = match types.kind(ty) {
            Some(TypeKind::String) => Payload::Text(String::new()),
            Some(TypeKind::DynamicArray { .. }) => Payload::Elements(Vec::new()),
            Some(
                TypeKind::Class(_)
                | TypeKind::FixedArray { .. }
                | TypeKind::Variant(_)
                | TypeKind::Function(_),
            ) => {
                let mut bytes = vec![0u8; types.object_size(ty)?].into_boxed_slice();
                types.construct_instance(ty, &mut bytes)?;
                Payload::Fields(bytes)
            }
            _ => return Err(HeapError::NotInstantiable(types.name(ty))),
        };
        self.insert(ty, payload)
    }

    pub fn allocate_string(&mut self, text: impl Into<String>) -> Result<ObjectId, HeapError> {
        self.insert(TypeId::STRING, Payload::Text(text.into()))
    }

    /// Allocate a dynamic array of `len` zeroed elements.
    pub fn allocate_array(
        &mut self,
        types: &TypePool,
        array: TypeId,
        len: usize,
    ) -> Result<ObjectId, HeapError> {
        let Some(TypeKind::DynamicArray { element }) = types.kind(array) else {
            return Err(HeapError::NotInstantiable(types.name(array)));
        };
        let bytes = vec![0u8; types.element_stride(*element) * len];
        self.insert(array, Payload::Elements(bytes))
    }

    /// Wrap a host value in an object of opaque type `ty`.
    pub fn allocate_opaque(
        &mut self,
        types: &TypePool,
        ty: TypeId,
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<ObjectId, HeapError> {
        if !matches!(types.kind(ty), Some(TypeKind::Opaque)) {
            return Err(HeapError::NotInstantiable(types.name(ty)));
        }
        self.insert(ty, Payload::Opaque(value))
    }

    fn insert(&mut self, ty: TypeId, payload: Payload) -> Result<ObjectId, HeapError> {
        let header = ObjectHeader::Live(ty);
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.header = header;
            slot.payload = payload;
            slot.marked = false;
            ObjectId::new(index, slot.generation)
        } else {
            let index = u32::try_from(self.slots.len()).map_err(|_| HeapError::Exhausted)?;
            self.slots.push(Slot {
                generation: 0,
                header,
                payload,
                marked: false,
            });
            ObjectId::new(index, 0)
        };
        self.live += 1;
        self.since_collection += 1;
        self.stats.allocations += 1;
        if self.config.enabled && self.since_collection >= self.threshold {
            self.pending = true;
        }
        Ok(id)
    }

    // === Access ===

    fn slot(&self, id: ObjectId) -> Result<&Slot, HeapError> {
        let slot = self
            .slots
            .get(id.index())
            .ok_or(HeapError::InvalidHandle(id))?;
        if slot.generation != id.generation() || slot.header == ObjectHeader::Deleted {
            return Err(HeapError::UseAfterFree(id));
        }
        Ok(slot)
    }

    fn slot_mut(&mut self, id: ObjectId) -> Result<&mut Slot, HeapError> {
        let slot = self
            .slots
            .get_mut(id.index())
            .ok_or(HeapError::InvalidHandle(id))?;
        if slot.generation != id.generation() || slot.header == ObjectHeader::Deleted {
            return Err(HeapError::UseAfterFree(id));
        }
        Ok(slot)
    }

    /// Header of the slot `id` points at, regardless of generation.
    pub fn header(&self, id: ObjectId) -> Option<ObjectHeader> {
        self.slots.get(id.index()).map(|s| s.header)
    }

    pub fn is_live(&self, id: ObjectId) -> bool {
        self.slot(id).is_ok()
    }

    /// Runtime type of a live object.
    pub fn type_of(&self, id: ObjectId) -> Result<TypeId, HeapError> {
        match self.slot(id)?.header {
            ObjectHeader::Live(ty) => Ok(ty),
            ObjectHeader::Deleted => Err(HeapError::UseAfterFree(id)),
        }
    }

    /// Instance bytes of a fixed-layout object.
    pub fn fields(&self, id: ObjectId) -> Result<&[u8], HeapError> {
        match &self.slot(id)?.payload {
            Payload::Fields(bytes) => Ok(bytes),
            _ => Err(wrong_payload(id, "instance fields")),
        }
    }

    pub fn fields_mut(&mut self, id: ObjectId) -> Result<&mut [u8], HeapError> {
        match &mut self.slot_mut(id)?.payload {
            Payload::Fields(bytes) => Ok(bytes),
            _ => Err(wrong_payload(id, "instance fields")),
        }
    }

    /// Element bytes of a dynamic array.
    pub fn elements(&self, id: ObjectId) -> Result<&[u8], HeapError> {
        match &self.slot(id)?.payload {
            Payload::Elements(bytes) => Ok(bytes),
            _ => Err(wrong_payload(id, "array elements")),
        }
    }

    pub fn elements_mut(&mut self, id: ObjectId) -> Result<&mut Vec<u8>, HeapError> {
        match &mut self.slot_mut(id)?.payload {
            Payload::Elements(bytes) => Ok(bytes),
            _ => Err(wrong_payload(id, "array elements")),
        }
    }

    pub fn text(&self, id: ObjectId) -> Result<&str, HeapError> {
        match &self.slot(id)?.payload {
            Payload::Text(text) => Ok(text),
            _ => Err(wrong_payload(id, "text")),
        }
    }

    /// The host value inside an opaque object.
    pub fn opaque<T: Any>(&self, id: ObjectId) -> Result<&T, HeapError> {
        match &self.slot(id)?.payload {
            Payload::Opaque(value) => value
                .downcast_ref::<T>()
                .ok_or_else(|| wrong_payload(id, std::any::type_name::<T>())),
            _ => Err(wrong_payload(id, "an opaque value")),
        }
    }

    /// Read a field at `offset` of a fixed-layout object.
    pub fn load_field(&self, id: ObjectId, offset: usize, rep: MachineRep) -> Result<Value, HeapError> {
        let bytes = self.fields(id)?;
        let src = bytes.get(offset..).ok_or_else(|| wrong_payload(id, "a field at that offset"))?;
        Ok(rep.load(src)?)
    }

    pub fn store_field(
        &mut self,
        id: ObjectId,
        offset: usize,
        rep: MachineRep,
        value: Value,
    ) -> Result<(), HeapError> {
        let bytes = self.fields_mut(id)?;
        let dst = bytes
            .get_mut(offset..)
            .ok_or_else(|| wrong_payload(id, "a field at that offset"))?;
        Ok(rep.store(value, dst)?)
    }

    // === Collection ===

    /// A collection is due and no barrier is up.
    pub fn needs_collection(&self) -> bool {
        self.pending && self.barrier.load(Ordering::Acquire) == 0
    }

    /// Ask for a collection at the next safe point.
    pub fn request_collection(&mut self) {
        self.pending = true;
    }

    /// Defer collection while the returned guard lives.
    pub fn barrier(&self) -> GcBarrier {
        self.barrier.fetch_add(1, Ordering::AcqRel);
        GcBarrier {
            depth: Arc::clone(&self.barrier),
        }
    }

    /// Mark everything reachable from `roots` and the external roots, then
    /// reclaim the rest. Returns the number of objects reclaimed.
    ///
    /// Under a barrier nothing happens and the collection stays pending.
    #[tracing::instrument(level = "debug", skip_all, fields(live = self.live))]
    pub fn collect(&mut self, types: &TypePool, roots: impl IntoIterator<Item = Value>) -> usize {
        if self.barrier.load(Ordering::Acquire) > 0 {
            self.pending = true;
            return 0;
        }

        let mut work: Vec<ObjectId> = roots.into_iter().filter_map(Value::as_object).collect();
        work.extend(self.external.objects());

        let mut scanned = 0;
        while let Some(id) = work.pop() {
            let Some(slot) = self.slots.get_mut(id.index()) else {
                continue;
            };
            let ObjectHeader::Live(ty) = slot.header else {
                continue;
            };
            if slot.generation != id.generation() || slot.marked {
                continue;
            }
            slot.marked = true;
            scanned += 1;
            match &slot.payload {
                Payload::Fields(bytes) => types.trace_pointers(ty, bytes, |child| work.push(child)),
                Payload::Elements(bytes) => types.trace_pointers(ty, bytes, |child| work.push(child)),
                Payload::Empty | Payload::Text(_) | Payload::Opaque(_) => {}
            }
        }

        let mut reclaimed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.marked {
                slot.marked = false;
                continue;
            }
            if slot.header == ObjectHeader::Deleted {
                continue;
            }
            tracing::trace!(index, generation = slot.generation, "reclaiming object");
            slot.header = ObjectHeader::Deleted;
            slot.payload = Payload::Empty;
            slot.generation = slot.generation.wrapping_add(1);
            #[expect(
                clippy::cast_possible_truncation,
                reason = "slot count is bounded by u32 at insertion"
            )]
            self.free.push(index as u32);
            reclaimed += 1;
        }

        self.live -= reclaimed;
        self.since_collection = 0;
        self.threshold = self.config.next_threshold(self.live);
        self.pending = false;
        self.stats.collections += 1;
        self.stats.objects_scanned += scanned;
        self.stats.objects_reclaimed += reclaimed;
        tracing::debug!(
            scanned,
            reclaimed,
            live = self.live,
            next_threshold = self.threshold,
            "collection finished"
        );
        reclaimed
    }
}

#[cold]
fn wrong_payload(object: ObjectId, expected: &'static str) -> HeapError {
    HeapError::WrongPayload { object, expected }
}

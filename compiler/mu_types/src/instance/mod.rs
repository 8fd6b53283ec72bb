//! Instance storage: sizes, in-place construction and copying, and the
//! pointer map the collector traces.
//!
//! Fixed storage layouts per kind:
//!
//! | Kind            | Storage                                            |
//! |-----------------|----------------------------------------------------|
//! | primitive       | one value of its machine representation            |
//! | vector          | `dim` little-endian `f32` lanes                    |
//! | class           | frozen layout, `instance_size` bytes               |
//! | fixed array     | `len` elements of the element's representation     |
//! | dynamic array   | no fixed part; elements are stored separately      |
//! | variant         | `u32` tag at 0, payload at [`VARIANT_PAYLOAD_OFFSET`] |
//! | function object | `u32` function handle                              |
//! | string, opaque  | no fixed part; payload is held outside the bytes  |

use mu_ir::ObjectId;

use crate::machine_rep::align_up;
use crate::{MachineRep, TypeError, TypeId, TypeKind, TypePool};

/// Offset of a variant's payload within its storage.
pub const VARIANT_PAYLOAD_OFFSET: usize = 8;

impl TypePool {
    /// Bytes of fixed storage an instance of `ty` occupies.
    ///
    /// Classes must be frozen first.
    pub fn object_size(&self, ty: TypeId) -> Result<usize, TypeError> {
        let entry = self.entry(ty)?;
        let size = match &entry.kind {
            TypeKind::Void
            | TypeKind::Nil
            | TypeKind::String
            | TypeKind::Opaque
            | TypeKind::Interface(_)
            | TypeKind::Pattern(_)
            | TypeKind::DynamicArray { .. } => 0,
            TypeKind::Primitive(rep) => rep.size(),
            TypeKind::Vector { dim, .. } => MachineRep::Vector(*dim).size(),
            TypeKind::Class(_) => self.layout(ty)?.instance_size,
            TypeKind::FixedArray { element, len } => self.element_stride(*element) * len,
            TypeKind::Variant(data) => {
                let payload = data
                    .tags
                    .iter()
                    .map(|t| self.machine_rep(t.payload).size())
                    .max()
                    .unwrap_or(0);
                align_up(VARIANT_PAYLOAD_OFFSET + payload, 8)
            }
            TypeKind::Function(_) => MachineRep::Int.size(),
        };
        Ok(size)
    }

    /// Distance between consecutive array elements of type `element`.
    pub fn element_stride(&self, element: TypeId) -> usize {
        let rep = self.machine_rep(element);
        align_up(rep.size(), rep.align())
    }

    /// Placement-initialize an instance: every field and element starts at
    /// its representation's zero value (nil for references).
    pub fn construct_instance(&self, ty: TypeId, storage: &mut [u8]) -> Result<(), TypeError> {
        let size = self.object_size(ty)?;
        let available = storage.len();
        let dst = storage
            .get_mut(..size)
            .ok_or(TypeError::StorageTooSmall {
                needed: size,
                available,
            })?;
        dst.fill(0);
        Ok(())
    }

    /// Copy an instance of `ty` from `src` to `dst`.
    ///
    /// Storage holds only scalars and encoded handles, so a bitwise copy is
    /// exact for every kind; references are shared, not cloned.
    pub fn copy_instance(&self, ty: TypeId, src: &[u8], dst: &mut [u8]) -> Result<(), TypeError> {
        let size = self.object_size(ty)?;
        let too_small = |available| TypeError::StorageTooSmall {
            needed: size,
            available,
        };
        let src = src.get(..size).ok_or_else(|| too_small(src.len()))?;
        let dst_len = dst.len();
        let dst = dst.get_mut(..size).ok_or_else(|| too_small(dst_len))?;
        dst.copy_from_slice(src);
        Ok(())
    }

    /// Whether instances of `ty` never contain traced references.
    pub fn is_gc_atomic(&self, ty: TypeId) -> bool {
        match self.kind(ty) {
            None => true,
            Some(TypeKind::Class(data)) => data.layout.as_ref().is_some_and(|l| l.gc_atomic),
            Some(TypeKind::DynamicArray { element } | TypeKind::FixedArray { element, .. }) => {
                !self.is_reference(*element)
            }
            Some(TypeKind::Variant(data)) => data.tags.iter().all(|t| !self.is_reference(t.payload)),
            Some(_) => true,
        }
    }

    /// Call `visit` for every non-nil reference stored in an instance.
    ///
    /// `storage` is the instance's bytes; for dynamic arrays it is the
    /// element buffer.
    pub fn trace_pointers(&self, ty: TypeId, storage: &[u8], mut visit: impl FnMut(ObjectId)) {
        let mut visit_at = |offset: usize| {
            let Some(word) = storage.get(offset..offset + 8) else {
                return;
            };
            if let Ok(crate::Value::Object(Some(id))) = MachineRep::Pointer.load(word) {
                visit(id);
            }
        };

        match self.kind(ty) {
            Some(TypeKind::Class(data)) => {
                let Some(layout) = &data.layout else {
                    return;
                };
                for field in layout.fields.iter().filter(|f| f.rep.is_pointer()) {
                    visit_at(field.offset);
                }
            }
            Some(TypeKind::DynamicArray { element } | TypeKind::FixedArray { element, .. })
                if self.is_reference(*element) =>
            {
                let stride = self.element_stride(*element);
                for offset in (0..storage.len()).step_by(stride.max(1)) {
                    visit_at(offset);
                }
            }
            Some(TypeKind::Variant(data)) => {
                let tag = storage
                    .get(..4)
                    .and_then(|b| <[u8; 4]>::try_from(b).ok())
                    .map(u32::from_le_bytes);
                let payload = tag.and_then(|t| data.tags.get(t as usize)).map(|t| t.payload);
                if payload.is_some_and(|p| self.is_reference(p)) {
                    visit_at(VARIANT_PAYLOAD_OFFSET);
                }
            }
            _ => {}
        }
    }
}

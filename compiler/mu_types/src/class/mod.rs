//! Classes, interfaces and interface implementation tables.
//!
//! A class is open while its module populates it: fields, methods, the
//! superclass and implemented interfaces can all be added. Freezing it
//! computes the instance layout (inherited fields first) and resolves one
//! [`InterfaceImp`] vtable per implemented interface, including interfaces
//! declared on superclasses. A class that fails to freeze stays open and
//! cannot be instantiated.

use mu_ir::{FunctionId, Name};
use smallvec::SmallVec;

use crate::machine_rep::align_up;
use crate::{
    ClassData, ClassLayout, Field, FieldSlot, InterfaceData, InterfaceMethod, Method, TypeError,
    TypeId, TypeKind, TypePool,
};

/// Resolved virtual dispatch table for one (class, interface) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceImp {
    pub class: TypeId,
    pub interface: TypeId,
    vtable: Vec<FunctionId>,
}

impl InterfaceImp {
    /// Entries in the table, equal to the interface's function count.
    #[inline]
    pub fn num_functions(&self) -> usize {
        self.vtable.len()
    }

    /// The class's implementation of the interface method at `slot`.
    #[inline]
    pub fn function(&self, slot: usize) -> Option<FunctionId> {
        self.vtable.get(slot).copied()
    }

    pub fn functions(&self) -> &[FunctionId] {
        &self.vtable
    }
}

impl TypePool {
    pub fn class(&self, ty: TypeId) -> Option<&ClassData> {
        match self.kind(ty)? {
            TypeKind::Class(data) => Some(data),
            _ => None,
        }
    }

    pub fn interface(&self, ty: TypeId) -> Option<&InterfaceData> {
        match self.kind(ty)? {
            TypeKind::Interface(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable access to an open (not yet frozen) class.
    fn open_class_mut(&mut self, class: TypeId) -> Result<&mut ClassData, TypeError> {
        let name = self.name(class);
        match self.kind_mut(class) {
            Some(TypeKind::Class(data)) if data.is_frozen() => Err(TypeError::ClassFrozen(name)),
            Some(TypeKind::Class(data)) => Ok(data),
            Some(_) => Err(TypeError::NotAClass(name)),
            None => Err(TypeError::UnknownType(class.raw())),
        }
    }

    /// Set or replace the superclass of an open class.
    pub fn set_super_class(&mut self, class: TypeId, super_class: TypeId) -> Result<(), TypeError> {
        if self.class(super_class).is_none() {
            return Err(TypeError::NotAClass(self.name(super_class)));
        }
        self.open_class_mut(class)?.super_class = Some(super_class);
        Ok(())
    }

    pub fn add_field(&mut self, class: TypeId, name: Name, ty: TypeId) -> Result<(), TypeError> {
        let class_name = self.name(class);
        let data = self.open_class_mut(class)?;
        if data.fields.iter().any(|f| f.name == name) {
            return Err(TypeError::DuplicateField {
                class: class_name,
                field: name,
            });
        }
        data.fields.push(Field { name, ty });
        Ok(())
    }

    /// Attach a method. Its signature takes the receiver first.
    pub fn add_method(&mut self, class: TypeId, method: Method) -> Result<(), TypeError> {
        self.open_class_mut(class)?.methods.push(method);
        Ok(())
    }

    /// Declare that `class` implements `interface`.
    pub fn add_class_interface(&mut self, class: TypeId, interface: TypeId) -> Result<(), TypeError> {
        if self.interface(interface).is_none() {
            return Err(TypeError::NotAnInterface(self.name(interface)));
        }
        let data = self.open_class_mut(class)?;
        if !data.interfaces.contains(&interface) {
            data.interfaces.push(interface);
        }
        Ok(())
    }

    /// Append an abstract method to an interface.
    ///
    /// The signature's first parameter must be the interface itself.
    pub fn add_interface_method(
        &mut self,
        interface: TypeId,
        name: Name,
        signature: TypeId,
    ) -> Result<usize, TypeError> {
        let iface_name = self.name(interface);
        let receiver_ok = self
            .function_signature(signature)
            .and_then(|sig| sig.params.first())
            .is_some_and(|&first| first == interface);
        if !receiver_ok {
            return Err(TypeError::InterfaceSignature {
                interface: iface_name,
                method: name,
            });
        }
        match self.kind_mut(interface) {
            Some(TypeKind::Interface(data)) => {
                data.methods.push(InterfaceMethod { name, signature });
                Ok(data.methods.len() - 1)
            }
            _ => Err(TypeError::NotAnInterface(iface_name)),
        }
    }

    /// `class` followed by its superclasses, most derived first.
    ///
    /// Fails on a cycle or a non-class link.
    pub fn inheritance_chain(&self, class: TypeId) -> Result<SmallVec<[TypeId; 4]>, TypeError> {
        let mut chain: SmallVec<[TypeId; 4]> = SmallVec::new();
        let mut current = Some(class);
        while let Some(ty) = current {
            if chain.contains(&ty) {
                return Err(TypeError::CyclicInheritance(self.name(class)));
            }
            let data = self.class(ty).ok_or(TypeError::NotAClass(self.name(ty)))?;
            chain.push(ty);
            current = data.super_class;
        }
        Ok(chain)
    }

    /// Whether `derived` is `base` or inherits from it.
    pub fn is_a(&self, derived: TypeId, base: TypeId) -> bool {
        self.inheritance_chain(derived)
            .is_ok_and(|chain| chain.contains(&base))
    }

    /// Whether `class` or one of its superclasses declares `interface`.
    pub fn implements(&self, class: TypeId, interface: TypeId) -> bool {
        self.inheritance_chain(class).is_ok_and(|chain| {
            chain
                .iter()
                .filter_map(|&c| self.class(c))
                .any(|data| data.interfaces.contains(&interface))
        })
    }

    /// Two method signatures agree when they take the same arguments after
    /// the receiver and return the same type.
    fn same_member_signature(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        match (self.function_signature(a), self.function_signature(b)) {
            (Some(a), Some(b)) => {
                a.ret == b.ret
                    && a.params.len() == b.params.len()
                    && a.params.get(1..) == b.params.get(1..)
            }
            _ => false,
        }
    }

    /// The most derived method named `name` with a matching signature,
    /// searching `class` and then its superclasses.
    pub fn lookup_method(&self, class: TypeId, name: Name, signature: TypeId) -> Option<FunctionId> {
        let chain = self.inheritance_chain(class).ok()?;
        chain.iter().find_map(|&c| {
            self.class(c)?
                .methods
                .iter()
                .find(|m| m.name == name && self.same_member_signature(m.signature, signature))
                .map(|m| m.function)
        })
    }

    /// The frozen layout of a class.
    pub fn layout(&self, class: TypeId) -> Result<&ClassLayout, TypeError> {
        let data = self.class(class).ok_or(TypeError::NotAClass(self.name(class)))?;
        data.layout
            .as_ref()
            .ok_or(TypeError::NotFrozen(self.name(class)))
    }

    #[inline]
    pub fn is_frozen(&self, class: TypeId) -> bool {
        self.class(class).is_some_and(ClassData::is_frozen)
    }

    /// Freeze a class and, first, every superclass.
    ///
    /// Idempotent for an already frozen class. A method declared without a
    /// body still fills its interface slot, since bodies that read fields
    /// are installed after the layout exists; calling it through the
    /// vtable raises the catchable abstract-function error.
    #[tracing::instrument(level = "debug", skip_all, fields(class = %self.name(class)))]
    pub fn freeze_class(&mut self, class: TypeId) -> Result<(), TypeError> {
        let chain = self.inheritance_chain(class)?;
        for &ty in chain.iter().rev() {
            self.freeze_one(ty)?;
        }
        Ok(())
    }

    fn freeze_one(&mut self, class: TypeId) -> Result<(), TypeError> {
        let class_name = self.name(class);
        let data = self.class(class).ok_or(TypeError::NotAClass(class_name))?;
        if data.is_frozen() {
            return Ok(());
        }

        let (mut fields, mut offset, mut align, mut gc_atomic) = match data.super_class {
            Some(super_class) => {
                let inherited = self.layout(super_class)?;
                (
                    inherited.fields.clone(),
                    inherited.instance_size,
                    inherited.align,
                    inherited.gc_atomic,
                )
            }
            None => (Vec::new(), 0, 1, true),
        };

        for field in &data.fields {
            let rep = self.machine_rep(field.ty);
            offset = align_up(offset, rep.align());
            fields.push(FieldSlot {
                name: field.name,
                ty: field.ty,
                offset,
                rep,
            });
            offset += rep.size();
            align = align.max(rep.align());
            gc_atomic &= !rep.is_pointer();
        }

        let layout = ClassLayout {
            fields,
            instance_size: align_up(offset, align),
            align,
            gc_atomic,
        };

        let imps = self.build_interface_imps(class)?;

        tracing::debug!(
            class = %class_name,
            size = layout.instance_size,
            gc_atomic = layout.gc_atomic,
            interfaces = imps.len(),
            "class frozen"
        );

        if let Some(TypeKind::Class(data)) = self.kind_mut(class) {
            data.layout = Some(layout);
        }
        for imp in imps {
            self.imps.insert((imp.class, imp.interface), imp);
        }
        Ok(())
    }

    /// Resolve a vtable for every interface declared on `class` or a
    /// superclass.
    fn build_interface_imps(&self, class: TypeId) -> Result<Vec<InterfaceImp>, TypeError> {
        let mut interfaces: SmallVec<[TypeId; 4]> = SmallVec::new();
        for &c in &self.inheritance_chain(class)? {
            for &iface in self.class(c).map(|d| d.interfaces.as_slice()).unwrap_or_default() {
                if !interfaces.contains(&iface) {
                    interfaces.push(iface);
                }
            }
        }

        interfaces
            .into_iter()
            .map(|interface| {
                let data = self
                    .interface(interface)
                    .ok_or(TypeError::NotAnInterface(self.name(interface)))?;
                let vtable = data
                    .methods
                    .iter()
                    .map(|m| {
                        self.lookup_method(class, m.name, m.signature).ok_or(
                            TypeError::MissingInterfaceMethod {
                                class: self.name(class),
                                interface: self.name(interface),
                                method: m.name,
                            },
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(InterfaceImp {
                    class,
                    interface,
                    vtable,
                })
            })
            .collect()
    }

    /// The vtable for `class` implementing `interface`, once frozen.
    pub fn interface_imp(&self, class: TypeId, interface: TypeId) -> Option<&InterfaceImp> {
        self.imps.get(&(class, interface))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests;

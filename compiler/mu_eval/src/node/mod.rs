//! Bound node trees.
//!
//! A [`Node`] is an expression whose names have already been resolved:
//! calls carry the chosen overload, variable references carry frame or
//! global slots, and field accesses carry byte offsets. Trees are built by
//! the [`NodeAssembler`] and are immutable once bound; function bodies and
//! top-level units share them through `Arc`.

mod assembler;

use std::sync::Arc;

use mu_ir::{FunctionId, GlobalSlot};
use mu_types::{MachineRep, TypeId, Value};

use crate::BindError;

pub use assembler::NodeAssembler;

/// What a node does when evaluated.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Constant(Value),
    /// Allocates a fresh string each evaluation.
    StringLiteral(Arc<str>),
    /// Statically bound call; children are the arguments.
    Call(FunctionId),
    /// Construct call; children are its operands, unevaluated.
    Construct(FunctionId),
    /// Method call re-dispatched on the receiver's runtime class. The
    /// function is the statically chosen overload.
    VirtualCall(FunctionId),
    /// Call through the receiver's vtable for `interface`.
    InterfaceCall { interface: TypeId, slot: usize },
    Parameter(usize),
    Local(usize),
    /// Child 0 is the value; evaluates to it.
    AssignLocal(usize),
    Global(GlobalSlot),
    AssignGlobal(GlobalSlot),
    /// Child 0 is the object.
    Field { offset: usize, rep: MachineRep },
    /// Child 0 is the object, child 1 the value.
    AssignField { offset: usize, rep: MachineRep },
    /// Allocates a zeroed instance of the type.
    New(TypeId),
    /// Stand-in for an argument while a template tree is being built.
    /// Must be substituted before the tree is evaluated.
    Placement(usize),
}

/// A bound expression with its static type.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: TypeId,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, ty: TypeId, children: Vec<Node>) -> Self {
        Self { kind, ty, children }
    }

    pub fn leaf(kind: NodeKind, ty: TypeId) -> Self {
        Self::new(kind, ty, Vec::new())
    }

    /// First placement parameter left in the tree, in pre-order.
    pub fn find_placement(&self) -> Option<usize> {
        if let NodeKind::Placement(index) = self.kind {
            return Some(index);
        }
        self.children.iter().find_map(Node::find_placement)
    }

    /// Copy of this tree with every `Placement(i)` replaced by `args[i]`.
    pub fn erase_placements(&self, args: &[Node]) -> Result<Node, BindError> {
        if let NodeKind::Placement(index) = self.kind {
            return args
                .get(index)
                .cloned()
                .ok_or(BindError::PlacementOutOfRange {
                    index,
                    available: args.len(),
                });
        }
        let children = self
            .children
            .iter()
            .map(|c| c.erase_placements(args))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Node::new(self.kind.clone(), self.ty, children))
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Node::size).sum::<usize>()
    }
}

/// A bound top-level expression ready for [`Thread::run`](crate::Thread::run).
#[derive(Clone, Debug)]
pub struct CompiledUnit {
    root: Arc<Node>,
    locals: Arc<[Value]>,
}

impl CompiledUnit {
    pub(crate) fn new(root: Node, locals: Arc<[Value]>) -> Self {
        Self {
            root: Arc::new(root),
            locals,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Initial values of the unit's local slots.
    pub fn locals(&self) -> &[Value] {
        &self.locals
    }

    /// Static type of the unit's value.
    pub fn ty(&self) -> TypeId {
        self.root.ty
    }
}

use std::fmt;
use std::sync::Arc;

use slotmap::new_key_type;

use crate::object::{ClassTypeRef, Function, IValue};

use super::Graph;

pub const MAX_NODE_BLOCKS: usize = 2;

new_key_type! { pub struct NodeKey; }
new_key_type! { pub struct ValueKey; }
new_key_type! { pub struct BlockKey; }

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Float32,
    Float64,
    Int32,
    Int64,
    Bool,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Float32 => "Float",
            DType::Float64 => "Double",
            DType::Int32 => "Int",
            DType::Int64 => "Long",
            DType::Bool => "Bool",
        };
        f.write_str(name)
    }
}

/// Tensor type refinement. Unknown dtype or shape prints as plain `Tensor`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TensorType {
    pub dtype: Option<DType>,
    pub shape: Option<Vec<usize>>,
}

impl TensorType {
    pub fn new(dtype: DType, shape: Vec<usize>) -> Self {
        Self {
            dtype: Some(dtype),
            shape: Some(shape),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Type {
    Tensor(TensorType),
    Int,
    Float,
    Bool,
    Str,
    NoneType,
    List(Box<Type>),
    Future(Box<Type>),
    Class(ClassTypeRef),
}

impl Type {
    /// Unrefined tensor type.
    pub fn tensor() -> Self {
        Self::Tensor(TensorType::default())
    }

    pub fn list_of(elem: Type) -> Self {
        Self::List(Box::new(elem))
    }

    pub fn future_of(elem: Type) -> Self {
        Self::Future(Box::new(elem))
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Self::Tensor(_))
    }

    /// True for class types whose schema is a module.
    pub fn is_module(&self) -> bool {
        match self {
            Self::Class(class) => class.is_module(),
            _ => false,
        }
    }

    pub fn as_class(&self) -> Option<&ClassTypeRef> {
        match self {
            Self::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn list_element(&self) -> Option<&Type> {
        match self {
            Self::List(elem) => Some(elem),
            _ => None,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Tensor(a), Self::Tensor(b)) => a == b,
            (Self::Int, Self::Int)
            | (Self::Float, Self::Float)
            | (Self::Bool, Self::Bool)
            | (Self::Str, Self::Str)
            | (Self::NoneType, Self::NoneType) => true,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Future(a), Self::Future(b)) => a == b,
            // Class types are nominal.
            (Self::Class(a), Self::Class(b)) => Arc::ptr_eq(a, b) || a.name() == b.name(),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tensor(TensorType {
                dtype: Some(dtype),
                shape: Some(shape),
            }) => {
                write!(f, "{}(", dtype)?;
                for (i, dim) in shape.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", dim)?;
                }
                write!(f, ")")
            }
            Self::Tensor(_) => f.write_str("Tensor"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
            Self::Str => f.write_str("str"),
            Self::NoneType => f.write_str("NoneType"),
            Self::List(elem) => match elem.as_ref() {
                Type::Tensor(_) => f.write_str("Tensor[]"),
                other => write!(f, "{}[]", other),
            },
            Self::Future(elem) => write!(f, "Future[{}]", elem),
            Self::Class(class) => f.write_str(class.name()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Produces the inputs of a block.
    Param,
    /// Consumes the outputs of a block.
    Return,
    Constant,
    GetAttr,
    SetAttr,
    Fork,
    If,
    Loop,
    ListConstruct,
    ListUnpack,
    Call,
    PythonOp,
    Op(String),
}

impl NodeKind {
    pub fn op(name: impl Into<String>) -> Self {
        Self::Op(name.into())
    }

    pub fn is_control_flow(&self) -> bool {
        matches!(self, Self::If | Self::Loop)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Param => "prim::Param",
            NodeKind::Return => "prim::Return",
            NodeKind::Constant => "prim::Constant",
            NodeKind::GetAttr => "prim::GetAttr",
            NodeKind::SetAttr => "prim::SetAttr",
            NodeKind::Fork => "prim::fork",
            NodeKind::If => "prim::If",
            NodeKind::Loop => "prim::Loop",
            NodeKind::ListConstruct => "prim::ListConstruct",
            NodeKind::ListUnpack => "prim::ListUnpack",
            NodeKind::Call => "prim::CallFunction",
            NodeKind::PythonOp => "prim::PythonOp",
            NodeKind::Op(name) => name.as_str(),
        };
        f.write_str(name)
    }
}

/// Location in user source a node was created from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceRange {
    pub file: Option<Arc<str>>,
    pub line: u32,
    pub column: u32,
}

impl SourceRange {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.into()),
            line,
            column,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.file.is_none() && self.line == 0
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
            None if self.line > 0 => write!(f, "<unknown>:{}:{}", self.line, self.column),
            None => f.write_str("<unknown location>"),
        }
    }
}

/// A consumer of a value: `user.inputs[offset]` is the value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: NodeKey,
    pub offset: usize,
}

impl Use {
    pub fn new(user: NodeKey, offset: usize) -> Self {
        Self { user, offset }
    }
}

/// Per-node attributes. Which fields are set depends on the node kind.
#[derive(Clone, Debug, Default)]
pub struct NodeAttrs {
    /// Attribute name for `GetAttr`/`SetAttr`, operator name for `PythonOp`.
    pub name: Option<String>,
    /// Literal for `Constant`.
    pub value: Option<IValue>,
    /// Body of a `Fork`.
    pub subgraph: Option<Box<Graph>>,
    /// Callee of a `Call`.
    pub function: Option<Arc<Function>>,
}

impl NodeAttrs {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn constant(value: IValue) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }
}

/// Where newly created nodes are inserted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InsertPoint {
    Before(NodeKey),
    After(NodeKey),
    EndOf(BlockKey),
}

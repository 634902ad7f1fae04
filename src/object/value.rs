use std::fmt;

use crate::ir::Type;

use super::{ObjectRef, Tensor};

/// Runtime content of an attribute slot or constant.
#[derive(Clone, Debug)]
pub enum IValue {
    None,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Tensor(Tensor),
    TensorList(Vec<Tensor>),
    IntList(Vec<i64>),
    Object(ObjectRef),
}

impl IValue {
    pub fn ty(&self) -> Type {
        match self {
            Self::None => Type::NoneType,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Double(_) => Type::Float,
            Self::Str(_) => Type::Str,
            Self::Tensor(tensor) => tensor.ty(),
            Self::TensorList(_) => Type::list_of(Type::tensor()),
            Self::IntList(_) => Type::list_of(Type::Int),
            Self::Object(object) => Type::Class(object.class().clone()),
        }
    }

    /// Type used when this value declares an attribute in a class schema.
    /// Tensor refinements are dropped, as schemas only say `Tensor`.
    pub fn schema_type(&self) -> Type {
        match self {
            Self::Tensor(_) => Type::tensor(),
            other => other.ty(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "float",
            Self::Str(_) => "str",
            Self::Tensor(_) => "Tensor",
            Self::TensorList(_) => "Tensor[]",
            Self::IntList(_) => "int[]",
            Self::Object(_) => "object",
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Self::Tensor(_))
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Self::Tensor(tensor) => Some(tensor),
            _ => None,
        }
    }

    pub fn as_tensor_list(&self) -> Option<&[Tensor]> {
        match self {
            Self::TensorList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Tensor> for IValue {
    fn from(tensor: Tensor) -> Self {
        Self::Tensor(tensor)
    }
}

impl From<i64> for IValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for IValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for IValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<ObjectRef> for IValue {
    fn from(object: ObjectRef) -> Self {
        Self::Object(object)
    }
}

impl fmt::Display for IValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{:?}", v),
            Self::Str(v) => write!(f, "{:?}", v),
            Self::Tensor(t) => write!(f, "<Tensor {}>", t.ty()),
            Self::TensorList(list) => write!(f, "<Tensor[{}]>", list.len()),
            Self::IntList(list) => write!(f, "{:?}", list),
            Self::Object(object) => write!(f, "<{} object>", object.class().name()),
        }
    }
}

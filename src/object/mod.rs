//! Runtime representation of module objects and the values they hold.

mod class;
mod function;
mod tensor;
mod value;


pub use class::{ClassType, ClassTypeBuilder, ClassTypeRef, ModuleBuilder, Object, ObjectRef};
pub use function::Function;
pub use tensor::Tensor;
pub use value::IValue;

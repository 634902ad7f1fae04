use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;

use crate::ir::Type;

use super::IValue;

pub type ClassTypeRef = Arc<ClassType>;
pub type ObjectRef = Arc<Object>;

/// Schema of an object: ordered, named attribute slots.
#[derive(Debug)]
pub struct ClassType {
    name: String,
    attributes: IndexMap<String, Type>,
    is_module: bool,
}

impl ClassType {
    pub fn module(name: impl Into<String>) -> ClassTypeBuilder {
        ClassTypeBuilder::new(name.into(), true)
    }

    pub fn class(name: impl Into<String>) -> ClassTypeBuilder {
        ClassTypeBuilder::new(name.into(), false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_module(&self) -> bool {
        self.is_module
    }

    /// Offset of the attribute called `name`.
    pub fn attribute_slot(&self, name: &str) -> Option<usize> {
        self.attributes.get_index_of(name)
    }

    pub fn attribute_name(&self, slot: usize) -> Option<&str> {
        self.attributes.get_index(slot).map(|(name, _)| name.as_str())
    }

    pub fn attribute_type(&self, slot: usize) -> Option<&Type> {
        self.attributes.get_index(slot).map(|(_, ty)| ty)
    }

    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.attributes.iter().map(|(name, ty)| (name.as_str(), ty))
    }
}

pub struct ClassTypeBuilder {
    name: String,
    attributes: IndexMap<String, Type>,
    is_module: bool,
}

impl ClassTypeBuilder {
    fn new(name: String, is_module: bool) -> Self {
        Self {
            name,
            attributes: IndexMap::new(),
            is_module,
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.attributes.insert(name.into(), ty);
        self
    }

    pub fn build(self) -> ClassTypeRef {
        Arc::new(ClassType {
            name: self.name,
            attributes: self.attributes,
            is_module: self.is_module,
        })
    }
}

/// Reference-counted instance of a [`ClassType`].
///
/// Slot contents can be replaced by the owner between lowering calls; the
/// lowering pass itself only reads them.
pub struct Object {
    class: ClassTypeRef,
    slots: RwLock<Vec<IValue>>,
}

impl Object {
    /// Creates an object whose slots follow the attribute order of `class`.
    pub fn new(class: ClassTypeRef, slots: Vec<IValue>) -> ObjectRef {
        assert_eq!(
            class.num_attributes(),
            slots.len(),
            "class `{}` declares {} attributes",
            class.name(),
            class.num_attributes()
        );
        Arc::new(Self {
            class,
            slots: RwLock::new(slots),
        })
    }

    pub fn class(&self) -> &ClassTypeRef {
        &self.class
    }

    pub fn num_slots(&self) -> usize {
        self.class.num_attributes()
    }

    pub fn get_slot(&self, offset: usize) -> IValue {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)[offset].clone()
    }

    pub fn set_slot(&self, offset: usize, value: IValue) {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)[offset] = value;
    }

    pub fn get_attr(&self, name: &str) -> Option<IValue> {
        self.class.attribute_slot(name).map(|slot| self.get_slot(slot))
    }

    /// Replaces the content of attribute `name`; false if there is none.
    pub fn set_attr(&self, name: &str, value: IValue) -> bool {
        match self.class.attribute_slot(name) {
            Some(slot) => {
                self.set_slot(slot, value);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Attribute contents may refer back to this object.
        f.debug_struct("Object")
            .field("class", &self.class.name())
            .field("slots", &self.num_slots())
            .finish()
    }
}

/// Builds a module object and its class type from attribute values.
///
/// ```
/// use modlower::object::{ModuleBuilder, Tensor};
///
/// let sub = ModuleBuilder::new("Scale").attr("scale", Tensor::full(vec![1], 2.0)).build();
/// let module = ModuleBuilder::new("Net")
///     .attr("weight", Tensor::zeros(vec![3, 3]))
///     .attr("submodule", sub)
///     .build();
/// assert_eq!(module.class().attribute_slot("submodule"), Some(1));
/// ```
pub struct ModuleBuilder {
    name: String,
    attributes: Vec<(String, IValue)>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<IValue>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> ObjectRef {
        let mut class = ClassType::module(self.name);
        let mut slots = Vec::with_capacity(self.attributes.len());
        for (name, value) in self.attributes {
            class = class.attribute(name, value.schema_type());
            slots.push(value);
        }
        Object::new(class.build(), slots)
    }
}

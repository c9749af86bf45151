use std::fmt;

use super::SemanticType;

/// Handle of a descriptor owned by a [`super::BindingContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(pub u32);

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Internal,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Final,
    Open,
    Abstract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Trait,
    Object,
    AnonymousObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDescriptor {
    /// Dotted fully-qualified name, empty for the root namespace
    pub fq_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParameterDescriptor {
    pub name: String,
    pub upper_bound: SemanticType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    pub name: String,
    pub container: DescriptorId,
    pub kind: ClassKind,
    pub visibility: Visibility,
    pub modality: Modality,
    pub superclass: Option<SemanticType>,
    pub traits: Vec<SemanticType>,
    pub type_parameters: Vec<TypeParameterDescriptor>,
    pub primary_constructor: Option<DescriptorId>,
    /// Declared members in declaration order
    pub members: Vec<DescriptorId>,
}

impl ClassDescriptor {
    pub fn is_trait(&self) -> bool {
        self.kind == ClassKind::Trait
    }

    pub fn is_object(&self) -> bool {
        self.kind == ClassKind::Object
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Function,
    Constructor,
    /// Body of a function literal
    Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub container: DescriptorId,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    pub modality: Modality,
    pub receiver: Option<SemanticType>,
    pub type_parameters: Vec<TypeParameterDescriptor>,
    pub value_parameters: Vec<DescriptorId>,
    pub return_type: SemanticType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub container: DescriptorId,
    pub visibility: Visibility,
    pub modality: Modality,
    pub ty: SemanticType,
    pub mutable: bool,
    pub has_backing_field: bool,
    /// A getter or setter body was written in source
    pub custom_accessors: bool,
}

impl PropertyDescriptor {
    /// Private properties with a plain backing field are read and written
    /// as fields; everything else goes through `getX`/`setX`.
    pub fn uses_direct_field(&self) -> bool {
        self.visibility == Visibility::Private && self.has_backing_field && !self.custom_accessors
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueParameterDescriptor {
    pub name: String,
    pub container: DescriptorId,
    pub index: usize,
    pub ty: SemanticType,
    pub declares_default: bool,
    pub vararg_element: Option<SemanticType>,
    /// Set when a constructor parameter is also declared as a property
    pub property: Option<DescriptorId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDescriptor {
    pub name: String,
    pub container: DescriptorId,
    pub ty: SemanticType,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Namespace(NamespaceDescriptor),
    Class(ClassDescriptor),
    Function(FunctionDescriptor),
    Property(PropertyDescriptor),
    ValueParameter(ValueParameterDescriptor),
    Variable(VariableDescriptor),
}

impl Descriptor {
    pub fn name(&self) -> &str {
        match self {
            Descriptor::Namespace(d) => &d.fq_name,
            Descriptor::Class(d) => &d.name,
            Descriptor::Function(d) => &d.name,
            Descriptor::Property(d) => &d.name,
            Descriptor::ValueParameter(d) => &d.name,
            Descriptor::Variable(d) => &d.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Descriptor::Namespace(_) => "namespace",
            Descriptor::Class(_) => "class",
            Descriptor::Function(_) => "function",
            Descriptor::Property(_) => "property",
            Descriptor::ValueParameter(_) => "value parameter",
            Descriptor::Variable(_) => "variable",
        }
    }
}

//! Reflector descriptors, the data model held by the type registry.

use std::collections::BTreeSet;
use std::fmt;

use crate::type_names;

/// Arena index of a descriptor inside a [`TypeRegistry`](crate::TypeRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// C++ member/base access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Public,
    Protected,
    Private,
}

impl Access {
    /// Parse a Doxygen `prot` attribute. `package` has no C++ meaning and is treated as private.
    pub fn from_doxygen(prot: &str) -> Self {
        match prot {
            "public" => Access::Public,
            "protected" => Access::Protected,
            _ => Access::Private,
        }
    }
}

/// Progress of a descriptor through the build/consolidate protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionState {
    Unresolved,
    Building,
    Consolidated,
    Invalid,
}

/// Standard library container families that get a dedicated reflector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContainerShape {
    Vector,
    List,
    Deque,
    Set,
    MultiSet,
    Map,
    MultiMap,
    Pair,
}

impl ContainerShape {
    /// Number of element type arguments that matter for reflection.
    pub fn arity(self) -> usize {
        match self {
            ContainerShape::Map | ContainerShape::MultiMap | ContainerShape::Pair => 2,
            _ => 1,
        }
    }

    pub fn std_name(self) -> &'static str {
        match self {
            ContainerShape::Vector => "std::vector",
            ContainerShape::List => "std::list",
            ContainerShape::Deque => "std::deque",
            ContainerShape::Set => "std::set",
            ContainerShape::MultiSet => "std::multiset",
            ContainerShape::Map => "std::map",
            ContainerShape::MultiMap => "std::multimap",
            ContainerShape::Pair => "std::pair",
        }
    }

    /// Standard header declaring the container.
    pub fn header(self) -> &'static str {
        match self {
            ContainerShape::Vector => "vector",
            ContainerShape::List => "list",
            ContainerShape::Deque => "deque",
            ContainerShape::Set | ContainerShape::MultiSet => "set",
            ContainerShape::Map | ContainerShape::MultiMap => "map",
            ContainerShape::Pair => "utility",
        }
    }

    pub fn reflector_macro(self) -> &'static str {
        match self {
            ContainerShape::Vector => "STD_VECTOR_REFLECTOR",
            ContainerShape::List => "STD_LIST_REFLECTOR",
            ContainerShape::Deque => "STD_DEQUE_REFLECTOR",
            ContainerShape::Set => "STD_SET_REFLECTOR",
            ContainerShape::MultiSet => "STD_MULTISET_REFLECTOR",
            ContainerShape::Map => "STD_MAP_REFLECTOR",
            ContainerShape::MultiMap => "STD_MULTIMAP_REFLECTOR",
            ContainerShape::Pair => "STD_PAIR_REFLECTOR",
        }
    }
}

/// One enumerator with its evaluated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumerator {
    pub name: String,
    pub value: i64,
}

/// Subkinds of value types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Plain,
    Enum {
        enumerators: Vec<Enumerator>,
        /// `enum class`: labels live inside the enum's own scope.
        scoped: bool,
    },
    StdContainer {
        shape: ContainerShape,
        element: String,
        /// Mapped type of maps, second member of pairs.
        mapped: Option<String>,
    },
}

/// What a registered type is, and therefore how it is reflected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReflectorKind {
    Typedef { target: String },
    Custom { body: String },
    Object { is_abstract: bool },
    Value(ValueKind),
}

impl ReflectorKind {
    /// Short human-readable name of the kind, used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            ReflectorKind::Typedef { .. } => "typedef",
            ReflectorKind::Custom { .. } => "custom reflector",
            ReflectorKind::Object { .. } => "object type",
            ReflectorKind::Value(ValueKind::Plain) => "value type",
            ReflectorKind::Value(ValueKind::Enum { .. }) => "enumeration",
            ReflectorKind::Value(ValueKind::StdContainer { .. }) => "STL container",
        }
    }

    /// Whether two kinds describe the same registration.
    ///
    /// Object types compare without their abstract flag, which consolidation
    /// may raise after the first registration.
    pub(crate) fn same_registration(&self, other: &ReflectorKind) -> bool {
        match (self, other) {
            (ReflectorKind::Object { .. }, ReflectorKind::Object { .. }) => true,
            _ => self == other,
        }
    }
}

/// Why a base link could not be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseDefect {
    /// No registered type has this name.
    Missing,
    /// Following the edge would close an inheritance cycle; the edge was dropped.
    Cycle,
}

/// Where a base reference points once consolidation is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseTarget {
    Unresolved,
    Resolved(TypeId),
    /// Not in the index, but configured as known to the reflection runtime.
    External,
    Invalid(BaseDefect),
}

/// A direct base-class reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseLink {
    /// Base name as written in the declaration (normalized).
    pub name: String,
    pub access: Access,
    pub is_virtual: bool,
    pub target: BaseTarget,
}

impl BaseLink {
    pub fn new(name: impl Into<String>, access: Access, is_virtual: bool) -> Self {
        Self {
            name: type_names::normalize(&name.into()),
            access,
            is_virtual,
            target: BaseTarget::Unresolved,
        }
    }

    pub fn public(name: impl Into<String>) -> Self {
        Self::new(name, Access::Public, false)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.target, BaseTarget::Invalid(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Virtuality {
    NonVirtual,
    Virtual,
    PureVirtual,
}

impl Virtuality {
    pub fn from_doxygen(virt: &str) -> Self {
        match virt {
            "virtual" => Virtuality::Virtual,
            "pure-virtual" => Virtuality::PureVirtual,
            _ => Virtuality::NonVirtual,
        }
    }
}

/// Registered methods are never private.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodVisibility {
    Public,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub ty: String,
    pub name: String,
    pub default: Option<String>,
}

impl Parameter {
    pub fn new(ty: impl AsRef<str>, name: impl Into<String>) -> Self {
        Self {
            ty: type_names::normalize(ty.as_ref()),
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Override identity of a method: name, parameter value types and constness.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
    pub name: String,
    pub params: Vec<String>,
    pub is_const: bool,
}

impl Signature {
    pub fn new<S: AsRef<str>>(name: impl Into<String>, params: &[S], is_const: bool) -> Self {
        Self {
            name: name.into(),
            params: params
                .iter()
                .map(|p| type_names::normalize(p.as_ref()))
                .collect(),
            is_const,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))?;
        if self.is_const {
            f.write_str(" const")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub params: Vec<Parameter>,
    /// `None` for constructors.
    pub return_type: Option<String>,
    pub is_constructor: bool,
    pub is_static: bool,
    pub is_const: bool,
    pub is_explicit: bool,
    pub virtuality: Virtuality,
    pub visibility: MethodVisibility,
    /// Set when the declaration index inlined this member from a base class.
    pub declared_in: Option<String>,
}

impl MethodDescriptor {
    /// A public, non-virtual, non-const instance method.
    pub fn new(name: impl Into<String>, return_type: impl AsRef<str>, params: Vec<Parameter>) -> Self {
        Self {
            name: name.into(),
            params,
            return_type: Some(type_names::normalize(return_type.as_ref())),
            is_constructor: false,
            is_static: false,
            is_const: false,
            is_explicit: false,
            virtuality: Virtuality::NonVirtual,
            visibility: MethodVisibility::Public,
            declared_in: None,
        }
    }

    pub fn constructor(name: impl Into<String>, params: Vec<Parameter>) -> Self {
        Self {
            return_type: None,
            is_constructor: true,
            ..Self::new(name, "", params)
        }
    }

    pub fn with_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_virtuality(mut self, virtuality: Virtuality) -> Self {
        self.virtuality = virtuality;
        self
    }

    pub fn with_visibility(mut self, visibility: MethodVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn signature(&self) -> Signature {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| type_names::value_type(&p.ty))
            .collect();
        Signature::new(self.name.clone(), &params, self.is_const)
    }

    pub fn return_type(&self) -> &str {
        self.return_type.as_deref().unwrap_or("")
    }

    pub fn has_defaults(&self) -> bool {
        self.params.iter().any(|p| p.default.is_some())
    }

    /// Deterministic identifier of the generated method wrapper.
    ///
    /// Property declarations refer to their accessors by this id.
    pub fn wrapper_id(&self) -> String {
        let mut id = format!("__{}__{}", type_names::mangle(self.return_type()), self.name);
        for param in &self.params {
            id.push_str("__");
            id.push_str(&type_names::mangle(&param.ty));
        }
        if self.is_const && !self.is_constructor {
            id.push_str("__const");
        }
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyShape {
    Simple,
    Array,
    Indexed,
}

/// `Public` properties are public data members read and written in place;
/// `NonPublic` ones are only reachable through accessor methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyVisibility {
    Public,
    NonPublic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub shape: PropertyShape,
    pub visibility: PropertyVisibility,
    /// Value type; the element type for array and indexed properties.
    pub ty: String,
    /// Key type of indexed properties, position type of array properties.
    pub index_type: Option<String>,
    pub getter: Option<Signature>,
    pub setter: Option<Signature>,
    pub counter: Option<Signature>,
    pub adder: Option<Signature>,
    pub inserter: Option<Signature>,
    pub remover: Option<Signature>,
    pub declared_in: Option<String>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, shape: PropertyShape, ty: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            shape,
            visibility: PropertyVisibility::NonPublic,
            ty: type_names::normalize(ty.as_ref()),
            index_type: None,
            getter: None,
            setter: None,
            counter: None,
            adder: None,
            inserter: None,
            remover: None,
            declared_in: None,
        }
    }

    /// A public data member exposed as a simple property.
    pub fn field(name: impl Into<String>, ty: impl AsRef<str>) -> Self {
        Self {
            visibility: PropertyVisibility::Public,
            ..Self::new(name, PropertyShape::Simple, ty)
        }
    }

    pub fn element_type(&self) -> Option<&str> {
        match self.shape {
            PropertyShape::Simple => None,
            PropertyShape::Array | PropertyShape::Indexed => Some(&self.ty),
        }
    }

    /// Every accessor this property refers to.
    pub fn accessors(&self) -> impl Iterator<Item = &Signature> {
        [
            &self.getter,
            &self.setter,
            &self.counter,
            &self.adder,
            &self.inserter,
            &self.remover,
        ]
        .into_iter()
        .flatten()
    }
}

/// Everything the generator needs to know about one registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectorDescriptor {
    pub qualified_name: String,
    pub kind: ReflectorKind,
    pub bases: Vec<BaseLink>,
    pub methods: Vec<MethodDescriptor>,
    pub properties: Vec<PropertyDescriptor>,
    pub state: ResolutionState,
    pub eligible: bool,
    /// Header that declares the type, as it should be `#include`d.
    pub header: Option<String>,
    pub is_template: bool,
    /// Access of a nested type inside its enclosing class.
    pub access: Access,
    /// Pure virtual methods declared by this type, whatever their access.
    pub(crate) pure_virtuals: BTreeSet<Signature>,
    /// Non-pure methods declared by this type, whatever their access.
    pub(crate) implemented: BTreeSet<Signature>,
    /// Pure virtuals reachable from this type that nothing overrides.
    pub(crate) unimplemented: BTreeSet<Signature>,
}

impl ReflectorDescriptor {
    pub fn new(qualified_name: impl AsRef<str>, kind: ReflectorKind) -> Self {
        Self {
            qualified_name: type_names::normalize(qualified_name.as_ref()),
            kind,
            bases: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            state: ResolutionState::Unresolved,
            eligible: false,
            header: None,
            is_template: false,
            access: Access::Public,
            pure_virtuals: BTreeSet::new(),
            implemented: BTreeSet::new(),
            unimplemented: BTreeSet::new(),
        }
    }

    pub fn object(qualified_name: impl AsRef<str>) -> Self {
        Self::new(qualified_name, ReflectorKind::Object { is_abstract: false })
    }

    pub fn with_base(mut self, base: BaseLink) -> Self {
        self.bases.push(base);
        self
    }

    /// Add a method, recording it for the abstractness check.
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.add_method(method);
        self
    }

    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn add_method(&mut self, method: MethodDescriptor) {
        if method.declared_in.is_none() && !method.is_constructor && !method.is_static {
            self.record_signature(method.signature(), method.virtuality);
        }
        self.methods.push(method);
    }

    /// Record an own method signature without registering a wrapper for it
    /// (private methods still override pure virtuals).
    pub fn record_signature(&mut self, signature: Signature, virtuality: Virtuality) {
        if virtuality == Virtuality::PureVirtual {
            self.pure_virtuals.insert(signature);
        } else {
            self.implemented.insert(signature);
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, ReflectorKind::Object { is_abstract: true })
    }

    /// Pure virtual methods this type leaves without an implementation.
    pub fn unimplemented_abstract(&self) -> impl Iterator<Item = &Signature> {
        self.unimplemented.iter()
    }

    /// Whether the generator will emit member wrappers for this kind.
    pub fn has_members(&self) -> bool {
        matches!(
            self.kind,
            ReflectorKind::Object { .. } | ReflectorKind::Value(ValueKind::Plain)
        )
    }

    /// Methods that end up in the generated unit: constructors of abstract
    /// types cannot be wrapped.
    pub fn wrapped_methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        let is_abstract = self.is_abstract();
        let has_members = self.has_members();
        self.methods
            .iter()
            .filter(move |m| has_members && !(is_abstract && m.is_constructor))
    }

    pub fn wrapped_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        let has_members = self.has_members();
        self.properties.iter().filter(move |_| has_members)
    }

    /// Find a method by override signature.
    pub fn method(&self, signature: &Signature) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.signature() == *signature)
    }

    /// Scope in which names used by this type's declaration are looked up.
    pub fn scope(&self) -> Option<&str> {
        type_names::scope_of(&self.qualified_name)
    }
}

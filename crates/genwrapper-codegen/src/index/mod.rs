//! Declaration index: the pre-extracted description of the C++ library.
//!
//! The builder only sees the [`DeclarationIndex`] trait. [`DoxygenIndex`]
//! reads a Doxygen XML export; [`MemoryIndex`] holds declarations built in
//! code, which is what the tests use.

mod doxygen;
mod xml;

pub use doxygen::DoxygenIndex;

use crate::error::IndexError;
use crate::types::{Access, Virtuality};

/// Opaque reference to one compound of an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundHandle(pub(crate) String);

impl CompoundHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundKind {
    Class,
    Struct,
    Union,
    Namespace,
}

impl CompoundKind {
    pub fn from_doxygen(kind: &str) -> Option<Self> {
        match kind {
            "class" => Some(CompoundKind::Class),
            "struct" => Some(CompoundKind::Struct),
            "union" => Some(CompoundKind::Union),
            "namespace" => Some(CompoundKind::Namespace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseDecl {
    pub name: String,
    pub access: Access,
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub ty: String,
    pub name: Option<String>,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumeratorDecl {
    pub name: String,
    /// Initializer text without the leading `=`.
    pub initializer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Function {
        return_type: String,
        params: Vec<ParamDecl>,
        is_const: bool,
        is_explicit: bool,
        virtuality: Virtuality,
    },
    Variable {
        ty: String,
    },
    Enum {
        enumerators: Vec<EnumeratorDecl>,
        scoped: bool,
    },
    Typedef {
        target: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecl {
    pub name: String,
    pub kind: MemberKind,
    pub access: Access,
    pub is_static: bool,
    /// Qualified name of the compound that really declares this member,
    /// when the index copied it in from a base class.
    pub declared_in: Option<String>,
    /// Header declaring the member, for enums and typedefs at namespace scope.
    pub header: Option<String>,
}

impl MemberDecl {
    pub fn function(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Function {
                return_type: return_type.into(),
                params: Vec::new(),
                is_const: false,
                is_explicit: false,
                virtuality: Virtuality::NonVirtual,
            },
            access: Access::Public,
            is_static: false,
            declared_in: None,
            header: None,
        }
    }

    pub fn variable(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Variable { ty: ty.into() },
            access: Access::Public,
            is_static: false,
            declared_in: None,
            header: None,
        }
    }

    pub fn enumeration(name: impl Into<String>, enumerators: &[(&str, Option<&str>)]) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Enum {
                enumerators: enumerators
                    .iter()
                    .map(|(n, init)| EnumeratorDecl {
                        name: n.to_string(),
                        initializer: init.map(str::to_string),
                    })
                    .collect(),
                scoped: false,
            },
            access: Access::Public,
            is_static: false,
            declared_in: None,
            header: None,
        }
    }

    pub fn typedef(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Typedef {
                target: target.into(),
            },
            access: Access::Public,
            is_static: false,
            declared_in: None,
            header: None,
        }
    }

    /// Append a parameter to a function member.
    pub fn param(mut self, ty: &str, name: &str) -> Self {
        if let MemberKind::Function { params, .. } = &mut self.kind {
            params.push(ParamDecl {
                ty: ty.to_string(),
                name: (!name.is_empty()).then(|| name.to_string()),
                default: None,
            });
        }
        self
    }

    /// Give the last parameter of a function member a default value.
    pub fn default_value(mut self, default: &str) -> Self {
        if let MemberKind::Function { params, .. } = &mut self.kind
            && let Some(last) = params.last_mut()
        {
            last.default = Some(default.to_string());
        }
        self
    }

    pub fn constant(mut self) -> Self {
        if let MemberKind::Function { is_const, .. } = &mut self.kind {
            *is_const = true;
        }
        self
    }

    pub fn virtuality(mut self, value: Virtuality) -> Self {
        if let MemberKind::Function { virtuality, .. } = &mut self.kind {
            *virtuality = value;
        }
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn inherited_from(mut self, owner: impl Into<String>) -> Self {
        self.declared_in = Some(owner.into());
        self
    }
}

/// Declaration shape of one compound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundDecl {
    pub name: String,
    pub kind: CompoundKind,
    pub access: Access,
    /// Declared abstract by the index itself.
    pub is_abstract: bool,
    pub template_params: Vec<String>,
    pub header: Option<String>,
    pub bases: Vec<BaseDecl>,
    pub members: Vec<MemberDecl>,
}

impl CompoundDecl {
    pub fn new(name: impl Into<String>, kind: CompoundKind) -> Self {
        Self {
            name: name.into(),
            kind,
            access: Access::Public,
            is_abstract: false,
            template_params: Vec::new(),
            header: None,
            bases: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, CompoundKind::Class)
    }

    pub fn namespace(name: impl Into<String>) -> Self {
        Self::new(name, CompoundKind::Namespace)
    }

    pub fn base(mut self, name: &str) -> Self {
        self.bases.push(BaseDecl {
            name: name.to_string(),
            access: Access::Public,
            is_virtual: false,
        });
        self
    }

    pub fn member(mut self, member: MemberDecl) -> Self {
        self.members.push(member);
        self
    }

    pub fn header(mut self, header: &str) -> Self {
        self.header = Some(header.to_string());
        self
    }

    pub fn is_template(&self) -> bool {
        !self.template_params.is_empty()
    }
}

/// Read access to a fully materialized declaration index.
pub trait DeclarationIndex {
    /// Every compound reachable from the index root, in index order.
    fn list_compounds(&self) -> Vec<CompoundHandle>;

    /// Declaration shape of one compound.
    fn resolve_node(&self, handle: &CompoundHandle) -> Result<CompoundDecl, IndexError>;
}

/// A declaration index assembled in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    compounds: Vec<CompoundDecl>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, compound: CompoundDecl) -> &mut Self {
        self.compounds.push(compound);
        self
    }
}

impl FromIterator<CompoundDecl> for MemoryIndex {
    fn from_iter<I: IntoIterator<Item = CompoundDecl>>(iter: I) -> Self {
        Self {
            compounds: iter.into_iter().collect(),
        }
    }
}

impl DeclarationIndex for MemoryIndex {
    fn list_compounds(&self) -> Vec<CompoundHandle> {
        (0..self.compounds.len())
            .map(|i| CompoundHandle(i.to_string()))
            .collect()
    }

    fn resolve_node(&self, handle: &CompoundHandle) -> Result<CompoundDecl, IndexError> {
        handle
            .0
            .parse::<usize>()
            .ok()
            .and_then(|i| self.compounds.get(i))
            .cloned()
            .ok_or_else(|| IndexError::UnknownHandle(handle.0.clone()))
    }
}

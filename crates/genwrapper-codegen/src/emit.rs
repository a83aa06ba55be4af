//! Rendering of one reflector source unit.

use std::fmt::Write as _;

use crate::registry::TypeRegistry;
use crate::type_names;
use crate::types::{
    Access, BaseTarget, ContainerShape, MethodDescriptor, MethodVisibility, Parameter,
    PropertyDescriptor, PropertyShape, PropertyVisibility, ReflectorDescriptor, ReflectorKind,
    ValueKind, Virtuality,
};

const BANNER: &str = "\
// ***************************************************************************
//
//   Generated automatically by genwrapper.
//   Please DO NOT EDIT this file!
//
// ***************************************************************************
";

const RUNTIME_HEADERS: [&str; 4] = [
    "osgIntrospection/ReflectionMacros",
    "osgIntrospection/TypedMethodInfo",
    "osgIntrospection/StaticMethodInfo",
    "osgIntrospection/Attributes",
];

const IN_OUT_GUARD: &str = "\
// Must undefine IN and OUT macros defined in Windows headers
#ifdef IN
#undef IN
#endif
#ifdef OUT
#undef OUT
#endif
";

fn container_reflector_header(shape: ContainerShape) -> &'static str {
    match shape {
        ContainerShape::Vector | ContainerShape::Deque => "osgIntrospection/StdVectorReflector",
        ContainerShape::List => "osgIntrospection/StdListReflector",
        ContainerShape::Set | ContainerShape::MultiSet => "osgIntrospection/StdSetReflector",
        ContainerShape::Map | ContainerShape::MultiMap => "osgIntrospection/StdMapReflector",
        ContainerShape::Pair => "osgIntrospection/StdPairReflector",
    }
}

fn virtuality_flag(virtuality: Virtuality) -> &'static str {
    match virtuality {
        Virtuality::NonVirtual => "Properties::NON_VIRTUAL",
        Virtuality::Virtual => "Properties::VIRTUAL",
        Virtuality::PureVirtual => "Properties::PURE_VIRTUAL",
    }
}

/// Text of one unit under construction.
struct Unit<'a> {
    registry: &'a TypeRegistry,
    includes: Vec<String>,
    /// `typedef`s for type names that contain commas, which macros cannot take.
    aliases: Vec<(String, String)>,
    body: String,
}

impl<'a> Unit<'a> {
    fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            includes: RUNTIME_HEADERS.iter().map(|h| h.to_string()).collect(),
            aliases: Vec::new(),
            body: String::new(),
        }
    }

    fn include(&mut self, header: &str) {
        if !self.includes.iter().any(|h| h == header) {
            self.includes.push(header.to_string());
        }
    }

    /// Include the declaring header of every registered type `ty` mentions.
    fn include_type(&mut self, ty: &str) {
        let base = type_names::value_type(ty)
            .trim_end_matches(['*', ' '])
            .to_string();
        if let Some(header) = self
            .registry
            .resolve(None, &base)
            .and_then(|id| self.registry.get(id))
            .and_then(|d| d.header.clone())
        {
            self.include(&header);
        }
    }

    /// Spelling of `ty` usable as a macro argument.
    fn macro_type(&mut self, ty: &str) -> String {
        if !ty.contains(',') {
            return ty.to_string();
        }
        if let Some((_, alias)) = self.aliases.iter().find(|(t, _)| t == ty) {
            return alias.clone();
        }
        let base = type_names::file_stem(ty);
        let mut alias = base.clone();
        let mut n = 2;
        while self.aliases.iter().any(|(_, a)| *a == alias) {
            alias = format!("{base}_{n}");
            n += 1;
        }
        self.aliases.push((ty.to_string(), alias.clone()));
        alias
    }

    fn line(&mut self, text: &str) {
        self.body.push('\t');
        self.body.push_str(text);
        self.body.push('\n');
    }

    fn params(&mut self, params: &[Parameter], with_defaults: bool) -> Vec<String> {
        let mut args = Vec::new();
        for (i, param) in params.iter().enumerate() {
            let direction = if type_names::is_inout(&param.ty) { "INOUT" } else { "IN" };
            let name = if param.name.is_empty() {
                format!("x{i}")
            } else {
                param.name.clone()
            };
            let mut arg = format!("{direction}, {}, {name}", self.macro_type(&param.ty));
            if with_defaults {
                let _ = write!(arg, ", {}", param.default.as_deref().unwrap_or(""));
            }
            args.push(arg);
        }
        args
    }

    fn constructor(&mut self, method: &MethodDescriptor) {
        let with_defaults = method.has_defaults();
        let mut args = self.params(&method.params, with_defaults);
        args.push(
            if method.is_explicit {
                "Properties::EXPLICIT"
            } else {
                "Properties::NON_EXPLICIT"
            }
            .to_string(),
        );
        args.push(method.wrapper_id());
        args.push("\"\"".to_string());
        args.push("\"\"".to_string());
        let name = if with_defaults {
            "I_ConstructorWithDefaults"
        } else {
            "I_Constructor"
        };
        self.line(&format!("{name}{}({});", method.params.len(), args.join(", ")));
    }

    fn method(&mut self, method: &MethodDescriptor) {
        let with_defaults = method.has_defaults();
        let ret = self.macro_type(method.return_type());
        let mut args = vec![ret, method.name.clone()];
        args.extend(self.params(&method.params, with_defaults));

        let macro_name = if method.is_static {
            "I_StaticMethod"
        } else if method.visibility == MethodVisibility::Protected {
            args.push(virtuality_flag(method.virtuality).to_string());
            args.push(
                if method.is_const {
                    "Properties::CONST"
                } else {
                    "Properties::NON_CONST"
                }
                .to_string(),
            );
            "I_ProtectedMethod"
        } else {
            args.push(virtuality_flag(method.virtuality).to_string());
            "I_Method"
        };
        args.push(method.wrapper_id());
        args.push("\"\"".to_string());
        args.push("\"\"".to_string());

        let suffix = if with_defaults { "WithDefaults" } else { "" };
        self.line(&format!(
            "{macro_name}{suffix}{}({});",
            method.params.len(),
            args.join(", ")
        ));
    }

    fn property(&mut self, descriptor: &ReflectorDescriptor, property: &PropertyDescriptor) {
        let ty = self.macro_type(&property.ty);
        let id = |accessor: &Option<crate::types::Signature>| {
            accessor
                .as_ref()
                .and_then(|sig| descriptor.method(sig))
                .map_or_else(|| "0".to_string(), MethodDescriptor::wrapper_id)
        };

        let line = match (property.visibility, property.shape) {
            (PropertyVisibility::Public, _) => {
                format!("I_PublicMemberProperty({ty}, {});", property.name)
            }
            (PropertyVisibility::NonPublic, PropertyShape::Simple) => format!(
                "I_SimpleProperty({ty}, {}, {}, {});",
                property.name,
                id(&property.getter),
                id(&property.setter)
            ),
            (PropertyVisibility::NonPublic, PropertyShape::Array) => format!(
                "I_ArrayProperty({ty}, {}, {}, {}, {}, {}, {}, {});",
                property.name,
                id(&property.getter),
                id(&property.setter),
                id(&property.counter),
                id(&property.adder),
                id(&property.inserter),
                id(&property.remover)
            ),
            (PropertyVisibility::NonPublic, PropertyShape::Indexed) => {
                let index = property.index_type.clone().unwrap_or_default();
                let index = self.macro_type(&index);
                format!(
                    "I_IndexedProperty({ty}, {}, {index}, {}, {});",
                    property.name,
                    id(&property.getter),
                    id(&property.setter)
                )
            }
        };
        self.line(&line);
    }

    fn members(&mut self, descriptor: &ReflectorDescriptor) {
        if let Some(header) = &descriptor.header {
            self.line(&format!("I_DeclaringFile(\"{header}\");"));
        }

        if matches!(descriptor.kind, ReflectorKind::Object { .. }) {
            for base in descriptor.bases.iter().filter(|b| b.access == Access::Public) {
                let name = match base.target {
                    BaseTarget::Resolved(id) => self.registry[id].qualified_name.clone(),
                    BaseTarget::External => base.name.clone(),
                    BaseTarget::Unresolved | BaseTarget::Invalid(_) => continue,
                };
                self.include_type(&name);
                let name = self.macro_type(&name);
                let macro_name = if base.is_virtual {
                    "I_VirtualBaseType"
                } else {
                    "I_BaseType"
                };
                self.line(&format!("{macro_name}({name});"));
            }
        }

        let methods: Vec<&MethodDescriptor> = descriptor.wrapped_methods().collect();
        for method in methods.iter().filter(|m| m.is_constructor) {
            for param in &method.params {
                self.include_type(&param.ty);
            }
            self.constructor(method);
        }

        let mut overloads: Vec<&str> = Vec::new();
        for method in methods.iter().filter(|m| !m.is_constructor) {
            if !overloads.contains(&method.name.as_str()) {
                overloads.push(&method.name);
            }
        }
        for name in overloads {
            for method in methods.iter().filter(|m| !m.is_constructor && m.name == name) {
                self.include_type(method.return_type());
                for param in &method.params {
                    self.include_type(&param.ty);
                }
                self.method(method);
            }
        }

        for property in descriptor.wrapped_properties() {
            self.include_type(&property.ty);
            self.property(descriptor, property);
        }
    }

    fn reflector(&mut self, descriptor: &ReflectorDescriptor) {
        let name = descriptor.qualified_name.clone();
        match &descriptor.kind {
            ReflectorKind::Custom { body } => {
                self.body.push_str(body.trim_end());
                self.body.push('\n');
            }
            ReflectorKind::Typedef { target } => {
                self.include_type(target);
                if let Some((shape, _)) = type_names::std_container(target) {
                    self.include(shape.header());
                }
                let target = self.macro_type(target);
                let _ = writeln!(self.body, "TYPE_NAME_ALIAS({target}, {name})");
            }
            ReflectorKind::Value(ValueKind::StdContainer {
                shape,
                element,
                mapped,
            }) => {
                self.include(container_reflector_header(*shape));
                self.include(shape.header());
                self.include_type(element);
                if let Some(mapped) = mapped {
                    self.include_type(mapped);
                }
                let name = self.macro_type(&name);
                let _ = writeln!(self.body, "{}({name})", shape.reflector_macro());
            }
            ReflectorKind::Value(ValueKind::Enum {
                enumerators,
                scoped,
            }) => {
                let _ = writeln!(self.body, "BEGIN_ENUM_REFLECTOR({name})");
                if let Some(header) = &descriptor.header {
                    self.line(&format!("I_DeclaringFile(\"{header}\");"));
                }
                let scope = if *scoped {
                    Some(name.as_str())
                } else {
                    type_names::scope_of(&name)
                };
                let mut seen = Vec::new();
                for enumerator in enumerators {
                    if seen.contains(&enumerator.value) {
                        continue;
                    }
                    seen.push(enumerator.value);
                    let label = match scope {
                        Some(scope) => format!("{scope}::{}", enumerator.name),
                        None => enumerator.name.clone(),
                    };
                    self.line(&format!("I_EnumLabel({label});"));
                }
                self.body.push_str("END_REFLECTOR\n");
            }
            ReflectorKind::Object { is_abstract } => {
                let macro_name = if *is_abstract {
                    "BEGIN_ABSTRACT_OBJECT_REFLECTOR"
                } else {
                    "BEGIN_OBJECT_REFLECTOR"
                };
                let begin_name = self.macro_type(&name);
                let _ = writeln!(self.body, "{macro_name}({begin_name})");
                self.members(descriptor);
                self.body.push_str("END_REFLECTOR\n");
            }
            ReflectorKind::Value(ValueKind::Plain) => {
                let begin_name = self.macro_type(&name);
                let _ = writeln!(self.body, "BEGIN_VALUE_REFLECTOR({begin_name})");
                self.members(descriptor);
                self.body.push_str("END_REFLECTOR\n");
            }
        }
    }

    fn finish(self) -> String {
        let mut out = String::from(BANNER);
        out.push('\n');
        for header in &self.includes {
            let _ = writeln!(out, "#include <{header}>");
        }
        out.push('\n');
        out.push_str(IN_OUT_GUARD);
        out.push('\n');
        if !self.aliases.is_empty() {
            for (ty, alias) in &self.aliases {
                let _ = writeln!(out, "typedef {ty} {alias};");
            }
            out.push('\n');
        }
        out.push_str(&self.body);
        out
    }
}

/// Render the complete source unit of one consolidated descriptor.
pub fn render_unit(descriptor: &ReflectorDescriptor, registry: &TypeRegistry) -> String {
    let mut unit = Unit::new(registry);
    if let Some(header) = &descriptor.header {
        unit.include(header);
    }
    unit.reflector(descriptor);
    unit.finish()
}

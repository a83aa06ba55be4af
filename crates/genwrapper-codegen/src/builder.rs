//! Populates a [`TypeRegistry`] from a [`DeclarationIndex`].
//!
//! Building only records what each compound declares. Base names stay
//! unresolved and abstractness is left as declared; both are settled by
//! [`TypeRegistry::consolidate`] once every type is known.

use std::collections::HashMap;

use crate::config::Configuration;
use crate::enum_value;
use crate::index::{
    CompoundDecl, CompoundKind, DeclarationIndex, EnumeratorDecl, MemberDecl, MemberKind,
};
use crate::notify::Notifier;
use crate::properties::infer_properties;
use crate::registry::TypeRegistry;
use crate::type_names;
use crate::types::{
    Access, BaseLink, Enumerator, MethodDescriptor, MethodVisibility, Parameter,
    PropertyDescriptor, ReflectorDescriptor, ReflectorKind, ResolutionState, ValueKind,
};

/// Reads every compound of an index into a fresh registry.
pub struct RegistryBuilder<'a> {
    index: &'a dyn DeclarationIndex,
    config: &'a Configuration,
    notifier: Notifier,
}

fn is_operator(name: &str) -> bool {
    name.strip_prefix("operator")
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

impl<'a> RegistryBuilder<'a> {
    pub fn new(index: &'a dyn DeclarationIndex, config: &'a Configuration, notifier: Notifier) -> Self {
        Self {
            index,
            config,
            notifier,
        }
    }

    /// Register every type the index declares.
    ///
    /// A compound that cannot be read is skipped with a warning; the
    /// returned registry still has to be consolidated.
    pub fn build(&self) -> TypeRegistry {
        self.notifier.notice("building type registry");
        let mut registry = TypeRegistry::new(self.notifier.clone());

        for handle in self.index.list_compounds() {
            match self.index.resolve_node(&handle) {
                Ok(compound) => self.add_compound(&mut registry, compound),
                Err(err) => self
                    .notifier
                    .warning(format_args!("skipping compound `{}`: {err}", handle.as_str())),
            }
        }

        self.notifier
            .info(format_args!("{} types registered", registry.len()));
        registry
    }

    fn register(&self, registry: &mut TypeRegistry, mut descriptor: ReflectorDescriptor) {
        descriptor.state = ResolutionState::Building;
        let name = descriptor.qualified_name.clone();
        match registry.register(descriptor) {
            Ok(_) => self.notifier.debug(format_args!("registered `{name}`")),
            Err(err) => self.notifier.warning(err),
        }
    }

    fn add_compound(&self, registry: &mut TypeRegistry, compound: CompoundDecl) {
        match compound.kind {
            CompoundKind::Namespace => {
                let scope = type_names::normalize(&compound.name);
                for member in &compound.members {
                    let header = member.header.clone().or_else(|| compound.header.clone());
                    self.add_nested(registry, &scope, member, header);
                }
            }
            CompoundKind::Class | CompoundKind::Struct | CompoundKind::Union => {
                self.add_class(registry, compound);
            }
        }
    }

    /// Enums and typedefs declared inside a namespace or a class.
    fn add_nested(
        &self,
        registry: &mut TypeRegistry,
        scope: &str,
        member: &MemberDecl,
        header: Option<String>,
    ) {
        if member.declared_in.is_some() {
            return;
        }
        let qualified = if scope.is_empty() {
            member.name.clone()
        } else {
            format!("{scope}::{}", member.name)
        };

        let mut descriptor = match &member.kind {
            MemberKind::Enum {
                enumerators,
                scoped,
            } => ReflectorDescriptor::new(
                &qualified,
                ReflectorKind::Value(ValueKind::Enum {
                    enumerators: self.evaluate_enumerators(&qualified, enumerators),
                    scoped: *scoped,
                }),
            ),
            MemberKind::Typedef { target } => {
                let target = type_names::normalize(target);
                if target.contains('(') || target == member.name || target == qualified {
                    return;
                }
                self.register_uses(registry, &target);
                ReflectorDescriptor::new(&qualified, ReflectorKind::Typedef { target })
            }
            MemberKind::Function { .. } | MemberKind::Variable { .. } => return,
        };
        if let Some(body) = self.config.custom_reflector_body(&descriptor.qualified_name) {
            descriptor.kind = ReflectorKind::Custom {
                body: body.to_string(),
            };
        }
        descriptor.header = header;
        descriptor.access = member.access;
        self.register(registry, descriptor);
    }

    fn evaluate_enumerators(&self, enum_name: &str, decls: &[EnumeratorDecl]) -> Vec<Enumerator> {
        let mut known = HashMap::new();
        let mut previous: Option<i64> = None;
        let mut enumerators = Vec::with_capacity(decls.len());

        for decl in decls {
            let next = previous.map_or(0, |p| p.wrapping_add(1));
            let value = match &decl.initializer {
                Some(expr) => enum_value::evaluate(expr, &known).unwrap_or_else(|| {
                    self.notifier.warning(format_args!(
                        "enum `{enum_name}`: cannot evaluate `{} = {expr}`, using {next}",
                        decl.name
                    ));
                    next
                }),
                None => next,
            };
            known.insert(decl.name.clone(), value);
            previous = Some(value);
            enumerators.push(Enumerator {
                name: decl.name.clone(),
                value,
            });
        }

        enumerators
    }

    fn class_kind(&self, name: &str, compound: &CompoundDecl) -> ReflectorKind {
        if let Some(body) = self.config.custom_reflector_body(name) {
            ReflectorKind::Custom {
                body: body.to_string(),
            }
        } else if let Some((shape, args)) = type_names::std_container(name) {
            ReflectorKind::Value(ValueKind::StdContainer {
                shape,
                element: args[0].clone(),
                mapped: args.get(1).cloned(),
            })
        } else if self.config.is_value_type(name) {
            ReflectorKind::Value(ValueKind::Plain)
        } else {
            ReflectorKind::Object {
                is_abstract: compound.is_abstract,
            }
        }
    }

    fn add_class(&self, registry: &mut TypeRegistry, compound: CompoundDecl) {
        let name = type_names::normalize(&compound.name);
        let mut descriptor = ReflectorDescriptor::new(&name, self.class_kind(&name, &compound));
        descriptor.header = compound.header.clone();
        descriptor.is_template = compound.is_template();
        descriptor.access = compound.access;
        for base in &compound.bases {
            descriptor
                .bases
                .push(BaseLink::new(&base.name, base.access, base.is_virtual));
        }

        let ctor_name = type_names::strip_template_args(&name);
        let ctor_name = type_names::last_segment(&ctor_name).to_string();
        let with_members = descriptor.has_members();
        let mut used = Vec::new();
        let mut fields = Vec::new();

        for member in &compound.members {
            match &member.kind {
                MemberKind::Function {
                    return_type,
                    params,
                    is_const,
                    is_explicit,
                    virtuality,
                } => {
                    if member.name.starts_with('~')
                        || params.iter().any(|p| p.ty.trim() == "...")
                    {
                        continue;
                    }
                    let is_constructor = member.name == ctor_name && return_type.trim().is_empty();
                    let params: Vec<Parameter> = params
                        .iter()
                        .map(|p| {
                            let param = Parameter::new(&p.ty, p.name.clone().unwrap_or_default());
                            match &p.default {
                                Some(default) => param.with_default(default.clone()),
                                None => param,
                            }
                        })
                        .collect();
                    let mut method = if is_constructor {
                        MethodDescriptor::constructor(&member.name, params)
                    } else {
                        MethodDescriptor::new(&member.name, return_type, params)
                    };
                    method.is_const = *is_const;
                    method.is_static = member.is_static;
                    method.is_explicit = *is_explicit;
                    method.virtuality = *virtuality;
                    method.declared_in = member.declared_in.clone();

                    let registrable = with_members && !is_operator(&member.name);
                    let visibility = match member.access {
                        Access::Public => Some(MethodVisibility::Public),
                        Access::Protected => Some(MethodVisibility::Protected),
                        Access::Private => None,
                    };
                    match visibility {
                        Some(visibility) if registrable => {
                            method.visibility = visibility;
                            used.push(method.return_type().to_string());
                            used.extend(method.params.iter().map(|p| p.ty.clone()));
                            descriptor.add_method(method);
                        }
                        _ => {
                            if !is_constructor && !member.is_static && member.declared_in.is_none() {
                                descriptor.record_signature(method.signature(), method.virtuality);
                            }
                        }
                    }
                }
                MemberKind::Variable { ty } => {
                    if !with_members
                        || member.access != Access::Public
                        || member.is_static
                        || ty.contains('[')
                    {
                        continue;
                    }
                    used.push(ty.clone());
                    let mut field = PropertyDescriptor::field(&member.name, ty);
                    field.declared_in = member.declared_in.clone();
                    fields.push(field);
                }
                MemberKind::Enum { .. } | MemberKind::Typedef { .. } => {
                    self.add_nested(registry, &name, member, compound.header.clone());
                }
            }
        }

        if with_members {
            let inference = infer_properties(&descriptor.methods, self.config.property_policy());
            for rejected in &inference.rejected {
                self.notifier.warning(format_args!("type `{name}`: {rejected}"));
            }
            descriptor.properties = inference.properties;
            descriptor.properties.extend(fields);
        }

        self.register(registry, descriptor);
        for ty in used {
            self.register_uses(registry, &ty);
        }
    }

    /// Register the types spelled in `ty` that no compound declares: standard
    /// containers and instantiations with a configured custom reflector.
    fn register_uses(&self, registry: &mut TypeRegistry, ty: &str) {
        self.register_containers(registry, ty);

        let mut found = Vec::new();
        type_names::collect_template_ids(ty, &mut found);
        for spelled in found {
            if registry.lookup(&spelled).is_some() {
                continue;
            }
            if let Some(body) = self.config.custom_reflector_body(&spelled) {
                let kind = ReflectorKind::Custom {
                    body: body.to_string(),
                };
                self.register(registry, ReflectorDescriptor::new(&spelled, kind));
            }
        }
    }

    fn register_containers(&self, registry: &mut TypeRegistry, ty: &str) {
        let mut found = Vec::new();
        type_names::collect_std_containers(ty, &mut found);
        for spelled in found {
            let Some((shape, args)) = type_names::std_container(&spelled) else {
                continue;
            };
            let kind = match self.config.custom_reflector_body(&spelled) {
                Some(body) => ReflectorKind::Custom {
                    body: body.to_string(),
                },
                None => ReflectorKind::Value(ValueKind::StdContainer {
                    shape,
                    element: args[0].clone(),
                    mapped: args.get(1).cloned(),
                }),
            };
            self.register(registry, ReflectorDescriptor::new(&spelled, kind));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;
    use crate::notify::{MemorySink, Verbosity};
    use crate::types::{ContainerShape, PropertyShape, PropertyVisibility, Virtuality};
    use std::sync::Arc;

    fn build(index: &MemoryIndex, config: &Configuration) -> TypeRegistry {
        RegistryBuilder::new(index, config, Notifier::silent()).build()
    }

    #[test]
    fn test_box_properties() {
        let index: MemoryIndex = [CompoundDecl::class("Box")
            .member(MemberDecl::function("Box", ""))
            .member(MemberDecl::function("getWidth", "int").constant())
            .member(MemberDecl::function("setWidth", "void").param("int", "width"))
            .member(MemberDecl::function("getHeight", "int").constant())]
        .into_iter()
        .collect();
        let registry = build(&index, &Configuration::new());

        let boxed = registry.find("Box").unwrap();
        assert_eq!(boxed.state, ResolutionState::Building);
        assert_eq!(boxed.methods.len(), 4);
        assert!(boxed.methods[0].is_constructor);

        let width = &boxed.properties[0];
        assert_eq!(width.name, "width");
        assert_eq!(width.shape, PropertyShape::Simple);
        assert!(width.getter.is_some() && width.setter.is_some());

        let height = &boxed.properties[1];
        assert_eq!(height.name, "height");
        assert!(height.setter.is_none());
    }

    #[test]
    fn test_members_filtered() {
        let index: MemoryIndex = [CompoundDecl::class("osg::Node")
            .member(MemberDecl::function("~Node", ""))
            .member(MemberDecl::function("operator=", "osg::Node &").param("const osg::Node &", "rhs"))
            .member(MemberDecl::function("printf", "void").param("const char *", "fmt").param("...", ""))
            .member(
                MemberDecl::function("traverse", "void")
                    .param("osg::NodeVisitor &", "nv")
                    .virtuality(Virtuality::Virtual),
            )
            .member(MemberDecl::function("dirtyBound", "void").access(Access::Protected))
            .member(MemberDecl::function("computeBound", "void").access(Access::Private))
            .member(MemberDecl::function("getGlobalDefault", "osg::Node *").static_member())
            .member(MemberDecl::variable("_secret", "int").access(Access::Private))
            .member(MemberDecl::variable("mask", "unsigned int"))
            .member(MemberDecl::variable("matrix", "float[16]"))]
        .into_iter()
        .collect();
        let registry = build(&index, &Configuration::new());

        let node = registry.find("osg::Node").unwrap();
        let names: Vec<&str> = node.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["traverse", "dirtyBound", "getGlobalDefault"]);
        assert_eq!(node.methods[1].visibility, MethodVisibility::Protected);
        assert!(node.methods[2].is_static);

        assert_eq!(node.properties.len(), 1);
        assert_eq!(node.properties[0].name, "mask");
        assert_eq!(node.properties[0].visibility, PropertyVisibility::Public);
    }

    #[test]
    fn test_private_override_counts_for_abstractness() {
        let index: MemoryIndex = [
            CompoundDecl::class("Shape").member(
                MemberDecl::function("area", "double")
                    .constant()
                    .virtuality(Virtuality::PureVirtual),
            ),
            CompoundDecl::class("Circle").base("Shape").member(
                MemberDecl::function("area", "double")
                    .constant()
                    .access(Access::Private),
            ),
        ]
        .into_iter()
        .collect();
        let mut registry = build(&index, &Configuration::new());
        registry.consolidate(&Configuration::new());

        assert!(registry.find("Shape").unwrap().is_abstract());
        let circle = registry.find("Circle").unwrap();
        assert!(!circle.is_abstract());
        assert!(circle.methods.is_empty());
    }

    #[test]
    fn test_nested_enum_values() {
        let index: MemoryIndex = [CompoundDecl::class("osg::StateAttribute")
            .header("osg/StateAttribute")
            .member(MemberDecl::enumeration(
                "Values",
                &[
                    ("OFF", Some("0x0")),
                    ("ON", Some("0x1")),
                    ("OVERRIDE", Some("0x2")),
                    ("PROTECTED", Some("ON << 2")),
                    ("INHERIT", None),
                    ("BROKEN", Some("sizeof(int)")),
                ],
            ))]
        .into_iter()
        .collect();

        let sink = Arc::new(MemorySink::new());
        let config = Configuration::new();
        let registry =
            RegistryBuilder::new(&index, &config, Notifier::new(Verbosity::Warning, sink.clone())).build();

        let values = registry.find("osg::StateAttribute::Values").unwrap();
        assert_eq!(values.header.as_deref(), Some("osg/StateAttribute"));
        let ReflectorKind::Value(ValueKind::Enum { enumerators, scoped }) = &values.kind else {
            panic!("expected an enum");
        };
        assert!(!scoped);
        let pairs: Vec<(&str, i64)> = enumerators.iter().map(|e| (e.name.as_str(), e.value)).collect();
        assert_eq!(
            pairs,
            vec![
                ("OFF", 0),
                ("ON", 1),
                ("OVERRIDE", 2),
                ("PROTECTED", 4),
                ("INHERIT", 5),
                ("BROKEN", 6),
            ]
        );
        assert_eq!(sink.messages(Verbosity::Warning).len(), 1);
    }

    #[test]
    fn test_namespace_members_and_containers() {
        let index: MemoryIndex = [CompoundDecl::namespace("osg")
            .member(MemberDecl::typedef("NodeList", "std::vector< osg::ref_ptr< osg::Node > >"))
            .member(MemberDecl::typedef("Callback", "void(*)(int)"))
            .member(MemberDecl::function("computeLocalToWorld", "osg::Matrix"))
            .member(MemberDecl::enumeration("Endian", &[("BigEndian", None), ("LittleEndian", None)]))]
        .into_iter()
        .collect();
        let registry = build(&index, &Configuration::new());

        assert!(matches!(
            registry.find("osg::NodeList").unwrap().kind,
            ReflectorKind::Typedef { .. }
        ));
        assert!(registry.find("osg::Callback").is_none());
        assert!(registry.find("osg::computeLocalToWorld").is_none());
        assert!(registry.find("osg::Endian").is_some());

        let list = registry
            .find("std::vector< osg::ref_ptr< osg::Node > >")
            .unwrap();
        assert_eq!(
            list.kind,
            ReflectorKind::Value(ValueKind::StdContainer {
                shape: ContainerShape::Vector,
                element: "osg::ref_ptr< osg::Node >".to_string(),
                mapped: None,
            })
        );
    }

    #[test]
    fn test_method_containers_registered_once() {
        let index: MemoryIndex = [CompoundDecl::class("osg::Group")
            .member(MemberDecl::function("getChildren", "const std::vector< osg::Node * > &").constant())
            .member(MemberDecl::function("setChildren", "void").param("const std::vector< osg::Node * > &", "c"))
            .member(
                MemberDecl::function("getDescriptions", "std::map< std::string, std::vector< int > >")
                    .constant(),
            )]
        .into_iter()
        .collect();
        let registry = build(&index, &Configuration::new());

        assert!(registry.find("std::vector< osg::Node * >").is_some());
        assert!(registry.find("std::map< std::string, std::vector< int > >").is_some());
        assert!(registry.find("std::vector< int >").is_some());
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_configured_kinds() {
        let index: MemoryIndex = [
            CompoundDecl::class("osg::Vec3f").member(MemberDecl::function("length", "float").constant()),
            CompoundDecl::class("osg::Matrixf").member(MemberDecl::function("identity", "void")),
        ]
        .into_iter()
        .collect();
        let mut config = Configuration::new();
        config.value_type("osg::Vec3.*").unwrap();
        config.custom_reflector("osg::Matrixf", "BEGIN_VALUE_REFLECTOR(osg::Matrixf)\nEND_REFLECTOR");
        let registry = build(&index, &config);

        let vec3 = registry.find("osg::Vec3f").unwrap();
        assert_eq!(vec3.kind, ReflectorKind::Value(ValueKind::Plain));
        assert_eq!(vec3.methods.len(), 1);

        let matrix = registry.find("osg::Matrixf").unwrap();
        assert!(matches!(matrix.kind, ReflectorKind::Custom { .. }));
        assert!(matrix.methods.is_empty());
    }

    #[test]
    fn test_custom_instantiation_from_signature() {
        let index: MemoryIndex = [
            CompoundDecl::class("osg::Observer")
                .member(MemberDecl::function("getTarget", "osg::ref_ptr<osg::Referenced>").constant())
                .member(MemberDecl::function("getOther", "osg::ref_ptr< osg::Object > *")),
            CompoundDecl::namespace("osg").member(MemberDecl::typedef(
                "RefList",
                "std::vector< osg::ref_ptr< osg::Referenced > >",
            )),
        ]
        .into_iter()
        .collect();
        let mut config = Configuration::new();
        config.custom_reflector(
            "osg::ref_ptr< osg::Referenced >",
            "BEGIN_VALUE_REFLECTOR(osg::ref_ptr< osg::Referenced >)\nEND_REFLECTOR\n",
        );
        let mut registry = build(&index, &config);
        registry.consolidate(&config);

        let ptr = registry.find("osg::ref_ptr< osg::Referenced >").unwrap();
        assert!(matches!(ptr.kind, ReflectorKind::Custom { .. }));
        assert!(ptr.eligible);
        assert!(registry.find("osg::ref_ptr< osg::Object >").is_none());
        assert!(registry.find("std::vector< osg::ref_ptr< osg::Referenced > >").is_some());
    }

    #[test]
    fn test_template_constructor_and_private_nested() {
        let mut template = CompoundDecl::class("osg::ref_ptr< T >")
            .member(MemberDecl::function("ref_ptr", "").param("T *", "ptr"))
            .member(MemberDecl::typedef("element_type", "T").access(Access::Private));
        template.template_params = vec!["typename T".to_string()];
        let index: MemoryIndex = [template].into_iter().collect();
        let mut registry = build(&index, &Configuration::new());

        let ptr = registry.find("osg::ref_ptr< T >").unwrap();
        assert!(ptr.is_template);
        assert!(ptr.methods[0].is_constructor);

        registry.consolidate(&Configuration::new());
        assert!(!registry.find("osg::ref_ptr< T >").unwrap().eligible);
        assert!(!registry.find("osg::ref_ptr< T >::element_type").unwrap().eligible);
    }

    #[test]
    fn test_conflicting_registration_keeps_first() {
        let index: MemoryIndex = [
            CompoundDecl::class("osg::Thing"),
            CompoundDecl::namespace("osg").member(MemberDecl::typedef("Thing", "int")),
        ]
        .into_iter()
        .collect();
        let sink = Arc::new(MemorySink::new());
        let config = Configuration::new();
        let registry =
            RegistryBuilder::new(&index, &config, Notifier::new(Verbosity::Warning, sink.clone())).build();

        assert!(matches!(
            registry.find("osg::Thing").unwrap().kind,
            ReflectorKind::Object { .. }
        ));
        assert!(sink.messages(Verbosity::Warning)[0].contains("already registered"));
    }
}

//! The type registry and its consolidation pass.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Index;

use crate::config::Configuration;
use crate::error::RegistryError;
use crate::notify::Notifier;
use crate::type_names;
use crate::types::{
    Access, BaseDefect, BaseTarget, ReflectorDescriptor, ReflectorKind, ResolutionState, Signature,
    TypeId, ValueKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Arena of reflector descriptors keyed by qualified name.
#[derive(Debug)]
pub struct TypeRegistry {
    descriptors: Vec<ReflectorDescriptor>,
    by_name: BTreeMap<String, TypeId>,
    /// Bases-before-derived order computed by the last consolidation.
    order: Vec<TypeId>,
    notifier: Notifier,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(Notifier::default())
    }
}

impl TypeRegistry {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            descriptors: Vec::new(),
            by_name: BTreeMap::new(),
            order: Vec::new(),
            notifier,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Insert a descriptor.
    ///
    /// Registering a name again with the same kind is a no-op that returns the
    /// existing id; the first registration wins.
    pub fn register(&mut self, descriptor: ReflectorDescriptor) -> Result<TypeId, RegistryError> {
        if let Some(&id) = self.by_name.get(&descriptor.qualified_name) {
            let existing = &self.descriptors[id.0];
            if existing.kind.same_registration(&descriptor.kind) {
                return Ok(id);
            }
            return Err(RegistryError::DuplicateType {
                name: descriptor.qualified_name,
                existing: existing.kind.label(),
                incoming: descriptor.kind.label(),
            });
        }

        let id = TypeId(self.descriptors.len());
        self.by_name.insert(descriptor.qualified_name.clone(), id);
        self.descriptors.push(descriptor);
        Ok(id)
    }

    pub fn lookup(&self, qualified_name: &str) -> Option<TypeId> {
        self.by_name.get(qualified_name).copied()
    }

    pub fn get(&self, id: TypeId) -> Option<&ReflectorDescriptor> {
        self.descriptors.get(id.0)
    }

    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut ReflectorDescriptor> {
        self.descriptors.get_mut(id.0)
    }

    /// Descriptor registered under `qualified_name`.
    pub fn find(&self, qualified_name: &str) -> Option<&ReflectorDescriptor> {
        self.lookup(qualified_name).and_then(|id| self.get(id))
    }

    /// All descriptors, ordered by qualified name.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &ReflectorDescriptor)> {
        self.by_name
            .values()
            .map(|&id| (id, &self.descriptors[id.0]))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Topological order (bases first) computed by [`consolidate`](Self::consolidate).
    pub fn topological_order(&self) -> &[TypeId] {
        &self.order
    }

    /// Resolve a type name as referenced from inside `from`.
    ///
    /// Enclosing scopes are tried innermost first, then the name with its
    /// template arguments removed.
    pub fn resolve(&self, from: Option<&str>, name: &str) -> Option<TypeId> {
        let name = type_names::normalize(name);
        let stripped = type_names::strip_template_args(&name);
        let mut spellings = vec![name.clone()];
        if stripped != name {
            spellings.push(stripped);
        }

        spellings.iter().find_map(|spelling| {
            type_names::scoped_candidates(from, spelling)
                .into_iter()
                .filter(|candidate| from != Some(candidate.as_str()) || *candidate == name)
                .find_map(|candidate| self.lookup(&candidate))
        })
    }

    /// Finalize every descriptor: resolve bases, propagate abstractness,
    /// drop shadowed inherited members, apply eligibility.
    ///
    /// Never fails. Types that cannot be completed end up `Invalid`.
    pub fn consolidate(&mut self, config: &Configuration) {
        self.notifier.notice("consolidating type registry");

        let mut marks = vec![Mark::Unvisited; self.descriptors.len()];
        self.order.clear();
        let roots: Vec<TypeId> = self.by_name.values().copied().collect();

        for root in roots {
            if marks[root.0] != Mark::Unvisited {
                continue;
            }
            marks[root.0] = Mark::InProgress;
            let mut stack: Vec<(TypeId, usize)> = vec![(root, 0)];

            while let Some((id, next)) = stack.last_mut().map(|(id, next)| (*id, next)) {
                if *next >= self.descriptors[id.0].bases.len() {
                    stack.pop();
                    self.finish(id, config);
                    marks[id.0] = Mark::Done;
                    self.order.push(id);
                    continue;
                }
                let index = *next;
                *next += 1;

                let target = self.link_base(id, index, config);
                let target = match target {
                    BaseTarget::Resolved(base) => match marks[base.0] {
                        Mark::Unvisited => {
                            marks[base.0] = Mark::InProgress;
                            stack.push((base, 0));
                            target
                        }
                        Mark::InProgress => {
                            let descriptor = &self.descriptors[id.0];
                            self.notifier.warning(format_args!(
                                "inheritance cycle: `{}` derives from `{}`; edge dropped",
                                descriptor.qualified_name, descriptor.bases[index].name
                            ));
                            BaseTarget::Invalid(BaseDefect::Cycle)
                        }
                        Mark::Done => target,
                    },
                    other => other,
                };
                self.descriptors[id.0].bases[index].target = target;
            }
        }

        let invalid = self
            .descriptors
            .iter()
            .filter(|d| d.state == ResolutionState::Invalid)
            .count();
        self.notifier.info(format_args!(
            "{} types consolidated, {invalid} invalid",
            self.descriptors.len()
        ));
    }

    fn link_base(&self, id: TypeId, index: usize, config: &Configuration) -> BaseTarget {
        let descriptor = &self.descriptors[id.0];
        let name = &descriptor.bases[index].name;
        match self.resolve(Some(descriptor.qualified_name.as_str()), name) {
            Some(base) => BaseTarget::Resolved(base),
            None if config.is_external_type(name) => BaseTarget::External,
            None => BaseTarget::Invalid(BaseDefect::Missing),
        }
    }

    /// Post-order step: every base of `id` is final at this point.
    fn finish(&mut self, id: TypeId, config: &Configuration) {
        let descriptor = &self.descriptors[id.0];
        let name = descriptor.qualified_name.clone();

        let mut defect = None;
        for base in &descriptor.bases {
            match base.target {
                BaseTarget::Invalid(BaseDefect::Missing) => {
                    self.notifier
                        .warning(format_args!("type `{name}`: base `{}` not found", base.name));
                    if base.access == Access::Public && defect.is_none() {
                        defect = Some(format!("public base `{}` not found", base.name));
                    }
                }
                BaseTarget::Resolved(b)
                    if base.access == Access::Public
                        && self.descriptors[b.0].state == ResolutionState::Invalid =>
                {
                    if defect.is_none() {
                        defect = Some(format!("public base `{}` is invalid", base.name));
                    }
                }
                _ => {}
            }
        }

        let mut unimplemented = descriptor.pure_virtuals.clone();
        for base in &descriptor.bases {
            if let BaseTarget::Resolved(b) = base.target {
                unimplemented.extend(
                    self.descriptors[b.0]
                        .unimplemented
                        .iter()
                        .filter(|sig| !descriptor.implemented.contains(*sig))
                        .cloned(),
                );
            }
        }

        let eligible = config.eligibility_override(&name).unwrap_or_else(|| {
            defect.is_none()
                && descriptor.state != ResolutionState::Invalid
                && (!descriptor.is_template || matches!(descriptor.kind, ReflectorKind::Custom { .. }))
                && descriptor.access != Access::Private
                && !name.contains('@')
        });

        let descriptor = &mut self.descriptors[id.0];
        let kind = match descriptor.kind {
            ReflectorKind::Object { is_abstract } => Some(ReflectorKind::Object {
                is_abstract: is_abstract || !unimplemented.is_empty(),
            }),
            ReflectorKind::Value(ValueKind::Plain) if !unimplemented.is_empty() => {
                self.notifier.info(format_args!(
                    "type `{name}` leaves pure virtual methods unimplemented; reflecting it as an abstract object type"
                ));
                Some(ReflectorKind::Object { is_abstract: true })
            }
            _ => None,
        };
        if let Some(kind) = kind {
            descriptor.kind = kind;
        }
        descriptor.unimplemented = unimplemented;
        drop_shadowed_members(descriptor);
        descriptor.eligible = eligible;

        if descriptor.state == ResolutionState::Invalid {
            return;
        }
        match defect {
            Some(reason) => {
                self.notifier
                    .warning(format_args!("type `{name}` is invalid: {reason}"));
                descriptor.state = ResolutionState::Invalid;
            }
            None => descriptor.state = ResolutionState::Consolidated,
        }
    }
}

/// Remove inherited methods and properties the type redeclares itself.
fn drop_shadowed_members(descriptor: &mut ReflectorDescriptor) {
    let own_methods: BTreeSet<Signature> = descriptor
        .methods
        .iter()
        .filter(|m| m.declared_in.is_none())
        .map(|m| m.signature())
        .collect();
    let mut inherited = BTreeSet::new();
    descriptor.methods.retain(|m| {
        if m.declared_in.is_none() {
            return true;
        }
        let signature = m.signature();
        !own_methods.contains(&signature) && inherited.insert(signature)
    });

    let own_properties: BTreeSet<String> = descriptor
        .properties
        .iter()
        .filter(|p| p.declared_in.is_none())
        .map(|p| p.name.clone())
        .collect();
    let mut inherited = BTreeSet::new();
    descriptor.properties.retain(|p| {
        p.declared_in.is_none()
            || (!own_properties.contains(&p.name) && inherited.insert(p.name.clone()))
    });
}

impl Index<TypeId> for TypeRegistry {
    type Output = ReflectorDescriptor;

    fn index(&self, id: TypeId) -> &ReflectorDescriptor {
        &self.descriptors[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{MemorySink, Verbosity};
    use crate::types::{BaseLink, MethodDescriptor, PropertyDescriptor, Virtuality};
    use std::sync::Arc;

    fn pure(name: &str, ret: &str) -> MethodDescriptor {
        MethodDescriptor::new(name, ret, vec![])
            .with_const()
            .with_virtuality(Virtuality::PureVirtual)
    }

    fn overriding(name: &str, ret: &str) -> MethodDescriptor {
        MethodDescriptor::new(name, ret, vec![])
            .with_const()
            .with_virtuality(Virtuality::Virtual)
    }

    fn recording() -> (TypeRegistry, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let registry = TypeRegistry::new(Notifier::new(Verbosity::Debug, sink.clone()));
        (registry, sink)
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = TypeRegistry::default();
        let a = registry.register(ReflectorDescriptor::object("osg::Node")).unwrap();
        let b = registry.register(ReflectorDescriptor::object("osg::Node")).unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_conflicting_kind_fails() {
        let mut registry = TypeRegistry::default();
        registry.register(ReflectorDescriptor::object("osg::Node")).unwrap();
        let err = registry
            .register(ReflectorDescriptor::new(
                "osg::Node",
                ReflectorKind::Value(ValueKind::Plain),
            ))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateType {
                name: "osg::Node".to_string(),
                existing: "object type",
                incoming: "value type",
            }
        );
        assert!(matches!(registry.find("osg::Node").unwrap().kind, ReflectorKind::Object { .. }));
    }

    #[test]
    fn test_abstractness_propagates() {
        let mut registry = TypeRegistry::default();
        registry
            .register(
                ReflectorDescriptor::object("Shape").with_method(pure("area", "double")),
            )
            .unwrap();
        registry
            .register(
                ReflectorDescriptor::object("Circle")
                    .with_base(BaseLink::public("Shape"))
                    .with_method(overriding("area", "double")),
            )
            .unwrap();
        registry
            .register(ReflectorDescriptor::object("Polygon").with_base(BaseLink::public("Shape")))
            .unwrap();
        registry
            .register(
                ReflectorDescriptor::object("Square")
                    .with_base(BaseLink::public("Polygon"))
                    .with_method(overriding("area", "double")),
            )
            .unwrap();
        registry.consolidate(&Configuration::new());

        assert!(registry.find("Shape").unwrap().is_abstract());
        assert!(!registry.find("Circle").unwrap().is_abstract());
        assert!(registry.find("Polygon").unwrap().is_abstract());
        assert!(!registry.find("Square").unwrap().is_abstract());
        assert_eq!(
            registry
                .find("Polygon")
                .unwrap()
                .unimplemented_abstract()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            vec!["area() const"]
        );
    }

    #[test]
    fn test_declared_abstract_stays_abstract() {
        let mut registry = TypeRegistry::default();
        registry
            .register(ReflectorDescriptor::new(
                "osg::Referenced",
                ReflectorKind::Object { is_abstract: true },
            ))
            .unwrap();
        registry.consolidate(&Configuration::new());
        assert!(registry.find("osg::Referenced").unwrap().is_abstract());
    }

    #[test]
    fn test_value_type_with_pure_virtuals_is_promoted() {
        let mut registry = TypeRegistry::default();
        registry
            .register(
                ReflectorDescriptor::new("Callback", ReflectorKind::Value(ValueKind::Plain))
                    .with_method(pure("run", "void")),
            )
            .unwrap();
        registry.consolidate(&Configuration::new());
        assert_eq!(
            registry.find("Callback").unwrap().kind,
            ReflectorKind::Object { is_abstract: true }
        );
    }

    #[test]
    fn test_missing_public_base_invalidates() {
        let (mut registry, sink) = recording();
        registry
            .register(ReflectorDescriptor::object("Derived").with_base(BaseLink::public("Nowhere")))
            .unwrap();
        registry
            .register(
                ReflectorDescriptor::object("Hidden").with_base(BaseLink::new(
                    "Nowhere",
                    Access::Private,
                    false,
                )),
            )
            .unwrap();
        registry
            .register(ReflectorDescriptor::object("Leaf").with_base(BaseLink::public("Derived")))
            .unwrap();
        registry.consolidate(&Configuration::new());

        let derived = registry.find("Derived").unwrap();
        assert_eq!(derived.state, ResolutionState::Invalid);
        assert_eq!(derived.bases[0].target, BaseTarget::Invalid(BaseDefect::Missing));
        assert!(!derived.eligible);

        let hidden = registry.find("Hidden").unwrap();
        assert_eq!(hidden.state, ResolutionState::Consolidated);
        assert!(hidden.bases[0].is_invalid());

        assert_eq!(registry.find("Leaf").unwrap().state, ResolutionState::Invalid);
        assert!(
            sink.messages(Verbosity::Warning)
                .iter()
                .any(|m| m.contains("type `Derived` is invalid"))
        );
    }

    #[test]
    fn test_every_base_is_resolved_or_invalid() {
        let mut registry = TypeRegistry::default();
        registry.register(ReflectorDescriptor::object("osg::Object")).unwrap();
        registry
            .register(
                ReflectorDescriptor::object("osg::Node")
                    .with_base(BaseLink::public("Object"))
                    .with_base(BaseLink::public("Missing")),
            )
            .unwrap();
        registry
            .register(
                ReflectorDescriptor::object("osg::Thread")
                    .with_base(BaseLink::public("OpenThreads::Thread")),
            )
            .unwrap();
        let mut config = Configuration::new();
        config.external_type("OpenThreads::.*").unwrap();
        registry.consolidate(&config);

        for (_, descriptor) in registry.iter() {
            for base in &descriptor.bases {
                assert_ne!(base.target, BaseTarget::Unresolved);
            }
        }
        let node = registry.find("osg::Node").unwrap();
        assert_eq!(
            node.bases[0].target,
            BaseTarget::Resolved(registry.lookup("osg::Object").unwrap())
        );
        let thread = registry.find("osg::Thread").unwrap();
        assert_eq!(thread.bases[0].target, BaseTarget::External);
        assert_eq!(thread.state, ResolutionState::Consolidated);
    }

    #[test]
    fn test_cycle_is_broken_once() {
        let (mut registry, sink) = recording();
        registry
            .register(ReflectorDescriptor::object("A").with_base(BaseLink::public("B")))
            .unwrap();
        registry
            .register(ReflectorDescriptor::object("B").with_base(BaseLink::public("A")))
            .unwrap();
        registry.consolidate(&Configuration::new());

        let a = registry.find("A").unwrap();
        let b = registry.find("B").unwrap();
        assert_eq!(a.bases[0].target, BaseTarget::Resolved(registry.lookup("B").unwrap()));
        assert_eq!(b.bases[0].target, BaseTarget::Invalid(BaseDefect::Cycle));
        assert_eq!(a.state, ResolutionState::Consolidated);
        assert_eq!(b.state, ResolutionState::Consolidated);

        let cycles: Vec<_> = sink
            .messages(Verbosity::Warning)
            .into_iter()
            .filter(|m| m.contains("inheritance cycle"))
            .collect();
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn test_topological_order_puts_bases_first() {
        let mut registry = TypeRegistry::default();
        registry
            .register(ReflectorDescriptor::object("a::Leaf").with_base(BaseLink::public("Middle")))
            .unwrap();
        registry
            .register(ReflectorDescriptor::object("a::Middle").with_base(BaseLink::public("z::Root")))
            .unwrap();
        registry.register(ReflectorDescriptor::object("z::Root")).unwrap();
        registry.consolidate(&Configuration::new());

        let names: Vec<&str> = registry
            .topological_order()
            .iter()
            .map(|&id| registry[id].qualified_name.as_str())
            .collect();
        assert_eq!(names, vec!["z::Root", "a::Middle", "a::Leaf"]);
    }

    #[test]
    fn test_scoped_resolution() {
        let mut registry = TypeRegistry::default();
        registry.register(ReflectorDescriptor::object("Callback")).unwrap();
        registry.register(ReflectorDescriptor::object("osg::Callback")).unwrap();
        registry.register(ReflectorDescriptor::object("osg::ref_ptr")).unwrap();

        assert_eq!(
            registry.resolve(Some("osg::NodeCallback"), "Callback"),
            registry.lookup("osg::Callback")
        );
        assert_eq!(registry.resolve(None, "Callback"), registry.lookup("Callback"));
        assert_eq!(
            registry.resolve(Some("osg::Node"), "ref_ptr< osg::Node >"),
            registry.lookup("osg::ref_ptr")
        );
        assert_eq!(registry.resolve(Some("osg::Node"), "Unknown"), None);
    }

    #[test]
    fn test_shadowed_inherited_members_dropped() {
        let mut inherited_get = MethodDescriptor::new("getName", "std::string", vec![]).with_const();
        inherited_get.declared_in = Some("osg::Object".to_string());
        let mut inherited_other = MethodDescriptor::new("ref", "void", vec![]);
        inherited_other.declared_in = Some("osg::Referenced".to_string());
        let mut inherited_prop = PropertyDescriptor::new("name", crate::types::PropertyShape::Simple, "std::string");
        inherited_prop.declared_in = Some("osg::Object".to_string());

        let mut registry = TypeRegistry::default();
        registry
            .register(
                ReflectorDescriptor::object("osg::Node")
                    .with_method(inherited_get)
                    .with_method(inherited_other)
                    .with_method(MethodDescriptor::new("getName", "std::string", vec![]).with_const())
                    .with_property(inherited_prop)
                    .with_property(PropertyDescriptor::new(
                        "name",
                        crate::types::PropertyShape::Simple,
                        "std::string",
                    )),
            )
            .unwrap();
        registry.consolidate(&Configuration::new());

        let node = registry.find("osg::Node").unwrap();
        assert_eq!(node.methods.len(), 2);
        assert!(node.methods.iter().all(|m| m.name != "getName" || m.declared_in.is_none()));
        assert_eq!(node.properties.len(), 1);
        assert!(node.properties[0].declared_in.is_none());
    }

    #[test]
    fn test_eligibility_rules() {
        let mut registry = TypeRegistry::default();
        registry.register(ReflectorDescriptor::object("Internal::Detail")).unwrap();
        registry.register(ReflectorDescriptor::object("osg::Node")).unwrap();
        let mut template = ReflectorDescriptor::object("osg::ref_ptr");
        template.is_template = true;
        registry.register(template).unwrap();
        let mut private = ReflectorDescriptor::new(
            "osg::Node::Impl",
            ReflectorKind::Typedef { target: "int".to_string() },
        );
        private.access = Access::Private;
        registry.register(private).unwrap();
        registry.register(ReflectorDescriptor::object("osg::@0")).unwrap();
        let mut forced = ReflectorDescriptor::object("osg::TemplateIncluded");
        forced.is_template = true;
        registry.register(forced).unwrap();

        let mut config = Configuration::new();
        config.exclude_type("Internal::Detail").unwrap();
        config.include_type("osg::TemplateIncluded").unwrap();
        registry.consolidate(&config);

        assert!(!registry.find("Internal::Detail").unwrap().eligible);
        assert!(registry.find("osg::Node").unwrap().eligible);
        assert!(!registry.find("osg::ref_ptr").unwrap().eligible);
        assert!(!registry.find("osg::Node::Impl").unwrap().eligible);
        assert!(!registry.find("osg::@0").unwrap().eligible);
        assert!(registry.find("osg::TemplateIncluded").unwrap().eligible);
        // excluded types are still consolidated for their dependents
        assert_eq!(
            registry.find("Internal::Detail").unwrap().state,
            ResolutionState::Consolidated
        );
    }
}

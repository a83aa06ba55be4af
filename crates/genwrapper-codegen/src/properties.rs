//! Property inference over a type's methods.
//!
//! Accessors are recognised by name prefix (see [`PropertyPolicy`]) and
//! parameter shape, then grouped by the base name left after the prefix:
//!
//! | role         | shape                          | example                      |
//! |--------------|--------------------------------|------------------------------|
//! | getter       | `T f()`                        | `getWidth()`                 |
//! | keyed getter | `T f(K)`                       | `getChild(unsigned int)`     |
//! | setter       | `f(T)`                         | `setWidth(int)`              |
//! | keyed setter | `f(K, T)`                      | `setChild(unsigned int, T)`  |
//! | counter      | `I f()`, `I` an index type     | `getNumChildren()`           |
//! | adder        | `f(T)`                         | `addChild(T)`                |
//! | inserter     | `f(I, T)`                      | `insertChild(unsigned, T)`   |
//! | remover      | `f(I, ...)`                    | `removeChild(unsigned int)`  |
//!
//! Shapes are decided in priority order. A keyed getter whose key is an
//! index type and that has a counter for the plural of its base name is an
//! **array** property; any other keyed getter is an **indexed** property;
//! plain getters and setters make **simple** properties. A getter and a
//! setter are only fused when they agree on the value type.

use std::collections::{BTreeSet, HashMap};

use crate::config::PropertyPolicy;
use crate::type_names;
use crate::types::{MethodDescriptor, MethodVisibility, PropertyDescriptor, PropertyShape};

/// Result of [`infer_properties`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyInference {
    pub properties: Vec<PropertyDescriptor>,
    /// Methods that did not become part of any property.
    pub leftover: Vec<MethodDescriptor>,
    /// Accessor pairs that looked like a property but could not be fused safely.
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Getter,
    KeyedGetter,
    Setter,
    KeyedSetter,
    Counter,
    Adder,
    Inserter,
    Remover,
}

#[derive(Debug, Default)]
struct Slots {
    getters: Vec<usize>,
    keyed_getters: Vec<usize>,
    setters: Vec<usize>,
    keyed_setters: Vec<usize>,
    counters: Vec<usize>,
    adders: Vec<usize>,
    inserters: Vec<usize>,
    removers: Vec<usize>,
}

impl Slots {
    fn slot_mut(&mut self, role: Role) -> &mut Vec<usize> {
        match role {
            Role::Getter => &mut self.getters,
            Role::KeyedGetter => &mut self.keyed_getters,
            Role::Setter => &mut self.setters,
            Role::KeyedSetter => &mut self.keyed_setters,
            Role::Counter => &mut self.counters,
            Role::Adder => &mut self.adders,
            Role::Inserter => &mut self.inserters,
            Role::Remover => &mut self.removers,
        }
    }
}

/// Strip the longest matching prefix; the rest must start with an uppercase letter.
fn strip_accessor_prefix<'a>(name: &'a str, prefixes: &[String]) -> Option<(&'a str, &'a str)> {
    let mut sorted: Vec<&String> = prefixes.iter().collect();
    sorted.sort_by_key(|p| std::cmp::Reverse(p.len()));
    sorted.into_iter().find_map(|prefix| {
        let base = name.strip_prefix(prefix.as_str())?;
        base.starts_with(|c: char| c.is_uppercase())
            .then(|| (&name[..prefix.len()], base))
    })
}

fn classify(method: &MethodDescriptor, policy: &PropertyPolicy) -> Vec<(Role, String)> {
    let mut roles = Vec::new();
    let params = &method.params;
    let ret = type_names::value_type(method.return_type());
    let returns_value = !type_names::is_void(&ret);
    let index_param = |i: usize| params.get(i).is_some_and(|p| policy.is_index_type(&p.ty));

    if let Some((prefix, base)) = strip_accessor_prefix(&method.name, &policy.getter_prefixes)
        && returns_value
        && (prefix != "is" || ret == "bool")
    {
        match params.len() {
            0 => roles.push((Role::Getter, base.to_string())),
            1 => roles.push((Role::KeyedGetter, base.to_string())),
            _ => {}
        }
    }
    if let Some((_, base)) = strip_accessor_prefix(&method.name, &policy.setter_prefixes) {
        match params.len() {
            1 => roles.push((Role::Setter, base.to_string())),
            2 => roles.push((Role::KeyedSetter, base.to_string())),
            _ => {}
        }
    }
    if let Some((_, base)) = strip_accessor_prefix(&method.name, &policy.count_prefixes)
        && params.is_empty()
        && policy.is_index_type(&ret)
    {
        roles.push((Role::Counter, base.to_string()));
    }
    if let Some((_, base)) = strip_accessor_prefix(&method.name, &policy.adder_prefixes)
        && params.len() == 1
    {
        roles.push((Role::Adder, base.to_string()));
    }
    if let Some((_, base)) = strip_accessor_prefix(&method.name, &policy.inserter_prefixes)
        && params.len() == 2
        && index_param(0)
    {
        roles.push((Role::Inserter, base.to_string()));
    }
    if let Some((_, base)) = strip_accessor_prefix(&method.name, &policy.remover_prefixes)
        && index_param(0)
    {
        roles.push((Role::Remover, base.to_string()));
    }

    roles
}

/// Whether `count_base` names the plural of `element_base` (`Children` of `Child`).
fn is_plural_of(count_base: &str, element_base: &str) -> bool {
    if count_base == element_base {
        return true;
    }
    let Some(suffix) = count_base.strip_prefix(element_base) else {
        return element_base
            .strip_suffix('y')
            .is_some_and(|stem| count_base == format!("{stem}ies"));
    };
    matches!(suffix, "s" | "es" | "ren")
}

struct Inference<'a> {
    methods: &'a [MethodDescriptor],
    policy: &'a PropertyPolicy,
    slots: HashMap<String, Slots>,
    order: Vec<String>,
    consumed: Vec<bool>,
    names: BTreeSet<String>,
    found: Vec<(usize, PropertyDescriptor)>,
    rejected: Vec<String>,
}

impl<'a> Inference<'a> {
    fn new(methods: &'a [MethodDescriptor], policy: &'a PropertyPolicy) -> Self {
        let mut slots: HashMap<String, Slots> = HashMap::new();
        let mut order = Vec::new();
        for (i, method) in methods.iter().enumerate() {
            let candidate = method.visibility == MethodVisibility::Public
                && !method.is_static
                && !method.is_constructor;
            if !candidate {
                continue;
            }
            for (role, base) in classify(method, policy) {
                if !slots.contains_key(&base) {
                    order.push(base.clone());
                }
                slots.entry(base).or_default().slot_mut(role).push(i);
            }
        }
        Self {
            methods,
            policy,
            slots,
            order,
            consumed: vec![false; methods.len()],
            names: BTreeSet::new(),
            found: Vec::new(),
            rejected: Vec::new(),
        }
    }

    fn free(&self, ids: &[usize], accept: impl Fn(&MethodDescriptor) -> bool) -> Option<usize> {
        ids.iter()
            .copied()
            .find(|&i| !self.consumed[i] && accept(&self.methods[i]))
    }

    fn param_type(&self, method: usize, param: usize) -> String {
        self.methods[method]
            .params
            .get(param)
            .map(|p| type_names::value_type(&p.ty))
            .unwrap_or_default()
    }

    fn return_type(&self, method: usize) -> String {
        type_names::value_type(self.methods[method].return_type())
    }

    fn commit(&mut self, anchor: usize, mut property: PropertyDescriptor, used: &[usize]) {
        let owners: Vec<Option<&String>> =
            used.iter().map(|&i| self.methods[i].declared_in.as_ref()).collect();
        if let Some(Some(first)) = owners.first()
            && owners.iter().all(|o| *o == Some(*first))
        {
            property.declared_in = Some((*first).clone());
        }
        for &i in used {
            self.consumed[i] = true;
        }
        self.names.insert(property.name.clone());
        self.found.push((anchor, property));
    }

    fn arrays(&mut self) {
        for base in self.order.clone() {
            let policy = self.policy;
            let Some(getter) = self.free(&self.slots[&base].keyed_getters, |m| {
                policy.is_index_type(&m.params[0].ty)
            }) else {
                continue;
            };
            let counter = self.order.iter().find_map(|count_base| {
                if !is_plural_of(count_base, &base) {
                    return None;
                }
                self.free(&self.slots[count_base].counters, |_| true)
                    .map(|i| (count_base.clone(), i))
            });
            let Some((count_base, counter)) = counter else {
                continue;
            };
            let name = type_names::lower_first(&count_base);
            if self.names.contains(&name) {
                continue;
            }

            let element = self.return_type(getter);
            let slots = &self.slots[&base];
            let setter = self.free(&slots.keyed_setters, |m| {
                policy.is_index_type(&m.params[0].ty)
                    && type_names::value_type(&m.params[1].ty) == element
            });
            let adder = self.free(&slots.adders, |m| {
                type_names::value_type(&m.params[0].ty) == element
            });
            let inserter = self.free(&slots.inserters, |m| {
                type_names::value_type(&m.params[1].ty) == element
            });
            let remover = self.free(&slots.removers, |_| true);

            let mut property = PropertyDescriptor::new(
                name,
                PropertyShape::Array,
                self.methods[getter].return_type(),
            );
            property.index_type = Some(self.param_type(getter, 0));
            property.getter = Some(self.methods[getter].signature());
            property.counter = Some(self.methods[counter].signature());
            property.setter = setter.map(|i| self.methods[i].signature());
            property.adder = adder.map(|i| self.methods[i].signature());
            property.inserter = inserter.map(|i| self.methods[i].signature());
            property.remover = remover.map(|i| self.methods[i].signature());

            let used: Vec<usize> = [Some(getter), Some(counter), setter, adder, inserter, remover]
                .into_iter()
                .flatten()
                .collect();
            self.commit(getter, property, &used);
        }
    }

    fn indexed(&mut self) {
        for base in self.order.clone() {
            let Some(getter) = self.free(&self.slots[&base].keyed_getters, |_| true) else {
                continue;
            };
            let name = type_names::lower_first(&base);
            if self.names.contains(&name) {
                continue;
            }
            let key = self.param_type(getter, 0);
            let element = self.return_type(getter);
            let setter = self.free(&self.slots[&base].keyed_setters, |m| {
                type_names::value_type(&m.params[0].ty) == key
                    && type_names::value_type(&m.params[1].ty) == element
            });

            let mut property = PropertyDescriptor::new(
                name,
                PropertyShape::Indexed,
                self.methods[getter].return_type(),
            );
            property.index_type = Some(key);
            property.getter = Some(self.methods[getter].signature());
            property.setter = setter.map(|i| self.methods[i].signature());

            let used: Vec<usize> = [Some(getter), setter].into_iter().flatten().collect();
            self.commit(getter, property, &used);
        }
    }

    fn simple(&mut self) {
        for base in self.order.clone() {
            let slots = &self.slots[&base];
            let getter = self
                .free(&slots.getters, |m| m.is_const)
                .or_else(|| self.free(&slots.getters, |_| true));
            let setters: Vec<usize> = slots
                .setters
                .iter()
                .copied()
                .filter(|&i| !self.consumed[i])
                .collect();
            if getter.is_none() && setters.is_empty() {
                continue;
            }
            let name = type_names::lower_first(&base);
            if self.names.contains(&name) {
                continue;
            }

            let (anchor, ty, setter) = match getter {
                Some(g) => {
                    let value = self.return_type(g);
                    let setter = setters
                        .iter()
                        .copied()
                        .find(|&s| self.param_type(s, 0) == value);
                    if setter.is_none()
                        && let Some(&s) = setters.first()
                    {
                        let message = format!(
                            "property `{name}`: getter `{}` returns `{value}` but setter `{}` takes `{}`",
                            self.methods[g].signature(),
                            self.methods[s].signature(),
                            self.param_type(s, 0),
                        );
                        self.rejected.push(message);
                        continue;
                    }
                    (g, self.methods[g].return_type().to_string(), setter)
                }
                None => {
                    let s = setters[0];
                    (s, self.methods[s].params[0].ty.clone(), Some(s))
                }
            };

            let mut property = PropertyDescriptor::new(name, PropertyShape::Simple, ty);
            property.getter = getter.map(|i| self.methods[i].signature());
            property.setter = setter.map(|i| self.methods[i].signature());
            let used: Vec<usize> = [getter, setter].into_iter().flatten().collect();
            self.commit(anchor, property, &used);
        }
    }

    fn finish(mut self) -> PropertyInference {
        self.found.sort_by_key(|(anchor, _)| *anchor);
        PropertyInference {
            properties: self.found.into_iter().map(|(_, p)| p).collect(),
            leftover: self
                .methods
                .iter()
                .zip(&self.consumed)
                .filter(|(_, consumed)| !**consumed)
                .map(|(m, _)| m.clone())
                .collect(),
            rejected: self.rejected,
        }
    }
}

/// Fuse accessor methods into properties.
///
/// Only public, non-static, non-constructor methods take part. The result
/// lists the properties in the order their first accessor was declared.
pub fn infer_properties(methods: &[MethodDescriptor], policy: &PropertyPolicy) -> PropertyInference {
    let mut inference = Inference::new(methods, policy);
    inference.arrays();
    inference.indexed();
    inference.simple();
    inference.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Parameter, PropertyVisibility, Signature};

    fn method(name: &str, ret: &str, params: &[&str]) -> MethodDescriptor {
        MethodDescriptor::new(
            name,
            ret,
            params
                .iter()
                .enumerate()
                .map(|(i, ty)| Parameter::new(ty, format!("p{i}")))
                .collect(),
        )
    }

    fn infer(methods: &[MethodDescriptor]) -> PropertyInference {
        infer_properties(methods, &PropertyPolicy::default())
    }

    #[test]
    fn test_simple_property_pair() {
        let methods = [
            method("getWidth", "int", &[]).with_const(),
            method("setWidth", "void", &["int"]),
            method("getHeight", "int", &[]).with_const(),
        ];
        let result = infer(&methods);

        assert_eq!(result.properties.len(), 2);
        let width = &result.properties[0];
        assert_eq!(width.name, "width");
        assert_eq!(width.shape, PropertyShape::Simple);
        assert_eq!(width.visibility, PropertyVisibility::NonPublic);
        assert_eq!(width.getter, Some(Signature::new::<&str>("getWidth", &[], true)));
        assert_eq!(width.setter, Some(Signature::new("setWidth", &["int"], false)));

        let height = &result.properties[1];
        assert_eq!(height.name, "height");
        assert!(height.setter.is_none());
        assert!(result.leftover.is_empty());
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn test_mismatched_types_are_not_fused() {
        let methods = [
            method("getName", "const std::string &", &[]).with_const(),
            method("setName", "void", &["const char *"]),
        ];
        let result = infer(&methods);
        assert!(result.properties.is_empty());
        assert_eq!(result.leftover.len(), 2);
        assert_eq!(result.rejected.len(), 1);
        assert!(result.rejected[0].contains("property `name`"));
    }

    #[test]
    fn test_reference_setter_matches_value_getter() {
        let methods = [
            method("getCenter", "const osg::Vec3 &", &[]).with_const(),
            method("setCenter", "void", &["const osg::Vec3 &"]),
        ];
        let result = infer(&methods);
        assert_eq!(result.properties.len(), 1);
        assert_eq!(result.properties[0].ty, "const osg::Vec3 &");
    }

    #[test]
    fn test_const_getter_preferred() {
        let methods = [
            method("getStateSet", "osg::StateSet *", &[]),
            method("getStateSet", "const osg::StateSet *", &[]).with_const(),
        ];
        let result = infer(&methods);
        assert_eq!(result.properties.len(), 1);
        assert!(result.properties[0].getter.as_ref().unwrap().is_const);
        assert_eq!(result.leftover.len(), 1);
    }

    #[test]
    fn test_array_property() {
        let methods = [
            method("addChild", "bool", &["osg::Node *"]),
            method("insertChild", "bool", &["unsigned int", "osg::Node *"]),
            method("removeChild", "bool", &["unsigned int"]),
            method("getNumChildren", "unsigned int", &[]).with_const(),
            method("setChild", "bool", &["unsigned int", "osg::Node *"]),
            method("getChild", "osg::Node *", &["unsigned int"]),
        ];
        let result = infer(&methods);

        assert_eq!(result.properties.len(), 1);
        let children = &result.properties[0];
        assert_eq!(children.name, "children");
        assert_eq!(children.shape, PropertyShape::Array);
        assert_eq!(children.element_type(), Some("osg::Node *"));
        assert_eq!(children.index_type.as_deref(), Some("unsigned int"));
        assert!(children.counter.is_some());
        assert!(children.adder.is_some());
        assert!(children.inserter.is_some());
        assert!(children.remover.is_some());
        assert!(children.setter.is_some());
        assert!(result.leftover.is_empty());
    }

    #[test]
    fn test_indexed_property() {
        let methods = [
            method("getUserValue", "int", &["const std::string &"]).with_const(),
            method("setUserValue", "void", &["const std::string &", "int"]),
        ];
        let result = infer(&methods);

        assert_eq!(result.properties.len(), 1);
        let prop = &result.properties[0];
        assert_eq!(prop.name, "userValue");
        assert_eq!(prop.shape, PropertyShape::Indexed);
        assert_eq!(prop.index_type.as_deref(), Some("std::string"));
        assert!(prop.setter.is_some());
    }

    #[test]
    fn test_index_without_counter_is_indexed() {
        let methods = [method("getTexture", "osg::Texture *", &["unsigned int"])];
        let result = infer(&methods);
        assert_eq!(result.properties[0].shape, PropertyShape::Indexed);
    }

    #[test]
    fn test_is_prefix_requires_bool() {
        let methods = [
            method("isEnabled", "bool", &[]).with_const(),
            method("isolate", "void", &[]),
            method("isCount", "int", &[]),
        ];
        let result = infer(&methods);
        assert_eq!(result.properties.len(), 1);
        assert_eq!(result.properties[0].name, "enabled");
    }

    #[test]
    fn test_static_and_protected_are_ignored() {
        let methods = [
            method("getInstance", "Registry *", &[]).with_static(),
            method("getImpl", "Impl *", &[]).with_visibility(MethodVisibility::Protected),
            MethodDescriptor::constructor("Box", vec![]),
        ];
        let result = infer(&methods);
        assert!(result.properties.is_empty());
        assert_eq!(result.leftover.len(), 3);
    }

    #[test]
    fn test_configured_prefixes() {
        let policy = PropertyPolicy {
            getter_prefixes: vec!["Get".to_string()],
            setter_prefixes: vec!["Set".to_string()],
            ..PropertyPolicy::default()
        };
        let methods = [
            method("GetScale", "double", &[]).with_const(),
            method("SetScale", "void", &["double"]),
            method("getOther", "double", &[]),
        ];
        let result = infer_properties(&methods, &policy);
        assert_eq!(result.properties.len(), 1);
        assert_eq!(result.properties[0].name, "scale");
    }

    #[test]
    fn test_write_only_property() {
        let methods = [method("setDirty", "void", &["bool"])];
        let result = infer(&methods);
        assert_eq!(result.properties[0].name, "dirty");
        assert!(result.properties[0].getter.is_none());
        assert_eq!(result.properties[0].ty, "bool");
    }

    #[test]
    fn test_plural_forms() {
        assert!(is_plural_of("Children", "Child"));
        assert!(is_plural_of("Drawables", "Drawable"));
        assert!(is_plural_of("Matches", "Match"));
        assert!(is_plural_of("Entries", "Entry"));
        assert!(!is_plural_of("Parents", "Child"));
    }

    #[test]
    fn test_inherited_accessors_keep_owner() {
        let methods = [
            method("getName", "std::string", &[]).with_const(),
            method("setName", "void", &["const std::string &"]),
        ]
        .map(|mut m| {
            m.declared_in = Some("osg::Object".to_string());
            m
        });
        let result = infer(&methods);
        assert_eq!(result.properties[0].declared_in.as_deref(), Some("osg::Object"));
    }
}

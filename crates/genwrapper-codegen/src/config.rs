//! Filtering and naming configuration.
//!
//! Configuration files are TOML. Several files can be loaded one after the
//! other: lists accumulate, tables are merged key by key and scalars are
//! replaced by the last file that sets them.
//!
//! ```toml
//! output_subpath = "src/osgWrappers/introspection"
//! include = ["osg::Referenced"]
//! exclude = ["Internal::Detail", ".*::Impl"]
//! value_types = ["osg::Vec3f"]
//! external_types = ["OpenThreads::.*"]
//!
//! [custom_reflectors]
//! "osg::Matrixf" = "BEGIN_VALUE_REFLECTOR(osg::Matrixf)\nEND_REFLECTOR"
//!
//! [naming_overrides]
//! "osg::Node" = "Node_wrapper"
//!
//! [properties]
//! getter_prefixes = ["get", "is"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::type_names;

/// Output location, relative to the output directory, used when no
/// configuration file overrides it.
pub const DEFAULT_OUTPUT_SUBPATH: &str = "src/osgWrappers/introspection";

/// Accessor naming convention used to fuse methods into properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPolicy {
    pub getter_prefixes: Vec<String>,
    pub setter_prefixes: Vec<String>,
    pub count_prefixes: Vec<String>,
    pub adder_prefixes: Vec<String>,
    pub inserter_prefixes: Vec<String>,
    pub remover_prefixes: Vec<String>,
    /// Parameter types accepted as positions of array properties.
    pub index_types: Vec<String>,
}

impl Default for PropertyPolicy {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            getter_prefixes: strings(&["get", "is"]),
            setter_prefixes: strings(&["set"]),
            count_prefixes: strings(&["getNum"]),
            adder_prefixes: strings(&["add"]),
            inserter_prefixes: strings(&["insert"]),
            remover_prefixes: strings(&["remove"]),
            index_types: strings(&[
                "unsigned int",
                "unsigned",
                "int",
                "size_t",
                "std::size_t",
                "unsigned long",
                "long",
            ]),
        }
    }
}

impl PropertyPolicy {
    pub fn is_index_type(&self, ty: &str) -> bool {
        let ty = type_names::value_type(ty);
        self.index_types
            .iter()
            .any(|candidate| type_names::normalize(candidate) == ty)
    }
}

/// On-disk shape of a configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    output_subpath: Option<String>,
    include: Vec<String>,
    exclude: Vec<String>,
    value_types: Vec<String>,
    external_types: Vec<String>,
    custom_reflectors: BTreeMap<String, String>,
    naming_overrides: BTreeMap<String, String>,
    properties: PropertyKeys,
}

/// The `[properties]` table. Keys a file leaves out keep their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PropertyKeys {
    getter_prefixes: Option<Vec<String>>,
    setter_prefixes: Option<Vec<String>>,
    count_prefixes: Option<Vec<String>>,
    adder_prefixes: Option<Vec<String>>,
    inserter_prefixes: Option<Vec<String>>,
    remover_prefixes: Option<Vec<String>>,
    index_types: Option<Vec<String>>,
}

impl PropertyKeys {
    fn apply(self, policy: &mut PropertyPolicy) {
        let keys = [
            (self.getter_prefixes, &mut policy.getter_prefixes),
            (self.setter_prefixes, &mut policy.setter_prefixes),
            (self.count_prefixes, &mut policy.count_prefixes),
            (self.adder_prefixes, &mut policy.adder_prefixes),
            (self.inserter_prefixes, &mut policy.inserter_prefixes),
            (self.remover_prefixes, &mut policy.remover_prefixes),
            (self.index_types, &mut policy.index_types),
        ];
        for (value, slot) in keys {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

/// A type-name pattern, matched against the whole qualified name.
#[derive(Debug, Clone)]
struct TypePattern {
    source: String,
    regex: Regex,
}

impl TypePattern {
    fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| ConfigError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Filtering options consulted during consolidation and generation.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    output_subpath: Option<String>,
    include: Vec<TypePattern>,
    exclude: Vec<TypePattern>,
    value_types: Vec<TypePattern>,
    external_types: Vec<TypePattern>,
    custom_reflectors: BTreeMap<String, String>,
    naming_overrides: BTreeMap<String, String>,
    property_policy: PropertyPolicy,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file and merge it into this configuration.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge(file)
    }

    /// Parse configuration text and merge it into this configuration.
    pub fn load_str(&mut self, text: &str) -> Result<&mut Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<string>".into(),
            source,
        })?;
        self.merge(file)
    }

    fn merge(&mut self, file: ConfigFile) -> Result<&mut Self, ConfigError> {
        if file.output_subpath.is_some() {
            self.output_subpath = file.output_subpath;
        }
        for pattern in &file.include {
            self.include_type(pattern)?;
        }
        for pattern in &file.exclude {
            self.exclude_type(pattern)?;
        }
        for pattern in &file.value_types {
            self.value_type(pattern)?;
        }
        for pattern in &file.external_types {
            self.external_type(pattern)?;
        }
        for (name, body) in file.custom_reflectors {
            self.custom_reflector(name, body);
        }
        for (name, stem) in file.naming_overrides {
            self.naming_override(name, stem);
        }
        file.properties.apply(&mut self.property_policy);
        Ok(self)
    }

    /// Force every type matching `pattern` to be eligible.
    pub fn include_type(&mut self, pattern: &str) -> Result<&mut Self, ConfigError> {
        self.include.push(TypePattern::new(pattern)?);
        Ok(self)
    }

    /// Force every type matching `pattern` to be ineligible.
    pub fn exclude_type(&mut self, pattern: &str) -> Result<&mut Self, ConfigError> {
        self.exclude.push(TypePattern::new(pattern)?);
        Ok(self)
    }

    /// Reflect classes matching `pattern` as plain value types.
    pub fn value_type(&mut self, pattern: &str) -> Result<&mut Self, ConfigError> {
        self.value_types.push(TypePattern::new(pattern)?);
        Ok(self)
    }

    /// Treat bases matching `pattern` as known even though the index lacks them.
    pub fn external_type(&mut self, pattern: &str) -> Result<&mut Self, ConfigError> {
        self.external_types.push(TypePattern::new(pattern)?);
        Ok(self)
    }

    /// Replace the generated reflector of `name` with a user-written body.
    pub fn custom_reflector(&mut self, name: impl AsRef<str>, body: impl Into<String>) -> &mut Self {
        self.custom_reflectors
            .insert(type_names::normalize(name.as_ref()), body.into());
        self
    }

    /// Write the unit of `name` to `<stem>.cpp` instead of the derived file name.
    pub fn naming_override(&mut self, name: impl AsRef<str>, stem: impl Into<String>) -> &mut Self {
        self.naming_overrides
            .insert(type_names::normalize(name.as_ref()), stem.into());
        self
    }

    pub fn set_property_policy(&mut self, policy: PropertyPolicy) -> &mut Self {
        self.property_policy = policy;
        self
    }

    pub fn set_output_subpath(&mut self, subpath: impl Into<String>) -> &mut Self {
        self.output_subpath = Some(subpath.into());
        self
    }

    /// Forced eligibility of a type, if any rule matches. Include wins over exclude.
    pub fn eligibility_override(&self, name: &str) -> Option<bool> {
        if self.include.iter().any(|p| p.matches(name)) {
            Some(true)
        } else if self.exclude.iter().any(|p| p.matches(name)) {
            Some(false)
        } else {
            None
        }
    }

    pub fn custom_reflector_body(&self, name: &str) -> Option<&str> {
        self.custom_reflectors.get(name).map(String::as_str)
    }

    pub fn output_name(&self, name: &str) -> Option<&str> {
        self.naming_overrides.get(name).map(String::as_str)
    }

    pub fn is_value_type(&self, name: &str) -> bool {
        self.value_types.iter().any(|p| p.matches(name))
    }

    pub fn is_external_type(&self, name: &str) -> bool {
        self.external_types.iter().any(|p| p.matches(name))
    }

    pub fn property_policy(&self) -> &PropertyPolicy {
        &self.property_policy
    }

    pub fn output_subpath(&self) -> &str {
        self.output_subpath
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_SUBPATH)
    }

    /// Patterns of all forced inclusions, as written.
    pub fn include_patterns(&self) -> impl Iterator<Item = &str> {
        self.include.iter().map(|p| p.source.as_str())
    }

    /// Patterns of all forced exclusions, as written.
    pub fn exclude_patterns(&self) -> impl Iterator<Item = &str> {
        self.exclude.iter().map(|p| p.source.as_str())
    }
}

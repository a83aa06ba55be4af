//! # genwrapper-codegen
//!
//! Introspection wrapper generator for C++ class libraries. Reads the
//! Doxygen XML export of a library and writes one reflector source unit per
//! type for the `osgIntrospection` runtime.
//!
//! ## Usage
//!
//! ### 1. Export the library with Doxygen
//!
//! Render a Doxyfile with [`doxyfile::render`] (or `genwrapper -d`) and run
//! `doxygen` on it. The XML lands in `<doxy_dir>/xml/`.
//!
//! ### 2. Build, consolidate and generate
//!
//! ```rust,ignore
//! use genwrapper_codegen::{
//!     Configuration, DoxygenIndex, Notifier, RegistryBuilder, WrapperGenerator,
//! };
//!
//! let mut config = Configuration::new();
//! config.load("genwrapper.conf")?;
//!
//! let notifier = Notifier::default();
//! let index = DoxygenIndex::load("/tmp/xml")?;
//! let mut registry = RegistryBuilder::new(&index, &config, notifier.clone()).build();
//! registry.consolidate(&config);
//!
//! let report = WrapperGenerator::new(&registry, &config, notifier)
//!     .makefiles(true)
//!     .generate("/src/OpenSceneGraph")?;
//! println!("{} reflectors", report.statistics.total_reflectors);
//! ```
//!
//! Each stage finishes before the next starts: generation needs the final
//! base links and abstractness of every type.

mod builder;
mod config;
pub mod doxyfile;
mod emit;
mod enum_value;
mod error;
mod generator;
pub mod index;
mod notify;
mod properties;
mod registry;
mod stats;
pub mod type_names;
mod types;

pub use builder::RegistryBuilder;
pub use config::{Configuration, PropertyPolicy};
pub use error::{ConfigError, GenerateError, IndexError, RegistryError};
pub use generator::{
    ChangeReport, GenerationReport, GeneratorOptions, Unit, WrapperGenerator, WriteFailure,
    CHANGES_FILE, MAKEFILE, MANIFEST_FILE,
};
pub use index::{DeclarationIndex, DoxygenIndex, MemoryIndex};
pub use notify::{MemorySink, Notifier, NotifySink, TracingSink, Verbosity};
pub use properties::{infer_properties, PropertyInference};
pub use registry::TypeRegistry;
pub use stats::{percent, Statistics};
pub use types::{
    Access, BaseDefect, BaseLink, BaseTarget, ContainerShape, Enumerator, MethodDescriptor,
    MethodVisibility, Parameter, PropertyDescriptor, PropertyShape, PropertyVisibility,
    ReflectorDescriptor, ReflectorKind, ResolutionState, Signature, TypeId, ValueKind, Virtuality,
};

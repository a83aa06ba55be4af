//! Error types for the stages that can abort a run.
//!
//! Per-type problems (unresolved bases, failed property fusion, a single
//! unwritable unit) are never reported through these types; they downgrade
//! the affected descriptor and go through the [`Notifier`](crate::Notifier).

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or reading the declaration index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A file of the Doxygen export could not be read.
    #[error("could not read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file of the Doxygen export is not well-formed XML.
    #[error("malformed XML in `{path}`: {message}")]
    Xml { path: PathBuf, message: String },

    /// The root element of `index.xml` is not `doxygenindex`.
    #[error("`{0}` is not a Doxygen XML index")]
    NotAnIndex(PathBuf),

    /// A compound file does not contain the `compounddef` it was listed for.
    #[error("`{path}` does not define compound `{refid}`")]
    MissingCompound { path: PathBuf, refid: String },

    /// The handle does not belong to this index.
    #[error("unknown compound handle `{0}`")]
    UnknownHandle(String),
}

/// Errors raised by [`TypeRegistry`](crate::TypeRegistry) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The qualified name is already registered with a different kind.
    #[error("type `{name}` is already registered as {existing}, cannot register it again as {incoming}")]
    DuplicateType {
        name: String,
        existing: &'static str,
        incoming: &'static str,
    },
}

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid type pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors that make the whole output tree unusable.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("could not create output directory `{path}`: {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not scan output directory `{path}`: {source}")]
    ScanOutputDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

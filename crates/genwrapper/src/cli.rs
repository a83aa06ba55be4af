use std::path::{Path, PathBuf};

use clap::Parser;
use genwrapper_codegen::Verbosity;

#[derive(Parser, Debug)]
#[command(name = "genwrapper")]
#[command(about = "OpenSceneGraph Introspection Wrapper Generator", long_about = None)]
#[command(version)]
#[command(override_usage = "genwrapper -d path_to_src [doxy_dir] [-t template]\n       \
                            genwrapper [-c config_file]... [-v level] [-m] [-l] [doxy_dir] output_dir")]
pub struct Cli {
    /// Print a Doxyfile for the sources in path_to_src instead of generating wrappers
    #[arg(short = 'd', long = "doxyfile")]
    pub doxyfile: bool,

    /// Doxyfile template used with -d
    #[arg(short = 't', long = "template", value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Configuration file (may be repeated)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Vec<PathBuf>,

    /// QUIET, ERROR, WARNING, NOTICE, INFO or DEBUG
    #[arg(short = 'v', long = "verbosity", value_name = "LEVEL", default_value = "NOTICE")]
    pub verbosity: Verbosity,

    /// Enable creation of GNU makefiles
    #[arg(short = 'm', long = "makefiles")]
    pub makefiles: bool,

    /// List added, modified and removed files
    #[arg(short = 'l', long = "list-changes")]
    pub list_changes: bool,

    /// [doxy_dir] output_dir, or path_to_src [doxy_dir] with -d
    #[arg(value_name = "DIR", num_args = 0..=2)]
    pub dirs: Vec<String>,
}

/// What a run does, with directories already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Doxyfile { source_dir: String, doxy_dir: String },
    Build { doxy_dir: String, output_dir: String },
}

impl Cli {
    /// Interpret the positional arguments. `None` means they do not fit the mode.
    pub fn mode(&self, temp_dir: &Path) -> Option<Mode> {
        let temp_dir = || normalize_dir(&temp_dir.to_string_lossy());
        match (self.doxyfile, self.dirs.as_slice()) {
            (true, [source]) => Some(Mode::Doxyfile {
                source_dir: normalize_dir(source),
                doxy_dir: temp_dir(),
            }),
            (true, [source, doxy]) => Some(Mode::Doxyfile {
                source_dir: normalize_dir(source),
                doxy_dir: normalize_dir(doxy),
            }),
            (false, [output]) => Some(Mode::Build {
                doxy_dir: temp_dir(),
                output_dir: normalize_dir(output),
            }),
            (false, [doxy, output]) => Some(Mode::Build {
                doxy_dir: normalize_dir(doxy),
                output_dir: normalize_dir(output),
            }),
            _ => None,
        }
    }
}

/// Forward slashes only, and exactly one trailing slash.
pub fn normalize_dir(path: &str) -> String {
    let mut path = path.replace('\\', "/");
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

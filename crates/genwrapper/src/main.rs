//! genwrapper: introspection wrapper generator for OpenSceneGraph-style
//! C++ libraries.
//!
//! ```text
//! genwrapper -d path_to_src [doxy_dir] [-t template]
//! genwrapper [-c config_file]... [-v level] [-m] [-l] [doxy_dir] output_dir
//! ```

mod cli;
mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use genwrapper_codegen::{
    doxyfile, Configuration, DoxygenIndex, Notifier, RegistryBuilder, Verbosity, WrapperGenerator,
};

use crate::cli::{Cli, Mode};

const CONFIG_NAME: &str = "genwrapper.conf";

fn init_logging(verbosity: Verbosity) {
    use std::io::IsTerminal;
    use tracing_subscriber::{EnvFilter, fmt};

    let Some(level) = verbosity.as_tracing_level() else {
        return;
    };
    let use_ansi = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let subscriber = fmt::fmt()
        .with_env_filter(filter)
        .with_ansi(use_ansi)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// `name` as given, then next to the executable.
fn candidates(name: &Path) -> Vec<PathBuf> {
    let mut paths = vec![name.to_path_buf()];
    if name.is_relative()
        && let Some(dir) = exe_dir()
    {
        paths.push(dir.join(name));
    }
    paths
}

fn print_doxyfile(cli: &Cli, source_dir: &str, doxy_dir: &str) -> Result<()> {
    let template = cli
        .template
        .clone()
        .unwrap_or_else(|| PathBuf::from(doxyfile::TEMPLATE_NAME));
    let text = candidates(&template)
        .iter()
        .find_map(|path| fs::read_to_string(path).ok())
        .with_context(|| format!("could not open {}", template.display()))?;
    print!("{}", doxyfile::render(&text, source_dir, doxy_dir));
    Ok(())
}

fn load_config(cli: &Cli, notifier: &Notifier) -> Result<Configuration> {
    notifier.notice("loading configuration files");
    let mut config = Configuration::new();

    if cli.config.is_empty() {
        let default = candidates(Path::new(CONFIG_NAME))
            .into_iter()
            .find(|path| path.is_file());
        match default {
            Some(path) => {
                config.load(&path)?;
                notifier.info(format_args!("loaded `{}`", path.display()));
            }
            None => notifier.warning(format_args!(
                "no configuration file given and no `{CONFIG_NAME}` found, using defaults"
            )),
        }
    } else {
        for path in &cli.config {
            config.load(path)?;
            notifier.info(format_args!("loaded `{}`", path.display()));
        }
    }

    for pattern in config.include_patterns() {
        notifier.debug(format_args!("include `{pattern}`"));
    }
    for pattern in config.exclude_patterns() {
        notifier.debug(format_args!("exclude `{pattern}`"));
    }
    Ok(config)
}

/// Returns whether every file was written.
fn build(cli: &Cli, doxy_dir: &str, output_dir: &str) -> Result<bool> {
    let notifier = Notifier::tracing(cli.verbosity);
    let config = load_config(cli, &notifier)?;

    notifier.notice("loading XML index file");
    let xml_dir = format!("{doxy_dir}xml/");
    let index = DoxygenIndex::load(&xml_dir)?;

    let mut registry = RegistryBuilder::new(&index, &config, notifier.clone()).build();
    registry.consolidate(&config);

    let report = WrapperGenerator::new(&registry, &config, notifier)
        .makefiles(cli.makefiles)
        .list_changes(cli.list_changes)
        .generate(output_dir)?;

    println!("done.\n\nREPORT:");
    print!("{}", report::render(&report.statistics));
    if let Some(changes) = &report.changes {
        print!("{}", report::render_changes(changes));
    }
    for failure in &report.failures {
        eprintln!("* ERROR: could not write {}: {}", failure.path.display(), failure.message);
    }
    Ok(report.is_success())
}

fn run(cli: &Cli) -> Result<bool> {
    let Some(mode) = cli.mode(&std::env::temp_dir()) else {
        bail!("invalid arguments");
    };
    match mode {
        Mode::Doxyfile {
            source_dir,
            doxy_dir,
        } => {
            print_doxyfile(cli, &source_dir, &doxy_dir)?;
            Ok(true)
        }
        Mode::Build {
            doxy_dir,
            output_dir,
        } => build(cli, &doxy_dir, &output_dir),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbosity);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("* ERROR: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipped(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join(name)
    }

    #[test]
    fn test_shipped_config_loads() {
        let mut config = Configuration::new();
        config.load(shipped(CONFIG_NAME)).unwrap();
        assert!(config.is_external_type("OpenThreads::Mutex"));
        assert!(config.is_value_type("osg::Vec3f"));
        assert_eq!(config.eligibility_override("osg::Referenced"), Some(true));
        assert!(config.custom_reflector_body("osg::ref_ptr< osg::Referenced >").is_some());
    }

    fn fixtures_dir() -> String {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../genwrapper-codegen/tests/fixtures");
        dir.to_string_lossy().into_owned()
    }

    fn cli_for(config: &Path, doxy_dir: &str, output_dir: &Path) -> Cli {
        Cli::try_parse_from([
            "genwrapper".to_string(),
            "-c".to_string(),
            config.to_string_lossy().into_owned(),
            "-v".to_string(),
            "quiet".to_string(),
            "-l".to_string(),
            doxy_dir.to_string(),
            output_dir.to_string_lossy().into_owned(),
        ])
        .unwrap()
    }

    #[test]
    fn test_run_builds_wrappers_from_export() {
        let work = tempfile::TempDir::new().unwrap();
        let config = work.path().join(CONFIG_NAME);
        fs::write(&config, "output_subpath = \"wrappers\"\nexclude = [\"Internal::.*\"]\n").unwrap();
        let out = work.path().join("out");

        let cli = cli_for(&config, &fixtures_dir(), &out);
        assert!(run(&cli).unwrap());

        let wrappers = out.join("wrappers");
        assert!(wrappers.join("geo_Box.cpp").is_file());
        assert!(!wrappers.join("Internal_Detail.cpp").exists());
        let changes = fs::read_to_string(wrappers.join("genwrapper.changes")).unwrap();
        assert!(changes.contains("A geo_Box.cpp\n"));
    }

    #[test]
    fn test_run_fails_without_index() {
        let work = tempfile::TempDir::new().unwrap();
        let config = work.path().join(CONFIG_NAME);
        fs::write(&config, "").unwrap();

        let empty = work.path().join("doxy");
        fs::create_dir_all(&empty).unwrap();
        let cli = cli_for(&config, &empty.to_string_lossy(), &work.path().join("out"));
        assert!(run(&cli).is_err());
    }

    #[test]
    fn test_named_config_must_load() {
        let work = tempfile::TempDir::new().unwrap();
        let cli = cli_for(&work.path().join("missing.conf"), &fixtures_dir(), work.path());
        let err = run(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("missing.conf"));
    }

    #[test]
    fn test_shipped_template_renders() {
        let template = fs::read_to_string(shipped(doxyfile::TEMPLATE_NAME)).unwrap();
        let doxyfile = doxyfile::render(&template, "/src/OpenSceneGraph/", "/tmp/");
        assert!(doxyfile.contains("INPUT                  = /src/OpenSceneGraph/include/\n"));
        assert!(doxyfile.contains("OUTPUT_DIRECTORY       = /tmp/\n"));
        assert!(!doxyfile.contains("$("));
    }
}

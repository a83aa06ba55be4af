//! Wrapper generation: one reflector unit per eligible type.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Configuration;
use crate::emit;
use crate::error::GenerateError;
use crate::notify::Notifier;
use crate::registry::TypeRegistry;
use crate::stats::Statistics;
use crate::type_names;
use crate::types::{ResolutionState, TypeId};

/// Name of the unit index written next to the units.
pub const MANIFEST_FILE: &str = "wrappers.manifest";
pub const MAKEFILE: &str = "GNUmakefile";
/// Change report written in list mode; never part of the comparison itself.
pub const CHANGES_FILE: &str = "genwrapper.changes";

/// One rendered source unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub qualified_name: String,
    /// File name relative to the target directory.
    pub file_name: String,
    pub contents: String,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Also write a `GNUmakefile` listing the units.
    pub makefiles: bool,
    /// Compare against the pre-existing tree and report the changes.
    pub list_changes: bool,
}

/// A unit that could not be written. The rest of the run went on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Paths relative to the target directory, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// One `A path`, `M path` or `R path` line per change.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (tag, paths) in [("A", &self.added), ("M", &self.modified), ("R", &self.removed)] {
            for path in paths {
                out.push_str(tag);
                out.push(' ');
                out.push_str(path);
                out.push('\n');
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub target_dir: PathBuf,
    pub units: Vec<Unit>,
    pub failures: Vec<WriteFailure>,
    pub changes: Option<ChangeReport>,
    pub statistics: Statistics,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Renders and writes the reflector units of a consolidated registry.
///
/// The generator only reads the registry.
pub struct WrapperGenerator<'a> {
    registry: &'a TypeRegistry,
    config: &'a Configuration,
    options: GeneratorOptions,
    notifier: Notifier,
}

impl<'a> WrapperGenerator<'a> {
    pub fn new(registry: &'a TypeRegistry, config: &'a Configuration, notifier: Notifier) -> Self {
        Self {
            registry,
            config,
            options: GeneratorOptions::default(),
            notifier,
        }
    }

    pub fn set_options(&mut self, options: GeneratorOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn makefiles(&mut self, enabled: bool) -> &mut Self {
        self.options.makefiles = enabled;
        self
    }

    pub fn list_changes(&mut self, enabled: bool) -> &mut Self {
        self.options.list_changes = enabled;
        self
    }

    /// Emitted descriptors in topological order.
    fn emitted(&self) -> Vec<TypeId> {
        let mut emitted = Vec::new();
        for &id in self.registry.topological_order() {
            let descriptor = &self.registry[id];
            if !descriptor.eligible {
                continue;
            }
            match descriptor.state {
                ResolutionState::Consolidated => emitted.push(id),
                ResolutionState::Invalid => self.notifier.warning(format_args!(
                    "skipping invalid type `{}`",
                    descriptor.qualified_name
                )),
                ResolutionState::Unresolved | ResolutionState::Building => {
                    self.notifier.warning(format_args!(
                        "skipping unconsolidated type `{}`",
                        descriptor.qualified_name
                    ))
                }
            }
        }
        emitted
    }

    /// File stems, unique among the emitted units.
    ///
    /// Collisions are numbered in qualified-name order so that the result
    /// does not depend on the emission order.
    fn file_stems(&self, emitted: &[TypeId]) -> BTreeMap<TypeId, String> {
        let mut by_name: Vec<TypeId> = emitted.to_vec();
        by_name.sort_by(|a, b| {
            self.registry[*a]
                .qualified_name
                .cmp(&self.registry[*b].qualified_name)
        });

        let mut used = HashSet::new();
        let mut stems = BTreeMap::new();
        for id in by_name {
            let name = &self.registry[id].qualified_name;
            let base = self
                .config
                .output_name(name)
                .map_or_else(|| type_names::file_stem(name), str::to_string);
            let mut stem = base.clone();
            let mut n = 2;
            while !used.insert(stem.to_lowercase()) {
                stem = format!("{base}_{n}");
                n += 1;
            }
            if stem != base {
                self.notifier
                    .info(format_args!("type `{name}`: file name `{base}` taken, using `{stem}`"));
            }
            stems.insert(id, stem);
        }
        stems
    }

    /// Render every unit without touching the filesystem.
    pub fn render(&self) -> Vec<Unit> {
        let emitted = self.emitted();
        let stems = self.file_stems(&emitted);
        emitted
            .iter()
            .map(|id| {
                let descriptor = &self.registry[*id];
                Unit {
                    qualified_name: descriptor.qualified_name.clone(),
                    file_name: format!("{}.cpp", stems[id]),
                    contents: emit::render_unit(descriptor, self.registry),
                }
            })
            .collect()
    }

    /// Directory the units are written to.
    pub fn target_dir(&self, output_dir: impl AsRef<Path>) -> PathBuf {
        output_dir.as_ref().join(self.config.output_subpath())
    }

    /// Render and write every unit under `output_dir`.
    ///
    /// Failing to write a single file is recorded in the report; only an
    /// unusable target directory is an error.
    pub fn generate(&self, output_dir: impl AsRef<Path>) -> Result<GenerationReport, GenerateError> {
        self.notifier.notice("generating wrappers");

        let target_dir = self.target_dir(output_dir);
        fs::create_dir_all(&target_dir).map_err(|source| GenerateError::CreateOutputDir {
            path: target_dir.clone(),
            source,
        })?;

        let existing = if self.options.list_changes {
            Some(snapshot(&target_dir)?)
        } else {
            None
        };

        let units = self.render();
        let mut files: Vec<(String, String)> = units
            .iter()
            .map(|u| (u.file_name.clone(), u.contents.clone()))
            .collect();
        files.push((MANIFEST_FILE.to_string(), manifest(&units)));
        if self.options.makefiles {
            files.push((MAKEFILE.to_string(), makefile(&units)));
        }

        let mut failures = Vec::new();
        let mut written = 0usize;
        for (name, contents) in &files {
            let path = target_dir.join(name);
            match write_if_changed(&path, contents) {
                Ok(true) => {
                    written += 1;
                    self.notifier.debug(format_args!("wrote `{}`", path.display()));
                }
                Ok(false) => {}
                Err(err) => {
                    self.notifier
                        .error(format_args!("could not write `{}`: {err}", path.display()));
                    failures.push(WriteFailure {
                        path,
                        message: err.to_string(),
                    });
                }
            }
        }
        self.notifier.info(format_args!(
            "{} units, {written} files written to `{}`",
            units.len(),
            target_dir.display()
        ));

        let changes = existing.map(|before| {
            let report = compare(&before, &files);
            let path = target_dir.join(CHANGES_FILE);
            if let Err(err) = fs::write(&path, report.render()) {
                self.notifier
                    .error(format_args!("could not write `{}`: {err}", path.display()));
                failures.push(WriteFailure {
                    path,
                    message: err.to_string(),
                });
            }
            report
        });

        Ok(GenerationReport {
            target_dir,
            units,
            failures,
            changes,
            statistics: Statistics::collect(self.registry),
        })
    }
}

fn manifest(units: &[Unit]) -> String {
    let mut out = String::new();
    for unit in units {
        out.push_str(&unit.qualified_name);
        out.push('\t');
        out.push_str(&unit.file_name);
        out.push('\n');
    }
    out
}

fn makefile(units: &[Unit]) -> String {
    let mut files: Vec<&str> = units.iter().map(|u| u.file_name.as_str()).collect();
    files.sort_unstable();

    let mut out = String::from(
        "# Generated automatically by genwrapper.\n\
         # Please DO NOT EDIT this file!\n\
         \n\
         TOPDIR = ../../../..\n\
         include $(TOPDIR)/Make/makedefs\n\
         \n\
         CXXFILES =\\\n",
    );
    for file in files {
        out.push('\t');
        out.push_str(file);
        out.push_str("\\\n");
    }
    out.push_str(
        "\n\
         LIBS += -losgIntrospection $(OTHER_LIBS)\n\
         \n\
         include $(TOPDIR)/Make/makerules\n",
    );
    out
}

/// Returns whether the file was (re)written.
fn write_if_changed(path: &Path, contents: &str) -> std::io::Result<bool> {
    if let Ok(current) = fs::read(path)
        && current == contents.as_bytes()
    {
        return Ok(false);
    }
    fs::write(path, contents)?;
    Ok(true)
}

/// Contents of every file under `dir`, keyed by `/`-separated relative path.
fn snapshot(dir: &Path) -> Result<BTreeMap<String, Vec<u8>>, GenerateError> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|source| GenerateError::ScanOutputDir {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if relative == CHANGES_FILE {
            continue;
        }
        // unreadable files count as modified when rewritten
        let contents = fs::read(entry.path()).unwrap_or_default();
        files.insert(relative, contents);
    }
    Ok(files)
}

fn compare(before: &BTreeMap<String, Vec<u8>>, after: &[(String, String)]) -> ChangeReport {
    let mut report = ChangeReport::default();
    let mut produced = BTreeSet::new();
    for (name, contents) in after {
        produced.insert(name.as_str());
        match before.get(name) {
            None => report.added.push(name.clone()),
            Some(old) if old.as_slice() != contents.as_bytes() => {
                report.modified.push(name.clone())
            }
            Some(_) => {}
        }
    }
    report.removed = before
        .keys()
        .filter(|name| !produced.contains(name.as_str()))
        .cloned()
        .collect();
    report.added.sort();
    report.modified.sort();
    report
}

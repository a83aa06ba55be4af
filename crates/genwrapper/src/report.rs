//! Human-readable summary printed after a build run.

use std::fmt::Write as _;

use genwrapper_codegen::{percent, ChangeReport, Statistics};

pub fn render(stats: &Statistics) -> String {
    let mut out = String::new();
    let line = |out: &mut String, indent: usize, count: usize, total: usize, what: &str| {
        let _ = writeln!(
            out,
            "{:indent$}{count} ({}%) {what}",
            "",
            percent(count, total),
            indent = indent
        );
    };

    let total = stats.total_reflectors;
    if total > 0 {
        let _ = writeln!(out, "\n* a total of {total} reflectors were generated");
        line(&mut out, 4, stats.num_typedefs, total, "are typedefs");
        line(&mut out, 4, stats.num_custom, total, "are user-defined reflectors");
        if stats.num_object_types > 0 {
            let _ = writeln!(
                out,
                "    {} ({}%) are object types, {} ({}%) of which are abstract",
                stats.num_object_types,
                percent(stats.num_object_types, total),
                stats.num_abstract_object_types,
                percent(stats.num_abstract_object_types, stats.num_object_types),
            );
        }
        if stats.num_value_types > 0 {
            let _ = writeln!(
                out,
                "    {} ({}%) are value types, subdivided as follows:",
                stats.num_value_types,
                percent(stats.num_value_types, total),
            );
            let values = stats.num_value_types;
            line(&mut out, 8, stats.num_enums, values, "are enumerations");
            line(&mut out, 8, stats.num_stdcontainers, values, "are STL containers");
        }
    }

    let methods = stats.total_methods;
    if methods > 0 {
        let _ = writeln!(out, "\n* a total of {methods} methods were wrapped");
        line(&mut out, 4, stats.num_constructors, methods, "are constructors");
        line(&mut out, 4, stats.num_static_methods, methods, "are static");
        line(&mut out, 4, stats.num_protected_methods, methods, "are protected");
    }

    let properties = stats.total_properties;
    if properties > 0 {
        let _ = writeln!(out, "\n* a total of {properties} properties were defined");
        line(&mut out, 4, stats.num_simple_properties, properties, "are simple properties");
        line(&mut out, 4, stats.num_array_properties, properties, "are array properties");
        line(&mut out, 4, stats.num_indexed_properties, properties, "are indexed properties");
        line(&mut out, 4, stats.num_public_properties, properties, "are public properties");
    }

    out
}

pub fn render_changes(changes: &ChangeReport) -> String {
    if changes.is_empty() {
        return "\n* no files changed\n".to_string();
    }
    let mut out = String::new();
    for (what, paths) in [
        ("added", &changes.added),
        ("modified", &changes.modified),
        ("removed", &changes.removed),
    ] {
        if paths.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n* {} files {what}", paths.len());
        for path in paths {
            let _ = writeln!(out, "    {path}");
        }
    }
    out
}

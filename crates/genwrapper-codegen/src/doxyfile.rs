//! Doxyfile templating for the `-d` mode.

pub const INPUT_DIR: &str = "$(INPUT_DIR)";
pub const OUTPUT_DIR: &str = "$(OUTPUT_DIR)";

/// Default template file name.
pub const TEMPLATE_NAME: &str = "Doxyfile.template";

/// Substitute the input and output directories into a Doxyfile template.
///
/// Every occurrence on every line is replaced; line endings are kept.
pub fn render(template: &str, input_dir: &str, output_dir: &str) -> String {
    template
        .split_inclusive('\n')
        .map(|line| line.replace(INPUT_DIR, input_dir).replace(OUTPUT_DIR, output_dir))
        .collect()
}

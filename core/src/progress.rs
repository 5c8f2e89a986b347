//! Terminal progress styles shared by the pipeline and the binary.

use indicatif::ProgressStyle;

const SPINNER_TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {msg}";
const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} images  {msg}";

/// Bar used once the number of images in a stage is known.
pub fn default_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars("=> ").tick_chars(SPINNER_TICKS))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Length-less style for waiting on the overwrite answer and walking the
/// directory.
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .map(|style| style.tick_chars(SPINNER_TICKS))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

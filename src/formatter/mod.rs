//! Report formatting

pub mod output_formatter;

pub use output_formatter::{bound_text, char_len, OutputFormatter, MAX_SECTION_LENGTH};

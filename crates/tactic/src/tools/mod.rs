//! A set of built-in tools that models can use.

mod glob;
mod read_file;
mod shell;

pub use glob::GlobTool;
pub use read_file::ReadFileTool;
pub use shell::{CommandOutput, ShellTool};

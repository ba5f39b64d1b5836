use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use tactic_core::tool::{Error as ToolError, Literal, Tool, ToolResult, argument};
use tokio::task::spawn_blocking;

const MAX_LINES: usize = 50;

/// A tool for reading file content with line numbers, called as
/// `fs.read_file(path[, start_line])`.
#[derive(Default)]
pub struct ReadFileTool;

impl ReadFileTool {
    /// Creates a new read file tool.
    #[inline]
    pub fn new() -> Self {
        ReadFileTool
    }
}

impl Tool for ReadFileTool {
    type Output = String;

    fn namespace(&self) -> &str {
        "fs"
    }

    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        r#"
Reads a file from an absolute path and returns its content prefixed with line numbers. Usage: fs.read_file("<absolute path>", <start line>).
The start line is 1-based and optional, up to 50 lines are returned."#
    }

    fn invoke(
        &self,
        args: Vec<Literal>,
    ) -> impl Future<Output = ToolResult<String>> + Send + 'static {
        let input = parse_input(&args);
        async move {
            let (path, start_line) = input?;
            spawn_blocking(move || read_file_section(&path, start_line))
                .await
                .map_err(|_| {
                    ToolError::execution_error()
                        .with_reason("Failed to read file")
                })?
        }
    }
}

fn parse_input(args: &[Literal]) -> ToolResult<(String, usize)> {
    let path = argument(args, 0, "path")?.as_str().to_owned();
    if !Path::new(&path).is_absolute() {
        return Err(
            ToolError::invalid_input().with_reason("`path` must be absolute")
        );
    }

    let start_line = match args.get(1) {
        Some(arg) => arg.parse::<usize>().map_err(|_| {
            ToolError::invalid_input()
                .with_reason(format!("`start_line` must be a number, got {arg}"))
        })?,
        None => 1,
    };
    if start_line == 0 {
        return Err(ToolError::invalid_input()
            .with_reason("`start_line` must be 1-based"));
    }
    Ok((path, start_line))
}

fn read_file_section(
    path: &str,
    start_line: usize,
) -> Result<String, ToolError> {
    let file = File::open(path).map_err(|err| {
        ToolError::execution_error().with_reason(err.to_string())
    })?;
    format_reader_section(path, file, start_line)
}

fn format_reader_section<R: Read>(
    path: &str,
    reader: R,
    start_line: usize,
) -> Result<String, ToolError> {
    let mut lines = Vec::new();
    for line in BufReader::new(reader)
        .lines()
        .skip(start_line - 1)
        .take(MAX_LINES)
    {
        lines.push(line.map_err(|err| {
            ToolError::execution_error().with_reason(err.to_string())
        })?);
    }

    let mut result = format!("==> {path} <==\n");
    let last_line_no = start_line + lines.len().saturating_sub(1);
    let width = last_line_no.to_string().len();
    for (offset, line) in lines.into_iter().enumerate() {
        let line_no = start_line + offset;
        result.push_str(&format!("{line_no:>width$}: {line}\n"));
    }

    Ok(result)
}

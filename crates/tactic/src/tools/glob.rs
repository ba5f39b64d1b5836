use std::path::Path;

use tactic_core::tool::{Error as ToolError, Literal, Tool, ToolResult, argument};
use tokio::task::spawn_blocking;

/// The most entries a single call reports.
const MAX_ENTRIES: usize = 50;

/// A tool for finding files using glob patterns, called as
/// `fs.glob(pattern, path)`.
#[derive(Default)]
pub struct GlobTool;

impl GlobTool {
    /// Creates a new glob tool.
    #[inline]
    pub fn new() -> Self {
        GlobTool
    }
}

impl Tool for GlobTool {
    type Output = String;

    fn namespace(&self) -> &str {
        "fs"
    }

    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        r#"
Find files and directories using glob patterns. Usage: fs.glob("<pattern>", "<absolute path>").
The pattern must be relative to the path. This tool supports standard glob syntax like *, ? and ** for recursive searches."#
    }

    fn invoke(
        &self,
        args: Vec<Literal>,
    ) -> impl Future<Output = ToolResult<String>> + Send + 'static {
        let input = argument(&args, 0, "pattern").and_then(|pattern| {
            let path = argument(&args, 1, "path")?;
            Ok((pattern.as_str().to_owned(), path.as_str().to_owned()))
        });
        async move {
            let (pattern, path) = input?;
            glob_entries(&pattern, path).await
        }
    }
}

async fn glob_entries(pattern: &str, path: String) -> ToolResult<String> {
    if Path::new(pattern).is_absolute() {
        return Err(ToolError::invalid_input()
            .with_reason("`pattern` must be relative to `path`"));
    }
    if !Path::new(&path).is_absolute() {
        return Err(
            ToolError::invalid_input().with_reason("`path` must be absolute")
        );
    }

    let mut full_pattern = path;
    if full_pattern.bytes().last() != Some(b'/') {
        full_pattern.push('/');
    }
    full_pattern.push_str(pattern);
    let paths = glob::glob(&full_pattern).map_err(|err| {
        ToolError::execution_error().with_reason(err.to_string())
    })?;

    spawn_blocking(move || {
        let mut result = String::new();
        for item in paths.take(MAX_ENTRIES).flatten() {
            result.push_str(&item.to_string_lossy());
            result.push('\n');
        }
        result
    })
    .await
    .map_err(|_| {
        ToolError::execution_error().with_reason("Failed to execute glob")
    })
}

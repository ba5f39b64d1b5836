use std::env;
use std::io;

use serde::Serialize;
use tactic_core::tool::{Error as ToolError, Literal, Tool, ToolResult, argument};
use tokio::process::Command;

/// What a command printed, and how it exited.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// The exit code, or `None` if the command was killed by a signal.
    pub exit_code: Option<i32>,
    /// Everything written to stdout, lossily decoded.
    pub stdout: String,
    /// Everything written to stderr, lossily decoded.
    pub stderr: String,
}

/// A tool for running shell commands, called as `sys.shell(cmdline)`.
#[derive(Default)]
pub struct ShellTool;

impl ShellTool {
    /// Creates a new shell tool.
    #[inline]
    pub fn new() -> Self {
        ShellTool
    }
}

impl Tool for ShellTool {
    type Output = CommandOutput;

    fn namespace(&self) -> &str {
        "sys"
    }

    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        r#"
Runs arbitrary commands like using a terminal. Usage: sys.shell("<cmdline>").
The command line should be single line if possible. The exit code and the strings collected from stdout and stderr will be returned as the tool's output."#
    }

    fn invoke(
        &self,
        args: Vec<Literal>,
    ) -> impl Future<Output = ToolResult<CommandOutput>> + Send + 'static {
        let cmdline =
            argument(&args, 0, "cmdline").map(|arg| arg.as_str().to_owned());
        async move {
            let cmdline = cmdline?;
            debug!("running `{cmdline}`");
            run_command_line(&cmdline).await.map_err(|err| {
                ToolError::execution_error().with_reason(format!("{err}"))
            })
        }
    }
}

#[inline]
fn create_command_with_inferred_shell() -> Command {
    let Some(shell) = env::var_os("SHELL") else {
        return Command::new("/bin/sh");
    };
    Command::new(shell)
}

async fn run_command_line(cmdline: &str) -> Result<CommandOutput, io::Error> {
    let output = create_command_with_inferred_shell()
        .arg("-c")
        .arg(cmdline)
        .kill_on_drop(true)
        .output()
        .await?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

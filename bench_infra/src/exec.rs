// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("spawning `{0}` failed")]
    Spawn(String, #[source] io::Error),
    #[error("waiting for `{0}` failed")]
    Wait(String, #[source] io::Error),
    #[error("`{0}` timed out after {1:?}")]
    Timeout(String, Duration),
    #[error("`{command}` failed with {output}")]
    ExitStatus { command: String, output: ToolOutput },
}

impl ExecError {
    /// The text a failed tool left behind: stderr when it wrote any,
    /// otherwise stdout. Launch failures only have the error message.
    pub fn output_text(&self) -> String {
        match self {
            ExecError::ExitStatus { output, .. } if !output.stderr.trim().is_empty() => {
                output.stderr.clone()
            }
            ExecError::ExitStatus { output, .. } => output.stdout.clone(),
            e => e.to_string(),
        }
    }
}

/// An external tool invocation: program, arguments and an optional
/// working directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: &str) -> Self {
        ToolCommand {
            program: program.to_string(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn get_program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished tool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the tool was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn ok(stdout: &str) -> Self {
        ToolOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: &str) -> Self {
        ToolOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {code}"),
            None => write!(f, "termination by signal"),
        }
    }
}

impl From<Output> for ToolOutput {
    fn from(output: Output) -> Self {
        ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Seam between the runners and the host. Everything that launches a
/// process goes through here so it can be scripted in tests.
pub trait Executor {
    /// Runs `command` to completion, whatever its exit status.
    fn output(&self, command: &ToolCommand) -> Result<ToolOutput, ExecError>;

    /// Like [`Executor::output`], but a non-zero exit status is an error
    /// carrying the captured output.
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ExecError> {
        let output = self.output(command)?;
        if output.success() {
            Ok(output)
        } else {
            Err(ExecError::ExitStatus {
                command: command.to_string(),
                output,
            })
        }
    }
}

/// Runs tools on the local host, optionally bounding each invocation.
#[derive(Clone, Debug, Default)]
pub struct HostExecutor {
    timeout: Option<Duration>,
}

impl HostExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        HostExecutor { timeout }
    }
}

/// Reads `pipe` to the end on its own thread, so a chatty child never
/// blocks on a full pipe while we wait for it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(reader: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| io::Error::other("pipe reader panicked"))?
}

impl Executor for HostExecutor {
    fn output(&self, command: &ToolCommand) -> Result<ToolOutput, ExecError> {
        let mut cmd = Command::new(command.get_program());
        cmd.args(command.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = command.get_current_dir() {
            cmd.current_dir(dir);
        }

        debug!("Executing `{command}`");
        let output = match self.timeout {
            None => cmd
                .output()
                .map_err(|e| ExecError::Spawn(command.to_string(), e))?,
            Some(timeout) => {
                let mut child = cmd
                    .spawn()
                    .map_err(|e| ExecError::Spawn(command.to_string(), e))?;
                let stdout = drain(child.stdout.take());
                let stderr = drain(child.stderr.take());
                match child.wait_timeout(timeout) {
                    Err(e) => {
                        let _ = child.kill();
                        return Err(ExecError::Wait(command.to_string(), e));
                    }
                    Ok(None) => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ExecError::Timeout(command.to_string(), timeout));
                    }
                    Ok(Some(status)) => Output {
                        status,
                        stdout: collect(stdout)
                            .map_err(|e| ExecError::Wait(command.to_string(), e))?,
                        stderr: collect(stderr)
                            .map_err(|e| ExecError::Wait(command.to_string(), e))?,
                    },
                }
            }
        };

        let output = ToolOutput::from(output);
        if !output.success() {
            debug!(
                "`{command}` failed\n---stdout---\n{}\n---stderr---\n{}",
                output.stdout, output.stderr
            );
        }
        Ok(output)
    }
}

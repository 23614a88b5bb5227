//! External tool execution
//!
//! Runs build tools and project generators as child processes, streaming
//! their output through a [`ProgressScanner`] so `@progress` directives
//! update the shared progress value while ordinary lines go to the log.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::progress::ProgressScanner;
use crate::{Error, Result};

const WAIT_SLICE: Duration = Duration::from_millis(100);

/// A fully resolved command line ready to spawn.
#[derive(Debug, Clone)]
pub struct CommandLine {
    pub executable: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub stdin: Option<String>,
}

impl CommandLine {
    pub fn new(executable: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            args,
            working_dir: None,
            stdin: None,
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Render the command for error messages and logs.
    pub fn display(&self) -> String {
        let mut text = self.executable.clone();
        for arg in &self.args {
            text.push(' ');
            if arg.contains(' ') {
                text.push('"');
                text.push_str(arg);
                text.push('"');
            } else {
                text.push_str(arg);
            }
        }
        text
    }

    fn build(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command.args(&self.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// Run a command to completion, streaming output through `scanner`.
///
/// Returns the exit code. Kills the child and returns `Error::Canceled`
/// when the token trips mid-run.
///
/// # Errors
///
/// Returns an error if the command cannot be spawned or the run is
/// canceled. A non-zero exit code is not an error here; callers decide
/// how to classify it.
pub fn run_streamed(
    command_line: &CommandLine,
    scanner: &Arc<ProgressScanner>,
    token: &CancellationToken,
) -> Result<i32> {
    debug!(command = %command_line.display(), "spawning external tool");

    let mut child = command_line
        .build()
        .stdin(if command_line.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| Error::Spawn {
            command: command_line.display(),
            source,
        })?;

    if let Some(input) = &command_line.stdin {
        if let Some(mut stdin) = child.stdin.take() {
            // Best effort; the tool may close stdin early.
            let _ = stdin.write_all(input.as_bytes());
        }
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_scanner = Arc::clone(scanner);
    let stdout_thread = stdout.map(|pipe| {
        thread::spawn(move || {
            for line in BufReader::new(pipe).lines().map_while(|l| l.ok()) {
                if let Some(text) = stdout_scanner.process_line(&line) {
                    info!(target: "worksync::tool", "{text}");
                }
            }
        })
    });
    let stderr_thread = stderr.map(|pipe| {
        thread::spawn(move || {
            for line in BufReader::new(pipe).lines().map_while(|l| l.ok()) {
                warn!(target: "worksync::tool", "{line}");
            }
        })
    });

    let status = loop {
        if token.is_canceled() {
            kill_child(&mut child, command_line);
            join_readers(stdout_thread, stderr_thread);
            return Err(Error::Canceled);
        }
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(WAIT_SLICE),
            Err(source) => {
                kill_child(&mut child, command_line);
                join_readers(stdout_thread, stderr_thread);
                return Err(Error::Io(source));
            }
        }
    };

    join_readers(stdout_thread, stderr_thread);

    let code = status.code().unwrap_or(-1);
    debug!(command = %command_line.display(), code, "external tool finished");
    Ok(code)
}

/// Spawn a command without waiting for it, for launchers like an editor or
/// solution open that should outlive the run.
pub fn spawn_detached(command_line: &CommandLine) -> Result<()> {
    debug!(command = %command_line.display(), "spawning detached");
    command_line
        .build()
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| Error::Spawn {
            command: command_line.display(),
            source,
        })?;
    Ok(())
}

fn kill_child(child: &mut Child, command_line: &CommandLine) {
    if let Err(error) = child.kill() {
        warn!(command = %command_line.display(), %error, "failed to kill child process");
    }
    let _ = child.wait();
}

fn join_readers(
    stdout_thread: Option<thread::JoinHandle<()>>,
    stderr_thread: Option<thread::JoinHandle<()>>,
) {
    if let Some(handle) = stdout_thread {
        let _ = handle.join();
    }
    if let Some(handle) = stderr_thread {
        let _ = handle.join();
    }
}

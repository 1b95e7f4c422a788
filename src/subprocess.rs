//! Local helper processes. The only one today is the MCP launcher check.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::error::ExitError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished command.
#[derive(Debug)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl RunOutput {
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A command line to run with stdin closed and output captured.
pub struct Tool {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Tool {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Kill the process once it has run for `limit`.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn run(&self) -> anyhow::Result<RunOutput> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let status = match self.timeout {
            Some(limit) => self.wait_with_limit(&mut child, limit)?,
            None => child
                .wait()
                .with_context(|| format!("waiting for {}", self.program))?,
        };

        let stdout = drain(child.stdout.take()).with_context(|| format!("reading {} stdout", self.program))?;
        let stderr = drain(child.stderr.take()).with_context(|| format!("reading {} stderr", self.program))?;

        Ok(RunOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
        })
    }

    /// Like [`Tool::run`], but a non-zero exit is an [`ExitError::ToolFailed`].
    pub fn run_ok(&self) -> anyhow::Result<RunOutput> {
        let output = self.run()?;
        if !output.success() {
            return Err(ExitError::ToolFailed {
                tool: self.program.clone(),
                code: output.exit_code,
                message: output.stderr.trim().to_string(),
            }
            .into());
        }
        Ok(output)
    }

    fn spawn_error(&self, e: std::io::Error) -> anyhow::Error {
        if e.kind() == std::io::ErrorKind::NotFound {
            return ExitError::ToolNotFound {
                tool: self.program.clone(),
            }
            .into();
        }
        anyhow::Error::new(e).context(format!("starting {}", self.program))
    }

    fn wait_with_limit(&self, child: &mut Child, limit: Duration) -> anyhow::Result<ExitStatus> {
        let started = Instant::now();
        loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("waiting for {}", self.program))?
            {
                return Ok(status);
            }
            if started.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExitError::Timeout {
                    tool: self.program.clone(),
                    timeout_secs: limit.as_secs(),
                }
                .into());
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

// Launcher `--version` output is small, so reading after exit cannot fill the pipe.
fn drain(pipe: Option<impl Read>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let output = Tool::new("echo").arg("hello").run().unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn non_zero_exit_is_tool_failed() {
        let err = Tool::new("false").run_ok().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExitError>(),
            Some(ExitError::ToolFailed { code: 1, .. })
        ));
    }

    #[test]
    fn missing_program_is_tool_not_found() {
        for tool in [
            Tool::new("nonexistent-launcher-xyz"),
            Tool::new("nonexistent-launcher-xyz").timeout(Duration::from_secs(1)),
        ] {
            let err = tool.run().unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ExitError>(),
                Some(ExitError::ToolNotFound { .. })
            ));
        }
    }

    #[test]
    fn finishes_within_limit() {
        let output = Tool::new("echo")
            .arg("fast")
            .arg("within-limit")
            .timeout(Duration::from_secs(5))
            .run()
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "fast within-limit");
    }

    #[test]
    fn slow_process_is_killed() {
        let started = Instant::now();
        let err = Tool::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(200))
            .run()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExitError>(),
            Some(ExitError::Timeout { .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}

//! External process capability
//!
//! The exporter never spawns processes directly; it asks a [`ProcessRunner`],
//! so the tile builder can be replaced in tests.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use aoi_common::{Error, Result};
use log::debug;
use tokio::process::Command;

/// How a finished process exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit status, or `None` when terminated by a signal
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a program to completion
pub trait ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> impl Future<Output = Result<ExitOutcome>> + Send;
}

/// Runs programs with `tokio::process`, inheriting stdout and stderr
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    timeout: Option<Duration>,
}

impl TokioProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ExitOutcome> {
        debug!("Running: {program} {}", args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalProcess {
                program: program.to_string(),
                message: format!("failed to start: {e}"),
            })?;

        let status = match self.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => status?,
                    Err(_) => {
                        let _ = child.kill().await;
                        return Err(Error::ExternalProcess {
                            program: program.to_string(),
                            message: format!("timed out after {limit:?}"),
                        });
                    }
                }
            }
            None => child.wait().await?,
        };

        debug!("{program} exited with {status}");
        Ok(ExitOutcome {
            code: status.code(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_exit_codes_are_reported() {
        let runner = TokioProcessRunner::default();
        let ok = block_on(runner.run("sh", &["-c".to_string(), "exit 0".to_string()])).unwrap();
        assert!(ok.success());

        let failed = block_on(runner.run("sh", &["-c".to_string(), "exit 3".to_string()])).unwrap();
        assert_eq!(failed.code, Some(3));
        assert!(!failed.success());
    }

    #[test]
    fn test_missing_program() {
        let runner = TokioProcessRunner::default();
        let err = block_on(runner.run("definitely-not-a-real-program-aoi", &[])).unwrap_err();
        assert!(matches!(err, Error::ExternalProcess { .. }));
    }

    #[test]
    fn test_timeout_kills_process() {
        let runner = TokioProcessRunner::new(Some(Duration::from_millis(200)));
        let err = block_on(runner.run("sleep", &["5".to_string()])).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}

use super::policy::{CommandPolicy, PolicyNotice, PolicyViolation};
use crate::config::{ConfigError, SandboxConfig};
use crate::logging::{LogEvent, LogLevel, SharedEventLogger};
use crate::metrics::SharedMetrics;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

const NOT_FOUND_CODE: i32 = 127;
const FAILED_CODE: i32 = -1;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    fn failed(return_code: i32, message: impl Into<String>) -> Self {
        Self {
            return_code,
            stdout: String::new(),
            stderr: String::new(),
            success: false,
            error_message: Some(message.into()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExecError {
    #[error("command rejected by security policy: {0}")]
    Policy(#[from] PolicyViolation),
    #[error("command timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("failed to run '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// The only component allowed to spawn processes while checking tasks.
///
/// Every command passes the [`CommandPolicy`] before anything is spawned. The
/// child gets a null stdin, inherits the working directory and is killed and
/// reaped if it outlives its timeout.
pub struct SandboxedExecutor {
    policy: CommandPolicy,
    default_timeout: Duration,
    logger: SharedEventLogger,
    metrics: SharedMetrics,
}

impl SandboxedExecutor {
    pub fn new(
        config: &SandboxConfig,
        logger: SharedEventLogger,
        metrics: SharedMetrics,
    ) -> Result<Self, ConfigError> {
        if config.default_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(Self {
            policy: CommandPolicy::from_config(config)?,
            default_timeout: config.default_timeout(),
            logger,
            metrics,
        })
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Evaluates the policy without spawning anything.
    pub fn can_execute<S: AsRef<str>>(&self, argv: &[S]) -> Result<(), PolicyViolation> {
        self.policy.check(argv).map(|_| ())
    }

    pub async fn execute<S: AsRef<str>>(
        &self,
        argv: &[S],
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult, ExecError> {
        let argv: Vec<&str> = argv.iter().map(|a| a.as_ref()).collect();
        let line = argv.join(" ");

        let notices = match self.policy.check(&argv) {
            Ok(notices) => notices,
            Err(violation) => {
                self.metrics.inc_command_rejected();
                self.logger.log(
                    LogEvent::new(LogLevel::Warn, "sandbox.rejected")
                        .with_field("command", line.as_str())
                        .with_field("reason", violation.to_string()),
                );
                return Err(violation.into());
            }
        };
        for notice in notices {
            match notice {
                PolicyNotice::SuspiciousRead { path } => self.logger.log(
                    LogEvent::new(LogLevel::Warn, "sandbox.suspicious_read")
                        .with_field("command", line.as_str())
                        .with_field("path", path),
                ),
            }
        }

        // check() rejected an empty argv above
        let Some((program, args)) = argv.split_first() else {
            return Err(PolicyViolation::Empty.into());
        };
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.logger.log(
                    LogEvent::new(LogLevel::Info, "sandbox.not_found")
                        .with_field("command", line.as_str()),
                );
                return Ok(ExecutionResult::failed(
                    NOT_FOUND_CODE,
                    format!("command not found: {program}"),
                ));
            }
            Err(source) => {
                return Err(ExecError::Io {
                    command: line,
                    source,
                })
            }
        };
        self.metrics.inc_command_executed();

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let timeout = timeout.unwrap_or(self.default_timeout);

        let run = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let read_out = async {
                match stdout.as_mut() {
                    Some(pipe) => pipe.read_to_end(&mut out).await.map(|_| ()),
                    None => Ok(()),
                }
            };
            let read_err = async {
                match stderr.as_mut() {
                    Some(pipe) => pipe.read_to_end(&mut err).await.map(|_| ()),
                    None => Ok(()),
                }
            };
            let (_, _, status) = tokio::try_join!(read_out, read_err, child.wait())?;
            Ok::<_, std::io::Error>((status, out, err))
        };
        let outcome = tokio::time::timeout(timeout, run).await;

        let (status, out, err) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err(source)) => {
                let _ = child.kill().await;
                return Err(ExecError::Io {
                    command: line,
                    source,
                });
            }
            Err(_) => {
                // kill() also waits, so the child is reaped here
                let _ = child.kill().await;
                self.metrics.inc_command_timed_out();
                self.logger.log(
                    LogEvent::new(LogLevel::Warn, "sandbox.timeout")
                        .with_field("command", line.as_str())
                        .with_field("timeout_ms", timeout.as_millis().to_string()),
                );
                return Err(ExecError::Timeout(timeout));
            }
        };

        let return_code = status.code().unwrap_or(FAILED_CODE);
        self.logger.log(
            LogEvent::new(LogLevel::Debug, "sandbox.executed")
                .with_field("command", line)
                .with_field("return_code", return_code.to_string()),
        );
        Ok(ExecutionResult {
            return_code,
            stdout: String::from_utf8_lossy(&out).trim().to_string(),
            stderr: String::from_utf8_lossy(&err).trim().to_string(),
            success: return_code == 0,
            error_message: None,
        })
    }

    /// Like [`execute`](Self::execute), but every error becomes a failed
    /// result with return code -1.
    pub async fn execute_safe<S: AsRef<str>>(
        &self,
        argv: &[S],
        timeout: Option<Duration>,
    ) -> ExecutionResult {
        match self.execute(argv, timeout).await {
            Ok(result) => result,
            Err(e) => ExecutionResult::failed(FAILED_CODE, e.to_string()),
        }
    }
}

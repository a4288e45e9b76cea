//! Bounded retry with exponential backoff for external commands.
//!
//! `brilcalc` and `crab` talk to remote services and fail transiently. Each
//! attempt after the first waits `base_delay * 2^(attempt - 1)`. After the
//! budget is spent the last error is returned.

use std::process::Command;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("failed to start '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("'{program}' exited with {}", exit_label(.code))]
    Failed { program: String, code: Option<i32> },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.base_delay * 2u32.saturating_pow(attempt - 1)
        }
    }

    /// Run `op` until it succeeds or the retry budget is exhausted.
    /// `op` receives the zero-based attempt number.
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            let delay = self.delay_for(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(attempt, error = %e, "attempt failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run an external program, retrying on spawn failure or non-zero exit.
    pub fn run_command(&self, program: &str, args: &[String]) -> Result<(), CommandError> {
        tracing::info!(program, args = %args.join(" "), "running");
        self.run(|_| {
            let status = Command::new(program)
                .args(args)
                .status()
                .map_err(|e| CommandError::Spawn {
                    program: program.to_string(),
                    reason: e.to_string(),
                })?;
            if status.success() {
                Ok(())
            } else {
                Err(CommandError::Failed {
                    program: program.to_string(),
                    code: status.code(),
                })
            }
        })
    }
}

use crate::domain::{TaskMeta, TaskParams};
use crate::sandbox::{ExecError, SandboxedExecutor};
use crate::validation::ValidationResult;
use async_trait::async_trait;
use rand::RngCore;
use std::str::FromStr;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum TaskError {
    #[error("invalid value '{value}' for parameter '{key}': {reason}")]
    InvalidParam {
        key: String,
        value: String,
        reason: String,
    },
    #[error("task was checked before it was generated")]
    NotGenerated,
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("{0}")]
    Check(String),
}

/// A generated scenario.
///
/// `generate` must not touch the operating system; it randomizes the
/// scenario and fills in the description, hints and points. `check` inspects
/// live state and may only do so through the executor it is handed.
#[async_trait]
pub trait Task: Send + Sync {
    fn meta(&self) -> &TaskMeta;

    fn generate(&mut self, params: &TaskParams, rng: &mut dyn RngCore) -> Result<(), TaskError>;

    async fn check(&self, exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError>;
}

pub type TaskConstructor = Arc<dyn Fn() -> Box<dyn Task> + Send + Sync>;

/// Reads an override and parses it, `None` when the key is absent.
pub fn param<T>(params: &TaskParams, key: &str) -> Result<Option<T>, TaskError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = params.get(key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| TaskError::InvalidParam {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_parses_or_reports_key() {
        let mut params = TaskParams::new();
        params.insert("permissions".to_string(), "640".to_string());
        params.insert("points".to_string(), "lots".to_string());

        assert_eq!(param::<String>(&params, "permissions").unwrap().as_deref(), Some("640"));
        assert_eq!(param::<u32>(&params, "missing").unwrap(), None);
        match param::<u32>(&params, "points") {
            Err(TaskError::InvalidParam { key, value, .. }) => {
                assert_eq!(key, "points");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

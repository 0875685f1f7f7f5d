use super::{finish, pick};
use crate::domain::{Category, Difficulty, TaskMeta, TaskParams};
use crate::probes;
use crate::sandbox::SandboxedExecutor;
use crate::task::{param, Task, TaskError};
use crate::validation::{ValidationCheck, ValidationResult};
use async_trait::async_trait;
use rand::RngCore;

const MODES: &[&str] = &["Enforcing", "Permissive"];

/// Switch SELinux mode now and in `/etc/selinux/config`. Override: `mode`.
pub struct SelinuxModeTask {
    meta: TaskMeta,
    mode: Option<&'static str>,
}

impl SelinuxModeTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("selinux_mode_001", Category::Selinux, Difficulty::Easy, 5),
            mode: None,
        }
    }
}

impl Default for SelinuxModeTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for SelinuxModeTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn generate(&mut self, params: &TaskParams, rng: &mut dyn RngCore) -> Result<(), TaskError> {
        let mode = match param::<String>(params, "mode")? {
            Some(raw) => MODES
                .iter()
                .copied()
                .find(|m| m.eq_ignore_ascii_case(&raw))
                .ok_or_else(|| TaskError::InvalidParam {
                    key: "mode".to_string(),
                    value: raw.clone(),
                    reason: "expected Enforcing or Permissive".to_string(),
                })?,
            None => pick(rng, MODES),
        };
        let flag = if mode == "Permissive" { 0 } else { 1 };

        self.meta.description = format!(
            "Set SELinux to {mode} mode:\n  - Change the current mode to {mode}\n  - Ensure mode persists after reboot (modify /etc/selinux/config)"
        );
        self.meta.hints = vec![
            format!("Use 'setenforce {flag}' for immediate change"),
            "Edit /etc/selinux/config and set SELINUX= line".to_string(),
            "Verify current mode with 'getenforce'".to_string(),
            "Verify persistent config with 'grep ^SELINUX= /etc/selinux/config'".to_string(),
        ];
        self.mode = Some(mode);
        Ok(())
    }

    async fn check(&self, exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError> {
        let mode = self.mode.ok_or(TaskError::NotGenerated)?;
        let mut checks = Vec::new();

        let current = probes::selinux_mode(exec).await;
        if current.value.as_deref() == Some(mode) {
            checks.push(ValidationCheck::pass("current_mode", 2, format!("SELinux is in {mode} mode")));
        } else {
            checks.push(ValidationCheck::fail(
                "current_mode",
                2,
                current.explain(format!(
                    "SELinux mode incorrect: expected {mode}, got {}",
                    current.value.as_deref().unwrap_or("unknown")
                )),
            ));
        }

        let configured = probes::selinux_config_mode(exec).await;
        match &configured.value {
            Some(value) if *value == mode.to_lowercase() => checks.push(ValidationCheck::pass(
                "persistent_mode",
                3,
                "SELinux mode persistently configured in /etc/selinux/config",
            )),
            Some(value) => checks.push(
                ValidationCheck::fail("persistent_mode", 3, "/etc/selinux/config not updated correctly")
                    .with_details(format!("SELINUX={value}")),
            ),
            None => checks.push(ValidationCheck::fail(
                "persistent_mode",
                3,
                configured.explain("Could not verify /etc/selinux/config"),
            )),
        }

        Ok(finish(&self.meta, checks, 0.6))
    }
}

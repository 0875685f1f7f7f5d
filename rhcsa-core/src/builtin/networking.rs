use super::{finish, pick};
use crate::domain::{Category, Difficulty, TaskMeta, TaskParams};
use crate::probes;
use crate::sandbox::SandboxedExecutor;
use crate::task::{param, Task, TaskError};
use crate::validation::{ValidationCheck, ValidationResult};
use async_trait::async_trait;
use rand::RngCore;

const HOSTNAMES: &[&str] = &["server1.example.com", "rhel9.lab.local", "workstation.test.net"];

/// Set a persistent hostname. Override: `hostname`.
pub struct HostnameTask {
    meta: TaskMeta,
    hostname: Option<String>,
}

impl HostnameTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("net_hostname_001", Category::Networking, Difficulty::Easy, 6),
            hostname: None,
        }
    }
}

impl Default for HostnameTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for HostnameTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn generate(&mut self, params: &TaskParams, rng: &mut dyn RngCore) -> Result<(), TaskError> {
        let hostname = param::<String>(params, "hostname")?.unwrap_or_else(|| pick(rng, HOSTNAMES).to_string());

        self.meta.description = format!(
            "Set system hostname:\n  - Hostname: {hostname}\n  - Use hostnamectl command\n  - Configuration must be persistent across reboots"
        );
        self.meta.hints = vec![
            format!("Set hostname: hostnamectl set-hostname {hostname}"),
            "Verify: hostnamectl status".to_string(),
            "Or verify: hostname".to_string(),
            "Check persistent config: cat /etc/hostname".to_string(),
        ];
        self.hostname = Some(hostname);
        Ok(())
    }

    async fn check(&self, exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError> {
        let expected = self.hostname.as_deref().ok_or(TaskError::NotGenerated)?;
        let mut checks = Vec::new();

        let current = probes::hostname(exec).await;
        if current.value.as_deref() == Some(expected) {
            checks.push(ValidationCheck::pass("current_hostname", 3, format!("Hostname is {expected}")));
        } else {
            checks.push(ValidationCheck::fail(
                "current_hostname",
                3,
                current.explain(format!(
                    "Hostname is {}, expected {expected}",
                    current.value.as_deref().unwrap_or("unknown")
                )),
            ));
        }

        let persisted = probes::file_contains(exec, "/etc/hostname", expected).await;
        if persisted.value {
            checks.push(ValidationCheck::pass("persistent_hostname", 3, "Hostname configured persistently"));
        } else {
            checks.push(ValidationCheck::fail(
                "persistent_hostname",
                3,
                persisted.explain("Hostname not in /etc/hostname"),
            ));
        }

        Ok(finish(&self.meta, checks, 0.8))
    }
}

use super::{finish, pick};
use crate::domain::{Category, Difficulty, TaskMeta, TaskParams};
use crate::probes;
use crate::sandbox::SandboxedExecutor;
use crate::task::{param, Task, TaskError};
use crate::validation::{ValidationCheck, ValidationResult};
use async_trait::async_trait;
use rand::RngCore;

const SERVICES: &[&str] = &["httpd", "nginx", "sshd", "chronyd", "firewalld"];

/// Start a unit now and enable it at boot. Override: `service`.
pub struct EnableServiceTask {
    meta: TaskMeta,
    service: Option<String>,
}

impl EnableServiceTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("service_enable_001", Category::Services, Difficulty::Easy, 5),
            service: None,
        }
    }
}

impl Default for EnableServiceTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for EnableServiceTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn generate(&mut self, params: &TaskParams, rng: &mut dyn RngCore) -> Result<(), TaskError> {
        let service = param::<String>(params, "service")?.unwrap_or_else(|| pick(rng, SERVICES).to_string());

        self.meta.description = format!(
            "Configure the '{service}' service:\n  - Start the service\n  - Enable the service to start at boot"
        );
        self.meta.hints = vec![
            "Use 'systemctl start <service>' to start".to_string(),
            "Use 'systemctl enable <service>' to enable at boot".to_string(),
            "Verify with 'systemctl status <service>'".to_string(),
            "Check enabled status with 'systemctl is-enabled <service>'".to_string(),
        ];
        self.service = Some(service);
        Ok(())
    }

    async fn check(&self, exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError> {
        let service = self.service.as_deref().ok_or(TaskError::NotGenerated)?;
        let mut checks = Vec::new();

        let active = probes::service_active(exec, service).await;
        if active.value {
            checks.push(ValidationCheck::pass("service_active", 3, format!("Service '{service}' is running")));
        } else {
            checks.push(ValidationCheck::fail(
                "service_active",
                3,
                active.explain(format!("Service '{service}' is not running")),
            ));
        }

        let enabled = probes::service_enabled(exec, service).await;
        if enabled.value {
            checks.push(ValidationCheck::pass(
                "service_enabled",
                2,
                format!("Service '{service}' is enabled at boot"),
            ));
        } else {
            checks.push(ValidationCheck::fail(
                "service_enabled",
                2,
                enabled.explain(format!("Service '{service}' is not enabled at boot")),
            ));
        }

        Ok(finish(&self.meta, checks, 0.6))
    }
}

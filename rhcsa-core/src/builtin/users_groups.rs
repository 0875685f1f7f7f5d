use super::{finish, suffix};
use crate::domain::{Category, Difficulty, TaskMeta, TaskParams};
use crate::probes;
use crate::sandbox::SandboxedExecutor;
use crate::task::{param, Task, TaskError};
use crate::validation::{ValidationCheck, ValidationResult};
use async_trait::async_trait;
use rand::{Rng, RngCore};

fn show(id: Option<u32>) -> String {
    id.map_or_else(|| "none".to_string(), |v| v.to_string())
}

/// Create a user with a fixed UID and a home directory.
/// Overrides: `username`, `uid`.
pub struct CreateUserTask {
    meta: TaskMeta,
    target: Option<(String, u32)>,
}

impl CreateUserTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("user_create_001", Category::UsersGroups, Difficulty::Easy, 5),
            target: None,
        }
    }
}

impl Default for CreateUserTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for CreateUserTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn generate(&mut self, params: &TaskParams, rng: &mut dyn RngCore) -> Result<(), TaskError> {
        let username = match param::<String>(params, "username")? {
            Some(u) => u,
            None => format!("testuser{}", suffix(rng)),
        };
        let uid = match param::<u32>(params, "uid")? {
            Some(u) => u,
            None => rng.gen_range(2000..=2999),
        };

        self.meta.description = format!(
            "Create a user named '{username}' with the following specifications:\n  - UID: {uid}\n  - Home directory: /home/{username}"
        );
        self.meta.hints = vec![
            "Use the 'useradd' command".to_string(),
            "Check 'useradd --help' for UID and home directory options".to_string(),
            "Verify with 'id <username>' command".to_string(),
        ];
        self.target = Some((username, uid));
        Ok(())
    }

    async fn check(&self, exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError> {
        let (username, uid) = self.target.as_ref().ok_or(TaskError::NotGenerated)?;
        let mut checks = Vec::new();

        let exists = probes::user_exists(exec, username).await;
        if !exists.value {
            checks.push(ValidationCheck::fail(
                "user_exists",
                2,
                exists.explain(format!("User '{username}' does not exist")),
            ));
            return Ok(finish(&self.meta, checks, 0.6));
        }
        checks.push(ValidationCheck::pass("user_exists", 2, format!("User '{username}' exists")));

        let actual = probes::user_uid(exec, username).await;
        if actual.value == Some(*uid) {
            checks.push(ValidationCheck::pass("correct_uid", 2, format!("UID is correct: {uid}")));
        } else {
            checks.push(ValidationCheck::fail(
                "correct_uid",
                2,
                actual.explain(format!("UID mismatch: expected {uid}, got {}", show(actual.value))),
            ));
        }

        let home = format!("/home/{username}");
        let kind = probes::file_type(exec, &home).await;
        if kind.value.as_deref() == Some("directory") {
            checks.push(ValidationCheck::pass("home_directory", 1, format!("Home directory exists: {home}")));
        } else {
            checks.push(ValidationCheck::fail(
                "home_directory",
                1,
                kind.explain(format!("Home directory missing: {home}")),
            ));
        }

        Ok(finish(&self.meta, checks, 0.6))
    }
}

/// Create a group with a fixed GID. Overrides: `groupname`, `gid`.
pub struct CreateGroupTask {
    meta: TaskMeta,
    target: Option<(String, u32)>,
}

impl CreateGroupTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("group_create_001", Category::UsersGroups, Difficulty::Easy, 4),
            target: None,
        }
    }
}

impl Default for CreateGroupTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for CreateGroupTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn generate(&mut self, params: &TaskParams, rng: &mut dyn RngCore) -> Result<(), TaskError> {
        let name = match param::<String>(params, "groupname")? {
            Some(g) => g,
            None => format!("testgroup{}", suffix(rng)),
        };
        let gid = match param::<u32>(params, "gid")? {
            Some(g) => g,
            None => rng.gen_range(3000..=3999),
        };

        self.meta.description = format!("Create a group named '{name}' with GID {gid}");
        self.meta.hints = vec![
            "Use the 'groupadd' command".to_string(),
            "Use the -g option to specify GID".to_string(),
            "Verify with 'getent group <groupname>'".to_string(),
        ];
        self.target = Some((name, gid));
        Ok(())
    }

    async fn check(&self, exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError> {
        let (name, gid) = self.target.as_ref().ok_or(TaskError::NotGenerated)?;
        let mut checks = Vec::new();

        let exists = probes::group_exists(exec, name).await;
        if !exists.value {
            checks.push(ValidationCheck::fail(
                "group_exists",
                2,
                exists.explain(format!("Group '{name}' does not exist")),
            ));
            return Ok(finish(&self.meta, checks, 0.7));
        }
        checks.push(ValidationCheck::pass("group_exists", 2, format!("Group '{name}' exists")));

        let actual = probes::group_gid(exec, name).await;
        if actual.value == Some(*gid) {
            checks.push(ValidationCheck::pass("correct_gid", 2, format!("GID is correct: {gid}")));
        } else {
            checks.push(ValidationCheck::fail(
                "correct_gid",
                2,
                actual.explain(format!("GID mismatch: expected {gid}, got {}", show(actual.value))),
            ));
        }

        Ok(finish(&self.meta, checks, 0.7))
    }
}

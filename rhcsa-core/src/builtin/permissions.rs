use super::{finish, pick, suffix};
use crate::domain::{Category, Difficulty, TaskMeta, TaskParams};
use crate::probes;
use crate::sandbox::SandboxedExecutor;
use crate::task::{param, Task, TaskError};
use crate::validation::{ValidationCheck, ValidationResult};
use async_trait::async_trait;
use rand::RngCore;

const MODES: &[u32] = &[0o644, 0o640, 0o600, 0o755, 0o750, 0o700];
const OWNERS: &[&str] = &["root", "nobody", "apache"];
const GROUPS: &[&str] = &["root", "wheel", "apache"];

fn mode_param(params: &TaskParams) -> Result<Option<u32>, TaskError> {
    let Some(raw) = param::<String>(params, "perms")? else {
        return Ok(None);
    };
    probes::parse_mode(&raw)
        .map(Some)
        .ok_or_else(|| TaskError::InvalidParam {
            key: "perms".to_string(),
            value: raw,
            reason: "expected an octal mode such as 640".to_string(),
        })
}

/// Set an octal mode on a file. Overrides: `file`, `perms`.
pub struct FilePermissionsTask {
    meta: TaskMeta,
    target: Option<(String, u32)>,
}

impl FilePermissionsTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("perm_basic_001", Category::Permissions, Difficulty::Easy, 4),
            target: None,
        }
    }
}

impl Default for FilePermissionsTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for FilePermissionsTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn generate(&mut self, params: &TaskParams, rng: &mut dyn RngCore) -> Result<(), TaskError> {
        let path = match param::<String>(params, "file")? {
            Some(p) => p,
            None => format!("/tmp/testfile{}.txt", suffix(rng)),
        };
        let mode = match mode_param(params)? {
            Some(m) => m,
            None => pick(rng, MODES),
        };

        self.meta.description = format!(
            "Set permissions on file '{path}':\n  - Permissions: {mode:o} (octal)"
        );
        self.meta.hints = vec![
            "Use 'chmod' command".to_string(),
            format!("Format: chmod {mode:o} {path}"),
            "Verify with 'ls -l' or 'stat' command".to_string(),
        ];
        self.target = Some((path, mode));
        Ok(())
    }

    async fn check(&self, exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError> {
        let (path, mode) = self.target.as_ref().ok_or(TaskError::NotGenerated)?;
        let mut checks = Vec::new();

        let exists = probes::file_exists(exec, path).await;
        if !exists.value {
            checks.push(ValidationCheck::fail(
                "file_exists",
                1,
                exists.explain(format!("File not found: {path}")),
            ));
            return Ok(finish(&self.meta, checks, 0.7));
        }
        checks.push(ValidationCheck::pass("file_exists", 1, format!("File exists: {path}")));

        let actual = probes::file_mode(exec, path).await;
        match actual.value {
            Some(m) if m == *mode => checks.push(ValidationCheck::pass(
                "permissions",
                3,
                format!("Permissions correct: {mode:o}"),
            )),
            other => checks.push(ValidationCheck::fail(
                "permissions",
                3,
                actual.explain(format!(
                    "Permissions incorrect: expected {mode:o}, got {}",
                    other.map_or_else(|| "unknown".to_string(), |m| format!("{m:o}"))
                )),
            )),
        }

        Ok(finish(&self.meta, checks, 0.7))
    }
}

/// Set owner and group on a file. Overrides: `file`, `owner`, `group`.
pub struct FileOwnershipTask {
    meta: TaskMeta,
    target: Option<Ownership>,
}

struct Ownership {
    path: String,
    owner: String,
    group: String,
}

impl FileOwnershipTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("perm_owner_001", Category::Permissions, Difficulty::Easy, 5),
            target: None,
        }
    }
}

impl Default for FileOwnershipTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for FileOwnershipTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn generate(&mut self, params: &TaskParams, rng: &mut dyn RngCore) -> Result<(), TaskError> {
        let path = match param::<String>(params, "file")? {
            Some(p) => p,
            None => format!("/tmp/ownertest{}.txt", suffix(rng)),
        };
        let owner = param::<String>(params, "owner")?.unwrap_or_else(|| pick(rng, OWNERS).to_string());
        let group = param::<String>(params, "group")?.unwrap_or_else(|| pick(rng, GROUPS).to_string());

        self.meta.description = format!(
            "Set ownership on file '{path}':\n  - Owner: {owner}\n  - Group: {group}"
        );
        self.meta.hints = vec![
            "Use 'chown' command".to_string(),
            format!("Format: chown {owner}:{group} {path}"),
            "Or use chown for owner and chgrp for group separately".to_string(),
            "Verify with 'ls -l' command".to_string(),
        ];
        self.target = Some(Ownership { path, owner, group });
        Ok(())
    }

    async fn check(&self, exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError> {
        let t = self.target.as_ref().ok_or(TaskError::NotGenerated)?;
        let mut checks = Vec::new();

        let exists = probes::file_exists(exec, &t.path).await;
        if !exists.value {
            checks.push(ValidationCheck::fail(
                "file_exists",
                1,
                exists.explain(format!("File not found: {}", t.path)),
            ));
            return Ok(finish(&self.meta, checks, 0.6));
        }
        checks.push(ValidationCheck::pass("file_exists", 1, format!("File exists: {}", t.path)));

        let owner = probes::file_owner(exec, &t.path).await;
        if owner.value.as_deref() == Some(t.owner.as_str()) {
            checks.push(ValidationCheck::pass("owner", 2, format!("Owner correct: {}", t.owner)));
        } else {
            checks.push(ValidationCheck::fail(
                "owner",
                2,
                owner.explain(format!(
                    "Owner incorrect: expected {}, got {}",
                    t.owner,
                    owner.value.as_deref().unwrap_or("unknown")
                )),
            ));
        }

        let group = probes::file_group(exec, &t.path).await;
        if group.value.as_deref() == Some(t.group.as_str()) {
            checks.push(ValidationCheck::pass("group", 2, format!("Group correct: {}", t.group)));
        } else {
            checks.push(ValidationCheck::fail(
                "group",
                2,
                group.explain(format!(
                    "Group incorrect: expected {}, got {}",
                    t.group,
                    group.value.as_deref().unwrap_or("unknown")
                )),
            ));
        }

        Ok(finish(&self.meta, checks, 0.6))
    }
}

//! Read-only state queries used by task checks. Each probe runs through
//! [`SandboxedExecutor::execute_safe`], so a rejected, timed-out or missing
//! command reads as `false`/`None` and never aborts the check. The executor's
//! explanation travels along in [`Probed::error`] for the failure message.

use crate::sandbox::{ExecutionResult, SandboxedExecutor};

/// A probe answer plus the reason the command could not run, if it could not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Probed<T> {
    pub value: T,
    pub error: Option<String>,
}

impl<T> Probed<T> {
    fn from_result(result: ExecutionResult, value: impl FnOnce(ExecutionResult) -> T) -> Self {
        let error = result.error_message.clone();
        Self {
            value: value(result),
            error,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Probed<U> {
        Probed {
            value: f(self.value),
            error: self.error,
        }
    }

    /// `message`, followed by the executor error when there is one.
    pub fn explain(&self, message: impl Into<String>) -> String {
        let message = message.into();
        match &self.error {
            Some(err) => format!("{message} ({err})"),
            None => message,
        }
    }
}

async fn run(exec: &SandboxedExecutor, argv: &[&str]) -> ExecutionResult {
    exec.execute_safe(argv, None).await
}

async fn succeeds(exec: &SandboxedExecutor, argv: &[&str]) -> Probed<bool> {
    Probed::from_result(run(exec, argv).await, |r| r.success)
}

async fn stdout_if_ok(exec: &SandboxedExecutor, argv: &[&str]) -> Probed<Option<String>> {
    Probed::from_result(run(exec, argv).await, |r| r.success.then_some(r.stdout))
}

pub async fn user_exists(exec: &SandboxedExecutor, user: &str) -> Probed<bool> {
    succeeds(exec, &["id", user]).await
}

pub async fn user_uid(exec: &SandboxedExecutor, user: &str) -> Probed<Option<u32>> {
    stdout_if_ok(exec, &["id", "-u", user])
        .await
        .map(|out| out.and_then(|s| s.parse().ok()))
}

pub async fn group_exists(exec: &SandboxedExecutor, group: &str) -> Probed<bool> {
    succeeds(exec, &["getent", "group", group]).await
}

pub async fn group_gid(exec: &SandboxedExecutor, group: &str) -> Probed<Option<u32>> {
    stdout_if_ok(exec, &["getent", "group", group]).await.map(|out| {
        out.and_then(|line| line.split(':').nth(2).and_then(|gid| gid.trim().parse().ok()))
    })
}

pub async fn user_groups(exec: &SandboxedExecutor, user: &str) -> Probed<Vec<String>> {
    stdout_if_ok(exec, &["id", "-nG", user]).await.map(|out| {
        out.map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    })
}

/// `name:x:uid:gid:gecos:home:shell`, field counted from 0.
fn passwd_field(line: &str, index: usize) -> Option<String> {
    let fields: Vec<&str> = line.trim().split(':').collect();
    if fields.len() < 7 {
        return None;
    }
    fields.get(index).map(|f| f.trim().to_string())
}

pub async fn user_shell(exec: &SandboxedExecutor, user: &str) -> Probed<Option<String>> {
    stdout_if_ok(exec, &["getent", "passwd", user])
        .await
        .map(|out| out.and_then(|line| passwd_field(&line, 6)))
}

pub async fn user_home(exec: &SandboxedExecutor, user: &str) -> Probed<Option<String>> {
    stdout_if_ok(exec, &["getent", "passwd", user])
        .await
        .map(|out| out.and_then(|line| passwd_field(&line, 5)))
}

pub async fn file_exists(exec: &SandboxedExecutor, path: &str) -> Probed<bool> {
    succeeds(exec, &["stat", "-c", "%F", path]).await
}

/// As reported by `stat -c %F`, e.g. `regular file` or `directory`.
pub async fn file_type(exec: &SandboxedExecutor, path: &str) -> Probed<Option<String>> {
    stdout_if_ok(exec, &["stat", "-c", "%F", path]).await
}

pub async fn file_owner(exec: &SandboxedExecutor, path: &str) -> Probed<Option<String>> {
    stdout_if_ok(exec, &["stat", "-c", "%U", path]).await
}

pub async fn file_group(exec: &SandboxedExecutor, path: &str) -> Probed<Option<String>> {
    stdout_if_ok(exec, &["stat", "-c", "%G", path]).await
}

/// Permission bits including setuid/setgid/sticky.
pub async fn file_mode(exec: &SandboxedExecutor, path: &str) -> Probed<Option<u32>> {
    stdout_if_ok(exec, &["stat", "-c", "%a", path])
        .await
        .map(|out| out.and_then(|s| parse_mode(&s)))
}

/// Accepts `640`, `0640` and `0o640`.
pub fn parse_mode(s: &str) -> Option<u32> {
    let s = s.trim();
    let digits = s.strip_prefix("0o").unwrap_or(s);
    if digits.is_empty() || digits.len() > 5 {
        return None;
    }
    u32::from_str_radix(digits, 8).ok().filter(|m| *m <= 0o7777)
}

pub async fn service_active(exec: &SandboxedExecutor, unit: &str) -> Probed<bool> {
    Probed::from_result(run(exec, &["systemctl", "is-active", unit]).await, |r| {
        r.success && r.stdout == "active"
    })
}

pub async fn service_enabled(exec: &SandboxedExecutor, unit: &str) -> Probed<bool> {
    Probed::from_result(run(exec, &["systemctl", "is-enabled", unit]).await, |r| {
        r.success && r.stdout == "enabled"
    })
}

pub async fn service_exists(exec: &SandboxedExecutor, unit: &str) -> Probed<bool> {
    succeeds(exec, &["systemctl", "cat", unit]).await
}

/// `Enforcing`, `Permissive` or `Disabled`.
pub async fn selinux_mode(exec: &SandboxedExecutor) -> Probed<Option<String>> {
    stdout_if_ok(exec, &["getenforce"]).await
}

/// Value of the `SELINUX=` line in `/etc/selinux/config`, lowercased.
pub async fn selinux_config_mode(exec: &SandboxedExecutor) -> Probed<Option<String>> {
    stdout_if_ok(exec, &["grep", "^SELINUX=", "/etc/selinux/config"])
        .await
        .map(|out| {
            out.and_then(|body| {
                body.lines()
                    .next()
                    .and_then(|l| l.split_once('='))
                    .map(|(_, v)| v.trim().to_lowercase())
            })
        })
}

/// Fixed-string search, as `grep -F`.
pub async fn file_contains(exec: &SandboxedExecutor, path: &str, needle: &str) -> Probed<bool> {
    succeeds(exec, &["grep", "-F", "--", needle, path]).await
}

fn crontab_entries(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Active entries of a user's crontab; `None` when the user has none.
pub async fn user_crontab(exec: &SandboxedExecutor, user: &str) -> Probed<Option<Vec<String>>> {
    stdout_if_ok(exec, &["crontab", "-l", "-u", user])
        .await
        .map(|out| out.map(|body| crontab_entries(&body)))
}

pub async fn hostname(exec: &SandboxedExecutor) -> Probed<Option<String>> {
    stdout_if_ok(exec, &["hostname"]).await
}

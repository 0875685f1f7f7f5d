//! Startup configuration. Every struct deserializes from a partial TOML table;
//! missing keys keep their defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// How `cat` reacts to a path outside the safe read prefixes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnsafeReadPolicy {
    /// Log `sandbox.suspicious_read` and run the command anyway.
    Warn,
    /// Reject the command as a policy violation.
    Deny,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub allowed_commands: BTreeSet<String>,
    pub deny_patterns: Vec<String>,
    pub safe_read_prefixes: Vec<String>,
    pub unsafe_read_policy: UnsafeReadPolicy,
    pub default_timeout_secs: u64,
}

const ALLOWED_COMMANDS: &[&str] = &[
    // users and groups
    "id", "getent", "groups", "whoami",
    // filesystems
    "df", "mount", "lsblk", "blkid", "findmnt", "xfs_info", "tune2fs", "dumpe2fs", "file",
    // lvm
    "pvs", "vgs", "lvs", "pvdisplay", "vgdisplay", "lvdisplay",
    // files
    "ls", "stat", "getfacl", "cat", "head", "tail", "find",
    // network
    "ip", "nmcli", "hostnamectl", "hostname",
    // selinux
    "getenforce", "getsebool", "semanage", "sestatus", "matchpathcon",
    // systemd
    "systemctl", "journalctl",
    // processes
    "ps", "top", "pgrep", "pidof",
    // scheduling
    "crontab", "atq", "at",
    // containers
    "podman",
    // text
    "grep", "awk", "sed", "cut", "sort", "uniq", "wc", "date",
];

const DENY_PATTERNS: &[&str] = &[
    r";\s*rm\s+-rf",
    r"\|\s*sh",
    r"\|\s*bash",
    r"`.*`",
    r"\$\(",
    r">\s*/dev/",
    r">\s*/etc/",
    r"dd\s+.*of=/dev/",
    r"mkfs",
    r"fdisk",
    r"parted",
];

const SAFE_READ_PREFIXES: &[&str] = &[
    "/etc/passwd",
    "/etc/group",
    "/etc/hosts",
    "/etc/hostname",
    "/etc/resolv.conf",
    "/etc/fstab",
    "/proc/",
    "/sys/",
];

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            allowed_commands: ALLOWED_COMMANDS.iter().map(|s| s.to_string()).collect(),
            deny_patterns: DENY_PATTERNS.iter().map(|s| s.to_string()).collect(),
            safe_read_prefixes: SAFE_READ_PREFIXES.iter().map(|s| s.to_string()).collect(),
            unsafe_read_policy: UnsafeReadPolicy::Warn,
            default_timeout_secs: 5,
        }
    }
}

impl SandboxConfig {
    /// Defaults, but `cat` outside the safe prefixes is rejected.
    pub fn strict() -> Self {
        Self {
            unsafe_read_policy: UnsafeReadPolicy::Deny,
            ..Default::default()
        }
    }

    /// Only the given commands, no deny patterns beyond the defaults.
    pub fn allowing<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_commands: commands.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_deny_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.deny_patterns.push(pattern.into());
        self
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamConfig {
    pub default_exam_tasks: usize,
    pub default_practice_tasks: usize,
    pub pass_threshold: f64,
    pub duration_minutes: u64,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            default_exam_tasks: 15,
            default_practice_tasks: 5,
            pass_threshold: 0.70,
            duration_minutes: 150,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid deny pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("allow-list is empty")]
    EmptyAllowList,
    #[error("default timeout must be greater than zero")]
    ZeroTimeout,
}

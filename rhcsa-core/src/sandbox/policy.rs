//! Command policy for the sandboxed executor.
//!
//! A command line is accepted only if its base command is allow-listed, the
//! space-joined line matches no deny pattern, and the command-specific rules
//! below accept its arguments. Several allow-listed tools also have mutating
//! modes; their rules keep them to the inspection subset.

use crate::config::{ConfigError, SandboxConfig, UnsafeReadPolicy};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

const SYSTEMCTL_READ_ONLY: &[&str] = &[
    "status",
    "is-active",
    "is-enabled",
    "is-failed",
    "list-units",
    "list-unit-files",
    "show",
    "cat",
    "list-dependencies",
];

const NMCLI_MUTATING: &[&str] = &["add", "modify", "delete", "up", "down"];

const FIND_FORBIDDEN: &[&str] = &[
    "-exec", "-execdir", "-ok", "-okdir", "-delete", "-fprint", "-fprint0", "-fprintf", "-fls",
];

const IP_MUTATING: &[&str] = &[
    "add", "del", "delete", "set", "flush", "change", "replace", "append", "exec",
];

const JOURNALCTL_MUTATING: &[&str] = &[
    "--rotate",
    "--vacuum-size",
    "--vacuum-time",
    "--vacuum-files",
    "--flush",
    "--sync",
    "--relinquish-var",
    "--smart-relinquish-var",
    "--setup-keys",
    "--update-catalog",
];

const SEMANAGE_MUTATING: &[&str] = &[
    "-a", "--add", "-d", "--delete", "-D", "--deleteall", "-m", "--modify", "import",
];

const PODMAN_READ_ONLY: &[&str] = &["ps", "images", "inspect", "logs", "info", "version"];
const PODMAN_OBJECTS: &[&str] = &["container", "image", "volume", "network", "pod"];
const PODMAN_OBJECT_READ_ONLY: &[&str] = &["ls", "list", "inspect", "exists"];

const AWK_GUARDS: &[&str] = &[
    r"\bsystem\s*\(",
    r"\b(print|printf)\b[^;}]*(>|\|)",
    r"\|\s*getline",
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("command cannot be empty")]
    Empty,
    #[error("command '{0}' is not in the allowed list; only read-only validation commands are permitted")]
    NotAllowed(String),
    #[error("command contains dangerous pattern: {0}")]
    DeniedPattern(String),
    #[error("{command}: {reason}")]
    SubPolicy { command: String, reason: String },
}

/// Advisory outcome of a policy check that does not block execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyNotice {
    SuspiciousRead { path: String },
}

struct DenyPattern {
    source: String,
    regex: Regex,
}

pub struct CommandPolicy {
    allowed: BTreeSet<String>,
    deny: Vec<DenyPattern>,
    safe_read_prefixes: Vec<String>,
    unsafe_read: UnsafeReadPolicy,
    awk_guards: Vec<Regex>,
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn sub_policy(command: &str, reason: impl Into<String>) -> PolicyViolation {
    PolicyViolation::SubPolicy {
        command: command.to_string(),
        reason: reason.into(),
    }
}

fn is_flag(arg: &str) -> bool {
    arg.starts_with('-') && arg.len() > 1
}

/// True for a short-option cluster such as `-ni` that contains `flag`.
fn short_cluster_has(arg: &str, flag: char) -> bool {
    arg.starts_with('-') && !arg.starts_with("--") && arg[1..].contains(flag)
}

impl CommandPolicy {
    pub fn from_config(config: &SandboxConfig) -> Result<Self, ConfigError> {
        if config.allowed_commands.is_empty() {
            return Err(ConfigError::EmptyAllowList);
        }
        let deny = config
            .deny_patterns
            .iter()
            .map(|p| {
                Ok(DenyPattern {
                    source: p.clone(),
                    regex: compile(p)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let awk_guards = AWK_GUARDS
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            allowed: config.allowed_commands.clone(),
            deny,
            safe_read_prefixes: config.safe_read_prefixes.clone(),
            unsafe_read: config.unsafe_read_policy,
            awk_guards,
        })
    }

    /// `/usr/bin/systemctl` → `systemctl`.
    pub fn base_command(program: &str) -> &str {
        program.rsplit('/').next().unwrap_or(program)
    }

    pub fn is_allowed(&self, base: &str) -> bool {
        self.allowed.contains(base)
    }

    pub fn check<S: AsRef<str>>(&self, argv: &[S]) -> Result<Vec<PolicyNotice>, PolicyViolation> {
        let argv: Vec<&str> = argv.iter().map(|a| a.as_ref()).collect();
        let Some((program, args)) = argv.split_first() else {
            return Err(PolicyViolation::Empty);
        };
        let base = Self::base_command(program);
        if !self.is_allowed(base) {
            return Err(PolicyViolation::NotAllowed(base.to_string()));
        }

        let joined = argv.join(" ");
        if let Some(p) = self.deny.iter().find(|p| p.regex.is_match(&joined)) {
            return Err(PolicyViolation::DeniedPattern(p.source.clone()));
        }

        self.check_command(base, args)
    }

    fn check_command(&self, base: &str, args: &[&str]) -> Result<Vec<PolicyNotice>, PolicyViolation> {
        match base {
            "systemctl" => {
                if let Some(sub) = args.first() {
                    if !SYSTEMCTL_READ_ONLY.contains(sub) {
                        return Err(sub_policy(
                            base,
                            format!("subcommand '{sub}' is not allowed; only read-only operations are permitted"),
                        ));
                    }
                }
            }
            "crontab" => {
                if !args.contains(&"-l") {
                    return Err(sub_policy(base, "must be used with -l (list)"));
                }
                if args.iter().any(|a| matches!(*a, "-r" | "-e" | "-i")) {
                    return Err(sub_policy(base, "only listing is permitted"));
                }
            }
            "nmcli" => {
                if let Some(word) = args.iter().find(|a| NMCLI_MUTATING.contains(*a)) {
                    return Err(sub_policy(base, format!("modification command '{word}' is not allowed")));
                }
            }
            "find" => {
                if let Some(flag) = args.iter().find(|a| FIND_FORBIDDEN.contains(*a)) {
                    return Err(sub_policy(base, format!("'{flag}' is not allowed")));
                }
            }
            "cat" => return self.check_cat(args),
            "hostnamectl" => {
                let positional: Vec<&str> = args.iter().copied().filter(|a| !is_flag(a)).collect();
                if !matches!(positional.as_slice(), [] | ["status"] | ["hostname"]) {
                    return Err(sub_policy(base, "only status queries are permitted"));
                }
            }
            "hostname" => {
                if args.iter().any(|a| !is_flag(a) || matches!(*a, "-F" | "--file" | "-b" | "--boot")) {
                    return Err(sub_policy(base, "setting the hostname is not allowed"));
                }
            }
            "date" => {
                if args.iter().any(|a| {
                    short_cluster_has(a, 's') || a.starts_with("--set") || (!is_flag(a) && !a.starts_with('+'))
                }) {
                    return Err(sub_policy(base, "setting the clock is not allowed"));
                }
            }
            "sed" => {
                if args.iter().any(|a| short_cluster_has(a, 'i') || a.starts_with("--in-place")) {
                    return Err(sub_policy(base, "in-place editing is not allowed"));
                }
            }
            "sort" => {
                if args.iter().any(|a| short_cluster_has(a, 'o') || a.starts_with("--output")) {
                    return Err(sub_policy(base, "writing an output file is not allowed"));
                }
            }
            "tune2fs" => {
                if !args.contains(&"-l") || args.iter().any(|a| is_flag(a) && *a != "-l") {
                    return Err(sub_policy(base, "only -l (list superblock) is permitted"));
                }
            }
            "semanage" => {
                if !args.iter().any(|a| matches!(*a, "-l" | "--list")) {
                    return Err(sub_policy(base, "must be used with -l (list)"));
                }
                if let Some(flag) = args.iter().find(|a| SEMANAGE_MUTATING.contains(*a)) {
                    return Err(sub_policy(base, format!("'{flag}' is not allowed")));
                }
            }
            "journalctl" => {
                if let Some(flag) = args
                    .iter()
                    .find(|a| JOURNALCTL_MUTATING.iter().any(|m| a.starts_with(m)))
                {
                    return Err(sub_policy(base, format!("'{flag}' modifies the journal")));
                }
            }
            "ip" => {
                if let Some(verb) = args.iter().find(|a| IP_MUTATING.contains(*a)) {
                    return Err(sub_policy(base, format!("'{verb}' is not allowed")));
                }
            }
            "mount" => self.check_mount(args)?,
            "at" => {
                let ok = match args {
                    ["-l"] => true,
                    ["-c", rest @ ..] => {
                        !rest.is_empty() && rest.iter().all(|j| j.chars().all(|c| c.is_ascii_digit()))
                    }
                    _ => false,
                };
                if !ok {
                    return Err(sub_policy(base, "only -l or -c <job> are permitted"));
                }
            }
            "podman" => {
                let positional: Vec<&str> = args.iter().copied().filter(|a| !is_flag(a)).collect();
                let ok = match positional.as_slice() {
                    [sub, ..] if PODMAN_READ_ONLY.contains(sub) => true,
                    [object, action, ..] if PODMAN_OBJECTS.contains(object) => {
                        PODMAN_OBJECT_READ_ONLY.contains(action)
                    }
                    _ => false,
                };
                if !ok {
                    return Err(sub_policy(base, "only inspection subcommands are permitted"));
                }
            }
            "awk" => {
                if args
                    .iter()
                    .any(|a| self.awk_guards.iter().any(|g| g.is_match(a)))
                {
                    return Err(sub_policy(base, "program may not run commands or write output"));
                }
            }
            _ => {}
        }
        Ok(Vec::new())
    }

    fn check_cat(&self, args: &[&str]) -> Result<Vec<PolicyNotice>, PolicyViolation> {
        let mut notices = Vec::new();
        for path in args.iter().filter(|a| !a.starts_with('-')) {
            if self
                .safe_read_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
            {
                continue;
            }
            match self.unsafe_read {
                UnsafeReadPolicy::Warn => notices.push(PolicyNotice::SuspiciousRead {
                    path: path.to_string(),
                }),
                UnsafeReadPolicy::Deny => {
                    return Err(sub_policy("cat", format!("reading '{path}' is not permitted")));
                }
            }
        }
        Ok(notices)
    }

    fn check_mount(&self, args: &[&str]) -> Result<(), PolicyViolation> {
        let mut expect_type = false;
        for arg in args {
            if expect_type {
                expect_type = false;
                continue;
            }
            match *arg {
                "-t" | "--types" => expect_type = true,
                "-a" | "--all" => return Err(sub_policy("mount", "mounting from fstab is not allowed")),
                a if is_flag(a) => {}
                a => return Err(sub_policy("mount", format!("mounting '{a}' is not allowed"))),
            }
        }
        Ok(())
    }
}

use super::{finish, pick};
use crate::domain::{Category, Difficulty, TaskMeta, TaskParams};
use crate::probes;
use crate::sandbox::SandboxedExecutor;
use crate::task::{param, Task, TaskError};
use crate::validation::{ValidationCheck, ValidationResult};
use async_trait::async_trait;
use rand::RngCore;

const SCHEDULES: &[(&str, &str)] = &[
    ("0 2 * * *", "daily at 2:00 AM"),
    ("*/15 * * * *", "every 15 minutes"),
    ("0 */6 * * *", "every 6 hours"),
    ("0 0 * * 0", "weekly on Sunday at midnight"),
    ("30 1 * * 1-5", "weekdays at 1:30 AM"),
];

const COMMANDS: &[&str] = &[
    "/usr/bin/backup.sh",
    "/usr/local/bin/cleanup.sh",
    "echo \"Scheduled task\" >> /tmp/cronlog.txt",
];

struct CronJob {
    user: String,
    schedule: String,
    command: String,
}

/// Add an entry to a user's crontab. Full credit needs both the command and
/// the exact schedule; the command alone earns half.
/// Overrides: `username`, `schedule`, `schedule_desc`, `command`.
pub struct CronJobTask {
    meta: TaskMeta,
    job: Option<CronJob>,
}

impl CronJobTask {
    pub fn new() -> Self {
        Self {
            meta: TaskMeta::new("sched_cron_001", Category::Scheduling, Difficulty::Exam, 10),
            job: None,
        }
    }
}

impl Default for CronJobTask {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task for CronJobTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn generate(&mut self, params: &TaskParams, rng: &mut dyn RngCore) -> Result<(), TaskError> {
        let user = param::<String>(params, "username")?.unwrap_or_else(|| "root".to_string());
        let (schedule, schedule_desc) = match param::<String>(params, "schedule")? {
            Some(s) => {
                let desc = param::<String>(params, "schedule_desc")?.unwrap_or_else(|| s.clone());
                (s, desc)
            }
            None => {
                let (s, d) = pick(rng, SCHEDULES);
                (s.to_string(), d.to_string())
            }
        };
        let command = param::<String>(params, "command")?.unwrap_or_else(|| pick(rng, COMMANDS).to_string());

        self.meta.description = format!(
            "Create a cron job:\n  - User: {user}\n  - Schedule: {schedule_desc}\n  - Cron expression: {schedule}\n  - Command: {command}\n  - Use crontab command to configure"
        );
        self.meta.hints = vec![
            format!("Edit crontab: crontab -e (for current user) or crontab -e -u {user}"),
            format!("Add line: {schedule} {command}"),
            "Cron format: minute hour day month weekday command".to_string(),
            format!("Verify: crontab -l -u {user}"),
            "* means 'every'".to_string(),
            "*/15 means 'every 15th'".to_string(),
        ];
        self.job = Some(CronJob {
            user,
            schedule,
            command,
        });
        Ok(())
    }

    async fn check(&self, exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError> {
        let job = self.job.as_ref().ok_or(TaskError::NotGenerated)?;
        let crontab = probes::user_crontab(exec, &job.user).await;
        let check = match &crontab.value {
            None => ValidationCheck::fail(
                "crontab_exists",
                10,
                crontab.explain(format!("No crontab found for user {}", job.user)),
            ),
            Some(entries) => grade_entries(job, entries),
        };
        Ok(finish(&self.meta, vec![check], 0.7))
    }
}

/// Compares the five time fields, so `30 2 * * *` never passes for `0 2 * * *`.
fn schedule_matches(entry: &str, schedule: &str) -> bool {
    let expected: Vec<&str> = schedule.split_whitespace().collect();
    expected.len() == 5 && entry.split_whitespace().take(5).eq(expected.iter().copied())
}

fn grade_entries(job: &CronJob, entries: &[String]) -> ValidationCheck {
    let with_command: Vec<&String> = entries.iter().filter(|e| e.contains(&job.command)).collect();
    if with_command.iter().any(|e| schedule_matches(e, &job.schedule)) {
        return ValidationCheck::pass(
            "cron_entry_exact",
            10,
            "Cron job correctly configured with exact schedule",
        );
    }
    match with_command.first() {
        Some(entry) => ValidationCheck::new(
            "cron_entry_partial",
            false,
            5,
            Some(10),
            "Command found in crontab but schedule differs (partial credit)",
        )
        .with_details(entry.as_str()),
        None => ValidationCheck::fail(
            "cron_entry",
            10,
            format!("Cron job not found in crontab for user {}", job.user),
        ),
    }
}

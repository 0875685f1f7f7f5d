use crate::domain::{TaskId, TaskMeta};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub points: u32,
    pub max_points: u32,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationCheck {
    /// `max_points` falls back to `points` when omitted.
    pub fn new(
        name: impl Into<String>,
        passed: bool,
        points: u32,
        max_points: Option<u32>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed,
            points,
            max_points: max_points.unwrap_or(points),
            message: message.into(),
            details: None,
        }
    }

    pub fn pass(name: impl Into<String>, points: u32, message: impl Into<String>) -> Self {
        Self::new(name, true, points, None, message)
    }

    pub fn fail(name: impl Into<String>, max_points: u32, message: impl Into<String>) -> Self {
        Self::new(name, false, 0, Some(max_points), message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub task_id: TaskId,
    pub passed: bool,
    pub score: u32,
    pub max_score: u32,
    pub checks: Vec<ValidationCheck>,
    pub error_message: Option<String>,
}

impl ValidationResult {
    /// Sums the awarded points and passes when the score reaches
    /// `pass_threshold` (a fraction of `max_score`).
    pub fn from_checks(
        task_id: impl Into<String>,
        max_score: u32,
        checks: Vec<ValidationCheck>,
        pass_threshold: f64,
    ) -> Self {
        let score = checks.iter().fold(0u32, |acc, c| acc.saturating_add(c.points));
        let passed = f64::from(score) >= f64::from(max_score) * pass_threshold;
        Self {
            task_id: task_id.into(),
            passed,
            score,
            max_score,
            checks,
            error_message: None,
        }
    }

    /// Result used when checking could not produce a trustworthy score.
    pub fn faulted(meta: &TaskMeta, error: impl Into<String>) -> Self {
        Self {
            task_id: meta.id.clone(),
            passed: false,
            score: 0,
            max_score: meta.points,
            checks: Vec::new(),
            error_message: Some(error.into()),
        }
    }

    pub fn percentage(&self) -> f64 {
        if self.max_score == 0 {
            return 0.0;
        }
        f64::from(self.score) / f64::from(self.max_score) * 100.0
    }

    pub fn summary(&self) -> String {
        let status = if self.passed { "PASS" } else { "FAIL" };
        format!(
            "Score: {}/{} ({:.0}%) - {}",
            self.score,
            self.max_score,
            self.percentage(),
            status
        )
    }

    /// Checks the invariants the engine relies on for aggregation.
    pub fn verify(&self, meta: &TaskMeta) -> Result<(), String> {
        if self.task_id != meta.id {
            return Err(format!(
                "result names task '{}' but '{}' was checked",
                self.task_id, meta.id
            ));
        }
        if self.max_score != meta.points {
            return Err(format!(
                "max score {} does not match task points {}",
                self.max_score, meta.points
            ));
        }
        if self.score > self.max_score {
            return Err(format!(
                "score {} exceeds max score {}",
                self.score, self.max_score
            ));
        }
        for check in &self.checks {
            if check.points > check.max_points {
                return Err(format!(
                    "check '{}' awards {} of {} points",
                    check.name, check.points, check.max_points
                ));
            }
        }
        if !self.checks.is_empty() {
            let sum: u64 = self.checks.iter().map(|c| u64::from(c.points)).sum();
            if sum != u64::from(self.score) {
                return Err(format!(
                    "score {} differs from the sum of check points {}",
                    self.score, sum
                ));
            }
        }
        Ok(())
    }

    /// Every failed check must explain itself.
    pub(crate) fn fill_blank_messages(&mut self) {
        for check in self.checks.iter_mut() {
            if !check.passed && check.message.trim().is_empty() {
                check.message = format!("check '{}' failed", check.name);
            }
        }
        if let Some(msg) = &self.error_message {
            if msg.trim().is_empty() {
                self.error_message = Some("validation failed without a reason".to_string());
            }
        }
    }
}

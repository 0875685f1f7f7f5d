use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tasks_generated: u64,
    pub generation_failures: u64,
    pub validations_run: u64,
    pub validations_passed: u64,
    pub validations_failed: u64,
    pub check_faults: u64,
    pub commands_executed: u64,
    pub commands_rejected: u64,
    pub commands_timed_out: u64,
}

pub trait Metrics: Send + Sync {
    fn inc_task_generated(&self);
    fn inc_generation_failure(&self);
    fn record_validation(&self, passed: bool);
    fn inc_check_fault(&self);
    fn inc_command_executed(&self);
    fn inc_command_rejected(&self);
    fn inc_command_timed_out(&self);
    fn snapshot(&self) -> MetricsSnapshot;
}

pub type SharedMetrics = Arc<dyn Metrics>;

pub struct InMemoryMetrics {
    tasks_generated: AtomicU64,
    generation_failures: AtomicU64,
    validations_run: AtomicU64,
    validations_passed: AtomicU64,
    validations_failed: AtomicU64,
    check_faults: AtomicU64,
    commands_executed: AtomicU64,
    commands_rejected: AtomicU64,
    commands_timed_out: AtomicU64,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self {
            tasks_generated: AtomicU64::new(0),
            generation_failures: AtomicU64::new(0),
            validations_run: AtomicU64::new(0),
            validations_passed: AtomicU64::new(0),
            validations_failed: AtomicU64::new(0),
            check_faults: AtomicU64::new(0),
            commands_executed: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            commands_timed_out: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics for InMemoryMetrics {
    fn inc_task_generated(&self) {
        self.tasks_generated.fetch_add(1, Ordering::Relaxed);
    }
    fn inc_generation_failure(&self) {
        self.generation_failures.fetch_add(1, Ordering::Relaxed);
    }
    fn record_validation(&self, passed: bool) {
        self.validations_run.fetch_add(1, Ordering::Relaxed);
        if passed {
            self.validations_passed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.validations_failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    fn inc_check_fault(&self) {
        self.check_faults.fetch_add(1, Ordering::Relaxed);
    }
    fn inc_command_executed(&self) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
    }
    fn inc_command_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }
    fn inc_command_timed_out(&self) {
        self.commands_timed_out.fetch_add(1, Ordering::Relaxed);
    }
    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_generated: self.tasks_generated.load(Ordering::Relaxed),
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
            validations_run: self.validations_run.load(Ordering::Relaxed),
            validations_passed: self.validations_passed.load(Ordering::Relaxed),
            validations_failed: self.validations_failed.load(Ordering::Relaxed),
            check_faults: self.check_faults.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
            commands_timed_out: self.commands_timed_out.load(Ordering::Relaxed),
        }
    }
}

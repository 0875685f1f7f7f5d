use crate::domain::{Category, TaskMeta};
use crate::logging::{LogEvent, LogLevel, SharedEventLogger};
use crate::metrics::SharedMetrics;
use crate::sandbox::SandboxedExecutor;
use crate::scoring::{self, CategoryBreakdown, ScoreSummary};
use crate::task::Task;
use crate::validation::ValidationResult;
use futures_util::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Runs task checks one at a time and never lets a fault escape: an error,
/// a panic or a result that breaks the scoring invariants all come back as a
/// failed [`ValidationResult`] with score 0.
pub struct ValidationEngine {
    executor: Arc<SandboxedExecutor>,
    logger: SharedEventLogger,
    metrics: SharedMetrics,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl ValidationEngine {
    pub fn new(
        executor: Arc<SandboxedExecutor>,
        logger: SharedEventLogger,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            executor,
            logger,
            metrics,
        }
    }

    pub fn executor(&self) -> &SandboxedExecutor {
        &self.executor
    }

    pub async fn validate(&self, task: &dyn Task) -> ValidationResult {
        let meta = task.meta();
        self.logger.log(
            LogEvent::new(LogLevel::Debug, "validation.started")
                .with_task(meta.id.as_str())
                .with_category(meta.category.as_str()),
        );

        let outcome = AssertUnwindSafe(task.check(&self.executor))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(Ok(mut result)) => match result.verify(meta) {
                Ok(()) => {
                    result.fill_blank_messages();
                    result
                }
                Err(reason) => self.fault(meta, format!("malformed validation result: {reason}")),
            },
            Ok(Err(e)) => self.fault(meta, format!("validation error: {e}")),
            Err(payload) => self.fault(
                meta,
                format!("validation panicked: {}", panic_message(&*payload)),
            ),
        };

        self.metrics.record_validation(result.passed);
        self.logger.log(
            LogEvent::new(LogLevel::Info, "validation.finished")
                .with_task(meta.id.as_str())
                .with_category(meta.category.as_str())
                .with_field("passed", result.passed.to_string())
                .with_field("score", format!("{}/{}", result.score, result.max_score)),
        );
        result
    }

    fn fault(&self, meta: &TaskMeta, cause: String) -> ValidationResult {
        self.metrics.inc_check_fault();
        self.logger.log(
            LogEvent::new(LogLevel::Error, "validation.fault")
                .with_task(meta.id.as_str())
                .with_category(meta.category.as_str())
                .with_field("error", cause.as_str()),
        );
        ValidationResult::faulted(meta, cause)
    }

    pub async fn validate_many(&self, tasks: &[Box<dyn Task>]) -> Vec<ValidationResult> {
        self.validate_many_with_progress(tasks, |_, _| {}).await
    }

    /// Sequential and order preserving; `progress` gets `(completed, total)`
    /// after each task.
    pub async fn validate_many_with_progress<F>(
        &self,
        tasks: &[Box<dyn Task>],
        mut progress: F,
    ) -> Vec<ValidationResult>
    where
        F: FnMut(usize, usize),
    {
        let total = tasks.len();
        let mut results = Vec::with_capacity(total);
        for (i, task) in tasks.iter().enumerate() {
            results.push(self.validate(task.as_ref()).await);
            progress(i + 1, total);
        }
        results
    }

    pub fn total_score(&self, results: &[ValidationResult]) -> ScoreSummary {
        scoring::total_score(results)
    }

    pub fn category_breakdown<'a, I>(&self, pairs: I) -> BTreeMap<Category, CategoryBreakdown>
    where
        I: IntoIterator<Item = (&'a TaskMeta, &'a ValidationResult)>,
    {
        scoring::category_breakdown(pairs)
    }
}

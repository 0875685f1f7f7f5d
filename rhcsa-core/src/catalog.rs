use crate::config::ExamConfig;
use crate::domain::{Category, Difficulty, TaskId, TaskParams};
use crate::logging::{LogEvent, LogLevel, SharedEventLogger};
use crate::metrics::SharedMetrics;
use crate::task::{Task, TaskConstructor};
use rand::seq::SliceRandom;
use rand::RngCore;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

struct Entry {
    difficulty: Difficulty,
    ctor: TaskConstructor,
}

/// Registry of task constructors, grouped by category.
///
/// Registration needs `&mut self` and happens at startup; afterwards the
/// catalog is only read. Categories iterate in their declared order, so a
/// seeded random source reproduces the same batch.
pub struct TaskCatalog {
    entries: BTreeMap<Category, Vec<Entry>>,
    config: ExamConfig,
    logger: SharedEventLogger,
    metrics: SharedMetrics,
}

impl TaskCatalog {
    pub fn new(config: ExamConfig, logger: SharedEventLogger, metrics: SharedMetrics) -> Self {
        Self {
            entries: BTreeMap::new(),
            config,
            logger,
            metrics,
        }
    }

    pub fn config(&self) -> &ExamConfig {
        &self.config
    }

    /// Appends a constructor. Registering the same constructor twice doubles
    /// its selection weight.
    pub fn register<F>(&mut self, category: Category, ctor: F)
    where
        F: Fn() -> Box<dyn Task> + Send + Sync + 'static,
    {
        let difficulty = ctor().meta().difficulty;
        self.entries.entry(category).or_default().push(Entry {
            difficulty,
            ctor: Arc::new(ctor),
        });
    }

    pub fn categories(&self) -> BTreeSet<Category> {
        self.entries
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(c, _)| *c)
            .collect()
    }

    pub fn count(&self, category: Option<Category>) -> usize {
        match category {
            Some(c) => self.entries.get(&c).map_or(0, Vec::len),
            None => self.entries.values().map(Vec::len).sum(),
        }
    }

    /// Picks a constructor uniformly and generates an instance with no
    /// overrides. The difficulty filter is dropped when nothing matches it.
    pub fn random_task(
        &self,
        rng: &mut dyn RngCore,
        category: Option<Category>,
        difficulty: Option<Difficulty>,
    ) -> Option<Box<dyn Task>> {
        let candidates: Vec<&Entry> = match category {
            Some(c) => self.entries.get(&c)?.iter().collect(),
            None => self.entries.values().flatten().collect(),
        };

        let filtered: Vec<&Entry> = match difficulty {
            Some(d) => candidates
                .iter()
                .copied()
                .filter(|e| e.difficulty == d)
                .collect(),
            None => Vec::new(),
        };
        let pool = if filtered.is_empty() { candidates } else { filtered };

        let entry = pool.choose(&mut *rng)?;
        let mut task = (entry.ctor)();
        if let Err(e) = task.generate(&TaskParams::new(), rng) {
            self.metrics.inc_generation_failure();
            self.logger.log(
                LogEvent::new(LogLevel::Warn, "catalog.generation_failed")
                    .with_task(task.meta().id.as_str())
                    .with_category(task.meta().category.as_str())
                    .with_field("error", e.to_string()),
            );
            return None;
        }
        self.metrics.inc_task_generated();
        self.logger.log(
            LogEvent::new(LogLevel::Debug, "task.generated")
                .with_task(task.meta().id.as_str())
                .with_category(task.meta().category.as_str()),
        );
        Some(task)
    }

    /// Generates up to `count` tasks, rotating through `categories` (all
    /// registered ones when `None`) and skipping ids already in
    /// `exclude_ids`. Accepted ids are added to `exclude_ids`. Gives up after
    /// `count * 10` attempts and returns what it has.
    pub fn random_tasks(
        &self,
        rng: &mut dyn RngCore,
        count: usize,
        categories: Option<&[Category]>,
        difficulty: Option<Difficulty>,
        exclude_ids: &mut HashSet<TaskId>,
    ) -> Vec<Box<dyn Task>> {
        let rotation: Vec<Category> = match categories {
            Some(requested) => requested
                .iter()
                .copied()
                .filter(|c| self.count(Some(*c)) > 0)
                .collect(),
            None => self.categories().into_iter().collect(),
        };

        let mut tasks: Vec<Box<dyn Task>> = Vec::with_capacity(count);
        if !rotation.is_empty() {
            let max_attempts = count.saturating_mul(10);
            let mut attempts = 0;
            while tasks.len() < count && attempts < max_attempts {
                attempts += 1;
                let category = rotation[tasks.len() % rotation.len()];
                let Some(task) = self.random_task(rng, Some(category), difficulty) else {
                    continue;
                };
                if exclude_ids.contains(&task.meta().id) {
                    self.logger.log(
                        LogEvent::new(LogLevel::Debug, "catalog.duplicate_skipped")
                            .with_task(task.meta().id.as_str())
                            .with_category(category.as_str()),
                    );
                    continue;
                }
                exclude_ids.insert(task.meta().id.clone());
                tasks.push(task);
            }
        }

        if tasks.len() < count {
            self.logger.log(
                LogEvent::new(LogLevel::Warn, "catalog.batch_short")
                    .with_field("requested", count.to_string())
                    .with_field("generated", tasks.len().to_string()),
            );
        }
        tasks
    }

    /// A full exam at `exam` difficulty across every registered category.
    pub fn exam_tasks(&self, rng: &mut dyn RngCore, count: Option<usize>) -> Vec<Box<dyn Task>> {
        let count = count.unwrap_or(self.config.default_exam_tasks);
        self.random_tasks(rng, count, None, Some(Difficulty::Exam), &mut HashSet::new())
    }

    pub fn practice_tasks(
        &self,
        rng: &mut dyn RngCore,
        category: Category,
        difficulty: Option<Difficulty>,
        count: Option<usize>,
    ) -> Vec<Box<dyn Task>> {
        let count = count.unwrap_or(self.config.default_practice_tasks);
        self.random_tasks(
            rng,
            count,
            Some(std::slice::from_ref(&category)),
            Some(difficulty.unwrap_or(Difficulty::Exam)),
            &mut HashSet::new(),
        )
    }
}

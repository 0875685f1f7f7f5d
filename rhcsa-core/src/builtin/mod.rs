//! Concrete tasks shipped with the core.

mod networking;
mod permissions;
mod scheduling;
mod selinux;
mod services;
mod users_groups;

pub use networking::HostnameTask;
pub use permissions::{FileOwnershipTask, FilePermissionsTask};
pub use scheduling::CronJobTask;
pub use selinux::SelinuxModeTask;
pub use services::EnableServiceTask;
pub use users_groups::{CreateGroupTask, CreateUserTask};

use crate::catalog::TaskCatalog;
use crate::domain::{Category, TaskMeta};
use crate::validation::{ValidationCheck, ValidationResult};
use rand::{Rng, RngCore};

/// Registers every built-in task type. Call once at startup.
pub fn register_builtin_tasks(catalog: &mut TaskCatalog) {
    catalog.register(Category::Permissions, || Box::new(FilePermissionsTask::new()));
    catalog.register(Category::Permissions, || Box::new(FileOwnershipTask::new()));
    catalog.register(Category::UsersGroups, || Box::new(CreateUserTask::new()));
    catalog.register(Category::UsersGroups, || Box::new(CreateGroupTask::new()));
    catalog.register(Category::Services, || Box::new(EnableServiceTask::new()));
    catalog.register(Category::Selinux, || Box::new(SelinuxModeTask::new()));
    catalog.register(Category::Scheduling, || Box::new(CronJobTask::new()));
    catalog.register(Category::Networking, || Box::new(HostnameTask::new()));
}

fn pick<T: Copy>(rng: &mut dyn RngCore, options: &[T]) -> T {
    options[rng.gen_range(0..options.len())]
}

fn suffix(rng: &mut dyn RngCore) -> u32 {
    rng.gen_range(1..=99)
}

fn finish(meta: &TaskMeta, checks: Vec<ValidationCheck>, threshold: f64) -> ValidationResult {
    ValidationResult::from_checks(meta.id.clone(), meta.points, checks, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExamConfig;
    use crate::domain::TaskParams;
    use crate::logging::noop_logger;
    use crate::metrics::InMemoryMetrics;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    #[test]
    fn registers_every_builtin() {
        let mut catalog = TaskCatalog::new(
            ExamConfig::default(),
            noop_logger(),
            Arc::new(InMemoryMetrics::new()),
        );
        register_builtin_tasks(&mut catalog);
        assert_eq!(catalog.count(None), 8);
        assert_eq!(catalog.count(Some(Category::Permissions)), 2);
        assert_eq!(catalog.count(Some(Category::Lvm)), 0);
        assert_eq!(catalog.categories().len(), 6);
    }

    #[test]
    fn every_builtin_generates_a_description() {
        let mut catalog = TaskCatalog::new(
            ExamConfig::default(),
            noop_logger(),
            Arc::new(InMemoryMetrics::new()),
        );
        register_builtin_tasks(&mut catalog);
        let mut rng = StdRng::seed_from_u64(11);
        for category in catalog.categories() {
            let task = catalog
                .random_task(&mut rng, Some(category), None)
                .expect("generated");
            assert_eq!(task.meta().category, category);
            assert!(!task.meta().description.is_empty());
            assert!(!task.meta().hints.is_empty());
            assert!(task.meta().points > 0);
        }
    }

    #[test]
    fn bad_override_fails_generation() {
        let mut task = FilePermissionsTask::new();
        let mut params = TaskParams::new();
        params.insert("perms".to_string(), "rwxr-x---".to_string());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(crate::task::Task::generate(&mut task, &params, &mut rng).is_err());
    }
}

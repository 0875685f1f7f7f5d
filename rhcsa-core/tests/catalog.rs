use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rhcsa_core::catalog::TaskCatalog;
use rhcsa_core::config::ExamConfig;
use rhcsa_core::domain::{Category, Difficulty, TaskMeta, TaskParams};
use rhcsa_core::logging::{noop_logger, BufferedEventLogger};
use rhcsa_core::metrics::{InMemoryMetrics, Metrics};
use rhcsa_core::sandbox::SandboxedExecutor;
use rhcsa_core::task::{Task, TaskError};
use rhcsa_core::validation::ValidationResult;
use std::collections::HashSet;
use std::sync::Arc;

struct StubTask {
    meta: TaskMeta,
    fail_generate: bool,
}

#[async_trait]
impl Task for StubTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn generate(&mut self, _params: &TaskParams, rng: &mut dyn RngCore) -> Result<(), TaskError> {
        if self.fail_generate {
            return Err(TaskError::Check("no scenario available".to_string()));
        }
        self.meta.description = format!("stub scenario {}", rng.next_u32() % 100);
        Ok(())
    }

    async fn check(&self, _exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError> {
        Ok(ValidationResult::from_checks(self.meta.id.clone(), self.meta.points, vec![], 0.7))
    }
}

fn stub(
    id: &'static str,
    category: Category,
    difficulty: Difficulty,
) -> impl Fn() -> Box<dyn Task> + Send + Sync + 'static {
    move || -> Box<dyn Task> {
        Box::new(StubTask {
            meta: TaskMeta::new(id, category, difficulty, 5),
            fail_generate: false,
        })
    }
}

fn catalog() -> TaskCatalog {
    TaskCatalog::new(ExamConfig::default(), noop_logger(), Arc::new(InMemoryMetrics::new()))
}

fn three_categories() -> TaskCatalog {
    let mut c = catalog();
    for id in ["perm_a", "perm_b", "perm_c"] {
        c.register(Category::Permissions, stub(id, Category::Permissions, Difficulty::Exam));
    }
    for id in ["net_a", "net_b", "net_c"] {
        c.register(Category::Networking, stub(id, Category::Networking, Difficulty::Exam));
    }
    for id in ["svc_a", "svc_b", "svc_c"] {
        c.register(Category::Services, stub(id, Category::Services, Difficulty::Exam));
    }
    c
}

fn ids(tasks: &[Box<dyn Task>]) -> Vec<String> {
    tasks.iter().map(|t| t.meta().id.clone()).collect()
}

#[test]
fn counts_and_categories() {
    let mut c = three_categories();
    c.register(Category::Permissions, stub("perm_a", Category::Permissions, Difficulty::Exam));

    assert_eq!(c.count(None), 10);
    assert_eq!(c.count(Some(Category::Permissions)), 4);
    assert_eq!(c.count(Some(Category::Lvm)), 0);
    let cats: Vec<_> = c.categories().into_iter().collect();
    assert_eq!(cats, vec![Category::Permissions, Category::Networking, Category::Services]);
}

#[test]
fn round_robin_is_deterministic_under_seed() {
    let c = three_categories();

    let mut rng = StdRng::seed_from_u64(7);
    let mut seen = HashSet::new();
    let first = c.random_tasks(&mut rng, 6, None, None, &mut seen);
    let categories: Vec<_> = first.iter().map(|t| t.meta().category).collect();
    assert_eq!(
        categories,
        vec![
            Category::Permissions,
            Category::Networking,
            Category::Services,
            Category::Permissions,
            Category::Networking,
            Category::Services,
        ]
    );
    assert_eq!(seen.len(), 6);

    let mut rng = StdRng::seed_from_u64(7);
    let second = c.random_tasks(&mut rng, 6, None, None, &mut HashSet::new());
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn unregistered_categories_leave_the_rotation() {
    let c = three_categories();
    let mut rng = StdRng::seed_from_u64(3);
    let tasks = c.random_tasks(
        &mut rng,
        4,
        Some(&[Category::Lvm, Category::Services, Category::Permissions][..]),
        None,
        &mut HashSet::new(),
    );
    let categories: Vec<_> = tasks.iter().map(|t| t.meta().category).collect();
    assert_eq!(
        categories,
        vec![
            Category::Services,
            Category::Permissions,
            Category::Services,
            Category::Permissions,
        ]
    );

    let none = c.random_tasks(&mut rng, 2, Some(&[Category::Boot][..]), None, &mut HashSet::new());
    assert!(none.is_empty());
}

#[test]
fn excluded_ids_are_skipped_and_batch_comes_back_short() {
    let logger = Arc::new(BufferedEventLogger::new(100, 10));
    let mut c = TaskCatalog::new(ExamConfig::default(), logger.clone(), Arc::new(InMemoryMetrics::new()));
    c.register(Category::Selinux, stub("selinux_mode_001", Category::Selinux, Difficulty::Easy));
    c.register(Category::Selinux, stub("selinux_bool_001", Category::Selinux, Difficulty::Easy));

    let mut exclude: HashSet<String> = ["selinux_bool_001".to_string()].into_iter().collect();
    let mut rng = StdRng::seed_from_u64(42);
    let tasks = c.random_tasks(&mut rng, 3, None, None, &mut exclude);

    assert_eq!(ids(&tasks), vec!["selinux_mode_001".to_string()]);
    assert!(exclude.contains("selinux_mode_001"));
    let (_, events) = logger.events_since(0);
    assert!(events.iter().any(|e| e.message == "catalog.batch_short"));
    assert!(events.iter().any(|e| e.message == "catalog.duplicate_skipped"));
}

#[test]
fn difficulty_filter_applies_only_when_something_matches() {
    let mut c = catalog();
    c.register(Category::Lvm, stub("lvm_easy", Category::Lvm, Difficulty::Easy));
    c.register(Category::Lvm, stub("lvm_hard", Category::Lvm, Difficulty::Hard));
    c.register(Category::Boot, stub("boot_easy", Category::Boot, Difficulty::Easy));

    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..20 {
        let t = c.random_task(&mut rng, Some(Category::Lvm), Some(Difficulty::Hard)).unwrap();
        assert_eq!(t.meta().id, "lvm_hard");
    }
    let fallback = c.random_task(&mut rng, Some(Category::Boot), Some(Difficulty::Hard));
    assert_eq!(fallback.unwrap().meta().id, "boot_easy");
    assert!(c.random_task(&mut rng, Some(Category::Containers), None).is_none());
}

#[test]
fn generation_failure_yields_none() {
    let metrics = Arc::new(InMemoryMetrics::new());
    let mut c = TaskCatalog::new(ExamConfig::default(), noop_logger(), metrics.clone());
    c.register(Category::Processes, || {
        Box::new(StubTask {
            meta: TaskMeta::new("proc_broken", Category::Processes, Difficulty::Exam, 5),
            fail_generate: true,
        })
    });

    let mut rng = StdRng::seed_from_u64(1);
    assert!(c.random_task(&mut rng, None, None).is_none());
    assert_eq!(metrics.snapshot().generation_failures, 1);
    assert_eq!(metrics.snapshot().tasks_generated, 0);
}

#[test]
fn exam_and_practice_use_configured_defaults() {
    let config = ExamConfig {
        default_exam_tasks: 2,
        default_practice_tasks: 1,
        ..ExamConfig::default()
    };
    let mut c = TaskCatalog::new(config, noop_logger(), Arc::new(InMemoryMetrics::new()));
    c.register(Category::Containers, stub("ctr_easy", Category::Containers, Difficulty::Easy));
    c.register(Category::Containers, stub("ctr_exam", Category::Containers, Difficulty::Exam));
    c.register(Category::Boot, stub("boot_exam", Category::Boot, Difficulty::Exam));

    let mut rng = StdRng::seed_from_u64(9);
    let exam = c.exam_tasks(&mut rng, None);
    assert_eq!(exam.len(), 2);
    assert!(exam.iter().all(|t| t.meta().difficulty == Difficulty::Exam));

    for _ in 0..10 {
        let practice = c.practice_tasks(&mut rng, Category::Containers, None, None);
        assert_eq!(ids(&practice), vec!["ctr_exam".to_string()]);
    }
    let easy = c.practice_tasks(&mut rng, Category::Containers, Some(Difficulty::Easy), Some(1));
    assert_eq!(ids(&easy), vec!["ctr_easy".to_string()]);
}

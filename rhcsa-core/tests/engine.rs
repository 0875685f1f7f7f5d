use async_trait::async_trait;
use rand::RngCore;
use rhcsa_core::config::SandboxConfig;
use rhcsa_core::domain::{Category, Difficulty, TaskMeta, TaskParams};
use rhcsa_core::engine::ValidationEngine;
use rhcsa_core::logging::{noop_logger, BufferedEventLogger};
use rhcsa_core::metrics::{InMemoryMetrics, Metrics};
use rhcsa_core::sandbox::SandboxedExecutor;
use rhcsa_core::task::{Task, TaskError};
use rhcsa_core::validation::{ValidationCheck, ValidationResult};
use std::sync::Arc;

#[derive(Clone, Copy)]
enum Behaviour {
    Scores(u32),
    Errors,
    Panics,
    InflatesScore,
    OverflowingChecks,
    WrongId,
    BlankFailure,
    RunsForbiddenCommand,
}

struct ScriptedTask {
    meta: TaskMeta,
    behaviour: Behaviour,
}

impl ScriptedTask {
    fn boxed(id: &str, category: Category, points: u32, behaviour: Behaviour) -> Box<dyn Task> {
        Box::new(Self {
            meta: TaskMeta::new(id, category, Difficulty::Exam, points),
            behaviour,
        })
    }
}

#[async_trait]
impl Task for ScriptedTask {
    fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    fn generate(&mut self, _params: &TaskParams, _rng: &mut dyn RngCore) -> Result<(), TaskError> {
        Ok(())
    }

    async fn check(&self, exec: &SandboxedExecutor) -> Result<ValidationResult, TaskError> {
        let id = self.meta.id.clone();
        let points = self.meta.points;
        match self.behaviour {
            Behaviour::Scores(score) => {
                let check = if score == points {
                    ValidationCheck::pass("state", points, "state matches")
                } else {
                    ValidationCheck::new("state", false, score, Some(points), "state differs")
                };
                Ok(ValidationResult::from_checks(id, points, vec![check], 0.7))
            }
            Behaviour::Errors => Err(TaskError::Check("probe exploded".to_string())),
            Behaviour::Panics => panic!("check blew up"),
            Behaviour::InflatesScore => {
                let mut r = ValidationResult::from_checks(id, points, vec![], 0.7);
                r.score = points + 1;
                r.passed = true;
                Ok(r)
            }
            Behaviour::OverflowingChecks => Ok(ValidationResult {
                task_id: id,
                passed: true,
                score: 5,
                max_score: points,
                checks: vec![
                    ValidationCheck::pass("huge", u32::MAX, "ok"),
                    ValidationCheck::pass("small", 6, "ok"),
                ],
                error_message: None,
            }),
            Behaviour::WrongId => Ok(ValidationResult::from_checks("someone_else", points, vec![], 0.7)),
            Behaviour::BlankFailure => Ok(ValidationResult::from_checks(
                id,
                points,
                vec![ValidationCheck::fail("state", points, "  ")],
                0.7,
            )),
            Behaviour::RunsForbiddenCommand => {
                exec.execute(&["rm", "-rf", "/tmp/rhcsa-never"], None).await?;
                Ok(ValidationResult::from_checks(id, points, vec![], 0.7))
            }
        }
    }
}

fn engine(metrics: Arc<InMemoryMetrics>) -> ValidationEngine {
    let executor = SandboxedExecutor::new(&SandboxConfig::default(), noop_logger(), metrics.clone()).unwrap();
    ValidationEngine::new(Arc::new(executor), noop_logger(), metrics)
}

#[tokio::test]
async fn faults_become_failed_results() {
    let metrics = Arc::new(InMemoryMetrics::new());
    let engine = engine(metrics.clone());

    let cases = [
        (Behaviour::Errors, "probe exploded"),
        (Behaviour::Panics, "check blew up"),
        (Behaviour::InflatesScore, "exceeds max score"),
        (Behaviour::OverflowingChecks, "sum of check points"),
        (Behaviour::WrongId, "someone_else"),
        (Behaviour::RunsForbiddenCommand, "not in the allowed list"),
    ];
    for (behaviour, cause) in cases {
        let task = ScriptedTask::boxed("svc_fault", Category::Services, 6, behaviour);
        let result = engine.validate(task.as_ref()).await;
        assert_eq!(result.task_id, "svc_fault");
        assert!(!result.passed);
        assert_eq!(result.score, 0);
        assert_eq!(result.max_score, 6);
        let message = result.error_message.expect("fault carries a message");
        assert!(message.contains(cause), "{message}");
    }

    let snap = metrics.snapshot();
    assert_eq!(snap.check_faults, 6);
    assert_eq!(snap.validations_failed, 6);
    assert_eq!(snap.commands_rejected, 1);
}

#[tokio::test]
async fn blank_failure_messages_are_filled_in() {
    let engine = engine(Arc::new(InMemoryMetrics::new()));
    let task = ScriptedTask::boxed("perm_blank", Category::Permissions, 3, Behaviour::BlankFailure);
    let result = engine.validate(task.as_ref()).await;
    assert!(result.error_message.is_none());
    assert!(!result.checks[0].message.trim().is_empty());
}

#[tokio::test]
async fn validate_many_keeps_order_and_reports_progress() {
    let logger = Arc::new(BufferedEventLogger::new(100, 10));
    let metrics = Arc::new(InMemoryMetrics::new());
    let executor = SandboxedExecutor::new(&SandboxConfig::default(), noop_logger(), metrics.clone()).unwrap();
    let engine = ValidationEngine::new(Arc::new(executor), logger.clone(), metrics.clone());

    let tasks = vec![
        ScriptedTask::boxed("a", Category::Permissions, 4, Behaviour::Scores(4)),
        ScriptedTask::boxed("b", Category::Permissions, 4, Behaviour::Panics),
        ScriptedTask::boxed("c", Category::Lvm, 5, Behaviour::Scores(1)),
    ];
    let mut progress = Vec::new();
    let results = engine
        .validate_many_with_progress(&tasks, |done, total| progress.push((done, total)))
        .await;

    let ids: Vec<_> = results.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(metrics.snapshot().validations_passed, 1);

    let (_, events) = logger.events_since(0);
    assert_eq!(events.iter().filter(|e| e.message == "validation.finished").count(), 3);
    assert!(logger
        .task_events_tail("b", 10)
        .iter()
        .any(|e| e.message == "validation.fault"));

    let plain = engine.validate_many(&tasks[..1]).await;
    assert_eq!(plain.len(), 1);
    assert!(plain[0].passed);
}

#[tokio::test]
async fn totals_and_breakdown() {
    let engine = engine(Arc::new(InMemoryMetrics::new()));
    let tasks = vec![
        ScriptedTask::boxed("perm_1", Category::Permissions, 10, Behaviour::Scores(10)),
        ScriptedTask::boxed("perm_2", Category::Permissions, 10, Behaviour::Scores(0)),
        ScriptedTask::boxed("svc_1", Category::Services, 5, Behaviour::Errors),
    ];
    let results = engine.validate_many(&tasks).await;

    let total = engine.total_score(&results);
    assert_eq!((total.score, total.max_score), (10, 25));
    assert_eq!(total.percentage, 40.0);
    assert!(!total.passes(0.7));

    let breakdown = engine.category_breakdown(tasks.iter().map(|t| t.meta()).zip(&results));
    let perms = &breakdown[&Category::Permissions];
    assert_eq!(perms.total_points, 20);
    assert_eq!(perms.earned_points, 10);
    assert_eq!(perms.task_count, 2);
    assert_eq!(perms.passed_count, 1);
    assert_eq!(perms.percentage, 50.0);

    let services = &breakdown[&Category::Services];
    assert_eq!((services.earned_points, services.total_points), (0, 5));
    assert_eq!(services.percentage, 0.0);
}

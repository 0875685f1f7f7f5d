use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rhcsa_core::builtin::register_builtin_tasks;
use rhcsa_core::catalog::TaskCatalog;
use rhcsa_core::config::{ExamConfig, SandboxConfig};
use rhcsa_core::domain::{Category, Difficulty, TaskMeta};
use rhcsa_core::engine::ValidationEngine;
use rhcsa_core::logging::{LogLevel, SharedEventLogger, StderrEventLogger};
use rhcsa_core::metrics::{InMemoryMetrics, Metrics, MetricsSnapshot};
use rhcsa_core::sandbox::SandboxedExecutor;
use rhcsa_core::scoring::{CategoryBreakdown, ScoreSummary};
use rhcsa_core::task::Task;
use rhcsa_core::validation::ValidationResult;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

#[derive(Parser)]
#[command(name = "rhcsa", about = "RHCSA practice exams checked against the live system")]
pub struct Cli {
    /// TOML file with [sandbox] and [exam] tables; defaults apply when missing
    #[arg(long)]
    pub config: Option<String>,
    /// Log every sandbox and validation event to stderr
    #[arg(long, short)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List registered task types per category
    Catalog,
    /// Generate a full exam, wait for the attempt, then grade it
    Exam {
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Write the graded report as JSON
        #[arg(long)]
        json: Option<String>,
    },
    /// Practice a single category
    Practice {
        category: Category,
        #[arg(long)]
        difficulty: Option<Difficulty>,
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        json: Option<String>,
    },
    /// Check a command against the sandbox policy and run it if allowed
    Probe {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        argv: Vec<String>,
    },
}

#[derive(Default, serde::Deserialize)]
struct GlobalConfig {
    sandbox: Option<SandboxConfig>,
    exam: Option<ExamConfig>,
}

fn load_global_config(path: Option<String>) -> anyhow::Result<GlobalConfig> {
    let path = path.unwrap_or_else(|| "rhcsa.toml".to_string());
    match std::fs::read_to_string(&path) {
        Ok(s) => toml::from_str::<GlobalConfig>(&s).with_context(|| format!("parsing {path}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GlobalConfig::default()),
        Err(e) => Err(e).with_context(|| format!("reading {path}")),
    }
}

struct App {
    catalog: TaskCatalog,
    engine: ValidationEngine,
    metrics: Arc<InMemoryMetrics>,
    pass_threshold: f64,
}

fn build_app(cli: &Cli) -> anyhow::Result<App> {
    let gc = load_global_config(cli.config.clone())?;
    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Warn };
    let logger: SharedEventLogger = Arc::new(StderrEventLogger::new(level));
    let metrics = Arc::new(InMemoryMetrics::new());

    let sandbox = gc.sandbox.unwrap_or_default();
    let exam = gc.exam.unwrap_or_default();
    let pass_threshold = exam.pass_threshold;

    let executor = SandboxedExecutor::new(&sandbox, logger.clone(), metrics.clone())
        .context("invalid sandbox configuration")?;
    let engine = ValidationEngine::new(Arc::new(executor), logger.clone(), metrics.clone());
    let mut catalog = TaskCatalog::new(exam, logger, metrics.clone());
    register_builtin_tasks(&mut catalog);

    Ok(App {
        catalog,
        engine,
        metrics,
        pass_threshold,
    })
}

#[derive(serde::Serialize)]
struct GradedTask<'a> {
    task: &'a TaskMeta,
    result: &'a ValidationResult,
}

#[derive(serde::Serialize)]
struct Report<'a> {
    generated_at: chrono::DateTime<chrono::Utc>,
    tasks: Vec<GradedTask<'a>>,
    total: ScoreSummary,
    passed: bool,
    categories: BTreeMap<Category, CategoryBreakdown>,
    metrics: MetricsSnapshot,
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

async fn wait_for_enter() -> anyhow::Result<()> {
    println!();
    println!("Complete the tasks on this machine, then press Enter to grade.");
    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(())
}

fn print_tasks(tasks: &[Box<dyn Task>]) {
    for (i, task) in tasks.iter().enumerate() {
        let meta = task.meta();
        println!();
        println!(
            "Task {} [{}] {} ({} points)",
            i + 1,
            meta.category,
            meta.difficulty,
            meta.points
        );
        println!("{}", meta.description);
    }
}

async fn grade(app: &App, tasks: Vec<Box<dyn Task>>, json: Option<String>) -> anyhow::Result<()> {
    if tasks.is_empty() {
        anyhow::bail!("no tasks could be generated for this selection");
    }
    print_tasks(&tasks);
    wait_for_enter().await?;

    let results = app
        .engine
        .validate_many_with_progress(&tasks, |done, total| {
            eprintln!("validated {done}/{total}");
        })
        .await;

    println!();
    for (task, result) in tasks.iter().zip(&results) {
        println!("{} {}", task.meta().id, result.summary());
        for check in &result.checks {
            let mark = if check.passed { "ok" } else { "--" };
            println!(
                "  [{mark}] {} {}/{}: {}",
                check.name, check.points, check.max_points, check.message
            );
        }
        if let Some(err) = &result.error_message {
            println!("  error: {err}");
        }
    }

    let total = app.engine.total_score(&results);
    let passed = total.passes(app.pass_threshold);
    let categories = app
        .engine
        .category_breakdown(tasks.iter().map(|t| t.meta()).zip(&results));

    println!();
    for (category, b) in &categories {
        println!(
            "{:<14} {}/{} ({:.0}%), {}/{} tasks passed",
            category.as_str(),
            b.earned_points,
            b.total_points,
            b.percentage,
            b.passed_count,
            b.task_count
        );
    }
    println!(
        "Total: {}/{} ({:.1}%) - {}",
        total.score,
        total.max_score,
        total.percentage,
        if passed { "PASS" } else { "FAIL" }
    );

    if let Some(path) = json {
        let report = Report {
            generated_at: chrono::Utc::now(),
            tasks: tasks
                .iter()
                .zip(&results)
                .map(|(t, r)| GradedTask {
                    task: t.meta(),
                    result: r,
                })
                .collect(),
            total,
            passed,
            categories,
            metrics: app.metrics.snapshot(),
        };
        let body = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, body).with_context(|| format!("writing {path}"))?;
        println!("Report written to {path}");
    }
    Ok(())
}

async fn probe(app: &App, argv: &[String]) -> anyhow::Result<()> {
    let exec = app.engine.executor();
    match exec.can_execute(argv) {
        Ok(()) => println!("policy: allowed"),
        Err(violation) => {
            println!("policy: rejected ({violation})");
            return Ok(());
        }
    }
    let result = exec.execute_safe(argv, None).await;
    println!("return code: {}", result.return_code);
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }
    if let Some(err) = result.error_message {
        println!("error: {err}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app = build_app(&cli)?;

    match cli.command {
        Command::Catalog => {
            for category in Category::ALL {
                println!(
                    "{:<14} {:>2}  {}",
                    category.as_str(),
                    app.catalog.count(Some(category)),
                    category.objective()
                );
            }
            println!("{:<14} {:>2}", "total", app.catalog.count(None));
        }
        Command::Exam { count, seed, json } => {
            let mut rng = rng_from(seed);
            let tasks = app.catalog.exam_tasks(&mut rng, count);
            let minutes = app.catalog.config().duration_minutes;
            println!("RHCSA practice exam: {} tasks, {minutes} minutes suggested", tasks.len());
            grade(&app, tasks, json).await?;
        }
        Command::Practice {
            category,
            difficulty,
            count,
            seed,
            json,
        } => {
            let mut rng = rng_from(seed);
            let tasks = app
                .catalog
                .practice_tasks(&mut rng, category, difficulty, count);
            println!("Practice: {category} ({} tasks)", tasks.len());
            grade(&app, tasks, json).await?;
        }
        Command::Probe { argv } => probe(&app, &argv).await?,
    }
    Ok(())
}

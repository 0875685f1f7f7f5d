use crate::domain::{Category, TaskMeta};
use crate::validation::ValidationResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreSummary {
    pub score: u32,
    pub max_score: u32,
    pub percentage: f64,
}

impl ScoreSummary {
    /// Exam-level decision; `threshold` is a fraction such as 0.70.
    pub fn passes(&self, threshold: f64) -> bool {
        self.max_score > 0 && self.percentage >= threshold * 100.0
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryBreakdown {
    pub total_points: u32,
    pub earned_points: u32,
    pub task_count: u32,
    pub passed_count: u32,
    pub percentage: f64,
}

fn percent(earned: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(earned) / f64::from(total) * 100.0
}

pub fn total_score<'a, I>(results: I) -> ScoreSummary
where
    I: IntoIterator<Item = &'a ValidationResult>,
{
    let (score, max_score) = results.into_iter().fold((0u32, 0u32), |(s, m), r| {
        (s.saturating_add(r.score), m.saturating_add(r.max_score))
    });
    ScoreSummary {
        score,
        max_score,
        percentage: percent(score, max_score),
    }
}

pub fn category_breakdown<'a, I>(pairs: I) -> BTreeMap<Category, CategoryBreakdown>
where
    I: IntoIterator<Item = (&'a TaskMeta, &'a ValidationResult)>,
{
    let mut out: BTreeMap<Category, CategoryBreakdown> = BTreeMap::new();
    for (meta, result) in pairs {
        let entry = out.entry(meta.category).or_default();
        entry.total_points = entry.total_points.saturating_add(result.max_score);
        entry.earned_points = entry.earned_points.saturating_add(result.score);
        entry.task_count += 1;
        if result.passed {
            entry.passed_count += 1;
        }
    }
    for entry in out.values_mut() {
        entry.percentage = percent(entry.earned_points, entry.total_points);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Difficulty;

    fn result(id: &str, score: u32, max: u32, passed: bool) -> ValidationResult {
        ValidationResult {
            task_id: id.to_string(),
            passed,
            score,
            max_score: max,
            checks: vec![],
            error_message: None,
        }
    }

    #[test]
    fn total_score_sums_and_handles_empty() {
        let results = vec![result("a", 8, 10, true), result("b", 2, 10, false)];
        let s = total_score(&results);
        assert_eq!((s.score, s.max_score), (10, 20));
        assert_eq!(s.percentage, 50.0);
        assert!(!s.passes(0.7));

        let none: Vec<ValidationResult> = Vec::new();
        let empty = total_score(&none);
        assert_eq!(empty.percentage, 0.0);
        assert!(!empty.passes(0.0));
    }

    #[test]
    fn breakdown_groups_by_category() {
        let a = TaskMeta::new("a", Category::Permissions, Difficulty::Exam, 10);
        let b = TaskMeta::new("b", Category::Permissions, Difficulty::Exam, 10);
        let c = TaskMeta::new("c", Category::Services, Difficulty::Exam, 5);
        let ra = result("a", 10, 10, true);
        let rb = result("b", 0, 10, false);
        let rc = result("c", 5, 5, true);

        let map = category_breakdown([(&a, &ra), (&b, &rb), (&c, &rc)]);
        let perms = &map[&Category::Permissions];
        assert_eq!(perms.total_points, 20);
        assert_eq!(perms.earned_points, 10);
        assert_eq!(perms.task_count, 2);
        assert_eq!(perms.passed_count, 1);
        assert_eq!(perms.percentage, 50.0);
        assert_eq!(map[&Category::Services].percentage, 100.0);
        assert!(!map.contains_key(&Category::Lvm));
    }
}

//! JSON output formatter for machine processing
//!
//! Every command prints one pretty-printed document with a `summary` object
//! next to the full phase result.

use crate::domain::{ApplyResult, UpdatePlan};
use crate::engine::{PlanResult, ScanResult, UpdateResult};
use crate::output::{OutputFormatter, Verbosity};
use crate::schedule::ScheduleStatus;
use serde::Serialize;
use std::io::Write;

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    /// Verbose output keeps zero-update plans
    verbosity: Verbosity,
}

impl JsonFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    fn visible_plans<'a>(&self, plans: &'a [UpdatePlan]) -> Vec<&'a UpdatePlan> {
        plans
            .iter()
            .filter(|p| self.verbosity == Verbosity::Verbose || p.has_updates())
            .collect()
    }
}

#[derive(Serialize)]
struct ScanSummary {
    manifests: usize,
    dependencies: usize,
}

#[derive(Serialize)]
struct ScanOutput<'a> {
    summary: ScanSummary,
    #[serde(flatten)]
    result: &'a ScanResult,
}

#[derive(Serialize)]
struct PlanSummary {
    updates: usize,
    major: usize,
    minor: usize,
    patch: usize,
    skips: usize,
}

impl PlanSummary {
    fn from_plans(plans: &[UpdatePlan]) -> Self {
        use crate::domain::Impact;

        let count = |impact: Impact| {
            plans
                .iter()
                .flat_map(|p| &p.updates)
                .filter(|u| u.impact == impact)
                .count()
        };

        Self {
            updates: plans.iter().map(|p| p.updates.len()).sum(),
            major: count(Impact::Major),
            minor: count(Impact::Minor),
            patch: count(Impact::Patch),
            skips: plans.iter().map(|p| p.skipped.len()).sum(),
        }
    }
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    summary: PlanSummary,
    plans: Vec<&'a UpdatePlan>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<&'a str>,
}

#[derive(Serialize)]
struct ApplySummary {
    dry_run: bool,
    planned: usize,
    applied: usize,
    failed: usize,
}

#[derive(Serialize)]
struct UpdateOutput<'a> {
    summary: ApplySummary,
    plans: Vec<&'a UpdatePlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<&'a [ApplyResult]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<&'a str>,
}

fn write_json<T: Serialize>(value: &T, writer: &mut dyn Write) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    writeln!(writer, "{}", json)
}

impl OutputFormatter for JsonFormatter {
    fn format_scan(&self, result: &ScanResult, writer: &mut dyn Write) -> std::io::Result<()> {
        let output = ScanOutput {
            summary: ScanSummary {
                manifests: result.manifests.len(),
                dependencies: result.manifests.iter().map(|m| m.dependencies.len()).sum(),
            },
            result,
        };
        write_json(&output, writer)
    }

    fn format_plan(&self, result: &PlanResult, writer: &mut dyn Write) -> std::io::Result<()> {
        let output = PlanOutput {
            summary: PlanSummary::from_plans(&result.plans),
            plans: self.visible_plans(&result.plans),
            errors: result.errors.iter().map(String::as_str).collect(),
        };
        write_json(&output, writer)
    }

    fn format_update(
        &self,
        plans: &PlanResult,
        result: &UpdateResult,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let results = result.results.as_deref();
        let output = UpdateOutput {
            summary: ApplySummary {
                dry_run: result.dry_run,
                planned: plans.update_count(),
                applied: results.unwrap_or_default().iter().map(|r| r.applied).sum(),
                failed: results.unwrap_or_default().iter().map(|r| r.failed).sum(),
            },
            plans: self.visible_plans(&plans.plans),
            results,
            errors: plans
                .errors
                .iter()
                .chain(&result.errors)
                .map(String::as_str)
                .collect(),
        };
        write_json(&output, writer)
    }

    fn format_schedule(
        &self,
        status: &ScheduleStatus,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        write_json(status, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dependency, DependencyType, Impact, Manifest, PlanStrategy, Update};
    use serde_json::Value;

    fn plan(name: &str, updates: &[(&str, &str, Impact)]) -> UpdatePlan {
        let manifest = Manifest::new(format!("/repo/{name}"), "npm", Vec::new(), "");
        let mut plan = UpdatePlan::new(manifest, PlanStrategy::CustomRewrite);
        for (dep, target, impact) in updates {
            let dependency = Dependency::new(*dep, "1.0.0", "^1.0.0", DependencyType::Production, "npm");
            plan.updates.push(Update::new(dependency, *target, *impact));
        }
        plan
    }

    fn plans() -> PlanResult {
        PlanResult {
            plans: vec![
                plan(
                    "a/package.json",
                    &[("lodash", "1.0.1", Impact::Patch), ("react", "2.0.0", Impact::Major)],
                ),
                plan("b/package.json", &[]),
            ],
            errors: vec!["helm: no integration registered for type".to_string()],
        }
    }

    fn to_value<F>(f: F) -> Value
    where
        F: FnOnce(&mut Vec<u8>) -> std::io::Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_format_plan() {
        let value = to_value(|w| JsonFormatter::new(Verbosity::Normal).format_plan(&plans(), w));
        assert_eq!(value["summary"]["updates"], 2);
        assert_eq!(value["summary"]["major"], 1);
        assert_eq!(value["summary"]["patch"], 1);
        // zero-update plans are hidden unless verbose
        assert_eq!(value["plans"].as_array().unwrap().len(), 1);
        assert_eq!(value["plans"][0]["updates"][0]["target_version"], "1.0.1");
        assert_eq!(value["plans"][0]["manifest"]["type"], "npm");
        assert_eq!(value["errors"][0], "helm: no integration registered for type");
    }

    #[test]
    fn test_format_plan_verbose_keeps_empty_plans() {
        let value = to_value(|w| JsonFormatter::new(Verbosity::Verbose).format_plan(&plans(), w));
        assert_eq!(value["plans"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_format_update_dry_run() {
        let result = UpdateResult {
            results: None,
            errors: Vec::new(),
            dry_run: true,
        };
        let value = to_value(|w| {
            JsonFormatter::new(Verbosity::Normal).format_update(&plans(), &result, w)
        });
        assert_eq!(value["summary"]["dry_run"], true);
        assert_eq!(value["summary"]["planned"], 2);
        assert_eq!(value["summary"]["applied"], 0);
        assert!(value.get("results").is_none());
    }

    #[test]
    fn test_format_update_results() {
        let mut applied = ApplyResult::new("/repo/a/package.json");
        applied.applied = 2;
        let result = UpdateResult {
            results: Some(vec![applied]),
            errors: vec!["/repo/c/package.json: apply failed: boom".to_string()],
            dry_run: false,
        };
        let value = to_value(|w| {
            JsonFormatter::new(Verbosity::Normal).format_update(&plans(), &result, w)
        });
        assert_eq!(value["summary"]["applied"], 2);
        assert_eq!(value["results"][0]["applied"], 2);
        assert_eq!(value["errors"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_format_schedule() {
        let value = to_value(|w| {
            JsonFormatter::new(Verbosity::Normal).format_schedule(&ScheduleStatus::unscheduled(), w)
        });
        assert_eq!(value["configured"], false);
        assert_eq!(value["should_run"], true);
    }
}

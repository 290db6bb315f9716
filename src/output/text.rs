//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Manifest listings with their dependencies
//! - Proposed updates with a colored impact label (major/minor/patch)
//! - Skipped dependencies with reasons and manifest diffs in verbose mode
//! - Summary with an impact breakdown

use crate::domain::{ApplyResult, Impact, Manifest, Update, UpdatePlan};
use crate::engine::{PlanResult, ScanResult, UpdateResult};
use crate::integration::display_path;
use crate::output::{OutputFormatter, Verbosity};
use crate::schedule::ScheduleStatus;
use colored::{ColoredString, Colorize};
use std::io::Write;

/// Minimum width of the name column
const NAME_WIDTH: usize = 20;

fn colored_label(impact: Impact) -> String {
    match impact {
        Impact::Major => "major".red().bold().to_string(),
        Impact::Minor => "minor".yellow().to_string(),
        Impact::Patch => "patch".green().to_string(),
        Impact::None => "none".dimmed().to_string(),
    }
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

/// Text formatter for human-readable output
pub struct TextFormatter {
    verbosity: Verbosity,
    color: bool,
}

impl TextFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            color: true,
        }
    }

    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn label(&self, impact: Impact) -> String {
        if self.color {
            colored_label(impact)
        } else {
            impact.as_str().to_string()
        }
    }

    fn dry_run_prefix(&self, dry_run: bool) -> String {
        if dry_run {
            format!("{} ", self.paint("(dry-run)", |s| s.cyan()))
        } else {
            String::new()
        }
    }

    /// `path (type): detail`
    fn format_header(
        &self,
        prefix: &str,
        manifest: &Manifest,
        detail: &str,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let path = display_path(manifest).display().to_string();
        let kind = format!("({})", manifest.manifest_type);
        writeln!(
            writer,
            "{}{} {}: {}",
            prefix,
            self.paint(&path, |s| s.bold()),
            self.paint(&kind, |s| s.dimmed()),
            detail
        )
    }

    fn format_update_line(
        &self,
        update: &Update,
        width: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let mut extra = String::new();
        if let Some(group) = &update.group {
            extra.push_str(&self.paint(&format!(" (group: {group})"), |s| s.dimmed()));
        }
        if update.dependency.is_dev() {
            extra.push_str(&self.paint(" (dev)", |s| s.dimmed()));
        }
        if update.manifest_value.is_none() {
            extra.push_str(&self.paint(" (lockfile only)", |s| s.dimmed()));
        }

        writeln!(
            writer,
            "  {:width$} {} -> {} [{}]{}",
            update.name(),
            update.dependency.current_version,
            self.paint(&update.target_version, |s| s.green()),
            self.label(update.impact),
            extra,
            width = width
        )
    }

    fn format_plan_entry(
        &self,
        prefix: &str,
        plan: &UpdatePlan,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let verbose = self.verbosity == Verbosity::Verbose;
        if !plan.has_updates() && (!verbose || plan.skipped.is_empty()) {
            return Ok(());
        }

        let detail = format!(
            "{}, {}",
            plural(plan.updates.len(), "update", "updates"),
            plural(plan.skipped.len(), "skip", "skips")
        );
        self.format_header(prefix, &plan.manifest, &detail, writer)?;

        let width = plan
            .updates
            .iter()
            .map(|u| u.name().len())
            .max()
            .unwrap_or(0)
            .max(NAME_WIDTH);
        for update in &plan.updates {
            self.format_update_line(update, width, writer)?;
        }

        if verbose {
            for (name, reason) in &plan.skipped {
                let line = format!("  {:width$} ({})", name, reason, width = width);
                writeln!(writer, "{}", self.paint(&line, |s| s.dimmed()))?;
            }
            if let Some(message) = &plan.commit_message {
                writeln!(writer, "  commit: {}", message)?;
            }
        }

        writeln!(writer)
    }

    fn format_errors(&self, errors: &[String], writer: &mut dyn Write) -> std::io::Result<()> {
        if errors.is_empty() || self.verbosity == Verbosity::Quiet {
            return Ok(());
        }

        writeln!(writer, "{}:", self.paint("Errors", |s| s.red().bold()))?;
        for error in errors {
            if self.color {
                writeln!(writer, "  {} {}", "✗".red(), error)?;
            } else {
                writeln!(writer, "  - {}", error)?;
            }
        }
        writeln!(writer)
    }

    /// `2 updates (1 major, 1 patch)`
    fn impact_breakdown(&self, plans: &[UpdatePlan]) -> String {
        let updates: Vec<&Update> = plans.iter().flat_map(|p| &p.updates).collect();
        let parts: Vec<String> = [Impact::Major, Impact::Minor, Impact::Patch, Impact::None]
            .into_iter()
            .filter_map(|impact| {
                let count = updates.iter().filter(|u| u.impact == impact).count();
                (count > 0).then(|| format!("{} {}", count, self.label(impact)))
            })
            .collect();

        let total = plural(updates.len(), "update", "updates");
        if parts.is_empty() {
            total
        } else {
            format!("{} ({})", total, parts.join(", "))
        }
    }

    fn format_apply_result(
        &self,
        plans: &PlanResult,
        result: &ApplyResult,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let plan = plans
            .plans
            .iter()
            .find(|p| p.manifest.path == result.manifest_path);
        if result.applied == 0 && result.failed == 0 && result.manifest_diff.is_none() {
            return Ok(());
        }

        let detail = if result.failed > 0 {
            format!(
                "{} applied, {}",
                result.applied,
                self.paint(&format!("{} failed", result.failed), |s| s.red())
            )
        } else {
            format!("{} applied", result.applied)
        };
        match plan {
            Some(plan) => self.format_header("", &plan.manifest, &detail, writer)?,
            None => writeln!(writer, "{}: {}", result.manifest_path.display(), detail)?,
        }

        for error in &result.errors {
            writeln!(writer, "  {}", self.paint(error, |s| s.red()))?;
        }

        if self.verbosity == Verbosity::Verbose {
            for diff in [&result.manifest_diff, &result.lockfile_diff].into_iter().flatten() {
                for line in diff.lines() {
                    let painted = if line.starts_with('+') && !line.starts_with("+++") {
                        self.paint(line, |s| s.green())
                    } else if line.starts_with('-') && !line.starts_with("---") {
                        self.paint(line, |s| s.red())
                    } else {
                        self.paint(line, |s| s.dimmed())
                    };
                    writeln!(writer, "  {}", painted)?;
                }
            }
        }

        writeln!(writer)
    }
}

impl OutputFormatter for TextFormatter {
    fn format_scan(&self, result: &ScanResult, writer: &mut dyn Write) -> std::io::Result<()> {
        let dependencies: usize = result.manifests.iter().map(|m| m.dependencies.len()).sum();
        let summary = format!(
            "{}, {}",
            plural(result.manifests.len(), "manifest", "manifests"),
            plural(dependencies, "dependency", "dependencies")
        );

        if self.verbosity == Verbosity::Quiet {
            return writeln!(writer, "{}", summary);
        }

        for manifest in &result.manifests {
            let detail = plural(manifest.dependencies.len(), "dependency", "dependencies");
            self.format_header("", manifest, &detail, writer)?;

            let width = manifest
                .dependencies
                .iter()
                .map(|d| d.name.len())
                .max()
                .unwrap_or(0)
                .max(NAME_WIDTH);
            for dependency in &manifest.dependencies {
                let mut extra = String::new();
                if !dependency.constraint.is_empty() {
                    extra.push_str(&format!(" {}", dependency.constraint));
                }
                if dependency.is_dev() {
                    extra.push_str(&self.paint(" (dev)", |s| s.dimmed()));
                }
                writeln!(
                    writer,
                    "  {:width$} {}{}",
                    dependency.name,
                    dependency.current_version,
                    extra,
                    width = width
                )?;
            }
            writeln!(writer)?;
        }

        self.format_errors(&result.errors, writer)?;
        writeln!(writer, "{}:", self.paint("Summary", |s| s.bold()))?;
        writeln!(writer, "  {}", summary)
    }

    fn format_plan(&self, result: &PlanResult, writer: &mut dyn Write) -> std::io::Result<()> {
        if self.verbosity == Verbosity::Quiet {
            return if result.update_count() > 0 {
                writeln!(writer, "{}", plural(result.update_count(), "update", "updates"))
            } else {
                writeln!(writer, "No updates")
            };
        }

        for plan in &result.plans {
            self.format_plan_entry("", plan, writer)?;
        }
        self.format_errors(&result.errors, writer)?;

        writeln!(writer, "{}:", self.paint("Summary", |s| s.bold()))?;
        if result.update_count() > 0 {
            let with_updates = result.plans.iter().filter(|p| p.has_updates()).count();
            writeln!(
                writer,
                "  {} across {}",
                self.impact_breakdown(&result.plans),
                plural(with_updates, "manifest", "manifests")
            )
        } else {
            writeln!(writer, "  {}", self.paint("No updates", |s| s.dimmed()))
        }
    }

    fn format_update(
        &self,
        plans: &PlanResult,
        result: &UpdateResult,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let prefix = self.dry_run_prefix(result.dry_run);
        let applied: usize = result
            .results
            .iter()
            .flatten()
            .map(|r| r.applied)
            .sum();
        let failed: usize = result.results.iter().flatten().map(|r| r.failed).sum();

        let summary = if result.dry_run {
            format!(
                "{} would be applied",
                plural(plans.update_count(), "update", "updates")
            )
        } else if failed > 0 {
            format!("{} applied, {} failed", plural(applied, "update", "updates"), failed)
        } else {
            format!("{} applied", plural(applied, "update", "updates"))
        };

        if self.verbosity == Verbosity::Quiet {
            return writeln!(writer, "{}{}", prefix, summary);
        }

        match &result.results {
            None => {
                for plan in &plans.plans {
                    self.format_plan_entry(&prefix, plan, writer)?;
                }
            }
            Some(results) => {
                for apply in results {
                    self.format_apply_result(plans, apply, writer)?;
                }
            }
        }

        let errors: Vec<String> = plans
            .errors
            .iter()
            .chain(&result.errors)
            .cloned()
            .collect();
        self.format_errors(&errors, writer)?;

        writeln!(writer, "{}{}:", prefix, self.paint("Summary", |s| s.bold()))?;
        writeln!(writer, "  {}", summary)
    }

    fn format_schedule(
        &self,
        status: &ScheduleStatus,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        if !status.configured {
            return writeln!(writer, "No schedule configured, runs are always allowed");
        }

        let state = if status.should_run {
            self.paint("due now", |s| s.green())
        } else {
            self.paint("not due", |s| s.yellow())
        };
        writeln!(writer, "Schedule: {} ({})", state, status.timezone)?;
        if let Some(next) = status.next_run {
            writeln!(writer, "Next run: {}", next.format("%Y-%m-%d %H:%M UTC"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dependency, DependencyType, PlanStrategy};
    use chrono::{TimeZone, Utc};

    fn formatter(verbosity: Verbosity) -> TextFormatter {
        TextFormatter::with_color(verbosity, false)
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> std::io::Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn sample_plan() -> UpdatePlan {
        let lodash = Dependency::new("lodash", "4.17.20", "^4.17.20", DependencyType::Production, "npm");
        let jest = Dependency::new("jest", "28.1.0", "^28.1.0", DependencyType::Development, "npm");
        let manifest = Manifest::new("/repo/package.json", "npm", vec![lodash.clone(), jest.clone()], "")
            .with_metadata(crate::integration::RELATIVE_PATH_KEY, "package.json");

        let mut plan = UpdatePlan::new(manifest, PlanStrategy::CustomRewrite);
        plan.updates.push(Update::new(lodash, "4.17.21", Impact::Patch));
        plan.updates.push(Update::new(jest, "29.7.0", Impact::Major));
        plan.skipped.insert("left-pad".to_string(), "lookup failed: timeout".to_string());
        plan.commit_message = Some("chore(deps): update 2 dependencies".to_string());
        plan
    }

    fn sample_plans() -> PlanResult {
        PlanResult {
            plans: vec![sample_plan()],
            errors: vec!["helm: plan failed".to_string()],
        }
    }

    #[test]
    fn test_format_scan() {
        let plan = sample_plan();
        let result = ScanResult {
            manifests: vec![plan.manifest],
            errors: Vec::new(),
        };
        let out = render(|w| formatter(Verbosity::Normal).format_scan(&result, w));
        assert!(out.contains("package.json (npm): 2 dependencies"));
        assert!(out.contains("jest"));
        assert!(out.contains("^28.1.0 (dev)"));
        assert!(out.ends_with("Summary:\n  1 manifest, 2 dependencies\n"));
    }

    #[test]
    fn test_format_plan() {
        let out = render(|w| formatter(Verbosity::Normal).format_plan(&sample_plans(), w));
        assert!(out.contains("package.json (npm): 2 updates, 1 skip"));
        assert!(out.contains("4.17.20 -> 4.17.21 [patch]"));
        assert!(out.contains("28.1.0 -> 29.7.0 [major] (dev)"));
        assert!(!out.contains("left-pad"));
        assert!(out.contains("Errors:\n  - helm: plan failed"));
        assert!(out.contains("2 updates (1 major, 1 patch) across 1 manifest"));
    }

    #[test]
    fn test_format_plan_verbose_shows_skips() {
        let out = render(|w| formatter(Verbosity::Verbose).format_plan(&sample_plans(), w));
        assert!(out.contains("(lookup failed: timeout)"));
        assert!(out.contains("commit: chore(deps): update 2 dependencies"));
    }

    #[test]
    fn test_format_plan_quiet() {
        let out = render(|w| formatter(Verbosity::Quiet).format_plan(&sample_plans(), w));
        assert_eq!(out, "2 updates\n");
        let out = render(|w| formatter(Verbosity::Quiet).format_plan(&PlanResult::default(), w));
        assert_eq!(out, "No updates\n");
    }

    #[test]
    fn test_format_update_dry_run() {
        let result = UpdateResult {
            results: None,
            errors: Vec::new(),
            dry_run: true,
        };
        let out = render(|w| formatter(Verbosity::Normal).format_update(&sample_plans(), &result, w));
        assert!(out.contains("(dry-run) package.json (npm): 2 updates"));
        assert!(out.contains("2 updates would be applied"));
    }

    #[test]
    fn test_format_update_applied() {
        let mut apply = ApplyResult::new("/repo/package.json");
        apply.applied = 1;
        apply.record_failure("jest: spec '^28.1.0' not found in package.json");
        apply.manifest_diff = Some("--- a/package.json\n+++ b/package.json\n@@ line 3 @@\n-a\n+b\n".to_string());
        let result = UpdateResult {
            results: Some(vec![apply]),
            errors: Vec::new(),
            dry_run: false,
        };

        let out = render(|w| formatter(Verbosity::Verbose).format_update(&sample_plans(), &result, w));
        assert!(out.contains("package.json (npm): 1 applied, 1 failed"));
        assert!(out.contains("  jest: spec '^28.1.0' not found"));
        assert!(out.contains("  +b\n"));
        assert!(out.contains("1 update applied, 1 failed"));
    }

    #[test]
    fn test_format_schedule() {
        let status = ScheduleStatus {
            configured: true,
            should_run: false,
            timezone: "Europe/Berlin".to_string(),
            next_run: Some(Utc.with_ymd_and_hms(2024, 1, 12, 8, 0, 0).unwrap()),
        };
        let out = render(|w| formatter(Verbosity::Normal).format_schedule(&status, w));
        assert_eq!(
            out,
            "Schedule: not due (Europe/Berlin)\nNext run: 2024-01-12 08:00 UTC\n"
        );

        let out = render(|w| {
            formatter(Verbosity::Normal).format_schedule(&ScheduleStatus::unscheduled(), w)
        });
        assert!(out.starts_with("No schedule configured"));
    }
}

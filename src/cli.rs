//! CLI argument parsing module for depflow

use crate::config::UpdateLevel;
use crate::resolve::CliFlags;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parse an update level; unlike the config file, the CLI rejects unknown levels
fn parse_update_level(s: &str) -> Result<UpdateLevel, String> {
    match UpdateLevel::from(s) {
        UpdateLevel::Other(value) => Err(format!(
            "invalid update level: {} (expected none, patch, minor or major)",
            value
        )),
        level => Ok(level),
    }
}

/// Policy-driven dependency updater
#[derive(Parser, Debug, Clone)]
#[command(name = "depflow", version, about = "Policy-driven dependency updater")]
pub struct CliArgs {
    /// Configuration file (default: .depflow.yml, .depflow.yaml or .depflow.toml in PATH)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output and debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the manifests and dependencies found in the repository
    Scan(TargetArgs),
    /// Show the updates that policies allow
    Plan(PlanArgs),
    /// Apply the planned updates
    Update(UpdateArgs),
    /// Show whether the configured schedule fires now
    Schedule(ScheduleArgs),
}

/// Repository and integration selection
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Repository root (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Run only these integrations (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub only: Vec<String>,

    /// Skip these integrations (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub exclude: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Highest update level for every integration: none, patch, minor or major
    #[arg(long, value_parser = parse_update_level)]
    pub update_level: Option<UpdateLevel>,

    /// Consider pre-release versions
    #[arg(long)]
    pub allow_prerelease: bool,
}

impl PlanArgs {
    /// Overrides for the engine; `None` when no flag was given
    pub fn cli_flags(&self) -> Option<CliFlags> {
        let mut flags = CliFlags::new();
        if let Some(level) = &self.update_level {
            flags = flags.with_update_level(level.clone());
        }
        if self.allow_prerelease {
            flags = flags.with_allow_prerelease(true);
        }
        (!flags.is_empty()).then_some(flags)
    }
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Dry run mode - show what would be updated without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Refresh lockfiles with the ecosystem's package manager
    #[arg(long)]
    pub lockfile: bool,

    /// Do nothing when the configured schedule does not fire now
    #[arg(long)]
    pub respect_schedule: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    /// Repository root (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

impl CliArgs {
    /// Repository root of the selected command
    pub fn path(&self) -> &PathBuf {
        match &self.command {
            Command::Scan(target) => &target.path,
            Command::Plan(plan) => &plan.target.path,
            Command::Update(update) => &update.plan.target.path,
            Command::Schedule(schedule) => &schedule.path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_scan_defaults() {
        let args = CliArgs::parse_from(["depflow", "scan"]);
        assert!(args.config.is_none());
        assert!(!args.verbose);
        assert!(!args.quiet);
        assert!(!args.json);
        let Command::Scan(target) = &args.command else {
            panic!("expected scan");
        };
        assert_eq!(target.path, PathBuf::from("."));
        assert!(target.only.is_empty());
        assert!(target.exclude.is_empty());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::parse_from(["depflow", "plan", "/repo", "--json", "--verbose"]);
        assert!(args.json);
        assert!(args.verbose);
        assert_eq!(args.path(), &PathBuf::from("/repo"));
    }

    #[test]
    fn test_only_and_exclude_append() {
        let args = CliArgs::parse_from([
            "depflow", "scan", "--only", "npm", "--only", "pip", "--exclude", "dockerfile",
        ]);
        let Command::Scan(target) = args.command else {
            panic!("expected scan");
        };
        assert_eq!(target.only, vec!["npm", "pip"]);
        assert_eq!(target.exclude, vec!["dockerfile"]);
    }

    #[test]
    fn test_plan_cli_flags() {
        let args = CliArgs::parse_from(["depflow", "plan"]);
        let Command::Plan(plan) = args.command else {
            panic!("expected plan");
        };
        assert!(plan.cli_flags().is_none());

        let args = CliArgs::parse_from([
            "depflow",
            "plan",
            "--update-level",
            "minor",
            "--allow-prerelease",
        ]);
        let Command::Plan(plan) = args.command else {
            panic!("expected plan");
        };
        let flags = plan.cli_flags().unwrap();
        assert_eq!(flags.update_level, Some(UpdateLevel::Minor));
        assert_eq!(flags.allow_prerelease, Some(true));
    }

    #[test]
    fn test_invalid_update_level() {
        let result = CliArgs::try_parse_from(["depflow", "plan", "--update-level", "huge"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_update_flags() {
        let args = CliArgs::parse_from([
            "depflow",
            "update",
            "-n",
            "--lockfile",
            "--respect-schedule",
            "--update-level",
            "patch",
        ]);
        let Command::Update(update) = args.command else {
            panic!("expected update");
        };
        assert!(update.dry_run);
        assert!(update.lockfile);
        assert!(update.respect_schedule);
        assert_eq!(update.plan.update_level, Some(UpdateLevel::Patch));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = CliArgs::try_parse_from(["depflow", "-q", "--verbose", "scan"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_flag() {
        let args = CliArgs::parse_from(["depflow", "--config", "ci/depflow.toml", "schedule"]);
        assert_eq!(args.config, Some(PathBuf::from("ci/depflow.toml")));
        assert!(matches!(args.command, Command::Schedule(_)));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(CliArgs::try_parse_from(["depflow"]).is_err());
    }
}

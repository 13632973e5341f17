use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use linkrule::api::{RemoveRequest, RuleRequest, ScanRequest};
use linkrule::LinkMode;

#[derive(Parser)]
#[command(name = "linkrule")]
#[command(
    author,
    version,
    about = "Mirror files into a target tree as links, renamed by regex rules"
)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite database holding rules and mappings
    #[arg(long, global = true, env = "LINKRULE_DATABASE", value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Settings file (default: ~/.linkrule/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the files a rule would match
    Scan(ScanArgs),
    /// Show the target each matching file would get
    Preview(RuleArgs),
    /// Create or update a rule and reconcile its targets
    Apply(RuleArgs),
    /// Link (or move) matching files once, without storing a rule
    ApplyOnce(RuleArgs),
    /// Delete a rule together with its targets
    Remove {
        #[arg(long)]
        rule_id: i64,
    },
    /// List stored rules
    Rules,
    /// Replace hardlinked targets with symlinks
    ConvertToSymlinks {
        /// Mappings per batch (default from settings, 100)
        #[arg(long)]
        batch: Option<usize>,
        /// Report what would change without touching any file
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args)]
pub struct ScanArgs {
    #[arg(long = "source", value_name = "DIR")]
    pub source_dir: String,
    #[arg(long = "include", value_name = "PATTERN")]
    pub include_pattern: String,
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude_pattern: Option<String>,
}

#[derive(Args)]
pub struct RuleArgs {
    #[arg(long = "source", value_name = "DIR")]
    pub source_dir: String,
    #[arg(long = "target", value_name = "DIR")]
    pub target_dir: String,
    #[arg(long = "include", value_name = "PATTERN")]
    pub include_pattern: String,
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude_pattern: Option<String>,
    #[arg(long = "template")]
    pub target_template: String,
    /// Update this rule instead of looking it up by directories
    #[arg(long)]
    pub rule_id: Option<i64>,
    /// hardlink, symlink or move
    #[arg(long, value_parser = parse_link_mode)]
    pub link_mode: Option<LinkMode>,
    /// Move files instead of linking them
    #[arg(long = "move", conflicts_with = "link_mode")]
    pub move_files: bool,
}

fn parse_link_mode(s: &str) -> Result<LinkMode, String> {
    s.parse()
}

impl From<ScanArgs> for ScanRequest {
    fn from(args: ScanArgs) -> Self {
        Self {
            source_dir: args.source_dir,
            include_pattern: args.include_pattern,
            exclude_pattern: args.exclude_pattern,
        }
    }
}

impl From<RuleArgs> for RuleRequest {
    fn from(args: RuleArgs) -> Self {
        Self {
            source_dir: args.source_dir,
            target_dir: args.target_dir,
            include_pattern: args.include_pattern,
            exclude_pattern: args.exclude_pattern,
            target_template: args.target_template,
            rule_id: args.rule_id,
            keep_original: args.move_files.then_some(false),
            link_mode: args.link_mode,
        }
    }
}

pub fn remove_request(rule_id: i64) -> RemoveRequest {
    RemoveRequest {
        rule_id: Some(rule_id),
    }
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ci-triage: extract CI failures from job logs and report them on pull requests
#[derive(Parser, Debug, Clone)]
#[command(name = "ci-triage", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,

    /// Path to config file (default: .ci-triage.toml if present)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Repository as owner/name
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// GitHub transport (gh, api)
    #[arg(long, global = true)]
    pub transport: Option<String>,

    /// Login the bot posts reports as
    #[arg(long, global = true)]
    pub bot_login: Option<String>,

    /// Name of the CI workflow to triage (default: CI)
    #[arg(long, global = true)]
    pub workflow_name: Option<String>,

    /// Workflow definition file basename (default: ansible-test.yml)
    #[arg(long, global = true)]
    pub workflow_file: Option<String>,

    /// Render the report without touching pull request comments
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Triage the failed CI jobs of a pull request and post a report
    Triage {
        /// Pull request number
        pr_number: u64,
    },

    /// Extract errors from a saved job log
    Parse {
        /// Job display name; selects the extractor
        #[arg(long)]
        job: String,

        /// Log file to read (default: stdin)
        file: Option<PathBuf>,
    },
}

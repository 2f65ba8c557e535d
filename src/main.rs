use std::io::Read;
use std::path::Path;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ci_triage::cli::{Cli, CliCommand};
use ci_triage::config::Config;
use ci_triage::error::{Error, Result};
use ci_triage::extract::Extractor;
use ci_triage::platform::github::GitHubPlatform;
use ci_triage::triage::{PassOutcome, Triage};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match &cli.command {
        CliCommand::Parse { job, file } => parse_log(job, file.as_deref()),
        CliCommand::Triage { pr_number } => match Config::load(&cli) {
            Ok(config) => run_triage(config, *pr_number).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        if matches!(e, Error::Interrupted) {
            std::process::exit(130);
        }
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run_triage(config: Config, pr_number: u64) -> Result<()> {
    info!(?config, "config loaded");

    // The platform clients block, so the pass runs off the async workers.
    let pass = tokio::task::spawn_blocking(move || {
        let platform = GitHubPlatform::from_config(&config)?;
        info!(repo = platform.repo(), pr_number, "triaging pull request");
        Ok::<_, Error>(Triage::new(platform, config).run(pr_number))
    });

    let outcome = tokio::select! {
        joined = pass => joined
            .map_err(|e| Error::Platform(format!("triage task failed: {e}")))??,
        _ = tokio::signal::ctrl_c() => return Err(Error::Interrupted),
    };

    match outcome {
        PassOutcome::NoFailures => println!("no failed jobs to report"),
        PassOutcome::Reported {
            failed_jobs,
            superseded,
        } => println!("reported {failed_jobs} failed job(s), replaced {superseded} earlier report(s)"),
        PassOutcome::DryRun { report } => println!("{report}"),
        PassOutcome::Aborted { reason } => {
            return Err(Error::Platform(format!("triage pass aborted: {reason}")));
        }
    }
    Ok(())
}

fn parse_log(job: &str, file: Option<&Path>) -> Result<()> {
    let bytes = match file {
        Some(path) => std::fs::read(path)?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    let log = String::from_utf8_lossy(&bytes);

    let extractor = Extractor::for_job(job);
    let parsed = extractor.extract(&log, job);
    info!(job, ?extractor, errors = parsed.errors.len(), "parsed log");

    for excerpt in &parsed.errors {
        println!("{excerpt}");
        println!();
    }
    Ok(())
}

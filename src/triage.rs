//! One triage pass over a pull request's CI results.
//!
//! The pass walks workflows → runs → jobs strictly in sequence, extracts
//! errors from every failed in-scope job, and replaces any earlier report
//! with a single new one. It never returns an error: every way a pass can end
//! is a [`PassOutcome`].
//!
//! Removing old reports and posting the new one is not atomic. Two passes
//! racing on the same pull request can leave two reports, or none.

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::extract::Extractor;
use crate::platform::{CiPlatform, Conclusion, Job, Workflow};
use crate::report::{FailedJobRecord, prior_reports, render_report};

/// Run status requested when listing workflow runs.
const COMPLETED: &str = "completed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// No in-scope job failed with extractable errors; nothing was touched.
    NoFailures,
    /// A report was posted after removing `superseded` earlier ones.
    Reported {
        failed_jobs: usize,
        superseded: usize,
    },
    /// Dry run: the report that would have been posted.
    DryRun { report: String },
    /// The pass stopped early; no report was posted.
    Aborted { reason: String },
}

pub struct Triage<P> {
    platform: P,
    config: Config,
}

impl<P: CiPlatform> Triage<P> {
    pub fn new(platform: P, config: Config) -> Self {
        Self { platform, config }
    }

    /// Run one triage pass for pull request `pr_number`.
    pub fn run(&self, pr_number: u64) -> PassOutcome {
        info!(pr_number, "starting triage pass");

        let head = match self.platform.change_head(pr_number) {
            Ok(head) => head,
            Err(e) => return self.abort(pr_number, "failed to resolve head commit", e),
        };
        info!(pr_number, sha = %head.sha, "resolved head commit");

        let failed_jobs = match self.collect_failures(&head.sha) {
            Ok(records) => records,
            Err(e) => return self.abort(pr_number, "failed to enumerate CI results", e),
        };

        if failed_jobs.is_empty() {
            info!(pr_number, "no failed jobs with extractable errors");
            return PassOutcome::NoFailures;
        }

        let report = render_report(&head.author_login, &failed_jobs);
        if self.config.dry_run {
            info!(pr_number, failed_jobs = failed_jobs.len(), "dry run, report not posted");
            return PassOutcome::DryRun { report };
        }

        let superseded = match self.remove_prior_reports(pr_number) {
            Ok(deleted) => deleted,
            Err(e) => return self.abort(pr_number, "failed to list prior reports", e),
        };

        if let Err(e) = self.platform.create_comment(pr_number, &report) {
            return self.abort(pr_number, "failed to create report comment", e);
        }
        info!(
            pr_number,
            failed_jobs = failed_jobs.len(),
            superseded,
            "posted triage report"
        );
        PassOutcome::Reported {
            failed_jobs: failed_jobs.len(),
            superseded,
        }
    }

    fn abort(&self, pr_number: u64, what: &str, e: crate::error::Error) -> PassOutcome {
        error!(pr_number, error = %e, "{what}");
        PassOutcome::Aborted {
            reason: format!("{what}: {e}"),
        }
    }

    /// Walk the matching workflows' completed runs at `sha` and extract
    /// errors from each failed in-scope job.
    fn collect_failures(&self, sha: &str) -> Result<Vec<FailedJobRecord>> {
        let mut records = Vec::new();

        for workflow in self.platform.list_workflows()? {
            if !self.is_triaged_workflow(&workflow) {
                continue;
            }

            let runs = self
                .platform
                .list_workflow_runs(workflow.id, sha, COMPLETED)?;
            info!(workflow = %workflow.name, runs = runs.len(), "listed workflow runs");

            for run in runs {
                if run.conclusion != Some(Conclusion::Failure) {
                    continue;
                }

                for job in self.platform.list_jobs_for_run(run.id)? {
                    if !self.is_triaged_job(&job) {
                        continue;
                    }
                    if let Some(record) = self.triage_job(&workflow, &job) {
                        records.push(record);
                    }
                }
            }
        }

        Ok(records)
    }

    fn is_triaged_workflow(&self, workflow: &Workflow) -> bool {
        workflow.name == self.config.workflow_name
            || workflow.path.contains(&self.config.workflow_file)
    }

    fn is_triaged_job(&self, job: &Job) -> bool {
        job.conclusion == Some(Conclusion::Failure)
            && self
                .config
                .job_keywords
                .iter()
                .any(|keyword| job.name.contains(keyword.as_str()))
    }

    /// Fetch and parse one job's log. Failures are logged and skip the job.
    fn triage_job(&self, workflow: &Workflow, job: &Job) -> Option<FailedJobRecord> {
        let log = match self.platform.download_job_log(job.id) {
            Ok(log) => log,
            Err(e) => {
                warn!(job = %job.name, job_id = job.id, error = %e, "failed to fetch job log");
                return None;
            }
        };

        let extractor = Extractor::for_job(&job.name);
        let parsed = extractor.extract(&log, &job.name);
        info!(
            job = %job.name,
            ?extractor,
            errors = parsed.errors.len(),
            "extracted job errors"
        );

        if parsed.errors.is_empty() {
            return None;
        }
        Some(FailedJobRecord {
            workflow: workflow.name.clone(),
            job: parsed.job_name,
            errors: parsed.errors,
        })
    }

    /// Delete earlier reports by the bot and return how many were deleted.
    /// Listing must succeed; individual deletes are best effort.
    fn remove_prior_reports(&self, pr_number: u64) -> Result<usize> {
        let comments = self.platform.list_comments(pr_number)?;

        let mut deleted = 0;
        for comment in prior_reports(&comments, &self.config.bot_login) {
            match self.platform.delete_comment(comment.id) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(comment_id = comment.id, error = %e, "failed to delete prior report");
                }
            }
        }
        Ok(deleted)
    }
}

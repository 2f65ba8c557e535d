pub mod github;

use serde::Deserialize;

use crate::error::Result;

/// Outcome of a finished workflow run or job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Neutral,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    pub id: u64,
    pub name: String,
    /// Definition file, e.g. `.github/workflows/ansible-test.yml`.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub id: u64,
    pub conclusion: Option<Conclusion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub conclusion: Option<Conclusion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub author_login: String,
    pub body: String,
}

/// Head commit of a pull request and the login of the person who opened it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeHead {
    pub sha: String,
    pub author_login: String,
}

/// Code-hosting operations a triage pass needs. Implementations are bound to
/// a single repository.
pub trait CiPlatform {
    fn change_head(&self, change_number: u64) -> Result<ChangeHead>;

    fn list_workflows(&self) -> Result<Vec<Workflow>>;

    /// Runs of `workflow_id` for `head_sha` with the given run status
    /// (e.g. `completed`).
    fn list_workflow_runs(
        &self,
        workflow_id: u64,
        head_sha: &str,
        status: &str,
    ) -> Result<Vec<WorkflowRun>>;

    fn list_jobs_for_run(&self, run_id: u64) -> Result<Vec<Job>>;

    /// Raw log text of a single job.
    fn download_job_log(&self, job_id: u64) -> Result<String>;

    fn list_comments(&self, issue_number: u64) -> Result<Vec<Comment>>;

    fn delete_comment(&self, comment_id: u64) -> Result<()>;

    fn create_comment(&self, issue_number: u64, body: &str) -> Result<()>;
}

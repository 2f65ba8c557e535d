#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ci_triage::config::Config;
use ci_triage::error::{Error, Result};
use ci_triage::platform::{
    ChangeHead, CiPlatform, Comment, Conclusion, Job, Workflow, WorkflowRun,
};

pub const BOT: &str = "ans2bot";
pub const PR: u64 = 42;
pub const SHA: &str = "deadbeef";

/// Calls and comment state shared between a mock platform and the test.
#[derive(Default)]
pub struct Tracker {
    pub calls: Vec<String>,
    pub comments: Vec<Comment>,
    next_comment_id: u64,
}

impl Tracker {
    pub fn called(&self, prefix: &str) -> bool {
        self.calls.iter().any(|c| c.starts_with(prefix))
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }
}

#[derive(Default)]
pub struct Failures {
    pub head: bool,
    pub workflows: bool,
    pub jobs: bool,
    pub list_comments: bool,
    pub delete: bool,
    pub create: bool,
}

pub struct MockPlatform {
    pub head: ChangeHead,
    pub workflows: Vec<Workflow>,
    /// Runs by workflow id.
    pub runs: HashMap<u64, Vec<WorkflowRun>>,
    /// Jobs by run id.
    pub jobs: HashMap<u64, Vec<Job>>,
    /// Logs by job id; a missing entry fails the download.
    pub logs: HashMap<u64, String>,
    pub fail: Failures,
    pub tracker: Arc<Mutex<Tracker>>,
}

impl MockPlatform {
    pub fn new(tracker: Arc<Mutex<Tracker>>) -> Self {
        Self {
            head: ChangeHead {
                sha: SHA.to_string(),
                author_login: "alice".to_string(),
            },
            workflows: Vec::new(),
            runs: HashMap::new(),
            jobs: HashMap::new(),
            logs: HashMap::new(),
            fail: Failures::default(),
            tracker,
        }
    }

    /// One `CI` workflow with one failed run containing `jobs`.
    pub fn with_failed_run(tracker: Arc<Mutex<Tracker>>, jobs: Vec<(Job, Option<&str>)>) -> Self {
        let mut platform = Self::new(tracker);
        platform.workflows = vec![workflow(1, "CI", ".github/workflows/ansible-test.yml")];
        platform.runs.insert(1, vec![run(10, Conclusion::Failure)]);
        let mut run_jobs = Vec::new();
        for (job, log) in jobs {
            if let Some(log) = log {
                platform.logs.insert(job.id, log.to_string());
            }
            run_jobs.push(job);
        }
        platform.jobs.insert(10, run_jobs);
        platform
    }

    /// Seed an existing comment on the pull request.
    pub fn seed_comment(&self, author: &str, body: &str) -> u64 {
        let mut tracker = self.tracker.lock().unwrap();
        tracker.next_comment_id += 1;
        let id = tracker.next_comment_id;
        tracker.comments.push(Comment {
            id,
            author_login: author.to_string(),
            body: body.to_string(),
        });
        id
    }

    fn record(&self, call: String) {
        self.tracker.lock().unwrap().calls.push(call);
    }
}

impl CiPlatform for MockPlatform {
    fn change_head(&self, change_number: u64) -> Result<ChangeHead> {
        self.record(format!("change_head:{change_number}"));
        if self.fail.head {
            return Err(Error::Platform("pull request not found".to_string()));
        }
        Ok(self.head.clone())
    }

    fn list_workflows(&self) -> Result<Vec<Workflow>> {
        self.record("list_workflows".to_string());
        if self.fail.workflows {
            return Err(Error::Platform("workflows unavailable".to_string()));
        }
        Ok(self.workflows.clone())
    }

    fn list_workflow_runs(
        &self,
        workflow_id: u64,
        head_sha: &str,
        status: &str,
    ) -> Result<Vec<WorkflowRun>> {
        self.record(format!("list_workflow_runs:{workflow_id}:{head_sha}:{status}"));
        Ok(self.runs.get(&workflow_id).cloned().unwrap_or_default())
    }

    fn list_jobs_for_run(&self, run_id: u64) -> Result<Vec<Job>> {
        self.record(format!("list_jobs_for_run:{run_id}"));
        if self.fail.jobs {
            return Err(Error::Platform("jobs unavailable".to_string()));
        }
        Ok(self.jobs.get(&run_id).cloned().unwrap_or_default())
    }

    fn download_job_log(&self, job_id: u64) -> Result<String> {
        self.record(format!("download_job_log:{job_id}"));
        self.logs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("log for job {job_id} expired")))
    }

    fn list_comments(&self, issue_number: u64) -> Result<Vec<Comment>> {
        self.record(format!("list_comments:{issue_number}"));
        if self.fail.list_comments {
            return Err(Error::Platform("comments unavailable".to_string()));
        }
        Ok(self.tracker.lock().unwrap().comments.clone())
    }

    fn delete_comment(&self, comment_id: u64) -> Result<()> {
        self.record(format!("delete_comment:{comment_id}"));
        if self.fail.delete {
            return Err(Error::Platform("forbidden".to_string()));
        }
        self.tracker
            .lock()
            .unwrap()
            .comments
            .retain(|c| c.id != comment_id);
        Ok(())
    }

    fn create_comment(&self, issue_number: u64, body: &str) -> Result<()> {
        if self.fail.create {
            self.record(format!("create_comment:{issue_number}"));
            return Err(Error::Platform("rate limited".to_string()));
        }
        let id = self.seed_comment(BOT, body);
        self.record(format!("create_comment:{issue_number}:{id}"));
        Ok(())
    }
}

pub fn workflow(id: u64, name: &str, path: &str) -> Workflow {
    Workflow {
        id,
        name: name.to_string(),
        path: path.to_string(),
    }
}

pub fn run(id: u64, conclusion: Conclusion) -> WorkflowRun {
    WorkflowRun {
        id,
        conclusion: Some(conclusion),
    }
}

pub fn job(id: u64, name: &str, conclusion: Conclusion) -> Job {
    Job {
        id,
        name: name.to_string(),
        conclusion: Some(conclusion),
    }
}

pub fn test_config() -> Config {
    Config {
        repo: Some("acme/collection".to_string()),
        ..Config::default()
    }
}

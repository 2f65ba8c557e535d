use std::io::Read;
use std::process::Command;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{Config, Transport};
use crate::error::{Error, Result};

use super::{ChangeHead, CiPlatform, Comment, Conclusion, Job, Workflow, WorkflowRun};

const API_URL: &str = "https://api.github.com";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;
const PER_PAGE: u32 = 100;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Transport for GitHub REST calls. Paths are relative to the API root
/// (`repos/{owner}/{name}/...`).
pub trait GhClient {
    fn get(&self, path: &str) -> Result<String>;

    /// POST a JSON object built from string `fields`.
    fn post(&self, path: &str, fields: &[(&str, &str)]) -> Result<String>;

    fn delete(&self, path: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// `gh` CLI transport
// ---------------------------------------------------------------------------

/// Talks to the API through `gh api`, reusing the CLI's stored credentials.
pub struct GhCliClient;

impl GhCliClient {
    fn run(&self, args: &[&str]) -> Result<String> {
        retry_with_backoff(|| {
            let output = Command::new("gh")
                .args(args)
                .output()
                .map_err(|e| Error::Platform(format!("failed to run gh: {e}")))?;

            if output.status.success() {
                // Job logs may hold invalid UTF-8; the normalizer drops U+FFFD.
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(Error::Platform(format!("gh failed: {stderr}")))
            }
        })
    }

    /// `owner/name` of the repository in the current directory.
    pub fn current_repo(&self) -> Result<String> {
        let json = self.run(&["repo", "view", "--json", "owner,name"])?;
        let info: RepoInfo = decode(&json, "repo info")?;
        Ok(format!("{}/{}", info.owner.login, info.name))
    }
}

impl GhClient for GhCliClient {
    fn get(&self, path: &str) -> Result<String> {
        self.run(&["api", path])
    }

    fn post(&self, path: &str, fields: &[(&str, &str)]) -> Result<String> {
        let mut owned: Vec<String> = vec!["api".into(), "-X".into(), "POST".into(), path.into()];
        for (key, value) in fields {
            owned.push("-f".into());
            owned.push(format!("{key}={value}"));
        }
        let refs: Vec<&str> = owned.iter().map(|s| s.as_str()).collect();
        self.run(&refs)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.run(&["api", "-X", "DELETE", path]).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// REST transport
// ---------------------------------------------------------------------------

/// Talks to the API over HTTPS with a token.
pub struct RestClient {
    base_url: String,
    token: String,
    agent: ureq::Agent,
}

impl RestClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(API_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build(),
        }
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &format!("{}/{path}", self.base_url))
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", "2022-11-28")
            .set("User-Agent", "ci-triage")
    }

    fn send<F>(&self, method: &str, path: &str, call: F) -> Result<ureq::Response>
    where
        F: Fn(ureq::Request) -> std::result::Result<ureq::Response, ureq::Error>,
    {
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        for attempt in 1..=MAX_RETRIES {
            match call(self.request(method, path)) {
                Ok(response) => return Ok(response),
                Err(ref e) if attempt < MAX_RETRIES && is_retryable(e) => {
                    warn!(
                        attempt,
                        method,
                        path,
                        error = %e,
                        backoff_ms,
                        "retrying GitHub API after transient error"
                    );
                    thread::sleep(Duration::from_millis(backoff_ms));
                    backoff_ms *= 2;
                }
                Err(e) => {
                    return Err(Error::Platform(format!(
                        "GitHub API {method} {path} failed: {e}"
                    )));
                }
            }
        }
        unreachable!()
    }
}

impl GhClient for RestClient {
    fn get(&self, path: &str) -> Result<String> {
        let response = self.send("GET", path, |req| req.call())?;
        // Job logs can exceed the size `into_string` accepts and are not
        // guaranteed to be valid UTF-8.
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| Error::Platform(format!("failed to read response for {path}: {e}")))?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn post(&self, path: &str, fields: &[(&str, &str)]) -> Result<String> {
        let body: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
            .collect();
        let body = serde_json::Value::Object(body);
        let response = self.send("POST", path, |req| req.send_json(&body))?;
        response
            .into_string()
            .map_err(|e| Error::Platform(format!("failed to read response for {path}: {e}")))
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.send("DELETE", path, |req| req.call()).map(|_| ())
    }
}

/// Only retry rate-limits (429), server errors (5xx), and transport/network errors.
fn is_retryable(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Status(code, _) => *code == 429 || *code >= 500,
        ureq::Error::Transport(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RepoInfo {
    name: String,
    owner: RepoOwner,
}

#[derive(Debug, Deserialize)]
struct RepoOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhPull {
    head: GhPullHead,
    user: GhUser,
}

#[derive(Debug, Deserialize)]
struct GhPullHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GhWorkflows {
    workflows: Vec<GhWorkflow>,
}

#[derive(Debug, Deserialize)]
struct GhWorkflow {
    id: u64,
    name: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct GhRuns {
    workflow_runs: Vec<GhRun>,
}

#[derive(Debug, Deserialize)]
struct GhRun {
    id: u64,
    conclusion: Option<Conclusion>,
}

#[derive(Debug, Deserialize)]
struct GhJobs {
    jobs: Vec<GhJob>,
}

#[derive(Debug, Deserialize)]
struct GhJob {
    id: u64,
    name: String,
    conclusion: Option<Conclusion>,
}

#[derive(Debug, Deserialize)]
struct GhComment {
    id: u64,
    user: Option<GhUser>,
    body: Option<String>,
}

fn decode<T: DeserializeOwned>(json: &str, what: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| Error::Platform(format!("failed to parse {what}: {e}")))
}

// ---------------------------------------------------------------------------
// GitHubPlatform
// ---------------------------------------------------------------------------

pub struct GitHubPlatform {
    repo: String,
    client: Box<dyn GhClient>,
}

impl GitHubPlatform {
    pub fn new(repo: impl Into<String>, client: Box<dyn GhClient>) -> Self {
        Self {
            repo: repo.into(),
            client,
        }
    }

    /// Build a platform for the configured transport. The `gh` transport
    /// falls back to the current directory's repository when none is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.transport {
            Transport::Gh => {
                let client = GhCliClient;
                let repo = match &config.repo {
                    Some(repo) => repo.clone(),
                    None => client.current_repo()?,
                };
                debug!(repo = %repo, "using gh transport");
                Ok(Self::new(repo, Box::new(client)))
            }
            Transport::Api => {
                let repo = config.repo.clone().ok_or_else(|| {
                    Error::ConfigValidation("repo is required for the api transport".to_string())
                })?;
                let token = resolve_token(&config.token_env)?;
                debug!(repo = %repo, "using api transport");
                Ok(Self::new(repo, Box::new(RestClient::new(token))))
            }
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn repo_path(&self, rest: &str) -> String {
        format!("repos/{}/{rest}", self.repo)
    }
}

fn resolve_token(env_name: &str) -> Result<String> {
    match std::env::var(env_name) {
        Ok(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(Error::ConfigValidation(format!(
            "GitHub token not found in ${env_name}"
        ))),
    }
}

impl CiPlatform for GitHubPlatform {
    fn change_head(&self, change_number: u64) -> Result<ChangeHead> {
        let json = self.client.get(&self.repo_path(&format!("pulls/{change_number}")))?;
        let pull: GhPull = decode(&json, "pull request")?;
        Ok(ChangeHead {
            sha: pull.head.sha,
            author_login: pull.user.login,
        })
    }

    fn list_workflows(&self) -> Result<Vec<Workflow>> {
        let json = self
            .client
            .get(&self.repo_path(&format!("actions/workflows?per_page={PER_PAGE}")))?;
        let parsed: GhWorkflows = decode(&json, "workflows")?;
        let workflows: Vec<Workflow> = parsed
            .workflows
            .into_iter()
            .map(|w| Workflow {
                id: w.id,
                name: w.name,
                path: w.path,
            })
            .collect();
        debug!(count = workflows.len(), "listed workflows");
        Ok(workflows)
    }

    fn list_workflow_runs(
        &self,
        workflow_id: u64,
        head_sha: &str,
        status: &str,
    ) -> Result<Vec<WorkflowRun>> {
        let json = self.client.get(&self.repo_path(&format!(
            "actions/workflows/{workflow_id}/runs?head_sha={head_sha}&status={status}&per_page={PER_PAGE}"
        )))?;
        let parsed: GhRuns = decode(&json, "workflow runs")?;
        Ok(parsed
            .workflow_runs
            .into_iter()
            .map(|r| WorkflowRun {
                id: r.id,
                conclusion: r.conclusion,
            })
            .collect())
    }

    fn list_jobs_for_run(&self, run_id: u64) -> Result<Vec<Job>> {
        let json = self.client.get(
            &self.repo_path(&format!("actions/runs/{run_id}/jobs?per_page={PER_PAGE}")),
        )?;
        let parsed: GhJobs = decode(&json, "jobs")?;
        Ok(parsed
            .jobs
            .into_iter()
            .map(|j| Job {
                id: j.id,
                name: j.name,
                conclusion: j.conclusion,
            })
            .collect())
    }

    fn download_job_log(&self, job_id: u64) -> Result<String> {
        self.client
            .get(&self.repo_path(&format!("actions/jobs/{job_id}/logs")))
    }

    /// Reads pages until one comes back short, so reports on long threads
    /// are still found.
    fn list_comments(&self, issue_number: u64) -> Result<Vec<Comment>> {
        let mut comments = Vec::new();
        for page in 1.. {
            let json = self.client.get(&self.repo_path(&format!(
                "issues/{issue_number}/comments?per_page={PER_PAGE}&page={page}"
            )))?;
            let parsed: Vec<GhComment> = decode(&json, "comments")?;
            let last_page = parsed.len() < PER_PAGE as usize;
            comments.extend(parsed.into_iter().map(|c| Comment {
                id: c.id,
                author_login: c.user.map(|u| u.login).unwrap_or_default(),
                body: c.body.unwrap_or_default(),
            }));
            if last_page {
                break;
            }
        }
        debug!(issue_number, count = comments.len(), "listed comments");
        Ok(comments)
    }

    fn delete_comment(&self, comment_id: u64) -> Result<()> {
        self.client
            .delete(&self.repo_path(&format!("issues/comments/{comment_id}")))
    }

    fn create_comment(&self, issue_number: u64, body: &str) -> Result<()> {
        self.client.post(
            &self.repo_path(&format!("issues/{issue_number}/comments")),
            &[("body", body)],
        )?;
        Ok(())
    }
}

fn retry_with_backoff<F, T>(f: F) -> Result<T>
where
    F: Fn() -> Result<T>,
{
    retry_with_backoff_ms(f, INITIAL_BACKOFF_MS, MAX_RETRIES)
}

fn retry_with_backoff_ms<F, T>(f: F, initial_backoff_ms: u64, max_retries: u32) -> Result<T>
where
    F: Fn() -> Result<T>,
{
    let mut backoff_ms = initial_backoff_ms;

    for attempt in 1..=max_retries {
        match f() {
            Ok(val) => return Ok(val),
            Err(e) if attempt < max_retries => {
                warn!(attempt, error = %e, backoff_ms, "retrying after transient error");
                thread::sleep(Duration::from_millis(backoff_ms));
                backoff_ms *= 2;
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!()
}

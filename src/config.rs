use std::path::Path;

use serde::Deserialize;

use crate::cli::Cli;
use crate::error::{Error, Result};

/// Config file read when `--config` is not given. Optional.
pub const DEFAULT_CONFIG_PATH: &str = ".ci-triage.toml";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub repo: Option<String>,
    pub transport: Option<String>,
    pub bot_login: Option<String>,
    pub workflow_name: Option<String>,
    pub workflow_file: Option<String>,
    pub job_keywords: Option<Vec<String>>,
    pub token_env: Option<String>,
    pub dry_run: Option<bool>,
}

/// How GitHub is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// `gh api`, using the CLI's own authentication.
    Gh,
    /// HTTPS with a token read from the environment.
    Api,
}

impl Transport {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "gh" => Some(Transport::Gh),
            "api" => Some(Transport::Api),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `owner/name`. Resolved from the working directory when unset and the
    /// transport is `gh`.
    pub repo: Option<String>,
    pub transport: Transport,
    /// Login the reports are posted as; only its comments are superseded.
    pub bot_login: String,
    pub workflow_name: String,
    /// Basename matched against workflow definition paths.
    pub workflow_file: String,
    /// A failed job is triaged only if its name contains one of these.
    pub job_keywords: Vec<String>,
    pub token_env: String,
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo: None,
            transport: Transport::Gh,
            bot_login: "ans2bot".to_string(),
            workflow_name: "CI".to_string(),
            workflow_file: "ansible-test.yml".to_string(),
            job_keywords: vec![
                "Sanity".to_string(),
                "Units".to_string(),
                "Integration".to_string(),
            ],
            token_env: "GITHUB_TOKEN".to_string(),
            dry_run: false,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> Result<Self> {
        let file_config = match &cli.config {
            Some(path) => {
                let config_path = Path::new(path);
                if !config_path.exists() {
                    return Err(Error::ConfigNotFound(config_path.to_path_buf()));
                }
                parse_config(&std::fs::read_to_string(config_path)?)?
            }
            None => {
                let config_path = Path::new(DEFAULT_CONFIG_PATH);
                if config_path.exists() {
                    parse_config(&std::fs::read_to_string(config_path)?)?
                } else {
                    ConfigFile::default()
                }
            }
        };

        merge(file_config, cli)
    }
}

pub fn parse_config(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ConfigFile) -> Result<()> {
    if let Some(ref transport) = config.transport
        && Transport::parse(transport).is_none()
    {
        return Err(Error::ConfigValidation(format!(
            "unknown transport: {transport} (expected: gh, api)"
        )));
    }
    if let Some(ref repo) = config.repo {
        let valid = repo
            .split_once('/')
            .is_some_and(|(owner, name)| {
                !owner.is_empty() && !name.is_empty() && !name.contains('/')
            });
        if !valid {
            return Err(Error::ConfigValidation(format!(
                "repo must be owner/name, got: {repo}"
            )));
        }
    }
    if let Some(ref keywords) = config.job_keywords
        && (keywords.is_empty() || keywords.iter().any(|k| k.trim().is_empty()))
    {
        return Err(Error::ConfigValidation(
            "job_keywords must be a non-empty list of non-empty names".to_string(),
        ));
    }
    if let Some(ref login) = config.bot_login
        && login.trim().is_empty()
    {
        return Err(Error::ConfigValidation(
            "bot_login must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Apply CLI overrides on top of the file values, validate, then fill in
/// defaults.
pub fn merge(file: ConfigFile, cli: &Cli) -> Result<Config> {
    let merged = ConfigFile {
        repo: cli.repo.clone().or(file.repo),
        transport: cli.transport.clone().or(file.transport),
        bot_login: cli.bot_login.clone().or(file.bot_login),
        workflow_name: cli.workflow_name.clone().or(file.workflow_name),
        workflow_file: cli.workflow_file.clone().or(file.workflow_file),
        job_keywords: file.job_keywords,
        token_env: file.token_env,
        dry_run: Some(cli.dry_run || file.dry_run.unwrap_or(false)),
    };
    validate(&merged)?;

    let defaults = Config::default();
    Ok(Config {
        repo: merged.repo,
        transport: merged
            .transport
            .as_deref()
            .and_then(Transport::parse)
            .unwrap_or(defaults.transport),
        bot_login: merged.bot_login.unwrap_or(defaults.bot_login),
        workflow_name: merged.workflow_name.unwrap_or(defaults.workflow_name),
        workflow_file: merged.workflow_file.unwrap_or(defaults.workflow_file),
        job_keywords: merged.job_keywords.unwrap_or(defaults.job_keywords),
        token_env: merged.token_env.unwrap_or(defaults.token_env),
        dry_run: merged.dry_run.unwrap_or(defaults.dry_run),
    })
}

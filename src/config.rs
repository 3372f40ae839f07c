use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::mail::batch::RetryPolicy;
use crate::pipeline::FetchSettings;
use crate::pipeline::discovery::{SearchCriteria, SearchScope};
use crate::pipeline::ranking::SortOrder;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub imap_host: Option<String>,
    pub imap_port: u16,
    pub imap_user: Option<String>,
    pub fetch_size: usize,
    pub mails_max_count: usize,
    pub multi_threaded: bool,
    pub split_workers: usize,
    /// Negative reaches back from today; unset disables the date filter.
    pub since_days_ago: Option<i64>,
    pub scope: Option<SearchScope>,
    pub order: SortOrder,
    pub target_mailboxes: Vec<String>,
    pub ignored_mailboxes: Vec<String>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_missing_ratio: f64,
    pub output_file_path: PathBuf,
    pub mailbox_list_path: PathBuf,
    pub log_file_path: Option<PathBuf>,
    pub log_level: String,
    pub exit_delay_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            imap_host: None,
            imap_port: 993,
            imap_user: None,
            fetch_size: 100,
            mails_max_count: 1000,
            multi_threaded: false,
            split_workers: 4,
            since_days_ago: Some(-1),
            scope: None,
            order: SortOrder::Desc,
            target_mailboxes: Vec::new(),
            ignored_mailboxes: ["Drafts", "Sent", "Spam", "Trash"]
                .map(String::from)
                .to_vec(),
            max_retries: 2,
            retry_delay_ms: 1000,
            max_missing_ratio: 1.0,
            output_file_path: PathBuf::from("output/mails.txt"),
            mailbox_list_path: PathBuf::from("output/mailboxes.txt"),
            log_file_path: None,
            log_level: "info".to_string(),
            exit_delay_seconds: 3,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.fetch_size == 0 {
            return Err(Error::Config("fetch_size must be at least 1".into()));
        }
        if self.mails_max_count == 0 {
            return Err(Error::Config("mails_max_count must be at least 1".into()));
        }
        if self.split_workers == 0 {
            return Err(Error::Config("split_workers must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.max_missing_ratio) {
            return Err(Error::Config(format!(
                "max_missing_ratio must be between 0.0 and 1.0, got {}",
                self.max_missing_ratio
            )));
        }
        Ok(())
    }

    /// Applies `IMAP_HOST` / `IMAP_USER` from `lookup` over the file values.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("IMAP_HOST").filter(|v| !v.is_empty()) {
            self.imap_host = Some(host);
        }
        if let Some(user) = lookup("IMAP_USER").filter(|v| !v.is_empty()) {
            self.imap_user = Some(user);
        }
    }

    pub fn host(&self) -> Result<&str> {
        self.imap_host
            .as_deref()
            .ok_or_else(|| Error::Config("imap_host not set in config".into()))
    }

    pub fn user(&self) -> Result<&str> {
        self.imap_user
            .as_deref()
            .ok_or_else(|| Error::Config("imap_user not set in config".into()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
            max_missing_ratio: self.max_missing_ratio,
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            target_mailboxes: self.target_mailboxes.clone(),
            ignored_mailboxes: self.ignored_mailboxes.clone(),
            criteria: SearchCriteria {
                scope: self.scope,
                ..SearchCriteria::since_days_ago(self.since_days_ago)
            },
            batch_size: self.fetch_size,
            max_count: self.mails_max_count,
            multi_threaded: self.multi_threaded,
            workers: self.split_workers,
            order: self.order,
            retry: self.retry_policy(),
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| Error::Config("no config dir available".into()))?
        .join("rs_mail_fetch"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

/// Reads the config at `path`, or at the default location when `None`.
/// A missing file is replaced by a template and reported as an error.
/// Environment overrides are applied before validation.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            imap_host: Some("imap.example.com".to_string()),
            imap_user: Some("you@example.com".to_string()),
            ..Config::default()
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml::to_string_pretty(&sample)?)?;
        return Err(Error::Config(format!(
            "created template config at {}, edit it and run again",
            path.display()
        )));
    }
    let s = fs::read_to_string(&path)?;
    let mut cfg: Config = toml::from_str(&s)?;
    cfg.apply_env_overrides(|key| std::env::var(key).ok());
    cfg.validate()?;
    Ok(cfg)
}

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;

use crate::argocd::{ClientOptions, WatchFilter};
use crate::error::ConfigError;
use crate::model::{SortConfig, SortDirection, SortField};
use crate::sync::SyncOptions;

/// argonaut: a live terminal dashboard for Argo CD applications
#[derive(Parser, Debug, Clone)]
#[command(name = "argonaut")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Argo CD API server, e.g. argocd.example.com or https://argocd.example.com
    #[arg(long, env = "ARGOCD_SERVER")]
    pub server: String,

    /// Bearer token for the API server
    #[arg(long, env = "ARGOCD_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long, env = "ARGOCD_INSECURE")]
    pub insecure: bool,

    /// Only watch these projects (repeatable)
    #[arg(long = "project", value_name = "PROJECT")]
    pub projects: Vec<String>,

    /// Initial tree sort field: name, health or sync
    #[arg(long, default_value = "name")]
    pub sort: String,

    /// Sort the tree in descending order
    #[arg(long)]
    pub sort_desc: bool,

    /// Timeout in seconds for unary requests and stream connects
    #[arg(long, default_value = "10")]
    pub request_timeout: u64,

    /// Log file path [default: <tmp>/argonaut.log]
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: Url,
    pub auth_token: Option<String>,
    pub insecure: bool,
    pub projects: Vec<String>,
    pub sort: SortConfig,
    pub request_timeout: Duration,
    pub log_file: PathBuf,
    pub log_level: String,
}

impl Cli {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let server = parse_server(&self.server)?;
        let direction = if self.sort_desc { SortDirection::Desc } else { SortDirection::Asc };
        Ok(Config {
            server,
            auth_token: self.auth_token.filter(|t| !t.trim().is_empty()),
            insecure: self.insecure,
            projects: self.projects,
            sort: SortConfig::new(SortField::parse(&self.sort), direction),
            request_timeout: Duration::from_secs(self.request_timeout.max(1)),
            log_file: self.log_file.unwrap_or_else(|| std::env::temp_dir().join("argonaut.log")),
            log_level: self.log_level,
        })
    }
}

impl Config {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            server: self.server.clone(),
            auth_token: self.auth_token.clone(),
            insecure: self.insecure,
            request_timeout: self.request_timeout,
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            filter: WatchFilter::for_projects(self.projects.iter().cloned()),
            ..Default::default()
        }
    }
}

/// Normalize a server address: default to https, drop trailing slashes.
pub fn parse_server(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidServer {
            value: raw.to_string(),
            reason: "empty".into(),
        });
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&with_scheme).map_err(|e| ConfigError::InvalidServer {
        value: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::InvalidServer {
                value: raw.to_string(),
                reason: format!("unsupported scheme {}", other),
            });
        }
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidServer {
            value: raw.to_string(),
            reason: "missing host".into(),
        });
    }
    Ok(url)
}

use anyhow::{Context, Result};
use clap::Args;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Base URL of the job-board API
    #[arg(long, global = true, env = "JOBBOARD_API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// Path of the primary submit endpoint
    #[arg(long, global = true, env = "JOBBOARD_SUBMIT_PATH", default_value = "/api/applications")]
    pub submit_path: String,

    /// Path of the fallback (test) submit endpoint
    #[arg(long, global = true, env = "JOBBOARD_FALLBACK_PATH", default_value = "/api/applications/test")]
    pub fallback_path: String,

    /// Never retry a failed submission against the fallback endpoint
    #[arg(long, global = true, env = "JOBBOARD_NO_FALLBACK")]
    pub no_fallback: bool,

    /// Path of the endpoint listing the user's applications
    #[arg(long, global = true, env = "JOBBOARD_READ_PATH", default_value = "/api/applications/user")]
    pub read_path: String,

    /// Bearer token for authenticated requests
    #[arg(long, global = true, env = "JOBBOARD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "JOBBOARD_TIMEOUT_SECS", default_value = "15")]
    pub timeout: u64,

    /// Local database file
    #[arg(long, global = true, env = "JOBBOARD_DB")]
    pub db: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub submit: Url,
    pub fallback: Option<Url>,
    pub read: Url,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoints: Endpoints,
    pub token: Option<String>,
    pub timeout: Duration,
    pub db_path: PathBuf,
}

impl Config {
    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        let base = Url::parse(&args.api_url)
            .with_context(|| format!("Invalid API URL: {}", args.api_url))?;

        let fallback = if args.no_fallback {
            None
        } else {
            Some(join(&base, &args.fallback_path)?)
        };

        let endpoints = Endpoints {
            submit: join(&base, &args.submit_path)?,
            fallback,
            read: join(&base, &args.read_path)?,
        };

        let db_path = match &args.db {
            Some(path) => path.clone(),
            None => default_db_path(),
        };

        Ok(Self {
            endpoints,
            token: args.token.clone().filter(|t| !t.trim().is_empty()),
            timeout: Duration::from_secs(args.timeout.max(1)),
            db_path,
        })
    }
}

// Endpoint paths always hang off the base URL's own path, so a base of
// https://host/v1 yields https://host/v1/api/...
fn join(base: &Url, path: &str) -> Result<Url> {
    let mut root = base.clone();
    if !root.path().ends_with('/') {
        let dir = format!("{}/", root.path());
        root.set_path(&dir);
    }
    root.join(path.trim_start_matches('/'))
        .with_context(|| format!("Invalid endpoint path '{}' for {}", path, base))
}

fn default_db_path() -> PathBuf {
    // XDG data directory, or the working directory when there is no home
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobboard") {
        proj_dirs.data_dir().join("jobboard.db")
    } else {
        PathBuf::from("jobboard.db")
    }
}

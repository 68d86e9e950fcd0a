use std::env;

use eyre::{Result, WrapErr, eyre};
use tracing::debug;
use url::Url;

pub const ENDPOINT_ENV: &str = "GRADEFLOW_ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/chat";

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Url,
    /// Emit terminal styling when rendering answers.
    pub styled: bool,
}

impl Config {
    /// Build the runtime configuration from CLI flags and the environment
    /// (after `.env` has been loaded).
    pub fn load(endpoint_arg: Option<&str>, plain: bool) -> Result<Self> {
        let endpoint_env = env::var(ENDPOINT_ENV).ok();
        let endpoint = resolve_endpoint(endpoint_arg, endpoint_env.as_deref())?;
        let styled = !plain && env::var_os("NO_COLOR").is_none();

        debug!("Using completion endpoint {}", endpoint);

        Ok(Self { endpoint, styled })
    }
}

/// Pick the endpoint: CLI flag, then environment, then the default.
pub fn resolve_endpoint(cli: Option<&str>, env_value: Option<&str>) -> Result<Url> {
    let raw = cli
        .or(env_value)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_ENDPOINT);

    let url = Url::parse(raw).wrap_err_with(|| format!("Invalid endpoint URL: {}", raw))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(eyre!("Unsupported endpoint scheme '{}': {}", scheme, raw)),
    }
}

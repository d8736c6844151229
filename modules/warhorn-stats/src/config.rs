use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use warhorn_client::{PageSize, RetryPolicy, DEFAULT_ENDPOINT};

#[derive(Debug, Parser)]
#[command(name = "warhorn-stats")]
#[command(about = "Emit per-session and per-event signup statistics from Warhorn as CSV lines")]
#[command(version)]
pub struct Cli {
    /// Auth token for the Warhorn GraphQL API
    #[arg(long, env = "WARHORN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Run configuration. The token comes from the command line; tunables come
/// from the environment and default to what Warhorn expects.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub endpoint: String,
    pub page_size: PageSize,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env(cli: Cli) -> Result<Self> {
        Self::from_vars(cli.token, |key| std::env::var(key).ok())
    }

    /// Build from a token and an environment lookup.
    pub fn from_vars(token: Option<String>, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = token.unwrap_or_default();
        if token.trim().is_empty() {
            bail!("--token is required");
        }

        let defaults = RetryPolicy::default();
        let page_size: usize = parse_var(&var, "WARHORN_PAGE_SIZE", PageSize::DEFAULT.get())?;
        let page_size = PageSize::new(page_size)
            .context("WARHORN_PAGE_SIZE must be greater than zero")?;

        let config = Self {
            token,
            endpoint: var("WARHORN_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            page_size,
            retry: RetryPolicy {
                max_retries: parse_var(&var, "WARHORN_MAX_RETRIES", defaults.max_retries)?,
                min_wait: defaults.min_wait,
                max_wait: Duration::from_secs(parse_var(
                    &var,
                    "WARHORN_RETRY_WAIT_MAX_SECS",
                    defaults.max_wait.as_secs(),
                )?),
            },
        };

        Ok(config)
    }

    pub fn log_settings(&self) {
        info!(
            endpoint = self.endpoint.as_str(),
            page_size = self.page_size.get(),
            max_retries = self.retry.max_retries,
            max_wait_secs = self.retry.max_wait.as_secs(),
            "Loaded configuration"
        );
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_warhorn() {
        let config = Config::from_vars(Some("tok".into()), lookup(&[])).unwrap();
        assert_eq!(config.endpoint, "https://warhorn.net/graphql");
        assert_eq!(config.page_size.get(), 100);
        assert_eq!(config.retry.max_retries, 12);
        assert_eq!(config.retry.max_wait, Duration::from_secs(3600));
    }

    #[test]
    fn missing_or_blank_token_is_rejected() {
        assert!(Config::from_vars(None, lookup(&[])).is_err());
        assert!(Config::from_vars(Some("  ".into()), lookup(&[])).is_err());
    }

    #[test]
    fn tunables_are_read_from_environment() {
        let config = Config::from_vars(
            Some("tok".into()),
            lookup(&[
                ("WARHORN_ENDPOINT", "http://localhost:4000/graphql"),
                ("WARHORN_PAGE_SIZE", "50"),
                ("WARHORN_MAX_RETRIES", "3"),
                ("WARHORN_RETRY_WAIT_MAX_SECS", "10"),
            ]),
        )
        .unwrap();

        assert_eq!(config.endpoint, "http://localhost:4000/graphql");
        assert_eq!(config.page_size.get(), 50);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.max_wait, Duration::from_secs(10));
    }

    #[test]
    fn invalid_tunables_are_rejected() {
        let err = Config::from_vars(Some("tok".into()), lookup(&[("WARHORN_PAGE_SIZE", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("WARHORN_PAGE_SIZE"));

        assert!(
            Config::from_vars(Some("tok".into()), lookup(&[("WARHORN_PAGE_SIZE", "0")])).is_err()
        );
    }

    #[test]
    fn cli_accepts_token_flag() {
        let cli = Cli::try_parse_from(["warhorn-stats", "--token", "abc"]).unwrap();
        assert_eq!(cli.token.as_deref(), Some("abc"));
    }
}

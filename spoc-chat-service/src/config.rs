use spoc_flow::JobConfig;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub port: u16,
    pub job: JobConfig,
    /// `None` keeps sessions for the lifetime of the process.
    pub session_ttl: Option<Duration>,
    pub sweep_interval: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = JobConfig::default();

        let job = JobConfig {
            interpreter: lookup("SPOC_INTERPRETER").unwrap_or(defaults.interpreter),
            script: lookup("SPOC_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(defaults.script),
            working_dir: lookup("SPOC_WORKDIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            timeout: seconds(&lookup, "SPOC_JOB_TIMEOUT_SECS", 3600)?,
        };

        let sweep_secs: u64 = parse(&lookup, "SPOC_SWEEP_INTERVAL_SECS", 300)?;

        Ok(Self {
            bind_addr: lookup("SPOC_BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&lookup, "PORT", 8000)?,
            job,
            session_ttl: seconds(&lookup, "SPOC_SESSION_TTL_SECS", 86_400)?,
            sweep_interval: Duration::from_secs(sweep_secs.max(1)),
        })
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

// Zero turns the limit off.
fn seconds<F>(lookup: &F, name: &'static str, default: u64) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse(lookup, name, default)?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

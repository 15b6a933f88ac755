use std::time::Duration;

use selfie_media::cloudinary::CloudinaryConfig;
use selfie_pipeline::orchestrator::{OrchestratorConfig, DEFAULT_MAX_CONCURRENT_JOBS};
use selfie_prediction::api::{ReplicateConfig, DEFAULT_REQUEST_TIMEOUT};
use selfie_prediction::backoff::BackoffConfig;
use selfie_prediction::poller::PollConfig;

/// Model version used when `REPLICATE_MODEL_VERSION` is unset.
pub const DEFAULT_MODEL_VERSION: &str =
    "35324a7df2397e6e57dfd8f4f9d2910425f5123109c8c3ed035e769aeff9ff3c";

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// Every field except the upstream credentials has a default suitable for
/// local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Must exceed the poll budget so the
    /// pipeline, not the middleware, decides when a generation has timed out.
    pub request_timeout_secs: u64,
    /// Time allowed for in-flight requests to finish after a shutdown signal.
    pub shutdown_timeout_secs: u64,
    pub replicate: ReplicateConfig,
    pub cloudinary: CloudinaryConfig,
    pub poll: PollConfig,
    pub pipeline: OrchestratorConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                       |
    /// |------------------------------|-------------------------------|
    /// | `HOST`                       | `0.0.0.0`                     |
    /// | `PORT`                       | `3000`                        |
    /// | `CORS_ORIGINS`               | `http://localhost:5173`       |
    /// | `REQUEST_TIMEOUT_SECS`       | `330`                         |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                          |
    /// | `REPLICATE_API_URL`          | `https://api.replicate.com`   |
    /// | `REPLICATE_API_TOKEN`        | required                      |
    /// | `REPLICATE_MODEL_VERSION`    | [`DEFAULT_MODEL_VERSION`]     |
    /// | `CLOUDINARY_API_URL`         | `https://api.cloudinary.com`  |
    /// | `CLOUDINARY_CLOUD_NAME`      | required                      |
    /// | `CLOUDINARY_API_KEY`         | required                      |
    /// | `CLOUDINARY_API_SECRET`      | required                      |
    /// | `CLOUDINARY_UPLOAD_PRESET`   | required                      |
    /// | `CLOUDINARY_FOLDER`          | `selfies`                     |
    /// | `POLL_INTERVAL_SECS`         | `2`                           |
    /// | `POLL_MAX_ATTEMPTS`          | `150`                         |
    /// | `POLL_MAX_ELAPSED_SECS`      | `300`                         |
    /// | `POLL_MAX_TRANSIENT_RETRIES` | `5`                           |
    /// | `MAX_CONCURRENT_JOBS`        | `4`                           |
    /// | `REHOST_OUTPUT`              | `true`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let cors_origins: Vec<String> = env
            .or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let replicate = ReplicateConfig {
            api_url: env.or("REPLICATE_API_URL", "https://api.replicate.com"),
            api_token: env.required("REPLICATE_API_TOKEN")?,
            model_version: env.or("REPLICATE_MODEL_VERSION", DEFAULT_MODEL_VERSION),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };

        let cloudinary = CloudinaryConfig {
            api_url: env.or("CLOUDINARY_API_URL", "https://api.cloudinary.com"),
            cloud_name: env.required("CLOUDINARY_CLOUD_NAME")?,
            api_key: env.required("CLOUDINARY_API_KEY")?,
            api_secret: env.required("CLOUDINARY_API_SECRET")?,
            upload_preset: env.required("CLOUDINARY_UPLOAD_PRESET")?,
        };

        let poll = PollConfig {
            interval: Duration::from_secs(env.parse("POLL_INTERVAL_SECS", 2)?),
            max_attempts: env.parse("POLL_MAX_ATTEMPTS", 150)?,
            max_elapsed: Duration::from_secs(env.parse("POLL_MAX_ELAPSED_SECS", 300)?),
            max_transient_retries: env.parse("POLL_MAX_TRANSIENT_RETRIES", 5)?,
            backoff: BackoffConfig::default(),
        };

        let max_concurrent_jobs: usize =
            env.parse("MAX_CONCURRENT_JOBS", DEFAULT_MAX_CONCURRENT_JOBS)?;
        if max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_CONCURRENT_JOBS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let pipeline = OrchestratorConfig {
            folder: env.or("CLOUDINARY_FOLDER", "selfies"),
            rehost_output: env.parse("REHOST_OUTPUT", true)?,
            max_concurrent_jobs,
            ..Default::default()
        };

        Ok(Self {
            host: env.or("HOST", "0.0.0.0"),
            port: env.parse("PORT", 3000)?,
            cors_origins,
            request_timeout_secs: env.parse("REQUEST_TIMEOUT_SECS", 330)?,
            shutdown_timeout_secs: env.parse("SHUTDOWN_TIMEOUT_SECS", 30)?,
            replicate,
            cloudinary,
            poll,
            pipeline,
        })
    }
}

/// Typed access to a key lookup.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(value) => match value.trim().parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => Err(ConfigError::Invalid {
                    var: key,
                    reason: e.to_string(),
                    value,
                }),
            },
        }
    }
}

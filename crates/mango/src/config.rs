use std::path::PathBuf;
use std::time::Duration;

/// Credentials and limits for the Mango API, loaded once at start-up and
/// passed to [`crate::MangoApi::new`].
#[derive(Debug, Clone)]
pub struct MangoConfig {
    /// Base URL, e.g. `https://app.mango-office.ru/vpbx`.
    pub api_url: String,
    pub api_key: String,
    pub api_salt: String,
    /// Timeout for stats requests.
    pub request_timeout: Duration,
    /// Ceiling for a single recording download.
    pub recording_timeout: Duration,
    /// How many times to ask for a stats result that is still being built.
    pub result_poll_attempts: u32,
    pub result_poll_delay: Duration,
}

impl MangoConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                             |
    /// |--------------------------------|-------------------------------------|
    /// | `MANGO_API_URL`                | `https://app.mango-office.ru/vpbx`  |
    /// | `MANGO_API_KEY`                | empty                               |
    /// | `MANGO_API_SALT`               | empty                               |
    /// | `MANGO_REQUEST_TIMEOUT_SECS`   | `30`                                |
    /// | `MANGO_RECORDING_TIMEOUT_SECS` | `60`                                |
    /// | `MANGO_RESULT_POLL_ATTEMPTS`   | `5`                                 |
    /// | `MANGO_RESULT_POLL_DELAY_MS`   | `1000`                              |
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("MANGO_API_URL")
                .unwrap_or_else(|_| "https://app.mango-office.ru/vpbx".into()),
            api_key: std::env::var("MANGO_API_KEY").unwrap_or_default(),
            api_salt: std::env::var("MANGO_API_SALT").unwrap_or_default(),
            request_timeout: Duration::from_secs(env_parse("MANGO_REQUEST_TIMEOUT_SECS", 30)),
            recording_timeout: Duration::from_secs(env_parse("MANGO_RECORDING_TIMEOUT_SECS", 60)),
            result_poll_attempts: env_parse("MANGO_RESULT_POLL_ATTEMPTS", 5),
            result_poll_delay: Duration::from_millis(env_parse("MANGO_RESULT_POLL_DELAY_MS", 1000)),
        }
    }

    /// Both credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_salt.is_empty()
    }
}

/// Where downloaded recordings are written and how they are served.
#[derive(Debug, Clone)]
pub struct RecordingStorageConfig {
    /// Directory on disk, served statically.
    pub dir: PathBuf,
    /// URL prefix under which `dir` is served, e.g. `/recordings`.
    pub public_prefix: String,
}

impl RecordingStorageConfig {
    /// | Env Var                    | Default                |
    /// |----------------------------|------------------------|
    /// | `RECORDINGS_DIR`           | `./public/recordings`  |
    /// | `RECORDINGS_PUBLIC_PREFIX` | `/recordings`          |
    pub fn from_env() -> Self {
        Self {
            dir: std::env::var("RECORDINGS_DIR")
                .unwrap_or_else(|_| "./public/recordings".into())
                .into(),
            public_prefix: std::env::var("RECORDINGS_PUBLIC_PREFIX")
                .unwrap_or_else(|_| "/recordings".into()),
        }
    }

    /// Public path of a stored file name.
    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), file_name)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number")),
        Err(_) => default,
    }
}

use crate::{env::EnvManager, error::CliError};
use engine_processing::config::UploadConfig;
use std::{path::PathBuf, time::Duration};

pub const ENV_DATABASE_URL: &str = "UPLINK_DATABASE_URL";
pub const ENV_QUEUE_PATH: &str = "UPLINK_QUEUE_PATH";
pub const ENV_CALL_TIMEOUT_MS: &str = "UPLINK_CALL_TIMEOUT_MS";

const DEFAULT_QUEUE_DIR: &str = ".uplink/queue";

/// Values given on the command line. They win over the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub queue_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    database_url: Option<String>,
    pub queue_path: PathBuf,
    pub call_timeout: Option<Duration>,
    pub upload: UploadConfig,
}

impl Settings {
    pub fn resolve(env: &EnvManager, overrides: &Overrides) -> Result<Self, CliError> {
        let database_url = overrides
            .database_url
            .clone()
            .or_else(|| env.get(ENV_DATABASE_URL).map(str::to_string));

        let queue_path = match overrides
            .queue_path
            .clone()
            .or_else(|| env.get(ENV_QUEUE_PATH).map(PathBuf::from))
        {
            Some(path) => path,
            None => dirs::home_dir()
                .ok_or_else(|| CliError::Config("Could not determine home directory".into()))?
                .join(DEFAULT_QUEUE_DIR),
        };

        let call_timeout = match env.get(ENV_CALL_TIMEOUT_MS) {
            Some(raw) => {
                let ms = raw.trim().parse::<u64>().map_err(|_| {
                    CliError::Config(format!("Invalid value '{raw}' for {ENV_CALL_TIMEOUT_MS}"))
                })?;
                (ms > 0).then(|| Duration::from_millis(ms))
            }
            None => None,
        };

        Ok(Settings {
            database_url,
            queue_path,
            call_timeout,
            upload: UploadConfig::from_env(env.all())?,
        })
    }

    pub fn database_url(&self) -> Result<&str, CliError> {
        self.database_url.as_deref().ok_or_else(|| {
            CliError::Config(format!(
                "No database URL given, pass --database-url or set {ENV_DATABASE_URL}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_processing::config::ENV_MAX_ATTEMPTS;

    #[test]
    fn flags_override_environment() {
        let env = EnvManager::from_pairs(&[
            (ENV_DATABASE_URL, "postgres://env/db"),
            (ENV_QUEUE_PATH, "/env/queue"),
        ]);
        let overrides = Overrides {
            database_url: Some("postgres://flag/db".into()),
            queue_path: Some(PathBuf::from("/flag/queue")),
        };

        let settings = Settings::resolve(&env, &overrides).unwrap();

        assert_eq!(settings.database_url().unwrap(), "postgres://flag/db");
        assert_eq!(settings.queue_path, PathBuf::from("/flag/queue"));
    }

    #[test]
    fn environment_fills_in_missing_flags() {
        let env = EnvManager::from_pairs(&[
            (ENV_DATABASE_URL, "postgres://env/db"),
            (ENV_QUEUE_PATH, "/env/queue"),
            (ENV_CALL_TIMEOUT_MS, "1500"),
            (ENV_MAX_ATTEMPTS, "9"),
        ]);

        let settings = Settings::resolve(&env, &Overrides::default()).unwrap();

        assert_eq!(settings.database_url().unwrap(), "postgres://env/db");
        assert_eq!(settings.queue_path, PathBuf::from("/env/queue"));
        assert_eq!(settings.call_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(settings.upload.max_attempts, 9);
    }

    #[test]
    fn missing_database_url_is_reported_on_use() {
        let env = EnvManager::from_pairs(&[(ENV_QUEUE_PATH, "/env/queue")]);
        let settings = Settings::resolve(&env, &Overrides::default()).unwrap();

        assert!(matches!(settings.database_url(), Err(CliError::Config(_))));
        assert_eq!(settings.call_timeout, None);
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        let env = EnvManager::from_pairs(&[
            (ENV_QUEUE_PATH, "/env/queue"),
            (ENV_CALL_TIMEOUT_MS, "soon"),
        ]);
        assert!(Settings::resolve(&env, &Overrides::default()).is_err());
    }
}

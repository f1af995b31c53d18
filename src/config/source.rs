use std::collections::{HashMap, HashSet};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::AppResult;

/// Env file read when `ENV_FILE` is not set.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Raw configuration values keyed by upper-case variable name.
///
/// Values from the process environment take precedence over the env file,
/// and building a source never writes back into the process environment.
#[derive(Clone, Debug, Default)]
pub struct EnvSource {
    values: HashMap<String, String>,
    /// Keys whose value is not valid UTF-8 and therefore cannot be used.
    unreadable: HashSet<String>,
}

impl EnvSource {
    /// Process environment overlaid on `ENV_FILE` (or `.env`).
    pub fn from_process() -> AppResult<Self> {
        let env_file = env::var_os("ENV_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE));
        Self::load(Some(&env_file))
    }

    pub fn load(env_file: Option<&Path>) -> AppResult<Self> {
        let mut source = Self::default();

        if let Some(path) = env_file {
            source.merge_file(path)?;
        }

        source.merge_os_vars(env::vars_os());
        Ok(source)
    }

    /// Process variables win over file values. A non-UTF-8 value is remembered as
    /// unreadable so the schema can reject it instead of falling back to a default.
    /// Non-UTF-8 keys cannot name a schema field and are skipped.
    pub(crate) fn merge_os_vars<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut process_count = 0;
        for (key, value) in vars {
            let Some(key) = key.to_str() else { continue };
            match value.into_string() {
                Ok(value) => {
                    self.insert(key, value);
                    process_count += 1;
                }
                Err(_) => {
                    let key = key.to_ascii_uppercase();
                    warn!(key = %key, "Environment variable is not valid UTF-8");
                    self.values.remove(&key);
                    self.unreadable.insert(key);
                }
            }
        }
        debug!(variables = process_count, "Loaded process environment");
    }

    /// Builds a source from explicit pairs, ignoring the process environment.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut source = Self::default();
        for (key, value) in pairs {
            source.insert(key.as_ref(), value);
        }
        source
    }

    fn merge_file(&mut self, path: &Path) -> AppResult<()> {
        let iter = match dotenv::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => {
                debug!(path = %path.display(), "No env file found, using process environment only");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        for item in iter {
            let (key, value) = item?;
            self.insert(&key, value);
            count += 1;
        }
        info!(path = %path.display(), variables = count, "Loaded env file");
        Ok(())
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_ascii_uppercase();
        self.unreadable.remove(&key);
        self.values.insert(key, value.into());
    }

    /// True when the variable is set but its value is not valid UTF-8.
    pub fn is_unreadable(&self, key: &str) -> bool {
        self.unreadable.contains(&key.to_ascii_uppercase())
    }

    /// Case-insensitive lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_uppercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let source = EnvSource::from_pairs([("redis_url", "redis://cache:6379")]);
        assert_eq!(source.get("REDIS_URL"), Some("redis://cache:6379"));
        assert_eq!(source.get("Redis_Url"), Some("redis://cache:6379"));
        assert_eq!(source.get("PORT"), None);
    }

    #[test]
    fn test_env_file_is_overlaid_by_process_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SOUNDLAB_TEST_ONLY_IN_FILE=from-file").unwrap();
        writeln!(file, "PATH=from-file").unwrap();

        let source = EnvSource::load(Some(file.path())).unwrap();
        assert_eq!(source.get("SOUNDLAB_TEST_ONLY_IN_FILE"), Some("from-file"));
        // PATH is always set in the process environment and must win
        assert_ne!(source.get("PATH"), Some("from-file"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_value_is_rejected_instead_of_defaulted() {
        use crate::config::AiServiceSettings;
        use crate::error::AppError;
        use std::os::unix::ffi::OsStringExt;

        let mut source = EnvSource::from_pairs([("PORT", "9000")]);
        source.merge_os_vars([
            (OsString::from("PORT"), OsString::from_vec(vec![0x39, 0xff])),
            (OsString::from_vec(vec![0xff, 0x41]), OsString::from("ignored")),
        ]);

        assert!(source.is_unreadable("port"));
        assert_eq!(source.get("PORT"), None);

        match AiServiceSettings::from_source(&source) {
            Err(AppError::InvalidFields(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "PORT");
                assert_eq!(errors[0].reason, "is not valid UTF-8");
            }
            other => panic!("expected field error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_env_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = EnvSource::load(Some(&dir.path().join("absent.env")));
        assert!(source.is_ok());
    }
}

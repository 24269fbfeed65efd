//! Runtime configuration: compiled-in defaults, optionally overridden by a
//! `key value` config file, in turn optionally overridden by CLI flags/env
//! vars (see [`crate::options::Options`]).

use std::fs;
use std::path::Path;

use memkv_util::rand_string;

const RUN_ID_LEN: usize = 40;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub databases: usize,
    pub appendonly: bool,
    pub appendfilename: String,
    pub appendfsync: String,
    pub maxclients: u32,
    pub runid: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 6379,
            databases: 16,
            appendonly: false,
            appendfilename: "appendonly.aof".to_string(),
            appendfsync: "everysec".to_string(),
            maxclients: 10_000,
            runid: rand_string(RUN_ID_LEN),
        }
    }
}

impl Config {
    /// Loads from the file named by `CONFIG`, else `redis.conf` in the
    /// working directory if present, else compiled-in defaults.
    pub fn load() -> Self {
        let path = std::env::var("CONFIG").ok();
        let config = match &path {
            Some(path) => Self::from_file(Path::new(path)),
            None => {
                let fallback = Path::new("redis.conf");
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    None
                }
            }
        };
        config.unwrap_or_default()
    }

    fn from_file(path: &Path) -> Option<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
                return None;
            }
        };
        let mut config = Self::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default().trim();
            config.apply(key, value);
        }
        Some(config)
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key.to_lowercase().as_str() {
            "bind" => self.bind = value.to_string(),
            "port" => {
                if let Ok(n) = value.parse() {
                    self.port = n;
                }
            }
            "databases" => {
                if let Ok(n) = value.parse() {
                    self.databases = n;
                }
            }
            "appendonly" => self.appendonly = value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("true"),
            "appendfilename" => self.appendfilename = value.to_string(),
            "appendfsync" => self.appendfsync = value.to_string(),
            "maxclients" => {
                if let Ok(n) = value.parse() {
                    self.maxclients = n;
                }
            }
            "runid" => self.runid = value.to_string(),
            other => tracing::warn!(key = %other, "unrecognized config directive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 6379);
        assert_eq!(config.databases, 16);
        assert!(!config.appendonly);
        assert_eq!(config.runid.len(), RUN_ID_LEN);
    }

    #[test]
    fn parses_key_value_file_with_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# a comment\nport 7000\nappendonly yes\ndatabases 4").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.port, 7000);
        assert!(config.appendonly);
        assert_eq!(config.databases, 4);
    }

    #[test]
    fn missing_file_falls_back_to_none() {
        assert!(Config::from_file(Path::new("/nonexistent/path/redis.conf")).is_none());
    }
}

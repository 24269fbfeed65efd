//! CLI flags/env vars overriding whatever [`crate::config::Config`] loaded
//! from file or defaults.

use clap::Parser;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "memkv-server", about = "An in-memory key-value store speaking RESP")]
pub struct Options {
    #[arg(long, env = "MEMKV_BIND")]
    pub bind: Option<String>,

    #[arg(long, env = "MEMKV_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "MEMKV_DATABASES")]
    pub databases: Option<usize>,

    #[arg(long, env = "MEMKV_APPENDONLY")]
    pub appendonly: Option<bool>,

    #[arg(long, env = "MEMKV_APPENDFILENAME")]
    pub appendfilename: Option<String>,

    #[arg(long, env = "MEMKV_APPENDFSYNC")]
    pub appendfsync: Option<String>,
}

impl Options {
    /// Layers these flags/env vars over `config`, overriding only the
    /// fields that were actually supplied.
    pub fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(databases) = self.databases {
            config.databases = databases;
        }
        if let Some(appendonly) = self.appendonly {
            config.appendonly = appendonly;
        }
        if let Some(appendfilename) = self.appendfilename {
            config.appendfilename = appendfilename;
        }
        if let Some(appendfsync) = self.appendfsync {
            config.appendfsync = appendfsync;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_supplied_fields() {
        let mut config = Config::default();
        let original_runid = config.runid.clone();
        let options = Options {
            bind: None,
            port: Some(7000),
            databases: None,
            appendonly: Some(true),
            appendfilename: None,
            appendfsync: None,
        };
        options.apply(&mut config);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 7000);
        assert!(config.appendonly);
        assert_eq!(config.runid, original_runid);
    }
}

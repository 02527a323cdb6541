use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::HostResult;

fn default_config_path() -> PathBuf {
    PathBuf::from("config.json")
}

fn default_workspace() -> PathBuf {
    PathBuf::from("./workspace")
}

fn default_gateway_url() -> Url {
    Url::parse("https://gateway.ceres.example/peers").unwrap()
}

fn default_feedback_url() -> Url {
    Url::parse("https://gateway.ceres.example/feedback/log").unwrap()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "ceres", long_about = None)]
#[serde(default)]
pub struct Config {
    #[arg(long, require_equals = true, default_value = "config.json")]
    #[serde(default = "default_config_path")]
    /// Path to a config file with the same fields as these flags.
    /// Command line arguments take precedence over its contents
    pub config_path: PathBuf,

    #[arg(long, require_equals = true, default_value = "./workspace")]
    #[serde(default = "default_workspace")]
    /// Miner workspace directory (fragments, proof records, logs)
    pub workspace: PathBuf,

    #[arg(long, require_equals = true, value_delimiter = ',')]
    /// Chain RPC endpoints, first answering wins
    pub rpc_endpoints: Vec<Url>,

    #[arg(long, require_equals = true, default_value = "https://gateway.ceres.example/peers")]
    #[serde(default = "default_gateway_url")]
    /// Gateway publishing the peer table
    pub gateway_url: Url,

    #[arg(long, require_equals = true, default_value = "https://gateway.ceres.example/feedback/log")]
    #[serde(default = "default_feedback_url")]
    /// Endpoint the rotating logs are uploaded to
    pub feedback_url: Url,

    #[arg(long, require_equals = true, value_delimiter = ',')]
    /// TEE endpoints to consult ahead of the ones discovered on chain
    pub tee_endpoints: Vec<String>,

    #[arg(long, require_equals = true, env = "RUST_LOG", default_value = "info")]
    #[serde(default = "default_log_level")]
    /// Set the log level
    pub log_level: String,

    #[arg(long, require_equals = true, env = "CERES_SIGNING_SEED")]
    /// Hex-encoded 32-byte signing seed for the miner identity
    pub signing_seed: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            workspace: default_workspace(),
            rpc_endpoints: Vec::new(),
            gateway_url: default_gateway_url(),
            feedback_url: default_feedback_url(),
            tee_endpoints: Vec::new(),
            log_level: default_log_level(),
            signing_seed: None,
        }
    }
}

impl Config {
    /// Read the options from the config file and merge them with the current
    /// options, command line taking precedence. A missing file is fine.
    pub fn merge_from_file(&mut self) -> HostResult<()> {
        let file = match std::fs::File::open(&self.config_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let reader = std::io::BufReader::new(file);
        let mut config: Value = serde_json::from_reader(reader)?;
        let this = serde_json::to_value(&*self)?;
        merge(&mut config, &this);

        *self = serde_json::from_value(config)?;
        Ok(())
    }
}

/// Merges two json's together, overwriting `a` with the values of `b`
fn merge(a: &mut Value, b: &Value) {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            for (k, v) in b {
                merge(a.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (a, b) if !b.is_null() => *a = b.clone(),
        // If b is null, just keep a (which means do nothing).
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_config_file_is_fine() {
        let mut config = Config {
            config_path: PathBuf::from("/definitely/not/here.json"),
            ..Default::default()
        };
        config.merge_from_file().unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn file_fills_gaps_but_flags_win() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"log_level": "debug", "signing_seed": "deadbeef"}}"#
        )
        .unwrap();
        let mut config = Config {
            config_path: file.path().to_path_buf(),
            log_level: "warn".to_string(),
            ..Default::default()
        };
        config.merge_from_file().unwrap();
        // the present flag value wins over the file
        assert_eq!(config.log_level, "warn");
        // the file supplies what the command line left unset
        assert_eq!(config.signing_seed.as_deref(), Some("deadbeef"));
    }
}

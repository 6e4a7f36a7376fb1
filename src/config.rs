use serde::Deserialize;
use std::path::Path;
use tracing::warn;

use crate::models::clp::ClientOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default, alias = "skipCertificateCheck")]
    pub skip_certificate_check: bool,
    #[serde(default)]
    pub servers: Vec<ClientOptions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_listen_host")]
    pub host: String,
    #[serde(default = "default_listen_port")]
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub ssl_key_file: Option<String>,
    #[serde(default)]
    pub ssl_cert_file: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_listen_host(),
            port: default_listen_port(),
            ssl: false,
            ssl_key_file: None,
            ssl_cert_file: None,
        }
    }
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("reading config {}: {}", path.display(), e))?;
        Self::parse(&data)
    }

    /// Parses YAML, which also accepts the JSON layout of `config.json`.
    pub fn parse(data: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let cfg: Config =
            serde_yaml::from_str(data).map_err(|e| format!("parsing config: {}", e))?;

        if cfg.listen.ssl {
            return Err("listen.ssl is not supported; terminate TLS in front of the server".into());
        }

        if cfg.servers.is_empty() {
            warn!("no cluster servers configured; the dashboard will stay empty");
        }

        for s in &cfg.servers {
            if !(s.clpserver.starts_with("http://") || s.clpserver.starts_with("https://")) {
                return Err(format!("clpserver {:?} must be an http(s) URL", s.clpserver).into());
            }
        }

        Ok(cfg)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen.host, self.listen.port)
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub content: ContentConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Upper bound for downloading the SNS signing certificate.
    #[serde(default = "default_http_timeout")]
    pub certificate_timeout_seconds: u64,
    /// Upper bound for visiting a SubscribeURL/UnsubscribeURL.
    #[serde(default = "default_http_timeout")]
    pub confirmation_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_content_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_object_store_root")]
    pub object_store_root: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_user_agent() -> String {
    format!("ses-inbound/{}", env!("CARGO_PKG_VERSION"))
}

fn default_http_timeout() -> u64 {
    10
}

fn default_content_timeout() -> u64 {
    60
}

fn default_object_store_root() -> String {
    "/var/lib/ses-inbound/objects".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            certificate_timeout_seconds: default_http_timeout(),
            confirmation_timeout_seconds: default_http_timeout(),
        }
    }
}

impl HttpConfig {
    pub fn certificate_timeout(&self) -> Duration {
        Duration::from_secs(self.certificate_timeout_seconds)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_seconds)
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_content_timeout(),
            object_store_root: default_object_store_root(),
        }
    }
}

impl ContentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            content: ContentConfig::default(),
            logging: Some(LoggingConfig {
                level: "info".to_string(),
            }),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Rejects settings that would leave network calls unbounded.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.http.certificate_timeout_seconds == 0 {
            anyhow::bail!("http.certificate_timeout_seconds must be greater than zero");
        }
        if self.http.confirmation_timeout_seconds == 0 {
            anyhow::bail!("http.confirmation_timeout_seconds must be greater than zero");
        }
        if self.content.timeout_seconds == 0 {
            anyhow::bail!("content.timeout_seconds must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.content.timeout(), Duration::from_secs(60));
        assert_eq!(config.http.certificate_timeout(), Duration::from_secs(10));
        assert!(config.http.user_agent.starts_with("ses-inbound/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
http:
  certificate_timeout_seconds: 3
content:
  object_store_root: /srv/mail
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.http.certificate_timeout(), Duration::from_secs(3));
        assert_eq!(config.http.confirmation_timeout(), Duration::from_secs(10));
        assert_eq!(config.content.object_store_root, "/srv/mail");
        assert_eq!(config.content.timeout_seconds, 60);
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_round_trip_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ses-inbound.yaml");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.content.timeout_seconds = 30;
        config.to_file(path).unwrap();

        assert_eq!(Config::from_file(path).unwrap(), config);
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.yaml");
        std::fs::write(&path, "content:\n  timeout_seconds: 0\n").unwrap();

        let err = Config::from_file(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("content.timeout_seconds"));
    }
}

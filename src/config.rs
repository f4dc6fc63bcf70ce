//! 配置系统
//! 从环境变量加载测试主机配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::Secret;
use serde::Deserialize;
use std::path::PathBuf;

use crate::ssh::{ConnectionTarget, SSH_PORT};

#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    /// 测试主机地址
    pub ip: String,
    /// SSH 用户名
    pub username: String,
    /// SSH 密码（使用 Secret 包装，防止日志泄露）
    pub password: Secret<String>,
    /// SSH 端口
    pub port: u16,
    /// 私钥路径（不支持带密码的私钥）
    pub private_key_path: PathBuf,
    /// TCP 连接 + 握手超时（秒）
    pub connect_timeout_secs: u64,
}

impl SshSettings {
    pub fn new(
        ip: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            ip: ip.into(),
            username: username.into(),
            password: Secret::new(password.into()),
            port: SSH_PORT,
            private_key_path: default_private_key_path(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = path.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout_secs: u64) -> Self {
        self.connect_timeout_secs = timeout_secs;
        self
    }

    /// 连接目标
    pub fn target(&self) -> ConnectionTarget {
        ConnectionTarget {
            host: self.ip.clone(),
            port: self.port,
            username: self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty, compact
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestConfig {
    pub ssh: SshSettings,
    pub logging: LoggingConfig,
}

/// 默认私钥路径：`<home>/.ssh/id_rsa`
pub fn default_private_key_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".ssh")
        .join("id_rsa")
}

fn default_connect_timeout() -> u64 {
    10
}

impl TestConfig {
    /// 从环境变量加载配置（前缀为 E2E_）
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("ssh.username", "root")?
            .set_default("ssh.password", "")?
            .set_default("ssh.port", i64::from(SSH_PORT))?
            .set_default(
                "ssh.private_key_path",
                default_private_key_path().to_string_lossy().into_owned(),
            )?
            .set_default("ssh.connect_timeout_secs", default_connect_timeout() as i64)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(
                Environment::with_prefix("E2E")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config: TestConfig = settings.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ssh.ip.trim().is_empty() {
            return Err(ConfigError::Message("ssh.ip must not be empty".to_string()));
        }

        if self.ssh.username.trim().is_empty() {
            return Err(ConfigError::Message("ssh.username must not be empty".to_string()));
        }

        if self.ssh.port == 0 {
            return Err(ConfigError::Message("ssh.port must be > 0".to_string()));
        }

        if self.ssh.connect_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "ssh.connect_timeout_secs must be > 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty, compact",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }
}

//! 统一错误模型
//! 定义主机环境（SSH 远程执行）的所有错误类型

use std::path::PathBuf;

/// 主机环境错误类型
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostEnvError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("error reading private key file {path}: {message}")]
    PrivateKey { path: PathBuf, message: String },

    #[error("SSH connection error: {0}")]
    Connection(String),

    #[error("SSH authentication failed: {0}")]
    Authentication(String),

    /// 会话未建立（两种认证方式均失败）
    #[error("ssh client init failed")]
    ClientNotInitialized,

    /// 远程命令失败，同时携带已产生的输出和失败原因
    #[error("{output}, {reason}")]
    Execution { output: String, reason: String },

    #[error("{output}, command cancelled")]
    Cancelled { output: String },
}

impl HostEnvError {
    /// 远程命令已产生的输出（仅执行类错误有）
    pub fn output(&self) -> Option<&str> {
        match self {
            HostEnvError::Execution { output, .. } | HostEnvError::Cancelled { output } => {
                Some(output)
            }
            _ => None,
        }
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for HostEnvError {
    fn from(e: config::ConfigError) -> Self {
        HostEnvError::Config(e.to_string())
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, HostEnvError>;

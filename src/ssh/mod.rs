//! SSH执行模块
//! 单会话 SSH 连接管理和命令执行

pub mod credential;
pub mod session;

use std::fmt;

pub use credential::{resolve_password, resolve_private_key, Credential};
pub use session::SshSession;

/// 日志组件标识
pub const COMPONENT: &str = "SSHExec";

/// 默认 SSH 端口
pub const SSH_PORT: u16 = 22;

/// SSH 连接目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// 主机地址
    pub host: String,
    /// 端口
    pub port: u16,
    /// 用户名
    pub username: String,
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

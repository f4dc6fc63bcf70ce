//! 主机环境
//! 通过 SSH 在固定测试主机上执行命令

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::Env;
use crate::config::{SshSettings, TestConfig};
use crate::error::{HostEnvError, Result};
use crate::ssh::{self, ConnectionTarget, SshSession, COMPONENT};

/// 主机环境类型标识
pub const HOST_ENV_TYPE: &str = "host";

/// 初始化后的状态，构造完成后不再变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEnvState {
    /// 会话已建立
    Ready,
    /// 两种认证方式均失败，所有命令都会返回错误
    Degraded,
}

/// 主机环境
///
/// 构造时建立唯一的 SSH 会话（私钥优先，失败后回退到密码），之后不会重连或替换。
#[derive(Debug)]
pub struct HostEnv {
    session: Option<SshSession>,
    target: ConnectionTarget,
}

impl HostEnv {
    /// 按配置建立会话；连接失败不会返回错误，只会得到 `Degraded` 状态的环境
    pub async fn new(settings: &SshSettings) -> Self {
        let session = Self::init_ssh_session(settings).await;
        Self {
            session,
            target: settings.target(),
        }
    }

    /// 从环境变量加载配置后建立会话，仅配置错误会返回 Err
    pub async fn from_env() -> Result<Self> {
        let config = TestConfig::from_env()?;
        Ok(Self::new(&config.ssh).await)
    }

    pub fn state(&self) -> HostEnvState {
        if self.session.is_some() {
            HostEnvState::Ready
        } else {
            HostEnvState::Degraded
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == HostEnvState::Ready
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// 关闭会话，测试结束时调用
    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }

    async fn exec(&self, command: &str, cancel: Option<&CancellationToken>) -> Result<String> {
        let session = self
            .session
            .as_ref()
            .ok_or(HostEnvError::ClientNotInitialized)?;
        session.run(command, cancel).await
    }

    async fn init_ssh_session(settings: &SshSettings) -> Option<SshSession> {
        match Self::init_ssh_session_by_private_key(settings).await {
            Ok(session) => return Some(session),
            Err(e) => {
                warn!(
                    component = COMPONENT,
                    error = %e,
                    "using private key to create ssh client failed, will fallback to password"
                );
            }
        }

        match Self::init_ssh_session_by_password(settings).await {
            Ok(session) => {
                info!(component = COMPONENT, "Create ssh client successfully.");
                Some(session)
            }
            Err(e) => {
                error!(component = COMPONENT, error = %e, "error in create ssh client");
                None
            }
        }
    }

    async fn init_ssh_session_by_private_key(settings: &SshSettings) -> Result<SshSession> {
        let credential = ssh::resolve_private_key(&settings.private_key_path)?;
        SshSession::connect(
            &settings.target(),
            &credential,
            Duration::from_secs(settings.connect_timeout_secs),
        )
        .await
    }

    async fn init_ssh_session_by_password(settings: &SshSettings) -> Result<SshSession> {
        let credential = ssh::resolve_password(settings);
        SshSession::connect(
            &settings.target(),
            &credential,
            Duration::from_secs(settings.connect_timeout_secs),
        )
        .await
    }
}

#[async_trait]
impl Env for HostEnv {
    fn env_type(&self) -> &'static str {
        HOST_ENV_TYPE
    }

    async fn exec_on_loong_collector(&self, command: &str) -> Result<String> {
        self.exec(command, None).await
    }

    async fn exec_on_source(&self, cancel: &CancellationToken, command: &str) -> Result<String> {
        self.exec(command, Some(cancel)).await
    }
}

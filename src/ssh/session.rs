//! SSH 会话
//!
//! 使用 russh 建立单个已认证连接，每次执行命令打开一个新的通道。
//! 主机密钥校验被有意关闭，仅用于受控的测试网络。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::{ChannelMsg, Sig};
use russh_keys::key::PublicKey;
use russh_keys::PublicKeyBase64;
use secrecy::ExposeSecret;
use sha2::Digest;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ConnectionTarget, Credential, COMPONENT};
use crate::error::{HostEnvError, Result};

/// 接受任意主机密钥的会话处理器
struct InsecureHostKeyHandler {
    host: String,
    port: u16,
}

#[async_trait]
impl client::Handler for InsecureHostKeyHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let mut hasher = sha2::Sha256::new();
        hasher.update(server_public_key.public_key_base64().as_bytes());
        let fingerprint = hex::encode(hasher.finalize());

        warn!(
            component = COMPONENT,
            host = %self.host,
            port = self.port,
            fingerprint = %fingerprint,
            "Host key verification DISABLED - accepting all keys"
        );
        Ok(true)
    }
}

/// 通道读取的下一步
enum Next {
    Msg(Option<ChannelMsg>),
    Cancelled,
}

/// 已认证的 SSH 会话
pub struct SshSession {
    handle: Handle<InsecureHostKeyHandler>,
    target: ConnectionTarget,
}

impl fmt::Debug for SshSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSession")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl SshSession {
    /// 建立连接并认证
    ///
    /// `connect_timeout` 只约束 TCP 连接和握手，不约束认证和后续命令。
    pub async fn connect(
        target: &ConnectionTarget,
        credential: &Credential,
        connect_timeout: Duration,
    ) -> Result<Self> {
        debug!(
            component = COMPONENT,
            host = %target.host,
            port = target.port,
            user = %target.username,
            auth = credential.kind(),
            "Connecting to SSH server"
        );

        let client_config = Arc::new(Config::default());
        let handler = InsecureHostKeyHandler {
            host: target.host.clone(),
            port: target.port,
        };

        let mut handle = timeout(
            connect_timeout,
            client::connect(client_config, (target.host.clone(), target.port), handler),
        )
        .await
        .map_err(|_| {
            HostEnvError::Connection(format!(
                "connection to {} timed out after {}s",
                target,
                connect_timeout.as_secs()
            ))
        })?
        .map_err(|e| HostEnvError::Connection(format!("{}: {}", target, e)))?;

        let authenticated = match credential {
            Credential::PrivateKey { key, .. } => {
                handle
                    .authenticate_publickey(target.username.clone(), key.clone())
                    .await
            }
            Credential::Password { password } => {
                handle
                    .authenticate_password(
                        target.username.clone(),
                        password.expose_secret().clone(),
                    )
                    .await
            }
        }
        .map_err(|e| HostEnvError::Authentication(format!("{}: {}", target, e)))?;

        if !authenticated {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await;
            return Err(HostEnvError::Authentication(format!(
                "{} authentication rejected by {}",
                credential.kind(),
                target
            )));
        }

        info!(
            component = COMPONENT,
            target = %target,
            auth = credential.kind(),
            "SSH session established"
        );

        Ok(Self {
            handle,
            target: target.clone(),
        })
    }

    /// 执行命令并等待结束，返回 stdout/stderr 按到达顺序合并后的输出
    ///
    /// 退出码非 0、被信号终止或传输出错时返回 `Execution`，其中包含已收到的输出。
    /// 令牌被取消时关闭通道并返回 `Cancelled`。
    pub async fn run(&self, command: &str, cancel: Option<&CancellationToken>) -> Result<String> {
        debug!(component = COMPONENT, target = %self.target, command = %command, "Executing SSH command");

        let mut channel = self.handle.channel_open_session().await.map_err(|e| {
            error!(component = COMPONENT, error = %e, "failed to open SSH channel");
            HostEnvError::Execution {
                output: String::new(),
                reason: format!("failed to open channel: {}", e),
            }
        })?;

        channel.exec(true, command).await.map_err(|e| HostEnvError::Execution {
            output: String::new(),
            reason: format!("failed to execute command: {}", e),
        })?;

        let mut output = Vec::new();
        let mut exit_status = None;
        let mut exit_signal = None;

        loop {
            let next = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Next::Cancelled,
                    msg = channel.wait() => Next::Msg(msg),
                },
                None => Next::Msg(channel.wait().await),
            };

            match next {
                Next::Cancelled => {
                    let _ = channel.close().await;
                    warn!(component = COMPONENT, command = %command, "SSH command cancelled");
                    return Err(HostEnvError::Cancelled {
                        output: String::from_utf8_lossy(&output).into_owned(),
                    });
                }
                Next::Msg(Some(ChannelMsg::Data { ref data })) => {
                    output.extend_from_slice(data);
                }
                // SSH_EXTENDED_DATA_STDERR
                Next::Msg(Some(ChannelMsg::ExtendedData { ref data, ext: 1 })) => {
                    output.extend_from_slice(data);
                }
                Next::Msg(Some(ChannelMsg::ExitStatus { exit_status: code })) => {
                    exit_status = Some(code);
                }
                Next::Msg(Some(ChannelMsg::ExitSignal { signal_name, .. })) => {
                    exit_signal = Some(signal_display_name(&signal_name));
                }
                Next::Msg(Some(ChannelMsg::Close)) | Next::Msg(None) => break,
                Next::Msg(Some(_)) => {}
            }
        }

        let output = String::from_utf8_lossy(&output).into_owned();

        match exit_reason(exit_status, exit_signal.as_deref()) {
            None => {
                debug!(component = COMPONENT, output_len = output.len(), "Command executed");
                Ok(output)
            }
            Some(reason) => Err(HostEnvError::Execution { output, reason }),
        }
    }

    /// 断开连接
    pub async fn close(self) {
        match self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
        {
            Ok(()) => info!(component = COMPONENT, target = %self.target, "SSH session closed"),
            Err(e) => warn!(component = COMPONENT, error = %e, "failed to close SSH session"),
        }
    }
}

/// 信号名，`Sig::Custom` 取其内部名称
fn signal_display_name(signal: &Sig) -> String {
    match signal {
        Sig::Custom(name) => name.clone(),
        other => format!("{:?}", other),
    }
}

/// 命令结束原因；正常退出返回 None
fn exit_reason(exit_status: Option<u32>, exit_signal: Option<&str>) -> Option<String> {
    match (exit_status, exit_signal) {
        (Some(code), Some(signal)) => Some(format!(
            "Process exited with status {} from signal {}",
            code, signal
        )),
        (None, Some(signal)) => Some(format!("Process exited with signal {}", signal)),
        (Some(0), None) => None,
        (Some(code), None) => Some(format!("Process exited with status {}", code)),
        (None, None) => Some("Process exited without exit status".to_string()),
    }
}

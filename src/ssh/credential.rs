//! SSH 认证凭据
//!
//! 两种凭据按顺序尝试：私钥（固定路径，无密码）优先，其次是配置中的密码。

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use russh_keys::key::KeyPair;
use russh_keys::load_secret_key;
use secrecy::Secret;
use tracing::error;

use super::COMPONENT;
use crate::config::SshSettings;
use crate::error::{HostEnvError, Result};

/// SSH 认证凭据，只在建立会话时使用一次
#[derive(Clone)]
pub enum Credential {
    /// 私钥认证
    PrivateKey { path: PathBuf, key: Arc<KeyPair> },
    /// 密码认证
    Password { password: Secret<String> },
}

impl Credential {
    /// 凭据类型名，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::PrivateKey { .. } => "private key",
            Credential::Password { .. } => "password",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::PrivateKey { path, .. } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .finish_non_exhaustive(),
            Credential::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// 读取并解析私钥文件
pub fn resolve_private_key(path: &Path) -> Result<Credential> {
    let key = load_secret_key(path, None).map_err(|e| {
        error!(
            component = COMPONENT,
            path = %path.display(),
            error = %e,
            "error reading private key file"
        );
        HostEnvError::PrivateKey {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    Ok(Credential::PrivateKey {
        path: path.to_path_buf(),
        key: Arc::new(key),
    })
}

/// 从配置获取密码凭据
pub fn resolve_password(settings: &SshSettings) -> Credential {
    Credential::Password {
        password: settings.password.clone(),
    }
}

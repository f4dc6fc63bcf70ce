//! 测试环境
//! 集成测试框架通过 `Env` 在目标环境上执行命令

pub mod host;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use host::{HostEnv, HostEnvState, HOST_ENV_TYPE};

/// 测试环境接口
#[async_trait]
pub trait Env: Send + Sync {
    /// 环境类型标识
    fn env_type(&self) -> &'static str;

    /// 在采集器所在机器上执行命令
    async fn exec_on_loong_collector(&self, command: &str) -> Result<String>;

    /// 在数据源所在机器上执行命令，令牌取消时中止
    async fn exec_on_source(&self, cancel: &CancellationToken, command: &str) -> Result<String>;
}

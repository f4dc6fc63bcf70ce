//! 端到端测试主机环境
//! 通过 SSH 在测试主机上执行命令

pub mod config;
pub mod error;
pub mod setup;
pub mod ssh;
pub mod telemetry;

pub use error::{HostEnvError, Result};
pub use setup::{Env, HostEnv, HostEnvState};

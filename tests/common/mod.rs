//! 测试公共模块
//! 提供进程内 SSH 服务器、日志捕获和私钥目录等测试工具

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use e2e_host_env::config::SshSettings;
use russh::server::{self, Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, Sig};
use russh_keys::key::PublicKey;
use russh_keys::PublicKeyBase64;
use tokio::net::TcpListener;
use tracing_subscriber::fmt::MakeWriter;

pub const TEST_USER: &str = "tester";
pub const TEST_PASSWORD: &str = "correct-horse";

const HOST_KEY: &str = include_str!("../fixtures/host_ed25519");
const CLIENT_KEY: &str = include_str!("../fixtures/client_ed25519");
const CLIENT_PUBLIC_KEY: &str = include_str!("../fixtures/client_ed25519.pub");

/// 客户端公钥的 base64 部分
fn client_public_key_base64() -> String {
    CLIENT_PUBLIC_KEY
        .split_whitespace()
        .nth(1)
        .expect("malformed public key fixture")
        .to_string()
}

// ==================== 测试 SSH 服务器 ====================

/// 服务器侧认证计数
#[derive(Default)]
pub struct AuthCounters {
    pub password_attempts: AtomicUsize,
    pub publickey_attempts: AtomicUsize,
}

struct ServerState {
    password: String,
    authorized_key: Option<String>,
    counters: Arc<AuthCounters>,
}

/// 进程内 SSH 服务器，按命令名返回预设输出
pub struct TestSshServer {
    pub addr: SocketAddr,
    pub counters: Arc<AuthCounters>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl TestSshServer {
    /// 启动服务器；`accept_client_key` 为 true 时接受 fixtures 中的客户端私钥
    pub async fn start(accept_client_key: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test SSH server");
        let addr = listener.local_addr().unwrap();

        let host_key = russh_keys::decode_secret_key(HOST_KEY, None).expect("invalid host key fixture");
        let config = Arc::new(server::Config {
            keys: vec![host_key],
            auth_rejection_time: Duration::from_millis(10),
            auth_rejection_time_initial: Some(Duration::from_millis(0)),
            ..Default::default()
        });

        let counters = Arc::new(AuthCounters::default());
        let state = Arc::new(ServerState {
            password: TEST_PASSWORD.to_string(),
            authorized_key: accept_client_key.then(client_public_key_base64),
            counters: counters.clone(),
        });

        let accept_task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let handler = ScriptedHandler {
                    state: state.clone(),
                };
                let config = config.clone();
                tokio::spawn(async move {
                    if let Ok(session) = server::run_stream(config, socket, handler).await {
                        let _ = session.await;
                    }
                });
            }
        });

        Self {
            addr,
            counters,
            accept_task,
        }
    }

    pub fn password_attempts(&self) -> usize {
        self.counters.password_attempts.load(Ordering::SeqCst)
    }

    pub fn publickey_attempts(&self) -> usize {
        self.counters.publickey_attempts.load(Ordering::SeqCst)
    }

    /// 指向本服务器的连接配置
    pub fn settings(&self, password: &str, private_key_path: &Path) -> SshSettings {
        SshSettings::new("127.0.0.1", TEST_USER, password)
            .with_port(self.addr.port())
            .with_private_key_path(private_key_path)
            .with_connect_timeout(5)
    }
}

impl Drop for TestSshServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

struct ScriptedHandler {
    state: Arc<ServerState>,
}

impl ScriptedHandler {
    fn finish(session: &mut Session, channel: ChannelId, exit_status: u32) {
        session.exit_status_request(channel, exit_status);
        session.eof(channel);
        session.close(channel);
    }
}

#[async_trait]
impl server::Handler for ScriptedHandler {
    type Error = russh::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        self.state.counters.password_attempts.fetch_add(1, Ordering::SeqCst);
        if user == TEST_USER && password == self.state.password {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::Reject {
                proceed_with_methods: None,
            })
        }
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        self.state.counters.publickey_attempts.fetch_add(1, Ordering::SeqCst);
        match &self.state.authorized_key {
            Some(key) if user == TEST_USER && public_key.public_key_base64() == *key => {
                Ok(Auth::Accept)
            }
            _ => Ok(Auth::Reject {
                proceed_with_methods: None,
            }),
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).into_owned();
        match command.as_str() {
            "echo hi" => {
                session.data(channel, CryptoVec::from_slice(b"hi\n"));
                Self::finish(session, channel, 0);
            }
            "true" => Self::finish(session, channel, 0),
            "false" => Self::finish(session, channel, 1),
            "mixed" => {
                session.data(channel, CryptoVec::from_slice(b"out\n"));
                session.extended_data(channel, 1, CryptoVec::from_slice(b"err\n"));
                Self::finish(session, channel, 0);
            }
            "fail-with-output" => {
                session.data(channel, CryptoVec::from_slice(b"partial\n"));
                session.extended_data(channel, 1, CryptoVec::from_slice(b"boom\n"));
                Self::finish(session, channel, 2);
            }
            // 被信号终止，没有退出码
            "killed" => {
                session.data(channel, CryptoVec::from_slice(b"partial\n"));
                session.exit_signal_request(channel, Sig::KILL, false, "", "");
                session.eof(channel);
                session.close(channel);
            }
            // 直接关闭通道，没有退出码也没有信号
            "no-status" => {
                session.data(channel, CryptoVec::from_slice(b"half\n"));
                session.eof(channel);
                session.close(channel);
            }
            // 输出一行后不再结束
            "hang" => {
                session.data(channel, CryptoVec::from_slice(b"tick\n"));
            }
            other => {
                let msg = format!("sh: {}: command not found\n", other);
                session.extended_data(channel, 1, CryptoVec::from_slice(msg.as_bytes()));
                Self::finish(session, channel, 127);
            }
        }
        Ok(())
    }
}

// ==================== 私钥目录 ====================

/// 模拟用户 home 目录下的 `.ssh/id_rsa`
pub struct KeyDir {
    dir: tempfile::TempDir,
}

impl KeyDir {
    /// 不存在私钥文件
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::create_dir_all(dir.path().join(".ssh")).unwrap();
        Self { dir }
    }

    /// 写入 fixtures 中的客户端私钥
    pub fn with_client_key() -> Self {
        Self::with_contents(CLIENT_KEY)
    }

    /// 写入任意内容
    pub fn with_contents(contents: &str) -> Self {
        let key_dir = Self::empty();
        std::fs::write(key_dir.key_path(), contents).unwrap();
        key_dir
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.path().join(".ssh").join("id_rsa")
    }
}

// ==================== 日志捕获 ====================

/// 把 tracing 输出收集到内存中
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// 设为当前线程的默认 subscriber，guard 释放前有效
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }

    /// 包含 `needle` 的日志行
    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// 获取一个当前没有服务监听的本地端口
pub async fn unused_local_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

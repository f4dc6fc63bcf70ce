//! host-exec 入口
//! 按环境变量配置连接测试主机，依次执行命令行给出的命令

use e2e_host_env::{config::TestConfig, telemetry, Env, HostEnv};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None => {
            print_help();
            std::process::exit(1);
        }
        Some("--version") => {
            println!("host-exec {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") => {
            print_help();
            return Ok(());
        }
        Some(arg) if arg.starts_with("--") => {
            eprintln!("未知参数: {}", arg);
            print_help();
            std::process::exit(1);
        }
        Some(_) => {}
    }

    // 加载 .env 文件（开发环境）
    if let Ok(path) = std::env::var("E2E_ENV") {
        dotenv::from_filename(format!(".env.{}", path)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    let config = TestConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    telemetry::init_telemetry(&config.logging);

    let env = HostEnv::new(&config.ssh).await;

    let mut failed = None;
    for command in &args {
        match env.exec_on_loong_collector(command).await {
            Ok(output) => print!("{}", output),
            Err(e) => {
                failed = Some(anyhow::anyhow!("command `{}` failed: {}", command, e));
                break;
            }
        }
    }

    env.close().await;

    match failed {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// 打印帮助信息
fn print_help() {
    println!("host-exec {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: host-exec [选项] <命令>...");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  E2E_SSH__IP                    测试主机地址（必填）");
    println!("  E2E_SSH__USERNAME              SSH 用户名，默认 root");
    println!("  E2E_SSH__PASSWORD              SSH 密码");
    println!("  E2E_SSH__PRIVATE_KEY_PATH      私钥路径，默认 ~/.ssh/id_rsa");
    println!("  E2E_LOGGING__LEVEL             日志级别，默认 info");
    println!("  E2E_LOGGING__FORMAT            日志格式: json, pretty, compact");
}

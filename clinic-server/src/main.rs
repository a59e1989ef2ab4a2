//! 门诊预约服务器主程序

mod config;

use clap::Parser;
use clinic_core::Result;
use clinic_database::{DatabasePool, DatabaseQueries};
use clinic_web::{AppState, WebServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::AppConfig;

/// 门诊预约服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "clinic-server")]
#[command(about = "门诊预约挂号系统服务器")]
struct Args {
    /// 服务器端口（覆盖配置文件）
    #[arg(short, long)]
    port: Option<u16>,

    /// 监听地址（覆盖配置文件）
    #[arg(long)]
    host: Option<String>,

    /// 数据库连接串（覆盖配置文件）
    #[arg(short, long)]
    database_url: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// 启动时写入演示数据
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    info!("启动门诊预约服务器...");

    let mut cfg = AppConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        cfg.server.port = port;
    }
    if let Some(host) = args.host {
        cfg.server.host = host;
    }
    if let Some(url) = args.database_url {
        cfg.database.url = url;
    }

    info!("服务器配置:");
    info!("  监听地址: {}:{}", cfg.server.host, cfg.server.port);
    info!("  数据库连接数上限: {}", cfg.database.max_connections);

    // 连接数据库并初始化表结构
    let pool = DatabasePool::connect(&cfg.database.url, cfg.database.max_connections).await?;
    let db = DatabaseQueries::new(pool);
    db.create_tables().await?;

    if args.seed {
        info!("写入演示数据...");
        db.seed_demo().await?;
    }

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| clinic_core::ClinicError::Config(format!("invalid listen address: {}", e)))?;

    let state = Arc::new(AppState::new(db));
    let server = WebServer::new(addr, state);

    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e);
    }

    Ok(())
}

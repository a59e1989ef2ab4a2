//! 服务器配置

use clinic_core::{ClinicError, Result};
use serde::Deserialize;

/// 监听配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// 应用配置
///
/// 优先级：命令行参数 > 环境变量 (CLINIC_*) > 配置文件 > 默认值。
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_connections() -> u32 {
    10
}

impl AppConfig {
    /// 从配置文件与环境变量装载配置
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")
            .map_err(|e| ClinicError::Config(e.to_string()))?
            .set_default("server.port", 5000i64)
            .map_err(|e| ClinicError::Config(e.to_string()))?
            .set_default("database.url", "postgres://localhost/clinic")
            .map_err(|e| ClinicError::Config(e.to_string()))?
            .set_default("database.max_connections", 10i64)
            .map_err(|e| ClinicError::Config(e.to_string()))?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder
            .add_source(config::Environment::with_prefix("CLINIC").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ClinicError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.database.max_connections, 10);
    }
}

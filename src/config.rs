//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use axum::http::HeaderName;
use config::{Config, ConfigError, Environment};
use secrecy::Secret;
use serde::Deserialize;

use crate::models::access::MissingTargetPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
    /// 请求体大小上限（字节）
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// 声明了位置检查但请求中没有可解析的目标时的处理方式
    pub missing_target: MissingTargetPolicy,
    /// 上游网关写入的已认证用户 ID 头
    pub actor_header: String,
    /// 是否把拒绝记录写入审计日志
    pub audit_denials: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub access: AccessConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("server.max_body_bytes", 1024 * 1024)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("access.missing_target", "deny")?
            .set_default("access.actor_header", "x-actor-id")?
            .set_default("access.audit_denials", true)?;

        // 从环境变量加载配置（前缀为 MENTOR_）
        settings = settings.add_source(
            Environment::with_prefix("MENTOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.access.validate()
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Message(message.into())
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let port = self
            .addr
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse::<u16>().ok());
        if matches!(port, Some(p) if p != 0 && p < 1024) {
            return Err(invalid(format!("server.addr {} uses a privileged port", self.addr)));
        }
        if self.max_body_bytes == 0 {
            return Err(invalid("server.max_body_bytes must be > 0"));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 || self.max_connections < self.min_connections {
            return Err(invalid(format!(
                "database pool size {}..{} is not usable",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

impl LoggingConfig {
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];
    const FORMATS: [&'static str; 2] = ["json", "pretty"];

    fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.to_lowercase();
        if !Self::LEVELS.contains(&level.as_str()) {
            return Err(invalid(format!(
                "logging.level {} is not one of {}",
                self.level,
                Self::LEVELS.join("|")
            )));
        }
        let format = self.format.to_lowercase();
        if !Self::FORMATS.contains(&format.as_str()) {
            return Err(invalid(format!(
                "logging.format {} is not one of {}",
                self.format,
                Self::FORMATS.join("|")
            )));
        }
        Ok(())
    }
}

impl AccessConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        HeaderName::from_bytes(self.actor_header.as_bytes())
            .map(|_| ())
            .map_err(|_| invalid(format!("access.actor_header {:?} is not a header name", self.actor_header)))
    }
}

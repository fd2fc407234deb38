//! 日志与追踪系统
//! 初始化结构化日志和指标收集

use crate::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 初始化日志与追踪系统
pub fn init_telemetry(config: &AppConfig) {
    // 从环境变量构建过滤器
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_layer = match config.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.logging.level,
        format = %config.logging.format,
        missing_target = ?config.access.missing_target,
        "Telemetry initialized"
    );
}

/// 记录一次访问决策
pub fn record_decision(outcome: &'static str, reason: &'static str) {
    metrics::counter!("access_decisions_total", "outcome" => outcome, "reason" => reason)
        .increment(1);
}

/// 记录参考数据规模
pub fn record_reference_data(roles: usize, entities: usize) {
    metrics::gauge!("reference_roles").set(roles as f64);
    metrics::gauge!("reference_geographic_entities").set(entities as f64);
}

mod settings;

use kxian_audit::logger::AuditLogger;
use kxian_audit::ring::RingSink;
use kxian_audit::sink::{JsonLinesSink, TracingSink};
use kxian_cache::mem::MemCache;
use kxian_core::audit::port::AuditSink;
use kxian_core::common::time::{RealTimeProvider, TimeProvider};
use kxian_core::config::LoggingConfig;
use kxian_core::market::port::MarketData;
use kxian_core::market::request::DataRequest;
use kxian_feed::zhitu::ZhituProvider;
use kxian_market::orchestrator::{Orchestrator, OrchestratorSettings, PayloadCache};
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const CONFIG_PATH: &str = "config/kxian.toml";

/// # Summary
/// 初始化控制台与按日滚动的文件日志。
///
/// # Returns
/// 文件写入线程的守卫，必须持有到进程退出，drop 时刷盘。
fn init_tracing(config: &LoggingConfig) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(&config.dir, "kxian.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    guard
}

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
/// 负责实例化所有具体实现并以 Arc<dyn Trait> 注入编排器。
///
/// # Logic
/// 1. 分层加载配置并初始化日志。
/// 2. 实例化基础设施层（数据源、缓存、审计输出端）。
/// 3. 构造编排器。
/// 4. 命令行给出代码时执行一次请求并输出 JSON；否则挂起等待退出信号。
/// 5. 关闭审计日志器，确保记录落盘。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 配置与日志
    let config = settings::load_config(CONFIG_PATH)?;
    let _guard = init_tracing(&config.logging);
    info!("kxian starting...");

    // 2. 基础设施层
    let clock: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider);
    let provider = Arc::new(ZhituProvider::from_config(&config.provider, clock.clone())?);
    let cache: Arc<PayloadCache> = Arc::new(MemCache::new(
        config.cache.capacity,
        config.cache.negative_ttl(),
        clock.clone(),
    ));

    let mut sinks: Vec<Arc<dyn AuditSink>> = vec![
        Arc::new(TracingSink),
        Arc::new(RingSink::new(config.audit.ring_capacity)),
    ];
    if let Some(path) = &config.audit.json_path {
        sinks.push(Arc::new(JsonLinesSink::create(path)?));
    }
    let audit = Arc::new(AuditLogger::start(sinks, clock.clone()));

    // 3. 编排器
    let orchestrator = Orchestrator::new(
        provider,
        cache,
        audit.clone(),
        clock,
        OrchestratorSettings::from(&config),
    );

    // 4. 单次请求或常驻
    let symbols: Vec<String> = std::env::args().skip(1).collect();
    if symbols.is_empty() {
        info!("Orchestrator initialized. Waiting for signals...");
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received. Exiting...");
    } else {
        for symbol in symbols {
            match orchestrator.get(DataRequest::daily(symbol.as_str())).await {
                Ok(dataset) => println!("{}", serde_json::to_string_pretty(&dataset)?),
                Err(e) => error!(symbol = %symbol, "Request failed: {}", e),
            }
        }
    }

    // 5. 审计落盘
    audit.shutdown().await;
    Ok(())
}

//! 珠宝电商后端主入口

use jewelry_commerce::{
    config::AppConfig, db, handlers::health, middleware::AppState, policy::RolePolicy, routes,
    telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("jewelry-commerce {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 按优先级加载：.env.local > .env；生产环境直接设置环境变量
    dotenv::from_filename(".env.local").ok();
    dotenv::dotenv().ok();

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志与指标
    telemetry::init_telemetry(&config);
    telemetry::init_metrics();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "jewelry-commerce starting...");

    // 3. 角色规则表（启动时加载一次，之后只读）
    let role_policy = RolePolicy::load(config.roles.policy_path.as_deref())?;
    tracing::info!(
        top_role = role_policy.top_role(),
        source = config.roles.policy_path.as_deref().unwrap_or("built-in"),
        "Role policy loaded"
    );

    // 4. 数据库连接池 + 迁移
    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    // 5. 构建应用状态
    let app_state = Arc::new(AppState::new(config.clone(), db_pool.clone(), role_policy)?);

    // 6. 软删除一致性约束
    let report = db::bootstrap_consistency(&db_pool, &app_state.soft_delete, &config).await?;
    if !report.is_clean() {
        tracing::warn!(
            failures = report.failures.len(),
            "Consistency bootstrap incomplete, continuing without full constraint coverage"
        );
    }

    tracing::info!("Database initialized");

    // 7. 构建路由
    let app = routes::create_router(app_state);

    // 8. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理；超时后强制退出
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

fn print_help() {
    println!("jewelry-commerce {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: jewelry-commerce [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 JEWELRY_ 前缀的环境变量完成，例如:");
    println!("  JEWELRY_DATABASE__URL, JEWELRY_SECURITY__JWT_SECRET,");
    println!("  JEWELRY_CONSISTENCY__STRICT_BOOTSTRAP, JEWELRY_ROLES__POLICY_PATH");
}

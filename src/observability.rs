//! tracing 日志初始化

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化全局日志：默认级别由调用方给定，可通过 RUST_LOG 覆盖
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::from_default_env()
        .add_directive(default_level.parse().unwrap_or_else(|_| {
            "info".parse().expect("static directive")
        }));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

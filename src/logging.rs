//! 日志系统配置
//!
//! 引擎内部只通过 tracing 宏输出，订阅器由宿主应用决定。这里提供
//! 一个控制台输出的快捷初始化，供示例与调试使用

use tracing::info;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 初始化控制台日志
///
/// 环境变量 `RUST_LOG` 优先于传入的默认级别。重复调用为空操作
pub fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_ansi(true);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .is_ok()
    {
        info!("日志系统初始化完成（仅控制台输出）");
    }
}

// Multipart Downloader Rust Library
// 多分段断点续传 HTTP 下载引擎核心库

// 配置管理模块
pub mod config;

// 下载器生命周期模块
pub mod downloader;

// 错误类型模块
pub mod error;

// 事件与扩展钩子模块
pub mod events;

// 分段抓取模块
mod fetcher;

// 日志模块
pub mod logging;

// 分段模型与规划模块
pub mod range;

// 分段调度模块
mod scheduler;

// 共享写入目标模块
pub mod sink;

// 速度计算模块
pub mod speed;

// 导出常用类型
pub use config::{DownloaderConfig, DEFAULT_PART_SIZE, MIN_PART_SIZE};
pub use downloader::{DownloadState, DownloaderBuilder, MultipartDownloader};
pub use error::{DownloadError, Result};
pub use events::DownloaderHooks;
pub use range::{plan_ranges, single_range, total_width, DownloadRange};
pub use sink::{BoxedSink, OpenSinkFn, RandomAccessSink, SinkWriter};
pub use speed::SpeedCalculator;

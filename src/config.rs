//! 下载器配置

use crate::error::DownloadError;
use serde::{Deserialize, Serialize};

/// 分段大小下限（字节）
pub const MIN_PART_SIZE: u64 = 10_000;

/// 默认分段大小: 5MB
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// 下载器配置
///
/// 所有值在构造时固定。写入目标、惰性打开回调、已有分段集与事件
/// 回调不参与序列化，由 `DownloaderBuilder` 单独注入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// 远端资源地址
    pub url: String,
    /// 分段大小（字节），不得小于 [`MIN_PART_SIZE`]
    pub part_size: u64,
    /// 最大并发分段数
    pub max_part_count: usize,
    /// 每个分段的重试预算（总尝试次数 = max_retry_count + 1）
    pub max_retry_count: u32,
    /// 传输缓冲区大小（字节）
    pub write_buffer_size: usize,
    /// 是否允许断点续传（为 false 时无论服务器能力如何都不发 Range）
    pub allow_resuming: bool,
    /// 完成/释放时是否自动关闭写入目标
    pub auto_dispose_sink: bool,
    /// 初始状态提示：为 true 时下载器从 Stopped 状态开始
    #[serde(default)]
    pub is_stopped: bool,
    /// 单次请求超时（秒），不设置则沿用 HTTP 客户端默认行为
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl DownloaderConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.url.is_empty() {
            return Err(DownloadError::InvalidConfig("url 不能为空".to_string()));
        }
        if self.part_size < MIN_PART_SIZE {
            return Err(DownloadError::InvalidConfig(format!(
                "part_size 不得小于 {} 字节，当前值: {}",
                MIN_PART_SIZE, self.part_size
            )));
        }
        if self.max_part_count == 0 {
            return Err(DownloadError::InvalidConfig(
                "max_part_count 不得小于 1".to_string(),
            ));
        }
        if self.write_buffer_size == 0 {
            return Err(DownloadError::InvalidConfig(
                "write_buffer_size 不得为 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            part_size: DEFAULT_PART_SIZE,
            max_part_count: 10,
            max_retry_count: 3,
            write_buffer_size: 256 * 1024,
            allow_resuming: true,
            auto_dispose_sink: true,
            is_stopped: false,
            request_timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DownloaderConfig::new("http://example.com/file.bin");
        assert!(config.validate().is_ok());
        assert!(config.allow_resuming);
        assert!(config.auto_dispose_sink);
        assert!(!config.is_stopped);
    }

    #[test]
    fn test_part_size_lower_bound() {
        let mut config = DownloaderConfig::new("http://example.com/file.bin");
        config.part_size = 9_999;
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_type(), "invalid_config");

        config.part_size = MIN_PART_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut config = DownloaderConfig::new("http://example.com/file.bin");
        config.max_part_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_url() {
        let config = DownloaderConfig::default();
        assert!(config.validate().is_err());
    }
}

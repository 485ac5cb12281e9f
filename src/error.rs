//! 下载错误类型定义
//!
//! 引擎对外只暴露一种错误枚举，内部的网络/IO 错误在模块边界处
//! 转换为带描述信息的 `TransferFailed`

/// 引擎内部统一的 Result 别名
pub type Result<T, E = DownloadError> = std::result::Result<T, E>;

/// 下载错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// 配置无效（构造时校验失败）
    InvalidConfig(String),
    /// 无法获取资源头信息（HEAD 失败或缺少 Content-Length）
    HeaderUnavailable(String),
    /// 没有可用的写入目标
    SinkUnavailable,
    /// 服务器不支持 Range 请求，无法续传已有进度的分段
    ResumeUnsupportedMidStream,
    /// 传输失败（网络错误、HTTP 状态异常、响应体不完整等）
    TransferFailed(String),
    /// 下载已被取消
    Cancelled,
}

impl DownloadError {
    /// 是否为协作取消（取消不计入失败）
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }

    /// 获取错误类别名称
    pub fn error_type(&self) -> &'static str {
        match self {
            DownloadError::InvalidConfig(_) => "invalid_config",
            DownloadError::HeaderUnavailable(_) => "header_unavailable",
            DownloadError::SinkUnavailable => "sink_unavailable",
            DownloadError::ResumeUnsupportedMidStream => "resume_unsupported",
            DownloadError::TransferFailed(_) => "transfer_failed",
            DownloadError::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DownloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadError::InvalidConfig(msg) => write!(f, "配置无效: {}", msg),
            DownloadError::HeaderUnavailable(msg) => write!(f, "无法获取资源头信息: {}", msg),
            DownloadError::SinkUnavailable => write!(f, "没有可用的写入目标"),
            DownloadError::ResumeUnsupportedMidStream => {
                write!(f, "服务器不支持 Range 请求，无法续传已有进度的分段")
            }
            DownloadError::TransferFailed(msg) => write!(f, "传输失败: {}", msg),
            DownloadError::Cancelled => write!(f, "下载已取消"),
        }
    }
}

impl std::error::Error for DownloadError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_cancelled() {
        assert!(DownloadError::Cancelled.is_cancelled());
        assert!(!DownloadError::SinkUnavailable.is_cancelled());
        assert!(!DownloadError::TransferFailed("x".to_string()).is_cancelled());
    }

    #[test]
    fn test_error_type_names() {
        assert_eq!(
            DownloadError::InvalidConfig("p".into()).error_type(),
            "invalid_config"
        );
        assert_eq!(DownloadError::Cancelled.error_type(), "cancelled");
        assert_eq!(
            DownloadError::ResumeUnsupportedMidStream.error_type(),
            "resume_unsupported"
        );
    }

    #[test]
    fn test_display_contains_cause() {
        let err = DownloadError::TransferFailed("HTTP 状态异常: 500".to_string());
        let text = err.to_string();
        assert!(text.contains("传输失败"));
        assert!(text.contains("500"));
    }
}

//! 单个分段的抓取执行
//!
//! 每个分段一次 GET（失败时按重试预算重发），响应体流式写入共享
//! 写入目标。每次尝试都重新读取分段进度，已落盘的字节不会重复拉取

use crate::error::{DownloadError, Result};
use crate::events::DownloaderHooks;
use crate::range::DownloadRange;
use crate::sink::SinkWriter;
use crate::speed::SpeedCalculator;
use futures::TryStreamExt;
use reqwest::{header, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 重试间隔
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// 分段抓取任务
pub(crate) struct RangeFetcher {
    pub client: Client,
    pub url: String,
    pub range: Arc<DownloadRange>,
    pub writer: Arc<SinkWriter>,
    pub speed: Arc<SpeedCalculator>,
    pub hooks: Arc<DownloaderHooks>,
    pub resuming_supported: bool,
    pub max_retry_count: u32,
    pub write_buffer_size: usize,
    pub request_timeout: Option<Duration>,
    pub token: CancellationToken,
}

impl RangeFetcher {
    /// 执行下载，带重试
    ///
    /// 取消立即中止；`ResumeUnsupportedMidStream` 是确定性失败，不重试
    pub async fn run(&self) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            if self.token.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            match self.fetch_once().await {
                Ok(()) => return Ok(()),
                Err(DownloadError::Cancelled) => return Err(DownloadError::Cancelled),
                Err(err @ DownloadError::ResumeUnsupportedMidStream) => return Err(err),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.max_retry_count {
                        warn!(
                            "分段 [{}-{}] 下载失败，重试 {} 次后放弃: {}",
                            self.range.from, self.range.to, self.max_retry_count, err
                        );
                        return Err(err);
                    }
                    warn!(
                        "分段 [{}-{}] 下载失败，准备重试 ({}/{}): {}",
                        self.range.from, self.range.to, attempt, self.max_retry_count, err
                    );
                    tokio::select! {
                        _ = self.token.cancelled() => return Err(DownloadError::Cancelled),
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }
    }

    /// 单次尝试
    async fn fetch_once(&self) -> Result<()> {
        let width = self.range.width();
        let current = self.range.current_offset();

        // 进度已满的分段只需补上完成标记
        if current >= width {
            self.writer.complete_range(&self.range, &self.hooks).await;
            return Ok(());
        }

        let mut request = self.client.get(&self.url);
        if self.resuming_supported {
            request = request.header(
                header::RANGE,
                format!("bytes={}-{}", self.range.from + current, self.range.to),
            );
        } else if self.range.from != 0 || current != 0 {
            // 非 Range 服务器只能从头整体下载，带进度的分段说明续传集已过期
            return Err(DownloadError::ResumeUnsupportedMidStream);
        }
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        debug!(
            "分段 [{}-{}] 发起请求，已有进度 {} 字节",
            self.range.from, self.range.to, current
        );

        let response = tokio::select! {
            _ = self.token.cancelled() => return Err(DownloadError::Cancelled),
            result = request.send() => result
                .map_err(|e| DownloadError::TransferFailed(format!("发送请求失败: {}", e)))?,
        };

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::TransferFailed(format!(
                "HTTP 状态异常: {}",
                status
            )));
        }

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let mut reader = StreamReader::new(stream);
        let mut buf = vec![0u8; self.write_buffer_size];
        let mut received = current;

        loop {
            let n = tokio::select! {
                _ = self.token.cancelled() => return Err(DownloadError::Cancelled),
                result = reader.read(&mut buf) => result
                    .map_err(|e| DownloadError::TransferFailed(format!("读取响应体失败: {}", e)))?,
            };
            if n == 0 {
                break;
            }
            if received + n as u64 > width {
                return Err(DownloadError::TransferFailed(format!(
                    "响应体超出分段范围: 已收到 {} 字节，分段宽度 {} 字节",
                    received + n as u64,
                    width
                )));
            }
            self.writer
                .write_at(&self.range, self.range.from + received, &buf[..n], &self.hooks)
                .await?;
            self.speed.add_sample(n as u64);
            received += n as u64;
        }

        // 流干净结束但字节数不足，说明响应体被截断
        if received < width {
            return Err(DownloadError::TransferFailed(format!(
                "响应体提前结束: 已收到 {}/{} 字节",
                received, width
            )));
        }

        self.writer.complete_range(&self.range, &self.hooks).await;
        Ok(())
    }
}

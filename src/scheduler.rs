//! 分段并发调度
//!
//! 立即 spawn 所有分段任务，每个任务在内部等待信号量许可，最多
//! `max_part_count` 个分段同时传输。首个耗尽重试预算的失败被记录为
//! 根错误并触发取消信号，其余任务随即放弃读取；后续失败不覆盖根错误

use crate::error::{DownloadError, Result};
use crate::fetcher::RangeFetcher;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 分段调度器
pub(crate) struct RangeScheduler {
    max_part_count: usize,
    token: CancellationToken,
}

impl RangeScheduler {
    pub fn new(max_part_count: usize, token: CancellationToken) -> Self {
        Self {
            max_part_count,
            token,
        }
    }

    /// 运行全部分段任务，直到所有任务结束
    ///
    /// 返回根错误；若无根错误但取消信号已触发（用户停止），返回
    /// `Cancelled`；否则成功
    pub async fn run(&self, fetchers: Vec<RangeFetcher>) -> Result<()> {
        if fetchers.is_empty() {
            return Ok(());
        }

        info!(
            "开始并发下载 {} 个分段（并发上限 {}）",
            fetchers.len(),
            self.max_part_count
        );

        let semaphore = Arc::new(Semaphore::new(self.max_part_count));
        let root_error: Arc<Mutex<Option<DownloadError>>> = Arc::new(Mutex::new(None));
        let mut handles = Vec::with_capacity(fetchers.len());

        for fetcher in fetchers {
            let semaphore = semaphore.clone();
            let root_error = root_error.clone();
            let token = self.token.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                if token.is_cancelled() {
                    return;
                }

                let (from, to) = (fetcher.range.from, fetcher.range.to);
                if let Err(err) = fetcher.run().await {
                    if err.is_cancelled() {
                        debug!("分段 [{}-{}] 因取消而中止", from, to);
                        return;
                    }
                    let mut slot = root_error.lock();
                    if slot.is_none() {
                        error!("分段 [{}-{}] 失败，取消其余分段: {}", from, to, err);
                        *slot = Some(err);
                        token.cancel();
                    } else {
                        debug!("分段 [{}-{}] 的后续失败已被忽略: {}", from, to, err);
                    }
                }
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                let mut slot = root_error.lock();
                if slot.is_none() {
                    *slot = Some(DownloadError::TransferFailed(format!(
                        "分段任务异常终止: {}",
                        err
                    )));
                    self.token.cancel();
                }
            }
        }

        if let Some(err) = root_error.lock().take() {
            return Err(err);
        }
        if self.token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        Ok(())
    }
}

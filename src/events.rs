//! 事件与扩展钩子
//!
//! 三种可观测信号（状态变更、数据写入、分段完成）加一个完成前钩子。
//! 回调以即发即弃方式调用，观察者不得阻塞

use crate::downloader::DownloadState;
use crate::range::DownloadRange;

/// 状态变更回调
pub type StateChangedFn = Box<dyn Fn(DownloadState) + Send + Sync>;
/// 数据写入回调，参数为本次提交的字节数
pub type DataReceivedFn = Box<dyn Fn(u64) + Send + Sync>;
/// 分段完成回调（每个分段成功完成时恰好触发一次）
pub type RangeDownloadedFn = Box<dyn Fn(&DownloadRange) + Send + Sync>;
/// 全部分段完成后、进入 Finished 前的钩子
pub type BeforeFinishFn = Box<dyn Fn() + Send + Sync>;

/// 下载器事件回调集合
#[derive(Default)]
pub struct DownloaderHooks {
    pub on_state_changed: Option<StateChangedFn>,
    pub on_data_received: Option<DataReceivedFn>,
    pub on_range_downloaded: Option<RangeDownloadedFn>,
    pub on_before_finish: Option<BeforeFinishFn>,
}

impl DownloaderHooks {
    pub(crate) fn emit_state_changed(&self, state: DownloadState) {
        if let Some(cb) = self.on_state_changed.as_ref() {
            cb(state);
        }
    }

    pub(crate) fn emit_data_received(&self, bytes: u64) {
        if let Some(cb) = self.on_data_received.as_ref() {
            cb(bytes);
        }
    }

    pub(crate) fn emit_range_downloaded(&self, range: &DownloadRange) {
        if let Some(cb) = self.on_range_downloaded.as_ref() {
            cb(range);
        }
    }

    pub(crate) fn emit_before_finish(&self) {
        if let Some(cb) = self.on_before_finish.as_ref() {
            cb();
        }
    }
}

impl std::fmt::Debug for DownloaderHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloaderHooks")
            .field("on_state_changed", &self.on_state_changed.is_some())
            .field("on_data_received", &self.on_data_received.is_some())
            .field("on_range_downloaded", &self.on_range_downloaded.is_some())
            .field("on_before_finish", &self.on_before_finish.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_emit_without_callbacks_is_noop() {
        let hooks = DownloaderHooks::default();
        hooks.emit_state_changed(DownloadState::Downloading);
        hooks.emit_data_received(1024);
        hooks.emit_before_finish();
    }

    #[test]
    fn test_data_received_callback() {
        let total = Arc::new(AtomicU64::new(0));
        let total_clone = total.clone();
        let hooks = DownloaderHooks {
            on_data_received: Some(Box::new(move |n| {
                total_clone.fetch_add(n, Ordering::SeqCst);
            })),
            ..Default::default()
        };
        hooks.emit_data_received(100);
        hooks.emit_data_received(200);
        assert_eq!(total.load(Ordering::SeqCst), 300);
    }
}

//! 共享写入目标
//!
//! 多个分段工作任务的定位写入经由同一把互斥锁串行化。进度计数的
//! 更新与物理写入在同一临界区内完成，持久化的 `current_offset`
//! 不会超过实际落盘的字节数，崩溃后按它续传总是安全的

use crate::error::{DownloadError, Result};
use crate::events::DownloaderHooks;
use crate::range::DownloadRange;
use futures::future::BoxFuture;
use std::io::SeekFrom;
use tokio::io::{AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

/// 随机访问写入目标
///
/// `tokio::fs::File` 与 `std::io::Cursor<Vec<u8>>` 均满足该约束
pub trait RandomAccessSink: AsyncWrite + AsyncSeek + Send + Unpin {}

impl<T: AsyncWrite + AsyncSeek + Send + Unpin> RandomAccessSink for T {}

/// 装箱的写入目标
pub type BoxedSink = Box<dyn RandomAccessSink>;

/// 惰性打开写入目标的回调
pub type OpenSinkFn = Box<dyn Fn() -> BoxFuture<'static, Result<BoxedSink>> + Send + Sync>;

struct SinkSlot {
    sink: Option<BoxedSink>,
    opener: Option<OpenSinkFn>,
}

/// 共享写入器
///
/// 包装可选的写入目标与惰性打开回调，所有访问都经过内部互斥锁
pub struct SinkWriter {
    slot: Mutex<SinkSlot>,
    auto_dispose: bool,
}

impl SinkWriter {
    pub fn new(sink: Option<BoxedSink>, opener: Option<OpenSinkFn>, auto_dispose: bool) -> Self {
        Self {
            slot: Mutex::new(SinkSlot { sink, opener }),
            auto_dispose,
        }
    }

    /// 定位写入
    ///
    /// 在同一临界区内完成：seek 到 `offset`、写入全部数据、按写入后的
    /// 流位置更新分段进度、触发数据写入事件
    pub(crate) async fn write_at(
        &self,
        range: &DownloadRange,
        offset: u64,
        buf: &[u8],
        hooks: &DownloaderHooks,
    ) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let sink = Self::ensure_sink(&mut slot).await?;

        sink.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| DownloadError::TransferFailed(format!("写入目标定位失败: {}", e)))?;
        sink.write_all(buf)
            .await
            .map_err(|e| DownloadError::TransferFailed(format!("写入数据失败: {}", e)))?;
        let position = sink
            .stream_position()
            .await
            .map_err(|e| DownloadError::TransferFailed(format!("读取流位置失败: {}", e)))?;

        range.record_progress(position - range.from);
        hooks.emit_data_received(buf.len() as u64);
        Ok(())
    }

    /// 在写入锁保护下标记分段完成，并触发分段完成事件（恰好一次）
    pub(crate) async fn complete_range(&self, range: &DownloadRange, hooks: &DownloaderHooks) {
        let _slot = self.slot.lock().await;
        if range.mark_done_once() {
            debug!("分段 [{}-{}] 下载完成", range.from, range.to);
            hooks.emit_range_downloaded(range);
        }
    }

    /// 刷新写入目标（目标不存在时为空操作）
    pub async fn flush(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if let Some(sink) = slot.sink.as_mut() {
            sink.flush()
                .await
                .map_err(|e| DownloadError::TransferFailed(format!("刷新写入目标失败: {}", e)))?;
        }
        Ok(())
    }

    /// 收尾：刷新，并在配置要求时关闭并释放写入目标
    ///
    /// 幂等，释放后再次调用为空操作
    pub async fn finalize(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if let Some(sink) = slot.sink.as_mut() {
            sink.flush()
                .await
                .map_err(|e| DownloadError::TransferFailed(format!("刷新写入目标失败: {}", e)))?;
            if self.auto_dispose {
                let _ = sink.shutdown().await;
                slot.sink = None;
                debug!("写入目标已释放");
            }
        }
        Ok(())
    }

    async fn ensure_sink(slot: &mut SinkSlot) -> Result<&mut BoxedSink> {
        if slot.sink.is_none() {
            if let Some(opener) = slot.opener.as_ref() {
                debug!("惰性打开写入目标");
                slot.sink = Some(opener().await?);
            }
        }
        slot.sink.as_mut().ok_or(DownloadError::SinkUnavailable)
    }
}

impl std::fmt::Debug for SinkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkWriter")
            .field("auto_dispose", &self.auto_dispose)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_write_at_updates_range_progress() {
        let sink: BoxedSink = Box::new(Cursor::new(Vec::new()));
        let writer = SinkWriter::new(Some(sink), None, false);
        let range = DownloadRange::new(100, 199);
        let hooks = DownloaderHooks::default();

        writer.write_at(&range, 100, &[7u8; 30], &hooks).await.unwrap();
        assert_eq!(range.current_offset(), 30);

        writer.write_at(&range, 130, &[8u8; 20], &hooks).await.unwrap();
        assert_eq!(range.current_offset(), 50);
    }

    #[tokio::test]
    async fn test_missing_sink_fails() {
        let writer = SinkWriter::new(None, None, false);
        let range = DownloadRange::new(0, 9);
        let hooks = DownloaderHooks::default();
        let err = writer.write_at(&range, 0, &[0u8; 10], &hooks).await.unwrap_err();
        assert_eq!(err, DownloadError::SinkUnavailable);
    }

    #[tokio::test]
    async fn test_lazy_open_sink() {
        use futures::FutureExt;
        let opener: OpenSinkFn = Box::new(|| {
            async { Ok(Box::new(Cursor::new(Vec::new())) as BoxedSink) }.boxed()
        });
        let writer = SinkWriter::new(None, Some(opener), false);
        let range = DownloadRange::new(0, 9);
        let hooks = DownloaderHooks::default();
        writer.write_at(&range, 0, &[1u8; 10], &hooks).await.unwrap();
        assert_eq!(range.current_offset(), 10);
    }

    #[tokio::test]
    async fn test_finalize_is_idempotent() {
        let sink: BoxedSink = Box::new(Cursor::new(Vec::new()));
        let writer = SinkWriter::new(Some(sink), None, true);
        writer.finalize().await.unwrap();
        // 释放后刷新与收尾都是空操作
        writer.finalize().await.unwrap();
        writer.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_range_fires_once() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let sink: BoxedSink = Box::new(Cursor::new(Vec::new()));
        let writer = SinkWriter::new(Some(sink), None, false);
        let range = DownloadRange::new(0, 9);
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();
        let hooks = DownloaderHooks {
            on_range_downloaded: Some(Box::new(move |_| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            })),
            ..Default::default()
        };

        writer.complete_range(&range, &hooks).await;
        writer.complete_range(&range, &hooks).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

//! 分段模型与分段规划
//!
//! 一个分段是远端资源上的连续闭区间 `[from, to]`，`current_offset`
//! 记录已提交到写入目标的字节数。进度字段使用原子类型，读取进度
//! 无需加锁；写入只发生在持有 SinkWriter 互斥锁的工作线程中

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 下载分段
///
/// `from` / `to` 为资源内的绝对字节偏移（闭区间）。序列化格式与
/// 下载列表管理器持久化的 JSON 状态一致，用于断点续传
#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadRange {
    /// 起始偏移（包含）
    pub from: u64,
    /// 结束偏移（包含）
    pub to: u64,
    /// 已提交到写入目标的字节数（相对 `from`）
    current_offset: AtomicU64,
    /// 是否已完成
    is_done: AtomicBool,
}

impl DownloadRange {
    pub fn new(from: u64, to: u64) -> Self {
        debug_assert!(to >= from);
        Self {
            from,
            to,
            current_offset: AtomicU64::new(0),
            is_done: AtomicBool::new(false),
        }
    }

    /// 分段宽度（字节数）
    pub fn width(&self) -> u64 {
        self.to - self.from + 1
    }

    /// 已提交的字节数
    pub fn current_offset(&self) -> u64 {
        self.current_offset.load(Ordering::SeqCst)
    }

    /// 剩余未提交的字节数
    pub fn remaining(&self) -> u64 {
        self.width().saturating_sub(self.current_offset())
    }

    /// 是否已完成
    pub fn is_done(&self) -> bool {
        self.is_done.load(Ordering::SeqCst)
    }

    /// 更新进度（仅在持有写入锁时调用）
    pub(crate) fn record_progress(&self, offset: u64) {
        debug_assert!(offset <= self.width());
        self.current_offset.store(offset, Ordering::SeqCst);
    }

    /// 标记完成，返回是否为首次标记（保证完成事件只发一次）
    pub(crate) fn mark_done_once(&self) -> bool {
        !self.is_done.swap(true, Ordering::SeqCst)
    }
}

impl Clone for DownloadRange {
    fn clone(&self) -> Self {
        Self {
            from: self.from,
            to: self.to,
            current_offset: AtomicU64::new(self.current_offset()),
            is_done: AtomicBool::new(self.is_done()),
        }
    }
}

impl PartialEq for DownloadRange {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from
            && self.to == other.to
            && self.current_offset() == other.current_offset()
            && self.is_done() == other.is_done()
    }
}

/// 规划分段
///
/// 覆盖 `[0, total_size)`，每段宽度不超过 `part_size`，最后一段可能
/// 更短。`total_size == 0` 时返回空列表（下载立即完成）
pub fn plan_ranges(total_size: u64, part_size: u64) -> Vec<DownloadRange> {
    let mut ranges = Vec::new();
    let mut from = 0u64;
    while from < total_size {
        let to = (from + part_size).min(total_size) - 1;
        ranges.push(DownloadRange::new(from, to));
        from = to + 1;
    }
    ranges
}

/// 单分段规划（服务器不支持 Range 或禁用续传时使用）
pub fn single_range(total_size: u64) -> Vec<DownloadRange> {
    if total_size == 0 {
        Vec::new()
    } else {
        vec![DownloadRange::new(0, total_size - 1)]
    }
}

/// 分段宽度总和（用于校验已有分段集是否与资源大小一致）
pub fn total_width(ranges: &[DownloadRange]) -> u64 {
    ranges.iter().map(|r| r.width()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_creation() {
        let range = DownloadRange::new(0, 1023);
        assert_eq!(range.from, 0);
        assert_eq!(range.to, 1023);
        assert_eq!(range.width(), 1024);
        assert_eq!(range.current_offset(), 0);
        assert!(!range.is_done());
    }

    #[test]
    fn test_plan_ranges_boundaries() {
        // 100000 字节按 40000 切分，末段更短
        let ranges = plan_ranges(100_000, 40_000);
        assert_eq!(ranges.len(), 3);
        assert_eq!((ranges[0].from, ranges[0].to), (0, 39_999));
        assert_eq!((ranges[1].from, ranges[1].to), (40_000, 79_999));
        assert_eq!((ranges[2].from, ranges[2].to), (80_000, 99_999));

        // 整除时每段等宽
        let ranges = plan_ranges(100, 10);
        assert_eq!(ranges.len(), 10);
        assert_eq!((ranges[9].from, ranges[9].to), (90, 99));
    }

    #[test]
    fn test_plan_ranges_coverage() {
        let ranges = plan_ranges(123_457, 10_000);
        // 宽度总和等于资源大小
        assert_eq!(total_width(&ranges), 123_457);
        // 分段连续、无重叠、严格有序
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].from, pair[0].to + 1);
        }
    }

    #[test]
    fn test_plan_ranges_empty_resource() {
        assert!(plan_ranges(0, 10_000).is_empty());
        assert!(single_range(0).is_empty());
    }

    #[test]
    fn test_single_range() {
        let ranges = single_range(5000);
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].from, ranges[0].to), (0, 4999));
    }

    #[test]
    fn test_progress_and_done() {
        let range = DownloadRange::new(100, 199);
        range.record_progress(40);
        assert_eq!(range.current_offset(), 40);
        assert_eq!(range.remaining(), 60);

        range.record_progress(100);
        assert!(range.mark_done_once());
        // 第二次标记返回 false
        assert!(!range.mark_done_once());
        assert!(range.is_done());
    }

    #[test]
    fn test_resume_set_deserialization() {
        // 与下载列表管理器持久化的状态格式一致
        let json = r#"[
            {"from":0,"to":39999,"current_offset":40000,"is_done":true},
            {"from":40000,"to":79999,"current_offset":120,"is_done":false}
        ]"#;
        let ranges: Vec<DownloadRange> = serde_json::from_str(json).unwrap();
        assert_eq!(ranges.len(), 2);
        assert!(ranges[0].is_done());
        assert_eq!(ranges[1].current_offset(), 120);
        assert_eq!(total_width(&ranges), 80_000);
    }

    #[test]
    fn test_clone_snapshots_progress() {
        let range = DownloadRange::new(0, 99);
        range.record_progress(50);
        let copy = range.clone();
        assert_eq!(copy.current_offset(), 50);
        range.record_progress(60);
        assert_eq!(copy.current_offset(), 50);
    }
}

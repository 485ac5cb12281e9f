//! 下载速度计算
//!
//! 维护最近 5 秒的 (时间戳, 字节数) 采样队列，速度按固定窗口平均：
//! 窗口内字节总和除以窗口长度，而不是除以实际经过时间

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 默认采样窗口长度
const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// 速度计算器
///
/// 采样队列带内部互斥锁，多个分段工作任务通过 `Arc` 共享同一实例
#[derive(Debug)]
pub struct SpeedCalculator {
    samples: Mutex<VecDeque<(Instant, u64)>>,
    window: Duration,
}

impl SpeedCalculator {
    /// 使用默认 5 秒窗口创建
    pub fn with_default_window() -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            window: DEFAULT_WINDOW,
        }
    }

    /// 记录一次采样，并从队头淘汰窗口外的旧采样
    pub fn add_sample(&self, bytes: u64) {
        let now = Instant::now();
        let mut samples = self.samples.lock();
        samples.push_back((now, bytes));
        while let Some((ts, _)) = samples.front() {
            if now.duration_since(*ts) > self.window {
                samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// 当前速度（字节/秒）
    ///
    /// 窗口内字节总和 / 窗口秒数
    pub fn speed(&self) -> u64 {
        let now = Instant::now();
        let samples = self.samples.lock();
        let sum: u64 = samples
            .iter()
            .filter(|(ts, _)| now.duration_since(*ts) <= self.window)
            .map(|(_, bytes)| bytes)
            .sum();
        sum / self.window.as_secs().max(1)
    }

    /// 清空采样（任务重新开始时调用）
    pub fn reset(&self) {
        self.samples.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_speed_is_zero() {
        let calc = SpeedCalculator::with_default_window();
        assert_eq!(calc.speed(), 0);
    }

    #[test]
    fn test_speed_is_window_average() {
        let calc = SpeedCalculator::with_default_window();
        calc.add_sample(1000);
        calc.add_sample(2000);
        calc.add_sample(2000);
        // 刚写入的采样都在窗口内: 5000 / 5 = 1000
        assert_eq!(calc.speed(), 1000);
    }

    #[test]
    fn test_reset_clears_samples() {
        let calc = SpeedCalculator::with_default_window();
        calc.add_sample(5000);
        assert!(calc.speed() > 0);
        calc.reset();
        assert_eq!(calc.speed(), 0);
    }
}

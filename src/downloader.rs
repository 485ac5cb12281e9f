//! 下载器生命周期控制
//!
//! 状态机协调初始化、并行传输、取消、续传与终态。所有状态读写、
//! 生命周期任务句柄与取消令牌都经过同一把生命周期互斥锁；事件
//! 回调在锁外触发。Init/Start 以共享任务句柄暴露，Stop 可以同时
//! 等待两者收尾；重复 Init 加入在途任务并返回其结果，重复 Start
//! 则直接返回、不等待在途任务

use crate::config::DownloaderConfig;
use crate::error::{DownloadError, Result};
use crate::events::{
    BeforeFinishFn, DataReceivedFn, DownloaderHooks, RangeDownloadedFn, StateChangedFn,
};
use crate::fetcher::RangeFetcher;
use crate::range::{self, DownloadRange};
use crate::scheduler::RangeScheduler;
use crate::sink::{BoxedSink, OpenSinkFn, RandomAccessSink, SinkWriter};
use crate::speed::SpeedCalculator;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 下载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// 尚未初始化
    None,
    /// 初始化中
    Initializing,
    /// 初始化完成
    Initialized,
    /// 下载中
    Downloading,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 已完成
    Finished,
    /// 失败
    Error,
}

impl DownloadState {
    /// 是否为空闲状态（没有在途任务，可被重新驱动）
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            DownloadState::None
                | DownloadState::Initialized
                | DownloadState::Stopped
                | DownloadState::Error
                | DownloadState::Finished
        )
    }
}

impl std::fmt::Display for DownloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DownloadState::None => "none",
            DownloadState::Initializing => "initializing",
            DownloadState::Initialized => "initialized",
            DownloadState::Downloading => "downloading",
            DownloadState::Stopping => "stopping",
            DownloadState::Stopped => "stopped",
            DownloadState::Finished => "finished",
            DownloadState::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// 可多处等待的生命周期任务句柄
type SharedOp = Shared<BoxFuture<'static, Result<()>>>;

/// 生命周期互斥区
struct Lifecycle {
    state: DownloadState,
    init_op: Option<SharedOp>,
    start_op: Option<SharedOp>,
    token: CancellationToken,
    last_error: Option<DownloadError>,
}

struct Inner {
    config: DownloaderConfig,
    client: Client,
    writer: Arc<SinkWriter>,
    speed: Arc<SpeedCalculator>,
    hooks: Arc<DownloaderHooks>,
    lifecycle: Mutex<Lifecycle>,
    state_notify: Notify,
    ranges: RwLock<Arc<Vec<Arc<DownloadRange>>>>,
    resume_ranges: Mutex<Option<Vec<DownloadRange>>>,
    total_size: AtomicU64,
    resuming_supported: AtomicBool,
}

/// 多分段断点续传下载器
///
/// 克隆共享同一内部状态，可跨任务持有
#[derive(Clone)]
pub struct MultipartDownloader {
    inner: Arc<Inner>,
}

/// 下载器构造器
///
/// 注入写入目标、惰性打开回调、已有分段集与事件回调
pub struct DownloaderBuilder {
    config: DownloaderConfig,
    sink: Option<BoxedSink>,
    opener: Option<OpenSinkFn>,
    resume_ranges: Option<Vec<DownloadRange>>,
    hooks: DownloaderHooks,
}

impl DownloaderBuilder {
    pub fn new(config: DownloaderConfig) -> Self {
        Self {
            config,
            sink: None,
            opener: None,
            resume_ranges: None,
            hooks: DownloaderHooks::default(),
        }
    }

    /// 指定写入目标
    pub fn sink<S: RandomAccessSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// 指定惰性打开写入目标的回调
    pub fn open_sink<F, Fut>(mut self, opener: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BoxedSink>> + Send + 'static,
    {
        self.opener = Some(Box::new(move || opener().boxed()));
        self
    }

    /// 注入已有分段集用于断点续传
    ///
    /// 初始化时若分段宽度总和与实际资源大小不符，该集合会被丢弃重建
    pub fn resume_ranges(mut self, ranges: Vec<DownloadRange>) -> Self {
        self.resume_ranges = Some(ranges);
        self
    }

    pub fn on_state_changed(mut self, cb: impl Fn(DownloadState) + Send + Sync + 'static) -> Self {
        self.hooks.on_state_changed = Some(Box::new(cb) as StateChangedFn);
        self
    }

    pub fn on_data_received(mut self, cb: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.hooks.on_data_received = Some(Box::new(cb) as DataReceivedFn);
        self
    }

    pub fn on_range_downloaded(
        mut self,
        cb: impl Fn(&DownloadRange) + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_range_downloaded = Some(Box::new(cb) as RangeDownloadedFn);
        self
    }

    pub fn on_before_finish(mut self, cb: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_before_finish = Some(Box::new(cb) as BeforeFinishFn);
        self
    }

    pub fn build(self) -> Result<MultipartDownloader> {
        self.config.validate()?;

        let client = Client::builder()
            .user_agent(concat!("multipart-downloader/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DownloadError::InvalidConfig(format!("构建 HTTP 客户端失败: {}", e)))?;

        let initial_state = if self.config.is_stopped {
            DownloadState::Stopped
        } else {
            DownloadState::None
        };

        let writer = Arc::new(SinkWriter::new(
            self.sink,
            self.opener,
            self.config.auto_dispose_sink,
        ));

        Ok(MultipartDownloader {
            inner: Arc::new(Inner {
                config: self.config,
                client,
                writer,
                speed: Arc::new(SpeedCalculator::with_default_window()),
                hooks: Arc::new(self.hooks),
                lifecycle: Mutex::new(Lifecycle {
                    state: initial_state,
                    init_op: None,
                    start_op: None,
                    token: CancellationToken::new(),
                    last_error: None,
                }),
                state_notify: Notify::new(),
                ranges: RwLock::new(Arc::new(Vec::new())),
                resume_ranges: Mutex::new(self.resume_ranges),
                total_size: AtomicU64::new(0),
                resuming_supported: AtomicBool::new(false),
            }),
        })
    }
}

impl MultipartDownloader {
    pub fn builder(config: DownloaderConfig) -> DownloaderBuilder {
        DownloaderBuilder::new(config)
    }

    /// 初始化：HEAD 探测资源大小与 Range 能力，规划或校验分段
    ///
    /// 重复调用会加入在途的初始化任务；初始化失败进入 `Error` 状态
    /// 并向调用方重新抛出错误
    pub async fn init(&self) -> Result<()> {
        Inner::init(&self.inner).await
    }

    /// 启动下载：驱动未完成分段并发传输，直到 Finished / Stopped / Error
    pub async fn start(&self) -> Result<()> {
        Inner::start(&self.inner).await
    }

    /// 停止：触发取消信号，等待在途的初始化与传输任务收尾
    pub async fn stop(&self) {
        Inner::stop(&self.inner).await;
    }

    /// 刷新写入目标
    pub async fn flush(&self) -> Result<()> {
        self.inner.writer.flush().await
    }

    /// 释放：取消在途任务，按配置关闭写入目标
    pub async fn dispose(&self) {
        Inner::dispose(&self.inner).await;
    }

    /// 当前状态
    pub fn state(&self) -> DownloadState {
        self.inner.lifecycle.lock().state
    }

    /// 资源总大小（初始化前为 0）
    pub fn total_size(&self) -> u64 {
        self.inner.total_size.load(Ordering::SeqCst)
    }

    /// 已提交到写入目标的总字节数
    pub fn current_size(&self) -> u64 {
        let ranges = self.inner.ranges.read().clone();
        ranges.iter().map(|r| r.current_offset()).sum()
    }

    /// 当前速度（字节/秒）
    pub fn bytes_per_second(&self) -> u64 {
        self.inner.speed.speed()
    }

    /// 分段进度快照
    pub fn downloaded_ranges(&self) -> Vec<DownloadRange> {
        let ranges = self.inner.ranges.read().clone();
        ranges.iter().map(|r| r.as_ref().clone()).collect()
    }

    /// 最近一次失败（取消不计入）
    pub fn last_error(&self) -> Option<DownloadError> {
        self.inner.lifecycle.lock().last_error.clone()
    }

    /// 服务器是否支持且允许断点续传
    pub fn is_resuming_supported(&self) -> bool {
        self.inner.resuming_supported.load(Ordering::SeqCst)
    }

    /// 下载进度百分比
    pub fn progress(&self) -> f64 {
        let total = self.total_size();
        if total == 0 {
            return 0.0;
        }
        (self.current_size() as f64 / total as f64) * 100.0
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.lifecycle.lock().token.cancel();
    }
}

impl std::fmt::Debug for MultipartDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartDownloader")
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .finish()
    }
}

enum InitDecision {
    Done,
    Join(SharedOp),
    Spawned(SharedOp, oneshot::Sender<()>),
    Again,
}

enum StartDecision {
    Done,
    Spawned(SharedOp),
    Again,
}

enum StopPlan {
    Noop,
    WaitOther,
    Drain {
        init_op: Option<SharedOp>,
        start_op: Option<SharedOp>,
        changed: bool,
    },
}

impl Inner {
    fn transition_locked(lc: &mut Lifecycle, new_state: DownloadState) -> bool {
        if lc.state == new_state {
            return false;
        }
        lc.state = new_state;
        true
    }

    /// 状态已在锁内更新后的收尾：记录日志、唤醒等待者、触发事件回调
    fn after_transition(&self, new_state: DownloadState) {
        debug!(state = %new_state, "下载状态变更");
        self.state_notify.notify_waiters();
        self.hooks.emit_state_changed(new_state);
    }

    fn transition(&self, new_state: DownloadState) {
        let changed = {
            let mut lc = self.lifecycle.lock();
            Self::transition_locked(&mut lc, new_state)
        };
        if changed {
            self.after_transition(new_state);
        }
    }

    /// 记录终态错误：先收尾写入目标；取消归于 Stopped，其余错误先
    /// 写入 `last_error` 再转入 Error，保证观察者在状态事件里能同时
    /// 读到两者
    async fn set_last_error(&self, err: DownloadError) {
        let _ = self.writer.finalize().await;
        if err.is_cancelled() {
            self.transition(DownloadState::Stopped);
        } else {
            {
                let mut lc = self.lifecycle.lock();
                lc.last_error = Some(err.clone());
            }
            error!("下载失败: {}", err);
            self.transition(DownloadState::Error);
        }
    }

    async fn wait_while_stopping(inner: &Arc<Inner>) {
        loop {
            // 先注册再检查，避免丢失 notify_waiters 的唤醒
            let mut notified = std::pin::pin!(inner.state_notify.notified());
            notified.as_mut().enable();
            if inner.lifecycle.lock().state != DownloadState::Stopping {
                return;
            }
            notified.await;
        }
    }

    async fn init(inner: &Arc<Inner>) -> Result<()> {
        loop {
            Inner::wait_while_stopping(inner).await;

            let decision = {
                let mut lc = inner.lifecycle.lock();
                match lc.state {
                    DownloadState::Stopping => InitDecision::Again,
                    DownloadState::Initializing => match lc.init_op.clone() {
                        Some(op) => InitDecision::Join(op),
                        None => InitDecision::Again,
                    },
                    DownloadState::Initialized
                    | DownloadState::Downloading
                    | DownloadState::Finished => InitDecision::Done,
                    DownloadState::None | DownloadState::Stopped | DownloadState::Error => {
                        lc.last_error = None;
                        if lc.token.is_cancelled() {
                            lc.token = CancellationToken::new();
                        }
                        let token = lc.token.clone();
                        let task_inner = inner.clone();
                        // 门控启动：先在锁外发出 Initializing 事件，再放行任务
                        let (gate_tx, gate_rx) = oneshot::channel::<()>();
                        let op = spawn_shared(async move {
                            let _ = gate_rx.await;
                            Inner::run_init(task_inner, token).await
                        });
                        lc.init_op = Some(op.clone());
                        Self::transition_locked(&mut lc, DownloadState::Initializing);
                        InitDecision::Spawned(op, gate_tx)
                    }
                }
            };

            match decision {
                InitDecision::Done => return Ok(()),
                InitDecision::Join(op) => return op.await,
                InitDecision::Spawned(op, gate_tx) => {
                    inner.after_transition(DownloadState::Initializing);
                    let _ = gate_tx.send(());
                    return op.await;
                }
                InitDecision::Again => continue,
            }
        }
    }

    async fn run_init(self: Arc<Self>, token: CancellationToken) -> Result<()> {
        match self.do_init(&token).await {
            Ok(()) => {
                self.transition(DownloadState::Initialized);
                Ok(())
            }
            Err(err) => {
                self.set_last_error(err.clone()).await;
                Err(err)
            }
        }
    }

    async fn do_init(&self, token: &CancellationToken) -> Result<()> {
        info!("开始初始化下载: {}", self.config.url);

        let mut request = self.client.head(&self.config.url);
        if let Some(secs) = self.config.request_timeout_secs {
            request = request.timeout(Duration::from_secs(secs));
        }

        let response = tokio::select! {
            _ = token.cancelled() => return Err(DownloadError::Cancelled),
            result = request.send() => result
                .map_err(|e| DownloadError::HeaderUnavailable(format!("HEAD 请求失败: {}", e)))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HeaderUnavailable(format!(
                "HEAD 返回状态 {}",
                status
            )));
        }

        let total_size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                DownloadError::HeaderUnavailable("响应缺少 Content-Length".to_string())
            })?;

        let accepts_bytes = response
            .headers()
            .get(header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("bytes"))
            .unwrap_or(false);
        let resuming = self.config.allow_resuming && accepts_bytes;

        self.total_size.store(total_size, Ordering::SeqCst);
        self.resuming_supported.store(resuming, Ordering::SeqCst);

        info!(
            "资源信息获取完成: 大小 {} 字节, 断点续传 {}",
            total_size,
            if resuming { "可用" } else { "不可用" }
        );

        // 候选分段集：构造时注入的续传集优先，其次是上一轮（如停止前）
        // 留下的分段进度
        let candidate: Option<Vec<Arc<DownloadRange>>> = match self.resume_ranges.lock().take() {
            Some(set) => Some(set.into_iter().map(Arc::new).collect()),
            None => {
                let current = self.ranges.read().clone();
                if current.is_empty() {
                    None
                } else {
                    Some(current.as_ref().clone())
                }
            }
        };

        let ranges: Vec<Arc<DownloadRange>> = match candidate {
            Some(set) if set.iter().map(|r| r.width()).sum::<u64>() == total_size => {
                info!("沿用已有分段进度: {} 个分段", set.len());
                set
            }
            candidate => {
                if candidate.is_some() {
                    warn!("已有分段与资源大小不符，重新规划分段");
                }
                let planned = if resuming {
                    range::plan_ranges(total_size, self.config.part_size)
                } else {
                    range::single_range(total_size)
                };
                debug!("分段规划完成: {} 个分段", planned.len());
                planned.into_iter().map(Arc::new).collect()
            }
        };
        *self.ranges.write() = Arc::new(ranges);

        Ok(())
    }

    async fn start(inner: &Arc<Inner>) -> Result<()> {
        loop {
            Inner::wait_while_stopping(inner).await;

            let decision = {
                let mut lc = inner.lifecycle.lock();
                match lc.state {
                    DownloadState::Stopping => StartDecision::Again,
                    DownloadState::Downloading | DownloadState::Finished => StartDecision::Done,
                    // 已有尚未结束的启动任务在途
                    _ if lc
                        .start_op
                        .as_ref()
                        .is_some_and(|op| op.peek().is_none())
                        && matches!(
                            lc.state,
                            DownloadState::None
                                | DownloadState::Initializing
                                | DownloadState::Initialized
                        ) =>
                    {
                        StartDecision::Done
                    }
                    _ => {
                        lc.last_error = None;
                        if lc.token.is_cancelled() {
                            lc.token = CancellationToken::new();
                        }
                        let token = lc.token.clone();
                        let task_inner = inner.clone();
                        let op =
                            spawn_shared(async move { Inner::run_start(task_inner, token).await });
                        lc.start_op = Some(op.clone());
                        StartDecision::Spawned(op)
                    }
                }
            };

            match decision {
                StartDecision::Done => return Ok(()),
                StartDecision::Spawned(op) => return op.await,
                StartDecision::Again => continue,
            }
        }
    }

    async fn run_start(self: Arc<Self>, token: CancellationToken) -> Result<()> {
        // 先完成初始化（加入在途任务或新建）；失败已由初始化任务记录。
        // 与取消信号竞争，Stop 等待本任务收尾时初始化等待必须让路
        let init_result = tokio::select! {
            _ = token.cancelled() => Err(DownloadError::Cancelled),
            result = Inner::init(&self) => result,
        };

        if init_result.is_err() || self.lifecycle.lock().state != DownloadState::Initialized {
            debug!("初始化未完成，取消启动");
            return Ok(());
        }

        self.transition(DownloadState::Downloading);
        self.speed.reset();

        match self.run_transfer(&token).await {
            Ok(()) => {
                if let Err(err) = self.writer.finalize().await {
                    self.set_last_error(err.clone()).await;
                    return Err(err);
                }
                self.hooks.emit_before_finish();
                self.transition(DownloadState::Finished);
                info!("下载完成: {}", self.config.url);
                Ok(())
            }
            Err(err) => {
                self.set_last_error(err.clone()).await;
                // 协作停止不是错误
                if err.is_cancelled() {
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn run_transfer(&self, token: &CancellationToken) -> Result<()> {
        let ranges = self.ranges.read().clone();
        let pending: Vec<Arc<DownloadRange>> = ranges
            .iter()
            .filter(|r| !r.is_done())
            .cloned()
            .collect();

        if pending.is_empty() {
            info!("所有分段均已完成，无需传输");
            return Ok(());
        }

        info!("待传输分段: {}/{}", pending.len(), ranges.len());

        let resuming = self.resuming_supported.load(Ordering::SeqCst);
        let fetchers: Vec<RangeFetcher> = pending
            .into_iter()
            .map(|range| RangeFetcher {
                client: self.client.clone(),
                url: self.config.url.clone(),
                range,
                writer: self.writer.clone(),
                speed: self.speed.clone(),
                hooks: self.hooks.clone(),
                resuming_supported: resuming,
                max_retry_count: self.config.max_retry_count,
                write_buffer_size: self.config.write_buffer_size,
                request_timeout: self.config.request_timeout_secs.map(Duration::from_secs),
                token: token.clone(),
            })
            .collect();

        let scheduler = RangeScheduler::new(self.config.max_part_count, token.clone());
        scheduler.run(fetchers).await
    }

    async fn stop(inner: &Arc<Inner>) {
        let plan = {
            let mut lc = inner.lifecycle.lock();
            if matches!(
                lc.state,
                DownloadState::Finished | DownloadState::Stopped | DownloadState::Error
            ) {
                StopPlan::Noop
            } else if lc.state == DownloadState::Stopping
                && lc.init_op.is_none()
                && lc.start_op.is_none()
            {
                StopPlan::WaitOther
            } else {
                let changed = Self::transition_locked(&mut lc, DownloadState::Stopping);
                lc.token.cancel();
                StopPlan::Drain {
                    init_op: lc.init_op.take(),
                    start_op: lc.start_op.take(),
                    changed,
                }
            }
        };

        match plan {
            StopPlan::Noop => {}
            StopPlan::WaitOther => {
                // 另一次 Stop 正在收尾，等它完成
                Inner::wait_while_stopping(inner).await;
            }
            StopPlan::Drain {
                init_op,
                start_op,
                changed,
            } => {
                if changed {
                    inner.after_transition(DownloadState::Stopping);
                }
                info!("停止下载，等待在途任务收尾");
                if let Some(op) = init_op {
                    let _ = op.await;
                }
                if let Some(op) = start_op {
                    let _ = op.await;
                }
                let changed = {
                    let mut lc = inner.lifecycle.lock();
                    // 重新武装取消令牌，停止后的下载器可再次驱动；若期间
                    // 已有新一轮 Init 换上了新令牌则保持不动
                    if lc.token.is_cancelled() {
                        lc.token = CancellationToken::new();
                    }
                    if lc.state == DownloadState::Stopping {
                        Self::transition_locked(&mut lc, DownloadState::Stopped)
                    } else {
                        false
                    }
                };
                if changed {
                    inner.after_transition(DownloadState::Stopped);
                }
            }
        }
    }

    async fn dispose(inner: &Arc<Inner>) {
        debug!("释放下载器资源");
        let (init_op, start_op) = {
            let mut lc = inner.lifecycle.lock();
            lc.token.cancel();
            (lc.init_op.take(), lc.start_op.take())
        };
        if let Some(op) = init_op {
            let _ = op.await;
        }
        if let Some(op) = start_op {
            let _ = op.await;
        }
        let _ = inner.writer.finalize().await;
    }
}

fn spawn_shared<F>(fut: F) -> SharedOp
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let handle = tokio::spawn(fut);
    async move {
        match handle.await {
            Ok(result) => result,
            Err(err) => Err(DownloadError::TransferFailed(format!(
                "生命周期任务异常终止: {}",
                err
            ))),
        }
    }
    .boxed()
    .shared()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_state_predicate() {
        assert!(DownloadState::None.is_idle());
        assert!(DownloadState::Initialized.is_idle());
        assert!(DownloadState::Stopped.is_idle());
        assert!(DownloadState::Error.is_idle());
        assert!(DownloadState::Finished.is_idle());

        assert!(!DownloadState::Initializing.is_idle());
        assert!(!DownloadState::Downloading.is_idle());
        assert!(!DownloadState::Stopping.is_idle());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(DownloadState::None.to_string(), "none");
        assert_eq!(DownloadState::Downloading.to_string(), "downloading");
        assert_eq!(DownloadState::Error.to_string(), "error");
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&DownloadState::Initializing).unwrap();
        assert_eq!(json, "\"initializing\"");
        let state: DownloadState = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(state, DownloadState::Stopped);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = DownloaderConfig::new("http://example.com/file.bin");
        config.part_size = 1;
        let err = MultipartDownloader::builder(config).build().unwrap_err();
        assert_eq!(err.error_type(), "invalid_config");
    }

    #[tokio::test]
    async fn test_initial_state_follows_config() {
        let config = DownloaderConfig::new("http://example.com/file.bin");
        let downloader = MultipartDownloader::builder(config).build().unwrap();
        assert_eq!(downloader.state(), DownloadState::None);
        assert_eq!(downloader.total_size(), 0);
        assert_eq!(downloader.current_size(), 0);
        assert!(downloader.last_error().is_none());

        let mut config = DownloaderConfig::new("http://example.com/file.bin");
        config.is_stopped = true;
        let downloader = MultipartDownloader::builder(config).build().unwrap();
        assert_eq!(downloader.state(), DownloadState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_on_idle_downloader_is_noop() {
        let mut config = DownloaderConfig::new("http://example.com/file.bin");
        config.is_stopped = true;
        let downloader = MultipartDownloader::builder(config).build().unwrap();
        downloader.stop().await;
        assert_eq!(downloader.state(), DownloadState::Stopped);
    }
}

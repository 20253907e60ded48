//! 流到流搬运引擎。
//!
//! # 模块定位（Why）
//! - 在任意源端与目标端之间搬运字节，优先走“直接缓冲”的单次拷贝路径；
//! - 超时是“空闲期限”：每次取得进展都会重新计时，而不是从调用开始算起。
//!
//! # 策略选择（What）
//! | 源端直接缓冲 | 分隔符 | 策略 |
//! | --- | --- | --- |
//! | 有 | 任意 | [`Strategy::Direct`] |
//! | 无 | 有 | [`Strategy::BytewiseUntil`] |
//! | 无 | 无 | [`Strategy::Chunked`] |
//!
//! # 实现要点（How）
//! - 策略在调用边界选定一次，每种策略的单轮逻辑是独立的泛型函数，
//!   由同一个驱动循环负责目标检查、空闲计时与协作式让步；
//! - 每轮迭代都重新查询 `available()`/`available_for_write()`，让步期间端点状态可能已经改变。

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::clock::{Clock, PolledTimeout};
use crate::config::PumpConfig;
use crate::endpoint::{Sink, Source};
use crate::error::TransferError;
use crate::schedule::{Cooperative, Scheduler};

/// 常规分块策略使用的栈上中转缓冲大小。
pub const STAGING_CAPACITY: usize = 64;

/// 搬运目标。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Goal {
    /// 恰好搬运给定字节数。
    Exact(usize),
    /// 直到饥饿：没有更多立即可得的数据，或空闲期限到达。
    Unbounded,
}

impl Goal {
    pub fn limit(self) -> Option<usize> {
        match self {
            Goal::Exact(len) => Some(len),
            Goal::Unbounded => None,
        }
    }

    fn remaining(self, moved: usize) -> usize {
        match self {
            Goal::Exact(len) => len.saturating_sub(moved),
            Goal::Unbounded => usize::MAX,
        }
    }
}

/// 空闲超时的取值方式。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransferTimeout {
    /// 沿用搬运引擎配置的空闲期限。
    #[default]
    Default,
    /// 始终到期：只搬运一轮内立即可得的数据。
    Expired,
    After(Duration),
}

/// 一次搬运请求。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Transfer {
    pub goal: Goal,
    /// 遇到该字节即停止；分隔符被消费但不转发。
    pub delimiter: Option<u8>,
    pub timeout: TransferTimeout,
}

impl Transfer {
    /// 只搬运已经缓冲好的数据，不等待；超时为 `Expired`，循环只运行一轮。
    pub fn available() -> Self {
        Self {
            goal: Goal::Unbounded,
            delimiter: None,
            timeout: TransferTimeout::Expired,
        }
    }

    pub fn all() -> Self {
        Self {
            goal: Goal::Unbounded,
            delimiter: None,
            timeout: TransferTimeout::Default,
        }
    }

    pub fn until(delimiter: u8) -> Self {
        Self {
            delimiter: Some(delimiter),
            ..Self::all()
        }
    }

    pub fn size(len: usize) -> Self {
        Self {
            goal: Goal::Exact(len),
            ..Self::all()
        }
    }

    pub fn with_timeout(mut self, timeout: TransferTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }
}

/// 搬运结果的分类，互斥且以首个非成功原因为准。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransferReport {
    #[default]
    Success,
    TimedOut,
    ReadError,
    WriteError,
    ShortTransfer,
}

/// 循环结束的直接原因。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// 请求零字节，未进入循环。
    EmptyRequest,
    GoalReached,
    DelimiterFound,
    /// 源端读空且不会再有数据。
    InputExhausted,
    /// 目标端写满且不会再释放空间。
    OutputExhausted,
    IdleTimeout,
    ReadFailed,
    WriteFailed,
}

/// 单次调用选定的搬运策略。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    Direct,
    BytewiseUntil,
    Chunked,
}

impl Strategy {
    pub fn select(has_direct_buffer: bool, has_delimiter: bool) -> Self {
        match (has_direct_buffer, has_delimiter) {
            (true, _) => Strategy::Direct,
            (false, true) => Strategy::BytewiseUntil,
            (false, false) => Strategy::Chunked,
        }
    }
}

/// 一次搬运的完整结果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferOutcome {
    /// 已写入目标端的字节数。
    pub moved: usize,
    pub goal: Goal,
    pub report: TransferReport,
    pub stop: StopReason,
    pub strategy: Strategy,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.report == TransferReport::Success
    }

    /// 把报告转换为 `Result`，成功时返回搬运的字节数。
    pub fn into_result(self) -> Result<usize, TransferError> {
        let moved = self.moved;
        let goal = self.goal.limit().unwrap_or(moved);
        match self.report {
            TransferReport::Success => Ok(moved),
            TransferReport::TimedOut => Err(TransferError::TimedOut { moved, goal }),
            TransferReport::ReadError => Err(TransferError::Read { moved }),
            TransferReport::WriteError => Err(TransferError::Write { moved }),
            TransferReport::ShortTransfer => Err(TransferError::Short { moved, goal }),
        }
    }
}

enum Step {
    Continue { moved: usize },
    Finish { moved: usize, stop: StopReason },
}

/// 流到流搬运引擎。
///
/// # 教案式注释
/// - **意图 (Why)**：把“从哪里读、往哪里写、何时停止”与端点实现解耦，
///   文件、串口、内存缓冲都通过同一组能力契约参与搬运；
/// - **契约 (What)**：
///   - 源端与目标端只在调用期间被借用；
///   - 每轮迭代之间调用一次 [`Cooperative::yield_now`]；
///   - 结果同时写入 [`last_report`](Self::last_report)，供只关心字节数的调用方事后查询；
/// - **风险 (Trade-offs)**：分块策略下若目标端接收少于读出的字节，未写出的部分已从源端取出，
///   只能以 `WriteError` 报告。
pub struct StreamPump<'a> {
    clock: &'a dyn Clock,
    cooperative: &'a dyn Cooperative,
    idle_timeout: Duration,
    staging_capacity: usize,
    last_report: TransferReport,
}

impl<'a> StreamPump<'a> {
    pub fn new(clock: &'a dyn Clock, cooperative: &'a dyn Cooperative) -> Self {
        Self {
            clock,
            cooperative,
            idle_timeout: PumpConfig::default().idle_timeout(),
            staging_capacity: STAGING_CAPACITY,
            last_report: TransferReport::Success,
        }
    }

    /// 使用调度器的时钟，并在每轮迭代之间让步给调度器。
    pub fn with_scheduler(scheduler: &'a Scheduler) -> Self {
        Self::new(scheduler.clock().as_ref(), scheduler)
    }

    pub fn with_config(mut self, config: &PumpConfig) -> Self {
        self.idle_timeout = config.idle_timeout();
        self.staging_capacity = config.staging_capacity.clamp(1, STAGING_CAPACITY);
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn last_report(&self) -> TransferReport {
        self.last_report
    }

    /// 按请求搬运字节。
    pub fn transfer<S, K>(&mut self, source: &mut S, sink: &mut K, request: Transfer) -> TransferOutcome
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        let strategy = Strategy::select(source.has_direct_buffer(), request.delimiter.is_some());
        let outcome = if request.goal == Goal::Exact(0) {
            TransferOutcome {
                moved: 0,
                goal: request.goal,
                report: TransferReport::Success,
                stop: StopReason::EmptyRequest,
                strategy,
            }
        } else {
            self.run(source, sink, request, strategy)
        };
        self.last_report = outcome.report;
        outcome
    }

    /// 只搬运已经缓冲好的数据。
    ///
    /// 超时始终到期，循环只运行一轮：直接缓冲路径搬运源端视图的第一段连续区间
    /// （环形队列回绕时只是前半段），分块路径最多搬运一个中转块。需要取空时反复调用，
    /// 直到 `moved == 0`。
    pub fn send_available<S, K>(&mut self, source: &mut S, sink: &mut K) -> TransferOutcome
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        self.transfer(source, sink, Transfer::available())
    }

    /// 搬运直到饥饿或空闲期限到达。
    pub fn send_all<S, K>(&mut self, source: &mut S, sink: &mut K, timeout: TransferTimeout) -> TransferOutcome
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        self.transfer(source, sink, Transfer::all().with_timeout(timeout))
    }

    /// 搬运直到遇见 `delimiter`，分隔符被消费但不转发。
    pub fn send_until<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        delimiter: u8,
        timeout: TransferTimeout,
    ) -> TransferOutcome
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        self.transfer(source, sink, Transfer::until(delimiter).with_timeout(timeout))
    }

    pub fn send_size<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        len: usize,
        timeout: TransferTimeout,
    ) -> TransferOutcome
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        self.transfer(source, sink, Transfer::size(len).with_timeout(timeout))
    }

    /// 把源端“剩下的内容”接到目标端。
    ///
    /// - 总量已知：恰好搬运 `remaining()` 字节；
    /// - 总量未知且输入可能超时：等同 [`send_available`](Self::send_available)，只运行一轮；
    /// - 总量未知且输入不会超时：搬运全部。
    pub fn pipe<S, K>(&mut self, source: &mut S, sink: &mut K) -> TransferOutcome
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        match source.remaining() {
            Some(len) => self.send_size(source, sink, len, TransferTimeout::Default),
            None if source.can_input_time_out() => self.send_available(source, sink),
            None => self.send_all(source, sink, TransferTimeout::Default),
        }
    }

    fn run<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        request: Transfer,
        strategy: Strategy,
    ) -> TransferOutcome
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        let timeout = match request.timeout {
            TransferTimeout::Default => self.idle_timeout,
            TransferTimeout::Expired => Duration::ZERO,
            TransferTimeout::After(timeout) => timeout,
        };
        debug!(
            ?strategy,
            goal = ?request.goal,
            delimiter = ?request.delimiter,
            timeout_ms = timeout.as_millis() as u64,
            "transfer started"
        );

        let (moved, stop) = match (strategy, request.delimiter) {
            (Strategy::Direct, delimiter) => self.drive(request.goal, timeout, |remaining| {
                direct_step(&mut *source, &mut *sink, delimiter, remaining)
            }),
            (Strategy::BytewiseUntil, Some(delimiter)) => {
                self.drive(request.goal, timeout, |_| bytewise_step(&mut *source, &mut *sink, delimiter))
            }
            _ => {
                let mut staging = [0u8; STAGING_CAPACITY];
                let staging = &mut staging[..self.staging_capacity];
                self.drive(request.goal, timeout, |remaining| {
                    chunked_step(&mut *source, &mut *sink, &mut *staging, remaining)
                })
            }
        };

        let report = resolve_report(request.goal, moved, stop, timeout);
        match report {
            TransferReport::ReadError | TransferReport::WriteError => {
                warn!(?report, moved, ?stop, "transfer failed")
            }
            _ => debug!(?report, moved, ?stop, "transfer finished"),
        }
        TransferOutcome {
            moved,
            goal: request.goal,
            report,
            stop,
            strategy,
        }
    }

    fn drive(
        &self,
        goal: Goal,
        timeout: Duration,
        mut step: impl FnMut(usize) -> Step,
    ) -> (usize, StopReason) {
        let mut moved = 0usize;
        let mut deadline = PolledTimeout::new(self.clock.now(), timeout);
        loop {
            let remaining = goal.remaining(moved);
            if remaining == 0 {
                return (moved, StopReason::GoalReached);
            }
            match step(remaining) {
                Step::Finish { moved: chunk, stop } => return (moved + chunk, stop),
                Step::Continue { moved: chunk } => {
                    if chunk > 0 {
                        moved += chunk;
                        deadline.reset(self.clock.now());
                        trace!(chunk, moved, "chunk transferred");
                    }
                }
            }
            if deadline.expired(self.clock.now()) {
                return (moved, StopReason::IdleTimeout);
            }
            self.cooperative.yield_now();
        }
    }
}

fn resolve_report(goal: Goal, moved: usize, stop: StopReason, timeout: Duration) -> TransferReport {
    match stop {
        StopReason::ReadFailed => TransferReport::ReadError,
        StopReason::WriteFailed => TransferReport::WriteError,
        StopReason::DelimiterFound => TransferReport::Success,
        _ => match goal {
            Goal::Exact(len) if len > 0 && moved != len => {
                if stop == StopReason::IdleTimeout && !timeout.is_zero() {
                    TransferReport::TimedOut
                } else {
                    TransferReport::ShortTransfer
                }
            }
            _ => TransferReport::Success,
        },
    }
}

fn exhausted<S, K>(source_available: usize, source: &S, sink: &K) -> Option<StopReason>
where
    S: Source + ?Sized,
    K: Sink + ?Sized,
{
    if source_available == 0 && !source.can_input_time_out() {
        return Some(StopReason::InputExhausted);
    }
    if sink.available_for_write() == 0 && !sink.can_output_time_out() {
        return Some(StopReason::OutputExhausted);
    }
    None
}

fn direct_step<S, K>(source: &mut S, sink: &mut K, delimiter: Option<u8>, remaining: usize) -> Step
where
    S: Source + ?Sized,
    K: Sink + ?Sized,
{
    let available = source.direct_available();
    if let Some(stop) = exhausted(available, &*source, &*sink) {
        return Step::Finish { moved: 0, stop };
    }
    let view = source.direct_buffer();
    let window = available
        .min(view.len())
        .min(sink.available_for_write())
        .min(remaining);
    if window == 0 {
        return Step::Continue { moved: 0 };
    }
    let view = &view[..window];
    let found = delimiter.and_then(|delimiter| view.iter().position(|&byte| byte == delimiter));
    let len = found.unwrap_or(window);
    let written = if len > 0 { sink.write(&view[..len]) } else { 0 };
    source.direct_consume(written);
    match found {
        Some(_) if written == len => {
            source.direct_consume(1);
            Step::Finish {
                moved: written,
                stop: StopReason::DelimiterFound,
            }
        }
        _ => Step::Continue { moved: written },
    }
}

fn bytewise_step<S, K>(source: &mut S, sink: &mut K, delimiter: u8) -> Step
where
    S: Source + ?Sized,
    K: Sink + ?Sized,
{
    if let Some(stop) = exhausted(source.available(), &*source, &*sink) {
        return Step::Finish { moved: 0, stop };
    }
    // 目标端暂时没有空间时不取字节，避免取出后无处安放。
    if sink.available_for_write() == 0 {
        return Step::Continue { moved: 0 };
    }
    match source.read_byte() {
        None => Step::Continue { moved: 0 },
        Some(byte) if byte == delimiter => Step::Finish {
            moved: 0,
            stop: StopReason::DelimiterFound,
        },
        Some(byte) if sink.write_byte(byte) => Step::Continue { moved: 1 },
        Some(_) => Step::Finish {
            moved: 0,
            stop: StopReason::WriteFailed,
        },
    }
}

fn chunked_step<S, K>(source: &mut S, sink: &mut K, staging: &mut [u8], remaining: usize) -> Step
where
    S: Source + ?Sized,
    K: Sink + ?Sized,
{
    let available = source.available();
    if let Some(stop) = exhausted(available, &*source, &*sink) {
        return Step::Finish { moved: 0, stop };
    }
    let len = available
        .min(sink.available_for_write())
        .min(remaining)
        .min(staging.len());
    if len == 0 {
        return Step::Continue { moved: 0 };
    }
    let read = match source.read(&mut staging[..len]) {
        Ok(read) => read.min(len),
        Err(err) => {
            warn!(code = err.code(), reason = err.reason(), "source read failed");
            return Step::Finish {
                moved: 0,
                stop: StopReason::ReadFailed,
            };
        }
    };
    let written = sink.write(&staging[..read]);
    if written != read {
        return Step::Finish {
            moved: written,
            stop: StopReason::WriteFailed,
        };
    }
    Step::Continue { moved: written }
}

//! 单调时钟抽象与轮询式超时。
//!
//! # 模块定位（Why）
//! - 目标平台没有可中断的阻塞等待，超时只是“当前时刻与截止点的比较”，因此只需要 `now`；
//! - 搬运引擎与调度器都通过 [`Clock`] 读取时间，测试注入 [`MockClock`] 即可完全确定性地推进。
//!
//! # 结构概览（What）
//! - [`Clock`]：返回单调时间点；
//! - [`SystemClock`]：委托 `Instant::now`；
//! - [`MockClock`]：手动推进的虚拟时钟，克隆后共享同一时间轴；
//! - [`PolledTimeout`]：一次性截止点，可在任意进展后重置。

use std::sync::Arc;
use std::time::{Duration, Instant};

use spin::Mutex;

/// 可注入的单调时钟。
///
/// 实现者必须保证 `now` 单调不减。
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// 基于 `std::time::Instant` 的系统时钟。
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 手动推进的虚拟时钟。
///
/// # 教案式注释
/// - **意图 (Why)**：超时测试若依赖真实时间会变慢且不稳定；虚拟时钟让测试精确控制
///   “经过了多久”，例如在调度器的周期回调中每次让步推进固定步长；
/// - **契约 (What)**：`now() == origin + elapsed()`；`advance` 只增不减；
/// - **实现 (How)**：状态放在 `Arc<spin::Mutex<_>>` 中，克隆体共享同一时间轴。
#[derive(Clone, Debug)]
pub struct MockClock {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug)]
struct MockState {
    origin: Instant,
    elapsed: Duration,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    pub fn new() -> Self {
        Self::with_start(Instant::now())
    }

    pub fn with_start(origin: Instant) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                origin,
                elapsed: Duration::ZERO,
            })),
        }
    }

    /// 推进虚拟时间。
    pub fn advance(&self, delta: Duration) {
        let mut state = self.state.lock();
        state.elapsed = state.elapsed.saturating_add(delta);
    }

    /// 自起点以来累计推进的时长。
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        let state = self.state.lock();
        state.origin + state.elapsed
    }
}

/// 一次性轮询超时。
///
/// `expired` 在自上次 `reset` 起经过的时间达到 `timeout` 时返回 `true`；
/// 时长为零的超时从创建起即处于到期状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolledTimeout {
    start: Instant,
    timeout: Duration,
}

impl PolledTimeout {
    pub fn new(now: Instant, timeout: Duration) -> Self {
        Self {
            start: now,
            timeout,
        }
    }

    pub fn always_expired(now: Instant) -> Self {
        Self::new(now, Duration::ZERO)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start) >= self.timeout
    }

    /// 以 `now` 为新的起点重新计时。
    pub fn reset(&mut self, now: Instant) {
        self.start = now;
    }

    /// 距离到期还剩多久，已到期时为零。
    pub fn remaining(&self, now: Instant) -> Duration {
        self.timeout
            .saturating_sub(now.saturating_duration_since(self.start))
    }
}

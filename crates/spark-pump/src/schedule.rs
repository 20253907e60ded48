//! 协作式调度：让步点与延迟回调队列。
//!
//! # 模块定位（Why）
//! - 目标平台是单线程、中断驱动的协作式执行模型，串口/网络端点的后台处理只会在让步点推进；
//! - 搬运引擎在每轮迭代之间调用 [`Cooperative::yield_now`]，本模块的 [`Scheduler`] 借此运行
//!   中断或系统事件登记下来的回调。
//!
//! # 契约说明（What）
//! - 一次性回调按 FIFO 执行，队列上限默认 [`SCHEDULED_FN_MAX_COUNT`]；
//! - 周期回调按各自周期执行，返回 `false` 即注销自己；可附带“闹钟”谓词，返回 `true` 时忽略剩余等待立即执行；
//! - `yield_now` 可重入：回调内部再次让步时，嵌套调用不会重复运行周期回调；
//! - 类型不是 `Send`，只能在所属执行流内使用。

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::clock::Clock;
use crate::config::PumpConfig;
use crate::error::ScheduleError;

/// 一次性回调队列的默认上限。
pub const SCHEDULED_FN_MAX_COUNT: usize = 32;

/// 协作式让步点。
///
/// 让步期间可能执行任意其他代码并改变端点状态，调用方在返回后必须重新查询
/// `available()`/`available_for_write()`，不得沿用让步前的缓存值。
pub trait Cooperative {
    fn yield_now(&self);
}

/// 什么也不做的让步点，适合纯内存端点之间的搬运。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoYield;

impl Cooperative for NoYield {
    fn yield_now(&self) {}
}

impl<T: Cooperative + ?Sized> Cooperative for &T {
    fn yield_now(&self) {
        (**self).yield_now()
    }
}

type OneShot = Box<dyn FnOnce()>;
type Predicate = Box<dyn FnMut() -> bool>;

struct Recurrent {
    callback: Predicate,
    alarm: Option<Predicate>,
    period: Duration,
    // `None` 表示周期过大、只能由闹钟触发。
    next_due: Option<Instant>,
}

impl Recurrent {
    fn is_due(&mut self, now: Instant) -> bool {
        if let Some(alarm) = self.alarm.as_mut()
            && alarm()
        {
            return true;
        }
        self.next_due.is_some_and(|due| now >= due)
    }
}

/// 单线程协作式调度器。
///
/// # 教案式注释
/// - **结构 (How)**：一次性回调放在 `VecDeque` 中；周期回调放在 `Vec` 中，运行期间整体取出，
///   回调内部新登记的周期回调会在本轮结束后追加到末尾；
/// - **前置条件 (What)**：回调可以登记新回调、可以调用 `yield_now`，但周期回调不应长时间运行；
/// - **风险 (Trade-offs)**：一次性回调在本轮只运行进入时已排队的部分，回调中新排队的回调等待下一次让步，
///   以免自我续排的回调形成死循环。
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    capacity: usize,
    one_shots: RefCell<VecDeque<OneShot>>,
    recurrent: RefCell<Vec<Recurrent>>,
    running_recurrent: Cell<bool>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(clock, SCHEDULED_FN_MAX_COUNT)
    }

    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            clock,
            capacity,
            one_shots: RefCell::new(VecDeque::new()),
            recurrent: RefCell::new(Vec::new()),
            running_recurrent: Cell::new(false),
        }
    }

    pub fn from_config(clock: Arc<dyn Clock>, config: &PumpConfig) -> Self {
        Self::with_capacity(clock, config.scheduled_fn_max_count)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 已排队、尚未执行的一次性回调数量。
    pub fn pending(&self) -> usize {
        self.one_shots.borrow().len()
    }

    /// 当前登记的周期回调数量。
    pub fn recurrent_count(&self) -> usize {
        self.recurrent.borrow().len()
    }

    /// 登记一个在下次让步时执行的一次性回调。
    pub fn schedule_function(&self, callback: impl FnOnce() + 'static) -> Result<(), ScheduleError> {
        let mut queue = self.one_shots.borrow_mut();
        if queue.len() >= self.capacity {
            warn!(capacity = self.capacity, "scheduled function queue is full");
            return Err(ScheduleError::QueueFull {
                capacity: self.capacity,
            });
        }
        queue.push_back(Box::new(callback));
        Ok(())
    }

    /// 登记周期回调，约每隔 `period` 执行一次，直到回调返回 `false`。
    pub fn schedule_recurrent_function(
        &self,
        callback: impl FnMut() -> bool + 'static,
        period: Duration,
    ) {
        self.push_recurrent(Box::new(callback), None, period);
    }

    /// 与 [`schedule_recurrent_function`](Self::schedule_recurrent_function) 相同，
    /// 但 `alarm` 返回 `true` 时立即执行，不再等待剩余周期。
    pub fn schedule_recurrent_function_with_alarm(
        &self,
        callback: impl FnMut() -> bool + 'static,
        period: Duration,
        alarm: impl FnMut() -> bool + 'static,
    ) {
        self.push_recurrent(Box::new(callback), Some(Box::new(alarm)), period);
    }

    fn push_recurrent(&self, callback: Predicate, alarm: Option<Predicate>, period: Duration) {
        let next_due = self.clock.now().checked_add(period);
        self.recurrent.borrow_mut().push(Recurrent {
            callback,
            alarm,
            period,
            next_due,
        });
    }

    /// 执行进入时已排队的一次性回调。
    pub fn run_scheduled_functions(&self) {
        let queued = self.pending();
        for _ in 0..queued {
            let next = self.one_shots.borrow_mut().pop_front();
            match next {
                Some(callback) => callback(),
                // 嵌套让步已经替我们执行完了。
                None => break,
            }
        }
    }

    /// 执行所有到期的周期回调；在周期回调内部重入时直接返回。
    ///
    /// 回调 panic 时，取出的列表与运行标记由 [`RecurrentRun`] 在展开时归还，调度器仍可继续使用。
    pub fn run_recurrent_functions(&self) {
        if self.running_recurrent.replace(true) {
            return;
        }
        let mut run = RecurrentRun {
            scheduler: self,
            entries: mem::take(&mut *self.recurrent.borrow_mut()),
        };
        let now = self.clock.now();
        run.entries.retain_mut(|entry| {
            if !entry.is_due(now) {
                return true;
            }
            let keep = (entry.callback)();
            entry.next_due = self.clock.now().checked_add(entry.period);
            keep
        });
    }

    /// 周期回调的公共节拍：所有非零周期的最大公约数，没有周期回调时为 `None`。
    pub fn compute_recurrent_grain(&self) -> Option<Duration> {
        let grain = self
            .recurrent
            .borrow()
            .iter()
            .map(|entry| entry.period.as_micros())
            .filter(|&micros| micros > 0)
            .fold(0u128, gcd);
        if grain == 0 {
            return None;
        }
        Some(Duration::from_micros(
            u64::try_from(grain).unwrap_or(u64::MAX),
        ))
    }
}

/// 一轮周期回调执行期间的列表持有者，离开作用域时把列表与运行标记归还给调度器。
struct RecurrentRun<'s> {
    scheduler: &'s Scheduler,
    entries: Vec<Recurrent>,
}

impl Drop for RecurrentRun<'_> {
    fn drop(&mut self) {
        let mut slot = self.scheduler.recurrent.borrow_mut();
        let registered_meanwhile = mem::replace(&mut *slot, mem::take(&mut self.entries));
        slot.extend(registered_meanwhile);
        drop(slot);
        self.scheduler.running_recurrent.set(false);
    }
}

impl Cooperative for Scheduler {
    fn yield_now(&self) {
        trace!(
            pending = self.pending(),
            recurrent = self.recurrent_count(),
            "cooperative yield"
        );
        self.run_recurrent_functions();
        self.run_scheduled_functions();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("capacity", &self.capacity)
            .field("pending", &self.pending())
            .field("recurrent", &self.recurrent_count())
            .finish()
    }
}

fn gcd(a: u128, b: u128) -> u128 {
    if b == 0 { a } else { gcd(b, a % b) }
}

#![deny(unsafe_code)]

//! `spark-pump` 在两个抽象端点之间搬运字节流。
//!
//! # 模块定位（Why）
//! - 文件、串口、内存缓冲等端点只需实现 [`Source`]/[`Sink`] 能力契约，即可参与统一的搬运；
//! - 目标平台是单线程协作式执行模型，等待数据期间必须让出执行权，
//!   因此搬运循环与 [`Cooperative`] 让步点、[`Clock`] 轮询超时紧密配合。
//!
//! # 结构概览（What）
//! - [`StreamPump`]：三种搬运策略（直接缓冲、逐字节直到分隔符、栈上分块）与空闲超时；
//! - [`TimedReader`]：带超时的逐字节读取与整数/浮点解析；
//! - [`device`]：黑洞、零源、常量切片、字节串与环形队列等内存端点；
//! - [`Scheduler`]：一次性与周期回调队列，作为让步点运行延迟工作；
//! - [`PumpConfig`]：以 TOML 描述的默认空闲期限、分块大小与回调队列上限。
//!
//! # 错误处理（How）
//! - 搬运本身从不返回 `Err`，结果以 [`TransferOutcome`] 报告；需要 `?` 传播时调用
//!   [`TransferOutcome::into_result`]；
//! - 每个错误类型都提供稳定的 `code()`，取值见 [`error::codes`]。

pub mod clock;
pub mod config;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod pump;
pub mod reader;
pub mod schedule;

pub use clock::{Clock, MockClock, PolledTimeout, SystemClock};
pub use config::{DEFAULT_IDLE_TIMEOUT_MS, PumpConfig};
pub use device::{ByteStream, NullStream, RingStream, SliceSource, ZeroStream};
pub use endpoint::{Sink, Source};
pub use error::{ConfigError, ReadError, ScheduleError, TransferError};
pub use pump::{
    Goal, STAGING_CAPACITY, StopReason, Strategy, StreamPump, Transfer, TransferOutcome,
    TransferReport, TransferTimeout,
};
pub use reader::TimedReader;
pub use schedule::{Cooperative, NoYield, SCHEDULED_FN_MAX_COUNT, Scheduler};
pub use spark_ringbuf::RingBuffer;

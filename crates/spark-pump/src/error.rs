//! 搬运引擎及其协作者的错误类型。
//!
//! # 设计概要（How）
//! - 每类错误都携带稳定的 `spark.pump.*` 错误码，便于日志聚合；
//! - `TransferError` 只在调用方选择 [`TransferOutcome::into_result`](crate::TransferOutcome::into_result)
//!   时出现，搬运本身从不以 `Err` 中断，失败原因始终记录在报告中。

use std::borrow::Cow;

use thiserror::Error;

/// 稳定错误码。
pub mod codes {
    pub const READ_FAILED: &str = "spark.pump.read_failed";
    pub const WRITE_FAILED: &str = "spark.pump.write_failed";
    pub const TIMED_OUT: &str = "spark.pump.timed_out";
    pub const SHORT_TRANSFER: &str = "spark.pump.short_transfer";
    pub const SCHEDULE_QUEUE_FULL: &str = "spark.pump.schedule_queue_full";
    pub const CONFIG_PARSE: &str = "spark.pump.config_parse";
    pub const CONFIG_INVALID: &str = "spark.pump.config_invalid";
}

/// 源端在批量读取时报告的失败。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("源端读取失败: {reason}")]
pub struct ReadError {
    reason: Cow<'static, str>,
}

impl ReadError {
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn code(&self) -> &'static str {
        codes::READ_FAILED
    }
}

/// 一次搬运未能按请求完成的原因，附带已搬运的字节数。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TransferError {
    /// 空闲期限内没有任何进展。
    #[error("搬运超时：空闲期限到达前仅完成 {moved}/{goal} 字节")]
    TimedOut { moved: usize, goal: usize },
    /// 源端批量读取返回错误。
    #[error("源端读取失败，已搬运 {moved} 字节")]
    Read { moved: usize },
    /// 目标端接收的字节少于提交量。
    #[error("目标端拒绝写入，已搬运 {moved} 字节")]
    Write { moved: usize },
    /// 端点永久耗尽，未达到请求字节数。
    #[error("搬运提前结束：完成 {moved}/{goal} 字节")]
    Short { moved: usize, goal: usize },
}

impl TransferError {
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::TimedOut { .. } => codes::TIMED_OUT,
            TransferError::Read { .. } => codes::READ_FAILED,
            TransferError::Write { .. } => codes::WRITE_FAILED,
            TransferError::Short { .. } => codes::SHORT_TRANSFER,
        }
    }

    /// 失败前已经写入目标端的字节数。
    pub fn moved(&self) -> usize {
        match *self {
            TransferError::TimedOut { moved, .. }
            | TransferError::Read { moved }
            | TransferError::Write { moved }
            | TransferError::Short { moved, .. } => moved,
        }
    }
}

/// 调度器拒绝登记回调。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("一次性回调队列已满（上限 {capacity}）")]
    QueueFull { capacity: usize },
}

impl ScheduleError {
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::QueueFull { .. } => codes::SCHEDULE_QUEUE_FULL,
        }
    }
}

/// 配置加载失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置解析失败: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("配置项 `{field}` 非法: {reason}")]
    Invalid {
        field: &'static str,
        reason: Cow<'static, str>,
    },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Parse(_) => codes::CONFIG_PARSE,
            ConfigError::Invalid { .. } => codes::CONFIG_INVALID,
        }
    }
}

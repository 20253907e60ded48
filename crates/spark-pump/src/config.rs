//! 搬运引擎的静态配置。
//!
//! # 契约说明（What）
//! - 所有字段都有默认值，TOML 中缺省的键沿用默认；未知键视为错误；
//! - `staging_capacity` 受栈上中转缓冲大小 [`STAGING_CAPACITY`] 约束；
//! - 解析后立即校验，返回的配置一定可以直接交给 [`StreamPump`](crate::StreamPump) 与
//!   [`Scheduler`](crate::Scheduler)。

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::pump::STAGING_CAPACITY;
use crate::schedule::SCHEDULED_FN_MAX_COUNT;

/// 默认空闲超时（毫秒）。
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PumpConfig {
    /// `TransferTimeout::Default` 对应的空闲期限。
    pub idle_timeout_ms: u64,
    /// 常规分块策略每轮最多搬运的字节数。
    pub staging_capacity: usize,
    /// 调度器一次性回调队列的上限。
    pub scheduled_fn_max_count: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            staging_capacity: STAGING_CAPACITY,
            scheduled_fn_max_count: SCHEDULED_FN_MAX_COUNT,
        }
    }
}

impl PumpConfig {
    /// 从 TOML 文本解析并校验配置。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.staging_capacity == 0 || self.staging_capacity > STAGING_CAPACITY {
            return Err(ConfigError::Invalid {
                field: "staging_capacity",
                reason: format!(
                    "取值 {} 超出范围 1..={STAGING_CAPACITY}",
                    self.staging_capacity
                )
                .into(),
            });
        }
        if self.scheduled_fn_max_count == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduled_fn_max_count",
                reason: "至少需要容纳一个回调".into(),
            });
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

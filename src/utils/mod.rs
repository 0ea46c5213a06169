//! 工具函数模块
//!
//! 提供计时显示格式化、时钟抽象、宽松字段解析等通用工具函数

pub mod lenient;
pub mod time_format;

pub use lenient::{deserialize_opt_epoch_seconds, deserialize_opt_id};
pub use time_format::{format_elapsed, format_elapsed_f64};

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// 时钟抽象（秒级 Unix 时间戳）
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> i64;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// 手动时钟，测试与回放时使用
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now_epoch_seconds: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now_epoch_seconds)),
        }
    }

    /// 设置当前时间
    pub fn set(&self, now_epoch_seconds: i64) {
        self.now.store(now_epoch_seconds, Ordering::SeqCst);
    }

    /// 时间前进若干秒
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_seconds(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// 获取当前时间戳（秒）
pub fn current_epoch_seconds() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();

        clock.advance(25);
        assert_eq!(other.now_epoch_seconds(), 1_025);

        other.set(50);
        assert_eq!(clock.now_epoch_seconds(), 50);
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2024-01-01 之后
        assert!(SystemClock.now_epoch_seconds() > 1_704_067_200);
    }
}

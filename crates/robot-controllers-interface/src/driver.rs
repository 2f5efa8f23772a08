//! 周期驱动 - 固定频率调用 `ControllerManager::update()`
//!
//! # 核心功能
//!
//! - **精确定时**: 使用 `spin_sleep` 实现低抖动延时，按绝对截止时间推进，不累积漂移
//! - **单调时间**: `time` 为自循环开始起的单调时间，`dt` 为两次调用的间隔
//! - **dt 钳位**: 系统卡顿导致 `dt` 异常大时钳位并告警
//! - **协作退出**: 外部设置 `stop` 标志后在下一个周期退出
//!
//! # 使用场景
//!
//! ```rust,no_run
//! use robot_controllers_interface::{ControllerManager, LoopConfig, run_update_loop};
//! use std::sync::atomic::AtomicBool;
//!
//! let manager = ControllerManager::new();
//! let stop = AtomicBool::new(false);
//! let config = LoopConfig {
//!     frequency_hz: 500.0,
//!     max_iterations: Some(1000),
//!     ..Default::default()
//! };
//! let stats = run_update_loop(&manager, &config, &stop, |_dt| {}).unwrap();
//! println!("ran {} cycles", stats.iterations);
//! ```

use crate::manager::ControllerManager;
use spin_sleep::SpinSleeper;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// 驱动配置错误
#[derive(Error, Debug, PartialEq)]
pub enum LoopConfigError {
    #[error("Invalid frequency_hz: {0} (must be > 0)")]
    InvalidFrequency(f64),

    #[error("Invalid dt_clamp_multiplier: {0} (must be > 0)")]
    InvalidClampMultiplier(f64),

    /// 周期或 dt 上限无法表示为非零 `Duration`
    #[error("{what} out of range: {seconds} s")]
    DurationOutOfRange { what: &'static str, seconds: f64 },
}

/// 控制循环配置
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// 控制频率（Hz）
    ///
    /// 例如：100.0 表示 100Hz（10ms 周期）
    pub frequency_hz: f64,

    /// dt 钳位倍数
    ///
    /// 实际 dt 超过标称周期的此倍数时钳位。
    pub dt_clamp_multiplier: f64,

    /// 最大迭代次数（None 表示直到 stop 标志被设置）
    pub max_iterations: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            frequency_hz: 100.0,      // 默认 100Hz
            dt_clamp_multiplier: 2.0, // 默认 2x
            max_iterations: None,     // 默认无限循环
        }
    }
}

impl LoopConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), LoopConfigError> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(LoopConfigError::InvalidFrequency(self.frequency_hz));
        }
        if !self.dt_clamp_multiplier.is_finite() || self.dt_clamp_multiplier <= 0.0 {
            return Err(LoopConfigError::InvalidClampMultiplier(
                self.dt_clamp_multiplier,
            ));
        }
        self.max_dt()?;
        if self.frequency_hz > 10000.0 {
            tracing::warn!(
                "Very high control frequency: {} Hz. This may cause performance issues.",
                self.frequency_hz
            );
        }
        Ok(())
    }

    /// 标称周期
    pub fn period(&self) -> Result<Duration, LoopConfigError> {
        nonzero_duration("period", 1.0 / self.frequency_hz)
    }

    /// dt 上限
    pub fn max_dt(&self) -> Result<Duration, LoopConfigError> {
        let period = self.period()?;
        nonzero_duration("max_dt", period.as_secs_f64() * self.dt_clamp_multiplier)
    }
}

fn nonzero_duration(what: &'static str, seconds: f64) -> Result<Duration, LoopConfigError> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(LoopConfigError::DurationOutOfRange { what, seconds }),
    }
}

/// 循环统计
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopStats {
    /// 完成的周期数
    pub iterations: u64,
    /// dt 被钳位的次数
    pub clamped: u64,
    /// 周期超时（错过截止时间）的次数
    pub overruns: u64,
}

/// 运行周期驱动
///
/// 阻塞直到 `stop` 被设置或达到 `max_iterations`。
/// 每个周期先调用 `before_update(dt)`（例如推进仿真硬件），再调用 `manager.update()`。
///
/// # 时间处理
///
/// - 第一个周期的 `dt` 为标称周期
/// - `dt > max_dt` 时钳位，`time` 仍为真实单调时间
pub fn run_update_loop<F>(
    manager: &ControllerManager,
    config: &LoopConfig,
    stop: &AtomicBool,
    mut before_update: F,
) -> Result<LoopStats, LoopConfigError>
where
    F: FnMut(Duration),
{
    config.validate()?;

    let period = config.period()?;
    let max_dt = config.max_dt()?;
    let sleeper = SpinSleeper::default();

    let start = Instant::now();
    let mut last = start;
    let mut deadline = start;
    let mut stats = LoopStats::default();

    tracing::info!(
        frequency_hz = config.frequency_hz,
        max_iterations = ?config.max_iterations,
        "Update loop started"
    );

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        if let Some(max_iter) = config.max_iterations
            && stats.iterations >= max_iter
        {
            break;
        }

        // 1. 计算 time / dt
        let now = Instant::now();
        let mut dt = if stats.iterations == 0 {
            period
        } else {
            now - last
        };

        // 2. dt 钳位
        if dt > max_dt {
            tracing::warn!(?dt, ?max_dt, "Update loop time jump, clamping dt");
            dt = max_dt;
            stats.clamped += 1;
        }

        // 3. 推进硬件 + update
        before_update(dt);
        manager.update(now - start, dt);

        last = now;
        stats.iterations += 1;

        // 4. 休眠到下一个截止时间
        deadline += period;
        let after = Instant::now();
        if after < deadline {
            sleeper.sleep(deadline - after);
        } else {
            stats.overruns += 1;
            // 错过截止时间：从当前时刻重新对齐，避免追赶式突发
            deadline = after;
        }
    }

    tracing::info!(
        iterations = stats.iterations,
        clamped = stats.clamped,
        overruns = stats.overruns,
        "Update loop stopped"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_config_default() {
        let config = LoopConfig::default();
        assert_eq!(config.frequency_hz, 100.0);
        assert_eq!(config.dt_clamp_multiplier, 2.0);
        assert_eq!(config.max_iterations, None);
        assert_eq!(config.period(), Ok(Duration::from_millis(10)));
        assert_eq!(config.max_dt(), Ok(Duration::from_millis(20)));
    }

    #[test]
    fn test_loop_config_validation() {
        let bad_freq = LoopConfig {
            frequency_hz: 0.0,
            ..Default::default()
        };
        assert_eq!(
            bad_freq.validate(),
            Err(LoopConfigError::InvalidFrequency(0.0))
        );

        let bad_clamp = LoopConfig {
            dt_clamp_multiplier: -1.0,
            ..Default::default()
        };
        assert_eq!(
            bad_clamp.validate(),
            Err(LoopConfigError::InvalidClampMultiplier(-1.0))
        );

        let nan = LoopConfig {
            frequency_hz: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_loop_config_unrepresentable_durations() {
        let slow = LoopConfig {
            frequency_hz: 1e-20,
            ..Default::default()
        };
        assert!(matches!(
            slow.validate(),
            Err(LoopConfigError::DurationOutOfRange { what: "period", .. })
        ));

        let huge_clamp = LoopConfig {
            frequency_hz: 1.0,
            dt_clamp_multiplier: 1e20,
            ..Default::default()
        };
        assert!(matches!(
            huge_clamp.validate(),
            Err(LoopConfigError::DurationOutOfRange { what: "max_dt", .. })
        ));
        assert!(huge_clamp.max_dt().is_err());

        let tiny_clamp = LoopConfig {
            dt_clamp_multiplier: 1e-300,
            ..Default::default()
        };
        assert!(tiny_clamp.validate().is_err());

        let fast = LoopConfig {
            frequency_hz: 1e300,
            ..Default::default()
        };
        assert!(fast.validate().is_err());

        let manager = ControllerManager::new();
        let stop = AtomicBool::new(false);
        assert!(run_update_loop(&manager, &slow, &stop, |_| {}).is_err());
        assert_eq!(manager.metrics().cycles_total, 0);
    }

    #[test]
    fn test_runs_max_iterations() {
        let manager = ControllerManager::new();
        let stop = AtomicBool::new(false);
        let config = LoopConfig {
            frequency_hz: 1000.0,
            dt_clamp_multiplier: 1000.0,
            max_iterations: Some(20),
        };

        let mut dts = Vec::new();
        let stats = run_update_loop(&manager, &config, &stop, |dt| dts.push(dt)).unwrap();

        assert_eq!(stats.iterations, 20);
        assert_eq!(dts.len(), 20);
        assert_eq!(dts[0], Duration::from_millis(1));
        assert_eq!(manager.metrics().cycles_total, 20);
        assert_eq!(manager.metrics().clock_regressions, 0);
    }

    #[test]
    fn test_stop_flag_exits_immediately() {
        let manager = ControllerManager::new();
        let stop = AtomicBool::new(true);
        let stats = run_update_loop(&manager, &LoopConfig::default(), &stop, |_| {}).unwrap();
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let manager = ControllerManager::new();
        let stop = AtomicBool::new(false);
        let config = LoopConfig {
            frequency_hz: -5.0,
            ..Default::default()
        };
        assert!(run_update_loop(&manager, &config, &stop, |_| {}).is_err());
        assert_eq!(manager.metrics().cycles_total, 0);
    }
}

//! PID - 单轴比例-积分-微分控制
//!
//! # 算法
//!
//! ```text
//! output = Kp * e + Ki * ∫e dt + Kd * de/dt
//! ```
//!
//! - **积分饱和保护**: 积分项钳位到 `[-integral_limit, integral_limit]`
//! - **输出限幅**: 输出钳位到 `[-output_limit, output_limit]`
//! - **时间跳变**: 只重置微分项，保留积分项

use robot_controllers_interface::{ControllerError, ControllerParams};
use std::time::Duration;

/// PID 增益与限幅
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    /// 比例增益 (Kp)
    pub kp: f64,
    /// 积分增益 (Ki)
    pub ki: f64,
    /// 微分增益 (Kd)
    pub kd: f64,
    /// 积分项限制
    pub integral_limit: f64,
    /// 输出限制
    pub output_limit: f64,
}

impl Default for PidGains {
    /// Kp = Ki = Kd = 0（需要配置），积分限制 10.0，输出限制 100.0
    fn default() -> Self {
        Self {
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            integral_limit: 10.0,
            output_limit: 100.0,
        }
    }
}

impl PidGains {
    /// 从参数段读取（`kp` / `ki` / `kd` / `integral_limit` / `output_limit`，均可选）
    ///
    /// 限幅必须为非负数。
    pub fn from_params(params: &ControllerParams) -> Result<Self, ControllerError> {
        let defaults = Self::default();
        let gains = Self {
            kp: params.f64_or("kp", defaults.kp)?,
            ki: params.f64_or("ki", defaults.ki)?,
            kd: params.f64_or("kd", defaults.kd)?,
            integral_limit: params.f64_or("integral_limit", defaults.integral_limit)?,
            output_limit: params.f64_or("output_limit", defaults.output_limit)?,
        };

        for (key, value) in [
            ("kp", gains.kp),
            ("ki", gains.ki),
            ("kd", gains.kd),
        ] {
            if !value.is_finite() {
                return Err(ControllerError::invalid_parameter(key, "must be finite"));
            }
        }
        for (key, value) in [
            ("integral_limit", gains.integral_limit),
            ("output_limit", gains.output_limit),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ControllerError::invalid_parameter(key, "must be >= 0"));
            }
        }
        Ok(gains)
    }
}

/// 单轴 PID 状态
#[derive(Debug, Clone, Default)]
pub struct Pid {
    gains: PidGains,

    /// 积分项累积值
    integral: f64,

    /// 上一次的误差（None 表示没有历史，微分项为 0）
    last_error: Option<f64>,
}

impl Pid {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            last_error: None,
        }
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    /// 当前积分项（用于调试和监控）
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// 计算一步输出
    ///
    /// `dt` 为 0 时返回 0 且不改变内部状态。
    pub fn tick(&mut self, error: f64, dt: Duration) -> f64 {
        let dt_sec = dt.as_secs_f64();
        if dt_sec <= 0.0 {
            return 0.0;
        }
        let g = &self.gains;

        // 1. 比例项
        let p_term = g.kp * error;

        // 2. 积分项 + 饱和保护
        self.integral = (self.integral + error * dt_sec).clamp(-g.integral_limit, g.integral_limit);
        let i_term = g.ki * self.integral;

        // 3. 微分项（第一步没有历史误差）
        let d_term = match self.last_error {
            Some(last) => g.kd * (error - last) / dt_sec,
            None => 0.0,
        };
        self.last_error = Some(error);

        (p_term + i_term + d_term).clamp(-g.output_limit, g.output_limit)
    }

    /// 时间跳变：只重置微分项
    ///
    /// 积分项可能正在对抗重力，清零会导致关节下坠。
    pub fn on_time_jump(&mut self) {
        self.last_error = None;
    }

    /// 完全重置
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gains(kp: f64, ki: f64, kd: f64) -> PidGains {
        PidGains {
            kp,
            ki,
            kd,
            ..Default::default()
        }
    }

    #[test]
    fn test_gains_default() {
        let g = PidGains::default();
        assert_eq!(g.kp, 0.0);
        assert_eq!(g.integral_limit, 10.0);
        assert_eq!(g.output_limit, 100.0);
    }

    #[test]
    fn test_gains_from_params() {
        let params = ControllerParams::new()
            .with("kp", 10)
            .with("kd", 0.5)
            .with("output_limit", 20.0);
        let g = PidGains::from_params(&params).unwrap();
        assert_eq!(g.kp, 10.0);
        assert_eq!(g.ki, 0.0);
        assert_eq!(g.kd, 0.5);
        assert_eq!(g.integral_limit, 10.0);
        assert_eq!(g.output_limit, 20.0);
    }

    #[test]
    fn test_gains_rejects_bad_values() {
        let params = ControllerParams::new().with("output_limit", -1.0);
        assert!(matches!(
            PidGains::from_params(&params),
            Err(ControllerError::InvalidParameter { ref name, .. }) if name == "output_limit"
        ));

        let params = ControllerParams::new().with("kp", "fast");
        assert!(PidGains::from_params(&params).is_err());
    }

    #[test]
    fn test_proportional_only() {
        let mut pid = Pid::new(gains(10.0, 0.0, 0.0));
        let output = pid.tick(0.5, Duration::from_millis(10));
        assert!((output - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_integral_accumulation() {
        let mut pid = Pid::new(gains(0.0, 1.0, 0.0));
        let dt = Duration::from_millis(100);

        // 积分 = 0.5 * 0.1 = 0.05
        assert!((pid.tick(0.5, dt) - 0.05).abs() < 1e-10);
        // 积分 = 0.05 + 0.05 = 0.1
        assert!((pid.tick(0.5, dt) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn test_integral_saturation() {
        let mut pid = Pid::new(PidGains {
            ki: 1.0,
            integral_limit: 0.5,
            ..Default::default()
        });
        for _ in 0..10 {
            pid.tick(1.0, Duration::from_secs(1));
        }
        assert!((pid.integral() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_derivative_needs_history() {
        let mut pid = Pid::new(gains(0.0, 0.0, 1.0));
        let dt = Duration::from_millis(100);

        // 第一步没有历史误差
        assert_eq!(pid.tick(0.5, dt), 0.0);
        // 误差 0.5 → 0.3，变化率 -2.0
        assert!((pid.tick(0.3, dt) + 2.0).abs() < 1e-10);
        // 误差不变
        assert!(pid.tick(0.3, dt).abs() < 1e-10);
    }

    #[test]
    fn test_output_clamping() {
        let mut pid = Pid::new(PidGains {
            kp: 100.0,
            output_limit: 50.0,
            ..Default::default()
        });
        assert_eq!(pid.tick(100.0, Duration::from_millis(10)), 50.0);
        assert_eq!(pid.tick(-100.0, Duration::from_millis(10)), -50.0);
    }

    #[test]
    fn test_time_jump_preserves_integral() {
        let mut pid = Pid::new(gains(0.0, 1.0, 1.0));
        pid.tick(0.5, Duration::from_secs(1));
        let before = pid.integral();
        assert!(before > 0.0);

        pid.on_time_jump();
        assert_eq!(pid.integral(), before);
        assert!(pid.last_error.is_none());
    }

    #[test]
    fn test_reset() {
        let mut pid = Pid::new(gains(1.0, 1.0, 1.0));
        pid.tick(0.5, Duration::from_secs(1));
        pid.reset();
        assert_eq!(pid.integral(), 0.0);
        assert!(pid.last_error.is_none());
    }

    #[test]
    fn test_zero_dt() {
        let mut pid = Pid::new(gains(10.0, 1.0, 1.0));
        assert_eq!(pid.tick(0.5, Duration::ZERO), 0.0);
        assert_eq!(pid.integral(), 0.0);
    }
}

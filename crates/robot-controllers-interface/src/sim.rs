//! 仿真关节
//!
//! 无硬件依赖的 [`JointHandle`] 实现，用于测试和仿真台架。
//! 所有状态存放在原子量中，控制线程写命令、其他线程读状态都不需要加锁。
//!
//! # 积分模型
//!
//! `step(dt)` 按最近一次命令推进状态：
//! - 位置命令：位置直接跳到目标，速度取前馈值
//! - 速度命令：按速度积分位置
//! - 力矩命令：按单位惯量积分速度，再积分位置
//!
//! 非连续关节的位置会被钳位到 `[min, max]`，撞到限位时速度清零。
//! 无序的限位（`min > max` 或含 NaN）不参与钳位，关节按无限位推进。

use crate::handle::{Handle, JointHandle};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

/// 以 `AtomicU64` 存储的 f64
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// 命令模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandMode {
    /// 无命令（本周期没有控制器写入）
    None = 0,
    Position = 1,
    Velocity = 2,
    Effort = 3,
}

impl CommandMode {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Position,
            2 => Self::Velocity,
            3 => Self::Effort,
            _ => Self::None,
        }
    }
}

/// 仿真关节
#[derive(Debug)]
pub struct SimulatedJoint {
    name: String,
    min: f64,
    max: f64,
    continuous: bool,

    position: AtomicF64,
    velocity: AtomicF64,
    effort: AtomicF64,

    mode: AtomicU8,
    cmd_position: AtomicF64,
    cmd_velocity: AtomicF64,
    cmd_effort: AtomicF64,
}

impl SimulatedJoint {
    /// 创建无限位的仿真关节（初始位置 0）
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            continuous: false,
            position: AtomicF64::new(0.0),
            velocity: AtomicF64::new(0.0),
            effort: AtomicF64::new(0.0),
            mode: AtomicU8::new(CommandMode::None as u8),
            cmd_position: AtomicF64::new(0.0),
            cmd_velocity: AtomicF64::new(0.0),
            cmd_effort: AtomicF64::new(0.0),
        }
    }

    /// 设置位置限位
    ///
    /// 不做校验；无序的限位由 [`JointHandle::limits_ordered`] 报告。
    pub fn with_limits(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// 标记为连续关节（忽略限位）
    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    /// 设置初始位置
    pub fn with_position(self, position: f64) -> Self {
        self.position.store(position);
        self
    }

    /// 当前命令模式
    pub fn command_mode(&self) -> CommandMode {
        CommandMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// 最近一次命令 `(position, velocity, effort)`
    pub fn command(&self) -> (f64, f64, f64) {
        (
            self.cmd_position.load(),
            self.cmd_velocity.load(),
            self.cmd_effort.load(),
        )
    }

    /// 按最近一次命令推进一个仿真步
    pub fn step(&self, dt: Duration) {
        let dt = dt.as_secs_f64();
        let mut position = self.position.load();
        let mut velocity = self.velocity.load();

        match self.command_mode() {
            CommandMode::None => {
                velocity = 0.0;
                self.effort.store(0.0);
            },
            CommandMode::Position => {
                position = self.cmd_position.load();
                velocity = self.cmd_velocity.load();
                self.effort.store(self.cmd_effort.load());
            },
            CommandMode::Velocity => {
                velocity = self.cmd_velocity.load();
                position += velocity * dt;
                self.effort.store(self.cmd_effort.load());
            },
            CommandMode::Effort => {
                let effort = self.cmd_effort.load();
                velocity += effort * dt;
                position += velocity * dt;
                self.effort.store(effort);
            },
        }

        if !self.continuous && self.limits_ordered() {
            let clamped = position.clamp(self.min, self.max);
            if clamped != position {
                velocity = 0.0;
            }
            position = clamped;
        }

        self.position.store(position);
        self.velocity.store(velocity);
    }

    fn command_with(&self, mode: CommandMode, position: f64, velocity: f64, effort: f64) {
        self.cmd_position.store(position);
        self.cmd_velocity.store(velocity);
        self.cmd_effort.store(effort);
        self.mode.store(mode as u8, Ordering::Release);
    }
}

impl Handle for SimulatedJoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self) {
        self.mode.store(CommandMode::None as u8, Ordering::Release);
    }
}

impl JointHandle for SimulatedJoint {
    fn position(&self) -> f64 {
        self.position.load()
    }

    fn velocity(&self) -> f64 {
        self.velocity.load()
    }

    fn effort(&self) -> f64 {
        self.effort.load()
    }

    fn set_position(&self, position: f64, velocity: f64, effort: f64) {
        self.command_with(CommandMode::Position, position, velocity, effort);
    }

    fn set_velocity(&self, velocity: f64, effort: f64) {
        self.command_with(CommandMode::Velocity, self.position.load(), velocity, effort);
    }

    fn set_effort(&self, effort: f64) {
        self.command_with(CommandMode::Effort, self.position.load(), 0.0, effort);
    }

    fn position_min(&self) -> f64 {
        self.min
    }

    fn position_max(&self) -> f64 {
        self.max
    }

    fn is_continuous(&self) -> bool {
        self.continuous
    }
}

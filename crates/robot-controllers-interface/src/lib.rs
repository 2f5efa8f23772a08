//! # Robot Controllers Interface
//!
//! 机器人控制器管理器：注册关节句柄、加载控制器、仲裁启动/停止请求，
//! 并在实时控制循环中 update 运行中的控制器。
//!
//! ## 核心概念
//!
//! - **关节句柄**（[`JointHandle`]）：一个可控/可测自由度，由管理器独占
//! - **控制器**（[`Controller`]）：声明占用的关节，运行时周期计算并下发命令
//! - **加载器**（[`ControllerLoader`]）：独占一个控制器，屏蔽具体类型
//! - **管理器**（[`ControllerManager`]）：资源仲裁 + 周期 update
//!
//! ## 仲裁规则
//!
//! 同一关节在任意时刻至多被一个运行中的控制器占用。
//! 冲突的启动请求直接失败（不抢占），调用方必须先停止占用者。
//!
//! ## 包含模块
//!
//! - `config` - TOML 配置与控制器参数
//! - `controller` - 控制器接口与状态
//! - `driver` - 固定频率周期驱动
//! - `error` - 错误类型与整数状态码
//! - `handle` / `joint` - 句柄接口与关节注册表
//! - `loader` - 加载器与构造设施
//! - `manager` - 管理器
//! - `metrics` - 原子计数器
//! - `sim` - 仿真关节

pub mod config;
pub mod controller;
pub mod driver;
mod error;
pub mod handle;
pub mod joint;
pub mod loader;
pub mod manager;
pub mod metrics;
pub mod sim;

// 重新导出常用类型
pub use config::{ConfigError, ControllerParams, ManagerConfig, UpdateFailurePolicy};
pub use controller::{AtomicControllerState, Controller, ControllerState};
pub use driver::{LoopConfig, LoopConfigError, LoopStats, run_update_loop};
pub use error::{ControllerError, ManagerError, StatusCode, StatusExt};
pub use handle::{Handle, JointHandle};
pub use joint::{JointId, JointRegistry};
pub use loader::{
    ControllerConstructor, ControllerFactory, ControllerLoader, ControllerRegistry, UpdateOutcome,
};
pub use manager::{ControllerManager, HandleRef};
pub use metrics::{ManagerMetrics, MetricsSnapshot};
pub use sim::{CommandMode, SimulatedJoint};

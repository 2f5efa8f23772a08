//! Controller trait - 控制器能力接口
//!
//! 管理器只依赖此接口，不关心具体控制器类型。
//!
//! # 生命周期
//!
//! ```text
//! 构造 ──> Initialized ──start()──> Running ──stop()──> Stopped
//!                                     ^                   │
//!                                     └─────start()───────┘
//! ```
//!
//! - **构造**: 由 [`ControllerConstructor`](crate::loader::ControllerConstructor) 完成，
//!   此时必须确定声明的资源（`claimed_names()`）
//! - **start**: 解析关节令牌，可以拒绝启动
//! - **update**: 仅在 Running 状态下由控制线程周期调用
//! - **stop**: 释放资源占用，不会失败
//!
//! # 关节访问
//!
//! 控制器不拥有关节。`start()` 和 `update()` 都会收到管理器的
//! [`JointRegistry`]，控制器只保存 [`JointId`](crate::joint::JointId) 令牌。
//!
//! # 示例
//!
//! ```rust
//! use robot_controllers_interface::{Controller, ControllerError, JointId, JointRegistry};
//! use std::time::Duration;
//!
//! struct Hold {
//!     joint: String,
//!     id: Option<JointId>,
//!     hold_at: f64,
//! }
//!
//! impl Controller for Hold {
//!     fn type_name(&self) -> &str {
//!         "example/Hold"
//!     }
//!
//!     fn claimed_names(&self) -> Vec<String> {
//!         vec![self.joint.clone()]
//!     }
//!
//!     fn start(&mut self, joints: &JointRegistry) -> Result<(), ControllerError> {
//!         let id = joints
//!             .id(&self.joint)
//!             .ok_or_else(|| ControllerError::MissingJoint(self.joint.clone()))?;
//!         self.hold_at = joints.joint(id).position();
//!         self.id = Some(id);
//!         Ok(())
//!     }
//!
//!     fn update(
//!         &mut self,
//!         _time: Duration,
//!         _dt: Duration,
//!         joints: &JointRegistry,
//!     ) -> Result<(), ControllerError> {
//!         if let Some(id) = self.id {
//!             joints.joint(id).set_position(self.hold_at, 0.0, 0.0);
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::ControllerError;
use crate::joint::JointRegistry;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

/// 控制器能力接口
///
/// # 线程安全
///
/// 控制器会在请求线程（start/stop）和控制线程（update）之间移动，
/// 因此要求 `Send`；管理器负责互斥，不要求 `Sync`。
pub trait Controller: Send {
    /// 控制器类型名（如 `robot_controllers/JointPosition`）
    fn type_name(&self) -> &str;

    /// 声明占用的资源名
    ///
    /// 加载时读取一次，之后不再变化。
    fn claimed_names(&self) -> Vec<String>;

    /// 启动钩子
    ///
    /// 返回错误时管理器拒绝启动，状态保持不变。
    fn start(&mut self, _joints: &JointRegistry) -> Result<(), ControllerError> {
        Ok(())
    }

    /// 停止钩子
    fn stop(&mut self, _joints: &JointRegistry) {}

    /// 重置内部状态（积分项等）
    fn reset(&mut self) {}

    /// 计算并下发一步控制命令
    ///
    /// # 性能要求
    ///
    /// 在实时控制线程中调用：禁止阻塞，尽量避免分配。
    ///
    /// # 错误
    ///
    /// 返回错误时由管理器按 [`UpdateFailurePolicy`](crate::config::UpdateFailurePolicy) 处理。
    fn update(
        &mut self,
        time: Duration,
        dt: Duration,
        joints: &JointRegistry,
    ) -> Result<(), ControllerError>;
}

/// 控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ControllerState {
    /// 已加载，从未启动
    #[default]
    Initialized = 0,

    /// 运行中（每周期被 update）
    Running = 1,

    /// 已停止
    Stopped = 2,
}

impl ControllerState {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Stopped（保守地视为不运行）。
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initialized,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否在运行
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.pad(s)
    }
}

/// 控制器状态（原子版本，用于线程间共享）
///
/// 控制线程读取状态决定是否 update；请求线程通过 `set()` / `compare_exchange()` 切换。
#[derive(Debug)]
pub struct AtomicControllerState {
    inner: AtomicU8,
}

impl AtomicControllerState {
    /// 创建新的原子状态
    pub fn new(state: ControllerState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    /// 获取当前状态
    pub fn get(&self, ordering: Ordering) -> ControllerState {
        ControllerState::from_u8(self.inner.load(ordering))
    }

    /// 设置状态
    pub fn set(&self, state: ControllerState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }

    /// 比较并交换（Compare-and-Swap）
    ///
    /// 如果当前值等于 `current`，则设置为 `new` 并返回 true，否则返回 false。
    pub fn compare_exchange(
        &self,
        current: ControllerState,
        new: ControllerState,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }
}

impl Default for AtomicControllerState {
    fn default() -> Self {
        Self::new(ControllerState::Initialized)
    }
}

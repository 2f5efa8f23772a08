//! 控制器加载器
//!
//! [`ControllerLoader`] 独占一个控制器实例，向管理器暴露统一的
//! 名称 / 资源声明 / 状态查询 / 生命周期调用，管理器不需要知道具体类型。
//!
//! 控制器的构造由外部的 [`ControllerConstructor`] 完成（按类型名构造），
//! [`ControllerRegistry`] 是基于闭包表的默认实现。
//!
//! # 锁模型
//!
//! - 运行状态存放在 [`AtomicControllerState`] 中，控制线程无锁读取
//! - 控制器实例放在 `parking_lot::Mutex` 中：
//!   - 请求线程（start/stop/reset）阻塞加锁，持锁时间仅为一次钩子调用
//!   - 控制线程只使用 `try_lock()`，拿不到锁就跳过本周期，绝不阻塞

use crate::config::{ControllerParams, UpdateFailurePolicy};
use crate::controller::{AtomicControllerState, Controller, ControllerState};
use crate::error::ControllerError;
use crate::handle::Handle;
use crate::joint::JointRegistry;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// 按类型名构造控制器的外部设施
pub trait ControllerConstructor: Send + Sync {
    /// 构造控制器
    ///
    /// # 参数
    ///
    /// - `type_name`: 控制器类型名
    /// - `name`: 控制器实例名
    /// - `params`: 该实例的不透明参数段
    fn construct(
        &self,
        type_name: &str,
        name: &str,
        params: &ControllerParams,
    ) -> Result<Box<dyn Controller>, ControllerError>;
}

/// 控制器工厂闭包
pub type ControllerFactory =
    Box<dyn Fn(&str, &ControllerParams) -> Result<Box<dyn Controller>, ControllerError> + Send + Sync>;

/// 基于类型名 → 工厂闭包的控制器注册表
///
/// # 示例
///
/// ```rust
/// use robot_controllers_interface::{ControllerConstructor, ControllerParams, ControllerRegistry};
///
/// let registry = ControllerRegistry::new();
/// assert!(registry.construct("missing/Type", "c", &ControllerParams::new()).is_err());
/// ```
#[derive(Default)]
pub struct ControllerRegistry {
    factories: HashMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册控制器类型
    ///
    /// 同名类型会被覆盖，返回 true 表示发生了覆盖。
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&str, &ControllerParams) -> Result<Box<dyn Controller>, ControllerError>
            + Send
            + Sync
            + 'static,
    {
        let type_name = type_name.into();
        let replaced = self.factories.insert(type_name.clone(), Box::new(factory)).is_some();
        if replaced {
            tracing::warn!(controller_type = %type_name, "Controller type re-registered");
        }
        replaced
    }

    /// 是否注册了某个类型
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// 已注册的类型名（字典序）
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl ControllerConstructor for ControllerRegistry {
    fn construct(
        &self,
        type_name: &str,
        name: &str,
        params: &ControllerParams,
    ) -> Result<Box<dyn Controller>, ControllerError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| ControllerError::UnknownType(type_name.to_string()))?;
        factory(name, params)
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

/// 单次 update 的结果
#[derive(Debug)]
pub enum UpdateOutcome {
    /// 控制器不在运行，未调用
    Idle,

    /// 正常完成
    Updated,

    /// 控制器槽位被请求线程占用，本周期跳过
    Skipped,

    /// update 返回错误
    Failed {
        error: ControllerError,
        /// 是否已按策略停止该控制器
        halted: bool,
    },
}

/// 控制器加载器
pub struct ControllerLoader {
    name: String,
    type_name: String,
    /// 声明的资源（排序、去重）
    claims: SmallVec<[String; 4]>,
    state: AtomicControllerState,
    controller: Mutex<Box<dyn Controller>>,
}

impl ControllerLoader {
    /// 包装一个已构造的控制器
    ///
    /// 资源声明在此时读取并固定。
    pub fn new(name: impl Into<String>, controller: Box<dyn Controller>) -> Self {
        let mut claims: SmallVec<[String; 4]> = controller.claimed_names().into_iter().collect();
        claims.sort_unstable();
        claims.dedup();

        Self {
            name: name.into(),
            type_name: controller.type_name().to_string(),
            claims,
            state: AtomicControllerState::new(ControllerState::Initialized),
            controller: Mutex::new(controller),
        }
    }

    /// 通过构造设施加载控制器
    ///
    /// 参数段缺少 `type` 字段时返回 `InvalidParameter`。
    pub fn load(
        name: &str,
        params: &ControllerParams,
        constructor: &dyn ControllerConstructor,
    ) -> Result<Self, ControllerError> {
        let type_name = params.required_str("type")?;
        let controller = constructor.construct(type_name, name, params)?;
        Ok(Self::new(name, controller))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// 声明的资源（排序、去重）
    pub fn claimed_names(&self) -> &[String] {
        &self.claims
    }

    /// 当前状态
    pub fn state(&self) -> ControllerState {
        self.state.get(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// 与另一个加载器共享的第一个资源（集合求交，与顺序无关）
    pub fn shared_claim<'a>(&'a self, other: &ControllerLoader) -> Option<&'a str> {
        let (mut i, mut j) = (0, 0);
        let (a, b) = (&self.claims, &other.claims);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return Some(&a[i]),
            }
        }
        None
    }

    /// 启动控制器
    ///
    /// 调用方（管理器）负责在仲裁锁内完成冲突检查。
    /// 钩子失败时状态保持不变。
    pub(crate) fn start(&self, joints: &JointRegistry) -> Result<(), ControllerError> {
        let mut controller = self.controller.lock();
        if self.is_running() {
            return Ok(());
        }
        controller.start(joints)?;
        self.state.set(ControllerState::Running, Ordering::Release);
        Ok(())
    }

    /// 停止控制器
    ///
    /// 返回 true 表示控制器之前在运行（确实发生了状态切换）。
    pub(crate) fn stop(&self, joints: &JointRegistry) -> bool {
        let mut controller = self.controller.lock();
        self.halt_locked(controller.as_mut(), joints)
    }

    /// 在已持有控制器锁的情况下停止
    fn halt_locked(&self, controller: &mut dyn Controller, joints: &JointRegistry) -> bool {
        let was_running = self.state.compare_exchange(
            ControllerState::Running,
            ControllerState::Stopped,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if was_running {
            controller.stop(joints);
        }
        was_running
    }

    /// 实时 update
    ///
    /// 只使用 `try_lock()`，不会阻塞在请求线程上。
    pub(crate) fn update(
        &self,
        time: Duration,
        dt: Duration,
        joints: &JointRegistry,
        policy: UpdateFailurePolicy,
    ) -> UpdateOutcome {
        if !self.is_running() {
            return UpdateOutcome::Idle;
        }

        let Some(mut controller) = self.controller.try_lock() else {
            return UpdateOutcome::Skipped;
        };

        // 加锁期间可能已被停止
        if !self.is_running() {
            return UpdateOutcome::Idle;
        }

        match controller.update(time, dt, joints) {
            Ok(()) => UpdateOutcome::Updated,
            Err(error) => {
                let halted = match policy {
                    UpdateFailurePolicy::StopController => {
                        self.halt_locked(controller.as_mut(), joints)
                    },
                    UpdateFailurePolicy::LogAndContinue => false,
                };
                UpdateOutcome::Failed { error, halted }
            },
        }
    }

    /// 重置控制器内部状态（阻塞加锁）
    pub fn reset_controller(&self) {
        self.controller.lock().reset();
    }
}

impl Handle for ControllerLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self) {
        self.reset_controller();
    }
}

impl std::fmt::Debug for ControllerLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerLoader")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("claims", &self.claims)
            .field("state", &self.state())
            .finish()
    }
}

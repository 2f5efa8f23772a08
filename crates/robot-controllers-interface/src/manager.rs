//! 控制器管理器
//!
//! 拥有全部关节句柄和已加载的控制器，负责：
//! - 资源仲裁：同一关节在任意时刻至多被一个运行中的控制器占用
//! - 周期 update：按加载顺序 update 所有运行中的控制器
//!
//! # 仲裁策略
//!
//! 冲突检测是集合求交，与启动顺序无关，没有优先级，也**不会抢占**：
//! 启动请求与运行中的控制器冲突时直接失败，调用方必须先停止冲突的控制器。
//! 在真实机器人上隐式抢占一个正在运行的控制环是不安全的。
//!
//! # 线程模型
//!
//! - `init()` / `add_joint_handle()` / `add_controller()` 需要 `&mut self`，
//!   在控制线程启动前完成
//! - `request_start()` / `request_stop()` 可以从任意线程调用，
//!   通过仲裁锁彼此串行
//! - `update()` 由控制线程周期调用，从不获取仲裁锁，
//!   对控制器槽位只使用 `try_lock()`
//!
//! # 示例
//!
//! ```rust
//! use robot_controllers_interface::{
//!     Controller, ControllerError, ControllerManager, ControllerState, JointRegistry,
//!     ManagerError, SimulatedJoint,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Idle(Vec<String>);
//!
//! impl Controller for Idle {
//!     fn type_name(&self) -> &str {
//!         "example/Idle"
//!     }
//!     fn claimed_names(&self) -> Vec<String> {
//!         self.0.clone()
//!     }
//!     fn update(&mut self, _: Duration, _: Duration, _: &JointRegistry) -> Result<(), ControllerError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut manager = ControllerManager::new();
//! manager.add_joint_handle(Arc::new(SimulatedJoint::new("pan"))).unwrap();
//! manager.add_controller("a", Box::new(Idle(vec!["pan".into()]))).unwrap();
//! manager.add_controller("b", Box::new(Idle(vec!["pan".into()]))).unwrap();
//!
//! manager.request_start("a").unwrap();
//! assert!(matches!(manager.request_start("b"), Err(ManagerError::Conflict { .. })));
//! assert_eq!(manager.controller_state("b"), Some(ControllerState::Initialized));
//! ```

use crate::config::{ControllerParams, ManagerConfig, UpdateFailurePolicy};
use crate::controller::{Controller, ControllerState};
use crate::error::ManagerError;
use crate::handle::{Handle, JointHandle};
use crate::joint::{JointId, JointRegistry};
use crate::loader::{ControllerConstructor, ControllerLoader, UpdateOutcome};
use crate::metrics::{ManagerMetrics, MetricsSnapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 尚未收到过 update 的时间戳哨兵值
const NO_TIMESTAMP: u64 = u64::MAX;

/// `get_handle()` 的查找结果
#[derive(Debug, Clone, Copy)]
pub enum HandleRef<'a> {
    /// 关节句柄
    Joint(&'a Arc<dyn JointHandle>),
    /// 控制器（加载器）
    Controller(&'a ControllerLoader),
}

impl HandleRef<'_> {
    /// 是否为关节
    pub fn is_joint(&self) -> bool {
        matches!(self, Self::Joint(_))
    }
}

impl Handle for HandleRef<'_> {
    fn name(&self) -> &str {
        match self {
            Self::Joint(joint) => joint.name(),
            Self::Controller(loader) => loader.name(),
        }
    }

    fn reset(&self) {
        match self {
            Self::Joint(joint) => joint.reset(),
            Self::Controller(loader) => loader.reset_controller(),
        }
    }
}

/// 控制器管理器
pub struct ControllerManager {
    joints: JointRegistry,
    /// 加载顺序即 update 顺序
    controllers: Vec<ControllerLoader>,
    controller_index: HashMap<String, usize>,

    policy: UpdateFailurePolicy,
    initialized: bool,

    /// 启动/停止请求的仲裁锁（控制线程从不获取）
    arbitration: Mutex<()>,

    /// 上一次 update 的时间戳（纳秒）
    last_time_ns: AtomicU64,
    metrics: ManagerMetrics,
}

impl Default for ControllerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerManager {
    /// 创建空管理器
    pub fn new() -> Self {
        Self {
            joints: JointRegistry::new(),
            controllers: Vec::new(),
            controller_index: HashMap::new(),
            policy: UpdateFailurePolicy::default(),
            initialized: false,
            arbitration: Mutex::new(()),
            last_time_ns: AtomicU64::new(NO_TIMESTAMP),
            metrics: ManagerMetrics::new(),
        }
    }

    /// 启动管理器，加载默认控制器
    ///
    /// 关节句柄应该在调用前通过 `add_joint_handle()` 注册。
    /// 控制器声明了未注册的关节时只记录警告，之后的 `request_start()`
    /// 会以 `MissingResource` 确定性地失败。
    ///
    /// # 原子性
    ///
    /// 任意控制器加载失败时，不提交任何控制器，管理器保持未初始化。
    ///
    /// # 错误
    ///
    /// - `AlreadyInitialized`: 重复调用
    /// - `MissingConfiguration`: 缺少 `default_controllers`、参数段或 `type`
    /// - `DuplicateController`: 控制器名重复
    /// - `ConstructionFailed`: 构造设施无法构造控制器
    pub fn init(
        &mut self,
        config: &ManagerConfig,
        constructor: &dyn ControllerConstructor,
    ) -> Result<(), ManagerError> {
        let result = self.load_defaults(config, constructor);
        if let Err(e) = &result {
            error!(code = e.code(), "Controller manager init failed: {}", e);
        }
        result
    }

    fn load_defaults(
        &mut self,
        config: &ManagerConfig,
        constructor: &dyn ControllerConstructor,
    ) -> Result<(), ManagerError> {
        if self.initialized {
            return Err(ManagerError::AlreadyInitialized);
        }

        let names = config.default_controllers.as_ref().ok_or_else(|| {
            ManagerError::MissingConfiguration("default_controllers".to_string())
        })?;

        let mut loaded: Vec<ControllerLoader> = Vec::with_capacity(names.len());
        for name in names {
            if self.controller_index.contains_key(name)
                || loaded.iter().any(|l| l.name() == name)
            {
                return Err(ManagerError::DuplicateController(name.clone()));
            }
            loaded.push(self.load(name, config.controllers.get(name), constructor)?);
        }

        for loader in loaded {
            self.commit(loader);
        }
        self.policy = config.on_update_error;
        self.initialized = true;

        info!(
            controllers = self.controllers.len(),
            joints = self.joints.len(),
            policy = ?self.policy,
            "Controller manager initialized"
        );
        Ok(())
    }

    /// 加载单个控制器（不提交）
    fn load(
        &self,
        name: &str,
        params: Option<&ControllerParams>,
        constructor: &dyn ControllerConstructor,
    ) -> Result<ControllerLoader, ManagerError> {
        let params = params
            .ok_or_else(|| ManagerError::MissingConfiguration(format!("controllers.{}", name)))?;
        if params.type_name().is_none() {
            return Err(ManagerError::MissingConfiguration(format!(
                "controllers.{}.type",
                name
            )));
        }

        let loader = ControllerLoader::load(name, params, constructor).map_err(|source| {
            ManagerError::ConstructionFailed {
                name: name.to_string(),
                source,
            }
        })?;
        self.warn_unregistered_claims(&loader);

        info!(
            controller = %name,
            controller_type = %loader.type_name(),
            claims = ?loader.claimed_names(),
            "Loaded controller"
        );
        Ok(loader)
    }

    fn warn_unregistered_claims(&self, loader: &ControllerLoader) {
        for claim in loader.claimed_names() {
            if !self.joints.contains(claim) {
                warn!(
                    controller = %loader.name(),
                    joint = %claim,
                    "Controller claims a joint that is not registered; start requests will fail"
                );
            }
        }
    }

    fn commit(&mut self, loader: ControllerLoader) {
        self.controller_index
            .insert(loader.name().to_string(), self.controllers.len());
        self.controllers.push(loader);
    }

    /// 直接加入一个已构造的控制器
    ///
    /// 用于不经过构造设施的嵌入场景（以及测试）。控制器追加在 update 顺序末尾。
    pub fn add_controller(
        &mut self,
        name: impl Into<String>,
        controller: Box<dyn Controller>,
    ) -> Result<(), ManagerError> {
        let name = name.into();
        if self.controller_index.contains_key(&name) {
            return Err(ManagerError::DuplicateController(name));
        }

        let loader = ControllerLoader::new(name, controller);
        self.warn_unregistered_claims(&loader);
        self.commit(loader);
        Ok(())
    }

    /// 请求启动控制器
    ///
    /// 1. 解析名称（不存在 → `ControllerNotFound`）
    /// 2. 已在运行 → 幂等成功
    /// 3. 声明的关节必须都已注册（否则 `MissingResource`）
    /// 4. 与其他运行中控制器的声明求交，非空 → `Conflict`（不抢占）
    /// 5. 调用控制器的启动钩子（拒绝 → `Rejected`）
    ///
    /// 任何失败都不改变状态。
    pub fn request_start(&self, name: &str) -> Result<(), ManagerError> {
        let _arbitration = self.arbitration.lock();

        let index = self.find(name)?;
        let target = &self.controllers[index];
        if target.is_running() {
            debug!(controller = %name, "Controller already running");
            return Ok(());
        }

        if let Some(missing) = target
            .claimed_names()
            .iter()
            .find(|claim| !self.joints.contains(claim))
        {
            warn!(controller = %name, joint = %missing, "Start rejected: joint not registered");
            return Err(ManagerError::MissingResource {
                controller: name.to_string(),
                resource: missing.clone(),
            });
        }

        for (i, other) in self.controllers.iter().enumerate() {
            if i == index || !other.is_running() {
                continue;
            }
            if let Some(resource) = target.shared_claim(other) {
                self.metrics.start_conflicts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    controller = %name,
                    holder = %other.name(),
                    joint = %resource,
                    "Start rejected: resource held by running controller"
                );
                return Err(ManagerError::Conflict {
                    controller: name.to_string(),
                    holder: other.name().to_string(),
                    resource: resource.to_string(),
                });
            }
        }

        target.start(&self.joints).map_err(|source| {
            warn!(controller = %name, "Controller refused to start: {}", source);
            ManagerError::Rejected {
                name: name.to_string(),
                source,
            }
        })?;

        info!(controller = %name, "Started controller");
        Ok(())
    }

    /// 请求停止控制器
    ///
    /// 未在运行的控制器：幂等成功，不改变状态。
    /// 停止后其资源立即释放，可被其他控制器申请。
    pub fn request_stop(&self, name: &str) -> Result<(), ManagerError> {
        let _arbitration = self.arbitration.lock();

        let index = self.find(name)?;
        if self.controllers[index].stop(&self.joints) {
            info!(controller = %name, "Stopped controller");
        } else {
            debug!(controller = %name, "Controller not running; stop is a no-op");
        }
        Ok(())
    }

    /// 周期 update
    ///
    /// 先重置所有关节句柄（清除已停止控制器的残留命令），
    /// 再按加载顺序 update 每个运行中的控制器；未运行的控制器完全跳过。
    ///
    /// # 实时性
    ///
    /// - 不获取仲裁锁，不分配内存
    /// - 控制器槽位被请求线程占用时跳过该控制器一个周期
    /// - 单个控制器失败不影响同周期内其他控制器，
    ///   失败处理按 [`UpdateFailurePolicy`]
    pub fn update(&self, time: Duration, dt: Duration) {
        self.check_clock(time);
        self.metrics.cycles_total.fetch_add(1, Ordering::Relaxed);

        self.joints.reset_all();

        for loader in &self.controllers {
            match loader.update(time, dt, &self.joints, self.policy) {
                UpdateOutcome::Idle => {},
                UpdateOutcome::Updated => {
                    self.metrics.controller_updates.fetch_add(1, Ordering::Relaxed);
                },
                UpdateOutcome::Skipped => {
                    self.metrics.updates_skipped.fetch_add(1, Ordering::Relaxed);
                    trace!(controller = %loader.name(), "Controller slot busy, skipped");
                },
                UpdateOutcome::Failed { error, halted } => {
                    self.metrics.controller_updates.fetch_add(1, Ordering::Relaxed);
                    self.metrics.update_failures.fetch_add(1, Ordering::Relaxed);
                    if halted {
                        self.metrics.controllers_halted.fetch_add(1, Ordering::Relaxed);
                        error!(
                            controller = %loader.name(),
                            "Controller update failed, controller stopped: {}",
                            error
                        );
                    } else {
                        error!(controller = %loader.name(), "Controller update failed: {}", error);
                    }
                },
            }
        }
    }

    /// 检查时间戳单调性（倒退只记录，不跳过周期）
    fn check_clock(&self, time: Duration) {
        let now = u64::try_from(time.as_nanos()).unwrap_or(NO_TIMESTAMP - 1);
        let previous = self.last_time_ns.swap(now, Ordering::Relaxed);
        if previous != NO_TIMESTAMP && now < previous {
            self.metrics.clock_regressions.fetch_add(1, Ordering::Relaxed);
            warn!(
                previous_ns = previous,
                now_ns = now,
                "update() time went backwards"
            );
        }
    }

    /// 重置所有关节和控制器
    ///
    /// 不改变任何控制器的运行状态。
    pub fn reset(&self) {
        let _arbitration = self.arbitration.lock();
        self.joints.reset_all();
        for loader in &self.controllers {
            loader.reset_controller();
        }
        debug!("Controller manager reset");
    }

    /// 注册关节句柄
    ///
    /// 名称重复时返回 `DuplicateHandle`，注册表不变。
    /// `is_ok()` 即布尔契约。
    pub fn add_joint_handle(
        &mut self,
        handle: Arc<dyn JointHandle>,
    ) -> Result<JointId, ManagerError> {
        let name = handle.name().to_string();
        let id = self.joints.insert(handle).inspect_err(|_| {
            warn!(joint = %name, "Joint handle already registered");
        })?;
        debug!(joint = %name, id = id.index(), "Registered joint handle");
        Ok(id)
    }

    /// 按名称查找句柄（先查关节，再查控制器）
    ///
    /// 不存在时返回 `None`。
    pub fn get_handle(&self, name: &str) -> Option<HandleRef<'_>> {
        if let Some(joint) = self.joints.get(name) {
            return Some(HandleRef::Joint(joint));
        }
        self.controller(name).map(HandleRef::Controller)
    }

    /// 按名称查找关节句柄
    pub fn get_joint_handle(&self, name: &str) -> Option<&Arc<dyn JointHandle>> {
        self.joints.get(name)
    }

    /// 关节注册表
    pub fn joints(&self) -> &JointRegistry {
        &self.joints
    }

    /// 所有关节名（注册顺序）
    pub fn joint_names(&self) -> Vec<String> {
        self.joints.names()
    }

    /// 按名称查找控制器
    pub fn controller(&self, name: &str) -> Option<&ControllerLoader> {
        self.controller_index
            .get(name)
            .map(|&index| &self.controllers[index])
    }

    /// 控制器状态
    pub fn controller_state(&self, name: &str) -> Option<ControllerState> {
        self.controller(name).map(ControllerLoader::state)
    }

    /// 控制器声明的资源
    pub fn claimed_names(&self, name: &str) -> Option<&[String]> {
        self.controller(name).map(ControllerLoader::claimed_names)
    }

    /// 所有控制器名（加载顺序）
    pub fn controller_names(&self) -> Vec<&str> {
        self.controllers.iter().map(ControllerLoader::name).collect()
    }

    /// 运行中的控制器名（加载顺序）
    pub fn running_controllers(&self) -> Vec<&str> {
        self.controllers
            .iter()
            .filter(|c| c.is_running())
            .map(ControllerLoader::name)
            .collect()
    }

    /// 所有控制器（加载顺序）
    pub fn controllers(&self) -> impl Iterator<Item = &ControllerLoader> {
        self.controllers.iter()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn update_policy(&self) -> UpdateFailurePolicy {
        self.policy
    }

    /// 设置 update 失败策略（覆盖配置中的值）
    pub fn set_update_policy(&mut self, policy: UpdateFailurePolicy) {
        self.policy = policy;
    }

    /// 指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn find(&self, name: &str) -> Result<usize, ManagerError> {
        self.controller_index
            .get(name)
            .copied()
            .ok_or_else(|| ManagerError::ControllerNotFound(name.to_string()))
    }
}

impl std::fmt::Debug for ControllerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerManager")
            .field("joints", &self.joints)
            .field("controllers", &self.controllers)
            .field("policy", &self.policy)
            .field("initialized", &self.initialized)
            .finish()
    }
}

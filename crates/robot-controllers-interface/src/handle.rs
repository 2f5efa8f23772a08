//! 句柄（Handle）接口
//!
//! 句柄是管理器拥有、控制器引用的具名资源。
//! 关节句柄代表一个可控/可测的自由度；控制器加载器本身也是句柄，
//! 因此 `get_handle()` 可以同时按关节名和控制器名查找。
//!
//! # 线程安全
//!
//! 关节句柄被控制线程（写命令）和请求线程（读状态）共享，
//! 所有方法都接收 `&self`，实现需要自行提供内部可变性（通常为原子量）。

/// 具名资源
pub trait Handle {
    /// 唯一名称
    fn name(&self) -> &str;

    /// 重置句柄
    ///
    /// 对关节句柄：清除本周期之前残留的命令。
    /// 默认为空操作。
    fn reset(&self) {}
}

/// 关节句柄
///
/// 一个关节的命令/状态对。读写物理或仿真硬件由实现负责，
/// 管理器只依赖名称做仲裁。
///
/// # 性能要求
///
/// 所有方法都会在实时 `update()` 中被调用：
/// - 禁止阻塞（Mutex、I/O）
/// - 禁止分配
pub trait JointHandle: Handle + Send + Sync {
    /// 当前位置（rad 或 m）
    fn position(&self) -> f64;

    /// 当前速度
    fn velocity(&self) -> f64;

    /// 当前力/力矩
    fn effort(&self) -> f64;

    /// 位置命令（附带速度/力矩前馈）
    fn set_position(&self, position: f64, velocity: f64, effort: f64);

    /// 速度命令（附带力矩前馈）
    fn set_velocity(&self, velocity: f64, effort: f64);

    /// 力/力矩命令
    fn set_effort(&self, effort: f64);

    /// 位置下限
    fn position_min(&self) -> f64 {
        f64::NEG_INFINITY
    }

    /// 位置上限
    fn position_max(&self) -> f64 {
        f64::INFINITY
    }

    /// 限位是否有序（`min <= max` 且都不是 NaN）
    fn limits_ordered(&self) -> bool {
        self.position_min() <= self.position_max()
    }

    /// 是否为连续关节（无位置限位）
    fn is_continuous(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for dyn JointHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JointHandle")
            .field("name", &self.name())
            .field("position", &self.position())
            .finish()
    }
}

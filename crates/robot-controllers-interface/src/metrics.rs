//! 管理器运行指标
//!
//! 零开销的原子计数器，控制线程更新、任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 管理器实时指标
#[derive(Debug, Default)]
pub struct ManagerMetrics {
    /// update 周期总数
    pub cycles_total: AtomicU64,

    /// 控制器 update 调用总数
    pub controller_updates: AtomicU64,

    /// 控制器 update 返回错误的次数
    pub update_failures: AtomicU64,

    /// 因 update 失败被自动停止的控制器次数
    pub controllers_halted: AtomicU64,

    /// 控制器槽位被请求线程占用而跳过的 update 次数
    ///
    /// 这个值快速增长说明请求线程持锁时间过长。
    pub updates_skipped: AtomicU64,

    /// 时间戳倒退次数（调用方违反单调性）
    pub clock_regressions: AtomicU64,

    /// 因资源冲突被拒绝的启动请求
    pub start_conflicts: AtomicU64,
}

impl ManagerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 使用 `Ordering::Relaxed`，不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            controller_updates: self.controller_updates.load(Ordering::Relaxed),
            update_failures: self.update_failures.load(Ordering::Relaxed),
            controllers_halted: self.controllers_halted.load(Ordering::Relaxed),
            updates_skipped: self.updates_skipped.load(Ordering::Relaxed),
            clock_regressions: self.clock_regressions.load(Ordering::Relaxed),
            start_conflicts: self.start_conflicts.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.cycles_total.store(0, Ordering::Relaxed);
        self.controller_updates.store(0, Ordering::Relaxed);
        self.update_failures.store(0, Ordering::Relaxed);
        self.controllers_halted.store(0, Ordering::Relaxed);
        self.updates_skipped.store(0, Ordering::Relaxed);
        self.clock_regressions.store(0, Ordering::Relaxed);
        self.start_conflicts.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub cycles_total: u64,
    pub controller_updates: u64,
    pub update_failures: u64,
    pub controllers_halted: u64,
    pub updates_skipped: u64,
    pub clock_regressions: u64,
    pub start_conflicts: u64,
}

impl MetricsSnapshot {
    /// update 失败率（失败次数 / update 调用次数）
    pub fn failure_rate(&self) -> f64 {
        if self.controller_updates == 0 {
            0.0
        } else {
            self.update_failures as f64 / self.controller_updates as f64
        }
    }
}

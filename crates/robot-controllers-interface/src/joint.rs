//! 关节句柄注册表
//!
//! 管理器独占所有关节句柄，按插入顺序编号。
//! 控制器在 `start()` 中把关节名解析为 [`JointId`]，
//! 之后在实时 `update()` 中只通过索引访问，不再做字符串查找。

use crate::error::ManagerError;
use crate::handle::JointHandle;
use std::collections::HashMap;
use std::sync::Arc;

/// 关节令牌（注册表中的稳定索引）
///
/// 关节一旦注册就不会被移除，因此令牌在管理器生命周期内始终有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(usize);

impl JointId {
    /// 索引值
    pub fn index(self) -> usize {
        self.0
    }
}

/// 关节句柄注册表
#[derive(Default)]
pub struct JointRegistry {
    /// 按插入顺序存放的句柄
    joints: Vec<Arc<dyn JointHandle>>,
    /// 名称 → 索引
    index: HashMap<String, JointId>,
}

impl JointRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册关节句柄
    ///
    /// 名称已存在时返回 `DuplicateHandle`，注册表保持不变。
    pub fn insert(&mut self, joint: Arc<dyn JointHandle>) -> Result<JointId, ManagerError> {
        let name = joint.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ManagerError::DuplicateHandle(name));
        }

        let id = JointId(self.joints.len());
        self.joints.push(joint);
        self.index.insert(name, id);
        Ok(id)
    }

    /// 按名称解析令牌
    pub fn id(&self, name: &str) -> Option<JointId> {
        self.index.get(name).copied()
    }

    /// 按名称查找句柄
    pub fn get(&self, name: &str) -> Option<&Arc<dyn JointHandle>> {
        self.id(name).map(|id| &self.joints[id.0])
    }

    /// 按令牌访问句柄
    ///
    /// # Panics
    ///
    /// 令牌来自其他注册表且越界时 panic。
    pub fn joint(&self, id: JointId) -> &dyn JointHandle {
        self.joints[id.0].as_ref()
    }

    /// 是否包含指定名称
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 解析一组关节名
    ///
    /// 任意名称缺失时返回该名称。
    pub fn resolve<'a, I>(&self, names: I) -> Result<Vec<JointId>, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| self.id(name).ok_or_else(|| name.to_string()))
            .collect()
    }

    /// 按插入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn JointHandle>> {
        self.joints.iter()
    }

    /// 所有关节名（插入顺序）
    pub fn names(&self) -> Vec<String> {
        self.joints.iter().map(|j| j.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// 重置所有关节（清除残留命令）
    pub fn reset_all(&self) {
        for joint in &self.joints {
            joint.reset();
        }
    }
}

impl std::fmt::Debug for JointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.joints.iter().map(|j| j.name())).finish()
    }
}

//! 测试公共设施：可观测的 mock 控制器

#![allow(dead_code)]

use robot_controllers_interface::{
    Controller, ControllerError, ControllerManager, ControllerParams, ControllerRegistry,
    JointId, JointRegistry, SimulatedJoint,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 共享的调用日志（记录 update 顺序）
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Mock 控制器：记录 update 调用，并对声明的关节下发力矩命令
pub struct MockController {
    pub name: String,
    pub claims: Vec<String>,
    pub effort: f64,
    pub log: CallLog,
    pub fail: Arc<AtomicBool>,
    pub updates: Arc<AtomicU64>,
    ids: Vec<JointId>,
}

impl MockController {
    pub fn new(name: &str, claims: &[&str], log: CallLog) -> Self {
        Self {
            name: name.to_string(),
            claims: claims.iter().map(|s| s.to_string()).collect(),
            effort: 1.0,
            log,
            fail: Arc::new(AtomicBool::new(false)),
            updates: Arc::new(AtomicU64::new(0)),
            ids: Vec::new(),
        }
    }
}

impl Controller for MockController {
    fn type_name(&self) -> &str {
        "test/Mock"
    }

    fn claimed_names(&self) -> Vec<String> {
        self.claims.clone()
    }

    fn start(&mut self, joints: &JointRegistry) -> Result<(), ControllerError> {
        self.ids = joints
            .resolve(self.claims.iter().map(String::as_str))
            .map_err(ControllerError::MissingJoint)?;
        Ok(())
    }

    fn update(
        &mut self,
        _time: Duration,
        _dt: Duration,
        joints: &JointRegistry,
    ) -> Result<(), ControllerError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(self.name.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ControllerError::Fault(format!("{} diverged", self.name)));
        }
        for &id in &self.ids {
            joints.joint(id).set_effort(self.effort);
        }
        Ok(())
    }
}

/// 注册 `test/Mock` 类型（参数 `joints`）
pub fn mock_registry(log: CallLog) -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();
    registry.register("test/Mock", move |name, params| {
        let joints = params.string_list("joints")?;
        let refs: Vec<&str> = joints.iter().map(String::as_str).collect();
        Ok(Box::new(MockController::new(name, &refs, log.clone())) as Box<dyn Controller>)
    });
    registry
}

pub fn mock_params(joints: &[&str]) -> ControllerParams {
    ControllerParams::of_type("test/Mock").with("joints", joints.to_vec())
}

/// 注册一组仿真关节
pub fn add_joints(manager: &mut ControllerManager, names: &[&str]) -> Vec<Arc<SimulatedJoint>> {
    names
        .iter()
        .map(|name| {
            let joint = Arc::new(SimulatedJoint::new(*name));
            manager.add_joint_handle(joint.clone()).unwrap();
            joint
        })
        .collect()
}

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub const DT: Duration = Duration::from_millis(10);

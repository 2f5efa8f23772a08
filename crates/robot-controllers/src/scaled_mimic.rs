//! 比例跟随控制器
//!
//! 读取 `leader` 关节的状态，向 `follower` 关节下发
//! `position = scale * leader.position`（速度前馈同比例）。
//!
//! 只占用 `follower`：`leader` 只读，可以同时被其他控制器驱动。

use robot_controllers_interface::{
    Controller, ControllerError, ControllerParams, JointId, JointRegistry,
};
use std::time::Duration;

/// 类型名
pub const SCALED_MIMIC_TYPE: &str = "robot_controllers/ScaledMimic";

#[derive(Debug)]
pub struct ScaledMimicController {
    leader: String,
    follower: String,
    scale: f64,
    ids: Option<(JointId, JointId)>,
}

impl ScaledMimicController {
    pub fn new(
        leader: impl Into<String>,
        follower: impl Into<String>,
        scale: f64,
    ) -> Result<Self, ControllerError> {
        let leader = leader.into();
        let follower = follower.into();
        if leader == follower {
            return Err(ControllerError::invalid_parameter(
                "follower",
                "must differ from leader",
            ));
        }
        if !scale.is_finite() {
            return Err(ControllerError::invalid_parameter("scale", "must be finite"));
        }
        Ok(Self {
            leader,
            follower,
            scale,
            ids: None,
        })
    }

    /// 参数：`leader`、`follower`（必需），`scale`（默认 1.0）
    pub fn from_params(params: &ControllerParams) -> Result<Self, ControllerError> {
        Self::new(
            params.required_str("leader")?,
            params.required_str("follower")?,
            params.f64_or("scale", 1.0)?,
        )
    }
}

impl Controller for ScaledMimicController {
    fn type_name(&self) -> &str {
        SCALED_MIMIC_TYPE
    }

    fn claimed_names(&self) -> Vec<String> {
        vec![self.follower.clone()]
    }

    fn start(&mut self, joints: &JointRegistry) -> Result<(), ControllerError> {
        let leader = joints
            .id(&self.leader)
            .ok_or_else(|| ControllerError::MissingJoint(self.leader.clone()))?;
        let follower = joints
            .id(&self.follower)
            .ok_or_else(|| ControllerError::MissingJoint(self.follower.clone()))?;
        self.ids = Some((leader, follower));
        Ok(())
    }

    fn stop(&mut self, _joints: &JointRegistry) {
        self.ids = None;
    }

    fn update(
        &mut self,
        _time: Duration,
        _dt: Duration,
        joints: &JointRegistry,
    ) -> Result<(), ControllerError> {
        let Some((leader, follower)) = self.ids else {
            return Err(ControllerError::Fault("updated before start".to_string()));
        };

        let leader = joints.joint(leader);
        let follower = joints.joint(follower);
        let position = self.scale * leader.position();
        let velocity = self.scale * leader.velocity();

        if !follower.is_continuous()
            && (position < follower.position_min() || position > follower.position_max())
        {
            return Err(ControllerError::Fault(format!(
                "follower '{}' command {:.4} outside [{}, {}]",
                self.follower,
                position,
                follower.position_min(),
                follower.position_max()
            )));
        }

        follower.set_position(position, velocity, 0.0);
        Ok(())
    }
}

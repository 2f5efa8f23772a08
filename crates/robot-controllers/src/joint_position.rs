//! 关节位置控制器
//!
//! 对每个声明的关节运行一个 [`Pid`]，把位置误差转换为力矩命令。
//!
//! # 参数
//!
//! | 键 | 类型 | 说明 |
//! |----|------|------|
//! | `joints` | 字符串数组 | 占用的关节（必需，非空） |
//! | `targets` | 数值数组 | 目标位置，长度与 `joints` 相同；缺省时保持启动时的位置 |
//! | `kp` / `ki` / `kd` | 数值 | PID 增益 |
//! | `integral_limit` / `output_limit` | 数值 | 积分与输出限幅 |
//!
//! # 目标处理
//!
//! - 有限位的关节：目标钳位到 `[position_min, position_max]`；限位无序时拒绝启动
//! - 连续关节：误差取最短角距离（`[-π, π)`）

use crate::pid::{Pid, PidGains};
use robot_controllers_interface::{
    Controller, ControllerError, ControllerParams, Handle, JointId, JointRegistry,
};
use smallvec::SmallVec;
use std::f64::consts::PI;
use std::time::Duration;

/// 类型名
pub const JOINT_POSITION_TYPE: &str = "robot_controllers/JointPosition";

/// 单个关节的控制状态
#[derive(Debug, Clone)]
struct Axis {
    id: JointId,
    target: f64,
    continuous: bool,
    pid: Pid,
}

/// 关节位置控制器
#[derive(Debug)]
pub struct JointPositionController {
    joints: Vec<String>,
    targets: Option<Vec<f64>>,
    gains: PidGains,

    /// `start()` 时填充
    axes: SmallVec<[Axis; 6]>,
    last_time: Option<Duration>,
}

impl JointPositionController {
    /// 创建控制器
    ///
    /// `targets` 为 `None` 时保持启动时刻的位置。
    pub fn new(
        joints: Vec<String>,
        targets: Option<Vec<f64>>,
        gains: PidGains,
    ) -> Result<Self, ControllerError> {
        if joints.is_empty() {
            return Err(ControllerError::invalid_parameter("joints", "must not be empty"));
        }
        if let Some(targets) = &targets {
            if targets.len() != joints.len() {
                return Err(ControllerError::invalid_parameter(
                    "targets",
                    format!("expected {} values, got {}", joints.len(), targets.len()),
                ));
            }
            if targets.iter().any(|t| !t.is_finite()) {
                return Err(ControllerError::invalid_parameter("targets", "must be finite"));
            }
        }

        Ok(Self {
            joints,
            targets,
            gains,
            axes: SmallVec::new(),
            last_time: None,
        })
    }

    /// 从参数段构造
    pub fn from_params(params: &ControllerParams) -> Result<Self, ControllerError> {
        let joints = params.string_list("joints")?;
        let targets = if params.contains("targets") {
            Some(params.f64_list("targets")?)
        } else {
            None
        };
        Self::new(joints, targets, PidGains::from_params(params)?)
    }

    /// 当前生效的目标（未启动时为空）
    pub fn active_targets(&self) -> Vec<f64> {
        self.axes.iter().map(|a| a.target).collect()
    }
}

impl Controller for JointPositionController {
    fn type_name(&self) -> &str {
        JOINT_POSITION_TYPE
    }

    fn claimed_names(&self) -> Vec<String> {
        self.joints.clone()
    }

    fn start(&mut self, joints: &JointRegistry) -> Result<(), ControllerError> {
        let ids = joints
            .resolve(self.joints.iter().map(String::as_str))
            .map_err(ControllerError::MissingJoint)?;

        let mut axes = SmallVec::with_capacity(ids.len());
        for (i, id) in ids.into_iter().enumerate() {
            let joint = joints.joint(id);
            let continuous = joint.is_continuous();
            if !continuous && !joint.limits_ordered() {
                return Err(ControllerError::Fault(format!(
                    "joint '{}' has unordered limits [{}, {}]",
                    joint.name(),
                    joint.position_min(),
                    joint.position_max()
                )));
            }
            let requested = match &self.targets {
                Some(targets) => targets[i],
                None => joint.position(),
            };

            let target = if continuous {
                requested
            } else {
                requested.clamp(joint.position_min(), joint.position_max())
            };
            if target != requested {
                tracing::warn!(
                    joint = %self.joints[i],
                    requested,
                    target,
                    "Target outside joint limits, clamped"
                );
            }

            axes.push(Axis {
                id,
                target,
                continuous,
                pid: Pid::new(self.gains),
            });
        }

        self.axes = axes;
        self.last_time = None;
        Ok(())
    }

    fn reset(&mut self) {
        for axis in &mut self.axes {
            axis.pid.reset();
        }
    }

    fn update(
        &mut self,
        time: Duration,
        dt: Duration,
        joints: &JointRegistry,
    ) -> Result<(), ControllerError> {
        if let Some(last) = self.last_time
            && time < last
        {
            tracing::warn!(?time, ?last, "Time went backwards, resetting derivative terms");
            for axis in &mut self.axes {
                axis.pid.on_time_jump();
            }
        }
        self.last_time = Some(time);

        for axis in &mut self.axes {
            let joint = joints.joint(axis.id);
            let position = joint.position();
            if !position.is_finite() {
                return Err(ControllerError::Fault(format!(
                    "joint '{}' reported non-finite position",
                    joint.name()
                )));
            }

            let error = if axis.continuous {
                shortest_angular_distance(position, axis.target)
            } else {
                axis.target - position
            };
            joint.set_effort(axis.pid.tick(error, dt));
        }
        Ok(())
    }
}

/// `from` 到 `to` 的最短角距离，结果在 `[-π, π)`
fn shortest_angular_distance(from: f64, to: f64) -> f64 {
    (to - from + PI).rem_euclid(2.0 * PI) - PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use robot_controllers_interface::{JointHandle, SimulatedJoint};
    use std::sync::Arc;

    const DT: Duration = Duration::from_millis(10);

    fn registry(joints: Vec<SimulatedJoint>) -> (JointRegistry, Vec<Arc<SimulatedJoint>>) {
        let mut registry = JointRegistry::new();
        let mut handles = Vec::new();
        for joint in joints {
            let joint = Arc::new(joint);
            registry.insert(joint.clone()).unwrap();
            handles.push(joint);
        }
        (registry, handles)
    }

    fn p_only(kp: f64) -> PidGains {
        PidGains {
            kp,
            ..Default::default()
        }
    }

    #[test]
    fn test_from_params() {
        let params = ControllerParams::of_type(JOINT_POSITION_TYPE)
            .with("joints", vec!["a", "b"])
            .with("targets", vec![0.5, -0.5])
            .with("kp", 20.0);
        let controller = JointPositionController::from_params(&params).unwrap();
        assert_eq!(controller.claimed_names(), vec!["a", "b"]);
        assert_eq!(controller.type_name(), JOINT_POSITION_TYPE);
        assert!(controller.active_targets().is_empty());
    }

    #[test]
    fn test_invalid_params() {
        let params = ControllerParams::new().with("joints", Vec::<&str>::new());
        assert!(JointPositionController::from_params(&params).is_err());

        let params = ControllerParams::new()
            .with("joints", vec!["a", "b"])
            .with("targets", vec![1.0]);
        assert!(matches!(
            JointPositionController::from_params(&params),
            Err(ControllerError::InvalidParameter { ref name, .. }) if name == "targets"
        ));

        assert!(JointPositionController::from_params(&ControllerParams::new()).is_err());
    }

    #[test]
    fn test_start_holds_current_position() {
        let (joints, _) = registry(vec![SimulatedJoint::new("a").with_position(0.3)]);
        let mut controller =
            JointPositionController::new(vec!["a".into()], None, p_only(1.0)).unwrap();
        controller.start(&joints).unwrap();
        assert_eq!(controller.active_targets(), vec![0.3]);
    }

    #[test]
    fn test_start_missing_joint() {
        let (joints, _) = registry(vec![SimulatedJoint::new("a")]);
        let mut controller =
            JointPositionController::new(vec!["a".into(), "ghost".into()], None, p_only(1.0))
                .unwrap();
        assert!(matches!(
            controller.start(&joints),
            Err(ControllerError::MissingJoint(ref name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_target_clamped_to_limits() {
        let (joints, _) = registry(vec![SimulatedJoint::new("a").with_limits(-1.0, 1.0)]);
        let mut controller =
            JointPositionController::new(vec!["a".into()], Some(vec![3.0]), p_only(1.0)).unwrap();
        controller.start(&joints).unwrap();
        assert_eq!(controller.active_targets(), vec![1.0]);
    }

    #[test]
    fn test_unordered_limits_rejected_at_start() {
        for (min, max) in [(1.0, -1.0), (f64::NAN, 1.0)] {
            let (joints, _) = registry(vec![SimulatedJoint::new("a").with_limits(min, max)]);
            let mut controller =
                JointPositionController::new(vec!["a".into()], Some(vec![0.5]), p_only(1.0))
                    .unwrap();
            assert!(matches!(controller.start(&joints), Err(ControllerError::Fault(_))));
        }

        // 连续关节不使用限位
        let (joints, _) = registry(vec![
            SimulatedJoint::new("wheel")
                .with_limits(1.0, -1.0)
                .with_continuous(true),
        ]);
        let mut controller =
            JointPositionController::new(vec!["wheel".into()], Some(vec![3.0]), p_only(1.0))
                .unwrap();
        controller.start(&joints).unwrap();
        assert_eq!(controller.active_targets(), vec![3.0]);
    }

    #[test]
    fn test_update_writes_effort() {
        let (joints, handles) = registry(vec![SimulatedJoint::new("a").with_position(0.5)]);
        let mut controller =
            JointPositionController::new(vec!["a".into()], Some(vec![1.0]), p_only(10.0)).unwrap();
        controller.start(&joints).unwrap();
        controller.update(DT, DT, &joints).unwrap();

        let (_, _, effort) = handles[0].command();
        assert!((effort - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_continuous_joint_takes_short_way() {
        let (joints, handles) =
            registry(vec![SimulatedJoint::new("wheel").with_continuous(true).with_position(3.0)]);
        let mut controller =
            JointPositionController::new(vec!["wheel".into()], Some(vec![-3.0]), p_only(1.0))
                .unwrap();
        controller.start(&joints).unwrap();
        controller.update(DT, DT, &joints).unwrap();

        // 3.0 → -3.0 的最短路径是正向跨过 π
        let (_, _, effort) = handles[0].command();
        assert!((effort - (2.0 * PI - 6.0)).abs() < 1e-10);
    }

    #[test]
    fn test_non_finite_position_is_fault() {
        let (joints, _) = registry(vec![SimulatedJoint::new("a").with_position(f64::NAN)]);
        let mut controller =
            JointPositionController::new(vec!["a".into()], Some(vec![0.0]), p_only(1.0)).unwrap();
        controller.start(&joints).unwrap();
        assert!(matches!(
            controller.update(DT, DT, &joints),
            Err(ControllerError::Fault(_))
        ));
    }

    #[test]
    fn test_converges_on_simulated_joint() {
        let (joints, handles) = registry(vec![SimulatedJoint::new("a")]);
        let gains = PidGains {
            kp: 25.0,
            kd: 10.0,
            ..Default::default()
        };
        let mut controller =
            JointPositionController::new(vec!["a".into()], Some(vec![0.8]), gains).unwrap();
        controller.start(&joints).unwrap();

        for i in 1..=1000 {
            controller.update(DT * i, DT, &joints).unwrap();
            handles[0].step(DT);
        }
        assert!((handles[0].position() - 0.8).abs() < 1e-2);
    }

    #[test]
    fn test_shortest_angular_distance() {
        assert!((shortest_angular_distance(0.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((shortest_angular_distance(1.0, 0.0) + 1.0).abs() < 1e-12);
        assert!((shortest_angular_distance(PI - 0.1, -PI + 0.1) - 0.2).abs() < 1e-12);
    }
}

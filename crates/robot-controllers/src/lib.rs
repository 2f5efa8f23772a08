//! # Robot Controllers
//!
//! 内置控制器：
//!
//! - [`JointPositionController`]（`robot_controllers/JointPosition`）：逐关节 PID，输出力矩
//! - [`ScaledMimicController`]（`robot_controllers/ScaledMimic`）：按比例跟随另一个关节
//!
//! # 使用
//!
//! ```rust
//! use robot_controllers::register_builtin;
//! use robot_controllers_interface::ControllerRegistry;
//!
//! let mut registry = ControllerRegistry::new();
//! register_builtin(&mut registry);
//! assert!(registry.contains("robot_controllers/JointPosition"));
//! ```

pub mod joint_position;
pub mod pid;
pub mod scaled_mimic;

pub use joint_position::{JOINT_POSITION_TYPE, JointPositionController};
pub use pid::{Pid, PidGains};
pub use scaled_mimic::{SCALED_MIMIC_TYPE, ScaledMimicController};

use robot_controllers_interface::{Controller, ControllerRegistry};

/// 向注册表登记所有内置控制器类型
pub fn register_builtin(registry: &mut ControllerRegistry) {
    registry.register(JOINT_POSITION_TYPE, |_name, params| {
        Ok(Box::new(JointPositionController::from_params(params)?) as Box<dyn Controller>)
    });
    registry.register(SCALED_MIMIC_TYPE, |_name, params| {
        Ok(Box::new(ScaledMimicController::from_params(params)?) as Box<dyn Controller>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use robot_controllers_interface::{ControllerConstructor, ControllerParams};

    #[test]
    fn test_register_builtin() {
        let mut registry = ControllerRegistry::new();
        register_builtin(&mut registry);
        assert_eq!(
            registry.type_names(),
            vec![JOINT_POSITION_TYPE, SCALED_MIMIC_TYPE]
        );

        let params = ControllerParams::of_type(SCALED_MIMIC_TYPE)
            .with("leader", "a")
            .with("follower", "b");
        let controller = registry.construct(SCALED_MIMIC_TYPE, "mimic", &params).unwrap();
        assert_eq!(controller.type_name(), SCALED_MIMIC_TYPE);
    }
}

//! 仿真台架配置
//!
//! 与管理器共用同一个 TOML 文件：
//!
//! ```toml
//! default_controllers = ["pan_ctrl"]
//!
//! [loop]
//! frequency_hz = 200.0
//!
//! [[joints]]
//! name = "shoulder_pan"
//! min = -1.57
//! max = 1.57
//!
//! [controllers.pan_ctrl]
//! type = "robot_controllers/JointPosition"
//! joints = ["shoulder_pan"]
//! ```
//!
//! `[loop]` 与 `[[joints]]` 由台架读取，其余键交给 [`ManagerConfig`]。

use anyhow::{Context, Result};
use robot_controllers_interface::{JointHandle, LoopConfig, ManagerConfig, SimulatedJoint};
use serde::Deserialize;
use std::path::Path;

/// 仿真关节定义
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JointSpec {
    pub name: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub continuous: bool,
    /// 初始位置
    #[serde(default)]
    pub position: f64,
}

impl JointSpec {
    pub fn build(&self) -> SimulatedJoint {
        SimulatedJoint::new(self.name.clone())
            .with_limits(
                self.min.unwrap_or(f64::NEG_INFINITY),
                self.max.unwrap_or(f64::INFINITY),
            )
            .with_continuous(self.continuous)
            .with_position(self.position)
    }
}

/// 台架配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub joints: Vec<JointSpec>,
    #[serde(rename = "loop")]
    pub loop_config: LoopConfig,
}

impl BenchConfig {
    /// 同时解析台架配置和管理器配置
    pub fn parse(content: &str) -> Result<(Self, ManagerConfig)> {
        let bench: Self = toml::from_str(content).context("Invalid bench configuration")?;
        bench.validate()?;
        let manager = ManagerConfig::from_toml_str(content)?;
        Ok((bench, manager))
    }

    pub fn load(path: &Path) -> Result<(Self, ManagerConfig)> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        for joint in &self.joints {
            let built = joint.build();
            if !built.limits_ordered() {
                anyhow::bail!(
                    "Joint '{}': limits [{}, {}] are not ordered",
                    joint.name,
                    built.position_min(),
                    built.position_max()
                );
            }
        }
        self.loop_config.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robot_controllers_interface::UpdateFailurePolicy;
    use std::io::Write;

    const SAMPLE: &str = include_str!("../config/shoulder.toml");

    #[test]
    fn test_parse_sample() {
        let (bench, manager) = BenchConfig::parse(SAMPLE).unwrap();
        let names: Vec<&str> = bench.joints.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["shoulder_pan", "shoulder_tilt", "gripper_left", "gripper_right"]);
        assert_eq!(bench.loop_config.frequency_hz, 200.0);
        assert_eq!(
            manager.default_controllers.as_deref().map(<[String]>::len),
            Some(4)
        );
        assert_eq!(manager.on_update_error, UpdateFailurePolicy::StopController);
    }

    #[test]
    fn test_defaults() {
        let (bench, _) = BenchConfig::parse("default_controllers = []").unwrap();
        assert!(bench.joints.is_empty());
        assert_eq!(bench.loop_config, LoopConfig::default());
    }

    #[test]
    fn test_joint_spec_build() {
        let spec = JointSpec {
            name: "wrist".into(),
            min: Some(-1.0),
            max: None,
            continuous: false,
            position: 0.5,
        };
        let joint = spec.build();
        assert_eq!(joint.position(), 0.5);
        assert_eq!(joint.position_min(), -1.0);
        assert_eq!(joint.position_max(), f64::INFINITY);
    }

    #[test]
    fn test_rejects_inverted_limits() {
        let content = r#"
[[joints]]
name = "bad"
min = 1.0
max = -1.0
"#;
        assert!(BenchConfig::parse(content).is_err());

        for limit in ["min = nan", "max = nan", "min = nan\nmax = 1.0"] {
            let content = format!("[[joints]]\nname = \"bad\"\n{}\n", limit);
            assert!(BenchConfig::parse(&content).is_err(), "{}", limit);
        }
    }

    #[test]
    fn test_rejects_invalid_loop() {
        assert!(BenchConfig::parse("[loop]\nfrequency_hz = 0.0").is_err());
        assert!(BenchConfig::parse("[loop]\nfrequency_hz = 1e-20").is_err());
        assert!(BenchConfig::parse("[loop]\ndt_clamp_multiplier = 1e20").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let (bench, _) = BenchConfig::load(file.path()).unwrap();
        assert_eq!(bench.joints.len(), 4);

        assert!(BenchConfig::load(Path::new("/nonexistent/bench.toml")).is_err());
    }
}

//! 管理器配置
//!
//! 从 TOML 读取默认控制器列表和每个控制器的参数段。
//!
//! ```toml
//! default_controllers = ["pan_ctrl", "tilt_ctrl"]
//! on_update_error = "stop"
//!
//! [controllers.pan_ctrl]
//! type = "robot_controllers/JointPosition"
//! joints = ["shoulder_pan"]
//! kp = 40.0
//! ```
//!
//! 管理器只关心 `type` 字段，其余键原样交给控制器构造工厂。
//! 未知的顶层键会被忽略，方便应用在同一个文件中放自己的配置段。

use crate::error::ControllerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 读取文件失败
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// 控制器 update 失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateFailurePolicy {
    /// 记录错误并立即停止该控制器（释放其资源）
    #[default]
    #[serde(alias = "stop")]
    StopController,

    /// 记录错误，控制器保持运行，下个周期继续 update
    #[serde(alias = "log")]
    LogAndContinue,
}

/// 管理器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// 初始化时加载的控制器（按此顺序加载和 update）
    pub default_controllers: Option<Vec<String>>,

    /// update 失败策略
    #[serde(default)]
    pub on_update_error: UpdateFailurePolicy,

    /// 控制器名 → 参数段
    #[serde(default)]
    pub controllers: BTreeMap<String, ControllerParams>,
}

impl ManagerConfig {
    /// 从 TOML 字符串解析
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// 从文件加载
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 添加一个默认控制器（构建器风格，主要用于测试和嵌入式配置）
    pub fn with_controller(mut self, name: impl Into<String>, params: ControllerParams) -> Self {
        let name = name.into();
        self.default_controllers
            .get_or_insert_with(Vec::new)
            .push(name.clone());
        self.controllers.insert(name, params);
        self
    }

    /// 设置 update 失败策略
    pub fn with_update_policy(mut self, policy: UpdateFailurePolicy) -> Self {
        self.on_update_error = policy;
        self
    }
}

/// 控制器参数段（不透明的 TOML 表）
///
/// 提供带类型检查的读取方法，错误统一为 [`ControllerError::InvalidParameter`]。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControllerParams(toml::Table);

impl ControllerParams {
    /// 创建空参数段
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带 `type` 字段的参数段
    pub fn of_type(type_name: &str) -> Self {
        Self::new().with("type", type_name)
    }

    /// 设置一个键（构建器风格）
    pub fn with(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// 控制器类型名
    pub fn type_name(&self) -> Option<&str> {
        self.str("type")
    }

    /// 原始表
    pub fn table(&self) -> &toml::Table {
        &self.0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// 字符串值
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(toml::Value::as_str)
    }

    /// 必需的字符串值
    pub fn required_str(&self, key: &str) -> Result<&str, ControllerError> {
        match self.0.get(key) {
            Some(value) => value
                .as_str()
                .ok_or_else(|| ControllerError::invalid_parameter(key, "expected a string")),
            None => Err(ControllerError::invalid_parameter(key, "missing")),
        }
    }

    /// 必需的数值（整数会被提升为 f64）
    pub fn f64(&self, key: &str) -> Result<f64, ControllerError> {
        match self.0.get(key) {
            Some(value) => as_f64(value)
                .ok_or_else(|| ControllerError::invalid_parameter(key, "expected a number")),
            None => Err(ControllerError::invalid_parameter(key, "missing")),
        }
    }

    /// 可选数值，缺失时返回默认值
    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ControllerError> {
        if self.0.contains_key(key) {
            self.f64(key)
        } else {
            Ok(default)
        }
    }

    /// 字符串数组
    pub fn string_list(&self, key: &str) -> Result<Vec<String>, ControllerError> {
        let array = self.array(key)?;
        array
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    ControllerError::invalid_parameter(key, "expected an array of strings")
                })
            })
            .collect()
    }

    /// 数值数组
    pub fn f64_list(&self, key: &str) -> Result<Vec<f64>, ControllerError> {
        let array = self.array(key)?;
        array
            .iter()
            .map(|v| {
                as_f64(v).ok_or_else(|| {
                    ControllerError::invalid_parameter(key, "expected an array of numbers")
                })
            })
            .collect()
    }

    fn array(&self, key: &str) -> Result<&Vec<toml::Value>, ControllerError> {
        match self.0.get(key) {
            Some(value) => value
                .as_array()
                .ok_or_else(|| ControllerError::invalid_parameter(key, "expected an array")),
            None => Err(ControllerError::invalid_parameter(key, "missing")),
        }
    }
}

impl From<toml::Table> for ControllerParams {
    fn from(table: toml::Table) -> Self {
        Self(table)
    }
}

fn as_f64(value: &toml::Value) -> Option<f64> {
    match value {
        toml::Value::Float(f) => Some(*f),
        toml::Value::Integer(i) => Some(*i as f64),
        _ => None,
    }
}

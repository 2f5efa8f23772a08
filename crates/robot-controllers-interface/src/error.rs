//! 错误类型与状态码定义
//!
//! 管理器对外保留整数状态码契约（`0` 成功，负数为错误码），
//! 内部 API 使用 `Result<_, ManagerError>`，通过 [`ManagerError::code`] 映射。
//!
//! | 状态码 | 含义 |
//! |--------|------|
//! | `0` | 成功 |
//! | `-1` | 控制器/句柄不存在 |
//! | `-2` | 资源冲突（与运行中的控制器共享关节） |
//! | `-3` | 名称重复 |
//! | `-4` | 控制器构造失败 |
//! | `-5` | 配置缺失 |
//! | `-6` | 控制器声明的资源未注册 |
//! | `-7` | 控制器拒绝启动 |
//! | `-8` | 管理器已初始化 |

use thiserror::Error;

/// 管理器状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    NotFound = -1,
    Conflict = -2,
    Duplicate = -3,
    ConstructionFailed = -4,
    MissingConfiguration = -5,
    MissingResource = -6,
    Rejected = -7,
    AlreadyInitialized = -8,
}

impl StatusCode {
    /// 转换为 i32
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// 从 i32 转换
    ///
    /// 未知值返回 `None`。
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            -1 => Some(Self::NotFound),
            -2 => Some(Self::Conflict),
            -3 => Some(Self::Duplicate),
            -4 => Some(Self::ConstructionFailed),
            -5 => Some(Self::MissingConfiguration),
            -6 => Some(Self::MissingResource),
            -7 => Some(Self::Rejected),
            -8 => Some(Self::AlreadyInitialized),
            _ => None,
        }
    }

    /// 是否为成功
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// 控制器层错误
///
/// 由具体控制器实现或构造工厂返回。
#[derive(Error, Debug)]
pub enum ControllerError {
    /// 未注册的控制器类型
    #[error("Unknown controller type: {0}")]
    UnknownType(String),

    /// 关节不存在
    #[error("Joint not found: {0}")]
    MissingJoint(String),

    /// 参数缺失或非法
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// 运行时故障（如数值发散、限位越界）
    #[error("Controller fault: {0}")]
    Fault(String),
}

impl ControllerError {
    /// 构造参数错误
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// 管理器错误
///
/// 每个变体对应一个稳定的 [`StatusCode`]。
#[derive(Error, Debug)]
pub enum ManagerError {
    /// 控制器不存在
    #[error("Controller not found: {0}")]
    ControllerNotFound(String),

    /// 资源冲突
    #[error("Controller '{controller}' conflicts with running '{holder}' on resource '{resource}'")]
    Conflict {
        controller: String,
        holder: String,
        resource: String,
    },

    /// 关节句柄名称重复
    #[error("Duplicate joint handle: {0}")]
    DuplicateHandle(String),

    /// 控制器名称重复
    #[error("Duplicate controller: {0}")]
    DuplicateController(String),

    /// 控制器构造失败
    #[error("Failed to construct controller '{name}': {source}")]
    ConstructionFailed {
        name: String,
        #[source]
        source: ControllerError,
    },

    /// 配置缺失
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// 控制器声明的资源未注册
    #[error("Controller '{controller}' claims unregistered resource '{resource}'")]
    MissingResource { controller: String, resource: String },

    /// 控制器拒绝启动
    #[error("Controller '{name}' rejected start: {source}")]
    Rejected {
        name: String,
        #[source]
        source: ControllerError,
    },

    /// 重复初始化
    #[error("Controller manager already initialized")]
    AlreadyInitialized,
}

impl ManagerError {
    /// 对应的状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ControllerNotFound(_) => StatusCode::NotFound,
            Self::Conflict { .. } => StatusCode::Conflict,
            Self::DuplicateHandle(_) | Self::DuplicateController(_) => StatusCode::Duplicate,
            Self::ConstructionFailed { .. } => StatusCode::ConstructionFailed,
            Self::MissingConfiguration(_) => StatusCode::MissingConfiguration,
            Self::MissingResource { .. } => StatusCode::MissingResource,
            Self::Rejected { .. } => StatusCode::Rejected,
            Self::AlreadyInitialized => StatusCode::AlreadyInitialized,
        }
    }

    /// 整数错误码（总是负数）
    pub fn code(&self) -> i32 {
        self.status_code().as_i32()
    }
}

/// 将 `Result` 折叠为整数状态码
///
/// ```rust
/// use robot_controllers_interface::{ControllerManager, StatusExt};
///
/// let manager = ControllerManager::new();
/// assert_eq!(manager.request_start("missing").status(), -1);
/// assert_eq!(manager.request_stop("missing").status(), -1);
/// ```
pub trait StatusExt {
    fn status(&self) -> i32;
}

impl StatusExt for Result<(), ManagerError> {
    fn status(&self) -> i32 {
        match self {
            Ok(()) => StatusCode::Ok.as_i32(),
            Err(e) => e.code(),
        }
    }
}

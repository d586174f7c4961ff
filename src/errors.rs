use crate::infrastructure::ContainerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),
    #[error("Service container error: {0}")]
    Container(#[from] ContainerError),
    #[error("Live state update error: {0}")]
    Update(#[from] UpdateError),
    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

/// 注册阶段的错误，出现即中止启动
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// 分发表中找不到对应的 (更新器, 本地输入, 状态) 组合
    #[error("No live state binding for updater '{updater}' (local: {local:?}, state: '{state}')")]
    BindingNotFound {
        updater: &'static str,
        local: Option<&'static str>,
        state: &'static str,
    },
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// 状态更新失败，交由重新计算的驱动方处理
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Update was cancelled")]
    Cancelled,
    #[error("Live state was detached from its owner")]
    Detached,
    #[error(transparent)]
    Updater(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),
    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}

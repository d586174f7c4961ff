//! 配置加载
//!
//! TOML 文件中的每个字段都是可选的：先反序列化为 `Partial*` 结构，再与环境变量
//! 合并得到最终配置。环境变量优先于文件。

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::infrastructure::ServiceContainer;
use crate::live_state::{ErasedOptions, OptionsHook};
use crate::logging::{parse_level, LogFormat, LoggingConfig};

pub const ENV_UPDATE_DELAY_MS: &str = "LIVE_STATE_UPDATE_DELAY_MS";
pub const ENV_LOG_LEVEL: &str = "LIVE_STATE_LOG_LEVEL";

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveStateConfig {
    pub live_state: LiveStateSection,
    pub logging: LoggingSection,
}

/// `[live_state]` 段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveStateSection {
    /// 每次重新计算前的默认等待时间
    pub update_delay_ms: Option<u64>,
}

/// `[logging]` 段
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSection {
    pub level: tracing::Level,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct PartialLiveStateConfig {
    live_state: Option<PartialLiveStateSection>,
    logging: Option<PartialLoggingSection>,
}

#[derive(Deserialize, Debug, Default)]
struct PartialLiveStateSection {
    update_delay_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
struct PartialLoggingSection {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl LiveStateConfig {
    /// 从文件加载配置，并应用环境变量覆盖
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string_lossy().to_string(), e))?;
        let partial = parse_partial(&content, &path.to_string_lossy())?;
        Self::from_partial_and_env(Some(partial), collect_env_vars())
    }

    /// 从 TOML 文本构造配置，不读取环境变量
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let partial = parse_partial(content, "<inline>")?;
        Self::from_partial_and_env(Some(partial), HashMap::new())
    }

    /// 合并文件配置与环境变量
    pub fn from_partial_and_env(
        partial: Option<PartialLiveStateConfig>,
        env_map: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let partial = partial.unwrap_or_default();
        let live_partial = partial.live_state.unwrap_or_default();
        let logging_partial = partial.logging.unwrap_or_default();

        let update_delay_ms = match env_map.get(ENV_UPDATE_DELAY_MS) {
            Some(value) => Some(value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: ENV_UPDATE_DELAY_MS.to_string(),
                value: value.clone(),
            })?),
            None => live_partial.update_delay_ms,
        };

        let defaults = LoggingSection::default();
        let level = match env_map.get(ENV_LOG_LEVEL).or(logging_partial.level.as_ref()) {
            Some(level) => parse_level(level)?,
            None => defaults.level,
        };

        Ok(Self {
            live_state: LiveStateSection { update_delay_ms },
            logging: LoggingSection {
                level,
                format: logging_partial.format.unwrap_or(defaults.format),
            },
        })
    }

    pub fn update_delay(&self) -> Option<Duration> {
        self.live_state.update_delay_ms.map(Duration::from_millis)
    }

    /// 在已有的日志预设上应用 `[logging]` 段
    pub fn logging_config(&self, base: LoggingConfig) -> LoggingConfig {
        base.with_level(self.logging.level).with_format(self.logging.format)
    }

    /// 把配置的默认值写入每个实时状态选项的定制钩子
    ///
    /// 只填充仍为空的字段，代码中显式设置的值不会被覆盖。
    pub fn options_hook(&self) -> OptionsHook {
        let delay = self.update_delay();
        Arc::new(move |_: &ServiceContainer, options: &mut dyn ErasedOptions| {
            let slot = options.update_delay_mut();
            if slot.is_none() {
                *slot = delay;
            }
        })
    }
}

fn parse_partial(content: &str, origin: &str) -> Result<PartialLiveStateConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::TomlParse(origin.to_string(), e))
}

fn collect_env_vars() -> HashMap<String, String> {
    let mut env_map = HashMap::new();
    for key in [ENV_UPDATE_DELAY_MS, ENV_LOG_LEVEL] {
        if let Ok(value) = env::var(key) {
            env_map.insert(key.to_string(), value);
        }
    }
    env_map
}

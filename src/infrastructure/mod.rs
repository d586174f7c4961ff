//! 基础设施层
//!
//! 提供服务注册表（依赖注入容器）的具体实现

// 容器实现
pub mod container;

// 重新导出API
pub use container::{ContainerError, Injectable, ServiceContainer, ServiceKind, ServiceLifetime, WeakServiceContainer};

//! Container module

pub mod service_container;

pub use service_container::{
    ContainerError, ContainerStats, Injectable, ServiceContainer, ServiceDescriptor,
    WeakServiceContainer,
};

/// 服务生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceLifetime {
    /// 整个容器生命周期内只有一个实例
    Singleton,
    /// 每次解析都创建新实例
    Transient,
}

/// 服务的注册方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceKind {
    /// 普通单例
    #[default]
    Plain,
    /// 计算服务：具体类型与能力键共享同一实例
    Computed,
}

//! 服务容器实现
//!
//! 以 `TypeId` 为键的服务注册表，提供：
//! - "不存在才添加" (add-if-absent) 的注册语义，先注册者生效
//! - 单例（首次解析时惰性创建，仅创建一次）与瞬态两种生命周期
//! - 计算服务：具体实现与能力键共享同一单例
//! - 同步解析，工厂内部可以继续解析其他服务

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;

use super::{ServiceKind, ServiceLifetime};

/// 容器错误类型
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 服务未注册
    #[error("Service '{type_name}' is not registered")]
    ServiceNotRegistered {
        type_id: TypeId,
        type_name: &'static str,
    },
    /// 类型转换失败
    #[error("Type cast failed: expected '{expected}', factory produced '{actual}'")]
    TypeCastFailed {
        expected: &'static str,
        actual: &'static str,
    },
    /// 服务创建失败
    #[error("Failed to create service '{service_type}': {reason}")]
    ServiceCreationFailed {
        service_type: &'static str,
        reason: String,
    },
    /// 循环依赖
    #[error("Circular dependency detected in chain: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<&'static str> },
    /// 容器已释放（弱引用无法升级）
    #[error("Service container has been dropped")]
    ContainerDropped,
}

impl ContainerError {
    /// 为服务类型 `T` 构造创建失败错误
    pub fn creation_failed<T: ?Sized>(reason: impl Into<String>) -> Self {
        ContainerError::ServiceCreationFailed {
            service_type: type_name::<T>(),
            reason: reason.into(),
        }
    }
}

/// 由容器构造的服务
///
/// 相当于容器对构造函数依赖图的解析：实现者从容器中取出自己的依赖。
pub trait Injectable: Send + Sync + Sized + 'static {
    /// 注册方式；`Computed` 走 [`ServiceContainer::add_computed_service`]
    const KIND: ServiceKind = ServiceKind::Plain;

    fn inject(container: &ServiceContainer) -> Result<Self, ContainerError>;
}

type ErasedService = Arc<dyn Any + Send + Sync>;

/// 服务工厂trait
pub trait ServiceFactory: Send + Sync {
    /// 创建服务实例
    fn create(&self, container: &ServiceContainer) -> Result<ErasedService, ContainerError>;

    /// 获取服务类型ID
    fn service_type_id(&self) -> TypeId;

    /// 获取服务类型名称（用于错误信息）
    fn service_type_name(&self) -> &'static str;
}

/// 函数式服务工厂
pub struct FnServiceFactory<F, T> {
    factory_fn: F,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<F, T> FnServiceFactory<F, T> {
    pub fn new(factory_fn: F) -> Self {
        Self {
            factory_fn,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<F, T> ServiceFactory for FnServiceFactory<F, T>
where
    F: Fn(&ServiceContainer) -> Result<T, ContainerError> + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn create(&self, container: &ServiceContainer) -> Result<ErasedService, ContainerError> {
        let service = (self.factory_fn)(container)?;
        Ok(Arc::new(service))
    }

    fn service_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn service_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// 服务注册信息
#[derive(Clone)]
struct Registration {
    factory: Arc<dyn ServiceFactory>,
    lifetime: ServiceLifetime,
}

/// 注册表快照中的一项
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServiceDescriptor {
    pub type_name: &'static str,
    pub lifetime: ServiceLifetime,
}

/// 内部容器统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    transient_creations: AtomicU64,
    skipped_registrations: AtomicU64,
}

struct ContainerInner {
    /// 服务工厂注册表
    registrations: DashMap<TypeId, Registration>,
    /// 单例实例缓存 - 使用OnceCell确保只创建一次
    singletons: DashMap<TypeId, Arc<OnceCell<ErasedService>>>,
    stats: InnerStats,
}

thread_local! {
    // 解析是同步的，工厂内的嵌套解析总在同一线程上发生
    static RESOLUTION_STACK: RefCell<Vec<(TypeId, &'static str)>> = const { RefCell::new(Vec::new()) };
}

/// 解析栈守卫，离开作用域时弹出当前类型
struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(type_id: TypeId, name: &'static str) -> Result<Self, ContainerError> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|(id, _)| *id == type_id) {
                let mut chain: Vec<&'static str> = stack.iter().map(|(_, n)| *n).collect();
                chain.push(name);
                return Err(ContainerError::CircularDependency { chain });
            }
            stack.push((type_id, name));
            Ok(ResolutionGuard)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// 服务容器
#[derive(Clone)]
pub struct ServiceContainer {
    inner: Arc<ContainerInner>,
}

/// 容器弱引用，用于需要在运行期访问容器、但又被容器自身持有的闭包
#[derive(Clone)]
pub struct WeakServiceContainer {
    inner: Weak<ContainerInner>,
}

impl WeakServiceContainer {
    pub fn upgrade(&self) -> Result<ServiceContainer, ContainerError> {
        self.inner
            .upgrade()
            .map(|inner| ServiceContainer { inner })
            .ok_or(ContainerError::ContainerDropped)
    }
}

impl ServiceContainer {
    /// 创建新的容器实例
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registrations: DashMap::new(),
                singletons: DashMap::new(),
                stats: InnerStats::default(),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakServiceContainer {
        WeakServiceContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// 注册单例服务（若该键尚未注册）
    ///
    /// 工厂在首次解析时运行，之后返回缓存的实例。返回值表示本次是否真正注册。
    pub fn try_add_singleton<T, F>(&self, factory: F) -> bool
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&ServiceContainer) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.try_add::<T>(
            Arc::new(FnServiceFactory::<F, T>::new(factory)),
            ServiceLifetime::Singleton,
        )
    }

    /// 注册瞬态服务（若该键尚未注册），每次解析都会运行工厂
    pub fn try_add_transient<T, F>(&self, factory: F) -> bool
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&ServiceContainer) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.try_add::<T>(
            Arc::new(FnServiceFactory::<F, T>::new(factory)),
            ServiceLifetime::Transient,
        )
    }

    /// 注册计算服务
    ///
    /// 具体服务 `Arc<T>` 作为单例注册，能力键 `I` 通过 `project` 映射到同一实例。
    /// 两个键各自遵循 add-if-absent；返回值表示能力键是否为本次新增。
    pub fn add_computed_service<I, T, F>(&self, factory: F, project: fn(Arc<T>) -> I) -> bool
    where
        I: Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
        F: Fn(&ServiceContainer) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.try_add_singleton::<Arc<T>, _>(move |container| factory(container).map(Arc::new));
        self.try_add_singleton::<I, _>(move |container| container.resolve::<Arc<T>>().map(project))
    }

    fn try_add<T: 'static>(&self, factory: Arc<dyn ServiceFactory>, lifetime: ServiceLifetime) -> bool {
        match self.inner.registrations.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => {
                self.inner
                    .stats
                    .skipped_registrations
                    .fetch_add(1, Ordering::Relaxed);
                tracing::trace!(service = type_name::<T>(), "Registration skipped, key already present");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(Registration { factory, lifetime });
                tracing::trace!(service = type_name::<T>(), ?lifetime, "Service registered");
                true
            }
        }
    }

    /// 解析服务 - 主要API
    pub fn resolve<T: Clone + Send + Sync + 'static>(&self) -> Result<T, ContainerError> {
        self.inner
            .stats
            .total_resolutions
            .fetch_add(1, Ordering::Relaxed);

        let type_id = TypeId::of::<T>();
        // 先克隆出注册信息再释放分片锁，工厂内部可能再次访问注册表
        let registration = self
            .inner
            .registrations
            .get(&type_id)
            .map(|entry| entry.value().clone())
            .ok_or(ContainerError::ServiceNotRegistered {
                type_id,
                type_name: type_name::<T>(),
            })?;

        let service = match registration.lifetime {
            ServiceLifetime::Singleton => self.resolve_singleton(type_id, &registration.factory)?,
            ServiceLifetime::Transient => {
                let _guard = ResolutionGuard::enter(type_id, type_name::<T>())?;
                self.inner
                    .stats
                    .transient_creations
                    .fetch_add(1, Ordering::Relaxed);
                registration.factory.create(self)?
            }
        };

        // 安全的类型转换
        service
            .as_ref()
            .downcast_ref::<T>()
            .cloned()
            .ok_or(ContainerError::TypeCastFailed {
                expected: type_name::<T>(),
                actual: registration.factory.service_type_name(),
            })
    }

    fn resolve_singleton(
        &self,
        type_id: TypeId,
        factory: &Arc<dyn ServiceFactory>,
    ) -> Result<ErasedService, ContainerError> {
        let cell = self
            .inner
            .singletons
            .entry(type_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if let Some(service) = cell.get() {
            self.inner.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(service.clone());
        }

        self.inner.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let _guard = ResolutionGuard::enter(type_id, factory.service_type_name())?;
        cell.get_or_try_init(|| factory.create(self)).cloned()
    }

    /// 检查服务是否已注册
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.inner.registrations.contains_key(&TypeId::of::<T>())
    }

    /// 获取服务的注册生命周期
    pub fn lifetime_of<T: 'static>(&self) -> Option<ServiceLifetime> {
        self.inner
            .registrations
            .get(&TypeId::of::<T>())
            .map(|entry| entry.lifetime)
    }

    /// 注册表快照，按类型名排序
    pub fn registrations(&self) -> Vec<ServiceDescriptor> {
        let mut descriptors: Vec<ServiceDescriptor> = self
            .inner
            .registrations
            .iter()
            .map(|entry| ServiceDescriptor {
                type_name: entry.factory.service_type_name(),
                lifetime: entry.lifetime,
            })
            .collect();
        descriptors.sort();
        descriptors
    }

    /// 获取容器统计信息
    pub fn get_stats(&self) -> ContainerStats {
        let stats = &self.inner.stats;
        ContainerStats {
            total_resolutions: stats.total_resolutions.load(Ordering::Relaxed),
            cache_hits: stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: stats.cache_misses.load(Ordering::Relaxed),
            transient_creations: stats.transient_creations.load(Ordering::Relaxed),
            skipped_registrations: stats.skipped_registrations.load(Ordering::Relaxed),
            registered_services: self.inner.registrations.len(),
        }
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("registered_services", &self.inner.registrations.len())
            .finish()
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default)]
pub struct ContainerStats {
    pub total_resolutions: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub transient_creations: u64,
    /// 因键已存在而被忽略的注册次数
    pub skipped_registrations: u64,
    pub registered_services: usize,
}

impl ContainerStats {
    /// 获取缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

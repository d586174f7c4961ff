//! 实时状态注册
//!
//! 把更新器、选项工厂与状态容器登记到 [`ServiceContainer`]。所有注册都是
//! "不存在才添加"：同一个键重复注册不会覆盖先前的注册，因此整个过程是幂等的。
//!
//! 注册键：
//! - 更新器：`Arc<dyn StateUpdater<S>>` / `Arc<dyn LocalStateUpdater<L, S>>`（单例）
//! - 选项：`Arc<StateOptions<S>>` / `Arc<LocalStateOptions<L, S>>`（单例，首次解析时构造）
//! - 容器：`Arc<dyn LiveState<S>>`，双参数形态另有 `Arc<dyn LocalLiveState<L, S>>`（瞬态）

use std::any::type_name;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::binder::Binder;
use super::catalog::{TypeTag, UpdaterModule};
use super::options::{
    build_options, customize_from_hook, inline_update_fn, local_state_update_fn, state_update_fn, Customize,
    LiveStateOptions, LocalStateOptions, OptionsHook, StateOptions, UpdateFn,
};
use super::scanner::{self, BindingDescriptor};
use super::state::{LiveState, LiveStateCell, LocalLiveState, LocalLiveStateCell, StateValue};
use super::updater::{LocalStateUpdater, StateUpdater};
use crate::errors::RegistrationError;
use crate::infrastructure::{ContainerError, Injectable, ServiceContainer, ServiceKind};

type StateCustomize<S> = Customize<dyn LiveState<S>, S>;
type LocalStateCustomize<L, S> = Customize<dyn LocalLiveState<L, S>, S>;

impl ServiceContainer {
    /// 注册 `Arc<dyn StateUpdater<S>>`，实现类型为 `U`
    pub fn add_live_state_updater<S, U>(&self) -> &Self
    where
        S: StateValue,
        U: StateUpdater<S> + Injectable,
    {
        bind_state_updater::<S, U>(self);
        self
    }

    /// 注册 `Arc<dyn LocalStateUpdater<L, S>>`，实现类型为 `U`
    pub fn add_local_live_state_updater<L, S, U>(&self) -> &Self
    where
        L: StateValue,
        S: StateValue,
        U: LocalStateUpdater<L, S> + Injectable,
    {
        bind_local_state_updater::<L, S, U>(self);
        self
    }

    /// 完整绑定：更新器、选项与 `LiveState<S>` 容器
    pub fn add_live_state<S, U>(&self) -> &Self
    where
        S: StateValue,
        U: StateUpdater<S> + Injectable,
    {
        bind_live_state::<S, U>(self, None);
        self
    }

    /// 同 [`add_live_state`](Self::add_live_state)，选项构造完成前运行 `customize`
    pub fn add_live_state_with<S, U, F>(&self, customize: F) -> &Self
    where
        S: StateValue,
        U: StateUpdater<S> + Injectable,
        F: Fn(&ServiceContainer, &mut StateOptions<S>) + Send + Sync + 'static,
    {
        bind_live_state::<S, U>(self, Some(Arc::new(customize)));
        self
    }

    /// 双参数形态的完整绑定，同时注册 `LocalLiveState<L, S>` 与 `LiveState<S>`
    pub fn add_local_live_state<L, S, U>(&self) -> &Self
    where
        L: StateValue,
        S: StateValue,
        U: LocalStateUpdater<L, S> + Injectable,
    {
        bind_local_live_state::<L, S, U>(self, None);
        self
    }

    pub fn add_local_live_state_with<L, S, U, F>(&self, customize: F) -> &Self
    where
        L: StateValue,
        S: StateValue,
        U: LocalStateUpdater<L, S> + Injectable,
        F: Fn(&ServiceContainer, &mut LocalStateOptions<L, S>) + Send + Sync + 'static,
    {
        bind_local_live_state::<L, S, U>(self, Some(Arc::new(customize)));
        self
    }

    /// 直接以更新函数注册 `LiveState<S>`，不经过更新器
    pub fn add_live_state_fn<S, F, Fut>(&self, update: F) -> &Self
    where
        S: StateValue,
        F: Fn(ServiceContainer, Arc<dyn LiveState<S>>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<S>> + Send + 'static,
    {
        bind_live_state_fn::<S>(self, inline_update_fn(self, update), None);
        self
    }

    pub fn add_live_state_fn_with<S, F, Fut, C>(&self, update: F, customize: C) -> &Self
    where
        S: StateValue,
        F: Fn(ServiceContainer, Arc<dyn LiveState<S>>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<S>> + Send + 'static,
        C: Fn(&ServiceContainer, &mut StateOptions<S>) + Send + Sync + 'static,
    {
        bind_live_state_fn::<S>(self, inline_update_fn(self, update), Some(Arc::new(customize)));
        self
    }

    pub fn add_local_live_state_fn<L, S, F, Fut>(&self, update: F) -> &Self
    where
        L: StateValue,
        S: StateValue,
        F: Fn(ServiceContainer, Arc<dyn LocalLiveState<L, S>>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<S>> + Send + 'static,
    {
        bind_local_live_state_fn::<L, S>(self, inline_update_fn(self, update), None);
        self
    }

    pub fn add_local_live_state_fn_with<L, S, F, Fut, C>(&self, update: F, customize: C) -> &Self
    where
        L: StateValue,
        S: StateValue,
        F: Fn(ServiceContainer, Arc<dyn LocalLiveState<L, S>>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<S>> + Send + 'static,
        C: Fn(&ServiceContainer, &mut LocalStateOptions<L, S>) + Send + Sync + 'static,
    {
        bind_local_live_state_fn::<L, S>(self, inline_update_fn(self, update), Some(Arc::new(customize)));
        self
    }

    /// 以运行期类型标识注册更新器，效果与 [`add_live_state_updater`](Self::add_live_state_updater) 相同
    pub fn add_live_state_updater_dyn(&self, state: TypeTag, updater: TypeTag) -> Result<&Self, RegistrationError> {
        let binder = Binder::lookup(updater, None, state)?;
        (binder.register_updater)(self);
        Ok(self)
    }

    pub fn add_local_live_state_updater_dyn(
        &self,
        local: TypeTag,
        state: TypeTag,
        updater: TypeTag,
    ) -> Result<&Self, RegistrationError> {
        let binder = Binder::lookup(updater, Some(local), state)?;
        (binder.register_updater)(self);
        Ok(self)
    }

    /// 以运行期类型标识完成完整绑定，效果与强类型入口相同
    pub fn add_live_state_dyn(
        &self,
        state: TypeTag,
        updater: TypeTag,
        hook: Option<OptionsHook>,
    ) -> Result<&Self, RegistrationError> {
        let binder = Binder::lookup(updater, None, state)?;
        (binder.register_live_state)(self, hook);
        Ok(self)
    }

    pub fn add_local_live_state_dyn(
        &self,
        local: TypeTag,
        state: TypeTag,
        updater: TypeTag,
        hook: Option<OptionsHook>,
    ) -> Result<&Self, RegistrationError> {
        let binder = Binder::lookup(updater, Some(local), state)?;
        (binder.register_live_state)(self, hook);
        Ok(self)
    }

    /// 按描述的形态分派到对应的动态入口
    pub fn add_binding(
        &self,
        descriptor: &BindingDescriptor,
        hook: Option<OptionsHook>,
    ) -> Result<&Self, RegistrationError> {
        match descriptor.local {
            Some(local) => self.add_local_live_state_dyn(local, descriptor.state, descriptor.updater, hook),
            None => self.add_live_state_dyn(descriptor.state, descriptor.updater, hook),
        }
    }

    /// 扫描模块并注册找到的全部更新器
    ///
    /// 遇到第一个无法绑定的描述即中止并返回错误。
    pub fn auto_add_live_state(
        &self,
        module: &UpdaterModule,
        hook: Option<OptionsHook>,
    ) -> Result<&Self, RegistrationError> {
        tracing::info!(module = module.path(), "Registering live state updaters");
        let mut registered = 0usize;
        for descriptor in scanner::scan(module) {
            tracing::info!("+ {}", descriptor.updater.name());
            self.add_binding(&descriptor, hook.clone())?;
            registered += 1;
        }
        tracing::debug!(module = module.path(), registered, "Live state scan finished");
        Ok(self)
    }
}

pub(crate) fn bind_state_updater<S, U>(container: &ServiceContainer) -> bool
where
    S: StateValue,
    U: StateUpdater<S> + Injectable,
{
    let added = match U::KIND {
        ServiceKind::Computed => container.add_computed_service::<Arc<dyn StateUpdater<S>>, U, _>(U::inject, |updater| {
            updater as Arc<dyn StateUpdater<S>>
        }),
        ServiceKind::Plain => container.try_add_singleton::<Arc<dyn StateUpdater<S>>, _>(|c| {
            U::inject(c).map(|updater| Arc::new(updater) as Arc<dyn StateUpdater<S>>)
        }),
    };
    tracing::debug!(
        updater = type_name::<U>(),
        state = type_name::<S>(),
        kind = ?U::KIND,
        added,
        "Updater registration"
    );
    added
}

pub(crate) fn bind_local_state_updater<L, S, U>(container: &ServiceContainer) -> bool
where
    L: StateValue,
    S: StateValue,
    U: LocalStateUpdater<L, S> + Injectable,
{
    let added = match U::KIND {
        ServiceKind::Computed => container.add_computed_service::<Arc<dyn LocalStateUpdater<L, S>>, U, _>(
            U::inject,
            |updater| updater as Arc<dyn LocalStateUpdater<L, S>>,
        ),
        ServiceKind::Plain => container.try_add_singleton::<Arc<dyn LocalStateUpdater<L, S>>, _>(|c| {
            U::inject(c).map(|updater| Arc::new(updater) as Arc<dyn LocalStateUpdater<L, S>>)
        }),
    };
    tracing::debug!(
        updater = type_name::<U>(),
        local = type_name::<L>(),
        state = type_name::<S>(),
        kind = ?U::KIND,
        added,
        "Local updater registration"
    );
    added
}

pub(crate) fn bind_live_state<S, U>(container: &ServiceContainer, customize: Option<StateCustomize<S>>)
where
    S: StateValue,
    U: StateUpdater<S> + Injectable,
{
    bind_state_updater::<S, U>(container);
    register_state_container::<S>(container);
    // 更新器在选项首次构造时才解析，扫描阶段不会创建任何实例
    register_options::<dyn LiveState<S>, S, _>(
        container,
        |c| c.resolve::<Arc<dyn StateUpdater<S>>>().map(state_update_fn),
        customize,
    );
}

pub(crate) fn bind_local_live_state<L, S, U>(container: &ServiceContainer, customize: Option<LocalStateCustomize<L, S>>)
where
    L: StateValue,
    S: StateValue,
    U: LocalStateUpdater<L, S> + Injectable,
{
    bind_local_state_updater::<L, S, U>(container);
    register_local_state_containers::<L, S>(container);
    register_options::<dyn LocalLiveState<L, S>, S, _>(
        container,
        |c| c.resolve::<Arc<dyn LocalStateUpdater<L, S>>>().map(local_state_update_fn),
        customize,
    );
}

fn bind_live_state_fn<S: StateValue>(
    container: &ServiceContainer,
    update: UpdateFn<dyn LiveState<S>, S>,
    customize: Option<StateCustomize<S>>,
) {
    register_state_container::<S>(container);
    register_options::<dyn LiveState<S>, S, _>(container, move |_| Ok(update.clone()), customize);
}

fn bind_local_live_state_fn<L: StateValue, S: StateValue>(
    container: &ServiceContainer,
    update: UpdateFn<dyn LocalLiveState<L, S>, S>,
    customize: Option<LocalStateCustomize<L, S>>,
) {
    register_local_state_containers::<L, S>(container);
    register_options::<dyn LocalLiveState<L, S>, S, _>(container, move |_| Ok(update.clone()), customize);
}

/// 类型擦除钩子到强类型定制的适配，供分发表使用
pub(crate) fn hook_to_customize<H, S>(hook: Option<OptionsHook>) -> Option<Customize<H, S>>
where
    H: ?Sized + 'static,
    S: StateValue,
{
    hook.map(customize_from_hook)
}

fn register_options<H, S, F>(container: &ServiceContainer, update_fn: F, customize: Option<Customize<H, S>>) -> bool
where
    H: ?Sized + Send + Sync + 'static,
    S: StateValue,
    F: Fn(&ServiceContainer) -> Result<UpdateFn<H, S>, ContainerError> + Send + Sync + 'static,
{
    let added = container.try_add_singleton::<Arc<LiveStateOptions<H, S>>, _>(move |c| {
        let update = update_fn(c)?;
        Ok(Arc::new(build_options(c, update, customize.as_ref())))
    });
    tracing::debug!(state = type_name::<S>(), handle = type_name::<H>(), added, "Options registration");
    added
}

fn register_state_container<S: StateValue>(container: &ServiceContainer) -> bool {
    container.try_add_transient::<Arc<dyn LiveState<S>>, _>(|c| {
        let options = c.resolve::<Arc<StateOptions<S>>>()?;
        Ok(LiveStateCell::new(options)? as Arc<dyn LiveState<S>>)
    })
}

fn register_local_state_containers<L: StateValue, S: StateValue>(container: &ServiceContainer) -> bool {
    let local_added = container.try_add_transient::<Arc<dyn LocalLiveState<L, S>>, _>(|c| {
        let options = c.resolve::<Arc<LocalStateOptions<L, S>>>()?;
        Ok(LocalLiveStateCell::new(options)? as Arc<dyn LocalLiveState<L, S>>)
    });
    // 单参数键落到同一个双参数实现上，共用同一份选项
    let state_added = container.try_add_transient::<Arc<dyn LiveState<S>>, _>(|c| {
        let options = c.resolve::<Arc<LocalStateOptions<L, S>>>()?;
        Ok(LocalLiveStateCell::new(options)? as Arc<dyn LiveState<S>>)
    });
    tracing::debug!(
        local = type_name::<L>(),
        state = type_name::<S>(),
        local_added,
        state_added,
        "Local live state container registration"
    );
    local_added
}

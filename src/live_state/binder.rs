//! 类型标识到注册函数的分发表
//!
//! 扫描器只拿得到运行期的 [`TypeTag`]，而注册本身是泛型代码。每个
//! [`live_state_updater!`](crate::live_state_updater) 调用在编译期单态化出一行
//! [`Binder`]，动态入口据 (updater, local?, state) 三元组查表后调用与强类型入口
//! 完全相同的代码。

use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use super::catalog::TypeTag;
use super::options::OptionsHook;
use super::registrar;
use super::state::StateValue;
use super::updater::{LocalStateUpdater, StateUpdater};
use crate::errors::RegistrationError;
use crate::infrastructure::{Injectable, ServiceContainer};

/// 分发表中的一行
pub struct Binder {
    pub updater: TypeTag,
    pub local: Option<TypeTag>,
    pub state: TypeTag,
    pub register_updater: fn(&ServiceContainer),
    pub register_live_state: fn(&ServiceContainer, Option<OptionsHook>),
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("updater", &self.updater)
            .field("local", &self.local)
            .field("state", &self.state)
            .finish()
    }
}

pub struct BinderReg(pub &'static Binder);

inventory::collect!(BinderReg);

type BinderKey = (TypeId, Option<TypeId>, TypeId);

static BINDERS: Lazy<HashMap<BinderKey, &'static Binder>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for reg in inventory::iter::<BinderReg> {
        let binder = reg.0;
        let key = (binder.updater.id(), binder.local.map(|t| t.id()), binder.state.id());
        // 同一三元组重复声明时保留第一行，各行的单态化代码相同
        table.entry(key).or_insert(binder);
    }
    tracing::debug!(rows = table.len(), "Live state dispatch table built");
    table
});

impl Binder {
    /// 按 (updater, local?, state) 查找分发行
    pub fn lookup(
        updater: TypeTag,
        local: Option<TypeTag>,
        state: TypeTag,
    ) -> Result<&'static Binder, RegistrationError> {
        let key = (updater.id(), local.map(|t| t.id()), state.id());
        BINDERS
            .get(&key)
            .copied()
            .ok_or_else(|| RegistrationError::BindingNotFound {
                updater: updater.name(),
                local: local.map(|t| t.name()),
                state: state.name(),
            })
    }

    /// 表中的全部行数
    pub fn table_len() -> usize {
        BINDERS.len()
    }
}

pub fn register_state_updater<S, U>(container: &ServiceContainer)
where
    S: StateValue,
    U: StateUpdater<S> + Injectable,
{
    registrar::bind_state_updater::<S, U>(container);
}

pub fn register_local_state_updater<L, S, U>(container: &ServiceContainer)
where
    L: StateValue,
    S: StateValue,
    U: LocalStateUpdater<L, S> + Injectable,
{
    registrar::bind_local_state_updater::<L, S, U>(container);
}

pub fn register_live_state<S, U>(container: &ServiceContainer, hook: Option<OptionsHook>)
where
    S: StateValue,
    U: StateUpdater<S> + Injectable,
{
    registrar::bind_live_state::<S, U>(container, registrar::hook_to_customize(hook));
}

pub fn register_local_live_state<L, S, U>(container: &ServiceContainer, hook: Option<OptionsHook>)
where
    L: StateValue,
    S: StateValue,
    U: LocalStateUpdater<L, S> + Injectable,
{
    registrar::bind_local_live_state::<L, S, U>(container, registrar::hook_to_customize(hook));
}

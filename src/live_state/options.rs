//! 实时状态选项
//!
//! 每个 (L?, S) 组合在容器中对应一个单例选项对象。选项工厂总是先填充
//! `updater`，最后才运行调用方提供的定制钩子，钩子看到的是完整的默认选项。

use futures_util::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::state::{LiveState, LocalLiveState, StateValue};
use super::updater::{LocalStateUpdater, StateUpdater};
use crate::infrastructure::ServiceContainer;

/// 更新函数：接收状态句柄与取消信号，异步返回下一个状态值
pub type UpdateFn<H, S> =
    Arc<dyn Fn(Arc<H>, CancellationToken) -> BoxFuture<'static, anyhow::Result<S>> + Send + Sync>;

/// 实时状态选项，`H` 为传给更新函数的状态句柄类型
pub struct LiveStateOptions<H: ?Sized, S> {
    pub updater: Option<UpdateFn<H, S>>,
    /// 每次重新计算前的等待时间
    pub update_delay: Option<Duration>,
    /// 首次更新完成前发布的值
    pub initial_value: Option<S>,
}

pub type StateOptions<S> = LiveStateOptions<dyn LiveState<S>, S>;

pub type LocalStateOptions<L, S> = LiveStateOptions<dyn LocalLiveState<L, S>, S>;

impl<H: ?Sized, S> Default for LiveStateOptions<H, S> {
    fn default() -> Self {
        Self {
            updater: None,
            update_delay: None,
            initial_value: None,
        }
    }
}

impl<H: ?Sized, S: fmt::Debug> fmt::Debug for LiveStateOptions<H, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveStateOptions")
            .field("updater", &self.updater.as_ref().map(|_| "<fn>"))
            .field("update_delay", &self.update_delay)
            .field("initial_value", &self.initial_value)
            .finish()
    }
}

/// 与状态类型无关的选项视图，供扫描注册路径上的定制钩子使用
pub trait ErasedOptions: Send {
    fn has_updater(&self) -> bool;

    fn update_delay_mut(&mut self) -> &mut Option<Duration>;

    fn state_type_name(&self) -> &'static str;

    /// 向下转型到具体的 `LiveStateOptions<H, S>`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<H: ?Sized + 'static, S: StateValue> ErasedOptions for LiveStateOptions<H, S> {
    fn has_updater(&self) -> bool {
        self.updater.is_some()
    }

    fn update_delay_mut(&mut self) -> &mut Option<Duration> {
        &mut self.update_delay
    }

    fn state_type_name(&self) -> &'static str {
        std::any::type_name::<S>()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 类型擦除的定制钩子
pub type OptionsHook = Arc<dyn Fn(&ServiceContainer, &mut dyn ErasedOptions) + Send + Sync>;

/// 强类型的定制钩子
pub type Customize<H, S> = Arc<dyn Fn(&ServiceContainer, &mut LiveStateOptions<H, S>) + Send + Sync>;

/// 把类型擦除的钩子适配为某个具体选项类型上的钩子
pub fn customize_from_hook<H, S>(hook: OptionsHook) -> Customize<H, S>
where
    H: ?Sized + 'static,
    S: StateValue,
{
    Arc::new(move |container: &ServiceContainer, options: &mut LiveStateOptions<H, S>| {
        hook(container, options)
    })
}

/// 构造选项：先填充更新函数，再运行定制钩子
pub fn build_options<H, S>(
    container: &ServiceContainer,
    updater: UpdateFn<H, S>,
    customize: Option<&Customize<H, S>>,
) -> LiveStateOptions<H, S>
where
    H: ?Sized,
{
    let mut options = LiveStateOptions {
        updater: Some(updater),
        ..Default::default()
    };
    if let Some(customize) = customize {
        customize(container, &mut options);
    }
    options
}

/// 转发到 [`StateUpdater::update`] 的更新函数
pub fn state_update_fn<S: StateValue>(updater: Arc<dyn StateUpdater<S>>) -> UpdateFn<dyn LiveState<S>, S> {
    Arc::new(move |live: Arc<dyn LiveState<S>>, cancel: CancellationToken| {
        let updater = updater.clone();
        async move { updater.update(live, cancel).await }.boxed()
    })
}

/// 转发到 [`LocalStateUpdater::update`] 的更新函数
pub fn local_state_update_fn<L: StateValue, S: StateValue>(
    updater: Arc<dyn LocalStateUpdater<L, S>>,
) -> UpdateFn<dyn LocalLiveState<L, S>, S> {
    Arc::new(move |live: Arc<dyn LocalLiveState<L, S>>, cancel: CancellationToken| {
        let updater = updater.clone();
        async move { updater.update(live, cancel).await }.boxed()
    })
}

/// 包装调用方直接提供的更新函数
///
/// 函数在运行期还会拿到容器本身；容器通过弱引用捕获，选项单例不会反向持有容器。
pub fn inline_update_fn<H, S, F, Fut>(container: &ServiceContainer, update: F) -> UpdateFn<H, S>
where
    H: ?Sized + Send + Sync + 'static,
    S: StateValue,
    F: Fn(ServiceContainer, Arc<H>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<S>> + Send + 'static,
{
    let container = container.downgrade();
    let update = Arc::new(update);
    Arc::new(move |live: Arc<H>, cancel: CancellationToken| {
        let container = container.clone();
        let update = update.clone();
        async move {
            let container = container.upgrade()?;
            update(container, live, cancel).await
        }
        .boxed()
    })
}

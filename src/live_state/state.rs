//! 实时状态容器
//!
//! 持有缓存值，调用选项中的更新函数重新计算，并通过 `watch` 通道通知观察者。
//! 重新计算的调度（何时调用 [`LiveState::update`]）由外部驱动方负责。

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::options::{LocalStateOptions, StateOptions, UpdateFn};
use crate::errors::UpdateError;
use crate::infrastructure::ContainerError;

/// 可作为实时状态（或本地输入）的值
pub trait StateValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> StateValue for T {}

/// 实时状态
#[async_trait]
pub trait LiveState<S: StateValue>: Send + Sync {
    /// 当前已发布的值
    fn value(&self) -> Option<S>;

    /// 订阅已发布值的变化
    fn subscribe(&self) -> watch::Receiver<Option<S>>;

    /// 调用更新函数并发布结果
    ///
    /// 取消时返回 [`UpdateError::Cancelled`]，已发布的值保持不变。
    async fn update(&self, cancel: CancellationToken) -> Result<S, UpdateError>;

    /// 成功发布的次数
    fn update_count(&self) -> u64;

    /// 实现类型名
    fn implementation(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// 带本地输入的实时状态
pub trait LocalLiveState<L: StateValue, S: StateValue>: LiveState<S> {
    fn local(&self) -> Option<L>;

    fn set_local(&self, local: L);
}

/// 发布端：保存最新值与发布计数
struct Publisher<S> {
    sender: watch::Sender<Option<S>>,
    updates: AtomicU64,
}

impl<S: StateValue> Publisher<S> {
    fn new(initial: Option<S>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender,
            updates: AtomicU64::new(0),
        }
    }

    fn publish(&self, value: S) {
        self.sender.send_replace(Some(value));
        self.updates.fetch_add(1, Ordering::Relaxed);
    }
}

async fn drive_update<H: ?Sized, S: StateValue>(
    update: &UpdateFn<H, S>,
    handle: Arc<H>,
    delay: Option<Duration>,
    cancel: CancellationToken,
) -> Result<S, UpdateError> {
    if let Some(delay) = delay {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UpdateError::Cancelled),
        result = update(handle, cancel.clone()) => result.map_err(UpdateError::from),
    }
}

/// [`LiveState<S>`] 的默认实现
pub struct LiveStateCell<S: StateValue> {
    options: Arc<StateOptions<S>>,
    update: UpdateFn<dyn LiveState<S>, S>,
    publisher: Publisher<S>,
    me: Weak<LiveStateCell<S>>,
}

impl<S: StateValue> LiveStateCell<S> {
    pub fn new(options: Arc<StateOptions<S>>) -> Result<Arc<Self>, ContainerError> {
        let update = options
            .updater
            .clone()
            .ok_or_else(|| ContainerError::creation_failed::<Self>("options carry no update function"))?;
        let publisher = Publisher::new(options.initial_value.clone());
        Ok(Arc::new_cyclic(|me| Self {
            options,
            update,
            publisher,
            me: me.clone(),
        }))
    }

    pub fn options(&self) -> &Arc<StateOptions<S>> {
        &self.options
    }
}

#[async_trait]
impl<S: StateValue> LiveState<S> for LiveStateCell<S> {
    fn value(&self) -> Option<S> {
        self.publisher.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<S>> {
        self.publisher.sender.subscribe()
    }

    async fn update(&self, cancel: CancellationToken) -> Result<S, UpdateError> {
        let handle: Arc<dyn LiveState<S>> = self.me.upgrade().ok_or(UpdateError::Detached)?;
        let next = drive_update(&self.update, handle, self.options.update_delay, cancel).await?;
        self.publisher.publish(next.clone());
        Ok(next)
    }

    fn update_count(&self) -> u64 {
        self.publisher.updates.load(Ordering::Relaxed)
    }
}

/// [`LocalLiveState<L, S>`] 的默认实现
///
/// 同时作为 `LiveState<S>` 注册，只关心状态的调用方无需知道本地输入类型。
pub struct LocalLiveStateCell<L: StateValue, S: StateValue> {
    options: Arc<LocalStateOptions<L, S>>,
    update: UpdateFn<dyn LocalLiveState<L, S>, S>,
    local: RwLock<Option<L>>,
    publisher: Publisher<S>,
    me: Weak<LocalLiveStateCell<L, S>>,
}

impl<L: StateValue, S: StateValue> LocalLiveStateCell<L, S> {
    pub fn new(options: Arc<LocalStateOptions<L, S>>) -> Result<Arc<Self>, ContainerError> {
        let update = options
            .updater
            .clone()
            .ok_or_else(|| ContainerError::creation_failed::<Self>("options carry no update function"))?;
        let publisher = Publisher::new(options.initial_value.clone());
        Ok(Arc::new_cyclic(|me| Self {
            options,
            update,
            local: RwLock::new(None),
            publisher,
            me: me.clone(),
        }))
    }

    pub fn options(&self) -> &Arc<LocalStateOptions<L, S>> {
        &self.options
    }
}

#[async_trait]
impl<L: StateValue, S: StateValue> LiveState<S> for LocalLiveStateCell<L, S> {
    fn value(&self) -> Option<S> {
        self.publisher.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<S>> {
        self.publisher.sender.subscribe()
    }

    async fn update(&self, cancel: CancellationToken) -> Result<S, UpdateError> {
        let handle: Arc<dyn LocalLiveState<L, S>> = self.me.upgrade().ok_or(UpdateError::Detached)?;
        let next = drive_update(&self.update, handle, self.options.update_delay, cancel).await?;
        self.publisher.publish(next.clone());
        Ok(next)
    }

    fn update_count(&self) -> u64 {
        self.publisher.updates.load(Ordering::Relaxed)
    }
}

impl<L: StateValue, S: StateValue> LocalLiveState<L, S> for LocalLiveStateCell<L, S> {
    fn local(&self) -> Option<L> {
        self.local.read().clone()
    }

    fn set_local(&self, local: L) {
        *self.local.write() = Some(local);
    }
}

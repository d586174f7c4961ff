//! 更新器能力定义
//!
//! 两种能力形态：
//! - [`StateUpdater<S>`]：只依赖状态类型 `S`
//! - [`LocalStateUpdater<L, S>`]：由本地输入 `L` 产生状态 `S`
//!
//! 两者都特化自无参数的标记能力 [`Updater`]。

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::state::{LiveState, LocalLiveState, StateValue};

/// 更新器标记能力
pub trait Updater: Send + Sync + 'static {}

/// 能力形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityShape {
    /// `StateUpdater<S>`
    Single,
    /// `LocalStateUpdater<L, S>`
    Dual,
}

impl CapabilityShape {
    /// 该形态的泛型参数个数
    pub fn arity(self) -> usize {
        match self {
            CapabilityShape::Single => 1,
            CapabilityShape::Dual => 2,
        }
    }
}

/// 状态 `S` 的更新器
#[async_trait]
pub trait StateUpdater<S: StateValue>: Updater {
    /// 计算下一个状态值；应在 `cancel` 触发后尽快返回
    async fn update(&self, live: Arc<dyn LiveState<S>>, cancel: CancellationToken) -> anyhow::Result<S>;
}

/// 由本地输入 `L` 产生状态 `S` 的更新器
#[async_trait]
pub trait LocalStateUpdater<L: StateValue, S: StateValue>: Updater {
    async fn update(
        &self,
        live: Arc<dyn LocalLiveState<L, S>>,
        cancel: CancellationToken,
    ) -> anyhow::Result<S>;
}

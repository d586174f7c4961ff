//! 示例更新器，供命令行演示使用

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::{ContainerError, Injectable, ServiceContainer, ServiceKind};
use crate::live_state::{LiveState, LocalLiveState, LocalStateUpdater, StateUpdater, Updater};
use crate::live_state_updater;

/// [`UpdaterModule::linked`](crate::live_state::UpdaterModule::linked) 使用的模块路径
pub const DEMO_MODULE: &str = module_path!();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordCount(pub usize);

/// 每次更新递增的计数器
#[derive(Debug, Default)]
pub struct TickUpdater {
    ticks: AtomicU64,
}

impl Updater for TickUpdater {}

impl Injectable for TickUpdater {
    fn inject(_: &ServiceContainer) -> Result<Self, ContainerError> {
        Ok(Self::default())
    }
}

#[async_trait]
impl StateUpdater<Tick> for TickUpdater {
    async fn update(&self, _live: Arc<dyn LiveState<Tick>>, _cancel: CancellationToken) -> anyhow::Result<Tick> {
        Ok(Tick(self.ticks.fetch_add(1, Ordering::Relaxed) + 1))
    }
}

live_state_updater!(pub TickUpdater => Tick);

/// 统计本地输入中的单词数
#[derive(Debug, Default)]
pub struct WordCountUpdater;

impl Updater for WordCountUpdater {}

impl Injectable for WordCountUpdater {
    const KIND: ServiceKind = ServiceKind::Computed;

    fn inject(_: &ServiceContainer) -> Result<Self, ContainerError> {
        Ok(Self)
    }
}

#[async_trait]
impl LocalStateUpdater<String, WordCount> for WordCountUpdater {
    async fn update(
        &self,
        live: Arc<dyn LocalLiveState<String, WordCount>>,
        _cancel: CancellationToken,
    ) -> anyhow::Result<WordCount> {
        let text = live
            .local()
            .ok_or_else(|| anyhow::anyhow!("no text has been entered yet"))?;
        Ok(WordCount(text.split_whitespace().count()))
    }
}

live_state_updater!(pub WordCountUpdater => String, WordCount);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::UpdateError;
    use crate::live_state::{scan, CapabilityShape, UpdaterModule};

    #[test]
    fn test_demo_module_is_linked() {
        let module = UpdaterModule::linked(DEMO_MODULE);
        let shapes: Vec<_> = scan(&module).map(|d| d.shape()).collect();

        assert!(shapes.contains(&CapabilityShape::Single));
        assert!(shapes.contains(&CapabilityShape::Dual));
    }

    #[tokio::test]
    async fn test_demo_registration_end_to_end() {
        let container = ServiceContainer::new();
        container
            .auto_add_live_state(&UpdaterModule::linked(DEMO_MODULE), None)
            .unwrap();

        let ticks = container.resolve::<Arc<dyn LiveState<Tick>>>().unwrap();
        assert_eq!(ticks.update(CancellationToken::new()).await.unwrap(), Tick(1));
        assert_eq!(ticks.update(CancellationToken::new()).await.unwrap(), Tick(2));

        let words = container
            .resolve::<Arc<dyn LocalLiveState<String, WordCount>>>()
            .unwrap();
        let err = words.update(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, UpdateError::Updater(_)));

        words.set_local("live state demo".to_string());
        assert_eq!(words.update(CancellationToken::new()).await.unwrap(), WordCount(3));
    }
}

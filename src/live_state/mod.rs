//! 实时状态的自动发现与注册
//!
//! - [`updater`]: 两种更新器能力形态
//! - [`catalog`]: 链接期类型目录与 [`live_state_updater!`](crate::live_state_updater) 宏
//! - [`scanner`]: 从模块导出类型中找出更新器绑定
//! - [`binder`]: 类型标识到单态化注册函数的分发表
//! - [`registrar`]: 强类型与动态注册入口
//! - [`options`]: 选项对象与选项工厂
//! - [`state`]: 状态容器

pub mod binder;
pub mod catalog;
pub mod options;
pub mod registrar;
pub mod scanner;
pub mod state;
pub mod updater;

pub use binder::Binder;
pub use catalog::{
    Capability, CapabilityDef, ExportedType, TypeKind, TypeTag, UpdaterModule, Visibility,
};
pub use options::{
    Customize, ErasedOptions, LiveStateOptions, LocalStateOptions, OptionsHook, StateOptions,
    UpdateFn,
};
pub use scanner::{scan, BindingDescriptor};
pub use state::{LiveState, LiveStateCell, LocalLiveState, LocalLiveStateCell, StateValue};
pub use updater::{CapabilityShape, LocalStateUpdater, StateUpdater, Updater};

//! 链接期类型目录
//!
//! 每次 [`live_state_updater!`](crate::live_state_updater) 调用都会经由 `inventory`
//! 提交一条 [`ExportedType`] 与一条 [`Binder`](super::binder::Binder)。启动时按模块路径
//! 收集，得到扫描器所需的"模块导出类型"视图。

use std::any::TypeId;
use std::fmt;

/// 可放进静态数据的类型标识
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: fn() -> TypeId,
    name: fn() -> &'static str,
}

impl TypeTag {
    pub const fn of<T: ?Sized + 'static>() -> Self {
        TypeTag {
            id: TypeId::of::<T>,
            name: std::any::type_name::<T>,
        }
    }

    pub fn id(&self) -> TypeId {
        (self.id)()
    }

    pub fn name(&self) -> &'static str {
        (self.name)()
    }

    /// 去掉模块路径后的类型名
    pub fn short_name(&self) -> &'static str {
        let name = self.name();
        let base = name.split('<').next().unwrap_or(name);
        match base.rfind("::") {
            Some(pos) => &name[pos + 2..],
            None => name,
        }
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for TypeTag {}

impl std::hash::Hash for TypeTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 导出类型的可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// `pub`
    Public,
    /// `pub(crate)`、`pub(super)` 等受限可见性
    Restricted,
    /// 模块私有
    Private,
}

impl Visibility {
    /// 由 `stringify!($vis)` 的结果判定可见性
    pub const fn from_tokens(tokens: &str) -> Self {
        let bytes = tokens.as_bytes();
        if bytes.is_empty() {
            return Visibility::Private;
        }
        if bytes.len() == 3 && bytes[0] == b'p' && bytes[1] == b'u' && bytes[2] == b'b' {
            return Visibility::Public;
        }
        Visibility::Restricted
    }
}

/// 导出类型的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// 可由容器构造并共享的服务类型
    Service,
    /// 只描述能力、无法实例化的类型（例如 trait 对象）
    Abstract,
    /// 按值传递的数据类型，不作为共享服务注册
    Value,
}

/// 类型声明的能力定义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityDef {
    /// `StateUpdater<S>`
    StateUpdater,
    /// `LocalStateUpdater<L, S>`
    LocalStateUpdater,
    /// 与更新器无关的其他能力
    Other(&'static str),
}

impl CapabilityDef {
    /// 该定义是否特化自 [`Updater`](super::updater::Updater) 标记
    pub fn is_updater(self) -> bool {
        matches!(self, CapabilityDef::StateUpdater | CapabilityDef::LocalStateUpdater)
    }
}

/// 某个能力定义的一次具体特化
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    pub definition: CapabilityDef,
    pub args: &'static [TypeTag],
}

/// 模块导出的一个类型
#[derive(Debug, Clone, Copy)]
pub struct ExportedType {
    pub ty: TypeTag,
    pub module: &'static str,
    pub visibility: Visibility,
    pub kind: TypeKind,
    pub capabilities: &'static [Capability],
}

impl ExportedType {
    /// 是否实现了无参数的更新器标记
    pub fn implements_updater(&self) -> bool {
        self.capabilities.iter().any(|c| c.definition.is_updater())
    }
}

/// `inventory` 收集用的包装
pub struct ExportedTypeReg(pub &'static ExportedType);

inventory::collect!(ExportedTypeReg);

/// 被扫描的模块
#[derive(Debug, Clone)]
pub struct UpdaterModule {
    path: String,
    types: Vec<ExportedType>,
}

impl UpdaterModule {
    /// 空模块，类型由 [`with_type`](Self::with_type) 逐个加入
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            types: Vec::new(),
        }
    }

    /// 收集链接进来的、位于 `path` 及其子模块下的导出类型
    pub fn linked(path: &str) -> Self {
        let prefix = format!("{path}::");
        let mut types: Vec<ExportedType> = inventory::iter::<ExportedTypeReg>
            .into_iter()
            .map(|reg| *reg.0)
            .filter(|ty| ty.module == path || ty.module.starts_with(&prefix))
            .collect();
        // inventory 的链接顺序不固定，排序以保证日志可复现
        types.sort_by(|a, b| (a.module, a.ty.name()).cmp(&(b.module, b.ty.name())));
        Self {
            path: path.to_string(),
            types,
        }
    }

    pub fn with_type(mut self, ty: ExportedType) -> Self {
        self.types.push(ty);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn types(&self) -> &[ExportedType] {
        &self.types
    }
}

/// 声明更新器并登记到类型目录与分发表
///
/// ```ignore
/// live_state_updater!(pub PriceUpdater => Price);
/// live_state_updater!(pub GeoUpdater => Coords, Location);
/// ```
#[macro_export]
macro_rules! live_state_updater {
    ($vis:vis $updater:ty => $state:ty) => {
        const _: () = {
            static EXPORTED: $crate::live_state::catalog::ExportedType =
                $crate::live_state::catalog::ExportedType {
                    ty: $crate::live_state::catalog::TypeTag::of::<$updater>(),
                    module: ::core::module_path!(),
                    visibility: $crate::live_state::catalog::Visibility::from_tokens(
                        ::core::stringify!($vis),
                    ),
                    kind: $crate::live_state::catalog::TypeKind::Service,
                    capabilities: &[$crate::live_state::catalog::Capability {
                        definition: $crate::live_state::catalog::CapabilityDef::StateUpdater,
                        args: &[$crate::live_state::catalog::TypeTag::of::<$state>()],
                    }],
                };
            static BINDER: $crate::live_state::binder::Binder = $crate::live_state::binder::Binder {
                updater: $crate::live_state::catalog::TypeTag::of::<$updater>(),
                local: ::core::option::Option::None,
                state: $crate::live_state::catalog::TypeTag::of::<$state>(),
                register_updater: $crate::live_state::binder::register_state_updater::<$state, $updater>,
                register_live_state: $crate::live_state::binder::register_live_state::<$state, $updater>,
            };
            $crate::__private::inventory::submit! {
                $crate::live_state::catalog::ExportedTypeReg(&EXPORTED)
            }
            $crate::__private::inventory::submit! {
                $crate::live_state::binder::BinderReg(&BINDER)
            }
        };
    };
    ($vis:vis $updater:ty => $local:ty, $state:ty) => {
        const _: () = {
            static EXPORTED: $crate::live_state::catalog::ExportedType =
                $crate::live_state::catalog::ExportedType {
                    ty: $crate::live_state::catalog::TypeTag::of::<$updater>(),
                    module: ::core::module_path!(),
                    visibility: $crate::live_state::catalog::Visibility::from_tokens(
                        ::core::stringify!($vis),
                    ),
                    kind: $crate::live_state::catalog::TypeKind::Service,
                    capabilities: &[$crate::live_state::catalog::Capability {
                        definition: $crate::live_state::catalog::CapabilityDef::LocalStateUpdater,
                        args: &[
                            $crate::live_state::catalog::TypeTag::of::<$local>(),
                            $crate::live_state::catalog::TypeTag::of::<$state>(),
                        ],
                    }],
                };
            static BINDER: $crate::live_state::binder::Binder = $crate::live_state::binder::Binder {
                updater: $crate::live_state::catalog::TypeTag::of::<$updater>(),
                local: ::core::option::Option::Some($crate::live_state::catalog::TypeTag::of::<$local>()),
                state: $crate::live_state::catalog::TypeTag::of::<$state>(),
                register_updater: $crate::live_state::binder::register_local_state_updater::<$local, $state, $updater>,
                register_live_state: $crate::live_state::binder::register_local_live_state::<$local, $state, $updater>,
            };
            $crate::__private::inventory::submit! {
                $crate::live_state::catalog::ExportedTypeReg(&EXPORTED)
            }
            $crate::__private::inventory::submit! {
                $crate::live_state::binder::BinderReg(&BINDER)
            }
        };
    };
}

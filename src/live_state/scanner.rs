//! 更新器扫描
//!
//! 从模块的导出类型中找出更新器，按能力特化逐个产生 [`BindingDescriptor`]。
//! 扫描本身没有副作用，注册由 [`ServiceContainer::auto_add_live_state`] 另行完成。
//!
//! [`ServiceContainer::auto_add_live_state`]: crate::infrastructure::ServiceContainer::auto_add_live_state

use super::catalog::{Capability, CapabilityDef, ExportedType, TypeKind, TypeTag, UpdaterModule, Visibility};
use super::updater::CapabilityShape;

/// 一个更新器能力特化的绑定描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingDescriptor {
    pub updater: TypeTag,
    pub state: TypeTag,
    /// 仅 [`CapabilityShape::Dual`] 时存在
    pub local: Option<TypeTag>,
}

impl BindingDescriptor {
    pub fn single(updater: TypeTag, state: TypeTag) -> Self {
        Self {
            updater,
            state,
            local: None,
        }
    }

    pub fn dual(updater: TypeTag, local: TypeTag, state: TypeTag) -> Self {
        Self {
            updater,
            state,
            local: Some(local),
        }
    }

    pub fn shape(&self) -> CapabilityShape {
        match self.local {
            Some(_) => CapabilityShape::Dual,
            None => CapabilityShape::Single,
        }
    }
}

/// 扫描模块，返回按声明顺序排列的描述序列
pub fn scan(module: &UpdaterModule) -> impl Iterator<Item = BindingDescriptor> + '_ {
    module
        .types()
        .iter()
        .filter(|ty| is_candidate(ty))
        .flat_map(|ty| {
            ty.capabilities
                .iter()
                .filter_map(move |capability| descriptor_for(ty.ty, capability))
        })
}

fn is_candidate(ty: &ExportedType) -> bool {
    ty.visibility == Visibility::Public && ty.kind == TypeKind::Service && ty.implements_updater()
}

fn descriptor_for(updater: TypeTag, capability: &Capability) -> Option<BindingDescriptor> {
    match (capability.definition, capability.args) {
        (CapabilityDef::StateUpdater, [state]) => Some(BindingDescriptor::single(updater, *state)),
        (CapabilityDef::LocalStateUpdater, [local, state]) => {
            Some(BindingDescriptor::dual(updater, *local, *state))
        }
        // 其他参数个数不属于更新器形态，静默跳过
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Price;
    struct Coords;
    struct Location;
    struct PriceUpdater;
    struct GeoUpdater;
    struct MultiUpdater;

    const PRICE: TypeTag = TypeTag::of::<Price>();
    const COORDS: TypeTag = TypeTag::of::<Coords>();
    const LOCATION: TypeTag = TypeTag::of::<Location>();

    fn exported(
        ty: TypeTag,
        visibility: Visibility,
        kind: TypeKind,
        capabilities: &'static [Capability],
    ) -> ExportedType {
        ExportedType {
            ty,
            module: "app::updaters",
            visibility,
            kind,
            capabilities,
        }
    }

    const SINGLE: &[Capability] = &[Capability {
        definition: CapabilityDef::StateUpdater,
        args: &[PRICE],
    }];

    const DUAL: &[Capability] = &[Capability {
        definition: CapabilityDef::LocalStateUpdater,
        args: &[COORDS, LOCATION],
    }];

    #[test]
    fn test_single_shape_descriptor() {
        let module = UpdaterModule::new("app::updaters").with_type(exported(
            TypeTag::of::<PriceUpdater>(),
            Visibility::Public,
            TypeKind::Service,
            SINGLE,
        ));

        let found: Vec<_> = scan(&module).collect();

        assert_eq!(found, vec![BindingDescriptor::single(TypeTag::of::<PriceUpdater>(), PRICE)]);
        assert_eq!(found[0].shape(), CapabilityShape::Single);
        assert_eq!(found[0].local, None);
    }

    #[test]
    fn test_dual_shape_descriptor() {
        let module = UpdaterModule::new("app::updaters").with_type(exported(
            TypeTag::of::<GeoUpdater>(),
            Visibility::Public,
            TypeKind::Service,
            DUAL,
        ));

        let found: Vec<_> = scan(&module).collect();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].shape(), CapabilityShape::Dual);
        assert_eq!(found[0].local, Some(COORDS));
        assert_eq!(found[0].state, LOCATION);
    }

    #[test]
    fn test_rejects_hidden_abstract_and_value_types() {
        let module = UpdaterModule::new("app::updaters")
            .with_type(exported(TypeTag::of::<u8>(), Visibility::Private, TypeKind::Service, SINGLE))
            .with_type(exported(TypeTag::of::<u16>(), Visibility::Restricted, TypeKind::Service, DUAL))
            .with_type(exported(TypeTag::of::<u32>(), Visibility::Public, TypeKind::Abstract, SINGLE))
            .with_type(exported(TypeTag::of::<u64>(), Visibility::Public, TypeKind::Value, DUAL));

        assert_eq!(scan(&module).count(), 0);
    }

    #[test]
    fn test_requires_updater_marker() {
        const OTHER: &[Capability] = &[Capability {
            definition: CapabilityDef::Other("Observer"),
            args: &[PRICE],
        }];
        let module = UpdaterModule::new("app").with_type(exported(
            TypeTag::of::<PriceUpdater>(),
            Visibility::Public,
            TypeKind::Service,
            OTHER,
        ));

        assert_eq!(scan(&module).count(), 0);
    }

    #[test]
    fn test_unsupported_arity_is_skipped() {
        const MIXED: &[Capability] = &[
            Capability {
                definition: CapabilityDef::StateUpdater,
                args: &[PRICE, LOCATION],
            },
            Capability {
                definition: CapabilityDef::LocalStateUpdater,
                args: &[PRICE, COORDS, LOCATION],
            },
            Capability {
                definition: CapabilityDef::Other("Observer"),
                args: &[PRICE],
            },
            Capability {
                definition: CapabilityDef::StateUpdater,
                args: &[LOCATION],
            },
        ];
        let module = UpdaterModule::new("app").with_type(exported(
            TypeTag::of::<MultiUpdater>(),
            Visibility::Public,
            TypeKind::Service,
            MIXED,
        ));

        let found: Vec<_> = scan(&module).collect();

        assert_eq!(found, vec![BindingDescriptor::single(TypeTag::of::<MultiUpdater>(), LOCATION)]);
    }

    #[test]
    fn test_one_descriptor_per_specialization_in_order() {
        const BOTH: &[Capability] = &[
            Capability {
                definition: CapabilityDef::StateUpdater,
                args: &[PRICE],
            },
            Capability {
                definition: CapabilityDef::LocalStateUpdater,
                args: &[COORDS, LOCATION],
            },
            Capability {
                definition: CapabilityDef::LocalStateUpdater,
                args: &[PRICE, LOCATION],
            },
        ];
        let module = UpdaterModule::new("app")
            .with_type(exported(TypeTag::of::<MultiUpdater>(), Visibility::Public, TypeKind::Service, BOTH))
            .with_type(exported(TypeTag::of::<PriceUpdater>(), Visibility::Public, TypeKind::Service, SINGLE));

        let found: Vec<_> = scan(&module).collect();

        assert_eq!(
            found,
            vec![
                BindingDescriptor::single(TypeTag::of::<MultiUpdater>(), PRICE),
                BindingDescriptor::dual(TypeTag::of::<MultiUpdater>(), COORDS, LOCATION),
                BindingDescriptor::dual(TypeTag::of::<MultiUpdater>(), PRICE, LOCATION),
                BindingDescriptor::single(TypeTag::of::<PriceUpdater>(), PRICE),
            ]
        );
    }
}

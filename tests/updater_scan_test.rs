//! 更新器扫描与分发表的集成测试

#![allow(dead_code, clippy::uninlined_format_args, clippy::print_stdout)]

use async_trait::async_trait;
use live_state::infrastructure::{ContainerError, Injectable, ServiceContainer};
use live_state::live_state::{
    scan, Binder, BindingDescriptor, Capability, CapabilityDef, CapabilityShape, ExportedType, LiveState,
    StateUpdater, TypeKind, TypeTag, Updater, UpdaterModule, Visibility,
};
use live_state::{live_state_updater, RegistrationError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod hidden {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Secret(pub u8);

    struct PrivateUpdater;

    pub(crate) struct CrateUpdater;

    impl Updater for PrivateUpdater {}
    impl Updater for CrateUpdater {}

    impl Injectable for PrivateUpdater {
        fn inject(_: &ServiceContainer) -> Result<Self, ContainerError> {
            Ok(Self)
        }
    }

    impl Injectable for CrateUpdater {
        fn inject(_: &ServiceContainer) -> Result<Self, ContainerError> {
            Ok(Self)
        }
    }

    #[async_trait]
    impl StateUpdater<Secret> for PrivateUpdater {
        async fn update(&self, _live: Arc<dyn LiveState<Secret>>, _cancel: CancellationToken) -> anyhow::Result<Secret> {
            Ok(Secret(1))
        }
    }

    #[async_trait]
    impl StateUpdater<Secret> for CrateUpdater {
        async fn update(&self, _live: Arc<dyn LiveState<Secret>>, _cancel: CancellationToken) -> anyhow::Result<Secret> {
            Ok(Secret(2))
        }
    }

    live_state_updater!(PrivateUpdater => Secret);
    live_state_updater!(pub(crate) CrateUpdater => Secret);

    pub const MODULE: &str = module_path!();
}

mod weather {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Celsius(pub i16);

    #[derive(Debug, Clone, PartialEq)]
    pub struct City(pub String);

    #[derive(Debug, Clone, PartialEq)]
    pub struct Forecast(pub String);

    pub struct ThermometerUpdater;

    impl Updater for ThermometerUpdater {}

    impl Injectable for ThermometerUpdater {
        fn inject(_: &ServiceContainer) -> Result<Self, ContainerError> {
            Ok(Self)
        }
    }

    #[async_trait]
    impl StateUpdater<Celsius> for ThermometerUpdater {
        async fn update(&self, _live: Arc<dyn LiveState<Celsius>>, _cancel: CancellationToken) -> anyhow::Result<Celsius> {
            Ok(Celsius(21))
        }
    }

    pub struct ForecastUpdater;

    impl Updater for ForecastUpdater {}

    impl Injectable for ForecastUpdater {
        fn inject(_: &ServiceContainer) -> Result<Self, ContainerError> {
            Ok(Self)
        }
    }

    #[async_trait]
    impl live_state::live_state::LocalStateUpdater<City, Forecast> for ForecastUpdater {
        async fn update(
            &self,
            live: Arc<dyn live_state::live_state::LocalLiveState<City, Forecast>>,
            _cancel: CancellationToken,
        ) -> anyhow::Result<Forecast> {
            let city = live.local().map(|c| c.0).unwrap_or_default();
            Ok(Forecast(format!("sunny in {}", city)))
        }
    }

    live_state_updater!(pub ThermometerUpdater => Celsius);
    live_state_updater!(pub ForecastUpdater => City, Forecast);

    pub const MODULE: &str = module_path!();

    pub mod nested {
        use super::*;

        #[derive(Debug, Clone, PartialEq)]
        pub struct Humidity(pub u8);

        pub struct HygrometerUpdater;

        impl Updater for HygrometerUpdater {}

        impl Injectable for HygrometerUpdater {
            fn inject(_: &ServiceContainer) -> Result<Self, ContainerError> {
                Ok(Self)
            }
        }

        #[async_trait]
        impl StateUpdater<Humidity> for HygrometerUpdater {
            async fn update(
                &self,
                _live: Arc<dyn LiveState<Humidity>>,
                _cancel: CancellationToken,
            ) -> anyhow::Result<Humidity> {
                Ok(Humidity(40))
            }
        }

        live_state_updater!(pub HygrometerUpdater => Humidity);
    }
}

mod weather_extra {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Wind(pub u8);

    pub struct AnemometerUpdater;

    impl Updater for AnemometerUpdater {}

    impl Injectable for AnemometerUpdater {
        fn inject(_: &ServiceContainer) -> Result<Self, ContainerError> {
            Ok(Self)
        }
    }

    #[async_trait]
    impl StateUpdater<Wind> for AnemometerUpdater {
        async fn update(&self, _live: Arc<dyn LiveState<Wind>>, _cancel: CancellationToken) -> anyhow::Result<Wind> {
            Ok(Wind(3))
        }
    }

    live_state_updater!(pub AnemometerUpdater => Wind);
}

use weather::nested::{HygrometerUpdater, Humidity};
use weather::{Celsius, City, Forecast, ForecastUpdater, ThermometerUpdater};

struct Orphan;
struct OrphanState;

const ORPHAN_CAPABILITIES: &[Capability] = &[Capability {
    definition: CapabilityDef::StateUpdater,
    args: &[TypeTag::of::<OrphanState>()],
}];

const ORPHAN: ExportedType = ExportedType {
    ty: TypeTag::of::<Orphan>(),
    module: "orphans",
    visibility: Visibility::Public,
    kind: TypeKind::Service,
    capabilities: ORPHAN_CAPABILITIES,
};

#[test]
fn test_linked_module_yields_descriptors() {
    let module = UpdaterModule::linked(weather::MODULE);
    let found: Vec<BindingDescriptor> = scan(&module).collect();

    assert!(found.contains(&BindingDescriptor::single(
        TypeTag::of::<ThermometerUpdater>(),
        TypeTag::of::<Celsius>()
    )));
    assert!(found.contains(&BindingDescriptor::dual(
        TypeTag::of::<ForecastUpdater>(),
        TypeTag::of::<City>(),
        TypeTag::of::<Forecast>()
    )));
    // 子模块同样被收集，名字相近的兄弟模块不会
    assert!(found.iter().any(|d| d.updater == TypeTag::of::<HygrometerUpdater>()));
    assert_eq!(found.len(), 3);
}

#[test]
fn test_linked_scan_order_is_stable() {
    let first: Vec<_> = scan(&UpdaterModule::linked(weather::MODULE)).collect();
    let second: Vec<_> = scan(&UpdaterModule::linked(weather::MODULE)).collect();

    assert_eq!(first, second);

    let modules: Vec<_> = UpdaterModule::linked(weather::MODULE)
        .types()
        .iter()
        .map(|t| (t.module, t.ty.name()))
        .collect();
    let mut sorted = modules.clone();
    sorted.sort();
    assert_eq!(modules, sorted);
}

#[test]
fn test_descriptor_shapes() {
    let found: Vec<_> = scan(&UpdaterModule::linked(weather::MODULE)).collect();
    for descriptor in &found {
        match descriptor.shape() {
            CapabilityShape::Single => assert!(descriptor.local.is_none()),
            CapabilityShape::Dual => assert_eq!(descriptor.local, Some(TypeTag::of::<City>())),
        }
        assert!(descriptor.shape().arity() >= 1);
    }
}

#[test]
fn test_non_public_updaters_are_not_scanned() {
    let module = UpdaterModule::linked(hidden::MODULE);

    assert_eq!(module.types().len(), 2);
    assert_eq!(scan(&module).count(), 0);

    let container = ServiceContainer::new();
    container.auto_add_live_state(&module, None).unwrap();
    assert!(!container.is_registered::<Arc<dyn LiveState<hidden::Secret>>>());
    assert_eq!(container.get_stats().registered_services, 0);
}

#[test]
fn test_unbound_catalog_entry_aborts_registration() {
    let module = UpdaterModule::new("orphans").with_type(ORPHAN);
    let container = ServiceContainer::new();

    let result = container.auto_add_live_state(&module, None);

    match result {
        Err(RegistrationError::BindingNotFound { updater, local, state }) => {
            assert!(updater.ends_with("Orphan"));
            assert_eq!(local, None);
            assert!(state.ends_with("OrphanState"));
        }
        other => panic!("expected BindingNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_first_failure_stops_remaining_registrations() {
    const THERMOMETER: ExportedType = ExportedType {
        ty: TypeTag::of::<ThermometerUpdater>(),
        module: "mixed",
        visibility: Visibility::Public,
        kind: TypeKind::Service,
        capabilities: &[Capability {
            definition: CapabilityDef::StateUpdater,
            args: &[TypeTag::of::<Celsius>()],
        }],
    };
    let module = UpdaterModule::new("mixed").with_type(ORPHAN).with_type(THERMOMETER);
    let container = ServiceContainer::new();

    assert!(container.auto_add_live_state(&module, None).is_err());
    assert!(!container.is_registered::<Arc<dyn LiveState<Celsius>>>());
}

#[test]
fn test_dispatch_lookup() {
    let binder = Binder::lookup(
        TypeTag::of::<ForecastUpdater>(),
        Some(TypeTag::of::<City>()),
        TypeTag::of::<Forecast>(),
    )
    .unwrap();
    assert_eq!(binder.state, TypeTag::of::<Forecast>());

    // 形态不符的查询找不到对应行
    let missing = Binder::lookup(TypeTag::of::<ForecastUpdater>(), None, TypeTag::of::<Forecast>());
    assert!(matches!(missing, Err(RegistrationError::BindingNotFound { .. })));
    assert!(Binder::table_len() >= 5);
}

#[tokio::test]
async fn test_manual_module_registers_like_linked_one() {
    const HYGROMETER: ExportedType = ExportedType {
        ty: TypeTag::of::<HygrometerUpdater>(),
        module: "manual",
        visibility: Visibility::Public,
        kind: TypeKind::Service,
        capabilities: &[Capability {
            definition: CapabilityDef::StateUpdater,
            args: &[TypeTag::of::<Humidity>()],
        }],
    };
    let container = ServiceContainer::new();
    container
        .auto_add_live_state(&UpdaterModule::new("manual").with_type(HYGROMETER), None)
        .unwrap();

    let live = container.resolve::<Arc<dyn LiveState<Humidity>>>().unwrap();
    assert_eq!(live.update(CancellationToken::new()).await.unwrap(), Humidity(40));
}

#[tokio::test]
async fn test_scanned_dual_updater_resolves_by_state() {
    let container = ServiceContainer::new();
    container
        .auto_add_live_state(&UpdaterModule::linked(weather::MODULE), None)
        .unwrap();

    let forecast = container
        .resolve::<Arc<dyn live_state::live_state::LocalLiveState<City, Forecast>>>()
        .unwrap();
    forecast.set_local(City("Oslo".to_string()));
    assert_eq!(
        forecast.update(CancellationToken::new()).await.unwrap(),
        Forecast("sunny in Oslo".to_string())
    );

    let by_state = container.resolve::<Arc<dyn LiveState<Forecast>>>().unwrap();
    assert_eq!(
        by_state.update(CancellationToken::new()).await.unwrap(),
        Forecast("sunny in ".to_string())
    );
    assert!(!container.is_registered::<Arc<dyn LiveState<weather_extra::Wind>>>());
}

use crate::collector::{
    ApplicationManifests, DependencyRecord, Generation, OverrideRecord, PinnedRouteRecord,
    ServiceRecord, TargetRecord,
};
use crate::model::{RouteIntent, ServiceDeploymentRef, Target};
use crate::registry::{PlatformInfo, RegistrySnapshot};

pub fn service(name: &str, version: &str) -> ServiceRecord {
    ServiceRecord {
        service: Some(name.to_string()),
        version: Some(version.to_string()),
        dependencies: vec![],
    }
}

pub fn dependency(application: Option<&str>, service: &str, version: &str) -> DependencyRecord {
    DependencyRecord {
        application: application.map(str::to_string),
        service: Some(service.to_string()),
        version: Some(version.to_string()),
    }
}

pub fn application(name: &str, generations: Vec<(u64, Vec<ServiceRecord>)>) -> ApplicationManifests {
    ApplicationManifests {
        application: name.to_string(),
        generations: generations
            .into_iter()
            .map(|(number, records)| Generation {
                number,
                manifest: Some(records),
            })
            .collect(),
    }
}

pub fn override_record(
    prefix: &str,
    team_id: &str,
    targets: &[(&str, &str, u64, u32)],
) -> OverrideRecord {
    OverrideRecord {
        prefix: Some(prefix.to_string()),
        team_id: Some(team_id.to_string()),
        weighted_targets: targets
            .iter()
            .map(|(application, service, generation, weight)| TargetRecord {
                application: Some(application.to_string()),
                service: Some(service.to_string()),
                generation: Some(*generation),
                weight: Some(*weight),
            })
            .collect(),
    }
}

pub fn pin(prefix: &str, application: &str, service: &str, generation: u64) -> PinnedRouteRecord {
    PinnedRouteRecord {
        prefix: Some(prefix.to_string()),
        application: Some(application.to_string()),
        service: Some(service.to_string()),
        generation: Some(generation),
    }
}

pub fn single(application: &str, service: &str, version: &str) -> Target {
    Target::Single(ServiceDeploymentRef::new(application, service, version))
}

pub fn intent(prefix: &str, target: Target) -> RouteIntent {
    RouteIntent::new(prefix, target)
}

/// A registry where the given deployment ids are serverless functions.
pub fn serverless_registry(entries: &[(&str, &str)]) -> RegistrySnapshot {
    let mut registry = RegistrySnapshot::default();
    for (name, hostname) in entries {
        registry.insert_named(name, PlatformInfo::serverless(*hostname));
    }
    registry
}

use kindling_operator::dse::builders::{build_app_deployment, build_dependency_deployment};
use kindling_operator::dse::crd::{
    Condition, DependencySpec, DeploymentSpec, DevStagingEnvironment, DseSpec, DseStatus, ServiceSpec, ServiceType,
};
use kindling_operator::dse::hash::SPEC_HASH_ANNOTATION;
use kube::api::ObjectMeta;

fn dse_with(deps: Vec<DependencySpec>) -> DevStagingEnvironment {
    DevStagingEnvironment {
        metadata: ObjectMeta {
            name: Some("checkout".to_string()),
            namespace: Some("staging".to_string()),
            uid: Some("55555555-5555-5555-5555-555555555555".to_string()),
            ..Default::default()
        },
        spec: DseSpec {
            deployment: DeploymentSpec {
                image: "ghcr.io/acme/checkout:sha-abc123".to_string(),
                port: 8080,
                replicas: 2,
                command: vec![],
                args: vec![],
                env: vec![],
                resources: None,
                health_check: None,
            },
            service: ServiceSpec { port: 8080, target_port: None, type_: ServiceType::ClusterIP },
            ingress: None,
            dependencies: deps,
        },
        status: Some(DseStatus::default()),
    }
}

fn dep(type_: &str) -> DependencySpec {
    DependencySpec {
        type_: type_.to_string(),
        version: None,
        image: None,
        port: None,
        env: vec![],
        env_var_name: None,
        storage_size: None,
        resources: None,
    }
}

#[test]
fn status_is_ready_only_when_every_sub_condition_is_ready() {
    let mut status = DseStatus { deployment_ready: true, service_ready: true, ingress_ready: true, dependencies_ready: true, ..Default::default() };
    assert!(status.ready());

    status.dependencies_ready = false;
    assert!(!status.ready());
}

#[test]
fn built_deployment_carries_a_spec_hash_annotation() {
    let dse = dse_with(vec![]);
    let deployment = build_app_deployment(&dse, &[]).unwrap();
    let annotations = deployment.metadata.annotations.unwrap();
    let hash = annotations.get(SPEC_HASH_ANNOTATION).unwrap();
    assert_eq!(hash.len(), 16);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn spec_hash_changes_when_replica_count_changes() {
    let mut dse = dse_with(vec![]);
    let first = build_app_deployment(&dse, &[]).unwrap();
    let first_hash = first.metadata.annotations.unwrap().get(SPEC_HASH_ANNOTATION).cloned().unwrap();

    dse.spec.deployment.replicas = 3;
    let second = build_app_deployment(&dse, &[]).unwrap();
    let second_hash = second.metadata.annotations.unwrap().get(SPEC_HASH_ANNOTATION).cloned().unwrap();

    assert_ne!(first_hash, second_hash);
}

#[test]
fn dependency_deployment_is_labelled_with_its_component_type() {
    let dse = dse_with(vec![dep("redis")]);
    let deployment = build_dependency_deployment(&dse, &dse.spec.dependencies[0]).unwrap();
    let labels = deployment.metadata.labels.unwrap();
    assert_eq!(labels.get("app.kubernetes.io/component").map(String::as_str), Some("redis"));
    assert_eq!(labels.get("app.kubernetes.io/part-of").map(String::as_str), Some("checkout"));
}

#[test]
fn condition_upsert_replaces_existing_entry_of_the_same_type() {
    let mut conditions = vec![Condition::new("Ready", false, "NotYet", "waiting")];
    kindling_operator::dse::crd::upsert_condition(&mut conditions, Condition::new("Ready", true, "Done", "ready now"));
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].status, "True");
}

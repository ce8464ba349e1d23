use kindling_operator::dse::builders::{
    build_app_deployment, build_app_service, build_dependency_deployment, build_dependency_secret,
    build_dependency_service, build_ingress, dependency_injected_env, resolve_dependency,
};
use kindling_operator::dse::crd::{
    DependencySpec, DeploymentSpec, DevStagingEnvironment, DseSpec, DseStatus, EnvVarSpec, IngressSpec, PathType,
    ServiceSpec, ServiceType,
};
use kube::api::ObjectMeta;
use kube::ResourceExt;

fn dse_with(deps: Vec<DependencySpec>, ingress: Option<IngressSpec>, app_env: Vec<EnvVarSpec>) -> DevStagingEnvironment {
    DevStagingEnvironment {
        metadata: ObjectMeta {
            name: Some("checkout".to_string()),
            namespace: Some("staging".to_string()),
            uid: Some("22222222-2222-2222-2222-222222222222".to_string()),
            ..Default::default()
        },
        spec: DseSpec {
            deployment: DeploymentSpec {
                image: "ghcr.io/acme/checkout:sha-abc123".to_string(),
                port: 8080,
                replicas: 2,
                command: vec![],
                args: vec![],
                env: app_env,
                resources: None,
                health_check: None,
            },
            service: ServiceSpec { port: 8080, target_port: None, type_: ServiceType::ClusterIP },
            ingress,
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
fn dependency_env_is_prepended_before_user_env() {
    let user_env = vec![EnvVarSpec { name: "NOTE".into(), value: Some("$(DATABASE_URL)-suffix".into()), secret_ref: None }];
    let dse = dse_with(vec![dep("postgres")], None, user_env);

    let resolved = resolve_dependency(&dse.name_any(), &dse.spec.dependencies[0]).unwrap();
    let dependency_env = dependency_injected_env(&dse.spec.dependencies[0], &resolved);
    let deployment = build_app_deployment(&dse, &dependency_env).unwrap();

    let container = &deployment.spec.unwrap().template.spec.unwrap().containers[0];
    let env = container.env.as_ref().unwrap();
    let positions: Vec<&str> = env.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(positions[0], "DATABASE_URL");
    assert_eq!(positions[1], "NOTE");
}

#[test]
fn each_dependency_gets_its_own_deployment_service_and_secret() {
    let dse = dse_with(vec![dep("redis"), dep("postgres")], None, vec![]);
    for d in &dse.spec.dependencies {
        let deployment = build_dependency_deployment(&dse, d).unwrap();
        let service = build_dependency_service(&dse, d).unwrap();
        let secret = build_dependency_secret(&dse, d).unwrap();
        let expected_prefix = format!("checkout-{}", d.type_);
        assert_eq!(deployment.metadata.name.unwrap(), expected_prefix);
        assert_eq!(service.metadata.name.unwrap(), expected_prefix);
        assert_eq!(secret.metadata.name.unwrap(), format!("{expected_prefix}-credentials"));
    }
}

#[test]
fn ingress_path_and_tls_are_honoured() {
    let ingress = IngressSpec {
        enabled: true,
        host: "checkout.dev.local".to_string(),
        path: "/api".to_string(),
        path_type: PathType::Prefix,
        class: Some("nginx".to_string()),
        tls: None,
        annotations: Default::default(),
    };
    let dse = dse_with(vec![], Some(ingress.clone()), vec![]);
    let built = build_ingress(&dse, &ingress).unwrap();
    let spec = built.spec.unwrap();
    let rule = &spec.rules.unwrap()[0];
    assert_eq!(rule.host.as_deref(), Some("checkout.dev.local"));
    assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));
}

#[test]
fn app_service_target_port_defaults_to_deployment_port() {
    let dse = dse_with(vec![], None, vec![]);
    let svc = build_app_service(&dse).unwrap();
    let port = &svc.spec.unwrap().ports.unwrap()[0];
    assert_eq!(port.port, 8080);
}

use kindling_operator::dse::builders::{dependency_injected_env, resolve_dependency};
use kindling_operator::dse::crd::{DependencySpec, EnvVarSpec, SecretKeyRef};

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
fn minio_injects_endpoint_plus_access_and_secret_keys() {
    let d = dep("minio");
    let resolved = resolve_dependency("checkout", &d).unwrap();
    let env = dependency_injected_env(&d, &resolved);
    let names: Vec<&str> = env.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["S3_ENDPOINT", "S3_ACCESS_KEY", "S3_SECRET_KEY"]);
}

#[test]
fn redis_injects_only_the_primary_url() {
    let d = dep("redis");
    let resolved = resolve_dependency("checkout", &d).unwrap();
    let env = dependency_injected_env(&d, &resolved);
    assert_eq!(env.len(), 1);
    assert_eq!(env[0].name, "REDIS_URL");
    assert!(env[0].value.as_ref().unwrap().starts_with("redis://checkout-redis:"));
}

#[test]
fn custom_env_var_name_overrides_the_default_injected_name() {
    let mut d = dep("postgres");
    d.env_var_name = Some("PRIMARY_DB_URL".to_string());
    let resolved = resolve_dependency("checkout", &d).unwrap();
    let env = dependency_injected_env(&d, &resolved);
    assert_eq!(env[0].name, "PRIMARY_DB_URL");
}

#[test]
fn explicit_version_overrides_the_default_tag() {
    let mut d = dep("postgres");
    d.version = Some("15.4".to_string());
    let resolved = resolve_dependency("checkout", &d).unwrap();
    assert_eq!(resolved.image, "postgres:15.4");
}

#[test]
fn unknown_dependency_type_is_rejected() {
    let d = dep("oracle");
    assert!(resolve_dependency("checkout", &d).is_err());
}

#[test]
fn dependency_env_override_via_secret_ref_is_rejected() {
    let mut d = dep("postgres");
    d.env = vec![EnvVarSpec {
        name: "POSTGRES_PASSWORD".to_string(),
        value: None,
        secret_ref: Some(SecretKeyRef { name: "db-creds".to_string(), key: "password".to_string() }),
    }];
    assert!(resolve_dependency("checkout", &d).is_err());
}

#[test]
fn dependency_env_override_via_value_is_honoured() {
    let mut d = dep("postgres");
    d.env = vec![EnvVarSpec { name: "POSTGRES_PASSWORD".to_string(), value: Some("hunter2".to_string()), secret_ref: None }];
    let resolved = resolve_dependency("checkout", &d).unwrap();
    assert!(resolved.connection_url.contains(":hunter2@"));
}

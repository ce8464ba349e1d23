use kindling_operator::providers;
use kindling_operator::runner::builders::build_deployment;
use kindling_operator::runner::crd::{CIRunnerPool, CIRunnerPoolSpec, TokenSecretRef};
use kube::api::ObjectMeta;

fn pool_with_provider(provider: &str) -> CIRunnerPool {
    CIRunnerPool {
        metadata: ObjectMeta {
            name: Some("pool".to_string()),
            namespace: Some("ci".to_string()),
            uid: Some("44444444-4444-4444-4444-444444444444".to_string()),
            ..Default::default()
        },
        spec: CIRunnerPoolSpec {
            ci_provider: provider.to_string(),
            username: "dev1".to_string(),
            repository: "acme/checkout".to_string(),
            token_secret_ref: TokenSecretRef { name: "ci-token".to_string(), key: "token".to_string() },
            replicas: 1,
            runner_image: None,
            labels: vec![],
            runner_group: "Default".to_string(),
            resources: None,
            service_account_name: None,
            work_dir: "/home/runner/_work".to_string(),
            platform_url: None,
            env: vec![],
            volumes: vec![],
            volume_mounts: vec![],
        },
        status: None,
    }
}

fn runner_env_names(pool: &CIRunnerPool) -> Vec<String> {
    let deployment = build_deployment(pool).unwrap();
    let pod_spec = deployment.spec.unwrap().template.spec.unwrap();
    let runner = pod_spec.containers.iter().find(|c| c.name == "runner").unwrap();
    runner.env.as_ref().unwrap().iter().map(|e| e.name.clone()).collect()
}

#[test]
fn github_runner_env_carries_github_specific_names() {
    let pool = pool_with_provider("github");
    let names = runner_env_names(&pool);
    assert!(names.contains(&"GITHUB_REPOSITORY".to_string()));
    assert!(names.contains(&"GITHUB_TOKEN".to_string()));
    assert!(!names.contains(&"CI_SERVER_TOKEN".to_string()));
}

#[test]
fn gitlab_runner_env_carries_gitlab_specific_names() {
    let pool = pool_with_provider("gitlab");
    let names = runner_env_names(&pool);
    assert!(names.contains(&"CI_PROJECT_PATH".to_string()));
    assert!(names.contains(&"CI_SERVER_TOKEN".to_string()));
    assert!(!names.contains(&"GITHUB_TOKEN".to_string()));
}

#[test]
fn empty_provider_falls_back_to_github_default_image() {
    let pool = pool_with_provider("");
    let deployment = build_deployment(&pool).unwrap();
    let pod_spec = deployment.spec.unwrap().template.spec.unwrap();
    let runner = pod_spec.containers.iter().find(|c| c.name == "runner").unwrap();
    assert_eq!(runner.image.as_deref(), Some("ghcr.io/actions/actions-runner:latest"));
}

#[test]
fn cli_labels_differ_between_providers() {
    let github = providers::get("github").unwrap();
    let gitlab = providers::get("gitlab").unwrap();
    assert_eq!(github.cli_labels.resource_kind_label(), "GitHub Actions Runner");
    assert_eq!(gitlab.cli_labels.resource_kind_label(), "GitLab Runner");
}

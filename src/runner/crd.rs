use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dse::crd::{Condition, EnvVarSpec, ResourceSpec};

/// `CIRunnerPool` — requests a self-hosted CI runner inside the cluster
/// (spec.md §3.2). Its own top-level kind, owned by its own controller
/// (`runner::controller`).
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "kindling.dev",
    version = "v1alpha1",
    kind = "CIRunnerPool",
    plural = "cirunnerpools",
    shortname = "crp",
    namespaced
)]
#[kube(status = "RunnerPoolStatus")]
pub struct CIRunnerPoolSpec {
    #[serde(default, rename = "ciProvider")]
    pub ci_provider: String,
    pub username: String,
    pub repository: String,
    #[serde(rename = "tokenSecretRef")]
    pub token_secret_ref: TokenSecretRef,
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "runnerImage")]
    pub runner_image: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default = "default_runner_group", rename = "runnerGroup")]
    pub runner_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "serviceAccountName")]
    pub service_account_name: Option<String>,
    #[serde(default = "default_work_dir", rename = "workDir")]
    pub work_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "platformURL")]
    pub platform_url: Option<String>,
    #[serde(default)]
    pub env: Vec<EnvVarSpec>,
    /// Pass-through `Volume` objects merged into the runner pod spec, kept
    /// untyped (spec.md §3.2 "merged into the runner container") since the
    /// core neither validates nor interprets their contents.
    #[serde(default)]
    pub volumes: Vec<serde_json::Value>,
    /// Pass-through `VolumeMount` objects merged into the runner container.
    #[serde(default, rename = "volumeMounts")]
    pub volume_mounts: Vec<serde_json::Value>,
}

fn default_replicas() -> i32 {
    1
}
fn default_runner_group() -> String {
    "Default".to_string()
}
fn default_work_dir() -> String {
    "/home/runner/_work".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
pub struct TokenSecretRef {
    pub name: String,
    #[serde(default = "default_token_key")]
    pub key: String,
}

fn default_token_key() -> String {
    "token".to_string()
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
pub struct RunnerPoolStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl RunnerPoolStatus {
    pub fn with_secret_not_found(secret_name: &str) -> Self {
        RunnerPoolStatus {
            ready: false,
            conditions: vec![Condition::new("SecretNotFound", true, "SecretNotFound", secret_name.to_string())],
        }
    }
}

use thiserror::Error;

/// Crate-wide error type for reconcile helpers.
///
/// `main.rs` and top-level `run_*` entrypoints use `anyhow::Result` instead;
/// this type is for the reconcile call chain where callers need to branch on
/// the kind of failure (transient vs. missing-prerequisite vs. invalid-spec
/// vs. permanent).
#[derive(Debug, Error)]
pub enum Error {
    #[error("kubernetes api error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("failed to serialize sub-spec for hashing: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("object is missing required field: {0}")]
    MissingField(&'static str),

    #[error("unsupported dependency type: {0}")]
    UnsupportedDependencyType(String),

    #[error("dependency env override `{0}` uses secretRef, but a dependency's own container env must be a literal value")]
    UnresolvableDependencyEnvOverride(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! CI provider abstraction (spec.md §4.4). An interface bundle plus a
//! process-wide registry, not an inheritance hierarchy — "a new provider is
//! a value implementing `RunnerAdapter`/`WorkflowGenerator`/`CliLabels` and
//! registering itself at init" (spec.md §9). Shared behaviour (name
//! sanitisation) is a free function, not a base class.

pub mod github;
pub mod gitlab;

use std::collections::HashMap;
use std::sync::OnceLock;

/// One environment variable entry for the runner container: either a plain
/// value or a reference into a Secret key (used for the CI token).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunnerEnvVar {
    Plain { name: String, value: String },
    SecretRef { name: String, secret_name: String, secret_key: String },
}

/// Capability bundle exposing everything the runner pool controller needs
/// to materialise a runner Deployment for one provider.
pub trait RunnerAdapter: Send + Sync {
    fn default_image(&self) -> &'static str;
    fn default_token_key(&self) -> &'static str;

    /// Computes the platform API base URL from a (possibly overridden)
    /// platform URL. GitHub: `https://github.com` -> `https://api.github.com`;
    /// GitHub Enterprise: `https://host.tld` -> `https://host.tld/api/v3`.
    fn api_base_url(&self, platform_url: &str) -> String;

    /// Environment variables for the runner container: username,
    /// repository, platform URL, the token (via secret ref), runner labels,
    /// runner group, and work directory.
    fn runner_env(
        &self,
        username: &str,
        repository: &str,
        platform_url: &str,
        token_secret_name: &str,
        token_secret_key: &str,
        runner_labels: &[String],
        runner_group: &str,
        work_dir: &str,
    ) -> Vec<RunnerEnvVar>;

    /// Opaque startup script text, executed as the runner container's
    /// command. The core never inspects its contents.
    fn startup_script(&self) -> &'static str;

    /// Per-user label map merged onto the runner Deployment's pod template.
    fn per_user_labels(&self, sanitised_username: &str) -> HashMap<String, String>;
}

/// Capability bundle for the (currently out-of-core-scope-for-execution) AI
/// workflow generator. The core only needs to register these so external
/// collaborators (the CLI, the generator itself) can look them up.
pub trait WorkflowGenerator: Send + Sync {
    fn default_output_path(&self) -> &'static str;
    fn prompt_context(&self) -> &'static str;
    fn example_workflows(&self) -> &'static [&'static str];

    /// Strips provider-specific template expressions (e.g. `${{ }}` on
    /// GitHub, `$CI_*` on GitLab) from generated YAML so it can be
    /// previewed without a templating engine.
    fn strip_provider_templates(&self, yaml: &str) -> String;
}

/// Human-facing strings the CLI surfaces for this provider.
pub trait CliLabels: Send + Sync {
    fn resource_kind_label(&self) -> &'static str;
    fn credential_label(&self) -> &'static str;
    fn crd_plural(&self) -> &'static str;
}

pub struct Provider {
    pub name: &'static str,
    pub runner: &'static dyn RunnerAdapter,
    pub workflow: &'static dyn WorkflowGenerator,
    pub cli_labels: &'static dyn CliLabels,
}

fn registry() -> &'static HashMap<&'static str, Provider> {
    static REGISTRY: OnceLock<HashMap<&'static str, Provider>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert("github", github::provider());
        m.insert("gitlab", gitlab::provider());
        m
    })
}

/// Looks up a provider by name, defaulting to `github` for `""` per
/// spec.md §3.2 (`ciProvider: github | gitlab | ""`).
pub fn get(name: &str) -> Option<&'static Provider> {
    let key = if name.is_empty() { "github" } else { name };
    registry().get(key)
}

/// Shared name sanitisation (spec.md §4.4): lowercase, replace `@`/`_`/
/// non-DNS chars with `-`, collapse repeats, trim leading/trailing `-`/`.`,
/// truncate to 63 chars trimming any trailing `-`/`.`; empty -> `runner`.
pub fn sanitise_username(input: &str) -> String {
    let lowered = input.to_lowercase();
    let mut replaced = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            replaced.push(c);
        } else {
            replaced.push('-');
        }
    }

    let mut collapsed = String::with_capacity(replaced.len());
    let mut prev_dash = false;
    for c in replaced.chars() {
        if c == '-' {
            if !prev_dash {
                collapsed.push(c);
            }
            prev_dash = true;
        } else {
            collapsed.push(c);
            prev_dash = false;
        }
    }

    let trimmed = collapsed.trim_matches(|c| c == '-' || c == '.');
    let mut truncated: String = trimmed.chars().take(63).collect();
    while truncated.ends_with('-') || truncated.ends_with('.') {
        truncated.pop();
    }

    if truncated.is_empty() {
        "runner".to_string()
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_provider_is_github() {
        assert_eq!(get("").unwrap().name, "github");
    }

    #[test]
    fn unknown_provider_is_none() {
        assert!(get("bitbucket").is_none());
    }

    #[test]
    fn sanitise_replaces_at_and_underscore() {
        assert_eq!(sanitise_username("Jane_Doe@Example"), "jane-doe-example");
    }

    #[test]
    fn sanitise_collapses_and_trims() {
        assert_eq!(sanitise_username("--weird__name--"), "weird-name");
    }

    #[test]
    fn sanitise_empty_falls_back_to_runner() {
        assert_eq!(sanitise_username(""), "runner");
        assert_eq!(sanitise_username("@@@"), "runner");
    }

    #[test]
    fn sanitise_is_idempotent() {
        for raw in ["Jane_Doe@Example", "--weird__name--", "Already-Clean", ""] {
            let once = sanitise_username(raw);
            let twice = sanitise_username(&once);
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn sanitise_truncates_to_63_chars() {
        let long = "a".repeat(100);
        let result = sanitise_username(&long);
        assert!(result.len() <= 63);
    }
}

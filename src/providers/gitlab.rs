use std::collections::HashMap;

use super::{CliLabels, Provider, RunnerAdapter, RunnerEnvVar, WorkflowGenerator};

struct GitLabRunner;
struct GitLabWorkflow;
struct GitLabCliLabels;

impl RunnerAdapter for GitLabRunner {
    fn default_image(&self) -> &'static str {
        "gitlab/gitlab-runner:latest"
    }

    fn default_token_key(&self) -> &'static str {
        "token"
    }

    fn api_base_url(&self, platform_url: &str) -> String {
        let trimmed = platform_url.trim_end_matches('/');
        if trimmed.is_empty() {
            "https://gitlab.com/api/v4".to_string()
        } else {
            format!("{trimmed}/api/v4")
        }
    }

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
    ) -> Vec<RunnerEnvVar> {
        let platform_url = if platform_url.is_empty() {
            "https://gitlab.com".to_string()
        } else {
            platform_url.to_string()
        };
        vec![
            RunnerEnvVar::Plain { name: "CI_SERVER_URL".into(), value: platform_url },
            RunnerEnvVar::Plain { name: "CI_PROJECT_PATH".into(), value: repository.to_string() },
            RunnerEnvVar::Plain { name: "RUNNER_NAME".into(), value: format!("{username}-runner") },
            RunnerEnvVar::SecretRef {
                name: "CI_SERVER_TOKEN".into(),
                secret_name: token_secret_name.to_string(),
                secret_key: token_secret_key.to_string(),
            },
            RunnerEnvVar::Plain { name: "RUNNER_TAG_LIST".into(), value: runner_labels.join(",") },
            RunnerEnvVar::Plain { name: "RUNNER_GROUP".into(), value: runner_group.to_string() },
            RunnerEnvVar::Plain { name: "RUNNER_WORKDIR".into(), value: work_dir.to_string() },
        ]
    }

    fn startup_script(&self) -> &'static str {
        r#"#!/bin/sh
set -eu
gitlab-runner register --non-interactive \
    --url "${CI_SERVER_URL}" \
    --registration-token "${CI_SERVER_TOKEN}" \
    --name "${RUNNER_NAME}" \
    --tag-list "${RUNNER_TAG_LIST}" \
    --executor shell
trap 'gitlab-runner unregister --name "${RUNNER_NAME}"' TERM
gitlab-runner run & wait $!
"#
    }

    fn per_user_labels(&self, sanitised_username: &str) -> HashMap<String, String> {
        HashMap::from([("apps.example.com/gitlab-username".to_string(), sanitised_username.to_string())])
    }
}

impl WorkflowGenerator for GitLabWorkflow {
    fn default_output_path(&self) -> &'static str {
        ".gitlab-ci.yml"
    }

    fn prompt_context(&self) -> &'static str {
        "Generate a GitLab CI pipeline that runs on a self-hosted, kindling-tagged runner."
    }

    fn example_workflows(&self) -> &'static [&'static str] {
        &["build:\n  tags: [self-hosted]\n  script:\n    - echo building\n"]
    }

    fn strip_provider_templates(&self, yaml: &str) -> String {
        // Strips `$CI_*`/`${CI_*}` GitLab predefined variable references.
        let mut out = String::with_capacity(yaml.len());
        let mut chars = yaml.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '$' {
                if chars.peek() == Some(&'{') {
                    for next in chars.by_ref() {
                        if next == '}' {
                            break;
                        }
                    }
                } else {
                    while matches!(chars.peek(), Some(n) if n.is_ascii_uppercase() || *n == '_') {
                        chars.next();
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl CliLabels for GitLabCliLabels {
    fn resource_kind_label(&self) -> &'static str {
        "GitLab Runner"
    }

    fn credential_label(&self) -> &'static str {
        "Runner Registration Token"
    }

    fn crd_plural(&self) -> &'static str {
        "cirunnerpools"
    }
}

pub fn provider() -> Provider {
    Provider {
        name: "gitlab",
        runner: &GitLabRunner,
        workflow: &GitLabWorkflow,
        cli_labels: &GitLabCliLabels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_api_base_url() {
        assert_eq!(GitLabRunner.api_base_url(""), "https://gitlab.com/api/v4");
        assert_eq!(GitLabRunner.api_base_url("https://gitlab.mycorp.com"), "https://gitlab.mycorp.com/api/v4");
    }
}

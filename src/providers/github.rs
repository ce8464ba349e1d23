use std::collections::HashMap;

use super::{CliLabels, Provider, RunnerAdapter, RunnerEnvVar, WorkflowGenerator};

struct GitHubRunner;
struct GitHubWorkflow;
struct GitHubCliLabels;

impl RunnerAdapter for GitHubRunner {
    fn default_image(&self) -> &'static str {
        "ghcr.io/actions/actions-runner:latest"
    }

    fn default_token_key(&self) -> &'static str {
        "token"
    }

    fn api_base_url(&self, platform_url: &str) -> String {
        let trimmed = platform_url.trim_end_matches('/');
        if trimmed.is_empty() || trimmed == "https://github.com" {
            "https://api.github.com".to_string()
        } else {
            format!("{trimmed}/api/v3")
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
            "https://github.com".to_string()
        } else {
            platform_url.to_string()
        };
        vec![
            RunnerEnvVar::Plain { name: "RUNNER_NAME".into(), value: format!("{username}-runner") },
            RunnerEnvVar::Plain { name: "GITHUB_REPOSITORY".into(), value: repository.to_string() },
            RunnerEnvVar::Plain { name: "GITHUB_URL".into(), value: platform_url.clone() },
            RunnerEnvVar::Plain {
                name: "GITHUB_API_URL".into(),
                value: self.api_base_url(&platform_url),
            },
            RunnerEnvVar::SecretRef {
                name: "GITHUB_TOKEN".into(),
                secret_name: token_secret_name.to_string(),
                secret_key: token_secret_key.to_string(),
            },
            RunnerEnvVar::Plain { name: "RUNNER_LABELS".into(), value: runner_labels.join(",") },
            RunnerEnvVar::Plain { name: "RUNNER_GROUP".into(), value: runner_group.to_string() },
            RunnerEnvVar::Plain { name: "RUNNER_WORKDIR".into(), value: work_dir.to_string() },
        ]
    }

    fn startup_script(&self) -> &'static str {
        r#"#!/bin/sh
set -eu
REG_TOKEN=$(curl -sX POST -H "Authorization: token ${GITHUB_TOKEN}" \
    "${GITHUB_API_URL}/repos/${GITHUB_REPOSITORY}/actions/runners/registration-token" | \
    python3 -c 'import sys,json;print(json.load(sys.stdin)["token"])')
./config.sh --url "${GITHUB_URL}/${GITHUB_REPOSITORY}" \
    --token "${REG_TOKEN}" \
    --name "${RUNNER_NAME}" \
    --labels "${RUNNER_LABELS}" \
    --runnergroup "${RUNNER_GROUP}" \
    --work "${RUNNER_WORKDIR}" \
    --unattended --replace
trap './config.sh remove --token "${REG_TOKEN}"' TERM
./run.sh & wait $!
"#
    }

    fn per_user_labels(&self, sanitised_username: &str) -> HashMap<String, String> {
        HashMap::from([("apps.example.com/github-username".to_string(), sanitised_username.to_string())])
    }
}

impl WorkflowGenerator for GitHubWorkflow {
    fn default_output_path(&self) -> &'static str {
        ".github/workflows/kindling.yml"
    }

    fn prompt_context(&self) -> &'static str {
        "Generate a GitHub Actions workflow that runs on a self-hosted, kindling-labeled runner."
    }

    fn example_workflows(&self) -> &'static [&'static str] {
        &[
            "name: build\non:\n  push:\n    branches: [main]\njobs:\n  build:\n    runs-on: [self-hosted]\n    steps:\n      - uses: actions/checkout@v4\n      - run: echo building\n",
        ]
    }

    fn strip_provider_templates(&self, yaml: &str) -> String {
        // Strips `${{ ... }}` expression syntax so a preview renderer
        // doesn't choke on unresolved GitHub Actions expressions.
        let mut out = String::with_capacity(yaml.len());
        let mut chars = yaml.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                let mut depth = 0;
                for next in chars.by_ref() {
                    if next == '{' {
                        depth += 1;
                    } else if next == '}' {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl CliLabels for GitHubCliLabels {
    fn resource_kind_label(&self) -> &'static str {
        "GitHub Actions Runner"
    }

    fn credential_label(&self) -> &'static str {
        "Personal Access Token"
    }

    fn crd_plural(&self) -> &'static str {
        "cirunnerpools"
    }
}

pub fn provider() -> Provider {
    Provider {
        name: "github",
        runner: &GitHubRunner,
        workflow: &GitHubWorkflow,
        cli_labels: &GitHubCliLabels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_api_base_url() {
        assert_eq!(GitHubRunner.api_base_url("https://github.com"), "https://api.github.com");
        assert_eq!(GitHubRunner.api_base_url(""), "https://api.github.com");
    }

    #[test]
    fn enterprise_api_base_url() {
        assert_eq!(GitHubRunner.api_base_url("https://github.mycorp.com"), "https://github.mycorp.com/api/v3");
    }
}

//! DSE reconcile loop (spec.md §4.3). Orchestrates the builders
//! (`dse::builders`) and the reconcile primitive (`dse::reconcile_primitive`)
//! across the app Deployment/Service/Ingress and every declared dependency,
//! prunes orphans, and writes back status. Event publishing uses
//! `kube::runtime::events::Recorder` on every reconcile transition.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use rand::Rng;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::dse::builders::{
    build_app_deployment, build_app_service, build_dependency_deployment, build_dependency_secret,
    build_dependency_service, build_ingress, dependency_injected_env, resolve_dependency, safe_name, MANAGED_BY,
};
use crate::dse::crd::{Condition, DevStagingEnvironment, DseStatus, EnvVarSpec};
use crate::dse::reconcile_primitive::{delete_if_exists, reconcile_child};
use crate::error::{Error, Result};

pub const FINALIZER: &str = "devstagingenvironments.kindling.dev/finalizer";

#[derive(Clone)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    pub reporter: Reporter,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self { last_event: Utc::now(), reporter: "kindling-dse-operator".into() }
    }
}

impl Diagnostics {
    fn recorder(&self, client: Client, dse: &DevStagingEnvironment) -> Recorder {
        Recorder::new(client, self.reporter.clone(), dse.object_ref(&()))
    }
}

#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub config: Config,
    pub diagnostics: Arc<RwLock<Diagnostics>>,
}

impl Context {
    pub fn new(client: Client) -> Self {
        Self { client, config: Config::from_env(), diagnostics: Arc::new(RwLock::new(Diagnostics::default())) }
    }
}

pub async fn run(client: Client) {
    let ctx = Arc::new(Context::new(client.clone()));
    let dses: Api<DevStagingEnvironment> = Api::all(client.clone());
    let deploys: Api<Deployment> = Api::all(client.clone());
    let svcs: Api<Service> = Api::all(client.clone());
    let ings: Api<Ingress> = Api::all(client.clone());
    let secrets: Api<Secret> = Api::all(client.clone());

    Controller::new(dses, WatcherConfig::default())
        .owns(deploys, WatcherConfig::default())
        .owns(svcs, WatcherConfig::default())
        .owns(ings, WatcherConfig::default())
        .owns(secrets, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((objref, _action)) => info!("reconciled dse {}", objref.name),
                Err(e) => error!("dse reconcile failed: {e:?}"),
            }
        })
        .await;
}

#[instrument(skip(ctx, dse), fields(trace_id = %crate::telemetry::get_trace_id()))]
async fn reconcile(dse: Arc<DevStagingEnvironment>, ctx: Arc<Context>) -> Result<Action> {
    let ns = dse.namespace().unwrap_or_else(|| "default".to_string());
    let name = dse.name_any();
    ctx.diagnostics.write().await.last_event = Utc::now();
    let recorder = ctx.diagnostics.read().await.recorder(ctx.client.clone(), &dse);

    if dse.meta().deletion_timestamp.is_some() {
        recorder
            .publish(Event {
                type_: EventType::Normal,
                reason: "DeleteComplete".into(),
                note: Some(format!("cascading delete of `{name}` children via owner references")),
                action: "Reconciling".into(),
                secondary: None,
            })
            .await
            .map_err(Error::KubeError)?;
        ensure_finalizer(&name, &ns, &ctx, false).await?;
        return Ok(Action::await_change());
    }

    ensure_finalizer(&name, &ns, &ctx, true).await?;

    match reconcile_children(&dse, &ctx).await {
        Ok(action) => {
            recorder
                .publish(Event {
                    type_: EventType::Normal,
                    reason: "ReconcileComplete".into(),
                    note: Some(format!("reconciled `{name}`")),
                    action: "Reconciling".into(),
                    secondary: None,
                })
                .await
                .ok();
            Ok(action)
        }
        Err(e) => {
            recorder
                .publish(Event {
                    type_: EventType::Warning,
                    reason: "ReconcileFailed".into(),
                    note: Some(format!("{e}")),
                    action: "Reconciling".into(),
                    secondary: None,
                })
                .await
                .ok();
            Err(e)
        }
    }
}

fn error_policy(dse: Arc<DevStagingEnvironment>, err: &Error, ctx: Arc<Context>) -> Action {
    warn!(name = %dse.name_any(), "dse reconcile error: {err:?}");
    Action::requeue(ctx.config.error_requeue)
}

async fn ensure_finalizer(name: &str, ns: &str, ctx: &Context, present: bool) -> Result<()> {
    let api: Api<DevStagingEnvironment> = Api::namespaced(ctx.client.clone(), ns);
    let finalizers = if present { json!([FINALIZER]) } else { json!([]) };
    let patch = json!({ "metadata": { "finalizers": finalizers }});
    api.patch(name, &kube::api::PatchParams::default(), &kube::api::Patch::Merge(&patch))
        .await
        .map_err(Error::KubeError)?;
    Ok(())
}

/// Steps 2-8 of spec.md §4.3, in the required fixed order.
async fn reconcile_children(dse: &DevStagingEnvironment, ctx: &Context) -> Result<Action> {
    let ns = dse.namespace().unwrap_or_else(|| "default".to_string());
    let field_manager = ctx.config.field_manager;

    let deploy_api: Api<Deployment> = Api::namespaced(ctx.client.clone(), &ns);
    let svc_api: Api<Service> = Api::namespaced(ctx.client.clone(), &ns);
    let ing_api: Api<Ingress> = Api::namespaced(ctx.client.clone(), &ns);
    let secret_api: Api<Secret> = Api::namespaced(ctx.client.clone(), &ns);

    // Step 2: resolve dependency env *before* building the app Deployment,
    // since those vars are prepended to the app's env list.
    let mut dependency_env: Vec<EnvVarSpec> = Vec::new();
    for dep in &dse.spec.dependencies {
        let resolved = resolve_dependency(&dse.name_any(), dep)?;
        dependency_env.extend(dependency_injected_env(dep, &resolved));
    }

    let app_deployment = build_app_deployment(dse, &dependency_env)?;
    let app_deployment = reconcile_child(&deploy_api, &app_deployment, field_manager).await?;

    // Step 3
    let app_service = build_app_service(dse)?;
    reconcile_child(&svc_api, &app_service, field_manager).await?;

    // Step 4
    let ingress_enabled = dse.spec.ingress.as_ref().is_some_and(|i| i.enabled);
    let app_name = safe_name(&dse.name_any());
    if ingress_enabled {
        let ingress_spec = dse.spec.ingress.as_ref().expect("checked above");
        let ingress = build_ingress(dse, ingress_spec)?;
        reconcile_child(&ing_api, &ingress, field_manager).await?;
    } else {
        delete_if_exists(&ing_api, &app_name).await?;
    }

    // Step 5: each dependency's secret, deployment, service.
    let mut dependency_deployments = Vec::with_capacity(dse.spec.dependencies.len());
    for dep in &dse.spec.dependencies {
        let secret = build_dependency_secret(dse, dep)?;
        reconcile_child(&secret_api, &secret, field_manager).await?;

        let deployment = build_dependency_deployment(dse, dep)?;
        let deployment = reconcile_child(&deploy_api, &deployment, field_manager).await?;
        dependency_deployments.push(deployment);

        let service = build_dependency_service(dse, dep)?;
        reconcile_child(&svc_api, &service, field_manager).await?;
    }

    // Step 6: prune children for dependencies no longer declared.
    prune_orphans(dse, ctx, &ns).await?;

    // Step 7-8: compute and write status.
    let status = compute_status(dse, &app_deployment, &dependency_deployments, ingress_enabled);
    update_status(dse, &ctx.client, &ns, status.clone()).await;

    if status.ready() {
        // Jittered steady-state requeue so many ready DSEs don't all wake up
        // in lockstep, the way tembo-operator jitters its own 60-90s poll.
        let jitter = rand::thread_rng().gen_range(0..10);
        Ok(Action::requeue(ctx.config.steady_state_requeue + Duration::from_secs(jitter)))
    } else {
        Ok(Action::requeue(ctx.config.readiness_requeue))
    }
}

/// Lists Deployments labelled `part-of=<dse.name>, managed-by=<operator>`
/// and deletes the Deployment/Service/Secret trio for any whose `component`
/// label is no longer in `spec.dependencies` (spec.md §4.3 step 6, §9
/// "Label-based orphan pruning").
async fn prune_orphans(dse: &DevStagingEnvironment, ctx: &Context, ns: &str) -> Result<()> {
    let deploy_api: Api<Deployment> = Api::namespaced(ctx.client.clone(), ns);
    let svc_api: Api<Service> = Api::namespaced(ctx.client.clone(), ns);
    let secret_api: Api<Secret> = Api::namespaced(ctx.client.clone(), ns);

    let current_types: HashSet<&str> = dse.spec.dependencies.iter().map(|d| d.type_.as_str()).collect();
    let selector = format!(
        "app.kubernetes.io/part-of={},app.kubernetes.io/managed-by={MANAGED_BY}",
        dse.name_any()
    );
    let list_params = kube::api::ListParams::default().labels(&selector);
    let existing = deploy_api.list(&list_params).await.map_err(Error::KubeError)?;

    for deployment in existing.items {
        let component = deployment.labels().get("app.kubernetes.io/component").cloned();
        let Some(component) = component else { continue };
        if current_types.contains(component.as_str()) {
            continue;
        }
        let name = deployment.name_any();
        info!(%name, %component, "pruning orphaned dependency");
        delete_if_exists(&deploy_api, &name).await?;
        delete_if_exists(&svc_api, &name).await?;
        delete_if_exists(&secret_api, &format!("{name}-credentials")).await?;
    }
    Ok(())
}

fn compute_status(
    dse: &DevStagingEnvironment,
    app_deployment: &Deployment,
    dependency_deployments: &[Deployment],
    ingress_enabled: bool,
) -> DseStatus {
    let available = app_deployment.status.as_ref().and_then(|s| s.available_replicas).unwrap_or(0);
    let desired_replicas = dse.spec.deployment.replicas;
    let deployment_ready = available >= desired_replicas;

    let dependencies_ready = dependency_deployments.iter().all(|d| {
        d.status.as_ref().and_then(|s| s.available_replicas).unwrap_or(0) >= 1
    });

    let url = if ingress_enabled {
        dse.spec.ingress.as_ref().map(|i| {
            let scheme = if i.tls.is_some() { "https" } else { "http" };
            format!("{scheme}://{}{}", i.host, i.path)
        })
    } else {
        None
    };

    let mut conditions = Vec::new();
    conditions.push(Condition::new(
        "DeploymentReady",
        deployment_ready,
        if deployment_ready { "AllResourcesReady" } else { "ResourcesNotReady" },
        format!("available_replicas={available}/{desired_replicas}"),
    ));
    conditions.push(Condition::new("ServiceReady", true, "AllResourcesReady", "service materialised"));
    conditions.push(Condition::new(
        "IngressReady",
        true,
        "AllResourcesReady",
        if ingress_enabled { "ingress materialised" } else { "ingress not requested" },
    ));
    conditions.push(Condition::new(
        "DependenciesReady",
        dependencies_ready,
        if dependencies_ready { "AllResourcesReady" } else { "ResourcesNotReady" },
        format!("{}/{} dependencies ready", dependency_deployments.iter().filter(|d| {
            d.status.as_ref().and_then(|s| s.available_replicas).unwrap_or(0) >= 1
        }).count(), dependency_deployments.len()),
    ));
    let ready = deployment_ready && dependencies_ready;
    conditions.push(Condition::new(
        "Ready",
        ready,
        if ready { "AllResourcesReady" } else { "ResourcesNotReady" },
        "aggregate readiness",
    ));

    DseStatus {
        available_replicas: available,
        deployment_ready,
        service_ready: true,
        ingress_ready: true,
        dependencies_ready,
        url,
        conditions,
    }
}

async fn update_status(dse: &DevStagingEnvironment, client: &Client, ns: &str, status: DseStatus) {
    let api: Api<DevStagingEnvironment> = Api::namespaced(client.clone(), ns);
    let name = dse.name_any();
    let patch = json!({ "status": status });
    // Status updates are best-effort: a failure here must not fail the
    // reconcile (spec.md §7 "Status updates themselves must not fail the
    // reconcile").
    if let Err(e) = api.patch_status(&name, &kube::api::PatchParams::default(), &kube::api::Patch::Merge(&patch)).await {
        warn!(%name, "failed to update dse status: {e:?}");
    }
}

//! CIRunnerPool reconcile loop (spec.md §4.5). Structurally a smaller
//! sibling of `dse::controller`: same `Context`/`Diagnostics`/event-recorder
//! shape, same SSA-via-`reconcile_child` primitive, but a fixed sequence of
//! cluster-scoped RBAC objects gated on one precondition (the token Secret
//! existing) instead of a dependency fan-out.
//!
//! Kubernetes garbage collection cannot run a namespaced owner → cluster-
//! scoped dependent (a ClusterRole/ClusterRoleBinding can't carry an owner
//! reference to a namespaced CIRunnerPool), so those two are cleaned up with
//! an explicit finalizer instead of owner references.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::events::{Event, EventType, Recorder};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::dse::controller::{Context, Diagnostics};
use crate::dse::reconcile_primitive::{delete_if_exists, reconcile_child};
use crate::error::{Error, Result};
use crate::runner::builders::{build_cluster_role, build_cluster_role_binding, build_deployment, build_service_account, child_name};
use crate::runner::crd::{CIRunnerPool, RunnerPoolStatus};

pub const FINALIZER: &str = "cirunnerpools.kindling.dev/finalizer";

pub async fn run(client: Client) {
    let ctx = Arc::new(Context::new(client.clone()));
    let pools: Api<CIRunnerPool> = Api::all(client.clone());
    let deploys: Api<Deployment> = Api::all(client.clone());
    let sas: Api<ServiceAccount> = Api::all(client.clone());

    Controller::new(pools, WatcherConfig::default())
        .owns(deploys, WatcherConfig::default())
        .owns(sas, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((objref, _action)) => info!("reconciled runner pool {}", objref.name),
                Err(e) => error!("runner pool reconcile failed: {e:?}"),
            }
        })
        .await;
}

#[instrument(skip(ctx, pool), fields(trace_id = %crate::telemetry::get_trace_id()))]
async fn reconcile(pool: Arc<CIRunnerPool>, ctx: Arc<Context>) -> Result<Action> {
    let ns = pool.namespace().unwrap_or_else(|| "default".to_string());
    let name = pool.name_any();
    let diagnostics = Diagnostics::default();
    let recorder = Recorder::new(ctx.client.clone(), diagnostics.reporter.clone(), pool.object_ref(&()));

    if pool.meta().deletion_timestamp.is_some() {
        delete_cluster_scoped_children(&pool, &ctx).await?;
        ensure_finalizer(&name, &ns, &ctx, false).await?;
        recorder
            .publish(Event {
                type_: EventType::Normal,
                reason: "DeleteComplete".into(),
                note: Some(format!("removed cluster-scoped RBAC for `{name}`")),
                action: "Reconciling".into(),
                secondary: None,
            })
            .await
            .ok();
        return Ok(Action::await_change());
    }

    ensure_finalizer(&name, &ns, &ctx, true).await?;

    match reconcile_inner(&pool, &ctx, &ns).await {
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

fn error_policy(pool: Arc<CIRunnerPool>, err: &Error, ctx: Arc<Context>) -> Action {
    warn!(name = %pool.name_any(), "runner pool reconcile error: {err:?}");
    Action::requeue(ctx.config.error_requeue)
}

async fn ensure_finalizer(name: &str, ns: &str, ctx: &Context, present: bool) -> Result<()> {
    let api: Api<CIRunnerPool> = Api::namespaced(ctx.client.clone(), ns);
    let finalizers = if present { json!([FINALIZER]) } else { json!([]) };
    let patch = json!({ "metadata": { "finalizers": finalizers }});
    api.patch(name, &kube::api::PatchParams::default(), &kube::api::Patch::Merge(&patch))
        .await
        .map_err(Error::KubeError)?;
    Ok(())
}

async fn delete_cluster_scoped_children(pool: &CIRunnerPool, ctx: &Context) -> Result<()> {
    let name = child_name(pool);
    let role_api: Api<ClusterRole> = Api::all(ctx.client.clone());
    let binding_api: Api<ClusterRoleBinding> = Api::all(ctx.client.clone());
    delete_if_exists(&binding_api, &name).await?;
    delete_if_exists(&role_api, &name).await?;
    Ok(())
}

async fn reconcile_inner(pool: &CIRunnerPool, ctx: &Context, ns: &str) -> Result<Action> {
    let secret_api: Api<Secret> = Api::namespaced(ctx.client.clone(), ns);

    // Step 1: the token Secret must exist before anything else is created.
    if secret_api.get_opt(&pool.spec.token_secret_ref.name).await.map_err(Error::KubeError)?.is_none() {
        update_status(pool, &ctx.client, ns, RunnerPoolStatus::with_secret_not_found(&pool.spec.token_secret_ref.name))
            .await;
        return Ok(Action::requeue(ctx.config.error_requeue));
    }

    let field_manager = ctx.config.field_manager;
    let sa_api: Api<ServiceAccount> = Api::namespaced(ctx.client.clone(), ns);
    let role_api: Api<ClusterRole> = Api::all(ctx.client.clone());
    let binding_api: Api<ClusterRoleBinding> = Api::all(ctx.client.clone());
    let deploy_api: Api<Deployment> = Api::namespaced(ctx.client.clone(), ns);

    // Steps 2-4: ServiceAccount, ClusterRole, ClusterRoleBinding.
    reconcile_child(&sa_api, &build_service_account(pool)?, field_manager).await?;
    reconcile_child(&role_api, &build_cluster_role(pool)?, field_manager).await?;
    reconcile_child(&binding_api, &build_cluster_role_binding(pool)?, field_manager).await?;

    // Step 5: the runner Deployment.
    let deployment = reconcile_child(&deploy_api, &build_deployment(pool)?, field_manager).await?;

    // Step 6: status.
    let available = deployment.status.as_ref().and_then(|s| s.available_replicas).unwrap_or(0);
    let ready = available >= pool.spec.replicas;
    let status = RunnerPoolStatus {
        ready,
        conditions: vec![crate::dse::crd::Condition::new(
            "Ready",
            ready,
            if ready { "RolloutComplete" } else { "RolloutInProgress" },
            format!("available_replicas={available}/{}", pool.spec.replicas),
        )],
    };
    update_status(pool, &ctx.client, ns, status).await;

    Ok(if ready {
        let jitter = rand::thread_rng().gen_range(0..10);
        Action::requeue(ctx.config.steady_state_requeue + Duration::from_secs(jitter))
    } else {
        Action::requeue(ctx.config.readiness_requeue)
    })
}

async fn update_status(pool: &CIRunnerPool, client: &Client, ns: &str, status: RunnerPoolStatus) {
    let api: Api<CIRunnerPool> = Api::namespaced(client.clone(), ns);
    let name = pool.name_any();
    let patch = json!({ "status": status });
    if let Err(e) = api.patch_status(&name, &kube::api::PatchParams::default(), &kube::api::Patch::Merge(&patch)).await {
        warn!(%name, "failed to update runner pool status: {e:?}");
    }
}

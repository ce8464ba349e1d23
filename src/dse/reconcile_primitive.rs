//! The reconcile primitive (spec.md §4.2): get-or-create-or-update-by-hash,
//! applied uniformly to every child type via server-side apply
//! (`Api::patch(&name, &PatchParams::apply(field_manager).force(),
//! &Patch::Apply(&desired))`). Builders never set fields like
//! `spec.clusterIP` on a desired Service, so SSA never claims ownership of
//! that field and never clobbers it (spec.md §4.2 step 5, §8 invariant 4).
//!
//! The existing object is fetched first and the patch call is skipped
//! entirely when its spec-hash annotation already matches the desired one
//! (§4.2 step 4, §8 invariant 3), so an unchanged spec costs one GET and
//! zero writes.

use std::fmt::Debug;

use kube::api::{Patch, PatchParams};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::dse::hash::SPEC_HASH_ANNOTATION;
use crate::error::{Error, Result};

pub async fn reconcile_child<K>(api: &Api<K>, desired: &K, field_manager: &str) -> Result<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    let name = desired.name_any();
    if let Some(existing) = api.get_opt(&name).await.map_err(Error::KubeError)? {
        let existing_hash = existing.annotations().get(SPEC_HASH_ANNOTATION);
        let desired_hash = desired.annotations().get(SPEC_HASH_ANNOTATION);
        if existing_hash.is_some() && existing_hash == desired_hash {
            return Ok(existing);
        }
    }

    let patched = api
        .patch(&name, &PatchParams::apply(field_manager).force(), &Patch::Apply(desired))
        .await
        .map_err(Error::KubeError)?;
    Ok(patched)
}

/// Deletes a child by name if it exists; `NotFound` is not an error (the
/// object may already be gone from a prior partial reconcile) — spec.md
/// §4.2 "Errors are classified: `NotFound` ... otherwise surface".
pub async fn delete_if_exists<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &Default::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(Error::KubeError(e)),
    }
}

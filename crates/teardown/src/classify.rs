//! Resource classification: which objects belong to the installation, split
//! into system-owned (base) and user-owned (user) sets.

use std::collections::HashSet;

use uproot_core::{labels, system, Gvk, ManagedResource};

use crate::{Teardown, TeardownError};

fn namespace_gvk() -> Gvk {
    Gvk::core("v1", "Namespace")
}

fn crd_gvk() -> Gvk {
    Gvk::new("apiextensions.k8s.io", "v1", "CustomResourceDefinition")
}

fn push_unique(
    resources: &mut Vec<ManagedResource>,
    seen: &mut HashSet<(String, String)>,
    resource: ManagedResource,
) {
    if seen.insert((resource.kind().to_string(), resource.key())) {
        resources.push(resource);
    }
}

impl Teardown {
    /// System-owned objects, always eligible for deletion: the installed
    /// manifest (minus the default user namespace placeholder), every
    /// cluster namespace tagged managed, and every internal schema CRD.
    pub async fn base_resources(&self) -> Result<Vec<ManagedResource>, TeardownError> {
        let mut seen = HashSet::new();
        let mut resources = Vec::new();

        for resource in &self.installed {
            if resource.kind() == "Namespace" && resource.name == system::DEFAULT_USER_NAMESPACE {
                continue;
            }
            push_unique(&mut resources, &mut seen, resource.clone());
        }

        let selector = labels::managed_selector();
        let namespaces = self
            .client
            .list(&namespace_gvk(), Some(selector.as_str()))
            .await
            .map_err(TeardownError::Discovery)?;
        for ns in namespaces {
            // The default user namespace is user data; it only goes with --all.
            if ns.name == system::DEFAULT_USER_NAMESPACE {
                continue;
            }
            push_unique(&mut resources, &mut seen, ns);
        }

        let crds = self
            .client
            .list(&crd_gvk(), None)
            .await
            .map_err(TeardownError::Discovery)?;
        for crd in crds {
            if crd.name.ends_with(system::INTERNAL_CRD_SUFFIX) {
                push_unique(&mut resources, &mut seen, crd);
            }
        }

        self.resolve_kinds(&mut resources).await;
        Ok(resources)
    }

    /// User-owned data, deleted only on request: the default user namespace,
    /// managed secrets, managed persistent volumes. Sub-collections come
    /// back sorted so prompts and output are deterministic across runs.
    pub async fn user_resources(&self) -> Result<Vec<ManagedResource>, TeardownError> {
        let mut resources = vec![ManagedResource::cluster(
            namespace_gvk(),
            system::DEFAULT_USER_NAMESPACE,
        )];
        let selector = labels::managed_selector();

        let mut secrets = self
            .client
            .list(&Gvk::core("v1", "Secret"), Some(selector.as_str()))
            .await
            .map_err(TeardownError::Discovery)?;
        secrets.sort_by_key(|r| r.key());
        resources.extend(secrets);

        let mut volumes = self
            .client
            .list(&Gvk::core("v1", "PersistentVolume"), Some(selector.as_str()))
            .await
            .map_err(TeardownError::Discovery)?;
        volumes.sort_by_key(|r| r.key());
        resources.extend(volumes);

        self.resolve_kinds(&mut resources).await;
        Ok(resources)
    }

    /// Fill in group/version where only the kind is known. Failures keep the
    /// unresolved Gvk: a transient discovery error must never silently drop
    /// a resource from the teardown.
    async fn resolve_kinds(&self, resources: &mut [ManagedResource]) {
        for resource in resources.iter_mut() {
            if resource.gvk.is_resolved() {
                continue;
            }
            if let Some(gvk) = self.client.resolve_kind(resource).await {
                resource.gvk = gvk;
            }
        }
    }
}

//! uproot core types: resource identity and installation constants.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Label keys stamped on everything the installer creates.
pub mod labels {
    /// Set to "true" on every object owned by an uproot installation.
    pub const MANAGED: &str = "uproot.dev/managed";

    /// Label selector matching managed objects.
    pub fn managed_selector() -> String {
        format!("{}=true", MANAGED)
    }
}

/// Well-known names baked into an installation.
pub mod system {
    /// Namespace the control plane runs in.
    pub const SYSTEM_NAMESPACE: &str = "uproot-system";
    /// Namespace user workloads land in by default.
    pub const DEFAULT_USER_NAMESPACE: &str = "uproot";
    /// Name suffix carried by internal schema CRDs.
    pub const INTERNAL_CRD_SUFFIX: &str = ".internal.uproot.dev";
}

/// Group/version/kind triple. `group` and `version` may still be empty while
/// `kind` is known; discovery fills them in lazily.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        Self { group: group.to_string(), version: version.to_string(), kind: kind.to_string() }
    }

    /// Core-group kind, e.g. `Gvk::core("v1", "Namespace")`.
    pub fn core(version: &str, kind: &str) -> Self {
        Self::new("", version, kind)
    }

    /// Split an `apiVersion` string (`v1` or `group/v1`) into a Gvk.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((g, v)) => Self::new(g, v, kind),
            None => Self::new("", api_version, kind),
        }
    }

    /// `apiVersion` rendering: bare version for the core group, empty when
    /// the version is still unresolved.
    pub fn api_version(&self) -> String {
        if self.version.is_empty() {
            String::new()
        } else if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn gvk_key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.version.is_empty()
    }
}

/// The unit the teardown operates on. Identity is `(kind, namespace, name)`;
/// `namespace` is None for cluster-scoped objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagedResource {
    pub gvk: Gvk,
    pub namespace: Option<String>,
    pub name: String,
}

impl ManagedResource {
    pub fn namespaced(gvk: Gvk, namespace: &str, name: &str) -> Self {
        Self { gvk, namespace: Some(namespace.to_string()), name: name.to_string() }
    }

    pub fn cluster(gvk: Gvk, name: &str) -> Self {
        Self { gvk, namespace: None, name: name.to_string() }
    }

    pub fn kind(&self) -> &str {
        &self.gvk.kind
    }

    /// Identity key: `namespace/name`, bare `name` when cluster-scoped.
    pub fn key(&self) -> String {
        match self.namespace.as_deref() {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

//! uproot installed-manifest provider.
//!
//! The installer lays down a fixed set of objects (namespaces, internal CRDs,
//! RBAC, the apiserver Deployment/Service, the APIService registration). The
//! teardown seeds its base-resource enumeration from this same set, so the
//! manifest is embedded here and parsed into identities.

#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value as Json;

use uproot_core::{Gvk, ManagedResource};

const INSTALL_YAML: &str = include_str!("install.yaml");

/// The resource identities the installer creates, in manifest order.
pub fn installed() -> Result<Vec<ManagedResource>> {
    parse_manifest(INSTALL_YAML)
}

/// Parse a multi-document manifest into resource identities. Empty documents
/// are skipped; anything else must carry apiVersion, kind and metadata.name.
pub fn parse_manifest(yaml: &str) -> Result<Vec<ManagedResource>> {
    let mut out = Vec::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        let val = serde_yaml::Value::deserialize(document).context("parsing install manifest")?;
        if val.is_null() {
            continue;
        }
        let json = serde_json::to_value(val).context("converting manifest document to JSON")?;
        out.push(resource_from_doc(&json)?);
    }
    Ok(out)
}

fn resource_from_doc(doc: &Json) -> Result<ManagedResource> {
    let api_version = doc
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest document missing apiVersion"))?;
    let kind = doc
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest document missing kind"))?;
    let name = doc
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("manifest document missing metadata.name"))?;
    let namespace = doc
        .get("metadata")
        .and_then(|m| m.get("namespace"))
        .and_then(|v| v.as_str());
    Ok(ManagedResource {
        gvk: Gvk::from_api_version(api_version, kind),
        namespace: namespace.map(|s| s.to_string()),
        name: name.to_string(),
    })
}

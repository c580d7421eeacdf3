//! Kubernetes client construction and server-side apply of static manifests

use std::path::Path;
use std::time::Duration;

use kube::api::{Api, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config, ResourceExt};
use tracing::debug;

use crate::{Error, FIELD_MANAGER};

/// Connection timeout for kube clients
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout for kube clients; watches must time out before this
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from a kubeconfig path, or the inferred
/// (in-cluster or default kubeconfig) config when `None`
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| client_error(&format!("read {}", path.display()), e))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| client_error("load kubeconfig", e))?
        }
        None => Config::infer()
            .await
            .map_err(|e| client_error("infer config", e))?,
    };
    config.connect_timeout = Some(CONNECT_TIMEOUT);
    config.read_timeout = Some(READ_TIMEOUT);
    Client::try_from(config).map_err(|e| client_error("build client", e))
}

fn client_error(step: &str, e: impl std::fmt::Display) -> Error {
    Error::internal_with_context("create_client", format!("failed to {}: {}", step, e))
}

/// Split an apiVersion into (group, version); the core group is empty
///
/// ```
/// use storage_common::kube_utils::parse_api_version;
///
/// assert_eq!(parse_api_version("storage.k8s.io/v1"), ("storage.k8s.io", "v1"));
/// assert_eq!(parse_api_version("v1"), ("", "v1"));
/// ```
pub fn parse_api_version(api_version: &str) -> (&str, &str) {
    api_version.split_once('/').unwrap_or(("", api_version))
}

/// A single manifest document and the API resource it belongs to
#[derive(Clone, Debug)]
pub struct Manifest {
    /// The object as written in the manifest
    pub object: DynamicObject,
    /// Resource used to address the object
    pub resource: ApiResource,
}

impl Manifest {
    /// Parse one YAML (or JSON) document
    pub fn parse(document: &str) -> Result<Self, Error> {
        let object: DynamicObject = serde_yaml::from_str(document)?;

        let types = object
            .types
            .as_ref()
            .filter(|t| !t.api_version.is_empty() && !t.kind.is_empty())
            .ok_or_else(|| Error::serialization("manifest has no apiVersion/kind"))?;
        if object.metadata.name.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::serialization(format!(
                "{} manifest has no metadata.name",
                types.kind
            )));
        }

        let (group, version) = parse_api_version(&types.api_version);
        let gvk = GroupVersionKind::gvk(group, version, &types.kind);
        Ok(Self {
            resource: ApiResource::from_gvk(&gvk),
            object,
        })
    }

    /// Server-side apply the object, taking ownership of conflicting fields
    pub async fn apply(&self, client: &Client) -> Result<(), Error> {
        let name = self.object.name_any();
        let api: Api<DynamicObject> = match self.object.namespace() {
            Some(ns) => Api::namespaced_with(client.clone(), &ns, &self.resource),
            None => Api::all_with(client.clone(), &self.resource),
        };

        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&self.object),
        )
        .await
        .map_err(|e| {
            Error::internal_with_context(
                "apply_manifest",
                format!("{} {}: {}", self.resource.kind, name, e),
            )
        })?;

        debug!(kind = %self.resource.kind, name = %name, "Applied manifest");
        Ok(())
    }
}

/// Split a multi-document YAML string, dropping empty and comment-only documents
pub fn split_documents(manifests: &str) -> impl Iterator<Item = &str> {
    manifests.split("\n---").map(str::trim).filter(|doc| {
        doc.lines()
            .map(str::trim)
            .any(|line| !line.is_empty() && !line.starts_with('#'))
    })
}

/// Apply every document of a multi-document manifest, stopping at the first failure
pub async fn apply_manifests(client: &Client, manifests: &str) -> Result<(), Error> {
    for document in split_documents(manifests) {
        Manifest::parse(document)?.apply(client).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_yaml_manifest() {
        let manifest = Manifest::parse(
            r#"
apiVersion: v1
kind: ServiceAccount
metadata:
  name: aws-ebs-csi-driver-operator
  namespace: openshift-cluster-csi-drivers
"#,
        )
        .unwrap();

        assert_eq!(manifest.object.name_any(), "aws-ebs-csi-driver-operator");
        assert_eq!(
            manifest.object.namespace().as_deref(),
            Some("openshift-cluster-csi-drivers")
        );
        assert_eq!(manifest.resource.group, "");
        assert_eq!(manifest.resource.plural, "serviceaccounts");
    }

    #[test]
    fn cluster_scoped_json_manifest() {
        let manifest = Manifest::parse(
            r#"{"apiVersion":"rbac.authorization.k8s.io/v1","kind":"ClusterRole","metadata":{"name":"csi-role"},"rules":[]}"#,
        )
        .unwrap();

        assert!(manifest.object.namespace().is_none());
        assert_eq!(manifest.resource.group, "rbac.authorization.k8s.io");
        assert_eq!(manifest.resource.version, "v1");
        assert_eq!(manifest.resource.plural, "clusterroles");
        // Non-metadata fields are carried through to the apply patch
        assert!(manifest.object.data.get("rules").is_some());
    }

    #[test]
    fn storage_class_plural() {
        let manifest = Manifest::parse(
            "apiVersion: storage.k8s.io/v1\nkind: StorageClass\nmetadata:\n  name: gp3-csi\n",
        )
        .unwrap();
        assert_eq!(manifest.resource.plural, "storageclasses");
    }

    #[test]
    fn manifest_without_name_rejected() {
        assert!(Manifest::parse("apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n").is_err());
    }

    #[test]
    fn manifest_without_kind_rejected() {
        assert!(Manifest::parse("apiVersion: v1\nmetadata:\n  name: x\n").is_err());
    }

    #[test]
    fn split_documents_skips_empty_and_comment_only() {
        let manifests =
            "apiVersion: v1\nkind: A\n---\n# comment only\n---\n\n---\napiVersion: v1\nkind: B\n";
        let docs: Vec<&str> = split_documents(manifests).collect();
        assert_eq!(docs.len(), 2);
        assert!(docs[1].contains("kind: B"));
    }
}

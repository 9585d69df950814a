#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use uproot_core::{system, Gvk, ManagedResource};
use uproot_kubehub::{ClientError, GetStep, MockClient};
use uproot_teardown::{Outcome, Prompt, Teardown, TeardownError, TeardownOptions};

struct Always(bool);

impl Prompt for Always {
    fn confirm(&self, _question: &str) -> Result<bool, TeardownError> {
        Ok(self.0)
    }
}

struct NeverAsked;

impl Prompt for NeverAsked {
    fn confirm(&self, _question: &str) -> Result<bool, TeardownError> {
        panic!("the gate must be skipped under --force");
    }
}

fn namespace(name: &str) -> ManagedResource {
    ManagedResource::cluster(Gvk::core("v1", "Namespace"), name)
}

fn secret(ns: &str, name: &str) -> ManagedResource {
    ManagedResource::namespaced(Gvk::core("v1", "Secret"), ns, name)
}

fn crd(name: &str) -> ManagedResource {
    ManagedResource::cluster(
        Gvk::new("apiextensions.k8s.io", "v1", "CustomResourceDefinition"),
        name,
    )
}

fn teardown(client: Arc<MockClient>, installed: Vec<ManagedResource>, all: bool, force: bool) -> Teardown {
    Teardown::new(client, installed, TeardownOptions { all, force })
        .with_wait_config(Duration::from_millis(1), None)
}

#[tokio::test]
async fn keep_mode_deletes_only_base() {
    let client = Arc::new(MockClient::new());
    client.set_list("CustomResourceDefinition", vec![crd("apps.internal.uproot.dev")]);

    let td = teardown(client.clone(), Vec::new(), false, false);
    let outcome = td.run(&Always(true)).await.unwrap();

    assert_eq!(outcome, Outcome::TornDown);
    assert_eq!(
        client.deletes(),
        vec!["CustomResourceDefinition apps.internal.uproot.dev"]
    );
}

#[tokio::test]
async fn delete_all_takes_user_data_with_namespaces_last() {
    let client = Arc::new(MockClient::new());
    client.set_list("CustomResourceDefinition", vec![crd("apps.internal.uproot.dev")]);
    client.set_list("Secret", vec![secret("uproot", "db-creds")]);

    let td = teardown(client.clone(), Vec::new(), true, false);
    let outcome = td.run(&Always(true)).await.unwrap();

    assert_eq!(outcome, Outcome::TornDown);
    let deletes = client.deletes();
    assert_eq!(deletes.len(), 3);
    assert_eq!(deletes.last().unwrap(), "Namespace uproot");
    assert!(deletes.contains(&"Secret uproot/db-creds".to_string()));
}

#[tokio::test]
async fn cascaded_keeps_are_promoted_into_the_plan() {
    // The system namespace is planned for deletion (manifest), so a kept
    // secret living inside it is promoted even without --all.
    let client = Arc::new(MockClient::new());
    client.set_list("Secret", vec![secret(system::SYSTEM_NAMESPACE, "registry-creds")]);

    let installed = vec![namespace(system::SYSTEM_NAMESPACE)];
    let td = teardown(client.clone(), installed, false, false);
    let outcome = td.run(&Always(true)).await.unwrap();

    assert_eq!(outcome, Outcome::TornDown);
    let deletes = client.deletes();
    assert!(deletes.contains(&format!("Secret {}/registry-creds", system::SYSTEM_NAMESPACE)));
    // The default user namespace was not in a doomed namespace; it survived.
    assert!(!deletes.contains(&"Namespace uproot".to_string()));
    // Ordering still holds after promotion.
    assert_eq!(deletes.last().unwrap(), &format!("Namespace {}", system::SYSTEM_NAMESPACE));
}

#[tokio::test]
async fn absent_resources_do_not_fail_the_run() {
    let client = Arc::new(MockClient::new());
    client.set_list("CustomResourceDefinition", vec![crd("apps.internal.uproot.dev")]);
    client.fail_delete(
        "CustomResourceDefinition apps.internal.uproot.dev",
        ClientError::NotFound("customresourcedefinitions \"apps.internal.uproot.dev\" not found".into()),
    );

    let td = teardown(client.clone(), Vec::new(), false, false);
    let outcome = td.run(&Always(true)).await.unwrap();

    assert_eq!(outcome, Outcome::TornDown);
    // The wait phase needed a single lookup to observe the absence.
    assert_eq!(client.get_count("CustomResourceDefinition apps.internal.uproot.dev"), 1);
}

#[tokio::test]
async fn partial_failure_attempts_everything_and_skips_the_wait() {
    let client = Arc::new(MockClient::new());
    client.set_list(
        "CustomResourceDefinition",
        vec![crd("apps.internal.uproot.dev"), crd("appinstances.internal.uproot.dev")],
    );
    client.fail_delete(
        "CustomResourceDefinition appinstances.internal.uproot.dev",
        ClientError::Api("webhook denied the request".into()),
    );

    let td = teardown(client.clone(), Vec::new(), false, false);
    let err = td.run(&Always(true)).await.unwrap_err();

    match err {
        TeardownError::PartialDeletion(errs) => assert_eq!(errs.len(), 1),
        other => panic!("expected PartialDeletion, got {:?}", other),
    }
    assert_eq!(client.deletes().len(), 2);
    assert_eq!(client.get_count("CustomResourceDefinition apps.internal.uproot.dev"), 0);
}

#[tokio::test]
async fn finalized_resources_are_awaited() {
    let client = Arc::new(MockClient::new());
    client.set_list("CustomResourceDefinition", vec![crd("apps.internal.uproot.dev")]);
    client.script_gets(
        "CustomResourceDefinition apps.internal.uproot.dev",
        vec![GetStep::Present, GetStep::Present, GetStep::Absent],
    );

    let td = teardown(client.clone(), Vec::new(), false, false);
    let outcome = td.run(&Always(true)).await.unwrap();

    assert_eq!(outcome, Outcome::TornDown);
    assert_eq!(client.get_count("CustomResourceDefinition apps.internal.uproot.dev"), 3);
}

#[tokio::test]
async fn declined_confirmation_aborts_before_deleting() {
    let client = Arc::new(MockClient::new());
    client.set_list("CustomResourceDefinition", vec![crd("apps.internal.uproot.dev")]);

    let td = teardown(client.clone(), Vec::new(), false, false);
    let outcome = td.run(&Always(false)).await.unwrap();

    assert_eq!(outcome, Outcome::Aborted);
    assert!(client.deletes().is_empty());
}

#[tokio::test]
async fn force_skips_the_gate() {
    let client = Arc::new(MockClient::new());
    client.set_list("CustomResourceDefinition", vec![crd("apps.internal.uproot.dev")]);

    let td = teardown(client.clone(), Vec::new(), false, true);
    let outcome = td.run(&NeverAsked).await.unwrap();
    assert_eq!(outcome, Outcome::TornDown);
}

#[tokio::test]
async fn discovery_failure_aborts_before_anything_destructive() {
    let client = Arc::new(MockClient::new());
    client.fail_list("Namespace", ClientError::Api("connection refused".into()));

    let td = teardown(client.clone(), Vec::new(), false, true);
    let err = td.run(&NeverAsked).await.unwrap_err();

    assert!(matches!(err, TeardownError::Discovery(_)));
    assert!(client.deletes().is_empty());
}

#[tokio::test]
async fn full_install_manifest_tears_down_cleanly() {
    let client = Arc::new(MockClient::new());
    client.set_list(
        "Namespace",
        vec![namespace(system::SYSTEM_NAMESPACE), namespace(system::DEFAULT_USER_NAMESPACE)],
    );
    client.set_list(
        "CustomResourceDefinition",
        vec![crd("apps.internal.uproot.dev"), crd("appinstances.internal.uproot.dev")],
    );
    client.set_list("Secret", vec![secret(system::DEFAULT_USER_NAMESPACE, "db-creds")]);

    let installed = uproot_manifest::installed().unwrap();
    let td = teardown(client.clone(), installed, true, true);
    let outcome = td.run(&NeverAsked).await.unwrap();

    assert_eq!(outcome, Outcome::TornDown);
    let deletes = client.deletes();
    assert!(deletes.contains(&format!("Deployment {}/uproot-apiserver", system::SYSTEM_NAMESPACE)));
    assert!(deletes.contains(&"APIService v1.api.uproot.dev".to_string()));
    assert!(deletes.contains(&"Secret uproot/db-creds".to_string()));
    // Both namespaces go, and only at the very end.
    let ns_positions: Vec<usize> = deletes
        .iter()
        .enumerate()
        .filter(|(_, k)| k.starts_with("Namespace "))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(ns_positions.len(), 2);
    assert!(ns_positions.iter().all(|&i| i >= deletes.len() - 2));
}

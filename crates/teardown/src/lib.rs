//! uproot teardown orchestrator.
//!
//! Tears down an installation in phases: classify (base vs user resources),
//! plan (mode-dependent merge + deletion-safe ordering), confirm, delete,
//! then wait until the control plane reports every deletion complete.
//! Deletion and wait failures are accumulated per resource instead of
//! aborting the run, so the operator always gets the full picture.

#![forbid(unsafe_code)]

mod classify;
mod confirm;
mod plan;

pub use confirm::{confirm, plan_rows, question, Action, PlanRow, Prompt, TermPrompt};
pub use plan::{plan, promote_cascaded, sort_to_delete};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{info, warn};

use uproot_core::ManagedResource;
use uproot_kubehub::{ClientError, ResourceClient};

/// Run configuration: the two operator-facing switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeardownOptions {
    /// Also delete user-owned data (secrets, volumes, the default namespace).
    pub all: bool,
    /// Skip the confirmation gate.
    pub force: bool,
}

/// Non-fatal errors accumulated across a phase, in encounter order.
#[derive(Debug, Default)]
pub struct ErrorList(pub Vec<ClientError>);

impl ErrorList {
    pub fn push(&mut self, err: ClientError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
        write!(f, "{}", joined)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    /// Listing or resolving resources failed; nothing destructive happened.
    #[error("discovering resources: {0}")]
    Discovery(ClientError),
    /// Rendering or reading the confirmation failed; nothing destructive happened.
    #[error("confirmation prompt: {0}")]
    Prompt(String),
    /// One or more delete calls failed; the wait phase was skipped.
    #[error("deleting resources: {0}")]
    PartialDeletion(ErrorList),
    /// One or more resources were never observed absent.
    #[error("waiting for deletion: {0}")]
    Incomplete(ErrorList),
}

/// How a run ended when no error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    TornDown,
    Aborted,
}

fn wait_poll_interval() -> Duration {
    let secs = std::env::var("UPROOT_WAIT_POLL_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(2);
    Duration::from_secs(secs)
}

// Finalizer-driven deletion has no fixed upper bound, so the wait is
// unbounded unless a deadline is configured.
fn wait_timeout() -> Option<Duration> {
    std::env::var("UPROOT_WAIT_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// The teardown run. Holds the resource client and the installed-manifest
/// seed for its whole lifetime; all phases are methods on this type.
pub struct Teardown {
    client: Arc<dyn ResourceClient>,
    installed: Vec<ManagedResource>,
    opts: TeardownOptions,
    poll_interval: Duration,
    wait_deadline: Option<Duration>,
}

impl Teardown {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        installed: Vec<ManagedResource>,
        opts: TeardownOptions,
    ) -> Self {
        Self {
            client,
            installed,
            opts,
            poll_interval: wait_poll_interval(),
            wait_deadline: wait_timeout(),
        }
    }

    /// Override the wait poll cadence and optional per-resource deadline.
    pub fn with_wait_config(mut self, poll_interval: Duration, deadline: Option<Duration>) -> Self {
        self.poll_interval = poll_interval;
        self.wait_deadline = deadline;
        self
    }

    /// Classify, plan, confirm, delete, wait.
    pub async fn run(&self, prompt: &dyn Prompt) -> Result<Outcome, TeardownError> {
        let base = self.base_resources().await?;
        let user = self.user_resources().await?;
        info!(base = base.len(), user = user.len(), all = self.opts.all, "teardown plan input");

        let (mut to_delete, mut to_keep) = plan(base, user, self.opts.all);
        promote_cascaded(&mut to_delete, &mut to_keep);

        if !self.opts.force && !confirm(&to_delete, &to_keep, prompt)? {
            return Ok(Outcome::Aborted);
        }

        let errs = self.execute(&to_delete).await;
        if !errs.is_empty() {
            return Err(TeardownError::PartialDeletion(errs));
        }

        let errs = self.wait_for_deletion(&to_delete).await;
        if !errs.is_empty() {
            return Err(TeardownError::Incomplete(errs));
        }
        Ok(Outcome::TornDown)
    }

    /// Issue deletes in plan order. An already-absent object counts as
    /// success; any other failure is recorded and the sweep continues.
    pub async fn execute(&self, to_delete: &[ManagedResource]) -> ErrorList {
        let mut errs = ErrorList::default();
        for resource in to_delete {
            counter!("teardown_delete_attempts", 1u64);
            println!(
                "Deleting {} {} {}",
                resource.key(),
                resource.kind(),
                resource.gvk.api_version()
            );
            if let Err(e) = self.client.delete(resource).await {
                if !e.is_not_found() {
                    warn!(resource = %resource.key(), error = %e, "delete failed");
                    counter!("teardown_delete_err", 1u64);
                    errs.push(e);
                }
            }
        }
        errs
    }

    /// Poll every deleted resource until the control plane reports it absent.
    /// A get failure abandons the wait for that resource only.
    pub async fn wait_for_deletion(&self, to_delete: &[ManagedResource]) -> ErrorList {
        let mut errs = ErrorList::default();
        for resource in to_delete {
            match self.client.get(resource).await {
                // Already gone: nothing had a finalizer to wait on.
                Ok(None) => continue,
                Ok(Some(_)) => {}
                Err(e) => {
                    warn!(resource = %resource.key(), error = %e, "wait lookup failed");
                    errs.push(e);
                    continue;
                }
            }

            println!(
                "Waiting for {} {} {} to delete",
                resource.key(),
                resource.kind(),
                resource.gvk.api_version()
            );
            let t0 = Instant::now();
            let deadline = self.wait_deadline.map(|d| t0 + d);
            loop {
                match self.client.get(resource).await {
                    Ok(None) => {
                        histogram!("teardown_wait_seconds", t0.elapsed().as_secs_f64());
                        println!("Deleted {}", resource.key());
                        break;
                    }
                    Ok(Some(_)) => {}
                    Err(e) => {
                        eprintln!("error waiting for {}: {}", resource.key(), e);
                        errs.push(e);
                        break;
                    }
                }
                if let Some(d) = deadline {
                    if Instant::now() >= d {
                        let err = ClientError::Api(format!(
                            "timed out waiting for {} {} to delete",
                            resource.kind(),
                            resource.key()
                        ));
                        eprintln!("error waiting for {}: {}", resource.key(), err);
                        errs.push(err);
                        break;
                    }
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        errs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uproot_core::Gvk;
    use uproot_kubehub::{GetStep, MockClient};

    fn crd(name: &str) -> ManagedResource {
        ManagedResource::cluster(
            Gvk::new("apiextensions.k8s.io", "v1", "CustomResourceDefinition"),
            name,
        )
    }

    fn secret(ns: &str, name: &str) -> ManagedResource {
        ManagedResource::namespaced(Gvk::core("v1", "Secret"), ns, name)
    }

    fn teardown(client: Arc<MockClient>) -> Teardown {
        Teardown::new(client, Vec::new(), TeardownOptions::default())
            .with_wait_config(Duration::from_millis(1), None)
    }

    #[tokio::test]
    async fn execute_tolerates_absent_resources() {
        let client = Arc::new(MockClient::new());
        client.fail_delete(
            "Secret ns1/gone",
            ClientError::NotFound("secrets \"gone\" not found".into()),
        );
        let td = teardown(client.clone());
        let errs = td.execute(&[secret("ns1", "gone"), secret("ns1", "live")]).await;
        assert!(errs.is_empty());
        assert_eq!(client.deletes(), vec!["Secret ns1/gone", "Secret ns1/live"]);
    }

    #[tokio::test]
    async fn execute_continues_past_failures() {
        let client = Arc::new(MockClient::new());
        client.fail_delete("Secret ns1/b", ClientError::Api("forbidden".into()));
        let td = teardown(client.clone());
        let errs = td
            .execute(&[secret("ns1", "a"), secret("ns1", "b"), secret("ns1", "c")])
            .await;
        assert_eq!(errs.len(), 1);
        assert_eq!(
            client.deletes(),
            vec!["Secret ns1/a", "Secret ns1/b", "Secret ns1/c"]
        );
    }

    #[tokio::test]
    async fn wait_polls_until_absent() {
        let client = Arc::new(MockClient::new());
        let res = crd("apps.internal.uproot.dev");
        client.script_gets(
            "CustomResourceDefinition apps.internal.uproot.dev",
            vec![GetStep::Present, GetStep::Present, GetStep::Absent],
        );
        let td = teardown(client.clone());
        let errs = td.wait_for_deletion(std::slice::from_ref(&res)).await;
        assert!(errs.is_empty());
        assert_eq!(
            client.get_count("CustomResourceDefinition apps.internal.uproot.dev"),
            3
        );
    }

    #[tokio::test]
    async fn wait_skips_resources_already_gone() {
        let client = Arc::new(MockClient::new());
        let res = secret("ns1", "gone");
        // No script: the mock reports the object absent on first get.
        let td = teardown(client.clone());
        let errs = td.wait_for_deletion(std::slice::from_ref(&res)).await;
        assert!(errs.is_empty());
        assert_eq!(client.get_count("Secret ns1/gone"), 1);
    }

    #[tokio::test]
    async fn wait_records_failure_and_moves_on() {
        let client = Arc::new(MockClient::new());
        let broken = secret("ns1", "broken");
        let fine = secret("ns1", "fine");
        client.script_gets(
            "Secret ns1/broken",
            vec![GetStep::Present, GetStep::Fail(ClientError::Api("etcd timeout".into()))],
        );
        client.script_gets("Secret ns1/fine", vec![GetStep::Present, GetStep::Absent]);
        let td = teardown(client.clone());
        let errs = td.wait_for_deletion(&[broken, fine]).await;
        assert_eq!(errs.len(), 1);
        // The second resource was still awaited to completion.
        assert_eq!(client.get_count("Secret ns1/fine"), 2);
    }

    #[tokio::test]
    async fn wait_deadline_records_timeout() {
        let client = Arc::new(MockClient::new());
        let stuck = secret("ns1", "stuck");
        let fine = secret("ns1", "fine");
        client.script_gets("Secret ns1/stuck", vec![GetStep::Present; 64]);
        client.script_gets("Secret ns1/fine", vec![GetStep::Present, GetStep::Absent]);
        let td = Teardown::new(client.clone(), Vec::new(), TeardownOptions::default())
            .with_wait_config(Duration::from_millis(1), Some(Duration::from_millis(10)));
        let errs = td.wait_for_deletion(&[stuck, fine]).await;
        assert_eq!(errs.len(), 1);
        assert!(errs.0[0].to_string().contains("timed out"), "err={}", errs.0[0]);
        assert_eq!(client.get_count("Secret ns1/fine"), 2);
    }

    #[test]
    fn error_list_display_joins_entries() {
        let mut errs = ErrorList::default();
        errs.push(ClientError::Api("one".into()));
        errs.push(ClientError::Discovery("two".into()));
        assert_eq!(errs.to_string(), "api: one; discovery: two");
    }
}

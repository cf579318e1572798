//! Push state machine: LOCAL -> PUSHED, exactly once per report.
//!
//! The sequence is load, guard, registry submission, then a conditional
//! single-row commit. The registry call and the commit are not atomic and
//! there is no two-phase protocol with the registry. When two pushes race,
//! both may submit, but only one commit lands; the loser's registry-side
//! record is orphaned. That window is accepted and logged, never papered
//! over by retrying the registry against a report that is no longer
//! `LOCAL`.

use std::sync::Arc;

use medrep_core::report::{Report, ReportStatus};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::registry::{RegistryClient, RegistryError};
use crate::store::{Mutation, Store, StoreError};

/// Errors from a push attempt.
#[derive(Debug, Error)]
pub enum PushError {
    /// Report absent, or owned by someone else.
    #[error("report not found")]
    NotFound,

    /// Report has already been pushed, here or by a concurrent racer.
    #[error("report already pushed")]
    AlreadyPushed,

    /// The registry submission failed; the report stays `LOCAL`.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The local database failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives reports through the registry submission and the local commit.
#[derive(Clone)]
pub struct PushOrchestrator {
    store: Store,
    registry: Arc<dyn RegistryClient>,
}

impl PushOrchestrator {
    #[must_use]
    pub fn new(store: Store, registry: Arc<dyn RegistryClient>) -> Self {
        Self { store, registry }
    }

    /// Pushes one report to the national registry.
    ///
    /// A report that is not `LOCAL` is rejected before any registry
    /// traffic. After a successful submission the transition is committed
    /// with a conditional write; if that write matches zero rows because a
    /// racer committed first, the race is reported as
    /// [`PushError::AlreadyPushed`] and the registry is not called again.
    ///
    /// # Errors
    ///
    /// - [`PushError::NotFound`] when the subject owns no such report.
    /// - [`PushError::AlreadyPushed`] when the report is already `PUSHED`.
    /// - [`PushError::Registry`] when the submission fails; the report is
    ///   left `LOCAL` and the push can be retried.
    /// - [`PushError::Store`] when the database fails.
    pub async fn push(&self, subject_id: Uuid, report_id: &str) -> Result<Report, PushError> {
        let Some(report) = self.store.get_report(subject_id, report_id)? else {
            return Err(PushError::NotFound);
        };
        if report.status != ReportStatus::Local {
            return Err(PushError::AlreadyPushed);
        }

        let national_id = self
            .registry
            .submit(&report.patient_name, &report.diagnosis)
            .await?;

        match self.store.mark_pushed(subject_id, report_id, &national_id)? {
            Mutation::Applied(pushed) => {
                info!(
                    report_id,
                    registry = self.registry.name(),
                    "report pushed to national registry"
                );
                Ok(pushed)
            }
            Mutation::NotFound => Err(PushError::NotFound),
            Mutation::StatusConflict => {
                warn!(
                    report_id,
                    national_id = %national_id,
                    "push lost a commit race; registry submission is orphaned"
                );
                Err(PushError::AlreadyPushed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use medrep_core::report::ReportDraft;
    use tokio::sync::Barrier;

    use super::*;
    use crate::registry::MockRegistry;

    const FAKE_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$c29tZWhhc2g";

    fn seeded_store() -> (Store, Uuid) {
        let store = Store::open_in_memory().unwrap();
        let subject = store
            .create_account("clinician@example.com", FAKE_HASH, Utc::now())
            .unwrap()
            .id;
        (store, subject)
    }

    fn seed_report(store: &Store, subject: Uuid) -> String {
        let draft = ReportDraft::new("Jane Doe", "Flu").unwrap();
        store
            .create_report(subject, &draft, Utc::now())
            .unwrap()
            .id
            .to_string()
    }

    #[tokio::test]
    async fn push_transitions_local_to_pushed() {
        let (store, subject) = seeded_store();
        let report_id = seed_report(&store, subject);
        let registry = Arc::new(MockRegistry::new());
        let pusher = PushOrchestrator::new(store.clone(), registry.clone());

        let pushed = pusher.push(subject, &report_id).await.unwrap();
        assert_eq!(pushed.status, ReportStatus::Pushed);
        let national_id = pushed.national_id.unwrap();
        assert!(national_id.starts_with("NAT-"));
        assert_eq!(registry.calls(), 1);

        let persisted = store.get_report(subject, &report_id).unwrap().unwrap();
        assert_eq!(persisted.status, ReportStatus::Pushed);
        assert_eq!(persisted.national_id.as_deref(), Some(national_id.as_str()));
    }

    #[tokio::test]
    async fn second_push_is_rejected_before_the_registry() {
        let (store, subject) = seeded_store();
        let report_id = seed_report(&store, subject);
        let registry = Arc::new(MockRegistry::new());
        let pusher = PushOrchestrator::new(store, registry.clone());

        pusher.push(subject, &report_id).await.unwrap();
        let err = pusher.push(subject, &report_id).await.unwrap_err();
        assert!(matches!(err, PushError::AlreadyPushed));
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test]
    async fn absent_report_never_reaches_the_registry() {
        let (store, subject) = seeded_store();
        let registry = Arc::new(MockRegistry::new());
        let pusher = PushOrchestrator::new(store, registry.clone());

        let err = pusher
            .push(subject, &Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::NotFound));
        assert_eq!(registry.calls(), 0);
    }

    #[tokio::test]
    async fn unowned_report_is_not_found() {
        let (store, owner) = seeded_store();
        let other = store
            .create_account("other@example.com", FAKE_HASH, Utc::now())
            .unwrap()
            .id;
        let report_id = seed_report(&store, owner);
        let registry = Arc::new(MockRegistry::new());
        let pusher = PushOrchestrator::new(store, registry.clone());

        let err = pusher.push(other, &report_id).await.unwrap_err();
        assert!(matches!(err, PushError::NotFound));
        assert_eq!(registry.calls(), 0);
    }

    #[tokio::test]
    async fn registry_failure_leaves_report_local_and_retryable() {
        let (store, subject) = seeded_store();
        let report_id = seed_report(&store, subject);
        let registry = Arc::new(MockRegistry::new());
        let pusher = PushOrchestrator::new(store.clone(), registry.clone());

        registry.fail_with(RegistryError::Transport("connection refused".to_string()));
        let err = pusher.push(subject, &report_id).await.unwrap_err();
        assert!(matches!(err, PushError::Registry(_)));

        let report = store.get_report(subject, &report_id).unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Local);
        assert_eq!(report.national_id, None);

        registry.succeed();
        let pushed = pusher.push(subject, &report_id).await.unwrap();
        assert_eq!(pushed.status, ReportStatus::Pushed);
    }

    /// Holds every submission at a barrier so two pushes pass the status
    /// guard before either commits.
    struct BarrierRegistry {
        inner: MockRegistry,
        barrier: Barrier,
    }

    #[async_trait]
    impl RegistryClient for BarrierRegistry {
        async fn submit(
            &self,
            patient_name: &str,
            diagnosis: &str,
        ) -> Result<String, RegistryError> {
            self.barrier.wait().await;
            self.inner.submit(patient_name, diagnosis).await
        }

        fn name(&self) -> &'static str {
            "barrier-mock"
        }
    }

    #[tokio::test]
    async fn concurrent_pushes_commit_exactly_once() {
        let (store, subject) = seeded_store();
        let report_id = seed_report(&store, subject);
        let registry = Arc::new(BarrierRegistry {
            inner: MockRegistry::new(),
            barrier: Barrier::new(2),
        });
        let pusher = PushOrchestrator::new(store.clone(), registry.clone());

        let spawn_push = |pusher: PushOrchestrator, id: String| {
            tokio::spawn(async move { pusher.push(subject, &id).await })
        };
        let first = spawn_push(pusher.clone(), report_id.clone());
        let second = spawn_push(pusher, report_id.clone());

        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        let wins = outcomes.iter().filter(|o| o.is_ok()).count();
        assert_eq!(wins, 1, "exactly one racer must commit: {outcomes:?}");
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, Err(PushError::AlreadyPushed))));

        // Both racers reached the registry; the loser's submission is the
        // documented orphan.
        assert_eq!(registry.inner.calls(), 2);

        let report = store.get_report(subject, &report_id).unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Pushed);
        let national_id = report.national_id.unwrap();
        assert!(registry.inner.issued().contains(&national_id));
    }
}

//! Subscription reconciliation.
//!
//! Finds or creates the protected data item a messaging app needs and makes
//! sure the app/user pair has been granted access to it, doing the least
//! possible work:
//! - an existing item that already carries a grant is reused as is
//! - an existing item without a grant gets one
//! - otherwise a new item is created and granted
//!
//! Existing items are probed in the order the data protector lists them and
//! the first one with a grant wins. That order is not guaranteed to be stable
//! across calls, so when several items match, which one is picked may differ
//! between runs.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{CoreError, Result, error_chain};
use crate::services::DataProtector;
use crate::types::{
    AccessGrant, DataSchema, DesiredData, FieldValue, GrantSpec, ProtectDataRequest,
    ProtectedData, SchemaType,
};

/// What a reconciliation had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileOutcome {
    AlreadySubscribed,
    GrantedToExisting,
    CreatedAndGranted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub dataset: String,
    pub outcome: ReconcileOutcome,
    /// Grant created by this call, if any
    pub grant: Option<AccessGrant>,
}

/// Counts from a revocation sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationSummary {
    pub resources_scanned: usize,
    pub grants_found: usize,
    pub grants_revoked: usize,
    pub grants_failed: usize,
    /// Data items whose grants could not be listed
    pub lookups_failed: usize,
}

pub struct Reconciler {
    protector: Arc<dyn DataProtector>,
    marker_field: String,
}

impl Reconciler {
    pub fn new(protector: Arc<dyn DataProtector>, config: &ClientConfig) -> Self {
        Self {
            protector,
            marker_field: config.marker_field.clone(),
        }
    }

    /// Schema used to find items created by this tool: the service schema
    /// plus the marker field.
    pub fn effective_schema(&self, schema: &DataSchema) -> DataSchema {
        schema
            .clone()
            .with_field(self.marker_field.clone(), SchemaType::Bool)
    }

    pub async fn reconcile(
        &self,
        owner: &str,
        schema: &DataSchema,
        desired: &DesiredData,
        grant: &GrantSpec,
    ) -> Result<ReconciliationResult> {
        if owner.trim().is_empty() {
            return Err(CoreError::validation("owner must not be empty"));
        }
        grant.validate()?;
        schema.validate(&desired.fields)?;

        let candidates = self.list_matching(owner, schema).await?;
        debug!(owner = %owner, candidates = candidates.len(), "Listed matching protected data");

        if let Some(dataset) = self
            .first_granted(&candidates, &grant.authorized_app, &grant.authorized_user)
            .await
        {
            info!(
                dataset = %dataset.address,
                app = %grant.authorized_app,
                "Access already granted, nothing to do"
            );
            return Ok(ReconciliationResult {
                dataset: dataset.address.clone(),
                outcome: ReconcileOutcome::AlreadySubscribed,
                grant: None,
            });
        }

        let (dataset, outcome) = match candidates.into_iter().next() {
            Some(existing) => {
                info!(dataset = %existing.address, "Reusing protected data without access");
                (existing.address, ReconcileOutcome::GrantedToExisting)
            }
            None => {
                let created = self.create(desired).await?;
                info!(dataset = %created.address, name = %created.name, "Protected new data");
                (created.address, ReconcileOutcome::CreatedAndGranted)
            }
        };

        let granted = self.protector.grant_access(&dataset, grant).await?;
        info!(
            dataset = %dataset,
            grant_id = %granted.id,
            app = %granted.authorized_app,
            user = %granted.authorized_user,
            price = %granted.price_per_access,
            access = %granted.remaining_access,
            "Access granted"
        );

        Ok(ReconciliationResult {
            dataset,
            outcome,
            grant: Some(granted),
        })
    }

    /// Revoke every grant the app/user pair holds on data matching `schema`.
    /// Failures are counted per data item and per grant; the sweep never stops early.
    pub async fn revoke_all(
        &self,
        owner: &str,
        schema: &DataSchema,
        app: &str,
        user: &str,
    ) -> Result<RevocationSummary> {
        if owner.trim().is_empty() {
            return Err(CoreError::validation("owner must not be empty"));
        }

        let candidates = self.list_matching(owner, schema).await?;
        let mut summary = RevocationSummary {
            resources_scanned: candidates.len(),
            ..Default::default()
        };

        for dataset in &candidates {
            let report = match self.protector.revoke_all_grants(&dataset.address, app, user).await {
                Ok(report) => report,
                Err(CoreError::NoGrants { .. }) => {
                    debug!(dataset = %dataset.address, "No grants to revoke");
                    continue;
                }
                Err(e) => {
                    warn!(
                        dataset = %dataset.address,
                        error = %error_chain(&e),
                        "Failed to list grants, skipping"
                    );
                    summary.lookups_failed += 1;
                    continue;
                }
            };

            summary.grants_found += report.found();
            summary.grants_revoked += report.revoked.len();
            summary.grants_failed += report.failed.len();
            for grant in &report.revoked {
                debug!(dataset = %dataset.address, grant_id = %grant.id, "Grant revoked");
            }
            for (grant, e) in &report.failed {
                warn!(
                    dataset = %dataset.address,
                    grant_id = %grant.id,
                    error = %error_chain(e),
                    "Failed to revoke grant"
                );
            }
        }

        info!(
            scanned = summary.resources_scanned,
            found = summary.grants_found,
            revoked = summary.grants_revoked,
            failed = summary.grants_failed,
            "Grants revoked"
        );

        Ok(summary)
    }

    async fn list_matching(&self, owner: &str, schema: &DataSchema) -> Result<Vec<ProtectedData>> {
        let effective = self.effective_schema(schema);
        let listed = self.protector.list_protected_data(owner, &effective).await?;
        Ok(listed
            .into_iter()
            .filter(|d| d.schema.matches_exactly(&effective))
            .collect())
    }

    /// First candidate, in listing order, holding at least one grant.
    /// A failed lookup counts as "no grant" for that candidate.
    async fn first_granted<'a>(
        &self,
        candidates: &'a [ProtectedData],
        app: &str,
        user: &str,
    ) -> Option<&'a ProtectedData> {
        for dataset in candidates {
            match self.protector.list_grants(&dataset.address, app, user).await {
                Ok(grants) if !grants.is_empty() => return Some(dataset),
                Ok(_) => {}
                Err(e) => warn!(
                    dataset = %dataset.address,
                    error = %error_chain(&e),
                    "Grant lookup failed, treating as not granted"
                ),
            }
        }
        None
    }

    async fn create(&self, desired: &DesiredData) -> Result<ProtectedData> {
        let mut data = desired.fields.clone();
        data.insert(self.marker_field.clone(), FieldValue::Bool(true));
        let request = ProtectDataRequest {
            name: desired.name.clone(),
            data,
        };
        self.protector.protect_data(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::TokenAmount;
    use crate::config::ANY_USER;
    use crate::testing::FakeProtector;
    use crate::types::AccessCount;

    const OWNER: &str = "0xowner";
    const APP: &str = "web3mail.apps.iexec.eth";

    fn config() -> ClientConfig {
        ClientConfig::new(OWNER).unwrap()
    }

    fn email_schema() -> DataSchema {
        DataSchema::new().with_field("email", SchemaType::String)
    }

    fn stored_schema() -> DataSchema {
        email_schema().with_field("shieldpost", SchemaType::Bool)
    }

    fn desired() -> DesiredData {
        DesiredData::new("mail contact").with_field("email", "a@b.com")
    }

    fn grant_spec() -> GrantSpec {
        GrantSpec {
            authorized_app: APP.into(),
            authorized_user: ANY_USER.into(),
            price_per_access: TokenAmount::ZERO,
            number_of_access: AccessCount::Limited(10),
        }
    }

    fn reconciler(protector: &Arc<FakeProtector>) -> Reconciler {
        Reconciler::new(protector.clone(), &config())
    }

    #[tokio::test]
    async fn test_empty_listing_creates_and_grants() {
        let protector = Arc::new(FakeProtector::new(OWNER));
        let result = reconciler(&protector)
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap();

        assert_eq!(result.outcome, ReconcileOutcome::CreatedAndGranted);
        assert_eq!(protector.created(), 1);
        assert_eq!(protector.granted(), 1);
        let grant = result.grant.unwrap();
        assert_eq!(grant.dataset, result.dataset);
        assert_eq!(grant.remaining_access, AccessCount::Limited(10));
    }

    #[tokio::test]
    async fn test_second_reconcile_is_already_subscribed() {
        let protector = Arc::new(FakeProtector::new(OWNER));
        let reconciler = reconciler(&protector);

        let first = reconciler
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap();
        let second = reconciler
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap();

        assert_eq!(second.outcome, ReconcileOutcome::AlreadySubscribed);
        assert_eq!(second.dataset, first.dataset);
        assert!(second.grant.is_none());
        assert_eq!(protector.created(), 1);
        assert_eq!(protector.granted(), 1);
    }

    #[tokio::test]
    async fn test_existing_without_grant_is_reused() {
        let protector = Arc::new(
            FakeProtector::new(OWNER)
                .with_data("0xfirst", stored_schema())
                .with_data("0xsecond", stored_schema()),
        );
        let result = reconciler(&protector)
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap();

        assert_eq!(result.outcome, ReconcileOutcome::GrantedToExisting);
        assert_eq!(result.dataset, "0xfirst");
        assert_eq!(protector.created(), 0);
        assert_eq!(protector.granted(), 1);
    }

    #[tokio::test]
    async fn test_first_granted_candidate_wins_and_short_circuits() {
        let protector = Arc::new(
            FakeProtector::new(OWNER)
                .with_data("0xa", stored_schema())
                .with_data("0xb", stored_schema())
                .with_data("0xc", stored_schema())
                .with_grant("0xb", APP, ANY_USER)
                .with_grant("0xc", APP, ANY_USER),
        );
        let result = reconciler(&protector)
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap();

        assert_eq!(result.outcome, ReconcileOutcome::AlreadySubscribed);
        assert_eq!(result.dataset, "0xb");
        assert_eq!(protector.lookups(), vec!["0xa", "0xb"]);
        assert_eq!(protector.granted(), 0);
    }

    #[tokio::test]
    async fn test_grant_for_other_app_does_not_count() {
        let protector = Arc::new(
            FakeProtector::new(OWNER)
                .with_data("0xa", stored_schema())
                .with_grant("0xa", "other.apps.eth", ANY_USER),
        );
        let result = reconciler(&protector)
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap();
        assert_eq!(result.outcome, ReconcileOutcome::GrantedToExisting);
    }

    #[tokio::test]
    async fn test_failed_lookup_does_not_block_scan() {
        let protector = Arc::new(
            FakeProtector::new(OWNER)
                .with_data("0xbroken", stored_schema())
                .with_data("0xgood", stored_schema())
                .with_grant("0xgood", APP, ANY_USER)
                .failing_lookup("0xbroken"),
        );
        let result = reconciler(&protector)
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap();

        assert_eq!(result.outcome, ReconcileOutcome::AlreadySubscribed);
        assert_eq!(result.dataset, "0xgood");
    }

    #[tokio::test]
    async fn test_data_without_marker_is_ignored() {
        let protector = Arc::new(FakeProtector::new(OWNER).with_data("0xforeign", email_schema()));
        let result = reconciler(&protector)
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap();

        assert_eq!(result.outcome, ReconcileOutcome::CreatedAndGranted);
        assert_ne!(result.dataset, "0xforeign");
    }

    #[tokio::test]
    async fn test_grant_failure_is_fatal() {
        let protector = Arc::new(FakeProtector::new(OWNER).failing_grant());
        let err = reconciler(&protector)
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Collaborator { .. }));
        assert_eq!(protector.created(), 1);
    }

    #[tokio::test]
    async fn test_create_failure_is_fatal() {
        let protector = Arc::new(FakeProtector::new(OWNER).failing_create());
        let err = reconciler(&protector)
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Collaborator { .. }));
        assert_eq!(protector.granted(), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_any_call() {
        let protector = Arc::new(FakeProtector::new(OWNER));
        let reconciler = reconciler(&protector);

        let err = reconciler
            .reconcile("", &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let empty = DesiredData::new("mail contact").with_field("email", "");
        let err = reconciler
            .reconcile(OWNER, &email_schema(), &empty, &grant_spec())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let zero = GrantSpec {
            number_of_access: AccessCount::Limited(0),
            ..grant_spec()
        };
        let err = reconciler
            .reconcile(OWNER, &email_schema(), &desired(), &zero)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        assert!(protector.lookups().is_empty());
        assert_eq!(protector.created(), 0);
    }

    #[tokio::test]
    async fn test_revoke_all_counts_and_isolates_failures() {
        let protector = Arc::new(
            FakeProtector::new(OWNER)
                .with_data("0xa", stored_schema())
                .with_data("0xb", stored_schema())
                .with_data("0xc", stored_schema())
                .with_grant("0xa", APP, ANY_USER)
                .with_grant("0xa", APP, ANY_USER)
                .with_grant("0xc", APP, ANY_USER)
                .failing_revoke("grant-2")
                .failing_lookup("0xb"),
        );
        let summary = reconciler(&protector)
            .revoke_all(OWNER, &email_schema(), APP, ANY_USER)
            .await
            .unwrap();

        assert_eq!(
            summary,
            RevocationSummary {
                resources_scanned: 3,
                grants_found: 3,
                grants_revoked: 2,
                grants_failed: 1,
                lookups_failed: 1,
            }
        );
        assert_eq!(protector.grant_count(), 1);
    }

    #[tokio::test]
    async fn test_revoke_all_skips_items_without_grants() {
        let protector = Arc::new(
            FakeProtector::new(OWNER)
                .with_data("0xa", stored_schema())
                .with_data("0xb", stored_schema())
                .with_grant("0xb", APP, ANY_USER),
        );
        let summary = reconciler(&protector)
            .revoke_all(OWNER, &email_schema(), APP, ANY_USER)
            .await
            .unwrap();

        assert_eq!(
            summary,
            RevocationSummary {
                resources_scanned: 2,
                grants_found: 1,
                grants_revoked: 1,
                grants_failed: 0,
                lookups_failed: 0,
            }
        );
        assert_eq!(protector.lookups(), vec!["0xa".to_string(), "0xb".to_string()]);
    }

    #[tokio::test]
    async fn test_revoke_all_with_nothing_to_revoke() {
        let protector = Arc::new(FakeProtector::new(OWNER));
        let summary = reconciler(&protector)
            .revoke_all(OWNER, &email_schema(), APP, ANY_USER)
            .await
            .unwrap();
        assert_eq!(summary, RevocationSummary::default());
    }

    #[tokio::test]
    async fn test_unsubscribe_then_subscribe_grants_existing() {
        let protector = Arc::new(FakeProtector::new(OWNER));
        let reconciler = reconciler(&protector);

        reconciler
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap();
        reconciler
            .revoke_all(OWNER, &email_schema(), APP, ANY_USER)
            .await
            .unwrap();
        let again = reconciler
            .reconcile(OWNER, &email_schema(), &desired(), &grant_spec())
            .await
            .unwrap();

        assert_eq!(again.outcome, ReconcileOutcome::GrantedToExisting);
        assert_eq!(protector.created(), 1);
    }
}

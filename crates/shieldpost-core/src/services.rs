use async_trait::async_trait;

use crate::amount::TokenAmount;
use crate::error::{CoreError, Result};
use crate::types::{
    AccessGrant, Balance, Contact, DataSchema, GrantSpec, MessageContent, ProtectDataRequest,
    ProtectedData,
};

/// Encrypts, stores and shares protected data
#[async_trait]
pub trait DataProtector: Send + Sync {
    /// List data items owned by `owner` whose schema matches `schema`.
    /// Order is not guaranteed to be stable across calls.
    async fn list_protected_data(
        &self,
        owner: &str,
        schema: &DataSchema,
    ) -> Result<Vec<ProtectedData>>;

    /// Encrypt and store a new data item
    async fn protect_data(&self, request: &ProtectDataRequest) -> Result<ProtectedData>;

    /// Grant access to a data item. Not idempotent: calling twice may
    /// create two grants.
    async fn grant_access(&self, dataset: &str, spec: &GrantSpec) -> Result<AccessGrant>;

    /// List grants for one (data item, app, user) triple
    async fn list_grants(&self, dataset: &str, app: &str, user: &str)
        -> Result<Vec<AccessGrant>>;

    /// Revoke a single grant
    async fn revoke_grant(&self, grant: &AccessGrant) -> Result<()>;

    /// Revoke every grant of a triple. Fails with [`CoreError::NoGrants`]
    /// when there is nothing to revoke; a failed revoke is reported per
    /// grant and does not stop the others.
    async fn revoke_all_grants(
        &self,
        dataset: &str,
        app: &str,
        user: &str,
    ) -> Result<GrantRevocation> {
        let grants = self.list_grants(dataset, app, user).await?;
        if grants.is_empty() {
            return Err(CoreError::NoGrants {
                dataset: dataset.to_string(),
            });
        }
        let mut report = GrantRevocation::default();
        for grant in grants {
            match self.revoke_grant(&grant).await {
                Ok(()) => report.revoked.push(grant),
                Err(e) => report.failed.push((grant, e)),
            }
        }
        Ok(report)
    }
}

/// Per-grant result of [`DataProtector::revoke_all_grants`]
#[derive(Debug, Default)]
pub struct GrantRevocation {
    pub revoked: Vec<AccessGrant>,
    pub failed: Vec<(AccessGrant, CoreError)>,
}

impl GrantRevocation {
    pub fn found(&self) -> usize {
        self.revoked.len() + self.failed.len()
    }
}

/// Submits message tasks to contacts that granted access
#[async_trait]
pub trait MessageRelay: Send + Sync {
    /// Contacts the caller is authorized to message. With `strict` only
    /// contacts granted to the caller's own address are returned, not those
    /// granted to any user.
    async fn fetch_contacts(&self, strict: bool) -> Result<Vec<Contact>>;

    /// Submit one message task and return its task identifier
    async fn send(
        &self,
        contact: &str,
        content: &MessageContent,
        max_price: TokenAmount,
    ) -> Result<String>;
}

/// Holds the stake that pays for message tasks
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn balance(&self, address: &str) -> Result<Balance>;

    async fn deposit(&self, amount: TokenAmount) -> Result<()>;

    async fn withdraw(&self, amount: TokenAmount) -> Result<()>;
}

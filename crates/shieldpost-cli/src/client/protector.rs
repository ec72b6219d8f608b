use async_trait::async_trait;
use serde::Deserialize;
use shieldpost_core::{
    AccessGrant, Collaborator, CoreError, DataProtector, DataSchema, GrantSpec,
    ProtectDataRequest, ProtectedData, Result,
};

use super::GatewayClient;

pub struct HttpDataProtector {
    client: GatewayClient,
}

impl HttpDataProtector {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct GrantsPage {
    grants: Vec<AccessGrant>,
}

#[async_trait]
impl DataProtector for HttpDataProtector {
    async fn list_protected_data(
        &self,
        owner: &str,
        schema: &DataSchema,
    ) -> Result<Vec<ProtectedData>> {
        let schema = serde_json::to_string(schema).map_err(|e| {
            CoreError::collaborator_with_source(
                Collaborator::DataProtector,
                "failed to encode schema filter",
                e,
            )
        })?;
        self.client
            .get(
                "protected-data",
                &[("owner", owner), ("requiredSchema", schema.as_str())],
            )
            .await
    }

    async fn protect_data(&self, request: &ProtectDataRequest) -> Result<ProtectedData> {
        self.client.post("protected-data", request).await
    }

    async fn grant_access(&self, dataset: &str, spec: &GrantSpec) -> Result<AccessGrant> {
        self.client
            .post(&format!("protected-data/{dataset}/grants"), spec)
            .await
    }

    async fn list_grants(
        &self,
        dataset: &str,
        app: &str,
        user: &str,
    ) -> Result<Vec<AccessGrant>> {
        let page: GrantsPage = self
            .client
            .get(
                "grants",
                &[
                    ("protectedData", dataset),
                    ("authorizedApp", app),
                    ("authorizedUser", user),
                ],
            )
            .await?;
        Ok(page.grants)
    }

    async fn revoke_grant(&self, grant: &AccessGrant) -> Result<()> {
        self.client.delete(&format!("grants/{}", grant.id)).await
    }
}

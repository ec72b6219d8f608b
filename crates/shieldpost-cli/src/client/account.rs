use async_trait::async_trait;
use serde_json::{Value, json};
use shieldpost_core::{AccountService, Balance, Result, TokenAmount};

use super::GatewayClient;

pub struct HttpAccountService {
    client: GatewayClient,
}

impl HttpAccountService {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AccountService for HttpAccountService {
    async fn balance(&self, address: &str) -> Result<Balance> {
        self.client
            .get(&format!("accounts/{address}/balance"), &[])
            .await
    }

    async fn deposit(&self, amount: TokenAmount) -> Result<()> {
        let _: Value = self
            .client
            .post("accounts/deposit", &json!({ "amount": amount }))
            .await?;
        Ok(())
    }

    async fn withdraw(&self, amount: TokenAmount) -> Result<()> {
        let _: Value = self
            .client
            .post("accounts/withdraw", &json!({ "amount": amount }))
            .await?;
        Ok(())
    }
}

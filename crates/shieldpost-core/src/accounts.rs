use std::sync::Arc;

use tracing::info;

use crate::amount::TokenAmount;
use crate::config::ClientConfig;
use crate::error::{CoreError, Result};
use crate::services::AccountService;
use crate::types::Balance;

/// Deposit and withdrawal for the configured wallet
pub struct AccountManager {
    service: Arc<dyn AccountService>,
    address: String,
}

impl AccountManager {
    pub fn new(service: Arc<dyn AccountService>, config: &ClientConfig) -> Self {
        Self {
            service,
            address: config.wallet.clone(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn balance(&self) -> Result<Balance> {
        self.service.balance(&self.address).await
    }

    pub async fn deposit(&self, amount: TokenAmount) -> Result<Balance> {
        ensure_positive(amount)?;
        self.service.deposit(amount).await?;
        info!(address = %self.address, amount = %amount, "Deposited");
        self.balance().await
    }

    /// Withdraw from the stake. The balance is checked first so an
    /// oversized request never reaches the account service.
    pub async fn withdraw(&self, amount: TokenAmount) -> Result<Balance> {
        ensure_positive(amount)?;
        let balance = self.balance().await?;
        if amount > balance.stake {
            return Err(CoreError::InsufficientBalance {
                requested: amount,
                available: balance.stake,
            });
        }
        self.service.withdraw(amount).await?;
        info!(address = %self.address, amount = %amount, "Withdrawn");
        self.balance().await
    }
}

fn ensure_positive(amount: TokenAmount) -> Result<()> {
    if amount.is_zero() {
        return Err(CoreError::validation("amount must be greater than zero"));
    }
    Ok(())
}

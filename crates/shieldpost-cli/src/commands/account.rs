use anyhow::Result;
use shieldpost_core::{AccountManager, TokenAmount};

use crate::cli::OutputFormat;
use crate::client::Gateways;
use crate::output::{print_balance, print_success};

fn manager(gateways: &Gateways) -> AccountManager {
    AccountManager::new(gateways.accounts(), &gateways.settings().client)
}

pub async fn balance(gateways: &Gateways, format: OutputFormat) -> Result<()> {
    let accounts = manager(gateways);
    let balance = accounts.balance().await?;
    print_balance(accounts.address(), &balance, format)
}

pub async fn deposit(gateways: &Gateways, amount: TokenAmount, format: OutputFormat) -> Result<()> {
    let accounts = manager(gateways);
    let balance = accounts.deposit(amount).await?;
    if format == OutputFormat::Table {
        print_success(&format!("Deposited {}", amount.to_token_string()));
    }
    print_balance(accounts.address(), &balance, format)
}

pub async fn withdraw(gateways: &Gateways, amount: TokenAmount, format: OutputFormat) -> Result<()> {
    let accounts = manager(gateways);
    let balance = accounts.withdraw(amount).await?;
    if format == OutputFormat::Table {
        print_success(&format!("Withdrew {}", amount.to_token_string()));
    }
    print_balance(accounts.address(), &balance, format)
}

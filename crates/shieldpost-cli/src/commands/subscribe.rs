use anyhow::{Context, Result};
use shieldpost_core::{GrantSpec, Reconciler, RevocationSummary, ServiceKind};

use crate::cli::{OutputFormat, SubscribeArgs, UnsubscribeArgs};
use crate::client::Gateways;
use crate::output::{print_reconciliation, print_revocation};

pub async fn subscribe(
    gateways: &Gateways,
    args: &SubscribeArgs,
    format: OutputFormat,
) -> Result<()> {
    let config = &gateways.settings().client;
    let profile = config.service(args.service)?;
    let contact = args.contact().with_context(|| match args.service {
        ServiceKind::Telegram => "Missing --chat-id for the telegram service",
        ServiceKind::Mail => "Missing --email for the mail service",
    })?;
    let desired = profile.desired_data(contact)?;

    let grant = GrantSpec {
        authorized_app: args.app.clone().unwrap_or_else(|| profile.app.clone()),
        authorized_user: args.user.clone(),
        price_per_access: args.price,
        number_of_access: args.access,
    };

    let reconciler = Reconciler::new(gateways.protector(), config);
    let result = reconciler
        .reconcile(&config.wallet, &profile.schema, &desired, &grant)
        .await?;
    print_reconciliation(&result, format)
}

pub async fn unsubscribe(
    gateways: &Gateways,
    args: &UnsubscribeArgs,
    format: OutputFormat,
) -> Result<()> {
    let config = &gateways.settings().client;
    let profile = config.service(args.service)?;
    let app = args.app.as_deref().unwrap_or(&profile.app);

    let reconciler = Reconciler::new(gateways.protector(), config);
    let summary = reconciler
        .revoke_all(&config.wallet, &profile.schema, app, &args.user)
        .await?;
    print_revocation(&summary, format)?;
    revocation_status(&summary)
}

/// Fails when there was work to do and none of it succeeded
pub fn revocation_status(summary: &RevocationSummary) -> Result<()> {
    if summary.resources_scanned > 0 && summary.lookups_failed == summary.resources_scanned {
        anyhow::bail!(
            "Could not list grants for any of the {} protected data item(s)",
            summary.resources_scanned
        );
    }
    if summary.grants_found > 0 && summary.grants_revoked == 0 {
        anyhow::bail!("No grant could be revoked");
    }
    Ok(())
}

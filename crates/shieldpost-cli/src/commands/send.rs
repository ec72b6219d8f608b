use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use shieldpost_core::{DispatchOptions, Dispatcher, MessageContent, RelaySendOperation};
use tracing::debug;

use crate::cli::{ContactsArgs, OutputFormat, SendTestArgs};
use crate::client::Gateways;
use crate::output::{print_contacts, print_dispatch_summary};

/// Dispatch options for this run: config values with command-line overrides on top
pub fn dispatch_options(base: DispatchOptions, args: &SendTestArgs) -> DispatchOptions {
    let mut options = base;
    if let Some(mode) = args.mode {
        options.mode = mode;
    }
    if let Some(ms) = args.timeout_ms {
        options.timeout = Some(Duration::from_millis(ms));
    }
    if let Some(limit) = args.max_in_flight {
        options.max_in_flight = Some(limit);
    }
    options
}

pub async fn send_test(
    gateways: &Gateways,
    args: &SendTestArgs,
    format: OutputFormat,
) -> Result<()> {
    let config = &gateways.settings().client;
    let relay = gateways.relay(args.service);

    let mut contacts = relay.fetch_contacts(args.strict).await?;
    debug!(service = %args.service, contacts = contacts.len(), "Fetched contacts");
    if let Some(limit) = args.limit {
        contacts.truncate(limit);
    }
    if contacts.is_empty() {
        anyhow::bail!("No contacts to message for {}", args.service);
    }

    let content = MessageContent {
        subject: args.subject.clone(),
        body: args.content.clone(),
        sender_name: args.sender_name.clone(),
    };
    let max_price = args.max_price.unwrap_or(config.max_price);
    let operation = Arc::new(RelaySendOperation::new(relay, content, max_price));

    let dispatcher = Dispatcher::new(dispatch_options(config.dispatch, args));
    let summary = dispatcher.dispatch(&contacts, operation).await?;
    print_dispatch_summary(&summary, format)?;

    if summary.succeeded == 0 {
        anyhow::bail!("All {} send(s) failed", summary.total);
    }
    Ok(())
}

pub async fn contacts(gateways: &Gateways, args: &ContactsArgs, format: OutputFormat) -> Result<()> {
    let contacts = gateways.relay(args.service).fetch_contacts(args.strict).await?;
    print_contacts(&contacts, format)
}

pub mod accounts;
pub mod amount;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod reconciler;
pub mod services;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use accounts::AccountManager;
pub use amount::TokenAmount;
pub use config::{ClientConfig, ServiceKind, ServiceProfile, ANY_USER, DEFAULT_MARKER_FIELD};
pub use dispatcher::{
    DispatchMode, DispatchOptions, DispatchOutcome, DispatchResult, DispatchSummary, Dispatcher,
    RelaySendOperation, SendOperation,
};
pub use error::{error_chain, Collaborator, CoreError, ErrorCategory, Result};
pub use reconciler::{ReconcileOutcome, ReconciliationResult, Reconciler, RevocationSummary};
pub use services::{AccountService, DataProtector, GrantRevocation, MessageRelay};
pub use types::*;

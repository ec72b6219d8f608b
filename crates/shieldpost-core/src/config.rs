//! Explicit client configuration handed to the reconciler, dispatcher and
//! account operations. Nothing here is read from process-wide state.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::amount::TokenAmount;
use crate::dispatcher::DispatchOptions;
use crate::error::{CoreError, Result};
use crate::types::{DataSchema, DesiredData, FieldValue, SchemaType};

/// Authorized-user value meaning "any user"
pub const ANY_USER: &str = "0x0000000000000000000000000000000000000000";

/// Boolean field added to every data item created by this tool
pub const DEFAULT_MARKER_FIELD: &str = "shieldpost";

/// Messaging service a protected contact is used by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Telegram,
    Mail,
}

impl ServiceKind {
    /// Name of the schema field holding the contact value
    pub fn contact_field(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram_chatId",
            Self::Mail => "email",
        }
    }

    pub fn default_app(&self) -> &'static str {
        match self {
            Self::Telegram => "web3telegram.apps.iexec.eth",
            Self::Mail => "web3mail.apps.iexec.eth",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telegram => write!(f, "telegram"),
            Self::Mail => write!(f, "mail"),
        }
    }
}

impl FromStr for ServiceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "mail" | "email" => Ok(Self::Mail),
            other => Err(CoreError::validation(format!(
                "unknown service \"{other}\" (expected telegram or mail)"
            ))),
        }
    }
}

/// How one messaging service expects its contact data to look
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceProfile {
    pub kind: ServiceKind,
    /// App allowed to read the protected contact
    pub app: String,
    /// Name given to newly protected data items
    pub data_name: String,
    pub schema: DataSchema,
}

impl ServiceProfile {
    pub fn new(kind: ServiceKind, app: impl Into<String>) -> Self {
        Self {
            kind,
            app: app.into(),
            data_name: format!("{kind} contact"),
            schema: DataSchema::new().with_field(kind.contact_field(), SchemaType::String),
        }
    }

    /// Desired data item holding `contact` (chat ID or e-mail address).
    pub fn desired_data(&self, contact: &str) -> Result<DesiredData> {
        let contact = contact.trim();
        if contact.is_empty() {
            return Err(CoreError::validation(match self.kind {
                ServiceKind::Telegram => "chat ID must not be empty",
                ServiceKind::Mail => "email must not be empty",
            }));
        }
        if self.kind == ServiceKind::Mail && !looks_like_email(contact) {
            return Err(CoreError::validation(format!(
                "\"{contact}\" is not a valid email address"
            )));
        }
        Ok(DesiredData::new(self.data_name.clone())
            .with_field(self.kind.contact_field(), FieldValue::from(contact)))
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Everything the core needs to talk to the collaborators on behalf of one wallet
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub wallet: String,
    pub marker_field: String,
    pub max_price: TokenAmount,
    pub dispatch: DispatchOptions,
    services: HashMap<ServiceKind, ServiceProfile>,
}

impl ClientConfig {
    pub fn new(wallet: impl Into<String>) -> Result<Self> {
        let wallet = wallet.into();
        if wallet.trim().is_empty() {
            return Err(CoreError::configuration("wallet address is not set"));
        }
        Ok(Self {
            wallet,
            marker_field: DEFAULT_MARKER_FIELD.to_string(),
            max_price: TokenAmount::ZERO,
            dispatch: DispatchOptions::default(),
            services: HashMap::new(),
        })
    }

    pub fn with_service(mut self, profile: ServiceProfile) -> Self {
        self.services.insert(profile.kind, profile);
        self
    }

    pub fn with_marker_field(mut self, field: impl Into<String>) -> Self {
        self.marker_field = field.into();
        self
    }

    pub fn with_max_price(mut self, max_price: TokenAmount) -> Self {
        self.max_price = max_price;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchOptions) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn service(&self, kind: ServiceKind) -> Result<&ServiceProfile> {
        self.services
            .get(&kind)
            .ok_or_else(|| CoreError::configuration(format!("service \"{kind}\" is not configured")))
    }
}

use clap::{Parser, Subcommand, ValueEnum};
use shieldpost_core::{ANY_USER, AccessCount, DispatchMode, ServiceKind, TokenAmount};

#[derive(Parser)]
#[command(name = "shieldpost")]
#[command(about = "Protect a contact, grant a messaging app access to it, and send test messages")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config profile name
    #[arg(short, long, global = true, env = "SHIELDPOST_PROFILE", default_value = "default")]
    pub profile: String,

    /// Wallet address owning the protected data (overrides config)
    #[arg(short, long, global = true, env = "SHIELDPOST_WALLET")]
    pub wallet: Option<String>,

    /// API key used to authenticate against the service gateways
    #[arg(long, global = true, env = "SHIELDPOST_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Gateway base URL (overrides config)
    #[arg(short, long, global = true, env = "SHIELDPOST_GATEWAY")]
    pub gateway: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum, Default, PartialEq, Eq, Debug)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Protect a contact and grant a messaging app access to it
    Subscribe(SubscribeArgs),
    /// Revoke every grant a messaging app holds on your protected contacts
    Unsubscribe(UnsubscribeArgs),
    /// Send a test message to every contact you may message
    SendTest(SendTestArgs),
    /// List contacts you may message
    Contacts(ContactsArgs),
    /// Show the stake of the configured wallet
    Balance,
    /// Deposit into the stake (e.g. 100, "250 nRLC", "1.5 RLC")
    Deposit(AmountArgs),
    /// Withdraw from the stake
    Withdraw(AmountArgs),
    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct SubscribeArgs {
    /// Messaging service (telegram, mail)
    #[arg(long, default_value = "telegram")]
    pub service: ServiceKind,
    /// Telegram chat ID to protect
    #[arg(long, conflicts_with = "email")]
    pub chat_id: Option<String>,
    /// Email address to protect
    #[arg(long)]
    pub email: Option<String>,
    /// App to authorize (defaults to the service's app)
    #[arg(long)]
    pub app: Option<String>,
    /// User allowed to send through the app (defaults to any user)
    #[arg(long, default_value = ANY_USER)]
    pub user: String,
    /// Price per access
    #[arg(long, default_value = "0")]
    pub price: TokenAmount,
    /// Number of accesses granted, or "unlimited"
    #[arg(long, default_value = "unlimited")]
    pub access: AccessCount,
}

impl SubscribeArgs {
    pub fn contact(&self) -> Option<&str> {
        match self.service {
            ServiceKind::Telegram => self.chat_id.as_deref(),
            ServiceKind::Mail => self.email.as_deref(),
        }
    }
}

#[derive(clap::Args)]
pub struct UnsubscribeArgs {
    /// Messaging service (telegram, mail)
    #[arg(long, default_value = "telegram")]
    pub service: ServiceKind,
    /// App whose grants are revoked (defaults to the service's app)
    #[arg(long)]
    pub app: Option<String>,
    /// User whose grants are revoked (defaults to any user)
    #[arg(long, default_value = ANY_USER)]
    pub user: String,
}

#[derive(clap::Args)]
pub struct SendTestArgs {
    /// Messaging service (telegram, mail)
    #[arg(long, default_value = "telegram")]
    pub service: ServiceKind,
    /// Message body
    #[arg(long, default_value = "Test message from shieldpost")]
    pub content: String,
    /// Subject line (mail only)
    #[arg(long)]
    pub subject: Option<String>,
    /// Sender name shown to recipients
    #[arg(long)]
    pub sender_name: Option<String>,
    /// Highest price accepted per message (overrides config)
    #[arg(long)]
    pub max_price: Option<TokenAmount>,
    /// Dispatch mode (sequential, concurrent)
    #[arg(long)]
    pub mode: Option<DispatchMode>,
    /// Deadline for the whole run in concurrent mode
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Cap on sends in flight in concurrent mode
    #[arg(long)]
    pub max_in_flight: Option<usize>,
    /// Only contacts granted to your wallet, not to any user
    #[arg(long)]
    pub strict: bool,
    /// Send to at most this many contacts
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(clap::Args)]
pub struct ContactsArgs {
    /// Messaging service (telegram, mail)
    #[arg(long, default_value = "telegram")]
    pub service: ServiceKind,
    /// Only contacts granted to your wallet, not to any user
    #[arg(long)]
    pub strict: bool,
}

#[derive(clap::Args)]
pub struct AmountArgs {
    /// Amount; bare numbers are nRLC
    pub amount: TokenAmount,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current config
    Show,
    /// Set config value
    Set(ConfigSetArgs),
}

#[derive(clap::Args)]
pub struct ConfigSetArgs {
    /// Key to set (see `config show`)
    pub key: String,
    /// Value
    pub value: String,
}

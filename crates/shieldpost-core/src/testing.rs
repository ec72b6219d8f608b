//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::amount::TokenAmount;
use crate::dispatcher::SendOperation;
use crate::error::{Collaborator, CoreError, Result};
use crate::services::{AccountService, DataProtector};
use crate::types::{
    AccessCount, AccessGrant, Balance, DataSchema, GrantSpec, ProtectDataRequest, ProtectedData,
    Contact,
};

#[derive(Default)]
struct ProtectorState {
    data: Vec<ProtectedData>,
    grants: Vec<AccessGrant>,
    failing_lookups: HashSet<String>,
    failing_revokes: HashSet<String>,
    fail_create: bool,
    fail_grant: bool,
    created: usize,
    granted: usize,
    lookups: Vec<String>,
    next_id: u64,
}

pub(crate) struct FakeProtector {
    owner: String,
    state: Mutex<ProtectorState>,
}

impl FakeProtector {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            state: Mutex::new(ProtectorState::default()),
        }
    }

    pub fn with_data(self, address: &str, schema: DataSchema) -> Self {
        self.state.lock().unwrap().data.push(ProtectedData {
            address: address.to_string(),
            name: format!("data {address}"),
            owner: self.owner.clone(),
            schema,
            created_at: None,
        });
        self
    }

    pub fn with_grant(self, dataset: &str, app: &str, user: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("grant-{}", state.next_id);
            state.grants.push(AccessGrant {
                id,
                dataset: dataset.to_string(),
                authorized_app: app.to_string(),
                authorized_user: user.to_string(),
                price_per_access: TokenAmount::ZERO,
                remaining_access: AccessCount::Limited(1),
            });
        }
        self
    }

    pub fn failing_lookup(self, dataset: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_lookups
            .insert(dataset.to_string());
        self
    }

    pub fn failing_revoke(self, grant_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_revokes
            .insert(grant_id.to_string());
        self
    }

    pub fn failing_create(self) -> Self {
        self.state.lock().unwrap().fail_create = true;
        self
    }

    pub fn failing_grant(self) -> Self {
        self.state.lock().unwrap().fail_grant = true;
        self
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn granted(&self) -> usize {
        self.state.lock().unwrap().granted
    }

    pub fn grant_count(&self) -> usize {
        self.state.lock().unwrap().grants.len()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.state.lock().unwrap().lookups.clone()
    }
}

#[async_trait]
impl DataProtector for FakeProtector {
    async fn list_protected_data(
        &self,
        owner: &str,
        schema: &DataSchema,
    ) -> Result<Vec<ProtectedData>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .data
            .iter()
            .filter(|d| d.owner == owner && d.schema == *schema)
            .cloned()
            .collect())
    }

    async fn protect_data(&self, request: &ProtectDataRequest) -> Result<ProtectedData> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(CoreError::collaborator(
                Collaborator::DataProtector,
                "encryption failed",
            ));
        }
        state.created += 1;
        state.next_id += 1;
        let schema = request
            .data
            .iter()
            .fold(DataSchema::new(), |schema, (name, value)| {
                schema.with_field(name.clone(), value.schema_type())
            });
        let data = ProtectedData {
            address: format!("0xdata{}", state.next_id),
            name: request.name.clone(),
            owner: self.owner.clone(),
            schema,
            created_at: None,
        };
        state.data.push(data.clone());
        Ok(data)
    }

    async fn grant_access(&self, dataset: &str, spec: &GrantSpec) -> Result<AccessGrant> {
        let mut state = self.state.lock().unwrap();
        if state.fail_grant {
            return Err(CoreError::collaborator(
                Collaborator::DataProtector,
                "grant rejected",
            ));
        }
        state.granted += 1;
        state.next_id += 1;
        let grant = AccessGrant {
            id: format!("grant-{}", state.next_id),
            dataset: dataset.to_string(),
            authorized_app: spec.authorized_app.clone(),
            authorized_user: spec.authorized_user.clone(),
            price_per_access: spec.price_per_access,
            remaining_access: spec.number_of_access,
        };
        state.grants.push(grant.clone());
        Ok(grant)
    }

    async fn list_grants(
        &self,
        dataset: &str,
        app: &str,
        user: &str,
    ) -> Result<Vec<AccessGrant>> {
        let mut state = self.state.lock().unwrap();
        state.lookups.push(dataset.to_string());
        if state.failing_lookups.contains(dataset) {
            return Err(CoreError::collaborator_with_source(
                Collaborator::DataProtector,
                "grant lookup failed",
                std::io::Error::new(std::io::ErrorKind::TimedOut, "network unreachable"),
            ));
        }
        Ok(state
            .grants
            .iter()
            .filter(|g| g.dataset == dataset && g.authorized_app == app && g.authorized_user == user)
            .cloned()
            .collect())
    }

    async fn revoke_grant(&self, grant: &AccessGrant) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_revokes.contains(&grant.id) {
            return Err(CoreError::collaborator(
                Collaborator::DataProtector,
                format!("revoke of {} reverted", grant.id),
            ));
        }
        state.grants.retain(|g| g.id != grant.id);
        Ok(())
    }
}

/// Scripted behaviour of one send
#[derive(Clone)]
pub(crate) enum Script {
    Succeed { after: Duration, task_id: String },
    Fail { after: Duration, reason: String },
    Hang,
    Panic { message: String },
}

/// Send operation answering per target address from a script
pub(crate) struct ScriptedSend {
    scripts: HashMap<String, Script>,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl ScriptedSend {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn succeed(mut self, target: &str, millis: u64, task_id: &str) -> Self {
        self.scripts.insert(
            target.to_string(),
            Script::Succeed {
                after: Duration::from_millis(millis),
                task_id: task_id.to_string(),
            },
        );
        self
    }

    pub fn fail(mut self, target: &str, millis: u64, reason: &str) -> Self {
        self.scripts.insert(
            target.to_string(),
            Script::Fail {
                after: Duration::from_millis(millis),
                reason: reason.to_string(),
            },
        );
        self
    }

    pub fn hang(mut self, target: &str) -> Self {
        self.scripts.insert(target.to_string(), Script::Hang);
        self
    }

    pub fn panic(mut self, target: &str, message: &str) -> Self {
        self.scripts.insert(
            target.to_string(),
            Script::Panic {
                message: message.to_string(),
            },
        );
        self
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SendOperation for ScriptedSend {
    async fn send(&self, target: &Contact) -> Result<String> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(&target.address)
            .cloned()
            .unwrap_or(Script::Succeed {
                after: Duration::ZERO,
                task_id: format!("task-{}", target.address),
            });
        let outcome = match script {
            Script::Succeed { after, task_id } => {
                tokio::time::sleep(after).await;
                Ok(task_id)
            }
            Script::Fail { after, reason } => {
                tokio::time::sleep(after).await;
                Err(CoreError::collaborator(Collaborator::MessageRelay, reason))
            }
            Script::Hang => std::future::pending().await,
            Script::Panic { message } => panic!("{message}"),
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

pub(crate) fn contact(address: &str) -> Contact {
    Contact {
        address: address.to_string(),
        owner: None,
        accessible_since: None,
    }
}

/// Account service with a fixed balance that records calls
pub(crate) struct FakeAccounts {
    balance: Mutex<Balance>,
    withdrawals: AtomicUsize,
    deposits: AtomicUsize,
}

impl FakeAccounts {
    pub fn with_stake(stake: u64) -> Self {
        Self {
            balance: Mutex::new(Balance {
                stake: TokenAmount::new(stake),
                locked: TokenAmount::ZERO,
            }),
            withdrawals: AtomicUsize::new(0),
            deposits: AtomicUsize::new(0),
        }
    }

    pub fn withdrawals(&self) -> usize {
        self.withdrawals.load(Ordering::SeqCst)
    }

    pub fn deposits(&self) -> usize {
        self.deposits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountService for FakeAccounts {
    async fn balance(&self, _address: &str) -> Result<Balance> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn deposit(&self, amount: TokenAmount) -> Result<()> {
        self.deposits.fetch_add(1, Ordering::SeqCst);
        let mut balance = self.balance.lock().unwrap();
        balance.stake = TokenAmount::new(balance.stake.as_nano() + amount.as_nano());
        Ok(())
    }

    async fn withdraw(&self, amount: TokenAmount) -> Result<()> {
        self.withdrawals.fetch_add(1, Ordering::SeqCst);
        let mut balance = self.balance.lock().unwrap();
        balance.stake = TokenAmount::new(balance.stake.as_nano() - amount.as_nano());
        Ok(())
    }
}

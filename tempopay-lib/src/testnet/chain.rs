//! Simulated ledger with delegated access keys.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::{
    Address, ChainGateway, Clock, Result, RootAccount, SignedKeyAuthorization, SystemClock,
    TokenTransfer, TransactionReceipt, TransactionSigner, TransferLog, TxHash, WalletError,
};

/// A delegated key registered for an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccessKeyEntry {
    expiry: i64,
    remaining: BTreeMap<Address, u128>,
    revoked: bool,
}

impl AccessKeyEntry {
    fn from_authorization(auth: &SignedKeyAuthorization) -> Self {
        Self {
            expiry: auth.expiry(),
            remaining: auth
                .authorization
                .limits
                .iter()
                .map(|l| (l.token, l.limit))
                .collect(),
            revoked: false,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Ledger {
    block_number: u64,
    /// token -> owner -> minor units
    balances: BTreeMap<Address, BTreeMap<Address, u128>>,
    /// account -> key id -> entry
    access_keys: BTreeMap<Address, BTreeMap<Address, AccessKeyEntry>>,
    /// signing key -> next nonce
    nonces: BTreeMap<Address, u64>,
    logs: Vec<TransferLog>,
    receipts: BTreeMap<TxHash, TransactionReceipt>,
}

impl Ledger {
    fn balance(&self, token: &Address, owner: &Address) -> u128 {
        self.balances
            .get(token)
            .and_then(|m| m.get(owner))
            .copied()
            .unwrap_or(0)
    }

    fn key_entry(&self, account: &Address, key_id: &Address) -> Option<&AccessKeyEntry> {
        self.access_keys.get(account).and_then(|m| m.get(key_id))
    }

    fn next_block(&mut self) -> u64 {
        self.block_number += 1;
        self.block_number
    }
}

/// Counts concurrent transfer submissions.
struct InFlight<'a> {
    current: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory chain implementing [`ChainGateway`].
///
/// Delegated-key rules:
/// - a transfer signed by an unregistered key must carry its authorization;
///   the key is registered when that transfer succeeds
/// - a transfer carrying an authorization for an already registered key is
///   rejected
/// - expired, revoked and over-limit keys are rejected
/// - a short sender balance fails with [`WalletError::InsufficientBalance`]
pub struct SimulatedChain {
    ledger: Mutex<Ledger>,
    clock: Arc<dyn Clock>,
    transfer_faults: Mutex<VecDeque<WalletError>>,
    revoke_fault: Mutex<Option<WalletError>>,
    latency: Mutex<Option<Duration>>,
    transfer_attempts: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl SimulatedChain {
    /// Create an empty chain on the system clock.
    pub fn new() -> Arc<Self> {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty chain reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self::from_ledger(Ledger::default(), clock))
    }

    fn from_ledger(ledger: Ledger, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            clock,
            transfer_faults: Mutex::new(VecDeque::new()),
            revoke_fault: Mutex::new(None),
            latency: Mutex::new(None),
            transfer_attempts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Load a chain snapshot written by [`Self::save`], or start empty if
    /// the file does not exist.
    pub fn load(path: &Path, clock: Arc<dyn Clock>) -> Result<Arc<Self>> {
        if !path.exists() {
            return Ok(Self::with_clock(clock));
        }
        let json = std::fs::read_to_string(path)?;
        let ledger: Ledger = serde_json::from_str(&json)?;
        Ok(Arc::new(Self::from_ledger(ledger, clock)))
    }

    /// Write a snapshot of the ledger.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&*self.lock())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mint tokens to `owner` (testnet faucet).
    pub fn fund(&self, token: &Address, owner: &Address, units: u128) {
        let mut ledger = self.lock();
        let balance = ledger
            .balances
            .entry(*token)
            .or_default()
            .entry(*owner)
            .or_insert(0);
        *balance = balance.saturating_add(units);
    }

    /// Overwrite the balance of `owner`.
    pub fn set_balance(&self, token: &Address, owner: &Address, units: u128) {
        self.lock()
            .balances
            .entry(*token)
            .or_default()
            .insert(*owner, units);
    }

    /// Current balance in minor units.
    pub fn balance(&self, token: &Address, owner: &Address) -> u128 {
        self.lock().balance(token, owner)
    }

    /// Whether `key_id` is registered (and not revoked) for `account`.
    pub fn is_key_active(&self, account: &Address, key_id: &Address) -> bool {
        self.lock()
            .key_entry(account, key_id)
            .is_some_and(|e| !e.revoked)
    }

    /// Whether `key_id` was revoked for `account`.
    pub fn is_key_revoked(&self, account: &Address, key_id: &Address) -> bool {
        self.lock()
            .key_entry(account, key_id)
            .is_some_and(|e| e.revoked)
    }

    /// Remaining on-chain limit of a delegated key for `token`.
    pub fn remaining_limit(&self, account: &Address, key_id: &Address, token: &Address) -> Option<u128> {
        self.lock()
            .key_entry(account, key_id)
            .and_then(|e| e.remaining.get(token).copied())
    }

    /// Fail the next transfer submission with `error`. Calls queue up.
    pub fn fail_next_transfer(&self, error: WalletError) {
        self.transfer_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(error);
    }

    /// Fail every revocation with `error` until cleared with `None`.
    pub fn fail_revocations(&self, error: Option<WalletError>) {
        *self.revoke_fault.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }

    /// Delay every transfer submission.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Number of transfer submissions seen, including failed ones.
    pub fn transfer_attempts(&self) -> usize {
        self.transfer_attempts.load(Ordering::SeqCst)
    }

    /// Highest number of transfer submissions in flight at once.
    pub fn peak_concurrent_transfers(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// All transfer logs.
    pub fn logs(&self) -> Vec<TransferLog> {
        self.lock().logs.clone()
    }

    fn execute_transfer(
        &self,
        signer: &dyn TransactionSigner,
        transfer: &TokenTransfer,
    ) -> Result<TransactionReceipt> {
        let now = self.clock.now_secs();
        let mut ledger = self.lock();

        let sender = signer.sender();
        let key_id = signer.key_id();
        let nonce = ledger.nonces.get(&key_id).copied().unwrap_or(0);
        let payload = transfer.signing_payload(&sender, &key_id, nonce)?;
        let signature = signer.sign(&payload)?;
        if signature.signer() != key_id || !signature.verify(&payload) {
            return Err(WalletError::key_rejected(key_id, "invalid transaction signature"));
        }

        // Delegated keys spend for another account and are bounded by their entry.
        let mut key_update = None;
        if key_id != sender {
            let registered = ledger.key_entry(&sender, &key_id).cloned();
            let mut entry = match (registered, &transfer.key_authorization) {
                (Some(_), Some(_)) => {
                    return Err(WalletError::key_rejected(key_id, "KeyAlreadyAuthorized"));
                }
                (None, None) => {
                    return Err(WalletError::key_rejected(key_id, "KeyNotAuthorized"));
                }
                (None, Some(auth)) => {
                    auth.verify(&sender)?;
                    if auth.key_id() != key_id {
                        return Err(WalletError::key_rejected(
                            key_id,
                            "authorization is for a different key",
                        ));
                    }
                    AccessKeyEntry::from_authorization(auth)
                }
                (Some(entry), None) => entry,
            };
            if entry.revoked {
                return Err(WalletError::key_rejected(key_id, "KeyRevoked"));
            }
            if now >= entry.expiry {
                return Err(WalletError::key_rejected(key_id, "KeyExpired"));
            }
            let remaining = entry.remaining.get(&transfer.token).copied().unwrap_or(0);
            if remaining < transfer.amount {
                return Err(WalletError::SpendLimitExceeded {
                    key_id: key_id.to_string(),
                    requested: transfer.amount,
                    remaining,
                });
            }
            entry.remaining.insert(transfer.token, remaining - transfer.amount);
            key_update = Some(entry);
        }

        let available = ledger.balance(&transfer.token, &sender);
        if available < transfer.amount {
            return Err(WalletError::InsufficientBalance {
                required: transfer.amount,
                available,
            });
        }

        // Commit.
        let balances = ledger.balances.entry(transfer.token).or_default();
        balances.insert(sender, available - transfer.amount);
        let credited = balances.entry(transfer.to).or_insert(0);
        *credited = credited.saturating_add(transfer.amount);
        if let Some(entry) = key_update {
            ledger
                .access_keys
                .entry(sender)
                .or_default()
                .insert(key_id, entry);
        }
        ledger.nonces.insert(key_id, nonce + 1);

        let block_number = ledger.next_block();
        let mut tx_bytes = payload;
        tx_bytes.extend_from_slice(&signature.bytes);
        let tx_hash = TxHash::of(&tx_bytes);
        let receipt = TransactionReceipt {
            tx_hash,
            block_number,
            success: true,
        };
        ledger.logs.push(TransferLog {
            tx_hash,
            log_index: 0,
            block_number,
            timestamp: now,
            token: transfer.token,
            from: sender,
            to: transfer.to,
            amount: transfer.amount,
            memo: transfer.memo,
        });
        ledger.receipts.insert(tx_hash, receipt.clone());
        Ok(receipt)
    }
}

#[async_trait]
impl ChainGateway for SimulatedChain {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, signer, transfer), fields(to = %transfer.to, amount = transfer.amount)))]
    async fn submit_transfer(
        &self,
        signer: &dyn TransactionSigner,
        transfer: &TokenTransfer,
    ) -> Result<TransactionReceipt> {
        self.transfer_attempts.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let fault = self
            .transfer_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(err) = fault {
            return Err(err);
        }

        self.execute_transfer(signer, transfer)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, root), fields(key_id = %key_id)))]
    async fn submit_revoke(&self, root: &dyn RootAccount, key_id: &Address) -> Result<TxHash> {
        let fault = self
            .revoke_fault
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(err) = fault {
            return Err(err);
        }

        let account = root.sender();
        if root.key_id() != account {
            return Err(WalletError::key_rejected(
                root.key_id(),
                "only the root key can revoke access keys",
            ));
        }

        let mut ledger = self.lock();
        let nonce = ledger.nonces.get(&account).copied().unwrap_or(0);
        let mut payload = b"tempopay:revoke:v1".to_vec();
        payload.extend_from_slice(account.as_bytes());
        payload.extend_from_slice(key_id.as_bytes());
        payload.extend_from_slice(&nonce.to_be_bytes());
        let signature = root.sign(&payload)?;
        if signature.signer() != account || !signature.verify(&payload) {
            return Err(WalletError::key_rejected(account, "invalid revoke signature"));
        }

        let entry = ledger
            .access_keys
            .get_mut(&account)
            .and_then(|m| m.get_mut(key_id))
            .ok_or_else(|| WalletError::key_rejected(key_id, "KeyNotFound"))?;
        if entry.revoked {
            return Err(WalletError::key_rejected(key_id, "KeyAlreadyRevoked"));
        }
        entry.revoked = true;
        ledger.nonces.insert(account, nonce + 1);

        let block_number = ledger.next_block();
        let tx_hash = TxHash::of(&payload);
        ledger.receipts.insert(
            tx_hash,
            TransactionReceipt {
                tx_hash,
                block_number,
                success: true,
            },
        );
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<TransactionReceipt> {
        self.lock()
            .receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| WalletError::not_found("transaction", tx_hash.to_string()))
    }

    async fn balance_of(&self, token: &Address, owner: &Address) -> Result<u128> {
        Ok(self.balance(token, owner))
    }

    async fn transfer_logs(
        &self,
        token: &Address,
        account: &Address,
        from_block: u64,
    ) -> Result<Vec<TransferLog>> {
        Ok(self
            .lock()
            .logs
            .iter()
            .filter(|log| &log.token == token && log.block_number >= from_block)
            .filter(|log| &log.from == account || &log.to == account)
            .cloned()
            .collect())
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.lock().block_number)
    }
}

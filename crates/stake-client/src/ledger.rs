//! The remote ledger as seen by the client
//!
//! Implementations wrap an RPC/websocket connection (or an in-process ledger
//! for tests). Reads report a missing account as `Ok(None)`; only transport or
//! program failures are errors.

use std::fmt;

use async_trait::async_trait;
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::constants::UnixTimestamp;
use crate::error::{ProgramErrorCode, StakeError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("program error {code}")]
    Program { code: u32 },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for StakeError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable(msg) => StakeError::LedgerUnavailable(msg),
            LedgerError::Program { code } => ProgramErrorCode::from_code(code)
                .map(StakeError::from)
                .unwrap_or(StakeError::Rejected { code }),
        }
    }
}

/// Raw token amount together with the mint's decimals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenBalance {
    pub amount: u64,
    pub decimals: u8,
}

impl TokenBalance {
    pub fn new(amount: u64, decimals: u8) -> Self {
        Self { amount, decimals }
    }

    /// Amount in whole tokens, as wallets display it.
    pub fn ui_amount(&self) -> f64 {
        self.amount as f64 / 10f64.powi(i32::from(self.decimals))
    }
}

/// Signature of an accepted transaction. Acceptance does not imply finality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransactionHandle(pub String);

impl TransactionHandle {
    pub fn signature(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a live account subscription until it is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Receives raw account data each time the subscribed account changes.
pub type AccountSink = mpsc::UnboundedSender<Vec<u8>>;

#[async_trait]
pub trait LedgerClient: Send + Sync + 'static {
    async fn fetch_token_balance(&self, address: &Pubkey) -> LedgerResult<Option<TokenBalance>>;

    async fn fetch_account(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>>;

    /// Ledger block time. Never substitute the local wall-clock.
    async fn fetch_clock_now(&self) -> LedgerResult<UnixTimestamp>;

    /// Send an instruction for execution. Returns once the ledger accepted it.
    async fn submit(&self, instruction: Instruction) -> LedgerResult<TransactionHandle>;

    /// Deliver account data to `sink` on every change, in ledger order, until unsubscribed.
    async fn subscribe(&self, address: &Pubkey, sink: AccountSink)
        -> LedgerResult<SubscriptionHandle>;

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> LedgerResult<()>;
}

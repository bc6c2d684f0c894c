//! Client-side coordinator for the token staking vault program.
//!
//! A player's relationship to the vault is identified by a handful of
//! program-derived addresses ([`address`]). [`session::StakeSession`] binds an
//! owner, submits `initialize_vault`/`airdrop`/`stake`/`unstake` through a
//! [`ledger::LedgerClient`], and runs a [`reconcile::ReconciliationLoop`] that
//! keeps balances, stake state and the accrued reward in step with the ledger.
//! The stake lifecycle rules live in [`machine`].

pub mod address;
pub mod config;
pub mod constants;
pub mod discriminator;
pub mod error;
pub mod instruction;
pub mod ledger;
pub mod machine;
pub mod reconcile;
pub mod session;
pub mod state;

pub use address::{OwnerIdentity, ProtocolAddresses};
pub use config::{ClientConfig, Cluster};
pub use error::{StakeError, StakeResult};
pub use instruction::StakeInstruction;
pub use ledger::{
    AccountSink, LedgerClient, LedgerError, LedgerResult, SubscriptionHandle, TokenBalance,
    TransactionHandle,
};
pub use machine::{StakePhase, StakeStateMachine, Transition};
pub use reconcile::{LocalViewState, ReconciliationLoop, Reconciler, ViewSnapshot};
pub use session::StakeSession;
pub use state::StakeState;

//! One player's session against the vault program
//!
//! Binding an owner derives the protocol addresses and starts the
//! reconciliation loop. Instructions are checked against the cached stake
//! phase before they are submitted; their effect is only ever observed
//! through the loop.

use std::sync::Arc;

use solana_message::Message;
use solana_pubkey::Pubkey;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::address::{OwnerIdentity, ProtocolAddresses};
use crate::config::ClientConfig;
use crate::error::{StakeError, StakeResult};
use crate::instruction::StakeInstruction;
use crate::ledger::{LedgerClient, TransactionHandle};
use crate::reconcile::{ReconciliationLoop, Reconciler, ViewSnapshot};

struct Binding<L> {
    owner: OwnerIdentity,
    reconciler: Arc<Reconciler<L>>,
    worker: ReconciliationLoop,
}

pub struct StakeSession<L> {
    ledger: Arc<L>,
    config: ClientConfig,
    program_id: Pubkey,
    reward_mint: Pubkey,
    binding: Option<Binding<L>>,
}

impl<L: LedgerClient> StakeSession<L> {
    pub fn new(ledger: Arc<L>, config: ClientConfig) -> StakeResult<Self> {
        config.validate()?;
        let program_id = config.program_id()?;
        let reward_mint = config.reward_mint()?;
        Ok(Self {
            ledger,
            config,
            program_id,
            reward_mint,
            binding: None,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Bind `owner`, load its position once and start reconciling.
    /// Connecting a different owner first tears down the previous binding.
    pub async fn connect(&mut self, owner: OwnerIdentity) -> StakeResult<ProtocolAddresses> {
        if let Some(binding) = &self.binding {
            if binding.owner == owner {
                return Ok(*binding.reconciler.addresses());
            }
            self.disconnect().await;
        }

        let addresses = ProtocolAddresses::derive(&self.program_id, &owner, &self.reward_mint);
        let reconciler = Arc::new(Reconciler::new(self.ledger.clone(), addresses));
        let worker = ReconciliationLoop::start(reconciler.clone(), self.config.tick_interval()).await;

        info!(
            %owner,
            player_stake_account = %addresses.player_stake_account,
            vault_token_account = %addresses.vault_token_account,
            "owner connected"
        );
        self.binding = Some(Binding {
            owner,
            reconciler,
            worker,
        });
        Ok(addresses)
    }

    /// Parse and bind a base58 owner key.
    pub async fn connect_str(&mut self, owner: &str) -> StakeResult<ProtocolAddresses> {
        let owner = OwnerIdentity::parse(owner)?;
        self.connect(owner).await
    }

    /// Stop the loop and release the account subscription. No-op when nothing is bound.
    pub async fn disconnect(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.worker.shutdown().await;
            info!(owner = %binding.owner, "owner disconnected");
        }
    }

    pub fn owner(&self) -> Option<&OwnerIdentity> {
        self.binding.as_ref().map(|binding| &binding.owner)
    }

    pub fn addresses(&self) -> Option<&ProtocolAddresses> {
        self.binding
            .as_ref()
            .map(|binding| binding.reconciler.addresses())
    }

    pub fn snapshot(&self) -> Option<ViewSnapshot> {
        self.binding
            .as_ref()
            .map(|binding| binding.reconciler.snapshot())
    }

    pub fn watch(&self) -> Option<watch::Receiver<ViewSnapshot>> {
        self.binding.as_ref().map(|binding| binding.reconciler.watch())
    }

    /// Force a full refresh outside the timer. Does nothing until an owner is connected.
    pub async fn refresh(&self) -> StakeResult<()> {
        match &self.binding {
            Some(binding) => binding.reconciler.refresh().await,
            None => {
                debug!("refresh skipped, no owner connected");
                Ok(())
            }
        }
    }

    /// Unsigned message for `instruction` with the owner as fee payer, for an external signer.
    pub fn message_for(&self, instruction: StakeInstruction) -> StakeResult<Message> {
        let binding = self.binding.as_ref().ok_or(StakeError::NotConnected)?;
        let ix = instruction.build(&binding.owner, binding.reconciler.addresses());
        Ok(Message::new(&[ix], Some(binding.owner.pubkey())))
    }

    pub async fn initialize_vault(&self) -> StakeResult<TransactionHandle> {
        self.execute(StakeInstruction::InitializeVault).await
    }

    pub async fn airdrop(&self) -> StakeResult<TransactionHandle> {
        self.execute(StakeInstruction::Airdrop).await
    }

    pub async fn stake(&self) -> StakeResult<TransactionHandle> {
        self.execute(StakeInstruction::Stake).await
    }

    pub async fn unstake(&self) -> StakeResult<TransactionHandle> {
        self.execute(StakeInstruction::Unstake).await
    }

    async fn execute(&self, instruction: StakeInstruction) -> StakeResult<TransactionHandle> {
        let binding = self.binding.as_ref().ok_or(StakeError::NotConnected)?;
        binding.reconciler.ensure_allowed(instruction).await?;

        let ix = instruction.build(&binding.owner, binding.reconciler.addresses());
        match self.ledger.submit(ix).await {
            Ok(handle) => {
                info!(
                    %instruction,
                    signature = %handle,
                    explorer = %self.config.cluster.explorer_url(handle.signature()),
                    "transaction accepted"
                );
                Ok(handle)
            }
            Err(err) => {
                let err = StakeError::from(err);
                warn!(%instruction, error = %err, "transaction rejected");
                Err(err)
            }
        }
    }
}

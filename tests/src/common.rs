//! In-memory ledger with just enough of the vault program's bookkeeping to
//! drive the client end to end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use solana_instruction::Instruction;
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use stake_client::constants::{
    UnixTimestamp, ERROR_IS_STAKED, ERROR_NOT_STAKED, PROGRAM_ID, REWARD_MINT,
};
use stake_client::machine::stake_amount;
use stake_client::{
    AccountSink, LedgerClient, LedgerError, LedgerResult, OwnerIdentity, ProtocolAddresses,
    StakeInstruction, StakeState, SubscriptionHandle, TokenBalance, TransactionHandle,
};

/// SPL token error for a transfer larger than the source balance.
pub const INSUFFICIENT_FUNDS: u32 = 1;

pub const DECIMALS: u8 = 2;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("stake_client=debug")
        .with_test_writer()
        .try_init();
}

pub fn new_owner() -> OwnerIdentity {
    OwnerIdentity::new(Keypair::new().pubkey())
}

pub fn addresses_for(owner: &OwnerIdentity) -> ProtocolAddresses {
    ProtocolAddresses::derive(&PROGRAM_ID, owner, &REWARD_MINT)
}

/// Owner holding one token next to a vault funded with 100 tokens.
pub fn funded_fixture() -> (OwnerIdentity, ProtocolAddresses, Arc<MockLedger>) {
    let owner = new_owner();
    let addresses = addresses_for(&owner);
    let ledger = MockLedger::with_vault(&addresses, 100);
    ledger.set_balance(addresses.player_token_account, 10u64.pow(DECIMALS as u32));
    (owner, addresses, ledger)
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Pubkey, Vec<u8>>,
    balances: HashMap<Pubkey, TokenBalance>,
    clock: UnixTimestamp,
    subscribers: HashMap<u64, (Pubkey, AccountSink)>,
    next_subscription: u64,
    next_signature: u64,
    submitted: Vec<StakeInstruction>,
    account_reads: usize,
}

impl LedgerState {
    fn balance(&self, address: &Pubkey) -> u64 {
        self.balances.get(address).map(|b| b.amount).unwrap_or(0)
    }

    fn transfer(&mut self, from: Pubkey, to: Pubkey, amount: u64) -> LedgerResult<()> {
        let available = self.balance(&from);
        if available < amount {
            return Err(LedgerError::Program {
                code: INSUFFICIENT_FUNDS,
            });
        }
        self.balances
            .insert(from, TokenBalance::new(available - amount, DECIMALS));
        let target = self.balance(&to);
        self.balances
            .insert(to, TokenBalance::new(target + amount, DECIMALS));
        Ok(())
    }

    fn stake_state(&self, address: &Pubkey) -> StakeState {
        self.accounts
            .get(address)
            .map(|data| StakeState::decode(data).unwrap())
            .unwrap_or_default()
    }

    fn write_stake_state(&mut self, address: Pubkey, state: StakeState) {
        let data = state.encode().unwrap();
        self.accounts.insert(address, data.clone());
        self.notify(&address, data);
    }

    fn notify(&self, address: &Pubkey, data: Vec<u8>) {
        for (watched, sink) in self.subscribers.values() {
            if watched == address {
                let _ = sink.send(data.clone());
            }
        }
    }
}

#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    fail_reads: AtomicBool,
    fail_subscribe: AtomicBool,
    stall_reads: AtomicBool,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Ledger with an initialized vault holding `vault_tokens` whole tokens.
    pub fn with_vault(addresses: &ProtocolAddresses, vault_tokens: u64) -> Arc<Self> {
        let ledger = Self::new();
        ledger.set_balance(
            addresses.vault_token_account,
            vault_tokens * 10u64.pow(DECIMALS as u32),
        );
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap()
    }

    pub fn set_clock(&self, now: UnixTimestamp) {
        self.lock().clock = now;
    }

    pub fn advance_clock(&self, secs: i64) {
        self.lock().clock += secs;
    }

    pub fn set_balance(&self, address: Pubkey, amount: u64) {
        self.lock()
            .balances
            .insert(address, TokenBalance::new(amount, DECIMALS));
    }

    pub fn balance(&self, address: &Pubkey) -> u64 {
        self.lock().balance(address)
    }

    /// Overwrite the stake account as an out-of-band writer would, notifying subscribers.
    pub fn write_stake_state(&self, address: Pubkey, state: StakeState) {
        self.lock().write_stake_state(address, state);
    }

    /// Overwrite the stake account silently.
    pub fn set_stake_state(&self, address: Pubkey, state: StakeState) {
        self.lock().accounts.insert(address, state.encode().unwrap());
    }

    /// Deliver arbitrary bytes to the subscribers of `address`.
    pub fn push_raw(&self, address: &Pubkey, data: Vec<u8>) {
        self.lock().notify(address, data);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read hang forever, like a dead connection without a timeout.
    pub fn set_stall_reads(&self, stall: bool) {
        self.stall_reads.store(stall, Ordering::SeqCst);
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn active_subscriptions(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn submitted(&self) -> Vec<StakeInstruction> {
        self.lock().submitted.clone()
    }

    pub fn account_reads(&self) -> usize {
        self.lock().account_reads
    }

    async fn check_reads(&self) -> LedgerResult<()> {
        if self.stall_reads.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(LedgerError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn execute(
        state: &mut LedgerState,
        kind: StakeInstruction,
        ix: &Instruction,
    ) -> LedgerResult<()> {
        let account = |index: usize| ix.accounts[index].pubkey;
        let unit = stake_amount(DECIMALS).unwrap();
        match kind {
            StakeInstruction::InitializeVault => {
                let vault = account(1);
                let current = state.balance(&vault);
                state.balances.insert(vault, TokenBalance::new(current, DECIMALS));
            }
            StakeInstruction::Airdrop => {
                state.transfer(account(2), account(1), unit)?;
            }
            StakeInstruction::Stake => {
                let stake_account = account(1);
                if state.stake_state(&stake_account).is_staked {
                    return Err(LedgerError::Program {
                        code: ERROR_IS_STAKED,
                    });
                }
                state.transfer(account(3), account(2), unit)?;
                let now = state.clock;
                state.write_stake_state(
                    stake_account,
                    StakeState {
                        is_staked: true,
                        timestamp: now,
                    },
                );
            }
            StakeInstruction::Unstake => {
                let stake_account = account(1);
                let current = state.stake_state(&stake_account);
                if !current.is_staked {
                    return Err(LedgerError::Program {
                        code: ERROR_NOT_STAKED,
                    });
                }
                let now = state.clock;
                let reward = (now - current.timestamp) as u64 * 10u64.pow(DECIMALS as u32);
                state.transfer(account(4), account(3), reward)?;
                let escrow = state.balance(&account(2));
                state.transfer(account(2), account(3), escrow)?;
                state.write_stake_state(
                    stake_account,
                    StakeState {
                        is_staked: false,
                        timestamp: now,
                    },
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn fetch_token_balance(&self, address: &Pubkey) -> LedgerResult<Option<TokenBalance>> {
        self.check_reads().await?;
        Ok(self.lock().balances.get(address).copied())
    }

    async fn fetch_account(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>> {
        self.check_reads().await?;
        let mut state = self.lock();
        state.account_reads += 1;
        Ok(state.accounts.get(address).cloned())
    }

    async fn fetch_clock_now(&self) -> LedgerResult<UnixTimestamp> {
        self.check_reads().await?;
        Ok(self.lock().clock)
    }

    async fn submit(&self, instruction: Instruction) -> LedgerResult<TransactionHandle> {
        let kind = StakeInstruction::from_data(&instruction.data).ok_or(LedgerError::Program {
            code: 101, // InstructionFallbackNotFound
        })?;
        let mut state = self.lock();
        Self::execute(&mut state, kind, &instruction)?;
        state.submitted.push(kind);
        state.next_signature += 1;
        Ok(TransactionHandle(format!("mock-signature-{}", state.next_signature)))
    }

    async fn subscribe(
        &self,
        address: &Pubkey,
        sink: AccountSink,
    ) -> LedgerResult<SubscriptionHandle> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("websocket closed".into()));
        }
        let mut state = self.lock();
        state.next_subscription += 1;
        let id = state.next_subscription;
        state.subscribers.insert(id, (*address, sink));
        Ok(SubscriptionHandle(id))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> LedgerResult<()> {
        self.lock().subscribers.remove(&handle.0);
        Ok(())
    }
}

//! Keeps the local view of one player's vault position in step with the ledger
//!
//! Two triggers drive a cycle: a local timer and change notifications for the
//! player stake account. Both go through [`Reconciler`], which holds the view
//! behind an async mutex for the whole cycle, so a timer refresh and a pushed
//! update never interleave. A cycle whose reads fail leaves the cached view as
//! it was and only raises the `stale` flag; the next tick is the retry.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::address::ProtocolAddresses;
use crate::constants::UnixTimestamp;
use crate::error::StakeResult;
use crate::instruction::StakeInstruction;
use crate::ledger::{AccountSink, LedgerClient, LedgerResult, SubscriptionHandle, TokenBalance};
use crate::machine::{projected_payout, StakeStateMachine, Transition};
use crate::state::StakeState;

/// Read-only copy of the view handed to the presentation layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub vault_balance: f64,
    pub player_balance: f64,
    pub is_staked: bool,
    pub staked_since: Option<UnixTimestamp>,
    pub accrued_reward: u64,
    /// Raw token units an unstake would pay out right now
    pub projected_payout: Option<u64>,
    /// At least one refresh completed
    pub loaded: bool,
    /// The last cycle failed and the values above may be behind the ledger
    pub stale: bool,
    pub anomalies: u64,
}

/// Process-local cache of one player's position. Only [`Reconciler`] mutates it.
#[derive(Debug, Default)]
pub struct LocalViewState {
    vault_balance: Option<TokenBalance>,
    player_balance: Option<TokenBalance>,
    machine: StakeStateMachine,
    accrued_reward: u64,
    stale: bool,
}

impl LocalViewState {
    pub fn stake_state(&self) -> Option<&StakeState> {
        self.machine.stake_state()
    }

    fn apply_stake_state(&mut self, state: Option<StakeState>) -> Transition {
        let transition = self.machine.observe(state);
        match transition {
            Transition::Staked { since } => {
                info!(since, "stake observed on ledger");
                self.accrued_reward = 0;
            }
            Transition::Unstaked => info!("unstake observed on ledger"),
            _ => {}
        }
        if !self.machine.is_staked() {
            self.accrued_reward = 0;
        }
        transition
    }

    fn apply_balances(&mut self, vault: Option<TokenBalance>, player: Option<TokenBalance>) {
        // a token account that does not exist yet holds nothing
        self.vault_balance = Some(vault.unwrap_or_default());
        self.player_balance = Some(player.unwrap_or_default());
    }

    fn snapshot(&self) -> ViewSnapshot {
        let phase = self.machine.phase();
        // both accounts hold the reward mint; a missing one reports zero decimals
        let decimals = [self.vault_balance, self.player_balance]
            .into_iter()
            .flatten()
            .map(|balance| balance.decimals)
            .max()
            .unwrap_or(0);
        let is_staked = self.machine.is_staked();

        ViewSnapshot {
            vault_balance: self.vault_balance.map(|b| b.ui_amount()).unwrap_or(0.0),
            player_balance: self.player_balance.map(|b| b.ui_amount()).unwrap_or(0.0),
            is_staked,
            staked_since: self
                .stake_state()
                .filter(|state| state.is_staked)
                .map(|state| state.timestamp),
            accrued_reward: self.accrued_reward,
            projected_payout: is_staked
                .then(|| projected_payout(self.accrued_reward, decimals))
                .flatten(),
            loaded: phase.is_some(),
            stale: self.stale,
            anomalies: self.machine.anomalies(),
        }
    }
}

type FullRead = (Option<TokenBalance>, Option<TokenBalance>, Option<StakeState>);

fn collect_full(
    vault: LedgerResult<Option<TokenBalance>>,
    player: LedgerResult<Option<TokenBalance>>,
    stake: LedgerResult<Option<Vec<u8>>>,
) -> StakeResult<FullRead> {
    let vault = vault?;
    let player = player?;
    let stake = decode_optional(stake?)?;
    Ok((vault, player, stake))
}

fn collect_accrual(
    clock: LedgerResult<UnixTimestamp>,
    stake: LedgerResult<Option<Vec<u8>>>,
) -> StakeResult<(UnixTimestamp, Option<StakeState>)> {
    let clock = clock?;
    let stake = decode_optional(stake?)?;
    Ok((clock, stake))
}

fn decode_optional(data: Option<Vec<u8>>) -> StakeResult<Option<StakeState>> {
    data.map(|data| StakeState::decode(&data)).transpose()
}

/// Runs reconciliation cycles for one set of protocol addresses.
pub struct Reconciler<L> {
    ledger: Arc<L>,
    addresses: ProtocolAddresses,
    view: Mutex<LocalViewState>,
    published: watch::Sender<ViewSnapshot>,
}

impl<L: LedgerClient> Reconciler<L> {
    pub fn new(ledger: Arc<L>, addresses: ProtocolAddresses) -> Self {
        let (published, _) = watch::channel(ViewSnapshot::default());
        Self {
            ledger,
            addresses,
            view: Mutex::new(LocalViewState::default()),
            published,
        }
    }

    pub fn addresses(&self) -> &ProtocolAddresses {
        &self.addresses
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.published.borrow().clone()
    }

    /// Receiver that sees a new snapshot after every cycle.
    pub fn watch(&self) -> watch::Receiver<ViewSnapshot> {
        self.published.subscribe()
    }

    /// Reject `instruction` if the cached stake phase makes it illegal. Never mutates the view.
    pub async fn ensure_allowed(&self, instruction: StakeInstruction) -> StakeResult<()> {
        self.view.lock().await.machine.ensure_allowed(instruction)
    }

    /// Re-read balances and stake state.
    pub async fn refresh(&self) -> StakeResult<()> {
        let mut view = self.view.lock().await;
        self.refresh_locked(&mut view).await
    }

    /// Timer cycle: recompute the reward while staked, otherwise refresh everything.
    pub async fn tick(&self) -> StakeResult<()> {
        let mut view = self.view.lock().await;
        if view.machine.is_staked() {
            self.accrue_locked(&mut view).await
        } else {
            self.refresh_locked(&mut view).await
        }
    }

    /// Merge a pushed stake account payload, then refresh balances.
    /// A payload that fails to decode is dropped and the cache kept as is.
    pub async fn apply_push(&self, data: &[u8]) -> StakeResult<()> {
        let state = match StakeState::decode(data) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    address = %self.addresses.player_stake_account,
                    error = %err,
                    "dropping undecodable stake account update"
                );
                return Err(err);
            }
        };

        let mut view = self.view.lock().await;
        view.apply_stake_state(Some(state));
        // visible even if the balance reads below never complete
        self.publish(&view);

        let (vault, player) = tokio::join!(
            self.ledger
                .fetch_token_balance(&self.addresses.vault_token_account),
            self.ledger
                .fetch_token_balance(&self.addresses.player_token_account),
        );
        let result = match (vault, player) {
            (Ok(vault), Ok(player)) => {
                view.apply_balances(vault, player);
                view.stale = false;
                Ok(())
            }
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "balance refresh after stake account update failed");
                view.stale = true;
                Err(err.into())
            }
        };
        self.publish(&view);
        result
    }

    async fn refresh_locked(&self, view: &mut LocalViewState) -> StakeResult<()> {
        let addresses = &self.addresses;
        let (vault, player, stake) = tokio::join!(
            self.ledger.fetch_token_balance(&addresses.vault_token_account),
            self.ledger.fetch_token_balance(&addresses.player_token_account),
            self.ledger.fetch_account(&addresses.player_stake_account),
        );

        let result = match collect_full(vault, player, stake) {
            Ok((vault, player, stake)) => {
                view.apply_balances(vault, player);
                view.apply_stake_state(stake);
                view.stale = false;
                debug!(
                    owner_stake_account = %addresses.player_stake_account,
                    staked = view.machine.is_staked(),
                    "full refresh complete"
                );
                Ok(())
            }
            Err(err) => {
                view.stale = true;
                Err(err)
            }
        };
        self.publish(view);
        result
    }

    async fn accrue_locked(&self, view: &mut LocalViewState) -> StakeResult<()> {
        let (clock, stake) = tokio::join!(
            self.ledger.fetch_clock_now(),
            self.ledger.fetch_account(&self.addresses.player_stake_account),
        );

        let result = match collect_accrual(clock, stake) {
            Ok((now, stake)) => {
                view.apply_stake_state(stake);
                view.accrued_reward = view.machine.accrued_reward(now);
                view.stale = false;
                Ok(())
            }
            Err(err) => {
                view.stale = true;
                Err(err)
            }
        };
        self.publish(view);
        result
    }

    fn publish(&self, view: &LocalViewState) {
        self.published.send_replace(view.snapshot());
    }
}

async fn subscribe_stake_account<L: LedgerClient>(
    reconciler: &Reconciler<L>,
    sink: &AccountSink,
) -> Option<SubscriptionHandle> {
    let address = reconciler.addresses().player_stake_account;
    match reconciler.ledger().subscribe(&address, sink.clone()).await {
        Ok(handle) => {
            debug!(%address, subscription = handle.0, "subscribed to stake account");
            Some(handle)
        }
        Err(err) => {
            warn!(%address, error = %err, "stake account subscription failed, polling only");
            None
        }
    }
}

/// Shortest accepted tick cadence. Tokio intervals reject a zero period.
pub const MIN_CADENCE: Duration = Duration::from_millis(1);

/// Resolves once shutdown was requested or the owning [`ReconciliationLoop`] was dropped.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop || shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Background worker driving a [`Reconciler`] from a timer and account notifications.
///
/// The stake account subscription lives exactly as long as the worker. It is
/// released on [`ReconciliationLoop::shutdown`] and also when the loop is
/// dropped without one.
pub struct ReconciliationLoop {
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReconciliationLoop {
    /// Subscribe, run the initial full refresh, then tick every `cadence`.
    pub async fn start<L: LedgerClient>(reconciler: Arc<Reconciler<L>>, cadence: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (sink, mut updates) = mpsc::unbounded_channel();

        let mut subscription = subscribe_stake_account(&reconciler, &sink).await;
        if let Err(err) = reconciler.refresh().await {
            warn!(error = %err, "initial refresh failed, keeping empty view");
        }

        let cadence = cadence.max(MIN_CADENCE);
        info!(
            stake_account = %reconciler.addresses().player_stake_account,
            ?cadence,
            subscribed = subscription.is_some(),
            "reconciliation loop started"
        );

        let worker = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + cadence, cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let cycle = async {
                            if subscription.is_none() {
                                subscription = subscribe_stake_account(&reconciler, &sink).await;
                            }
                            reconciler.tick().await
                        };
                        // a hung ledger read must not hold up shutdown
                        tokio::select! {
                            result = cycle => {
                                if let Err(err) = result {
                                    warn!(error = %err, "reconciliation tick failed, keeping cached view");
                                }
                            }
                            _ = stop_requested(&mut shutdown_rx) => break,
                        }
                    }
                    Some(data) = updates.recv() => {
                        tokio::select! {
                            result = reconciler.apply_push(&data) => {
                                if let Err(err) = result {
                                    debug!(error = %err, "stake account update not fully applied");
                                }
                            }
                            _ = stop_requested(&mut shutdown_rx) => break,
                        }
                    }
                    _ = stop_requested(&mut shutdown_rx) => break,
                }
            }

            if let Some(handle) = subscription.take() {
                match reconciler.ledger().unsubscribe(handle).await {
                    Ok(()) => debug!(subscription = handle.0, "stake account subscription released"),
                    Err(err) => warn!(
                        subscription = handle.0,
                        error = %err,
                        "failed to release stake account subscription"
                    ),
                }
            }
            info!("reconciliation loop stopped");
        });

        Self {
            shutdown: shutdown_tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stop ticking, release the subscription and wait for the worker to exit.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(err) = handle.await {
                debug!(?err, "reconciliation worker exited with error");
            }
        }
    }
}

//! Interpretation of the observed stake account
//!
//! The ledger is the only writer of the stake account. The machine tracks the
//! last observed phase, decides which instructions are currently legal and
//! turns the ledger clock into an accrued reward.

use tracing::warn;

use crate::constants::{UnixTimestamp, STAKE_AMOUNT};
use crate::error::{StakeError, StakeResult};
use crate::instruction::StakeInstruction;
use crate::state::StakeState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StakePhase {
    Unstaked,
    Staked { since: UnixTimestamp },
}

impl StakePhase {
    /// A missing account is the implicit initial state.
    pub fn from_account(state: Option<&StakeState>) -> Self {
        match state {
            Some(state) if state.is_staked => StakePhase::Staked {
                since: state.timestamp,
            },
            _ => StakePhase::Unstaked,
        }
    }

    pub fn is_staked(&self) -> bool {
        matches!(self, StakePhase::Staked { .. })
    }
}

/// How a freshly observed phase relates to the cached one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// First observation for this session.
    Initial(StakePhase),
    Unchanged,
    Staked { since: UnixTimestamp },
    Unstaked,
    /// Not one of the two legal edges. Accepted anyway, the ledger is ground truth.
    Unexpected { from: StakePhase, to: StakePhase },
}

#[derive(Clone, Debug, Default)]
pub struct StakeStateMachine {
    observed: Option<StakeState>,
    phase: Option<StakePhase>,
    anomalies: u64,
}

impl StakeStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed phase, `None` until the first fetch or push.
    pub fn phase(&self) -> Option<StakePhase> {
        self.phase
    }

    pub fn stake_state(&self) -> Option<&StakeState> {
        self.observed.as_ref()
    }

    pub fn is_staked(&self) -> bool {
        self.phase.map(|phase| phase.is_staked()).unwrap_or(false)
    }

    /// Number of unexpected transitions and clock regressions seen so far.
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    /// Check `instruction` against the cached phase before it is sent.
    pub fn ensure_allowed(&self, instruction: StakeInstruction) -> StakeResult<()> {
        match (instruction, self.is_staked()) {
            (StakeInstruction::Stake, true) => Err(StakeError::AlreadyStaked),
            (StakeInstruction::Unstake, false) => Err(StakeError::NotStaked),
            _ => Ok(()),
        }
    }

    /// Merge a ledger observation. `None` means the account does not exist yet.
    pub fn observe(&mut self, state: Option<StakeState>) -> Transition {
        let next = StakePhase::from_account(state.as_ref());
        let previous = self.phase.replace(next);
        self.observed = state;

        let transition = match (previous, next) {
            (None, phase) => Transition::Initial(phase),
            (Some(from), to) if from == to => Transition::Unchanged,
            (Some(StakePhase::Unstaked), StakePhase::Staked { since }) => {
                Transition::Staked { since }
            }
            (Some(StakePhase::Staked { .. }), StakePhase::Unstaked) => Transition::Unstaked,
            (Some(from), to) => Transition::Unexpected { from, to },
        };

        if let Transition::Unexpected { from, to } = transition {
            self.anomalies += 1;
            warn!(?from, ?to, "stake account changed outside the expected transitions");
        }
        transition
    }

    /// Ledger clock ticks elapsed since staking, or 0 when not staked.
    pub fn accrued_reward(&mut self, clock_now: UnixTimestamp) -> u64 {
        match self.phase {
            Some(StakePhase::Staked { since }) => match clock_now.checked_sub(since) {
                Some(elapsed) if elapsed >= 0 => elapsed as u64,
                _ => {
                    self.anomalies += 1;
                    warn!(
                        since,
                        clock_now, "ledger clock behind stake timestamp, reporting zero reward"
                    );
                    0
                }
            },
            _ => 0,
        }
    }
}

/// Raw token units the program moves on a stake or airdrop.
pub fn stake_amount(decimals: u8) -> Option<u64> {
    STAKE_AMOUNT.checked_mul(10u64.checked_pow(u32::from(decimals))?)
}

/// Raw token units the program pays out for `reward` clock ticks on unstake.
pub fn projected_payout(reward: u64, decimals: u8) -> Option<u64> {
    reward.checked_mul(10u64.checked_pow(u32::from(decimals))?)
}

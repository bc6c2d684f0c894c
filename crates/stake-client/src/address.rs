//! Deterministic derivation of the accounts tying a player to the vault

use std::fmt;
use std::str::FromStr;

use solana_pubkey::Pubkey;

use crate::constants::{
    ASSOCIATED_TOKEN_PROGRAM_ID, STAKE_STATE_SEED, TOKEN_PROGRAM_ID, TOKEN_SEED, VAULT_SEED,
};
use crate::error::{StakeError, StakeResult};

/// Public key of the connected player. Immutable once bound to a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerIdentity(Pubkey);

impl OwnerIdentity {
    pub fn new(key: Pubkey) -> Self {
        Self(key)
    }

    /// Parse a base58 encoded public key.
    pub fn parse(raw: &str) -> StakeResult<Self> {
        Pubkey::from_str(raw.trim())
            .map(Self)
            .map_err(|err| StakeError::InvalidIdentity(format!("{raw:?}: {err}")))
    }

    pub fn pubkey(&self) -> &Pubkey {
        &self.0
    }
}

impl FromStr for OwnerIdentity {
    type Err = StakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Every address the client needs to talk to the vault program on behalf of one owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolAddresses {
    /// Program that owns the PDAs below
    pub program_id: Pubkey,
    /// Token staked and paid out as reward
    pub reward_mint: Pubkey,
    /// Program-owned reward funding account, seeds = ["vault"]
    pub vault_token_account: Pubkey,
    /// Owner's associated token account for the reward mint
    pub player_token_account: Pubkey,
    /// Stake metadata PDA, seeds = ["stake", owner]
    pub player_stake_account: Pubkey,
    /// Escrow holding staked tokens, seeds = ["token", owner]
    pub player_stake_token_account: Pubkey,
}

impl ProtocolAddresses {
    /// Derive every address for `owner`. Pure: the same inputs always give the same result.
    pub fn derive(program_id: &Pubkey, owner: &OwnerIdentity, mint: &Pubkey) -> Self {
        let owner = owner.pubkey();
        Self {
            program_id: *program_id,
            reward_mint: *mint,
            vault_token_account: vault_pda(program_id),
            player_token_account: associated_token_address(owner, mint),
            player_stake_account: stake_state_pda(program_id, owner),
            player_stake_token_account: stake_token_pda(program_id, owner),
        }
    }
}

pub fn vault_pda(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[VAULT_SEED], program_id).0
}

pub fn stake_state_pda(program_id: &Pubkey, owner: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[STAKE_STATE_SEED, owner.as_ref()], program_id).0
}

pub fn stake_token_pda(program_id: &Pubkey, owner: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[TOKEN_SEED, owner.as_ref()], program_id).0
}

/// Compute an Associated Token Account (ATA) address for a given owner and mint
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

//! Program identifiers, PDA seeds and fixed amounts shared with the vault program

use solana_pubkey::{pubkey, Pubkey};

/// Deployed staking vault program
pub const PROGRAM_ID: Pubkey = pubkey!("Ez8TA8T2rEyGjuEy6D6iY7Z7g51mPm4Zz5CRLndfbSjL");

/// Mint used both for staking and for rewards
pub const REWARD_MINT: Pubkey = pubkey!("Gw1dRVus1Logbm3zNuJ8c5ae9AjWLK2So73kNUpqcucg");

/// SPL Token program
pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Associated Token Account program
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Seed for the player's stake state PDA
pub const STAKE_STATE_SEED: &[u8] = b"stake";
/// Seed for the vault token account PDA
pub const VAULT_SEED: &[u8] = b"vault";
/// Seed for the player's stake token account PDA
pub const TOKEN_SEED: &[u8] = b"token";

/// Whole tokens moved by a single stake or airdrop
pub const STAKE_AMOUNT: u64 = 1;

/// Custom program error: tokens already staked
pub const ERROR_IS_STAKED: u32 = 6000;
/// Custom program error: tokens not staked yet
pub const ERROR_NOT_STAKED: u32 = 6001;

/// Ledger clock value in seconds
pub type UnixTimestamp = i64;

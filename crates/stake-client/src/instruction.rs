//! Instruction builders for the vault program
//!
//! None of the program's instructions take scalar arguments, so the data is
//! just the 8 byte discriminator and the interesting part is the account list.

use std::fmt;

use solana_instruction::{AccountMeta, Instruction};
use solana_sdk_ids::system_program;

use crate::address::{OwnerIdentity, ProtocolAddresses};
use crate::constants::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::discriminator::instruction_discriminator;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StakeInstruction {
    InitializeVault,
    Airdrop,
    Stake,
    Unstake,
}

impl StakeInstruction {
    pub const ALL: [StakeInstruction; 4] = [
        StakeInstruction::InitializeVault,
        StakeInstruction::Airdrop,
        StakeInstruction::Stake,
        StakeInstruction::Unstake,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StakeInstruction::InitializeVault => "initialize_vault",
            StakeInstruction::Airdrop => "airdrop",
            StakeInstruction::Stake => "stake",
            StakeInstruction::Unstake => "unstake",
        }
    }

    pub fn discriminator(self) -> [u8; 8] {
        instruction_discriminator(self.name())
    }

    /// Recover the instruction kind from raw instruction data.
    pub fn from_data(data: &[u8]) -> Option<Self> {
        let prefix = data.get(..8)?;
        Self::ALL
            .into_iter()
            .find(|ix| ix.discriminator().as_slice() == prefix)
    }

    /// Build the instruction with the fixed account list the program expects.
    pub fn build(self, owner: &OwnerIdentity, addresses: &ProtocolAddresses) -> Instruction {
        let player = *owner.pubkey();
        let accounts = match self {
            StakeInstruction::InitializeVault => vec![
                AccountMeta::new(player, true),
                AccountMeta::new(addresses.vault_token_account, false),
                AccountMeta::new_readonly(addresses.reward_mint, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(system_program::ID, false),
            ],
            StakeInstruction::Airdrop => vec![
                AccountMeta::new(player, true),
                AccountMeta::new(addresses.player_token_account, false),
                AccountMeta::new(addresses.vault_token_account, false),
                AccountMeta::new_readonly(addresses.reward_mint, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(system_program::ID, false),
            ],
            StakeInstruction::Stake => vec![
                AccountMeta::new(player, true),
                AccountMeta::new(addresses.player_stake_account, false),
                AccountMeta::new(addresses.player_stake_token_account, false),
                AccountMeta::new(addresses.player_token_account, false),
                AccountMeta::new_readonly(addresses.reward_mint, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(system_program::ID, false),
            ],
            StakeInstruction::Unstake => vec![
                AccountMeta::new(player, true),
                AccountMeta::new(addresses.player_stake_account, false),
                AccountMeta::new(addresses.player_stake_token_account, false),
                AccountMeta::new(addresses.player_token_account, false),
                AccountMeta::new(addresses.vault_token_account, false),
                AccountMeta::new_readonly(addresses.reward_mint, false),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
            ],
        };

        Instruction {
            program_id: addresses.program_id,
            accounts,
            data: self.discriminator().to_vec(),
        }
    }
}

impl fmt::Display for StakeInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

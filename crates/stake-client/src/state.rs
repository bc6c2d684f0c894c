//! Decoding of the player stake account

use std::io;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::constants::UnixTimestamp;
use crate::discriminator::account_discriminator;
use crate::error::{StakeError, StakeResult};

/// Stake metadata recorded by the program for one player.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StakeState {
    /// Whether tokens are currently held in the stake escrow
    pub is_staked: bool,
    /// Ledger clock when the last stake or unstake executed
    pub timestamp: UnixTimestamp,
}

impl StakeState {
    pub const ACCOUNT_NAME: &'static str = "StakeState";

    /// Allocated account size: discriminator plus the in-memory size of the program struct.
    pub const SPACE: usize = 8 + 16;

    pub fn discriminator() -> [u8; 8] {
        account_discriminator(Self::ACCOUNT_NAME)
    }

    /// Decode raw account data. Bytes after the two documented fields are ignored.
    pub fn decode(data: &[u8]) -> StakeResult<Self> {
        if data.len() < 8 {
            return Err(StakeError::DecodeFailure(format!(
                "account data too short: {} bytes",
                data.len()
            )));
        }
        let (disc, mut body) = data.split_at(8);
        if disc != Self::discriminator() {
            return Err(StakeError::DecodeFailure(
                "account discriminator mismatch".into(),
            ));
        }
        Self::deserialize(&mut body).map_err(|err| StakeError::DecodeFailure(err.to_string()))
    }

    /// Account data as the program would store it, zero padded to [`Self::SPACE`].
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(Self::SPACE);
        data.extend_from_slice(&Self::discriminator());
        borsh::to_writer(&mut data, self)?;
        data.resize(Self::SPACE, 0);
        Ok(data)
    }
}

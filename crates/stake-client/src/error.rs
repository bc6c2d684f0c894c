//! Error definitions

use thiserror::Error;

use crate::constants::{ERROR_IS_STAKED, ERROR_NOT_STAKED};

#[derive(Debug, Error)]
pub enum StakeError {
    #[error("invalid owner identity: {0}")]
    InvalidIdentity(String),
    #[error("{}", ProgramErrorCode::IsStaked.message())]
    AlreadyStaked,
    #[error("{}", ProgramErrorCode::NotStaked.message())]
    NotStaked,
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),
    #[error("failed to decode account data: {0}")]
    DecodeFailure(String),
    #[error("transaction rejected by program with code {code}")]
    Rejected { code: u32 },
    #[error("no owner connected")]
    NotConnected,
    #[error("configuration error: {0}")]
    Config(String),
}

pub type StakeResult<T> = Result<T, StakeError>;

/// Custom errors raised by the vault program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramErrorCode {
    IsStaked,
    NotStaked,
}

impl ProgramErrorCode {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            ERROR_IS_STAKED => Some(Self::IsStaked),
            ERROR_NOT_STAKED => Some(Self::NotStaked),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::IsStaked => ERROR_IS_STAKED,
            Self::NotStaked => ERROR_NOT_STAKED,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::IsStaked => "Tokens Already Staked",
            Self::NotStaked => "Tokens Not Staked Yet",
        }
    }
}

impl From<ProgramErrorCode> for StakeError {
    fn from(code: ProgramErrorCode) -> Self {
        match code {
            ProgramErrorCode::IsStaked => StakeError::AlreadyStaked,
            ProgramErrorCode::NotStaked => StakeError::NotStaked,
        }
    }
}

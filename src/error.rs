use crate::collaborators::{OracleError, TokenError};
use crate::domain::{AmountError, Address, PositionId, SwapInterval};
use thiserror::Error;

/// Every fault a hub operation can abort with. A failed operation leaves no
/// trace in the ledgers or in token balances.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("Zero address")]
    ZeroAddress,
    #[error("Interval {0} is not allowed")]
    InvalidInterval(SwapInterval),
    #[error("Zero amount")]
    ZeroAmount,
    #[error("Zero swaps")]
    ZeroSwaps,
    #[error("Invalid token: {0}")]
    InvalidToken(Address),
    #[error("Invalid position: {0}")]
    InvalidPosition(PositionId),
    #[error("Position {position} does not swap into token {token}")]
    PositionDoesNotMatchToken { position: PositionId, token: Address },
    #[error("Caller {caller} is not allowed to do that on position {position}")]
    UnauthorizedCaller { caller: Address, position: PositionId },
    #[error("Caller {0} is not the fee recipient")]
    NotFeeRecipient(Address),
    #[error("No swaps to execute")]
    NoSwapsToExecute,
    #[error("Insufficient liquidity of {token}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        token: Address,
        requested: u128,
        available: u128,
    },
    #[error("Liquidity not returned for {token}: expected {expected}, got {actual}")]
    LiquidityNotReturned {
        token: Address,
        expected: u128,
        actual: u128,
    },
    #[error("Insufficient platform balance of {token}: requested {requested}, available {available}")]
    InsufficientPlatformBalance {
        token: Address,
        requested: u128,
        available: u128,
    },
    #[error("Reentrant call")]
    ReentrantCall,
    #[error("No swap or loan callback is waiting for payment")]
    NoPaymentExpected,
    #[error("Arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),
    #[error("Fee {0} is too high")]
    HighFee(u32),
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

pub type HubResult<T> = Result<T, HubError>;

pub mod collaborators;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod hub;

pub use collaborators::{
    Clock, FixedRateOracle, InMemoryPermissionRegistry, InMemoryTokenLedger, ManualClock,
    OracleError, PermissionRegistry, PriceOracle, SystemClock, TokenError, TokenLedger,
};
pub use config::{ConfigError, HubConfig};
pub use domain::{
    Address, Direction, Permission, PermissionSet, PositionId, SwapInterval, Timestamp, TokenPair,
};
pub use engine::{DueSwap, PairSide, Settlement, SwapData, UserPosition};
pub use error::{HubError, HubResult};
pub use hub::{
    Counterparty, DcaHub, DepositParams, LoanCall, LoanCallee, NextSwapInfo, PositionSet,
    SwapCall, SwapCallee,
};

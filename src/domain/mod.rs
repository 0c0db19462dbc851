//! Domain types shared by the ledgers and the hub.
//!
//! This module provides:
//! - Primitives: Address, TokenPair, Direction, SwapInterval, PositionId, Timestamp
//! - Position capabilities: Permission, PermissionSet
//! - Fixed-point amount helpers backed by rust_decimal

pub mod amount;
pub mod primitives;

pub use amount::{format_units, to_units, AmountError, Magnitude};
pub use primitives::{
    Address, Direction, Permission, PermissionSet, PositionId, SwapInterval, Timestamp, TokenPair,
};

//! Pure accounting engine: the swap schedule, the ratio accumulators, position
//! arithmetic, settlement netting and fees. Nothing here moves tokens.

pub mod digest;
pub mod fees;
pub mod math;
pub mod positions;
pub mod ratios;
pub mod schedule;
pub mod settlement;

pub use digest::StateDigest;
pub use fees::{
    apply_fee, apply_fee_to_rate, calculate_fee, calculate_fee_rounded_up, FEE_PRECISION, MAX_FEE,
};
pub use math::mul_div;
pub use positions::{Position, PositionBook, UserPosition};
pub use ratios::RatioAccumulatorLedger;
pub use schedule::{Advanced, DueSwap, PerDirection, SwapData, SwapScheduleLedger};
pub use settlement::{compute_settlement, PairSide, Settlement};

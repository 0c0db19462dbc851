//! Domain primitives: Address, TokenPair, Direction, SwapInterval, PositionId, Timestamp.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account or token address (hex string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Address(pub String);

impl Address {
    /// Create an Address from a string.
    pub fn new(addr: impl Into<String>) -> Self {
        Address(addr.into())
    }

    /// The null address.
    pub fn zero() -> Self {
        Address("0x0000000000000000000000000000000000000000".to_string())
    }

    /// True for `0x` followed by one or more zeros.
    pub fn is_zero(&self) -> bool {
        match self.0.strip_prefix("0x") {
            Some(digits) => !digits.is_empty() && digits.chars().all(|c| c == '0'),
            None => false,
        }
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = String;

    /// Rejects empty input and a bare `0x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "0x" {
            return Err(format!("invalid address: {:?}", s));
        }
        Ok(Address(s.to_string()))
    }
}

impl TryFrom<String> for Address {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Unordered token pair, stored with `token_a < token_b`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenPair {
    token_a: Address,
    token_b: Address,
}

impl TokenPair {
    /// Canonicalize two tokens into a pair. Returns `None` if both are the same token.
    pub fn new(x: Address, y: Address) -> Option<Self> {
        match x.cmp(&y) {
            std::cmp::Ordering::Less => Some(TokenPair {
                token_a: x,
                token_b: y,
            }),
            std::cmp::Ordering::Greater => Some(TokenPair {
                token_a: y,
                token_b: x,
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn token_a(&self) -> &Address {
        &self.token_a
    }

    pub fn token_b(&self) -> &Address {
        &self.token_b
    }

    pub fn contains(&self, token: &Address) -> bool {
        &self.token_a == token || &self.token_b == token
    }

    /// Direction of a swap that sells `from`. `from` must belong to the pair.
    pub fn direction_from(&self, from: &Address) -> Direction {
        if from == &self.token_a {
            Direction::AToB
        } else {
            Direction::BToA
        }
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.token_a, self.token_b)
    }
}

/// Which way volume flows inside a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Selling token A for token B.
    AToB,
    /// Selling token B for token A.
    BToA,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::AToB, Direction::BToA];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AToB => write!(f, "a_to_b"),
            Direction::BToA => write!(f, "b_to_a"),
        }
    }
}

/// Recurring settlement period, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SwapInterval(pub u32);

impl SwapInterval {
    pub const FIVE_MINUTES: SwapInterval = SwapInterval(5 * 60);
    pub const FIFTEEN_MINUTES: SwapInterval = SwapInterval(15 * 60);
    pub const ONE_HOUR: SwapInterval = SwapInterval(60 * 60);
    pub const FOUR_HOURS: SwapInterval = SwapInterval(4 * 60 * 60);
    pub const ONE_DAY: SwapInterval = SwapInterval(24 * 60 * 60);
    pub const ONE_WEEK: SwapInterval = SwapInterval(7 * 24 * 60 * 60);

    pub fn as_secs(&self) -> u32 {
        self.0
    }

    /// First boundary of this interval strictly after `now`.
    pub fn next_boundary_after(&self, now: Timestamp) -> Option<Timestamp> {
        let secs = u64::from(self.0);
        if secs == 0 {
            return None;
        }
        (now.0 / secs)
            .checked_add(1)
            .and_then(|n| n.checked_mul(secs))
            .map(Timestamp)
    }
}

impl fmt::Display for SwapInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0;
        if secs != 0 && secs % 604_800 == 0 {
            write!(f, "{}w", secs / 604_800)
        } else if secs != 0 && secs % 86_400 == 0 {
            write!(f, "{}d", secs / 86_400)
        } else if secs != 0 && secs % 3_600 == 0 {
            write!(f, "{}h", secs / 3_600)
        } else if secs != 0 && secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{}s", secs)
        }
    }
}

impl FromStr for SwapInterval {
    type Err = String;

    /// Parses `900`, `900s`, `15m`, `1h`, `1d` or `1w`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
            Some((idx, _)) => s.split_at(idx),
            None => (s, ""),
        };
        let value: u32 = digits
            .parse()
            .map_err(|_| format!("invalid interval: {:?}", s))?;
        let multiplier = match unit {
            "" | "s" => 1,
            "m" => 60,
            "h" => 3_600,
            "d" => 86_400,
            "w" => 604_800,
            other => return Err(format!("unknown interval unit: {:?}", other)),
        };
        match value.checked_mul(multiplier) {
            Some(0) | None => Err(format!("invalid interval: {:?}", s)),
            Some(secs) => Ok(SwapInterval(secs)),
        }
    }
}

/// Sequential position identifier, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix time in seconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

/// Capability an account may hold on a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Increase,
    Reduce,
    Withdraw,
    Terminate,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::Increase,
        Permission::Reduce,
        Permission::Withdraw,
        Permission::Terminate,
    ];
}

/// Capabilities granted to an operator when a position is minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub operator: Address,
    pub permissions: Vec<Permission>,
}

impl PermissionSet {
    pub fn new(operator: Address, permissions: Vec<Permission>) -> Self {
        Self {
            operator,
            permissions,
        }
    }
}

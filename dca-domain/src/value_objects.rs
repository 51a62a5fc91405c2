//! Value Objects for the DCA Vault Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Basis-point denominator (100% = 10 000 bps)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Address must be 20 bytes of hex
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Cadence length is not one of the supported cadences
    #[error("Invalid interval: {0} seconds")]
    InvalidInterval(u64),

    /// Price must be positive
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Basis points above 100%
    #[error("Invalid basis points: {0}")]
    InvalidBps(u32),
}

// =============================================================================
// Address
// =============================================================================

/// 20-byte account or token identifier
///
/// Serialized as a `0x`-prefixed lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Sentinel standing for the chain's native asset (0xEeee...EEeE)
    pub const NATIVE: Address = Address([0xee; 20]);

    /// Wrap raw bytes
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build an address whose low 8 bytes hold `value` (big endian)
    ///
    /// # Examples
    /// ```
    /// # use dca_domain::value_objects::Address;
    /// let addr = Address::from_low_u64(0x2a);
    /// assert_eq!(addr.to_string(), "0x000000000000000000000000000000000000002a");
    /// ```
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Parse a hex address, with or without `0x` prefix
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAddress` if the input is not 20 bytes of hex
    pub fn from_hex(value: &str) -> Result<Self, DomainError> {
        let trimmed = value.strip_prefix("0x").unwrap_or(value);
        let decoded =
            hex::decode(trimmed).map_err(|_| DomainError::InvalidAddress(value.to_string()))?;
        let bytes: [u8; 20] = decoded
            .try_into()
            .map_err(|_| DomainError::InvalidAddress(value.to_string()))?;
        Ok(Self(bytes))
    }

    /// Whether this is the zero address
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Whether this is the native-asset sentinel
    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Address {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

// =============================================================================
// Basis points
// =============================================================================

/// A ratio in basis points, bounded by 100%
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Bps(u32);

impl Bps {
    /// Zero basis points
    pub const ZERO: Bps = Bps(0);

    /// Create a new ratio
    ///
    /// # Errors
    /// Returns `DomainError::InvalidBps` above 10 000
    pub fn new(value: u32) -> Result<Self, DomainError> {
        if value > BPS_DENOMINATOR {
            return Err(DomainError::InvalidBps(value));
        }
        Ok(Self(value))
    }

    /// Raw basis points
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Basis points remaining to 100% (`10000 - self`)
    pub fn complement(&self) -> Bps {
        Bps(BPS_DENOMINATOR - self.0)
    }
}

impl fmt::Display for Bps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

// =============================================================================
// Cadence
// =============================================================================

/// Supported swap cadences, declared in ascending order of length.
///
/// The declaration order is the batch execution order when several cadences
/// of the same pair are due together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Every hour
    OneHour,
    /// Every four hours
    FourHour,
    /// Every twelve hours
    TwelveHour,
    /// Every day
    OneDay,
    /// Every three days
    ThreeDay,
    /// Every week
    OneWeek,
    /// Every two weeks
    TwoWeek,
    /// Every thirty days
    OneMonth,
}

impl Cadence {
    /// All cadences, ascending
    pub const ALL: [Cadence; 8] = [
        Cadence::OneHour,
        Cadence::FourHour,
        Cadence::TwelveHour,
        Cadence::OneDay,
        Cadence::ThreeDay,
        Cadence::OneWeek,
        Cadence::TwoWeek,
        Cadence::OneMonth,
    ];

    /// Length in seconds
    pub const fn seconds(&self) -> u64 {
        const HOUR: u64 = 60 * 60;
        const DAY: u64 = 24 * HOUR;
        match self {
            Cadence::OneHour => HOUR,
            Cadence::FourHour => 4 * HOUR,
            Cadence::TwelveHour => 12 * HOUR,
            Cadence::OneDay => DAY,
            Cadence::ThreeDay => 3 * DAY,
            Cadence::OneWeek => 7 * DAY,
            Cadence::TwoWeek => 14 * DAY,
            Cadence::OneMonth => 30 * DAY,
        }
    }

    /// Length as a chrono duration
    pub fn duration(&self) -> Duration {
        // Largest cadence is 2 592 000 seconds, well inside i64.
        Duration::seconds(self.seconds() as i64)
    }

    /// Single-bit tag used by the compact `CadenceSet` encoding
    pub const fn bit(&self) -> u8 {
        1 << (*self as u8)
    }

    /// Resolve a cadence from its length in seconds
    ///
    /// # Errors
    /// Returns `DomainError::InvalidInterval` for any other length
    pub fn from_seconds(seconds: u64) -> Result<Self, DomainError> {
        Self::ALL
            .into_iter()
            .find(|cadence| cadence.seconds() == seconds)
            .ok_or(DomainError::InvalidInterval(seconds))
    }
}

impl TryFrom<u64> for Cadence {
    type Error = DomainError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::from_seconds(value)
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Cadence::OneHour => "1h",
            Cadence::FourHour => "4h",
            Cadence::TwelveHour => "12h",
            Cadence::OneDay => "1d",
            Cadence::ThreeDay => "3d",
            Cadence::OneWeek => "1w",
            Cadence::TwoWeek => "2w",
            Cadence::OneMonth => "30d",
        };
        f.write_str(label)
    }
}

// =============================================================================
// CadenceSet
// =============================================================================

/// A set of cadences, iterated in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CadenceSet(u8);

impl CadenceSet {
    /// The empty set
    pub const EMPTY: CadenceSet = CadenceSet(0);

    /// Rebuild a set from its bit encoding
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Bit encoding (bit `n` set for the `n`-th cadence of `Cadence::ALL`)
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Whether the set contains `cadence`
    pub fn contains(&self, cadence: Cadence) -> bool {
        self.0 & cadence.bit() != 0
    }

    /// Add `cadence`
    pub fn insert(&mut self, cadence: Cadence) {
        self.0 |= cadence.bit();
    }

    /// Remove `cadence`
    pub fn remove(&mut self, cadence: Cadence) {
        self.0 &= !cadence.bit();
    }

    /// Copy of this set with `cadence` present or absent
    pub fn with(mut self, cadence: Cadence, present: bool) -> Self {
        if present {
            self.insert(cadence);
        } else {
            self.remove(cadence);
        }
        self
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of cadences in the set
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Cadences in ascending order
    pub fn iter(&self) -> impl Iterator<Item = Cadence> + '_ {
        Cadence::ALL.into_iter().filter(move |cadence| self.contains(*cadence))
    }
}

impl FromIterator<Cadence> for CadenceSet {
    fn from_iter<I: IntoIterator<Item = Cadence>>(iter: I) -> Self {
        let mut set = CadenceSet::EMPTY;
        for cadence in iter {
            set.insert(cadence);
        }
        set
    }
}

impl fmt::Display for CadenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08b}", self.0)
    }
}

// =============================================================================
// Price
// =============================================================================

/// Oracle price of one whole token in the feed's quote unit
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidPrice("Price must be positive".to_string()));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Approval proof
// =============================================================================

/// Signed spending approval supplied instead of a standing allowance.
///
/// The vault never inspects the signature; it forwards the proof to the
/// approval verifier together with owner, spender, token and amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalProof {
    /// Owner nonce the signature commits to
    pub nonce: u64,
    /// Last instant the proof may be used
    pub deadline: chrono::DateTime<chrono::Utc>,
    /// Opaque signature bytes
    pub signature: Vec<u8>,
}

// =============================================================================
// Tests
// =============================================================================

//! Fixed-point helpers.
//!
//! Amounts are raw token base units; every division floors. Products are
//! taken in 256 bits so `ratio × rate` cannot overflow before the divide.

use ethnum::U256;

use crate::error::{EngineError, EngineResult};
use dca_domain::{Bps, BPS_DENOMINATOR};

/// `floor(a × b / denominator)` with a 256-bit intermediate
pub fn mul_div(a: u128, b: u128, denominator: u128) -> EngineResult<u128> {
    if denominator == 0 {
        return Err(EngineError::MathOverflow);
    }
    let quotient = U256::from(a) * U256::from(b) / U256::from(denominator);
    if quotient > U256::from(u128::MAX) {
        return Err(EngineError::MathOverflow);
    }
    Ok(quotient.as_u128())
}

/// `floor(Π numerators / Π denominators)`, both products taken in 256 bits
pub fn mul_div_many(numerators: &[u128], denominators: &[u128]) -> EngineResult<u128> {
    let product = |factors: &[u128]| {
        factors.iter().try_fold(U256::ONE, |acc, factor| acc.checked_mul(U256::from(*factor)))
    };
    let numerator = product(numerators).ok_or(EngineError::MathOverflow)?;
    let denominator = product(denominators).ok_or(EngineError::MathOverflow)?;
    if denominator == U256::ZERO {
        return Err(EngineError::MathOverflow);
    }
    let quotient = numerator / denominator;
    if quotient > U256::from(u128::MAX) {
        return Err(EngineError::MathOverflow);
    }
    Ok(quotient.as_u128())
}

/// Greatest common divisor, `gcd(0, 0) = 0`
pub fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// `floor(amount × bps / 10000)`
pub fn apply_bps(amount: u128, bps: Bps) -> EngineResult<u128> {
    mul_div(amount, u128::from(bps.value()), u128::from(BPS_DENOMINATOR))
}

/// `10^decimals`
pub fn magnitude(decimals: u8) -> EngineResult<u128> {
    10u128.checked_pow(u32::from(decimals)).ok_or(EngineError::MathOverflow)
}

pub(crate) fn add(a: u128, b: u128) -> EngineResult<u128> {
    a.checked_add(b).ok_or(EngineError::MathOverflow)
}

pub(crate) fn sub(a: u128, b: u128) -> EngineResult<u128> {
    a.checked_sub(b).ok_or(EngineError::MathOverflow)
}

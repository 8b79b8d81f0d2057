use std::fmt;

use alloy_primitives::{U256, U512};
use num_bigint::BigUint;
use rust_decimal::Decimal;
use uniswap_v3_math::tick_math::{get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio, MAX_TICK, MIN_TICK};

use crate::execution::decimal_to_units;

/// The trigger contract and Chainlink feeds both scale USD prices by 10^8.
pub const ORACLE_PRICE_DECIMALS: u8 = 8;

/// Tick and oracle-format price derived from one predicted price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConversion {
    pub tick: i32,
    pub price_fixed_point: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculationError {
    NonPositivePrice(Decimal),
    Overflow,
    SqrtPriceOutOfRange,
}

impl fmt::Display for CalculationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositivePrice(price) => write!(f, "price must be positive, got {price}"),
            Self::Overflow => write!(f, "intermediate value overflowed"),
            Self::SqrtPriceOutOfRange => write!(f, "sqrt price outside the valid tick range"),
        }
    }
}

impl std::error::Error for CalculationError {}

/// Converts a readable price into `(tick, floor(price * 10^8))`.
///
/// The tick is `floor(log_1.0001(price * 10^(d0 - d1)))`. A candidate comes
/// from the Q64.96 sqrt price; when that lands next to a tick boundary it is
/// settled by comparing the price with `1.0001^tick` as exact rationals.
pub fn convert(
    price: Decimal,
    token0_decimals: u8,
    token1_decimals: u8,
) -> Result<TickConversion, CalculationError> {
    let sqrt_price_x96 = price_to_sqrt_price_x96(price, token0_decimals, token1_decimals)?;
    let candidate = get_tick_at_sqrt_ratio(sqrt_price_x96)
        .map_err(|_| CalculationError::SqrtPriceOutOfRange)?;
    let tick = if near_tick_boundary(sqrt_price_x96, candidate)? {
        let ratio = PriceRatio::new(price, token0_decimals, token1_decimals);
        exact_floor_tick(&ratio, candidate)?
    } else {
        candidate
    };
    let price_fixed_point =
        decimal_to_units(price, ORACLE_PRICE_DECIMALS).map_err(|_| CalculationError::Overflow)?;

    Ok(TickConversion {
        tick,
        price_fixed_point,
    })
}

/// `floor(sqrt(price * 10^(d0 - d1)) * 2^96)`.
pub fn price_to_sqrt_price_x96(
    price: Decimal,
    token0_decimals: u8,
    token1_decimals: u8,
) -> Result<U256, CalculationError> {
    if price <= Decimal::ZERO {
        return Err(CalculationError::NonPositivePrice(price));
    }

    // price = mantissa / 10^scale, so price * 2^192 * 10^(d0 - d1) is an
    // exact ratio of two integers.
    let decimal_shift = i32::from(token0_decimals) - i32::from(token1_decimals);
    let mut numerator = U512::from(price.mantissa().unsigned_abs())
        .checked_mul(U512::from(1u8) << 192)
        .ok_or(CalculationError::Overflow)?;
    let mut denominator = pow10(price.scale())?;
    if decimal_shift >= 0 {
        numerator = numerator
            .checked_mul(pow10(decimal_shift.unsigned_abs())?)
            .ok_or(CalculationError::Overflow)?;
    } else {
        denominator = denominator
            .checked_mul(pow10(decimal_shift.unsigned_abs())?)
            .ok_or(CalculationError::Overflow)?;
    }

    let sqrt = (numerator / denominator).root(2);
    let limbs = sqrt.into_limbs();
    if limbs[4..].iter().any(|limb| *limb != 0) {
        return Err(CalculationError::SqrtPriceOutOfRange);
    }
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// `get_sqrt_ratio_at_tick` rounds up and carries a small relative error, so
/// a floored sqrt price within this window of either bound is re-checked.
fn near_tick_boundary(sqrt_price_x96: U256, tick: i32) -> Result<bool, CalculationError> {
    let window = |bound: U256| (bound >> 48) + U256::from(4u8);
    let lower = get_sqrt_ratio_at_tick(tick).map_err(|_| CalculationError::SqrtPriceOutOfRange)?;
    if sqrt_price_x96 <= lower.saturating_add(window(lower)) {
        return Ok(true);
    }
    if tick >= MAX_TICK {
        return Ok(false);
    }
    let upper =
        get_sqrt_ratio_at_tick(tick + 1).map_err(|_| CalculationError::SqrtPriceOutOfRange)?;
    Ok(sqrt_price_x96.saturating_add(window(upper)) >= upper)
}

/// `price * 10^(d0 - d1)` as an exact fraction.
struct PriceRatio {
    numerator: BigUint,
    denominator: BigUint,
}

impl PriceRatio {
    fn new(price: Decimal, token0_decimals: u8, token1_decimals: u8) -> Self {
        let shift = i32::from(token0_decimals) - i32::from(token1_decimals);
        let mut numerator = BigUint::from(price.mantissa().unsigned_abs());
        let mut denominator = BigUint::from(10u8).pow(price.scale());
        if shift >= 0 {
            numerator *= BigUint::from(10u8).pow(shift.unsigned_abs());
        } else {
            denominator *= BigUint::from(10u8).pow(shift.unsigned_abs());
        }
        Self {
            numerator,
            denominator,
        }
    }

    /// `price >= 1.0001^tick`.
    fn at_or_above_tick(&self, tick: i32) -> bool {
        let steps = tick.unsigned_abs();
        let up = BigUint::from(10_001u16).pow(steps);
        let down = BigUint::from(10_000u16).pow(steps);
        if tick >= 0 {
            &self.numerator * down >= &self.denominator * up
        } else {
            &self.numerator * up >= &self.denominator * down
        }
    }
}

/// Moves `candidate` to the largest tick with `1.0001^tick <= price`.
fn exact_floor_tick(ratio: &PriceRatio, candidate: i32) -> Result<i32, CalculationError> {
    let mut tick = candidate;
    while !ratio.at_or_above_tick(tick) {
        tick -= 1;
        if tick < MIN_TICK {
            return Err(CalculationError::SqrtPriceOutOfRange);
        }
    }
    while tick < MAX_TICK && ratio.at_or_above_tick(tick + 1) {
        tick += 1;
    }
    Ok(tick)
}

fn pow10(exp: u32) -> Result<U512, CalculationError> {
    U512::from(10u8)
        .checked_pow(U512::from(exp))
        .ok_or(CalculationError::Overflow)
}

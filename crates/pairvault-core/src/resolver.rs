//! # Price & Proportion Resolver
//!
//! Brings two assets with arbitrary decimals and 18-decimal prices onto one
//! comparable scale. Everything here is pure.
//!
//! A zero price yields a zero value. Callers must read that as "unpriceable",
//! never as "free".

use crate::constants::{HEALTH_FACTOR_NO_DEBT, NORMALIZED_DECIMALS, WAD};
use crate::errors::CoreResult;
use crate::math::fixed_point::{mul_div, pow10, wad_div, wad_mul, Rounding};
use crate::types::asset::Side;

/// Convert a native amount to 18 decimals (rounds down when scaling down)
pub fn normalize(amount: u128, decimals: u8) -> CoreResult<u128> {
    if decimals == NORMALIZED_DECIMALS {
        return Ok(amount);
    }
    mul_div(amount, WAD, pow10(decimals)?, Rounding::Down)
}

/// Convert an 18-decimal amount back to native decimals
pub fn denormalize(amount18: u128, decimals: u8, rounding: Rounding) -> CoreResult<u128> {
    if decimals == NORMALIZED_DECIMALS {
        return Ok(amount18);
    }
    mul_div(amount18, pow10(decimals)?, WAD, rounding)
}

/// USD value (18 decimals) of a normalized amount
pub fn value_of(amount18: u128, price18: u128) -> CoreResult<u128> {
    if price18 == 0 {
        return Ok(0);
    }
    wad_mul(amount18, price18, Rounding::Down)
}

/// Normalized amount worth `value18` at `price18`; `None` when unpriceable
pub fn amount_for_value(value18: u128, price18: u128, rounding: Rounding) -> CoreResult<Option<u128>> {
    if price18 == 0 {
        return Ok(None);
    }
    wad_div(value18, price18, rounding).map(Some)
}

/// Normalized collateral per normalized unit of debt, 18 decimals (0 without debt)
pub fn collateral_ratio(collateral18: u128, debt18: u128) -> CoreResult<u128> {
    if debt18 == 0 {
        return Ok(0);
    }
    mul_div(collateral18, WAD, debt18, Rounding::Down)
}

/// Collateral value over debt value, 18 decimals
pub fn health_factor(collateral_value18: u128, debt_value18: u128) -> CoreResult<u128> {
    if debt_value18 == 0 {
        return Ok(HEALTH_FACTOR_NO_DEBT);
    }
    wad_div(collateral_value18, debt_value18, Rounding::Down)
}

/// Prices and decimals of both sides of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairPricing {
    pub prices: [u128; 2],
    pub decimals: [u8; 2],
}

impl PairPricing {
    pub fn new(prices: [u128; 2], decimals: [u8; 2]) -> Self {
        Self { prices, decimals }
    }

    /// Both prices are available
    pub fn is_priceable(&self) -> bool {
        self.prices[0] != 0 && self.prices[1] != 0
    }

    pub fn price(&self, side: Side) -> u128 {
        self.prices[side.index()]
    }

    pub fn normalize(&self, side: Side, amount: u128) -> CoreResult<u128> {
        normalize(amount, self.decimals[side.index()])
    }

    pub fn denormalize(&self, side: Side, amount18: u128, rounding: Rounding) -> CoreResult<u128> {
        denormalize(amount18, self.decimals[side.index()], rounding)
    }

    /// USD value of a native amount
    pub fn value(&self, side: Side, amount: u128) -> CoreResult<u128> {
        value_of(self.normalize(side, amount)?, self.price(side))
    }

    /// Convert a normalized amount of `from` into the normalized amount of the
    /// other side with the same value
    pub fn convert(&self, from: Side, amount18: u128, rounding: Rounding) -> CoreResult<u128> {
        let to = from.other();
        if self.price(to) == 0 {
            return Ok(0);
        }
        mul_div(amount18, self.price(from), self.price(to), rounding)
    }

    /// Health factor of a debt position given native amounts
    pub fn health_factor(&self, collateral_a: u128, debt_b: u128) -> CoreResult<u128> {
        let collateral_value = self.value(Side::A, collateral_a)?;
        let debt_value = self.value(Side::B, debt_b)?;
        health_factor(collateral_value, debt_value)
    }
}

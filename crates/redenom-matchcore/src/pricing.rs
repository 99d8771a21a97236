//! Redenomination price rule.
//!
//! A price is *redenominated* when the reservation value has at least
//! `digit_gap` more integer digits than the price. Fractions are ignored.
//!
//! | Phase | Redenominated price | Bound | Returned price |
//! |---|---|---|---|
//! | pre-redenomination | rejected | reservation | raw |
//! | transition | allowed | reservation / factor | raw × factor |
//! | transition | plain | reservation | raw |
//! | post-redenomination | required | reservation / factor | raw × factor |
//!
//! Every returned price is on the pre-redenomination scale, which is the
//! only scale persisted or matched on.

use redenom_types::{MarketConfig, MarketError, Participant, PhaseType, Result, Role};
use rust_decimal::Decimal;

/// Validates and normalises submitted prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceValidator {
    factor: Decimal,
    digit_gap: u32,
}

impl PriceValidator {
    #[must_use]
    pub fn new(config: &MarketConfig) -> Self {
        Self {
            factor: config.redenomination_factor,
            digit_gap: config.redenominated_digit_gap,
        }
    }

    #[must_use]
    pub fn factor(&self) -> Decimal {
        self.factor
    }

    /// Number of digits in the integer part of `value`. Zero has one digit.
    #[must_use]
    pub fn integer_digits(value: Decimal) -> u32 {
        let int = value.abs().trunc();
        if int.is_zero() {
            return 1;
        }
        u32::try_from(int.to_string().len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn is_redenominated(&self, reservation_value: Decimal, price: Decimal) -> bool {
        Self::integer_digits(reservation_value)
            >= Self::integer_digits(price).saturating_add(self.digit_gap)
    }

    /// Validate `raw_price` for a participant of `role` and return it on the
    /// pre-redenomination scale.
    pub fn validate(
        &self,
        phase: PhaseType,
        reservation_value: Decimal,
        raw_price: Decimal,
        role: Role,
    ) -> Result<Decimal> {
        if raw_price <= Decimal::ZERO {
            return Err(MarketError::InvalidPrice {
                reason: format!("price must be positive, got {raw_price}"),
            });
        }
        let redenominated = self.is_redenominated(reservation_value, raw_price);

        match (phase, redenominated) {
            (PhaseType::PreRedenomination, true) => Err(MarketError::RedenominatedNotAllowed {
                price: raw_price,
                phase,
            }),
            (PhaseType::PostRedenomination, false) => Err(MarketError::RedenominatedRequired {
                price: raw_price,
                phase,
            }),
            (PhaseType::PreRedenomination | PhaseType::Transition, false) => {
                check_bound(role, raw_price, reservation_value)?;
                Ok(raw_price)
            }
            (PhaseType::Transition | PhaseType::PostRedenomination, true) => {
                check_bound(role, raw_price, reservation_value / self.factor)?;
                raw_price
                    .checked_mul(self.factor)
                    .ok_or_else(|| MarketError::InvalidPrice {
                        reason: format!("price {raw_price} overflows when scaled"),
                    })
            }
        }
    }

    /// [`Self::validate`] with role and reservation value taken from the participant.
    pub fn validate_for(
        &self,
        phase: PhaseType,
        participant: &Participant,
        raw_price: Decimal,
    ) -> Result<Decimal> {
        self.validate(
            phase,
            participant.reservation_value(),
            raw_price,
            participant.role(),
        )
    }
}

impl Default for PriceValidator {
    fn default() -> Self {
        Self::new(&MarketConfig::default())
    }
}

fn check_bound(role: Role, price: Decimal, bound: Decimal) -> Result<()> {
    match role {
        Role::Seller if price < bound => Err(MarketError::BelowReservation { price, bound }),
        Role::Buyer if price > bound => Err(MarketError::AboveReservation { price, bound }),
        Role::Seller | Role::Buyer => Ok(()),
    }
}

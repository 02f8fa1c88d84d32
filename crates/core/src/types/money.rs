//! Money arithmetic on `Decimal` amounts.
//!
//! All amounts are in the store currency's standard unit and rounded to two
//! decimal places, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

/// Flat shipping fee added to collaborative purchases and their orders.
pub const SHIPPING_FEE: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// Round to cents, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// The price a customer pays: the sale price when one is set, else retail.
#[must_use]
pub fn selling_price(retail: Decimal, sale: Option<Decimal>) -> Decimal {
    match sale {
        Some(sale) if sale > Decimal::ZERO => sale,
        _ => retail,
    }
}

/// Profit margin over cost, as a percentage rounded to cents.
///
/// Returns `None` when the cost is zero, where a margin is undefined.
#[must_use]
pub fn profit_margin(cost: Decimal, selling: Decimal) -> Option<Decimal> {
    if cost.is_zero() {
        return None;
    }
    Some(round_money((selling - cost) / cost * Decimal::ONE_HUNDRED))
}

/// One person's share of a group purchase.
///
/// The creator pays a share too, so the total is divided by
/// `participants + 1`.
#[must_use]
pub fn split_share(total: Decimal, participants: usize) -> Decimal {
    let payers = Decimal::from(participants) + Decimal::ONE;
    round_money(total / payers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap_or_default()
    }

    #[test]
    fn test_shipping_fee_is_ten() {
        assert_eq!(SHIPPING_FEE, dec("10"));
    }

    #[test]
    fn test_selling_price_prefers_positive_sale() {
        assert_eq!(selling_price(dec("20"), Some(dec("15.50"))), dec("15.50"));
        assert_eq!(selling_price(dec("20"), Some(Decimal::ZERO)), dec("20"));
        assert_eq!(selling_price(dec("20"), None), dec("20"));
    }

    #[test]
    fn test_profit_margin() {
        assert_eq!(profit_margin(dec("10"), dec("15")), Some(dec("50")));
        assert_eq!(profit_margin(dec("3"), dec("4")), Some(dec("33.33")));
        assert_eq!(profit_margin(Decimal::ZERO, dec("4")), None);
    }

    #[test]
    fn test_split_share_counts_creator() {
        // 2 x 45 + 10 shipping across creator + 2 participants
        assert_eq!(split_share(dec("100"), 2), dec("33.33"));
        assert_eq!(split_share(dec("110"), 1), dec("55"));
    }

    #[test]
    fn test_round_money_midpoint_away_from_zero() {
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("-2.345")), dec("-2.35"));
        assert_eq!(round_money(dec("2.344")), dec("2.34"));
    }
}

// src/utils/precision.rs
use rust_decimal::Decimal;

/// Rounds an amount DOWN to the nearest multiple of `step_size`.
/// Example: amount=10.999, step=1.0 -> 10
pub fn normalize_quantity(amount: Decimal, step_size: Decimal) -> Decimal {
    if step_size.is_zero() {
        return amount;
    }
    (amount / step_size).floor() * step_size
}

/// Share of `amount` given by `fraction`, floored to whole units.
pub fn whole_units_of(amount: Decimal, fraction: Decimal) -> Decimal {
    normalize_quantity(amount * fraction, Decimal::ONE).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn floors_not_rounds() {
        assert_eq!(normalize_quantity(dec!(10.999), dec!(1)), dec!(10));
        assert_eq!(normalize_quantity(dec!(0.127), dec!(0.01)), dec!(0.12));
        assert_eq!(whole_units_of(dec!(1000.7), dec!(0.5)), dec!(500));
        assert_eq!(whole_units_of(dec!(0.9), dec!(1)), Decimal::ZERO);
    }

    #[test]
    fn zero_step_is_passthrough() {
        assert_eq!(normalize_quantity(dec!(3.3), Decimal::ZERO), dec!(3.3));
    }
}

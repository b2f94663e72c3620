use sync_common::MinorUnits;

use crate::Money;

/// No single line item may ask for more than this many units.
pub const MAX_LINE_QUANTITY: i64 = 1_000_000;

/// The gateway expresses line item quantities as decimal strings ("2", "1.5"). Only whole quantities between zero and
/// [`MAX_LINE_QUANTITY`] are meaningful for tickets; anything else yields `None`.
pub fn parse_quantity(quantity: &str) -> Option<i64> {
    let q = quantity.trim();
    let whole = match q.split_once('.') {
        Some((whole, frac)) if frac.chars().all(|c| c == '0') => whole,
        Some(_) => return None,
        None => q,
    };
    whole.parse::<i64>().ok().filter(|v| (0..=MAX_LINE_QUANTITY).contains(v))
}

pub fn money<S: Into<String>>(amount: i64, currency: S) -> Money {
    Money { amount: MinorUnits::from(amount), currency: currency.into() }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("2"), Some(2));
        assert_eq!(parse_quantity(" 3.000 "), Some(3));
        assert_eq!(parse_quantity("1.5"), None);
        assert_eq!(parse_quantity("-1"), None);
        assert_eq!(parse_quantity("two"), None);
        assert_eq!(parse_quantity("1000000"), Some(MAX_LINE_QUANTITY));
        assert_eq!(parse_quantity("1000001"), None);
        assert_eq!(parse_quantity("9223372036854775807"), None);
    }
}

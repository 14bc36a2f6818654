use alloy::primitives::U256;

/// Render a fixed-point token amount as a decimal string with exactly
/// `precision` fractional digits, rounding half-up at the last kept digit.
///
/// Works on the raw integer so large balances keep every digit.
pub fn format_token_amount(raw: U256, decimals: u8, precision: u8) -> String {
    let ten = U256::from(10u8);

    // Shift the value so it carries exactly `precision` fractional digits.
    let scaled = if precision >= decimals {
        raw.saturating_mul(ten.pow(U256::from(precision - decimals)))
    } else {
        let divisor = ten.pow(U256::from(decimals - precision));
        let quotient = raw / divisor;
        let remainder = raw % divisor;
        // remainder >= divisor / 2, written without overflow or truncation
        if remainder >= divisor - remainder {
            quotient + U256::from(1u8)
        } else {
            quotient
        }
    };

    if precision == 0 {
        return scaled.to_string();
    }

    let unit = ten.pow(U256::from(precision));
    let whole = scaled / unit;
    let fraction = scaled % unit;
    format!(
        "{}.{:0>width$}",
        whole,
        fraction.to_string(),
        width = precision as usize
    )
}

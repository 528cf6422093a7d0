//! Number formatting for engine outputs

/// Format `x` in decimal, or C-style hexadecimal (`%a`) when `hex` is set
pub fn format_float(x: f64, hex: bool) -> String {
    if hex {
        hexfloat(x)
    } else {
        format!("{}", x)
    }
}

/// Render `x` like C's `%a`: `0x1.8p+1` for 3.0
pub fn hexfloat(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let bits = x.to_bits();
    let sign = if bits >> 63 == 1 { "-" } else { "" };
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let mantissa = bits & 0x000f_ffff_ffff_ffff;

    if biased == 0 && mantissa == 0 {
        return format!("{}0x0p+0", sign);
    }

    // Subnormals keep a leading 0 and the minimum exponent
    let (lead, exponent) = if biased == 0 {
        (0, -1022)
    } else {
        (1, biased - 1023)
    };

    let digits = format!("{:013x}", mantissa);
    let digits = digits.trim_end_matches('0');
    if digits.is_empty() {
        format!("{}0x{}p{:+}", sign, lead, exponent)
    } else {
        format!("{}0x{}.{}p{:+}", sign, lead, digits, exponent)
    }
}

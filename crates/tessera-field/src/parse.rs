//! Numeric text scanning shared by the integer, real and decimal stores.

/// A number recognised at the start of a text value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NumericText<'a> {
    pub negative: bool,
    /// Integer digits with leading zeros removed.
    pub int_digits: &'a [u8],
    pub frac_digits: &'a [u8],
    /// Text consumed by the number, including sign and exponent.
    pub span: &'a [u8],
    /// True if non-space characters follow the number.
    pub garbage: bool,
}

impl NumericText<'_> {
    /// Rounds to an integer, half away from zero.
    ///
    /// Returns `None` when the magnitude cannot be represented in an
    /// `i128`, and whether non-zero fractional digits were dropped.
    pub fn to_i128_rounded(&self) -> Option<(i128, bool)> {
        if self.int_digits.len() > 38 {
            return None;
        }
        let mut magnitude: i128 = 0;
        for &d in self.int_digits {
            magnitude = magnitude * 10 + i128::from(d - b'0');
        }
        if self.frac_digits.first().is_some_and(|&d| d >= b'5') {
            magnitude += 1;
        }
        let lossy = self.frac_digits.iter().any(|&d| d != b'0');
        Some((if self.negative { -magnitude } else { magnitude }, lossy))
    }
}

/// Scans `[spaces][sign]digits[.digits][exponent][spaces]`.
///
/// The exponent is only consumed when `allow_exponent` is set. Returns
/// `None` if no digit was found.
pub(crate) fn scan_number(text: &[u8], allow_exponent: bool) -> Option<NumericText<'_>> {
    let mut pos = skip_spaces(text, 0);
    let start = pos;

    let mut negative = false;
    if let Some(&c) = text.get(pos) {
        if c == b'-' || c == b'+' {
            negative = c == b'-';
            pos += 1;
        }
    }

    let int_start = pos;
    pos = skip_digits(text, pos);
    let int_end = pos;

    let mut frac_start = pos;
    let mut frac_end = pos;
    if text.get(pos) == Some(&b'.') {
        frac_start = pos + 1;
        frac_end = skip_digits(text, frac_start);
        pos = frac_end;
    }

    if int_end == int_start && frac_end == frac_start {
        return None;
    }

    if allow_exponent && matches!(text.get(pos), Some(b'e' | b'E')) {
        let mut exp = pos + 1;
        if matches!(text.get(exp), Some(b'-' | b'+')) {
            exp += 1;
        }
        let exp_end = skip_digits(text, exp);
        if exp_end > exp {
            pos = exp_end;
        }
    }

    let span_end = pos;
    let rest = skip_spaces(text, pos);

    let mut int_digits = &text[int_start..int_end];
    while int_digits.len() > 1 && int_digits[0] == b'0' {
        int_digits = &int_digits[1..];
    }
    if int_digits == b"0" {
        int_digits = &[];
    }

    Some(NumericText {
        negative,
        int_digits,
        frac_digits: &text[frac_start..frac_end],
        span: &text[start..span_end],
        garbage: rest < text.len(),
    })
}

fn skip_spaces(text: &[u8], mut pos: usize) -> usize {
    while text.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

fn skip_digits(text: &[u8], mut pos: usize) -> usize {
    while text.get(pos).is_some_and(u8::is_ascii_digit) {
        pos += 1;
    }
    pos
}

/// Rounds half to even, the C `rint` behaviour under the default rounding
/// mode.
pub(crate) fn rint(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}

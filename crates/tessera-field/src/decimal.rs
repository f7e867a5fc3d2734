//! Fixed-point decimal values and their binary column format.
//!
//! # Binary format
//!
//! A `DECIMAL(p, s)` column is stored as a big-endian, memcmp-sortable
//! string. The integer and fractional parts are split into groups of nine
//! decimal digits, each stored in four bytes; a leftover group of fewer
//! digits uses the minimum number of bytes from `DIG2BYTES`. The integer
//! part's leftover group comes first, the fractional part's last.
//!
//! Negative values have every byte inverted. Finally the top bit of the
//! first byte is flipped, so positive values sort after negative ones.
//!
//! ```text
//! DECIMAL(14,4)  1234567890.1234  ->  81 0D FB 38 D2 04 D2
//!                -1234567890.1234 ->  7E F2 04 C7 2D FB 2D
//! ```

use std::cmp::Ordering;
use std::fmt;

use tessera_common::constants::{DECIMAL_DIGITS_PER_WORD, DECIMAL_MAX_PRECISION};

use crate::diagnostics::StoreStatus;
use crate::error::{FieldError, FieldResult};
use crate::parse::{scan_number, NumericText};

/// Bytes needed for a group of 0..=9 decimal digits.
const DIG2BYTES: [usize; 10] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];

const WORD_BASE: u128 = 1_000_000_000;

/// A fixed-point decimal number: `unscaled / 10^scale`.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    unscaled: i128,
    scale: u8,
}

impl Decimal {
    /// Zero with scale 0.
    pub const ZERO: Self = Self {
        unscaled: 0,
        scale: 0,
    };

    /// Creates a decimal from its unscaled value and scale.
    #[must_use]
    pub const fn new(unscaled: i128, scale: u8) -> Self {
        Self { unscaled, scale }
    }

    /// Creates an integral decimal.
    #[must_use]
    pub const fn from_int(value: i128) -> Self {
        Self::new(value, 0)
    }

    /// Returns the unscaled value.
    #[must_use]
    pub const fn unscaled(&self) -> i128 {
        self.unscaled
    }

    /// Returns the number of fractional digits.
    #[must_use]
    pub const fn scale(&self) -> u8 {
        self.scale
    }

    /// Returns true if the value is below zero.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.unscaled < 0
    }

    /// Parses decimal text exactly (no rounding).
    ///
    /// Returns `None` for malformed text, trailing garbage or more than 38
    /// significant digits.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let num = scan_number(text.as_bytes(), false)?;
        if num.garbage {
            return None;
        }
        let frac = trim_trailing_zeros(num.frac_digits);
        let scale = u8::try_from(frac.len()).ok()?;
        if num.int_digits.len() + frac.len() > usize::from(DECIMAL_MAX_PRECISION) {
            return None;
        }
        let mut unscaled: i128 = 0;
        for &d in num.int_digits.iter().chain(frac) {
            unscaled = unscaled * 10 + i128::from(d - b'0');
        }
        Some(Self::new(if num.negative { -unscaled } else { unscaled }, scale))
    }

    /// Largest value representable with the given precision and scale.
    #[must_use]
    pub fn max_for(precision: u8, scale: u8) -> Self {
        Self::new(pow10(u32::from(precision)) - 1, scale)
    }

    /// Returns true if the value fits `DECIMAL(precision, self.scale)`.
    #[must_use]
    pub fn fits(&self, precision: u8) -> bool {
        self.unscaled.unsigned_abs() < pow10(u32::from(precision)).unsigned_abs()
    }

    /// Changes the scale, rounding half away from zero when digits are
    /// dropped.
    ///
    /// Returns the rescaled value and whether non-zero digits were lost,
    /// or `None` if the result does not fit an `i128`.
    #[must_use]
    pub fn rescale(&self, scale: u8) -> Option<(Self, bool)> {
        match scale.cmp(&self.scale) {
            Ordering::Equal => Some((*self, false)),
            Ordering::Greater => {
                let factor = checked_pow10(u32::from(scale - self.scale))?;
                Some((Self::new(self.unscaled.checked_mul(factor)?, scale), false))
            }
            Ordering::Less => {
                let divisor = checked_pow10(u32::from(self.scale - scale))?;
                let (q, r) = (self.unscaled / divisor, self.unscaled % divisor);
                let q = if r.unsigned_abs() * 2 >= divisor.unsigned_abs() {
                    q + self.unscaled.signum()
                } else {
                    q
                };
                Some((Self::new(q, scale), r != 0))
            }
        }
    }

    /// Rounds to an integer, half away from zero.
    #[must_use]
    pub fn round_to_int(&self) -> i128 {
        self.rescale(0).map_or(0, |(d, _)| d.unscaled)
    }

    /// Converts to the nearest double.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        self.unscaled as f64 / 10f64.powi(i32::from(self.scale))
    }

    /// Checks that `DECIMAL(precision, scale)` can be encoded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDefinition` if the precision exceeds
    /// [`DECIMAL_MAX_PRECISION`] or the scale exceeds the precision.
    pub fn check_dimensions(precision: u8, scale: u8) -> FieldResult<()> {
        if precision > DECIMAL_MAX_PRECISION || scale > precision {
            return Err(FieldError::invalid_definition(format!(
                "decimal ({precision},{scale}) needs scale <= precision <= {DECIMAL_MAX_PRECISION}"
            )));
        }
        Ok(())
    }

    /// Returns the binary column size of `DECIMAL(precision, scale)`.
    #[must_use]
    pub fn bin_size(precision: u8, scale: u8) -> usize {
        let intg = usize::from(precision.saturating_sub(scale));
        let frac = usize::from(scale);
        let per = DECIMAL_DIGITS_PER_WORD;
        (intg / per) * 4 + DIG2BYTES[intg % per] + (frac / per) * 4 + DIG2BYTES[frac % per]
    }

    /// Fits the value into `DECIMAL(precision, scale)`: rounds extra
    /// fractional digits and clamps values outside the range.
    #[must_use]
    pub fn fit(&self, precision: u8, scale: u8) -> (Self, StoreStatus) {
        let max = Self::max_for(precision, scale);
        let clamped = |negative: bool| {
            let v = if negative { Self::new(-max.unscaled, scale) } else { max };
            (v, StoreStatus::OutOfRange)
        };
        match self.rescale(scale) {
            None => clamped(self.is_negative()),
            Some((v, _)) if !v.fits(precision) => clamped(self.is_negative()),
            Some((v, true)) => (v, StoreStatus::Rounded),
            Some((v, false)) => (v, StoreStatus::Ok),
        }
    }

    /// Fits scanned text into `DECIMAL(precision, scale)` without going
    /// through an intermediate value, so arbitrarily long input is handled.
    pub(crate) fn fit_text(num: &NumericText<'_>, precision: u8, scale: u8) -> (Self, StoreStatus) {
        let max = Self::max_for(precision, scale);
        let intg = usize::from(precision - scale);
        let garbage = if num.garbage {
            StoreStatus::Truncated
        } else {
            StoreStatus::Ok
        };

        if num.int_digits.len() > intg {
            let v = if num.negative { Self::new(-max.unscaled, scale) } else { max };
            return (v, StoreStatus::OutOfRange);
        }

        let mut magnitude: i128 = 0;
        for &d in num.int_digits {
            magnitude = magnitude * 10 + i128::from(d - b'0');
        }
        let scale_len = usize::from(scale);
        for i in 0..scale_len {
            let d = num.frac_digits.get(i).map_or(0, |&d| d - b'0');
            magnitude = magnitude * 10 + i128::from(d);
        }
        let dropped = num.frac_digits.get(scale_len..).unwrap_or(&[]);
        let mut status = garbage;
        if dropped.iter().any(|&d| d != b'0') {
            status = status.max(StoreStatus::Rounded);
        }
        if dropped.first().is_some_and(|&d| d >= b'5') {
            magnitude += 1;
        }
        if magnitude > max.unscaled {
            magnitude = max.unscaled;
            status = StoreStatus::OutOfRange;
        }
        (
            Self::new(if num.negative { -magnitude } else { magnitude }, scale),
            status,
        )
    }

    /// Writes the binary column format of `DECIMAL(precision, scale)`.
    ///
    /// The value must already have been fitted to the column.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooShort` if `out` is smaller than the column and
    /// `InvalidDefinition` for impossible dimensions.
    pub fn to_bin(&self, precision: u8, scale: u8, out: &mut [u8]) -> FieldResult<usize> {
        debug_assert_eq!(self.scale, scale);
        Self::check_dimensions(precision, scale)?;
        let size = Self::bin_size(precision, scale);
        FieldError::check_len(size, out.len())?;

        let per = DECIMAL_DIGITS_PER_WORD;
        let magnitude = self.unscaled.unsigned_abs();
        let scale_factor = pow10u(usize::from(scale));
        let int_part = magnitude / scale_factor;
        let frac_part = magnitude % scale_factor;

        let intg = usize::from(precision - scale);
        let (intg0, intg0x) = (intg / per, intg % per);
        let frac = usize::from(scale);
        let (frac0, frac0x) = (frac / per, frac % per);

        let mut pos = 0;
        if intg0x > 0 {
            let v = (int_part / pow10u(per * intg0)) % pow10u(intg0x);
            pos = write_be(out, pos, v, DIG2BYTES[intg0x]);
        }
        for i in 0..intg0 {
            let v = (int_part / pow10u(per * (intg0 - 1 - i))) % WORD_BASE;
            pos = write_be(out, pos, v, 4);
        }
        for i in 0..frac0 {
            let v = (frac_part / pow10u(frac - per * (i + 1))) % WORD_BASE;
            pos = write_be(out, pos, v, 4);
        }
        if frac0x > 0 {
            let v = frac_part % pow10u(frac0x);
            pos = write_be(out, pos, v, DIG2BYTES[frac0x]);
        }
        debug_assert_eq!(pos, size);

        if self.is_negative() {
            for b in &mut out[..size] {
                *b = !*b;
            }
        }
        out[0] ^= 0x80;
        Ok(size)
    }

    /// Reads the binary column format of `DECIMAL(precision, scale)`.
    ///
    /// # Errors
    ///
    /// Returns `BufferTooShort` if `bytes` is smaller than the column and
    /// `InvalidDefinition` for impossible dimensions.
    pub fn from_bin(bytes: &[u8], precision: u8, scale: u8) -> FieldResult<Self> {
        Self::check_dimensions(precision, scale)?;
        let size = Self::bin_size(precision, scale);
        FieldError::check_len(size, bytes.len())?;

        let mut buf = bytes[..size].to_vec();
        let negative = buf[0] & 0x80 == 0;
        buf[0] ^= 0x80;
        if negative {
            for b in &mut buf {
                *b = !*b;
            }
        }

        let per = DECIMAL_DIGITS_PER_WORD;
        let intg = usize::from(precision - scale);
        let (intg0, intg0x) = (intg / per, intg % per);
        let frac = usize::from(scale);
        let (frac0, frac0x) = (frac / per, frac % per);

        let mut pos = 0;
        let mut int_part: u128 = 0;
        if intg0x > 0 {
            int_part = read_be(&buf, &mut pos, DIG2BYTES[intg0x]);
        }
        for _ in 0..intg0 {
            int_part = int_part * WORD_BASE + read_be(&buf, &mut pos, 4);
        }
        let mut frac_part: u128 = 0;
        for _ in 0..frac0 {
            frac_part = frac_part * WORD_BASE + read_be(&buf, &mut pos, 4);
        }
        if frac0x > 0 {
            frac_part = frac_part * pow10u(frac0x) + read_be(&buf, &mut pos, DIG2BYTES[frac0x]);
        }

        let magnitude = int_part
            .saturating_mul(pow10u(frac))
            .saturating_add(frac_part);
        let magnitude = i128::try_from(magnitude).unwrap_or(i128::MAX);
        Ok(Self::new(if negative { -magnitude } else { magnitude }, scale))
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.scale == other.scale {
            return self.unscaled.cmp(&other.unscaled);
        }
        // Compare integer parts, then fractions widened to a common scale.
        let common = self.scale.max(other.scale);
        let split = |d: &Self| {
            let p = pow10(u32::from(d.scale));
            let widen = pow10(u32::from(common - d.scale));
            (d.unscaled / p, (d.unscaled % p) * widen)
        };
        split(self).cmp(&split(other))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.unscaled.unsigned_abs();
        let p = pow10u(usize::from(self.scale));
        if self.is_negative() {
            f.write_str("-")?;
        }
        write!(f, "{}", magnitude / p)?;
        if self.scale > 0 {
            write!(f, ".{:0width$}", magnitude % p, width = usize::from(self.scale))?;
        }
        Ok(())
    }
}

fn trim_trailing_zeros(digits: &[u8]) -> &[u8] {
    let end = digits.iter().rposition(|&d| d != b'0').map_or(0, |i| i + 1);
    &digits[..end]
}

fn pow10(n: u32) -> i128 {
    10i128.pow(n)
}

fn checked_pow10(n: u32) -> Option<i128> {
    10i128.checked_pow(n)
}

fn pow10u(n: usize) -> u128 {
    (0..n).fold(1u128, |acc, _| acc.saturating_mul(10))
}

fn write_be(out: &mut [u8], pos: usize, value: u128, width: usize) -> usize {
    for i in 0..width {
        out[pos + i] = (value >> (8 * (width - 1 - i))) as u8;
    }
    pos + width
}

fn read_be(buf: &[u8], pos: &mut usize, width: usize) -> u128 {
    let mut v = 0u128;
    for &b in &buf[*pos..*pos + width] {
        v = (v << 8) | u128::from(b);
    }
    *pos += width;
    v
}

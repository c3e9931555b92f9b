//! Common small functions used throughout the crate
//!
//! These are left public for the convenience of the user. For example
//! formatting numbers to fit the fixed-width FLUKA input columns.

use std::fmt::LowerExp;

// Alias for the format! macro out of laziness
pub use std::format as f;

/// Width of a single fixed-format FLUKA field
pub const FIELD_WIDTH: usize = 10;

/// Extends primitives with FLUKA friendly scientific formatting
pub trait NumberFmt {
    /// Scientific notation with a signed, zero padded exponent
    ///
    /// FLUKA reads Fortran style exponents, so the sign is always written.
    ///
    /// ```rust
    /// # use flubl::utils::NumberFmt;
    /// assert_eq!((-1.0_f64).sci(5, 2), "-1.00000e+00");
    /// assert_eq!(1.5e-7_f64.sci(3, 1), "1.500e-7");
    /// ```
    fn sci(&self, precision: usize, exp_pad: usize) -> String;
}

impl<T: LowerExp> NumberFmt for T {
    fn sci(&self, precision: usize, exp_pad: usize) -> String {
        let s = f!("{self:.precision$e}");
        let (mantissa, exponent) = s.split_once('e').unwrap_or((s.as_str(), "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        f!("{mantissa}e{sign}{digits:0>exp_pad$}")
    }
}

/// Shortest representation of a number that fits a fixed FLUKA field
///
/// FLUKA reads each WHAT from a 10 character column, so the value has to be
/// squeezed into that space with as much precision as possible. The shortest
/// round-trip representation is used where it fits, then fixed decimals, then
/// scientific notation with a signed exponent.
///
/// ```rust
/// # use flubl::utils::fluka_number;
/// assert_eq!(fluka_number(1.0), "1.0");
/// assert_eq!(fluka_number(1e-6), "1e-6");
/// assert_eq!(fluka_number(0.30000000000000004), "0.3");
/// assert_eq!(fluka_number(-1234.56789012), "-1234.5679");
/// assert_eq!(fluka_number(1.23456789e-7), "1.23457e-7");
/// assert_eq!(fluka_number(1.234567e12), "1.2346e+12");
/// ```
pub fn fluka_number(value: f64) -> String {
    let s = f!("{value:?}");
    if s.len() <= FIELD_WIDTH {
        return s;
    }

    // fixed decimals for anything with a sensible magnitude
    let magnitude = value.abs();
    if (1e-4..1e9).contains(&magnitude) {
        let integer_width = f!("{:.0}", value.trunc()).len();
        if integer_width + 2 <= FIELD_WIDTH {
            let precision = FIELD_WIDTH - integer_width - 1;
            let mut s = f!("{value:.precision$}");
            while s.ends_with('0') && !s.ends_with(".0") {
                s.pop();
            }
            if s.len() <= FIELD_WIDTH {
                return s;
            }
        }
    }

    // fall back to the most precise scientific notation that fits
    (0..=8)
        .rev()
        .map(|precision| value.sci(precision, 1))
        .find(|s| s.len() <= FIELD_WIDTH)
        .unwrap_or_else(|| value.sci(0, 1))
}

/// Sanitise a name into something FLUKA will accept as an identifier
///
/// Only upper case alphanumeric characters are kept, the name must start with
/// a letter, and is truncated to `max_len` characters.
///
/// ```rust
/// # use flubl::utils::fluka_name;
/// assert_eq!(fluka_name("G4_STAINLESS-STEEL", 8), "G4STAINL");
/// assert_eq!(fluka_name("1st_collimator", 8), "X1STCOLL");
/// assert_eq!(fluka_name("__", 8), "X");
/// ```
pub fn fluka_name(name: &str, max_len: usize) -> String {
    let mut s: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !s.starts_with(|c: char| c.is_ascii_alphabetic()) {
        s.insert(0, 'X');
    }

    s.truncate(max_len);
    s
}

//! Unit Conversion - Affine Unit Algebra
//!
//! Every resolvable unit is represented as an affine relation to a
//! dimension-specific base unit: `value_in_base = value * k + b`. Two units
//! are convertible only if they resolve to the same base dimension, and the
//! conversion between them is itself affine:
//!
//! ```text
//! scale  = k1 / k2
//! offset = (b1 - b2) / k2
//! ```
//!
//! so that `value_target = value_source * scale + offset`. Logarithmic units
//! (dB and friends) cannot be expressed in this form and are rejected rather
//! than approximated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while resolving or converting unit expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Unit symbol not known to the registry
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    /// Expression could not be parsed
    #[error("malformed unit expression '{0}'")]
    Malformed(String),

    /// Units resolve to different physical dimensions. The fields are not
    /// named `source`/`target`: thiserror reserves `source` for error
    /// chaining.
    #[error("unit [{unit}] is not compatible with the expected unit [{expected}]")]
    Incompatible { unit: String, expected: String },

    /// Units share a dimension family but are not related by an affine function
    #[error("unit [{0}] has no linear relation to its base unit")]
    Nonlinear(String),
}

/// Linear coefficients for converting a source value into the schema unit.
///
/// `value_in_schema_unit = value_from_signal * scale + offset`. The offset is
/// non-zero only for offset scales such as degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    pub scale: f64,
    pub offset: f64,
}

impl UnitConversion {
    /// The identity conversion (source and target units are equal).
    pub const IDENTITY: UnitConversion = UnitConversion {
        scale: 1.0,
        offset: 0.0,
    };

    /// Whether applying this conversion leaves values unchanged.
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }

    /// Apply the conversion to a raw value.
    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }
}

/// Physical dimension as exponents over the seven SI base quantities:
/// length, mass, time, current, temperature, amount, luminous intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension([i8; 7]);

impl Dimension {
    pub const NONE: Dimension = Dimension([0; 7]);

    const fn new(l: i8, m: i8, t: i8, i: i8, th: i8, n: i8, j: i8) -> Self {
        Dimension([l, m, t, i, th, n, j])
    }

    const fn pow(self, exp: i8) -> Self {
        let mut out = [0i8; 7];
        let mut i = 0;
        while i < 7 {
            out[i] = self.0[i] * exp;
            i += 1;
        }
        Dimension(out)
    }

    fn mul(self, other: Dimension) -> Option<Self> {
        let mut out = [0i8; 7];
        for ((o, a), b) in out.iter_mut().zip(self.0).zip(other.0) {
            *o = a.checked_add(b)?;
        }
        Some(Dimension(out))
    }
}

/// How a unit relates to its base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Linearity {
    /// Pure multiplicative factor
    Linear,
    /// Multiplicative factor plus additive offset (temperature scales)
    Offset,
    /// Logarithmic relation, not expressible as an affine transform
    Logarithmic,
}

struct UnitDef {
    symbol: &'static str,
    dim: Dimension,
    scale: f64,
    offset: f64,
    linearity: Linearity,
}

const L: Dimension = Dimension::new(1, 0, 0, 0, 0, 0, 0);
const M: Dimension = Dimension::new(0, 1, 0, 0, 0, 0, 0);
const T: Dimension = Dimension::new(0, 0, 1, 0, 0, 0, 0);
const I: Dimension = Dimension::new(0, 0, 0, 1, 0, 0, 0);
const TH: Dimension = Dimension::new(0, 0, 0, 0, 1, 0, 0);
const N: Dimension = Dimension::new(0, 0, 0, 0, 0, 1, 0);
const J: Dimension = Dimension::new(0, 0, 0, 0, 0, 0, 1);

macro_rules! unit {
    ($sym:literal, $dim:expr, $scale:expr) => {
        UnitDef {
            symbol: $sym,
            dim: $dim,
            scale: $scale,
            offset: 0.0,
            linearity: Linearity::Linear,
        }
    };
    ($sym:literal, $dim:expr, $scale:expr, offset $offset:expr) => {
        UnitDef {
            symbol: $sym,
            dim: $dim,
            scale: $scale,
            offset: $offset,
            linearity: Linearity::Offset,
        }
    };
    ($sym:literal, log) => {
        UnitDef {
            symbol: $sym,
            dim: Dimension::NONE,
            scale: 1.0,
            offset: 0.0,
            linearity: Linearity::Logarithmic,
        }
    };
}

/// Built-in unit table. Base units are SI; the mass base is the kilogram, so
/// the gram carries a factor of 1e-3.
static UNITS: &[UnitDef] = &[
    // SI base
    unit!("m", L, 1.0),
    unit!("g", M, 1e-3),
    unit!("s", T, 1.0),
    unit!("A", I, 1.0),
    unit!("K", TH, 1.0),
    unit!("mol", N, 1.0),
    unit!("cd", J, 1.0),
    // Dimensionless
    unit!("rad", Dimension::NONE, 1.0),
    unit!("sr", Dimension::NONE, 1.0),
    // Derived, SI-coherent
    unit!("Hz", T.pow(-1), 1.0),
    unit!("N", Dimension::new(1, 1, -2, 0, 0, 0, 0), 1.0),
    unit!("Pa", Dimension::new(-1, 1, -2, 0, 0, 0, 0), 1.0),
    unit!("J", Dimension::new(2, 1, -2, 0, 0, 0, 0), 1.0),
    unit!("W", Dimension::new(2, 1, -3, 0, 0, 0, 0), 1.0),
    unit!("C", Dimension::new(0, 0, 1, 1, 0, 0, 0), 1.0),
    unit!("V", Dimension::new(2, 1, -3, -1, 0, 0, 0), 1.0),
    unit!("F", Dimension::new(-2, -1, 4, 2, 0, 0, 0), 1.0),
    unit!("Ohm", Dimension::new(2, 1, -3, -2, 0, 0, 0), 1.0),
    unit!("ohm", Dimension::new(2, 1, -3, -2, 0, 0, 0), 1.0),
    unit!("S", Dimension::new(-2, -1, 3, 2, 0, 0, 0), 1.0),
    unit!("Wb", Dimension::new(2, 1, -2, -1, 0, 0, 0), 1.0),
    unit!("T", Dimension::new(0, 1, -2, -1, 0, 0, 0), 1.0),
    unit!("H", Dimension::new(2, 1, -2, -2, 0, 0, 0), 1.0),
    // Non-SI time
    unit!("min", T, 60.0),
    unit!("h", T, 3600.0),
    // Offset temperature scales
    unit!("degC", TH, 1.0, offset 273.15),
    unit!("degF", TH, 5.0 / 9.0, offset 459.67 * 5.0 / 9.0),
    // Logarithmic ratio units: registered so they are rejected, never
    // silently approximated
    unit!("dB", log),
    unit!("dBm", log),
    unit!("Np", log),
];

/// SI prefixes, longest first so that e.g. `da` wins over `d`.
static PREFIXES: &[(&str, f64)] = &[
    ("da", 1e1),
    ("Y", 1e24),
    ("Z", 1e21),
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("µ", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
    ("a", 1e-18),
    ("z", 1e-21),
    ("y", 1e-24),
];

/// A resolved unit expression: `value_in_base = value * scale + offset` with
/// the given physical dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Affine {
    scale: f64,
    offset: f64,
    dim: Dimension,
}

/// Largest accepted exponent magnitude per factor. No physical quantity in
/// the schema carries anything near this; larger values would overflow the
/// dimension vector.
const MAX_EXPONENT: i8 = 8;

/// Resolves unit expressions and computes affine conversions between them.
///
/// The registry is a fixed table; it is not a general-purpose unit library.
/// Supported expression grammar: an optional leading numeric factor, unit
/// factors joined by `.`, `*` or `/`, each factor an optionally prefixed
/// symbol with an optional integer exponent (`m^2`, `m2`, `s^-1`) no larger
/// than [`MAX_EXPONENT`] in magnitude.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitRegistry;

impl UnitRegistry {
    pub fn new() -> Self {
        UnitRegistry
    }

    /// Compute the conversion mapping values in `source` onto `target`.
    pub fn conversion(
        &self,
        source: &str,
        target: &str,
    ) -> Result<UnitConversion, ConversionError> {
        let src = self.resolve(source)?;
        let tgt = self.resolve(target)?;
        if src.dim != tgt.dim {
            return Err(ConversionError::Incompatible {
                unit: source.trim().to_string(),
                expected: target.trim().to_string(),
            });
        }
        Ok(UnitConversion {
            scale: src.scale / tgt.scale,
            offset: (src.offset - tgt.offset) / tgt.scale,
        })
    }

    /// Whether the expression resolves to a known affine unit.
    pub fn is_valid(&self, expr: &str) -> bool {
        self.resolve(expr).is_ok()
    }

    fn resolve(&self, expr: &str) -> Result<Affine, ConversionError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(ConversionError::Malformed(expr.to_string()));
        }

        // Optional leading numeric factor, e.g. "1e2 mm".
        let (numeric, rest) = split_numeric_factor(expr);
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(ConversionError::Malformed(expr.to_string()));
        }

        let mut scale = numeric;
        let mut dim = Dimension::NONE;
        let mut offset_factor: Option<&UnitDef> = None;
        let mut factor_count = 0usize;

        for (factor, exponent) in split_factors(rest)? {
            factor_count += 1;
            let (symbol, local_exp) = split_exponent(factor)?;
            let exp = exponent
                .checked_mul(local_exp)
                .filter(|e| (-MAX_EXPONENT..=MAX_EXPONENT).contains(e))
                .ok_or_else(|| ConversionError::Malformed(factor.to_string()))?;
            let (prefix, def) = lookup(symbol)
                .ok_or_else(|| ConversionError::UnknownUnit(symbol.to_string()))?;
            match def.linearity {
                Linearity::Logarithmic => {
                    return Err(ConversionError::Nonlinear(expr.to_string()));
                }
                Linearity::Offset => {
                    // Offset units only make sense standalone; inside a
                    // compound or with an exponent the offset has no affine
                    // decomposition.
                    offset_factor = Some(def);
                    if exp != 1 || prefix != 1.0 {
                        return Err(ConversionError::Nonlinear(expr.to_string()));
                    }
                    scale *= def.scale;
                    dim = dim
                        .mul(def.dim)
                        .ok_or_else(|| ConversionError::Malformed(expr.to_string()))?;
                }
                Linearity::Linear => {
                    scale *= (prefix * def.scale).powi(exp as i32);
                    dim = dim
                        .mul(def.dim.pow(exp))
                        .ok_or_else(|| ConversionError::Malformed(expr.to_string()))?;
                }
            }
        }

        let offset = match offset_factor {
            Some(def) if factor_count == 1 && numeric == 1.0 => def.offset,
            Some(_) => return Err(ConversionError::Nonlinear(expr.to_string())),
            None => 0.0,
        };

        Ok(Affine { scale, offset, dim })
    }
}

/// Split a leading numeric factor off the expression, if present.
fn split_numeric_factor(expr: &str) -> (f64, &str) {
    // The numeric factor is whitespace-separated: "1e2 mm".
    if let Some((head, tail)) = expr.split_once(char::is_whitespace) {
        if let Ok(value) = head.parse::<f64>() {
            return (value, tail);
        }
    }
    (1.0, expr)
}

/// Split an expression into unit factors with their division sign applied.
fn split_factors(expr: &str) -> Result<Vec<(&str, i8)>, ConversionError> {
    let mut factors = Vec::new();
    let mut sign: i8 = 1;
    let mut start = 0;
    for (idx, ch) in expr.char_indices() {
        if ch == '.' || ch == '*' || ch == '/' {
            let factor = expr[start..idx].trim();
            if factor.is_empty() {
                return Err(ConversionError::Malformed(expr.to_string()));
            }
            factors.push((factor, sign));
            sign = if ch == '/' { -1 } else { 1 };
            start = idx + ch.len_utf8();
        }
    }
    let last = expr[start..].trim();
    if last.is_empty() {
        return Err(ConversionError::Malformed(expr.to_string()));
    }
    factors.push((last, sign));
    Ok(factors)
}

/// Split an optional integer exponent off a factor: `m^2`, `s^-1` or `m2`.
fn split_exponent(factor: &str) -> Result<(&str, i8), ConversionError> {
    if let Some((symbol, exp)) = factor.split_once('^') {
        let exp: i8 = exp
            .parse()
            .map_err(|_| ConversionError::Malformed(factor.to_string()))?;
        return Ok((symbol, exp));
    }
    let digits = factor.len() - factor.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    if digits < factor.len() && digits > 0 {
        let exp: i8 = factor[digits..]
            .parse()
            .map_err(|_| ConversionError::Malformed(factor.to_string()))?;
        return Ok((&factor[..digits], exp));
    }
    Ok((factor, 1))
}

/// Look a symbol up in the unit table, trying an exact match before any
/// prefix split so that `T` stays tesla and `h` stays hour.
fn lookup(symbol: &str) -> Option<(f64, &'static UnitDef)> {
    if let Some(def) = UNITS.iter().find(|u| u.symbol == symbol) {
        return Some((1.0, def));
    }
    for (prefix, factor) in PREFIXES {
        if let Some(rest) = symbol.strip_prefix(prefix) {
            if let Some(def) = UNITS.iter().find(|u| u.symbol == rest) {
                return Some((*factor, def));
            }
        }
    }
    None
}

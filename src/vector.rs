//! The vector value type: dense `f32` arrays with cosine distance,
//! textual and blob (de)serialization (spec §4.2).

use crate::codec;
use crate::error::Error;

/// Maximum number of elements a vector may hold (spec §3, §4.2).
pub const MAX_DIMENSION: usize = 16_000;

/// Maximum length of a single numeric token accepted by [`parse_text`].
const MAX_TOKEN_LEN: usize = 1024;

/// Tag for the element type stored alongside a vector on disk.
///
/// Only `F32` is implemented today; the discriminant space is reserved so
/// a future quantized or half-precision variant can be added without
/// changing the wire format of existing indexes (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ElementType {
    /// 32-bit IEEE-754 float, the only variant this crate implements.
    F32 = 0,
}

impl ElementType {
    /// Decodes a `vector_type` tag read from disk.
    #[must_use]
    pub fn from_u16(tag: u16) -> Option<Self> {
        match tag {
            0 => Some(Self::F32),
            _ => None,
        }
    }

    /// Encodes this tag for storage on disk.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// A dense, typed numeric vector.
///
/// Invariant: `1 <= elements.len() <= MAX_DIMENSION` for any `Vector`
/// produced by [`parse_text`] or [`parse_blob`].
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    element_type: ElementType,
    elements: Vec<f32>,
}

impl Vector {
    /// Builds a vector directly from already-validated elements.
    ///
    /// # Panics
    ///
    /// Panics if `elements` is empty or exceeds [`MAX_DIMENSION`]; callers
    /// constructing vectors from untrusted input must go through
    /// [`parse_text`] or [`parse_blob`] instead.
    #[must_use]
    pub fn new(elements: Vec<f32>) -> Self {
        assert!(!elements.is_empty(), "vector must have at least one element");
        assert!(
            elements.len() <= MAX_DIMENSION,
            "vector dimension exceeds {MAX_DIMENSION}"
        );
        Self {
            element_type: ElementType::F32,
            elements,
        }
    }

    /// The element type tag.
    #[must_use]
    pub const fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// The raw element slice.
    #[must_use]
    pub fn elements(&self) -> &[f32] {
        &self.elements
    }

    /// Number of elements (the "dimension").
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.elements.len()
    }

    /// Cosine distance `1 - (u.v)/(|u|*|v|)` (spec §3).
    ///
    /// Dot product and both norms accumulate in `f32` (spec §4.6); the
    /// final ratio is computed in `f64` so the returned distance has
    /// enough precision for ranking ties. When either operand is the zero
    /// vector the division is `0.0/0.0`, which IEEE-754 defines as `NaN`,
    /// exactly the "further than any finite candidate" sentinel the spec
    /// requires, with no special-casing needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `self.dimension() != other.dimension()`.
    pub fn cosine(&self, other: &Self) -> Result<f64, Error> {
        if self.elements.len() != other.elements.len() {
            return Err(Error::DimensionMismatch {
                expected: self.elements.len(),
                actual: other.elements.len(),
            });
        }

        let mut dot: f32 = 0.0;
        let mut norm_a: f32 = 0.0;
        let mut norm_b: f32 = 0.0;
        for (a, b) in self.elements.iter().zip(other.elements.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let cosine_sim = f64::from(dot) / (f64::from(norm_a.sqrt()) * f64::from(norm_b.sqrt()));
        Ok(1.0 - cosine_sim)
    }

    /// Serializes this vector to its blob wire form: `u32` length followed
    /// by `length` little-endian `f32` values (spec §3, §4.2).
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(blob_len(self.elements.len()));
        out.extend_from_slice(&(self.elements.len() as u32).to_le_bytes());
        for &e in &self.elements {
            out.extend_from_slice(&e.to_le_bytes());
        }
        out
    }

    /// Renders this vector in the textual grammar `'[' number (',' number)* ']'`.
    ///
    /// Integer-valued components print as decimal integers; all other
    /// components print with 6-digit exponential notation (`%.6e`), as
    /// specified in §4.2.
    #[must_use]
    pub fn format_text(&self) -> String {
        let mut out = String::from("[");
        for (i, &e) in self.elements.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&format_component(e));
        }
        out.push(']');
        out
    }
}

/// Number of bytes a blob of `length` `f32` elements occupies (spec §3).
#[must_use]
pub fn blob_len(length: usize) -> usize {
    4 + 4 * length
}

/// Formats a single component the way [`Vector::format_text`] requires.
fn format_component(v: f32) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let as_int = v as i64;
        as_int.to_string()
    } else {
        format_exp6(v)
    }
}

/// Formats `v` as C's `printf("%.6e", v)` would: six digits after the
/// decimal point, a lower-case `e`, an explicit sign, and at least two
/// exponent digits.
///
/// Callers must filter out non-finite `v` first ([`format_component`] does);
/// `{:.6e}` renders those as `"inf"`/`"-inf"`/`"NaN"`, which contain no `e`.
fn format_exp6(v: f32) -> String {
    // Rust's `{:.6e}` gives mantissa.dddddd + "e" + exponent, but without
    // the leading sign or zero-padding `%.6e` requires, so both are
    // reconstructed here.
    let rust_form = format!("{v:.6e}");
    let (mantissa, exponent) = rust_form
        .split_once('e')
        .expect("LowerExp always emits an 'e'");
    let exp_value: i32 = exponent.parse().expect("exponent is a valid integer");
    format!("{mantissa}e{:+03}", exp_value)
}

/// Parses the textual grammar `'[' (number (',' number)*)? ']'` (spec §4.2).
///
/// Whitespace is trimmed from the whole input before matching brackets.
/// Any other shape, an unparseable number, a number token longer than
/// 1024 characters, or more than [`MAX_DIMENSION`] elements is rejected
/// with [`Error::InvalidText`].
pub fn parse_text(s: &str) -> Result<Vector, Error> {
    let trimmed = s.trim();
    let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        return Err(Error::invalid_text(trimmed, "expected '[' ... ']'"));
    };

    let inner = inner.trim();
    if inner.is_empty() {
        return Err(Error::invalid_text(s, "vector must have at least one element"));
    }

    let mut elements = Vec::new();
    for token in inner.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::invalid_text(s, "empty number token"));
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(Error::invalid_text(token, "number token too long"));
        }
        let value: f32 = token
            .parse()
            .map_err(|_| Error::invalid_text(token, "not a valid number"))?;
        elements.push(value);
        if elements.len() > MAX_DIMENSION {
            return Err(Error::invalid_text(s, "too many components"));
        }
    }

    Ok(Vector::new(elements))
}

/// Parses the blob wire form, validating length and truncation per spec §4.2.
pub fn parse_blob(b: &[u8]) -> Result<Vector, Error> {
    let length = codec::read_u32(b, 0)
        .ok_or_else(|| Error::InvalidBlob("blob shorter than 4-byte length prefix".to_string()))?
        as usize;

    if length == 0 {
        return Err(Error::InvalidBlob("vector must have at least one element".to_string()));
    }
    if length > MAX_DIMENSION {
        return Err(Error::InvalidBlob(format!(
            "declared length {length} exceeds maximum {MAX_DIMENSION}"
        )));
    }
    if b.len() < blob_len(length) {
        return Err(Error::InvalidBlob(format!(
            "truncated blob: need {} bytes, have {}",
            blob_len(length),
            b.len()
        )));
    }

    let mut elements = Vec::with_capacity(length);
    for i in 0..length {
        let offset = 4 + 4 * i;
        let value = codec::read_f32(b, offset)
            .ok_or_else(|| Error::InvalidBlob("truncated element".to_string()))?;
        elements.push(value);
    }

    Ok(Vector::new(elements))
}

//! Scalar functions exposed to the host's SQL layer (spec §6): `vector`,
//! `vector_extract`, `vector_distance_cos`. The index itself is exercised
//! through [`crate::cursor::IndexCursor`]; these three functions are the
//! surface by which ordinary SQL statements manipulate vector values
//! outside the index.

use crate::error::Error;
use crate::vector::{self, Vector};

/// Parses `input` as either the textual grammar (`'[' ... ']'`) or the
/// canonical blob form, whichever it looks like. Hosts that pass a SQL
/// `TEXT` value give UTF-8 text; hosts that pass a `BLOB` value give the
/// wire form directly; `vector_extract` and `vector_distance_cos` accept
/// both (spec §6: "`vector_extract(blob_or_text)`").
fn parse_blob_or_text(input: &[u8]) -> Result<Vector, Error> {
    if let Ok(s) = std::str::from_utf8(input) {
        if s.trim_start().starts_with('[') {
            return vector::parse_text(s);
        }
    }
    vector::parse_blob(input)
}

/// `vector(text) -> blob` (spec §6): parses the textual grammar and
/// returns the canonical blob form.
///
/// # Errors
///
/// Returns [`Error::InvalidText`] if `text` does not match the grammar.
pub fn vector(text: &str) -> Result<Vec<u8>, Error> {
    Ok(vector::parse_text(text)?.serialize())
}

/// `vector_extract(blob_or_text) -> text` (spec §6): returns the canonical
/// text form of a blob or text input.
///
/// # Errors
///
/// Returns [`Error::InvalidBlob`] or [`Error::InvalidText`] if `input`
/// matches neither shape.
pub fn vector_extract(input: &[u8]) -> Result<String, Error> {
    Ok(parse_blob_or_text(input)?.format_text())
}

/// `vector_distance_cos(a, b) -> double` (spec §6): cosine distance
/// between two blob-or-text vector values.
///
/// # Errors
///
/// Returns [`Error::DimensionMismatch`] if `a` and `b` have different
/// dimensions, or [`Error::InvalidBlob`]/[`Error::InvalidText`] if either
/// input is malformed.
pub fn vector_distance_cos(a: &[u8], b: &[u8]) -> Result<f64, Error> {
    let va = parse_blob_or_text(a)?;
    let vb = parse_blob_or_text(b)?;
    va.cosine(&vb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_vector_parses_text_to_canonical_blob() {
        let blob = vector("[1,2,3]").unwrap();
        assert_eq!(vector::parse_blob(&blob).unwrap().elements(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn s2_extract_mixes_integer_and_exponential() {
        let blob = vector("[1,2.5,3]").unwrap();
        assert_eq!(vector_extract(&blob).unwrap(), "[1,2.500000e+00,3]");
    }

    #[test]
    fn s3_distance_examples() {
        let d1 = vector_distance_cos(b"[1,0,0]", b"[0,1,0]").unwrap();
        assert!((d1 - 1.0).abs() < 1e-9);

        let d2 = vector_distance_cos(b"[1,2,3]", b"[1,2,3]").unwrap();
        assert!(d2.abs() < 1e-7);
    }

    #[test]
    fn s4_dimension_mismatch() {
        let result = vector_distance_cos(b"[1,2]", b"[1,2,3]");
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn vector_extract_accepts_blob_input() {
        let blob = vector("[1,2,3]").unwrap();
        assert_eq!(vector_extract(&blob).unwrap(), "[1,2,3]");
    }
}

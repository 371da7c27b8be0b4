//! Result-set comparison by cardinality and content digest.
//!
//! The signature folds rows in the order the database returned them, so two
//! result sets holding the same rows in a different order do not match.
//! Queries without a deterministic `ORDER BY` can therefore report
//! `same_signature = false` while being equivalent.

use crate::model::Row;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Equivalence {
    pub same_rowcount: bool,
    pub same_signature: bool,
}

/// Hex SHA-256 over the JSON serialisation of every row, newline separated.
/// Numbers serialise in their shortest round-trip form; every other value is
/// already a JSON string or literal, so the encoding is stable.
pub fn signature(rows: &[Row]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        let encoded = serde_json::to_string(row).unwrap_or_default();
        hasher.update(encoded.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

pub fn equivalent(original: &[Row], rewritten: &[Row]) -> Equivalence {
    Equivalence {
        same_rowcount: original.len() == rewritten.len(),
        same_signature: signature(original) == signature(rewritten),
    }
}

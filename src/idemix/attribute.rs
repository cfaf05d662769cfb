use std::collections::HashSet;

use curve25519_dalek::Scalar;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ProtocolViolation, Result},
    hash::hash_labeled,
};

/// A credential attribute value.
///
/// In an issuance vector [Attribute::Hidden] marks a slot the issuer assigns no value to. In a
/// disclosure policy it marks a slot the presentation keeps hidden.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    Hidden,
    Bytes(Vec<u8>),
    Int(i64),
}

impl Attribute {
    pub fn is_hidden(&self) -> bool {
        matches!(self, Attribute::Hidden)
    }

    /// Scalar the attribute is MAC'd and proven as. Hidden slots encode as zero.
    pub fn encode(&self) -> Scalar {
        match self {
            Attribute::Hidden => Scalar::ZERO,
            Attribute::Int(value) if *value >= 0 => Scalar::from(value.unsigned_abs()),
            Attribute::Int(value) => -Scalar::from(value.unsigned_abs()),
            Attribute::Bytes(bytes) => hash_labeled("bccsp::idemix::attribute::bytes", &[bytes]),
        }
    }
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Attribute::Int(value)
    }
}

impl From<&[u8]> for Attribute {
    fn from(value: &[u8]) -> Self {
        Attribute::Bytes(value.to_vec())
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::Bytes(value.as_bytes().to_vec())
    }
}

/// Attribute names must be non-empty and unique.
pub(crate) fn check_schema(names: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if name.is_empty() {
            return Err(ProtocolViolation::InvalidSchema("empty attribute name".into()).into());
        }
        if !seen.insert(name.as_str()) {
            return Err(
                ProtocolViolation::InvalidSchema(format!("duplicate attribute name [{name}]"))
                    .into(),
            );
        }
    }
    Ok(())
}

/// Check an issuance vector against a schema of `expected` attributes.
pub(crate) fn check_issuance_vector(expected: usize, attributes: &[Attribute]) -> Result<()> {
    match attributes.len() {
        actual if actual < expected => Err(ProtocolViolation::MissingAttributeValue(actual).into()),
        actual if actual > expected => {
            Err(ProtocolViolation::AttributeCountMismatch { expected, actual }.into())
        }
        _ => Ok(()),
    }
}

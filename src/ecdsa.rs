//! Low-S canonicalization of ECDSA signatures and the DER codec for `(R, S)` pairs.
//!
//! An ECDSA signature `(R, S)` is equally valid as `(R, N - S)`, where `N` is the order of the
//! curve. Accepting both forms makes signatures malleable, so signers emit the form with
//! `S <= N / 2` and verifiers reject the other one.

use std::sync::OnceLock;

use der::{
    asn1::Int, Decode, DecodeValue, Encode, EncodeValue, ErrorKind, Header, Length, Reader,
    Sequence, Writer,
};
use num_bigint::{BigInt, Sign};
use num_traits::Signed;

use crate::error::{Error, Result, SignatureEncodingError};

// Group orders, big-endian.
const P224_ORDER: [u8; 28] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x16, 0xa2,
    0xe0, 0xb8, 0xf0, 0x3e, 0x13, 0xdd, 0x29, 0x45,
    0x5c, 0x5c, 0x2a, 0x3d,
];

const P256_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84,
    0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63, 0x25, 0x51,
];

const P384_ORDER: [u8; 48] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xc7, 0x63, 0x4d, 0x81, 0xf4, 0x37, 0x2d, 0xdf,
    0x58, 0x1a, 0x0d, 0xb2, 0x48, 0xb0, 0xa7, 0x7a,
    0xec, 0xec, 0x19, 0x6a, 0xcc, 0xc5, 0x29, 0x73,
];

const P521_ORDER: [u8; 66] = [
    0x01, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xfa, 0x51, 0x86, 0x87, 0x83, 0xbf, 0x2f,
    0x96, 0x6b, 0x7f, 0xcc, 0x01, 0x48, 0xf7, 0x09,
    0xa5, 0xd0, 0x3b, 0xb5, 0xc9, 0xb8, 0x89, 0x9c,
    0x47, 0xae, 0xbb, 0x6f, 0xb7, 0x1e, 0x91, 0x38,
    0x64, 0x09,
];

const SECP256K1_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b,
    0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Curve names accepted by the canonicalizer, with the order of each.
static CURVES: [(&[&str], &[u8]); 5] = [
    (&["P-224", "secp224r1"], &P224_ORDER),
    (&["P-256", "secp256r1", "prime256v1"], &P256_ORDER),
    (&["P-384", "secp384r1"], &P384_ORDER),
    (&["P-521", "secp521r1"], &P521_ORDER),
    (&["secp256k1"], &SECP256K1_ORDER),
];

struct CurveOrder {
    names: &'static [&'static str],
    n: BigInt,
    half: BigInt,
}

fn curve_orders() -> &'static [CurveOrder] {
    static ORDERS: OnceLock<Vec<CurveOrder>> = OnceLock::new();
    ORDERS.get_or_init(|| {
        CURVES
            .iter()
            .map(|&(names, order)| {
                let n = BigInt::from_bytes_be(Sign::Plus, order);
                CurveOrder {
                    names,
                    half: &n >> 1,
                    n,
                }
            })
            .collect()
    })
}

fn lookup_curve(curve: &str) -> Result<&'static CurveOrder> {
    curve_orders()
        .iter()
        .find(|c| c.names.iter().any(|name| *name == curve))
        .ok_or_else(|| Error::CurveNotRecognized(curve.to_string()))
}

/// Anything that can name the elliptic curve it lives on, such as an ECDSA public key.
pub trait NamedCurve {
    fn curve_name(&self) -> &str;
}

impl NamedCurve for str {
    fn curve_name(&self) -> &str {
        self
    }
}

/// Returns the group order `N` of the named curve.
pub fn curve_order(curve: &str) -> Result<BigInt> {
    Ok(lookup_curve(curve)?.n.clone())
}

/// Returns `N >> 1` for the named curve.
pub fn curve_half_order(curve: &str) -> Result<BigInt> {
    Ok(lookup_curve(curve)?.half.clone())
}

pub fn is_low_s<K: NamedCurve + ?Sized>(key: &K, s: &BigInt) -> Result<bool> {
    Ok(s <= &lookup_curve(key.curve_name())?.half)
}

/// Map `s` to `N - s` when it is above the half order. Low values are returned unchanged.
///
/// Values of `N` or more have no low-S counterpart and are rejected.
pub fn to_low_s<K: NamedCurve + ?Sized>(key: &K, s: &BigInt) -> Result<BigInt> {
    let order = lookup_curve(key.curve_name())?;
    if s >= &order.n {
        return Err(SignatureEncodingError::SOutOfRange.into());
    }
    match s > &order.half {
        true => Ok(&order.n - s),
        false => Ok(s.clone()),
    }
}

/// Decode a DER signature, canonicalize its `S` value and re-encode it.
pub fn signature_to_low_s<K: NamedCurve + ?Sized>(key: &K, signature: &[u8]) -> Result<Vec<u8>> {
    let (r, s) = unmarshal_signature(signature)?;
    let s = to_low_s(key, &s)?;
    marshal_signature(&r, &s)
}

/// Encode `(r, s)` as a DER `SEQUENCE { INTEGER r, INTEGER s }`.
///
/// Any integers are accepted, including zero and negative values that
/// [unmarshal_signature] rejects.
pub fn marshal_signature(r: &BigInt, s: &BigInt) -> Result<Vec<u8>> {
    let signature = DerSignature {
        r: to_int(r)?,
        s: to_int(s)?,
    };
    signature
        .to_der()
        .map_err(|e| Error::Encoding(format!("signature: {e}")))
}

/// Decode a DER signature, requiring both `R` and `S` to be strictly positive.
///
/// Errors are reported in order: malformed encoding, then `R <= 0`, then `S <= 0`.
pub fn unmarshal_signature(raw: &[u8]) -> Result<(BigInt, BigInt)> {
    let signature = DerSignature::from_der(raw).map_err(malformed)?;
    let r = BigInt::from_signed_bytes_be(signature.r.as_bytes());
    let s = BigInt::from_signed_bytes_be(signature.s.as_bytes());
    if !r.is_positive() {
        return Err(SignatureEncodingError::NonPositiveR.into());
    }
    if !s.is_positive() {
        return Err(SignatureEncodingError::NonPositiveS.into());
    }
    Ok((r, s))
}

struct DerSignature {
    r: Int,
    s: Int,
}

impl<'a> DecodeValue<'a> for DerSignature {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        reader.read_nested(header.length, |reader| {
            Ok(Self {
                r: reader.decode()?,
                s: reader.decode()?,
            })
        })
    }
}

impl EncodeValue for DerSignature {
    fn value_len(&self) -> der::Result<Length> {
        self.r.encoded_len()? + self.s.encoded_len()?
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        self.r.encode(writer)?;
        self.s.encode(writer)
    }
}

impl<'a> Sequence<'a> for DerSignature {}

fn to_int(value: &BigInt) -> Result<Int> {
    Int::new(&value.to_signed_bytes_be())
        .map_err(|e| Error::Encoding(format!("signature component: {e}")))
}

fn malformed(err: der::Error) -> SignatureEncodingError {
    SignatureEncodingError::Malformed(match err.kind() {
        ErrorKind::Incomplete { .. } => "unexpected end of input",
        ErrorKind::TrailingData { .. } => "trailing data",
        ErrorKind::TagUnexpected { .. } => "unexpected tag",
        ErrorKind::Noncanonical { .. } => "non-canonical encoding",
        ErrorKind::IndefiniteLength => "indefinite length",
        _ => "invalid encoding",
    })
}

#[cfg(test)]
mod test {
    use num_bigint::{BigInt, Sign};
    use proptest::prelude::*;

    use super::{
        curve_half_order, curve_order, is_low_s, lookup_curve, marshal_signature,
        signature_to_low_s, to_low_s, unmarshal_signature, NamedCurve,
    };
    use crate::error::{Error, SignatureEncodingError};

    const CURVE_NAMES: [&str; 10] = [
        "P-224",
        "secp224r1",
        "P-256",
        "secp256r1",
        "prime256v1",
        "P-384",
        "secp384r1",
        "P-521",
        "secp521r1",
        "secp256k1",
    ];

    struct TestKey(&'static str);

    impl NamedCurve for TestKey {
        fn curve_name(&self) -> &str {
            self.0
        }
    }

    fn int(bytes: &[u8]) -> BigInt {
        BigInt::from_bytes_be(Sign::Plus, bytes)
    }

    #[test]
    fn encode_decode_one_one() {
        let der = marshal_signature(&BigInt::from(1), &BigInt::from(1)).unwrap();
        assert_eq!(der, [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]);
        let (r, s) = unmarshal_signature(&der).unwrap();
        assert_eq!(r, BigInt::from(1));
        assert_eq!(s, BigInt::from(1));
    }

    #[test]
    fn non_positive_components() {
        let der = marshal_signature(&BigInt::from(-1), &BigInt::from(1)).unwrap();
        let Err(Error::InvalidSignatureEncoding(SignatureEncodingError::NonPositiveR)) =
            unmarshal_signature(&der)
        else {
            panic!("negative R was accepted");
        };

        // R is checked before S.
        let der = marshal_signature(&BigInt::from(0), &BigInt::from(-5)).unwrap();
        let Err(Error::InvalidSignatureEncoding(SignatureEncodingError::NonPositiveR)) =
            unmarshal_signature(&der)
        else {
            panic!("zero R was accepted");
        };

        for s in [0, -1] {
            let der = marshal_signature(&BigInt::from(1), &BigInt::from(s)).unwrap();
            let Err(Error::InvalidSignatureEncoding(SignatureEncodingError::NonPositiveS)) =
                unmarshal_signature(&der)
            else {
                panic!("non-positive S was accepted");
            };
        }
    }

    #[test]
    fn error_messages() {
        let der = marshal_signature(&BigInt::from(-1), &BigInt::from(1)).unwrap();
        let err = unmarshal_signature(&der).unwrap_err();
        assert!(err.to_string().contains("R must be larger than 0"));

        let der = marshal_signature(&BigInt::from(1), &BigInt::from(0)).unwrap();
        let err = unmarshal_signature(&der).unwrap_err();
        assert!(err.to_string().contains("S must be larger than 0"));

        let err = unmarshal_signature(&[0x01, 0x02]).unwrap_err();
        assert!(err.to_string().starts_with("failed unmarshalling signature"));
    }

    #[test]
    fn malformed_encodings() {
        let cases: &[&[u8]] = &[
            &[],
            &[0x30],
            &[0x31, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01],
            // Truncated content.
            &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01],
            // Trailing data after the sequence.
            &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01, 0x00],
            // Trailing data inside the sequence.
            &[0x30, 0x07, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01, 0x00],
            // A single integer.
            &[0x30, 0x03, 0x02, 0x01, 0x01],
            // Empty integer.
            &[0x30, 0x05, 0x02, 0x00, 0x02, 0x01, 0x01],
            // Non-minimal integer.
            &[0x30, 0x07, 0x02, 0x02, 0x00, 0x01, 0x02, 0x01, 0x01],
            // Indefinite length.
            &[0x30, 0x80, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00],
            // Long form for a short length.
            &[0x30, 0x81, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01],
        ];
        for raw in cases {
            let Err(Error::InvalidSignatureEncoding(SignatureEncodingError::Malformed(_))) =
                unmarshal_signature(raw)
            else {
                panic!("malformed encoding {} was accepted", hex::encode(raw));
            };
        }
    }

    #[test]
    fn long_form_lengths() {
        // P-521 components push the sequence length past 127 bytes.
        let n = curve_order("P-521").unwrap();
        let r = &n - 1;
        let s = &n - 2;
        let der = marshal_signature(&r, &s).unwrap();
        assert_eq!(der[1], 0x81);
        assert_eq!(unmarshal_signature(&der).unwrap(), (r, s));
    }

    #[test]
    fn unknown_curve() {
        let Err(Error::CurveNotRecognized(name)) = is_low_s("P-999", &BigInt::from(1)) else {
            panic!("unknown curve was accepted");
        };
        assert_eq!(name, "P-999");
        let Err(Error::CurveNotRecognized(_)) = to_low_s(&TestKey("ed25519"), &BigInt::from(1))
        else {
            panic!("unknown curve was accepted");
        };
        let Err(Error::CurveNotRecognized(_)) = curve_half_order("brainpoolP256r1") else {
            panic!("unknown curve was accepted");
        };
    }

    #[test]
    fn half_order_boundary() {
        for name in CURVE_NAMES {
            let half = curve_half_order(name).unwrap();
            let n = curve_order(name).unwrap();
            assert_eq!(&half * 2 + 1, n, "{name} order is odd");
            assert!(is_low_s(name, &half).unwrap());
            assert!(!is_low_s(name, &(&half + 1)).unwrap());
            assert_eq!(to_low_s(name, &(&half + 1)).unwrap(), half);
        }
    }

    #[test]
    fn s_at_or_above_order_is_rejected() {
        for name in CURVE_NAMES {
            let n = curve_order(name).unwrap();
            for s in [n.clone(), &n + 1] {
                let der = marshal_signature(&BigInt::from(1), &s).unwrap();
                let Err(Error::InvalidSignatureEncoding(SignatureEncodingError::SOutOfRange)) =
                    signature_to_low_s(name, &der)
                else {
                    panic!("{name}: S >= N was canonicalized");
                };
                let Err(Error::InvalidSignatureEncoding(SignatureEncodingError::SOutOfRange)) =
                    to_low_s(name, &s)
                else {
                    panic!("{name}: S >= N was mapped");
                };
            }
            let top = marshal_signature(&BigInt::from(1), &(&n - 1)).unwrap();
            let low = signature_to_low_s(name, &top).unwrap();
            assert_eq!(unmarshal_signature(&low).unwrap().1, BigInt::from(1));
        }
    }

    #[test]
    fn aliases_share_orders() {
        assert_eq!(
            curve_half_order("P-256").unwrap(),
            curve_half_order("prime256v1").unwrap()
        );
        assert_eq!(
            curve_half_order("secp384r1").unwrap(),
            curve_half_order("P-384").unwrap()
        );
    }

    proptest! {
        #[test]
        fn high_s_is_flipped(idx in 0..CURVE_NAMES.len(), bytes in prop::collection::vec(any::<u8>(), 1..72)) {
            let curve = TestKey(CURVE_NAMES[idx]);
            let order = lookup_curve(curve.0).unwrap();
            // half < s < n
            let s = &order.half + 1 + int(&bytes) % (&order.n - &order.half - 1);

            prop_assert!(!is_low_s(&curve, &s).unwrap());
            let low = to_low_s(&curve, &s).unwrap();
            prop_assert_eq!(&low, &(&order.n - &s));
            prop_assert!(is_low_s(&curve, &low).unwrap());
        }

        #[test]
        fn low_s_is_unchanged(idx in 0..CURVE_NAMES.len(), bytes in prop::collection::vec(any::<u8>(), 1..72)) {
            let curve = CURVE_NAMES[idx];
            let half = curve_half_order(curve).unwrap();
            // 1 <= s <= half
            let s = int(&bytes) % &half + 1;

            prop_assert!(is_low_s(curve, &s).unwrap());
            prop_assert_eq!(to_low_s(curve, &s).unwrap(), s);
        }

        #[test]
        fn marshal_unmarshal(r in prop::collection::vec(any::<u8>(), 1..80), s in prop::collection::vec(any::<u8>(), 1..80)) {
            let r = int(&r) + 1;
            let s = int(&s) + 1;
            let der = marshal_signature(&r, &s).unwrap();
            prop_assert_eq!(unmarshal_signature(&der).unwrap(), (r, s));
        }

        #[test]
        fn signature_to_low_s_is_idempotent(idx in 0..CURVE_NAMES.len(), r in prop::collection::vec(any::<u8>(), 1..66), s in prop::collection::vec(any::<u8>(), 1..66)) {
            let curve = CURVE_NAMES[idx];
            let n = curve_order(curve).unwrap();
            let r = int(&r) % (&n - 1) + 1;
            let s = int(&s) % (&n - 1) + 1;

            let once = signature_to_low_s(curve, &marshal_signature(&r, &s).unwrap()).unwrap();
            let twice = signature_to_low_s(curve, &once).unwrap();
            prop_assert_eq!(&once, &twice);
            let (_, low) = unmarshal_signature(&once).unwrap();
            prop_assert!(is_low_s(curve, &low).unwrap());
        }
    }
}

//! The Plutus data model and its CBOR framing.
//!
//! [`PlutusData`] is the untyped tree every datum and redeemer passes
//! through. Encoding follows the conventions of the off-chain library the
//! validators were tested against, so bytes match what that library emits:
//!
//! - constructor index `i` uses tag `121 + i` (i ≤ 6), `1280 + i - 7`
//!   (i ≤ 127), or tag 102 wrapping `[i, fields]`;
//! - non-empty lists and constructor fields are indefinite-length arrays,
//!   empty ones are definite (`0x80`);
//! - byte strings longer than 64 bytes are split into 64-byte chunks;
//! - integers outside the CBOR native range use bignum tags 2/3.
//!
//! Decoding accepts both definite and indefinite framing everywhere.

use minicbor::data::{Tag, Type};
use minicbor::decode::{self, Decoder};
use minicbor::encode::{self, Encoder, Write};
use minicbor::{Decode, Encode};

use super::CodecError;

const COMPACT_TAG_BASE: u64 = 121;
const COMPACT_TAG_MAX_INDEX: u64 = 6;
const EXTENDED_TAG_BASE: u64 = 1280;
const EXTENDED_TAG_MAX_INDEX: u64 = 127;
const GENERAL_TAG: u64 = 102;

const POS_BIGNUM_TAG: u64 = 2;
const NEG_BIGNUM_TAG: u64 = 3;

/// Ledger limit on a single byte-string chunk.
const BYTES_CHUNK_SIZE: usize = 64;

/// Nesting limit while decoding. The validators never nest deeper than
/// a handful of levels; this only bounds hostile input.
const MAX_DEPTH: usize = 64;

/// Untyped Plutus data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlutusData {
    /// Constructor application.
    Constr { index: u64, fields: Vec<PlutusData> },
    /// Association list.
    Map(Vec<(PlutusData, PlutusData)>),
    /// Arbitrary-precision integer, limited to `i128` here.
    Integer(i128),
    /// Byte string.
    Bytes(Vec<u8>),
    /// List.
    List(Vec<PlutusData>),
}

impl PlutusData {
    fn kind(&self) -> &'static str {
        match self {
            PlutusData::Constr { .. } => "constructor",
            PlutusData::Map(_) => "map",
            PlutusData::Integer(_) => "integer",
            PlutusData::Bytes(_) => "bytes",
            PlutusData::List(_) => "list",
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn encode_items<C, W: Write>(
    items: &[PlutusData],
    e: &mut Encoder<W>,
    ctx: &mut C,
) -> Result<(), encode::Error<W::Error>> {
    if items.is_empty() {
        e.array(0)?;
        return Ok(());
    }
    e.begin_array()?;
    for item in items {
        item.encode(e, ctx)?;
    }
    e.end()?;
    Ok(())
}

fn encode_bytes<W: Write>(raw: &[u8], e: &mut Encoder<W>) -> Result<(), encode::Error<W::Error>> {
    if raw.len() <= BYTES_CHUNK_SIZE {
        e.bytes(raw)?;
        return Ok(());
    }
    e.begin_bytes()?;
    for chunk in raw.chunks(BYTES_CHUNK_SIZE) {
        e.bytes(chunk)?;
    }
    e.end()?;
    Ok(())
}

/// Minimal big-endian magnitude of `n`.
fn magnitude_bytes(n: u128) -> Vec<u8> {
    let be = n.to_be_bytes();
    let first = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
    be[first..].to_vec()
}

impl<C> Encode<C> for PlutusData {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        match self {
            PlutusData::Constr { index, fields } => match *index {
                i @ 0..=COMPACT_TAG_MAX_INDEX => {
                    e.tag(Tag::Unassigned(COMPACT_TAG_BASE + i))?;
                    encode_items(fields, e, ctx)
                }
                i @ 7..=EXTENDED_TAG_MAX_INDEX => {
                    e.tag(Tag::Unassigned(EXTENDED_TAG_BASE + i - 7))?;
                    encode_items(fields, e, ctx)
                }
                i => {
                    e.tag(Tag::Unassigned(GENERAL_TAG))?;
                    e.array(2)?;
                    e.u64(i)?;
                    encode_items(fields, e, ctx)
                }
            },
            PlutusData::Map(entries) => {
                e.map(entries.len() as u64)?;
                for (k, v) in entries {
                    k.encode(e, ctx)?;
                    v.encode(e, ctx)?;
                }
                Ok(())
            }
            PlutusData::Integer(n) => match minicbor::data::Int::try_from(*n) {
                Ok(int) => {
                    e.int(int)?;
                    Ok(())
                }
                Err(_) if *n >= 0 => {
                    e.tag(Tag::PosBignum)?;
                    encode_bytes(&magnitude_bytes(*n as u128), e)
                }
                Err(_) => {
                    // CBOR negative bignums carry -1 - n.
                    e.tag(Tag::NegBignum)?;
                    encode_bytes(&magnitude_bytes((-1 - *n) as u128), e)
                }
            },
            PlutusData::Bytes(raw) => encode_bytes(raw, e),
            PlutusData::List(items) => encode_items(items, e, ctx),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn tag_number(tag: Tag) -> Option<u64> {
    match tag {
        Tag::PosBignum => Some(POS_BIGNUM_TAG),
        Tag::NegBignum => Some(NEG_BIGNUM_TAG),
        Tag::Unassigned(n) => Some(n),
        _ => None,
    }
}

fn decode_bytes(d: &mut Decoder<'_>) -> Result<Vec<u8>, decode::Error> {
    let mut out = Vec::new();
    for chunk in d.bytes_iter()? {
        out.extend_from_slice(chunk?);
    }
    Ok(out)
}

/// Reads a definite or indefinite array header followed by its items.
fn decode_items(d: &mut Decoder<'_>, depth: usize) -> Result<Vec<PlutusData>, decode::Error> {
    match d.array()? {
        Some(len) => (0..len).map(|_| decode_at(d, depth + 1)).collect(),
        None => {
            let mut items = Vec::new();
            while d.datatype()? != Type::Break {
                items.push(decode_at(d, depth + 1)?);
            }
            // Consume the break byte.
            d.set_position(d.position() + 1);
            Ok(items)
        }
    }
}

fn decode_map(
    d: &mut Decoder<'_>,
    depth: usize,
) -> Result<Vec<(PlutusData, PlutusData)>, decode::Error> {
    let mut entries = Vec::new();
    match d.map()? {
        Some(len) => {
            for _ in 0..len {
                let k = decode_at(d, depth + 1)?;
                let v = decode_at(d, depth + 1)?;
                entries.push((k, v));
            }
        }
        None => {
            while d.datatype()? != Type::Break {
                let k = decode_at(d, depth + 1)?;
                let v = decode_at(d, depth + 1)?;
                entries.push((k, v));
            }
            d.set_position(d.position() + 1);
        }
    }
    Ok(entries)
}

fn bignum(d: &mut Decoder<'_>, negative: bool) -> Result<PlutusData, decode::Error> {
    let raw = decode_bytes(d)?;
    let significant: Vec<u8> = raw.into_iter().skip_while(|b| *b == 0).collect();
    if significant.len() > 16 {
        return Err(decode::Error::message("bignum exceeds 128 bits"));
    }
    let mut be = [0u8; 16];
    be[16 - significant.len()..].copy_from_slice(&significant);
    let magnitude = u128::from_be_bytes(be);
    let value = if negative {
        i128::try_from(magnitude).ok().map(|m| -1 - m)
    } else {
        i128::try_from(magnitude).ok()
    };
    value
        .map(PlutusData::Integer)
        .ok_or_else(|| decode::Error::message("bignum exceeds 128 bits"))
}

fn decode_at(d: &mut Decoder<'_>, depth: usize) -> Result<PlutusData, decode::Error> {
    if depth > MAX_DEPTH {
        return Err(decode::Error::message("plutus data nested too deeply"));
    }

    match d.datatype()? {
        Type::U8
        | Type::U16
        | Type::U32
        | Type::U64
        | Type::I8
        | Type::I16
        | Type::I32
        | Type::I64
        | Type::Int => Ok(PlutusData::Integer(i128::from(d.int()?))),
        Type::Bytes | Type::BytesIndef => Ok(PlutusData::Bytes(decode_bytes(d)?)),
        Type::Array | Type::ArrayIndef => Ok(PlutusData::List(decode_items(d, depth)?)),
        Type::Map | Type::MapIndef => Ok(PlutusData::Map(decode_map(d, depth)?)),
        Type::Tag => {
            let position = d.position();
            let tag = tag_number(d.tag()?)
                .ok_or_else(|| decode::Error::message("unsupported tag").at(position))?;
            match tag {
                POS_BIGNUM_TAG => bignum(d, false),
                NEG_BIGNUM_TAG => bignum(d, true),
                t if (COMPACT_TAG_BASE..=COMPACT_TAG_BASE + COMPACT_TAG_MAX_INDEX).contains(&t) => {
                    Ok(PlutusData::Constr {
                        index: t - COMPACT_TAG_BASE,
                        fields: decode_items(d, depth)?,
                    })
                }
                t if (EXTENDED_TAG_BASE..=EXTENDED_TAG_BASE + EXTENDED_TAG_MAX_INDEX - 7)
                    .contains(&t) =>
                {
                    Ok(PlutusData::Constr {
                        index: t - EXTENDED_TAG_BASE + 7,
                        fields: decode_items(d, depth)?,
                    })
                }
                GENERAL_TAG => {
                    if d.array()? != Some(2) {
                        return Err(decode::Error::message("tag 102 expects [index, fields]"));
                    }
                    let index = d.u64()?;
                    Ok(PlutusData::Constr {
                        index,
                        fields: decode_items(d, depth)?,
                    })
                }
                other => Err(decode::Error::message(format!("unexpected tag {other}")).at(position)),
            }
        }
        other => Err(decode::Error::type_mismatch(other).with_message("not plutus data")),
    }
}

impl<'b, C> Decode<'b, C> for PlutusData {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        decode_at(d, 0)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Builds a constructor application.
pub fn constr(index: u64, fields: Vec<PlutusData>) -> PlutusData {
    PlutusData::Constr { index, fields }
}

/// Builds a list.
pub fn list(items: Vec<PlutusData>) -> PlutusData {
    PlutusData::List(items)
}

/// Builds a two-element list. Tuples are lists on the wire, never
/// constructors; the validators reject a tagged pair.
pub fn pair(first: PlutusData, second: PlutusData) -> PlutusData {
    PlutusData::List(vec![first, second])
}

/// Builds a byte string.
pub fn bytes(raw: &[u8]) -> PlutusData {
    PlutusData::Bytes(raw.to_vec())
}

/// Builds a byte string from UTF-8 text.
pub fn text(s: &str) -> PlutusData {
    bytes(s.as_bytes())
}

/// Builds a non-negative integer.
pub fn uint(value: u64) -> PlutusData {
    PlutusData::Integer(i128::from(value))
}

// ---------------------------------------------------------------------------
// CBOR
// ---------------------------------------------------------------------------

/// Serializes Plutus data to CBOR bytes.
pub fn to_cbor(data: &PlutusData) -> Result<Vec<u8>, CodecError> {
    minicbor::to_vec(data).map_err(|e| CodecError::Encoding(e.to_string()))
}

/// Parses CBOR bytes into Plutus data, rejecting trailing garbage.
pub fn from_cbor(raw: &[u8], record: &'static str) -> Result<PlutusData, CodecError> {
    let mut decoder = Decoder::new(raw);
    let data: PlutusData = decoder
        .decode()
        .map_err(|e| malformed(record, format!("invalid CBOR: {e}")))?;

    if decoder.position() != raw.len() {
        return Err(malformed(
            record,
            format!("{} trailing bytes", raw.len() - decoder.position()),
        ));
    }

    Ok(data)
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

pub(crate) fn malformed(record: &'static str, reason: impl Into<String>) -> CodecError {
    CodecError::MalformedDatum {
        record,
        reason: reason.into(),
    }
}

/// Reads any constructor, returning its index and fields.
pub fn expect_any_constr<'a>(
    data: &'a PlutusData,
    record: &'static str,
) -> Result<(u64, &'a [PlutusData]), CodecError> {
    match data {
        PlutusData::Constr { index, fields } => Ok((*index, fields.as_slice())),
        other => Err(malformed(
            record,
            format!("expected constructor, found {}", other.kind()),
        )),
    }
}

/// Reads a constructor with a known index and arity.
pub fn expect_constr<'a>(
    data: &'a PlutusData,
    record: &'static str,
    index: u64,
    arity: usize,
) -> Result<&'a [PlutusData], CodecError> {
    let (found, fields) = expect_any_constr(data, record)?;
    if found != index {
        return Err(malformed(
            record,
            format!("expected constructor {index}, found {found}"),
        ));
    }
    expect_arity(fields, record, arity)?;
    Ok(fields)
}

/// Checks a constructor's field count.
pub fn expect_arity(
    fields: &[PlutusData],
    record: &'static str,
    arity: usize,
) -> Result<(), CodecError> {
    if fields.len() != arity {
        return Err(malformed(
            record,
            format!("expected {arity} fields, found {}", fields.len()),
        ));
    }
    Ok(())
}

/// Reads a list.
pub fn expect_list<'a>(
    data: &'a PlutusData,
    record: &'static str,
    field: &str,
) -> Result<&'a [PlutusData], CodecError> {
    match data {
        PlutusData::List(items) => Ok(items.as_slice()),
        other => Err(malformed(
            record,
            format!("{field}: expected list, found {}", other.kind()),
        )),
    }
}

/// Reads a two-element list.
pub fn expect_pair<'a>(
    data: &'a PlutusData,
    record: &'static str,
    field: &str,
) -> Result<(&'a PlutusData, &'a PlutusData), CodecError> {
    match expect_list(data, record, field)? {
        [first, second] => Ok((first, second)),
        items => Err(malformed(
            record,
            format!("{field}: expected pair, found {} elements", items.len()),
        )),
    }
}

/// Reads a byte string.
pub fn expect_bytes<'a>(
    data: &'a PlutusData,
    record: &'static str,
    field: &str,
) -> Result<&'a [u8], CodecError> {
    match data {
        PlutusData::Bytes(raw) => Ok(raw.as_slice()),
        other => Err(malformed(
            record,
            format!("{field}: expected bytes, found {}", other.kind()),
        )),
    }
}

/// Reads a byte string holding UTF-8 text.
pub fn expect_text(
    data: &PlutusData,
    record: &'static str,
    field: &str,
) -> Result<String, CodecError> {
    let raw = expect_bytes(data, record, field)?;
    String::from_utf8(raw.to_vec())
        .map_err(|e| malformed(record, format!("{field}: invalid UTF-8: {e}")))
}

/// Reads a non-negative integer no larger than `max`.
pub fn expect_uint(
    data: &PlutusData,
    record: &'static str,
    field: &str,
    max: u64,
) -> Result<u64, CodecError> {
    let value = match data {
        PlutusData::Integer(n) => *n,
        other => {
            return Err(malformed(
                record,
                format!("{field}: expected integer, found {}", other.kind()),
            ));
        }
    };

    if value < 0 {
        return Err(malformed(record, format!("{field}: negative integer {value}")));
    }
    if value > i128::from(max) {
        return Err(malformed(
            record,
            format!("{field}: {value} exceeds maximum {max}"),
        ));
    }
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &PlutusData) -> PlutusData {
        from_cbor(&to_cbor(data).unwrap(), "test").unwrap()
    }

    #[test]
    fn constructor_tags_cover_all_ranges() {
        for index in [0u64, 1, 6, 7, 100, 127, 128, 5_000] {
            let data = constr(index, vec![uint(index)]);
            assert_eq!(roundtrip(&data), data);
        }
    }

    #[test]
    fn constructor_zero_uses_tag_121() {
        let encoded = to_cbor(&constr(0, vec![])).unwrap();
        // tag(121) = 0xd8 0x79, followed by an empty definite array.
        assert_eq!(encoded, vec![0xd8, 0x79, 0x80]);
    }

    #[test]
    fn constructor_seven_uses_extended_tag() {
        let encoded = to_cbor(&constr(7, vec![])).unwrap();
        // tag(1280) = 0xd9 0x05 0x00.
        assert_eq!(encoded, vec![0xd9, 0x05, 0x00, 0x80]);
    }

    #[test]
    fn large_constructor_uses_general_form() {
        let encoded = to_cbor(&constr(200, vec![])).unwrap();
        // tag(102) [200, []]
        assert_eq!(encoded, vec![0xd8, 0x66, 0x82, 0x18, 0xc8, 0x80]);
    }

    #[test]
    fn non_empty_list_is_indefinite() {
        let encoded = to_cbor(&list(vec![uint(1)])).unwrap();
        assert_eq!(encoded, vec![0x9f, 0x01, 0xff]);
    }

    #[test]
    fn definite_lists_are_accepted() {
        // [1, 2] framed definitely.
        let data = from_cbor(&[0x82, 0x01, 0x02], "test").unwrap();
        assert_eq!(data, list(vec![uint(1), uint(2)]));
    }

    #[test]
    fn pair_is_a_plain_list() {
        let encoded = to_cbor(&pair(text("BTC"), uint(5_000))).unwrap();
        // No constructor tag anywhere: array start, bytes(3) "BTC", uint16 5000, break.
        assert_eq!(
            encoded,
            vec![0x9f, 0x43, b'B', b'T', b'C', 0x19, 0x13, 0x88, 0xff]
        );
    }

    #[test]
    fn long_bytes_are_chunked() {
        let raw = vec![0x5a; 100];
        let encoded = to_cbor(&bytes(&raw)).unwrap();
        assert_eq!(encoded[0], 0x5f);
        assert_eq!(*encoded.last().unwrap(), 0xff);
        assert_eq!(roundtrip(&bytes(&raw)), bytes(&raw));
    }

    #[test]
    fn integer_extremes_roundtrip() {
        for value in [
            0i128,
            1,
            -1,
            i128::from(i64::MAX),
            i128::from(u64::MAX),
            i128::from(u64::MAX) + 1,
            -i128::from(u64::MAX) - 2,
            i128::MAX,
            i128::MIN,
        ] {
            let data = PlutusData::Integer(value);
            assert_eq!(roundtrip(&data), data, "value {value}");
        }
    }

    #[test]
    fn maps_roundtrip() {
        let data = PlutusData::Map(vec![(text("k"), uint(1)), (uint(2), list(vec![]))]);
        assert_eq!(roundtrip(&data), data);
    }

    #[test]
    fn uint_rejects_above_maximum() {
        let err = expect_uint(&uint(10_001), "basket", "weight", 10_000).unwrap_err();
        assert!(matches!(err, CodecError::MalformedDatum { record: "basket", .. }));
    }

    #[test]
    fn uint_rejects_negative() {
        let err = expect_uint(&PlutusData::Integer(-5), "vault", "amount", u64::MAX).unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut raw = to_cbor(&uint(7)).unwrap();
        raw.push(0x00);
        assert!(from_cbor(&raw, "test").is_err());
    }

    #[test]
    fn truncated_input_is_rejected() {
        let raw = to_cbor(&list(vec![uint(1), uint(2)])).unwrap();
        assert!(from_cbor(&raw[..raw.len() - 1], "test").is_err());
    }

    #[test]
    fn non_plutus_types_are_rejected() {
        // CBOR text string "a" is not Plutus data.
        assert!(from_cbor(&[0x61, b'a'], "test").is_err());
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let mut raw = vec![0x81; MAX_DEPTH + 2];
        raw.push(0x00);
        assert!(from_cbor(&raw, "test").is_err());
    }

    #[test]
    fn text_rejects_invalid_utf8() {
        let data = bytes(&[0xff, 0xfe]);
        let err = expect_text(&data, "vault", "basket_id").unwrap_err();
        assert!(err.to_string().contains("invalid UTF-8"));
    }

    #[test]
    fn pair_rejects_wrong_length() {
        let data = list(vec![uint(1), uint(2), uint(3)]);
        assert!(expect_pair(&data, "oracle", "price").is_err());
    }
}

//! Error types returned by the encoding and decoding operations.
//!
//! Model constraint violations are described by [`ModelError`](crate::model::ModelError) and
//! vendor list failures by [`GvlError`](crate::gvl::GvlError).
use crate::core::base64::DecodeError;
use crate::encoder::field::Field;
use crate::model::{ModelError, Segment};
use std::io;
use thiserror::Error;

/// The error type for failures to decode a TC string.
///
/// Decoding is all or nothing: a single malformed segment aborts decoding of the
/// whole string.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DecodingError {
    /// The string or one of its segments is empty.
    #[error("empty segment at position {0}")]
    EmptySegment(usize),
    /// A character outside of the Base64-URL alphabet was found.
    #[error("invalid Base64-URL string")]
    InvalidBase64(#[from] DecodeError),
    /// Fewer bits than required remain in the segment.
    #[error("invalid bit length (expected {expected}, found {found})")]
    InvalidBitLength { expected: u64, found: u64 },
    /// A decoded integer does not fit in its destination type.
    #[error("value {value} read on {bits} bits is out of range")]
    ValueOutOfRange { value: u64, bits: u32 },
    /// Language codes are stored as two letters of equal width.
    #[error("language codes require an even bit width, got {0}")]
    OddBitWidth(u32),
    /// A range entry ends before it starts.
    #[error("invalid range entry: end id {end} is less than start id {start}")]
    InvertedRange { start: u16, end: u16 },
    /// The leading bits of a segment do not designate a known segment type.
    #[error("unknown segment type {segment_type}")]
    UnknownSegmentType { segment_type: u8 },
    /// The same segment type appears more than once.
    #[error("duplicate segment type {0}")]
    DuplicateSegment(Segment),
    /// The core segment declares a protocol version this crate does not support.
    #[error("unsupported version {version}")]
    UnsupportedVersion { version: u8 },
    /// The segment does not exist in the protocol version being decoded.
    #[error("segment {segment} is not supported by version {version}")]
    UnsupportedSegment { version: u8, segment: Segment },
    /// The number of bits consumed by a self-describing field cannot be determined.
    #[error("unable to determine the bit length of field {0}")]
    UnresolvedFieldLength(Field),
    /// A field consumed a different number of bits than its declared width.
    #[error("field {field} consumed {consumed} bits (expected {expected})")]
    FieldLengthMismatch {
        field: Field,
        expected: u64,
        consumed: u64,
    },
    /// A timestamp cannot be represented.
    #[error("invalid timestamp {deciseconds}")]
    InvalidTimestamp { deciseconds: u64 },
    /// The decoded value was rejected by the consent model.
    #[error("invalid decoded value: {0}")]
    Model(#[from] ModelError),
    /// An I/O error occurred while reading bits.
    #[error("unable to read bits: {0}")]
    Read(#[from] io::Error),
}

/// The error type for failures to encode a value or a model into a TC string.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EncodingError {
    /// The value does not fit in the requested number of bits.
    #[error("value {value} does not fit in {bits} bits")]
    IntegerOverflow { value: u64, bits: u32 },
    /// Language codes are stored as two letters of equal width.
    #[error("language codes require an even bit width, got {0}")]
    OddBitWidth(u32),
    /// The language code is not made of two letters between A and Z.
    #[error("invalid language code {0:?}")]
    InvalidLanguageCode(String),
    /// An id exceeds the width of a fixed bitfield.
    #[error("id {id} does not fit in a bitfield of {bits} bits")]
    IdOutOfRange { id: u16, bits: u32 },
    /// A timestamp before the Unix epoch cannot be encoded.
    #[error("timestamp before the Unix epoch")]
    NegativeTimestamp,
    /// The segment does not exist in the protocol version of the model.
    #[error("segment {segment} is not supported by version {version}")]
    UnsupportedSegment { version: u8, segment: Segment },
    /// A field which has no valid zero value was never assigned.
    #[error("required field {0} is not set")]
    MissingField(Field),
    /// The model holds an invalid value.
    #[error("invalid model value: {0}")]
    Model(#[from] ModelError),
    /// An I/O error occurred while writing bits.
    #[error("unable to write bits: {0}")]
    Write(#[from] io::Error),
}

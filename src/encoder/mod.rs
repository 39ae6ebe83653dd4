//! Bit layouts of the TC string segments.
//!
//! Each segment is an ordered sequence of [`Field`]s, determined by the protocol version
//! and the segment type. Fields are decoded into and encoded from a
//! [`TCModel`](crate::TCModel) through typed accessors.
pub mod field;
pub mod segment;
pub mod vector;

pub use field::{Field, Width};
pub use segment::{decode_segment, encode_segment, field_sequence};

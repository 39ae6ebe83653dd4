use crate::core::base64::{BITS_PER_CHAR, Base64Reader};
use crate::error::{DecodingError, EncodingError};
use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};
use std::collections::BTreeSet;
use std::io::Read;
use std::ops::RangeInclusive;
use time::OffsetDateTime;

pub mod base64;

/// Width of the flag preceding each range entry.
pub const SINGLE_OR_RANGE_BITS: u32 = 1;
/// Width of the entry count of a range list.
pub const NUM_ENTRIES_BITS: u32 = 12;
/// Width of a vendor id inside a range entry.
pub const VENDOR_ID_BITS: u32 = 16;

const DECISECOND_NANOS: i128 = 100_000_000;

// encoded strings are padded to the least common multiple of 6 and 8
const PADDING_BITS: u64 = 24;

/// A bounded reader of bit fields.
///
/// The reader knows the total number of bits available, so that reading a field
/// which is not entirely present fails instead of silently yielding padding bits.
pub struct DataReader<R>
where
    R: Read,
{
    bit_reader: BitReader<R, BigEndian>,
    position: u64,
    len: u64,
}

impl<'a> DataReader<Base64Reader<&'a [u8]>> {
    /// Creates a reader over the bits of a Base64-URL encoded segment.
    pub fn from_base64_url(s: &'a str) -> Result<Self, DecodingError> {
        base64::validate(s)?;
        Ok(Self::new(
            Base64Reader::new(s.as_bytes()),
            s.len() as u64 * BITS_PER_CHAR,
        ))
    }
}

impl<R> DataReader<R>
where
    R: Read,
{
    /// Creates a reader over the first `len` bits of `r`.
    pub fn new(r: R, len: u64) -> Self {
        Self {
            bit_reader: BitReader::endian(r, BigEndian),
            position: 0,
            len,
        }
    }

    /// Number of bits consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn remaining(&self) -> u64 {
        self.len - self.position
    }

    fn consume(&mut self, bits: u64) -> Result<(), DecodingError> {
        let remaining = self.remaining();
        if remaining < bits {
            return Err(DecodingError::InvalidBitLength {
                expected: bits,
                found: remaining,
            });
        }
        self.position += bits;
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodingError> {
        self.consume(1)?;
        Ok(self.bit_reader.read_bit()?)
    }

    /// Reads an unsigned integer stored on exactly `bits` bits.
    pub fn read_fixed_integer<U>(&mut self, bits: u32) -> Result<U, DecodingError>
    where
        U: TryFrom<u64>,
    {
        let value = self.read_u64(bits)?;
        U::try_from(value).map_err(|_| DecodingError::ValueOutOfRange { value, bits })
    }

    fn read_u64(&mut self, bits: u32) -> Result<u64, DecodingError> {
        self.consume(bits as u64)?;
        if bits == 0 {
            return Ok(0);
        }
        Ok(self.bit_reader.read_unsigned_var::<u64>(bits)?)
    }

    /// Reads a timestamp stored as deciseconds since the Unix epoch.
    pub fn read_datetime(&mut self, bits: u32) -> Result<OffsetDateTime, DecodingError> {
        let deciseconds = self.read_u64(bits)?;
        OffsetDateTime::from_unix_timestamp_nanos(deciseconds as i128 * DECISECOND_NANOS)
            .map_err(|_| DecodingError::InvalidTimestamp { deciseconds })
    }

    /// Reads a two-letter code, each letter being an offset from `A` on half the width.
    pub fn read_language(&mut self, bits: u32) -> Result<String, DecodingError> {
        if bits % 2 != 0 {
            return Err(DecodingError::OddBitWidth(bits));
        }
        let half = bits / 2;
        (0..2)
            .map(|_| {
                self.read_u64(half).map(|n| {
                    u32::try_from(n)
                        .ok()
                        .and_then(|n| char::from_u32(u32::from(b'A') + n))
                        .unwrap_or(char::REPLACEMENT_CHARACTER)
                })
            })
            .collect()
    }

    /// Reads `bits` flags, returning the 1-based positions of the bits set.
    pub fn read_fixed_bitfield(&mut self, bits: u32) -> Result<BTreeSet<u16>, DecodingError> {
        if self.remaining() < bits as u64 {
            return Err(DecodingError::InvalidBitLength {
                expected: bits as u64,
                found: self.remaining(),
            });
        }

        let mut result = BTreeSet::new();
        for i in 1..=bits {
            if self.read_bool()? {
                result.insert(i as u16);
            }
        }

        Ok(result)
    }

    /// Reads a single range entry: a flag, a start id, and an end id if the flag is set.
    pub fn read_range_entry(&mut self) -> Result<RangeInclusive<u16>, DecodingError> {
        let is_range = self.read_bool()?;
        let start = self.read_fixed_integer(VENDOR_ID_BITS)?;
        if !is_range {
            return Ok(start..=start);
        }

        let end = self.read_fixed_integer(VENDOR_ID_BITS)?;
        if end < start {
            return Err(DecodingError::InvertedRange { start, end });
        }
        Ok(start..=end)
    }

    /// Reads an entry count followed by that many range entries.
    pub fn read_range_entries(&mut self) -> Result<Vec<RangeInclusive<u16>>, DecodingError> {
        let n: u16 = self.read_fixed_integer(NUM_ENTRIES_BITS)?;
        (0..n).map(|_| self.read_range_entry()).collect()
    }
}

/// A writer of bit fields which keeps track of the number of bits written.
pub struct DataWriter {
    bit_writer: BitWriter<Vec<u8>, BigEndian>,
    len: u64,
}

impl Default for DataWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DataWriter {
    pub fn new() -> Self {
        Self {
            bit_writer: BitWriter::endian(Vec::new(), BigEndian),
            len: 0,
        }
    }

    /// Number of bits written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), EncodingError> {
        self.bit_writer.write_bit(value)?;
        self.len += 1;
        Ok(())
    }

    /// Writes an unsigned integer on exactly `bits` bits, zero-padded on the left.
    pub fn write_fixed_integer<U>(&mut self, bits: u32, value: U) -> Result<(), EncodingError>
    where
        U: Into<u64>,
    {
        let value = value.into();
        if bits < u64::BITS && value >> bits != 0 {
            return Err(EncodingError::IntegerOverflow { value, bits });
        }
        if bits == 0 {
            return Ok(());
        }

        self.bit_writer.write_unsigned_var(bits, value)?;
        self.len += bits as u64;
        Ok(())
    }

    /// Writes a timestamp as deciseconds since the Unix epoch.
    pub fn write_datetime(
        &mut self,
        bits: u32,
        value: &OffsetDateTime,
    ) -> Result<(), EncodingError> {
        let nanos = value.unix_timestamp_nanos();
        if nanos < 0 {
            return Err(EncodingError::NegativeTimestamp);
        }
        let deciseconds = u64::try_from(nanos / DECISECOND_NANOS).map_err(|_| {
            EncodingError::IntegerOverflow {
                value: u64::MAX,
                bits,
            }
        })?;
        self.write_fixed_integer(bits, deciseconds)
    }

    /// Writes a case-insensitive two-letter code.
    pub fn write_language(&mut self, bits: u32, value: &str) -> Result<(), EncodingError> {
        if bits % 2 != 0 {
            return Err(EncodingError::OddBitWidth(bits));
        }

        let upper = value.to_ascii_uppercase();
        let letters = upper.as_bytes();
        if letters.len() != 2 || !letters.iter().all(u8::is_ascii_uppercase) {
            return Err(EncodingError::InvalidLanguageCode(value.to_string()));
        }

        for &letter in letters {
            self.write_fixed_integer(bits / 2, letter - b'A')?;
        }
        Ok(())
    }

    /// Writes `bits` flags, setting the bit at each 1-based position of `ids`.
    pub fn write_fixed_bitfield<'a, I>(&mut self, bits: u32, ids: I) -> Result<(), EncodingError>
    where
        I: IntoIterator<Item = &'a u16>,
    {
        let mut bitfield = vec![false; bits as usize];
        for &id in ids {
            match bitfield.get_mut((id as usize).wrapping_sub(1)) {
                Some(bit) => *bit = true,
                None => return Err(EncodingError::IdOutOfRange { id, bits }),
            }
        }

        bitfield.into_iter().try_for_each(|b| self.write_bool(b))
    }

    pub fn write_range_entry(&mut self, range: &RangeInclusive<u16>) -> Result<(), EncodingError> {
        let is_range = range.start() != range.end();
        self.write_bool(is_range)?;
        self.write_fixed_integer(VENDOR_ID_BITS, *range.start())?;
        if is_range {
            self.write_fixed_integer(VENDOR_ID_BITS, *range.end())?;
        }
        Ok(())
    }

    pub fn write_range_entries(
        &mut self,
        ranges: &[RangeInclusive<u16>],
    ) -> Result<(), EncodingError> {
        self.write_fixed_integer(NUM_ENTRIES_BITS, ranges.len() as u64)?;
        ranges.iter().try_for_each(|r| self.write_range_entry(r))
    }

    /// Pads the written bits and renders them as a Base64-URL string.
    pub fn into_base64_url(mut self) -> Result<String, EncodingError> {
        let padding = (PADDING_BITS - self.len % PADDING_BITS) % PADDING_BITS;
        for _ in 0..padding {
            self.bit_writer.write_bit(false)?;
        }
        self.bit_writer.byte_align()?;

        Ok(base64::encode(&self.bit_writer.into_writer()))
    }
}

/// Groups sorted ids into inclusive ranges of consecutive values.
pub fn group_ranges<'a, I>(ids: I) -> Vec<RangeInclusive<u16>>
where
    I: IntoIterator<Item = &'a u16>,
{
    let mut ranges: Vec<RangeInclusive<u16>> = vec![];
    for &id in ids {
        match ranges.last_mut() {
            Some(last) if last.end().checked_add(1) == Some(id) => {
                *last = *last.start()..=id;
            }
            _ => ranges.push(id..=id),
        }
    }
    ranges
}

/// Number of bits taken by a list of range entries, including its entry count.
pub fn range_entries_bit_length(ranges: &[RangeInclusive<u16>]) -> u64 {
    ranges
        .iter()
        .map(|r| {
            let ids = if r.start() == r.end() { 1 } else { 2 };
            (SINGLE_OR_RANGE_BITS + ids * VENDOR_ID_BITS) as u64
        })
        .sum::<u64>()
        + NUM_ENTRIES_BITS as u64
}

/// Drops the sub-decisecond part of a timestamp and moves it to UTC, which is
/// the precision the wire format carries.
pub fn truncate_to_deciseconds(value: OffsetDateTime) -> OffsetDateTime {
    let value = value.to_offset(time::UtcOffset::UTC);
    let nanos = value.nanosecond() - value.nanosecond() % DECISECOND_NANOS as u32;
    value.replace_nanosecond(nanos).unwrap_or(value)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use test_case::test_case;
    use time::macros::datetime;

    /// Transform a string of literal binary digits into a vector of bytes.
    /// Zeroes will be appended to fill missing bits.
    pub(crate) fn b(s: &str) -> Vec<u8> {
        let chars = s
            .chars()
            .filter(|&c| c == '1' || c == '0')
            .collect::<Vec<_>>();
        chars
            .chunks(8)
            .map(|c| (8 - c.len(), String::from_iter(c)))
            .map(|(l, s)| u8::from_str_radix(&s, 2).map(|n| n << l))
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or(vec![])
    }

    /// Build a reader over exactly the bits given as literal binary digits.
    pub(crate) fn r(s: &str) -> DataReader<Cursor<Vec<u8>>> {
        let len = s.chars().filter(|&c| c == '1' || c == '0').count();
        DataReader::new(Cursor::new(b(s)), len as u64)
    }

    /// Render everything written so far as literal binary digits.
    pub(crate) fn written(w: DataWriter) -> String {
        let len = w.len() as usize;
        let mut w = w;
        w.bit_writer.byte_align().unwrap();
        w.bit_writer
            .into_writer()
            .iter()
            .map(|b| format!("{b:08b}"))
            .collect::<String>()[..len]
            .to_string()
    }

    #[test_case("00000001 00000010 00000011" => vec![1, 2, 3])]
    #[test_case("000000 010000 001000 000011" => vec![1, 2, 3])]
    #[test_case("000000 010000 001000 000011 1000" => vec![1, 2, 3, 128])]
    #[test_case("000000 010000 001000 000011 1001" => vec![1, 2, 3, 144])]
    fn bytes(s: &str) -> Vec<u8> {
        b(s)
    }

    #[test_case("000000" => 0)]
    #[test_case("000101" => 5)]
    #[test_case("111111" => 63)]
    fn read_fixed_integer(s: &str) -> u8 {
        r(s).read_fixed_integer(6).unwrap()
    }

    #[test_case("" => matches DecodingError::InvalidBitLength { expected: 6, found: 0 } ; "empty")]
    #[test_case("00010" => matches DecodingError::InvalidBitLength { expected: 6, found: 5 } ; "one bit short")]
    fn read_fixed_integer_too_short(s: &str) -> DecodingError {
        r(s).read_fixed_integer::<u8>(6).unwrap_err()
    }

    #[test]
    fn read_fixed_integer_does_not_fit() {
        assert!(matches!(
            r("111111111").read_fixed_integer::<u8>(9),
            Err(DecodingError::ValueOutOfRange { value: 511, bits: 9 })
        ));
    }

    #[test]
    fn read_fixed_integer_boundaries() {
        for bits in [1u32, 6, 12, 16] {
            let max = (1u64 << bits) - 1;
            for value in [0u64, 1, max] {
                let mut w = DataWriter::new();
                w.write_fixed_integer(bits, value).unwrap();
                let s = written(w);
                assert_eq!(s.len(), bits as usize);
                assert_eq!(r(&s).read_fixed_integer::<u64>(bits).unwrap(), value);
            }
        }
    }

    #[test_case("001111101100100110001110010001011001" => datetime!(2023-05-30 08:14:39.3 UTC))]
    #[test_case("000000000000000000000000000000000000" => datetime!(1970-01-01 00:00 UTC))]
    fn read_datetime(s: &str) -> OffsetDateTime {
        r(s).read_datetime(36).unwrap()
    }

    #[test_case("000100 001101", 12 => "EN" ; "english")]
    #[test_case("000011 000100", 12 => "DE" ; "german")]
    #[test_case("0000000100 0000001101", 20 => "EN" ; "wider letters")]
    fn read_language(s: &str, bits: u32) -> String {
        r(s).read_language(bits).unwrap()
    }

    #[test_case("000100 00110", 12 => matches DecodingError::InvalidBitLength { .. } ; "too short")]
    #[test_case("000100 0011010", 13 => matches DecodingError::OddBitWidth(13) ; "odd width")]
    fn read_language_error(s: &str, bits: u32) -> DecodingError {
        r(s).read_language(bits).unwrap_err()
    }

    #[test_case("10101", 5 => BTreeSet::from_iter([1, 3, 5]))]
    #[test_case("101010", 6 => BTreeSet::from_iter([1, 3, 5]))]
    #[test_case("", 0 => BTreeSet::from_iter([]))]
    fn read_fixed_bitfield(s: &str, bits: u32) -> BTreeSet<u16> {
        r(s).read_fixed_bitfield(bits).unwrap()
    }

    #[test]
    fn read_fixed_bitfield_too_short() {
        assert!(matches!(
            r("1010").read_fixed_bitfield(5),
            Err(DecodingError::InvalidBitLength {
                expected: 5,
                found: 4
            })
        ));
    }

    #[test_case("000000000010 0 0000000000000011 1 0000000000000101 0000000000001000" => vec![3..=3, 5..=8] ; "single and range")]
    #[test_case("000000000000" => Vec::<RangeInclusive<u16>>::new() ; "no entries")]
    fn read_range_entries(s: &str) -> Vec<RangeInclusive<u16>> {
        r(s).read_range_entries().unwrap()
    }

    #[test]
    fn read_inverted_range() {
        let err = r("000000000001 1 0000000000001000 0000000000000101")
            .read_range_entries()
            .unwrap_err();
        assert!(matches!(
            err,
            DecodingError::InvertedRange { start: 8, end: 5 }
        ));
    }

    #[test_case(6, 5 => "000101")]
    #[test_case(12, 0 => "000000000000")]
    #[test_case(1, 1 => "1")]
    fn write_fixed_integer(bits: u32, value: u64) -> String {
        let mut w = DataWriter::new();
        w.write_fixed_integer(bits, value).unwrap();
        written(w)
    }

    #[test_case(6, 64 ; "just above")]
    #[test_case(1, 2 ; "single bit")]
    fn write_fixed_integer_overflow(bits: u32, value: u64) {
        let mut w = DataWriter::new();
        assert!(matches!(
            w.write_fixed_integer(bits, value),
            Err(EncodingError::IntegerOverflow { .. })
        ));
    }

    #[test_case("en", 12 => "000100001101" ; "lowercase")]
    #[test_case("FR", 12 => "000101010001" ; "uppercase")]
    fn write_language(s: &str, bits: u32) -> String {
        let mut w = DataWriter::new();
        w.write_language(bits, s).unwrap();
        written(w)
    }

    #[test_case("EN", 13 => matches EncodingError::OddBitWidth(13) ; "odd width")]
    #[test_case("E1", 12 => matches EncodingError::InvalidLanguageCode(_) ; "digit")]
    #[test_case("ENG", 12 => matches EncodingError::InvalidLanguageCode(_) ; "three letters")]
    #[test_case("É", 12 => matches EncodingError::InvalidLanguageCode(_) ; "accented letter")]
    fn write_language_error(s: &str, bits: u32) -> EncodingError {
        let mut w = DataWriter::new();
        w.write_language(bits, s).unwrap_err()
    }

    #[test]
    fn write_datetime() {
        let mut w = DataWriter::new();
        w.write_datetime(36, &datetime!(2023-05-30 08:14:39.3 UTC))
            .unwrap();
        assert_eq!(written(w), "001111101100100110001110010001011001");
    }

    #[test]
    fn write_fixed_bitfield() {
        let mut w = DataWriter::new();
        w.write_fixed_bitfield(6, &BTreeSet::from([1, 3, 5])).unwrap();
        assert_eq!(written(w), "101010");
    }

    #[test_case(0 ; "zero")]
    #[test_case(7 ; "too large")]
    fn write_fixed_bitfield_out_of_range(id: u16) {
        let mut w = DataWriter::new();
        assert!(matches!(
            w.write_fixed_bitfield(6, &[id]),
            Err(EncodingError::IdOutOfRange { bits: 6, .. })
        ));
    }

    #[test]
    fn write_range_entries() {
        let mut w = DataWriter::new();
        w.write_range_entries(&[3..=3, 5..=8]).unwrap();
        assert_eq!(
            written(w),
            "000000000010 0 0000000000000011 1 0000000000000101 0000000000001000".replace(' ', "")
        );
    }

    #[test_case(&[] => Vec::<RangeInclusive<u16>>::new() ; "empty")]
    #[test_case(&[1, 2, 3, 5, 7, 8] => vec![1..=3, 5..=5, 7..=8] ; "mixed")]
    #[test_case(&[65534, 65535] => vec![65534..=65535] ; "upper bound")]
    fn group_ranges_of(ids: &[u16]) -> Vec<RangeInclusive<u16>> {
        group_ranges(ids)
    }

    #[test]
    fn ranges_bit_length() {
        assert_eq!(range_entries_bit_length(&[]), 12);
        assert_eq!(range_entries_bit_length(&[3..=3, 5..=8]), 12 + 17 + 33);
    }

    #[test_case(0 => "" ; "nothing")]
    #[test_case(1 => "gAAA" ; "one bit")]
    #[test_case(24 => "____" ; "full block")]
    #[test_case(25 => "____gAAA" ; "next block")]
    fn padding(ones: usize) -> String {
        let mut w = DataWriter::new();
        for _ in 0..ones {
            w.write_bool(true).unwrap();
        }
        w.into_base64_url().unwrap()
    }

    #[test]
    fn truncate_timestamp() {
        assert_eq!(
            truncate_to_deciseconds(datetime!(2020-01-01 10:00:00.123_456 +02:00)),
            datetime!(2020-01-01 08:00:00.1 UTC)
        );
    }
}

use std::io;
use std::io::Read;
use thiserror::Error;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Number of bits carried by a single character.
pub const BITS_PER_CHAR: u64 = 6;

/// The error type that describes failures to decode Base64-URL encoded strings.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DecodeError {
    /// An invalid byte was found in the input. The offset and offending byte are provided.
    #[error("invalid byte {1} at offset {0}")]
    InvalidByte(usize, u8),
}

/// Checks that every byte of the input belongs to the Base64-URL alphabet.
pub fn validate(s: &str) -> Result<(), DecodeError> {
    match s.bytes().position(|b| base64_value(b).is_none()) {
        Some(offset) => Err(DecodeError::InvalidByte(offset, s.as_bytes()[offset])),
        None => Ok(()),
    }
}

/// Adapts a reader of Base64-URL characters into a reader of the bytes they encode.
///
/// Each character contributes exactly 6 bits, most significant bit first.
/// A trailing partial byte is padded with zeroes.
pub struct Base64Reader<R>
where
    R: Read,
{
    inner_reader: R,
    inner_reader_pos: usize,
    partial_byte: u8,
    partial_byte_index: usize,
}

impl<R> Base64Reader<R>
where
    R: Read,
{
    pub fn new(r: R) -> Self {
        Self {
            inner_reader: r,
            inner_reader_pos: 0,
            partial_byte: 0,
            partial_byte_index: 0,
        }
    }
}

impl<R> Read for Base64Reader<R>
where
    R: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut bytes_written = 0;
        let mut bit_buf = [0];
        let mut output_byte_index = 0;

        'bytes: for b in buf.iter_mut() {
            *b = 0;
            output_byte_index = 0;

            // remaining bits of the previous character go first
            if self.partial_byte_index != 0 {
                let copied_bits = copy_bits(self.partial_byte, self.partial_byte_index, b, 0);

                self.partial_byte_index += copied_bits;
                if self.partial_byte_index >= 6 {
                    self.partial_byte_index = 0;
                }

                output_byte_index += copied_bits;
                if output_byte_index >= 8 {
                    bytes_written += 1;
                    continue;
                }
            }

            while output_byte_index < 8 {
                let read = self.inner_reader.read(&mut bit_buf)?;
                if read == 0 {
                    break 'bytes;
                }
                self.inner_reader_pos += read;

                let val = bit_buf[0];
                self.partial_byte = base64_value(val).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        DecodeError::InvalidByte(self.inner_reader_pos - 1, val),
                    )
                })?;

                let copied_bits = copy_bits(self.partial_byte, 0, b, output_byte_index);

                self.partial_byte_index += copied_bits;
                if self.partial_byte_index >= 6 {
                    self.partial_byte_index = 0;
                }
                output_byte_index += copied_bits;
                if output_byte_index >= 8 {
                    bytes_written += 1;
                }
            }
        }

        // pad the last incomplete byte
        if output_byte_index > 0 && output_byte_index < 8 {
            bytes_written += 1;
        }

        Ok(bytes_written)
    }
}

/// Renders bytes as Base64-URL characters, 6 bits per character.
///
/// The caller is responsible for padding: trailing bits which do not fill a whole
/// character are padded with zeroes.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4 / 3 + 1);
    let mut acc: u16 = 0;
    let mut acc_bits = 0;

    for &byte in bytes {
        acc = (acc << 8) | byte as u16;
        acc_bits += 8;
        while acc_bits >= 6 {
            acc_bits -= 6;
            out.push(base64_char((acc >> acc_bits) as u8));
        }
        acc &= (1 << acc_bits) - 1;
    }

    if acc_bits > 0 {
        out.push(base64_char((acc << (6 - acc_bits)) as u8));
    }

    out
}

pub(crate) fn base64_value(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}

fn base64_char(v: u8) -> char {
    ALPHABET[(v & 0x3f) as usize] as char
}

fn copy_bits(input: u8, input_offset: usize, output: &mut u8, output_offset: usize) -> usize {
    let input_size = 6 - input_offset;
    let mut copied_bits = 0;
    let mut current_output_offset = 7 - output_offset;

    for i in (0..input_size).rev() {
        let bit = (input >> i) & 1;
        let bit = bit << current_output_offset;

        *output |= bit;
        copied_bits += 1;

        if current_output_offset == 0 {
            break;
        }
        current_output_offset -= 1;
    }

    copied_bits
}

//! Bit-granularity stream reader and writer.
//!
//! Fields of 1 to 32 bits are appended least-significant bit first and
//! completed bytes are pushed to the underlying sink as soon as they fill.
//! The stream is not self-describing: a [`BitReader`] must read the fields
//! back in the same order and with the same widths they were written with.

use std::io::{self, Read, Write};

/// Largest byte length a string field can carry (16-bit length prefix).
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

fn check_width(bits: u8) -> io::Result<()> {
    if bits == 0 || bits > 32 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("bit field width must be 1-32, got {}", bits),
        ));
    }
    Ok(())
}

/// Writes bit fields to a byte sink.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    inner: W,
    pending: u8,
    pending_bits: u8,
    written_bits: u64,
}

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        BitWriter {
            inner,
            pending: 0,
            pending_bits: 0,
            written_bits: 0,
        }
    }

    /// Appends the low `bits` bits of `value`.
    pub fn write(&mut self, value: u32, bits: u8) -> io::Result<()> {
        check_width(bits)?;
        for i in 0..bits {
            let bit = ((value >> i) & 1) as u8;
            self.pending |= bit << self.pending_bits;
            self.pending_bits += 1;
            if self.pending_bits == 8 {
                self.inner.write_all(&[self.pending])?;
                self.pending = 0;
                self.pending_bits = 0;
            }
        }
        self.written_bits += bits as u64;
        Ok(())
    }

    /// Appends a single flag bit.
    pub fn write_bool(&mut self, value: bool) -> io::Result<()> {
        self.write(value as u32, 1)
    }

    /// Appends a 64-bit word as two 32-bit fields, low half first.
    pub fn write_u64(&mut self, value: u64) -> io::Result<()> {
        self.write(value as u32, 32)?;
        self.write((value >> 32) as u32, 32)
    }

    /// Appends a 16-bit byte length followed by the raw UTF-8 bytes.
    ///
    /// `None` and `Some("")` are both written as a zero length and read back
    /// as an empty string.
    pub fn write_string(&mut self, value: Option<&str>) -> io::Result<()> {
        let bytes = value.map(str::as_bytes).unwrap_or_default();
        if bytes.len() > MAX_STRING_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("string of {} bytes exceeds the 16-bit length prefix", bytes.len()),
            ));
        }
        self.write(bytes.len() as u32, 16)?;
        for &b in bytes {
            self.write(b as u32, 8)?;
        }
        Ok(())
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> u64 {
        self.written_bits
    }

    /// Pads the final partial byte with zero bits and pushes it to the sink.
    pub fn pad_to_byte(&mut self) -> io::Result<()> {
        if self.pending_bits > 0 {
            self.inner.write_all(&[self.pending])?;
            self.written_bits += (8 - self.pending_bits) as u64;
            self.pending = 0;
            self.pending_bits = 0;
        }
        Ok(())
    }

    /// Pads, flushes and returns the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.pad_to_byte()?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads bit fields from a byte source.
#[derive(Debug)]
pub struct BitReader<R: Read> {
    inner: R,
    current: u8,
    available: u8,
}

impl<R: Read> BitReader<R> {
    pub fn new(inner: R) -> Self {
        BitReader {
            inner,
            current: 0,
            available: 0,
        }
    }

    fn next_bit(&mut self) -> io::Result<u32> {
        if self.available == 0 {
            let mut byte = [0u8; 1];
            self.inner.read_exact(&mut byte)?;
            self.current = byte[0];
            self.available = 8;
        }
        let bit = (self.current & 1) as u32;
        self.current >>= 1;
        self.available -= 1;
        Ok(bit)
    }

    /// Reads a field of `bits` bits. Running out of input is an
    /// [`io::ErrorKind::UnexpectedEof`] error.
    pub fn read(&mut self, bits: u8) -> io::Result<u32> {
        check_width(bits)?;
        let mut value = 0u32;
        for i in 0..bits {
            value |= self.next_bit()? << i;
        }
        Ok(value)
    }

    pub fn read_bool(&mut self) -> io::Result<bool> {
        Ok(self.read(1)? != 0)
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        let low = self.read(32)? as u64;
        let high = self.read(32)? as u64;
        Ok(low | (high << 32))
    }

    /// Reads a string written by [`BitWriter::write_string`].
    pub fn read_string(&mut self) -> io::Result<String> {
        let len = self.read(16)? as usize;
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..len {
            bytes.push(self.read(8)? as u8);
        }
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Drops the rest of the current byte so the next read starts aligned.
    pub fn align_to_byte(&mut self) {
        self.available = 0;
        self.current = 0;
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fields_are_lsb_first() {
        let mut writer = BitWriter::new(Vec::new());
        writer.write(0b1, 1).unwrap();
        writer.write(0b10, 2).unwrap();
        writer.write(0b11111, 5).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes, vec![0b1111_1101]);
    }

    #[test]
    fn partial_byte_is_padded() {
        let mut writer = BitWriter::new(Vec::new());
        writer.write(0x1ff, 9).unwrap();
        assert_eq!(writer.bit_len(), 9);
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes, vec![0xff, 0x01]);
    }

    #[test]
    fn rejects_bad_width() {
        let mut writer = BitWriter::new(Vec::new());
        assert_eq!(
            writer.write(1, 0).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
        assert_eq!(
            writer.write(1, 33).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn premature_eof() {
        let bytes = [0xabu8];
        let mut reader = BitReader::new(&bytes[..]);
        assert_eq!(reader.read(8).unwrap(), 0xab);
        assert_eq!(
            reader.read(1).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn absent_and_empty_strings_collapse() {
        let mut writer = BitWriter::new(Vec::new());
        writer.write_string(None).unwrap();
        writer.write_string(Some("")).unwrap();
        writer.write_string(Some("Nf3!")).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = BitReader::new(bytes.as_slice());
        assert_eq!(reader.read_string().unwrap(), "");
        assert_eq!(reader.read_string().unwrap(), "");
        assert_eq!(reader.read_string().unwrap(), "Nf3!");
    }

    #[test]
    fn u64_words() {
        let mut writer = BitWriter::new(Vec::new());
        writer.write(1, 3).unwrap();
        writer.write_u64(0xdead_beef_0123_4567).unwrap();
        let bytes = writer.finish().unwrap();
        let mut reader = BitReader::new(bytes.as_slice());
        assert_eq!(reader.read(3).unwrap(), 1);
        assert_eq!(reader.read_u64().unwrap(), 0xdead_beef_0123_4567);
    }

    #[derive(Debug, Clone)]
    enum Field {
        Bits(u32, u8),
        Text(Option<String>),
    }

    fn field() -> impl Strategy<Value = Field> {
        prop_oneof![
            (1u8..=32, any::<u32>()).prop_map(|(width, value)| {
                let mask = if width == 32 { u32::MAX } else { (1u32 << width) - 1 };
                Field::Bits(value & mask, width)
            }),
            proptest::option::of("[a-z0-9 {}]{0,12}").prop_map(Field::Text),
        ]
    }

    proptest! {
        #[test]
        fn roundtrip(fields in proptest::collection::vec(field(), 0..64)) {
            let mut writer = BitWriter::new(Vec::new());
            for f in &fields {
                match f {
                    Field::Bits(value, width) => writer.write(*value, *width).unwrap(),
                    Field::Text(text) => writer.write_string(text.as_deref()).unwrap(),
                }
            }
            let bytes = writer.finish().unwrap();

            let mut reader = BitReader::new(bytes.as_slice());
            for f in &fields {
                match f {
                    Field::Bits(value, width) => prop_assert_eq!(reader.read(*width).unwrap(), *value),
                    Field::Text(text) => prop_assert_eq!(
                        reader.read_string().unwrap(),
                        text.clone().unwrap_or_default()
                    ),
                }
            }
        }
    }
}

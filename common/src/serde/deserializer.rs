#[rustfmt::skip]
pub trait Deserializer {
    fn pos(&self) -> usize;
    fn size(&self) -> usize;
    fn advance_by(&mut self, amount: usize);
    fn jump_to(&mut self, pos: usize);
    /// Reads up to `length` bytes, fewer if the end of the input is hit.
    fn read_bytes(&mut self, length: usize) -> &[u8];

    fn remaining(&self) -> usize { self.size().saturating_sub(self.pos()) }
    fn is_eof(&self) -> bool { self.pos() >= self.size() }

    fn read_array<const LENGTH: usize>(&mut self) -> [u8; LENGTH] {
        let mut out = [0; LENGTH];
        let bytes = self.read_bytes(LENGTH);
        out[..bytes.len()].copy_from_slice(bytes);
        out
    }

    fn read_u8(&mut self) -> u8 { self.read_array::<1>()[0] }
    fn read_u16_le(&mut self) -> u16 { u16::from_le_bytes(self.read_array()) }
    fn read_u32_le(&mut self) -> u32 { u32::from_le_bytes(self.read_array()) }
    fn read_u32_be(&mut self) -> u32 { u32::from_be_bytes(self.read_array()) }
    fn read_f32_le(&mut self) -> f32 { f32::from_le_bytes(self.read_array()) }
    fn read_f64_le(&mut self) -> f64 { f64::from_le_bytes(self.read_array()) }
}

pub struct SliceDeserializer<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> SliceDeserializer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buffer: data,
            offset: 0,
        }
    }
}

impl Deserializer for SliceDeserializer<'_> {
    fn pos(&self) -> usize {
        self.offset
    }

    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn advance_by(&mut self, amount: usize) {
        self.offset = (self.offset + amount).min(self.buffer.len());
    }

    fn jump_to(&mut self, pos: usize) {
        self.offset = pos.min(self.buffer.len());
    }

    fn read_bytes(&mut self, length: usize) -> &[u8] {
        let end = (self.offset + length).min(self.buffer.len());
        let value = &self.buffer[self.offset..end];
        self.offset = end;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian() {
        let data = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x80, 0x3f, 0xff];
        let mut des = SliceDeserializer::new(&data);

        assert_eq!(des.read_u32_le(), 1);
        assert_eq!(des.read_f32_le(), 1.0);
        assert_eq!(des.remaining(), 1);
        assert!(!des.is_eof());
    }

    #[test]
    fn short_reads_are_padded() {
        let data = [0x02, 0x01];
        let mut des = SliceDeserializer::new(&data);

        assert_eq!(des.read_u32_le(), 0x0102);
        assert!(des.is_eof());
        assert_eq!(des.read_bytes(4), &[] as &[u8]);
    }
}

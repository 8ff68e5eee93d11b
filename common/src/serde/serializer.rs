pub trait Serializer {
    fn pos(&self) -> usize;
    fn write_bytes(&mut self, data: &[u8]);

    fn write_u8(&mut self, data: u8) {
        self.write_bytes(&[data]);
    }

    fn write_u16_le(&mut self, data: u16) {
        self.write_bytes(&data.to_le_bytes());
    }

    fn write_u32_le(&mut self, data: u32) {
        self.write_bytes(&data.to_le_bytes());
    }

    fn write_f32_le(&mut self, data: f32) {
        self.write_bytes(&data.to_le_bytes());
    }
}

#[derive(Default)]
pub struct DynamicSerializer {
    buffer: Vec<u8>,
}

impl DynamicSerializer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl Serializer for DynamicSerializer {
    fn pos(&self) -> usize {
        self.buffer.len()
    }

    fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serde::{Deserializer, SliceDeserializer};

    #[test]
    fn written_values_read_back() {
        let mut ser = DynamicSerializer::new();
        ser.write_u32_le(12);
        ser.write_f32_le(-2.5);
        ser.write_u16_le(0);
        assert_eq!(ser.pos(), 10);

        let bytes = ser.into_inner();
        let mut des = SliceDeserializer::new(&bytes);
        assert_eq!(des.read_u32_le(), 12);
        assert_eq!(des.read_f32_le(), -2.5);
        assert_eq!(des.read_u16_le(), 0);
    }
}

/// MSB-first bit writer for assembling feed resources in tests.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: u64, width: usize) -> &mut Self {
        for i in (0..width).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 == 1 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.bits % 8);
            }
            self.bits += 1;
        }
        self
    }

    pub fn zeros(&mut self, width: usize) -> &mut Self {
        for _ in 0..width {
            self.push(0, 1);
        }
        self
    }

    pub fn bit_len(&self) -> usize {
        self.bits
    }

    pub fn finish(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

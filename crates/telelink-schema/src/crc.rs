//! CRC-16/X.25 checksum used for frame integrity.
//!
//! Reflected polynomial 0x1021 (0x8408), initial value 0xFFFF and no final
//! XOR: the two checksum bytes on the wire are the raw register.

/// Reflected form of polynomial 0x1021.
const X25_POLYNOMIAL: u16 = 0x8408;

/// Initial register value.
pub const X25_INIT: u16 = 0xFFFF;

static X25_TABLE: [u16; 256] = generate_x25_table();

const fn generate_x25_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u16;
        let mut j = 0;

        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ X25_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Running CRC-16/X.25 accumulator, fed one byte at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    register: u16,
}

impl Crc16 {
    /// Start a new checksum.
    pub const fn new() -> Self {
        Self {
            register: X25_INIT,
        }
    }

    /// Feed one byte.
    #[inline]
    pub fn accumulate(&mut self, byte: u8) {
        let idx = ((self.register ^ byte as u16) & 0xFF) as usize;
        self.register = (self.register >> 8) ^ X25_TABLE[idx];
    }

    /// Feed a run of bytes.
    pub fn accumulate_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.accumulate(byte);
        }
    }

    /// Current register value.
    pub const fn value(&self) -> u16 {
        self.register
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC-16/X.25 of `data`.
pub fn crc16_x25(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.accumulate_slice(data);
    crc.value()
}

//! Converters with simple known inverses for stack-order tests.

use std::io;

use gds_channel::{Converter, Downstream};

/// XORs every byte with `key` in both directions.
pub struct XorConverter {
    pub key: u8,
}

impl XorConverter {
    pub fn new(key: u8) -> Self {
        Self { key }
    }
}

impl Converter for XorConverter {
    fn read(&mut self, down: &mut Downstream<'_>, buf: &mut [u8]) -> io::Result<usize> {
        let n = down.read(buf)?;
        for b in &mut buf[..n] {
            *b ^= self.key;
        }
        Ok(n)
    }

    fn write(&mut self, down: &mut Downstream<'_>, buf: &[u8]) -> io::Result<usize> {
        let out: Vec<u8> = buf.iter().map(|b| b ^ self.key).collect();
        down.write_all(&out)?;
        Ok(buf.len())
    }
}

/// Adds `delta` (wrapping) on write and subtracts it on read.
///
/// Stacked with [`XorConverter`] the composition is order dependent, so the
/// bytes on the store reveal which converter ran first.
pub struct OffsetConverter {
    pub delta: u8,
    pub flushes: usize,
}

impl OffsetConverter {
    pub fn new(delta: u8) -> Self {
        Self { delta, flushes: 0 }
    }
}

impl Converter for OffsetConverter {
    fn read(&mut self, down: &mut Downstream<'_>, buf: &mut [u8]) -> io::Result<usize> {
        let n = down.read(buf)?;
        for b in &mut buf[..n] {
            *b = b.wrapping_sub(self.delta);
        }
        Ok(n)
    }

    fn write(&mut self, down: &mut Downstream<'_>, buf: &[u8]) -> io::Result<usize> {
        let out: Vec<u8> = buf.iter().map(|b| b.wrapping_add(self.delta)).collect();
        down.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self, down: &mut Downstream<'_>) -> io::Result<()> {
        self.flushes += 1;
        down.flush()
    }
}

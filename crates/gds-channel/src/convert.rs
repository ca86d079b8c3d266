//! Converter stacks.
//!
//! A converter transforms bytes in transit between a channel's buffers and
//! its backing store. Converters stack: the last one pushed sees the
//! caller's bytes first on writes and hands the caller its bytes last on
//! reads. Each call receives a [`Downstream`] for everything beneath it,
//! which is the only way a converter can move bytes. It never sees the
//! channel's own buffers, so it cannot re-enter them.

use std::io;

use crate::backend::Backend;
use crate::channel::{Direction, Tap, TapEvent};
use crate::kind::ChannelKind;

/// A filter over a channel's traffic.
///
/// `read` and `write` follow the `std::io` conventions: they may transfer
/// fewer bytes than asked for, and `Ok(0)` from `read` means end of input.
/// A converter may buffer internally; `flush` must push anything it holds
/// down before flushing `down`.
///
/// # Examples
///
/// ```
/// use std::io;
/// use gds_channel::{Converter, Downstream};
///
/// /// Upper-cases ASCII on the way out.
/// struct Shout;
///
/// impl Converter for Shout {
///     fn read(&mut self, down: &mut Downstream<'_>, buf: &mut [u8]) -> io::Result<usize> {
///         down.read(buf)
///     }
///
///     fn write(&mut self, down: &mut Downstream<'_>, buf: &[u8]) -> io::Result<usize> {
///         let loud = buf.to_ascii_uppercase();
///         down.write_all(&loud)?;
///         Ok(buf.len())
///     }
/// }
/// ```
pub trait Converter: Send {
    /// Fill `buf` with converted bytes pulled from `down`.
    fn read(&mut self, down: &mut Downstream<'_>, buf: &mut [u8]) -> io::Result<usize>;

    /// Convert `buf` and push the result into `down`.
    fn write(&mut self, down: &mut Downstream<'_>, buf: &[u8]) -> io::Result<usize>;

    /// Push any internally buffered bytes down, then flush `down`.
    fn flush(&mut self, down: &mut Downstream<'_>) -> io::Result<()> {
        down.flush()
    }

    /// Called once when the converter leaves the channel, after a flush.
    fn close(&mut self, down: &mut Downstream<'_>) -> io::Result<()> {
        let _ = down;
        Ok(())
    }
}

/// The part of a converter stack below one converter, ending at the
/// backing store.
pub struct Downstream<'a> {
    stack: &'a mut [Box<dyn Converter>],
    store: &'a mut Backend,
    taps: &'a mut [Tap],
    kind: ChannelKind,
}

impl<'a> Downstream<'a> {
    pub(crate) fn new(
        stack: &'a mut [Box<dyn Converter>],
        store: &'a mut Backend,
        taps: &'a mut [Tap],
        kind: ChannelKind,
    ) -> Self {
        Self {
            stack,
            store,
            taps,
            kind,
        }
    }

    /// Kind of the channel at the bottom of the stack.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Number of converters still below this point.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Read through the next converter, or from the store.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stack.split_last_mut() {
            Some((top, rest)) => {
                let mut down =
                    Downstream::new(rest, &mut *self.store, &mut *self.taps, self.kind);
                top.read(&mut down, buf)
            }
            None => {
                let n = self.store.read(buf)?;
                self.fire(Direction::Read, n);
                Ok(n)
            }
        }
    }

    /// Write through the next converter, or to the store.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stack.split_last_mut() {
            Some((top, rest)) => {
                let mut down =
                    Downstream::new(rest, &mut *self.store, &mut *self.taps, self.kind);
                top.write(&mut down, buf)
            }
            None => {
                let n = self.store.write(buf)?;
                self.fire(Direction::Write, n);
                Ok(n)
            }
        }
    }

    /// Write all of `buf`, retrying short and interrupted writes.
    pub fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Flush the next converter (which flushes the rest), or the store.
    pub fn flush(&mut self) -> io::Result<()> {
        match self.stack.split_last_mut() {
            Some((top, rest)) => {
                let mut down =
                    Downstream::new(rest, &mut *self.store, &mut *self.taps, self.kind);
                top.flush(&mut down)
            }
            None => self.store.flush(),
        }
    }

    fn fire(&mut self, direction: Direction, bytes: usize) {
        if bytes == 0 || !self.kind.is_streaming() {
            return;
        }
        tracing::trace!(kind = %self.kind, ?direction, bytes, "raw transfer");
        let event = TapEvent {
            kind: self.kind,
            direction,
            bytes,
        };
        for tap in self.taps.iter_mut() {
            tap(&event);
        }
    }
}

impl io::Read for Downstream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Downstream::read(self, buf)
    }
}

impl io::Write for Downstream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Downstream::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Downstream::flush(self)
    }
}

//! The [`Channel`] type.

use std::fmt;
use std::io::{self, Seek, SeekFrom};
use std::net::{SocketAddr, TcpListener};

use gds_core::contract_violation;

use crate::backend::Backend;
use crate::convert::{Converter, Downstream};
use crate::error::ChannelError;
use crate::kind::ChannelKind;
use crate::registry;

pub(crate) type Tap = Box<dyn FnMut(&TapEvent) + Send>;

/// Which way bytes moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// From the backing store towards the caller.
    Read,
    /// From the caller towards the backing store.
    Write,
}

/// One real transfer against a backing store, as seen by a tap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TapEvent {
    /// Kind of the channel.
    pub kind: ChannelKind,
    /// Direction of the transfer.
    pub direction: Direction,
    /// Bytes moved.
    pub bytes: usize,
}

struct ReadBuffer {
    data: Vec<u8>,
    filled: usize,
    consumed: usize,
}

impl ReadBuffer {
    fn new(block_size: usize) -> Self {
        Self {
            data: vec![0; block_size],
            filled: 0,
            consumed: 0,
        }
    }

    fn available(&self) -> usize {
        self.filled - self.consumed
    }

    fn take(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.available());
        out[..n].copy_from_slice(&self.data[self.consumed..self.consumed + n]);
        self.consumed += n;
        n
    }

    fn clear(&mut self) {
        self.filled = 0;
        self.consumed = 0;
    }
}

/// Which way a disk channel's shared file cursor was last used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Idle,
    Reading,
    Writing,
}

/// A buffered byte stream over one backing store.
///
/// Transfers never fail outright: [`read`](Self::read) and
/// [`write`](Self::write) return how many bytes moved, and a short count
/// with [`error`](Self::error) set means the store failed. While an error
/// is stored every transfer returns 0 without touching the store.
///
/// Positions are absolute and kept per direction. On memory regions,
/// sockets and pipes they are independent. A disk file has a single
/// cursor, so switching a disk channel from reading to writing (or back)
/// carries the position across, like an implicit seek.
///
/// Dropping a channel closes it.
pub struct Channel {
    kind: ChannelKind,
    label: String,
    backend: Backend,
    readable: bool,
    writable: bool,
    appends: bool,
    block_size: usize,
    read_buf: ReadBuffer,
    write_buf: Vec<u8>,
    read_pos: u64,
    write_pos: u64,
    mode: Mode,
    converters: Vec<Box<dyn Converter>>,
    taps: Vec<Tap>,
    error: Option<ChannelError>,
    closed: bool,
}

// Compile-time assertion: channels move between threads.
const _: fn() = || {
    fn assert_send<T: Send>() {}
    assert_send::<Channel>();
};

impl Channel {
    pub(crate) fn new(
        kind: ChannelKind,
        label: impl Into<String>,
        backend: Backend,
        block_size: usize,
    ) -> Self {
        registry::register(kind);
        Self {
            kind,
            label: label.into(),
            backend,
            readable: true,
            writable: true,
            appends: false,
            block_size,
            read_buf: ReadBuffer::new(block_size),
            write_buf: Vec::with_capacity(block_size),
            read_pos: 0,
            write_pos: 0,
            mode: Mode::Idle,
            converters: Vec::new(),
            taps: Vec::new(),
            error: None,
            closed: false,
        }
    }

    pub(crate) fn with_access(mut self, readable: bool, writable: bool) -> Self {
        self.readable = readable;
        self.writable = writable;
        self
    }

    pub(crate) fn appending(mut self, end: u64) -> Self {
        self.appends = true;
        self.write_pos = end;
        self
    }

    pub(crate) fn listener(&self) -> Option<&TcpListener> {
        match &self.backend {
            Backend::Dock(listener) => Some(listener),
            _ => None,
        }
    }

    /// The channel's kind, or [`ChannelKind::Undefined`] once closed.
    pub fn kind(&self) -> ChannelKind {
        if self.closed {
            ChannelKind::Undefined
        } else {
            self.kind
        }
    }

    /// Path, address or description given at open time.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Buffer size in bytes; `0` means unbuffered.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether the channel accepts writes.
    pub fn is_writable(&self) -> bool {
        self.writable && !self.closed
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The stored error, if any.
    pub fn error(&self) -> Option<&ChannelError> {
        self.error.as_ref()
    }

    /// Absolute (read, write) positions.
    pub fn tell(&self) -> (u64, u64) {
        (self.read_pos, self.write_pos)
    }

    /// Local socket address of a connection or dock.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.backend {
            Backend::Connection(s) => s.local_addr().ok(),
            Backend::Dock(l) => l.local_addr().ok(),
            _ => None,
        }
    }

    /// Bytes that can be read without blocking: whatever is buffered plus
    /// what the store reports beyond the read position. Sockets and pipes
    /// report only their buffered bytes.
    pub fn bytes_readable(&self) -> u64 {
        let buffered = self.read_buf.available() as u64;
        match &self.backend {
            Backend::Disk(file) => {
                let len = file.metadata().map(|m| m.len()).unwrap_or(0);
                len.saturating_sub(self.read_pos).max(buffered)
            }
            Backend::Memory(_) | Backend::Mapped { .. } => {
                let len = self.backend.region().map_or(0, |r| r.len()) as u64;
                len.saturating_sub(self.read_pos)
            }
            _ => buffered,
        }
    }

    /// The bytes behind a memory or memory-mapped channel, without a copy.
    pub fn mapped_bytes(&self) -> Option<&[u8]> {
        self.backend.region()
    }

    /// Writable access to a memory channel or a writable mapping.
    ///
    /// Returns `None` for read-only mappings.
    pub fn mapped_bytes_mut(&mut self) -> Option<&mut [u8]> {
        if !self.writable {
            return None;
        }
        self.backend.region_mut()
    }

    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// Buffered bytes are served first. A remainder of at least one block
    /// is read straight into `buf`; anything smaller refills the buffer.
    /// A short count means end of input, a non-blocking socket with
    /// nothing ready, or an error (see [`error`](Self::error)). A channel
    /// opened write-only reads nothing and stores no error.
    ///
    /// # Panics
    ///
    /// Raises a [`ContractViolation`](gds_core::ContractViolation) on a
    /// dock.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.error.is_some() || buf.is_empty() {
            return 0;
        }
        if !self.readable {
            tracing::trace!(kind = %self.kind, label = %self.label, "read on a write-only channel");
            return 0;
        }
        match self.kind {
            ChannelKind::Dock => contract_violation("read", "cannot read from a dock"),
            ChannelKind::Memory | ChannelKind::MemoryMapped => self.read_region(buf),
            ChannelKind::Sink | ChannelKind::Undefined => 0,
            ChannelKind::Disk
            | ChannelKind::Connection
            | ChannelKind::NamedPipe
            | ChannelKind::Character => self.read_stream(buf),
        }
    }

    /// Write up to `buf.len()` bytes, returning how many were accepted.
    ///
    /// Bytes are buffered until a block fills. Whole blocks arriving with
    /// an empty buffer go straight down the converter stack. Memory
    /// channels write in place and come up short at the end of the region,
    /// storing [`ChannelError::Exhausted`]. A non-blocking connection that
    /// cannot take more comes up short without storing an error; bytes it
    /// accepted stay buffered until a later write or flush.
    ///
    /// # Panics
    ///
    /// Raises a [`ContractViolation`](gds_core::ContractViolation) on a
    /// dock.
    pub fn write(&mut self, buf: &[u8]) -> usize {
        if self.error.is_some() || buf.is_empty() {
            return 0;
        }
        if !self.writable {
            self.fail(ChannelError::ReadOnly);
            return 0;
        }
        match self.kind {
            ChannelKind::Dock => contract_violation("write", "cannot write to a dock"),
            ChannelKind::Memory | ChannelKind::MemoryMapped => self.write_region(buf),
            ChannelKind::Sink => {
                self.write_pos += buf.len() as u64;
                buf.len()
            }
            ChannelKind::Undefined => 0,
            ChannelKind::Disk
            | ChannelKind::Connection
            | ChannelKind::NamedPipe
            | ChannelKind::Character => self.write_stream(buf),
        }
    }

    /// Push buffered writes through the converter stack to the store, then
    /// flush every converter and the store itself.
    ///
    /// A non-blocking connection that cannot take everything returns an
    /// error for which [`ChannelError::is_would_block`] holds. It is not
    /// stored and the unsent bytes stay buffered, so the flush can be
    /// retried.
    ///
    /// # Panics
    ///
    /// Raises a [`ContractViolation`](gds_core::ContractViolation) on a
    /// dock.
    pub fn flush(&mut self) -> Result<(), ChannelError> {
        if self.kind == ChannelKind::Dock {
            contract_violation("flush", "cannot flush a dock");
        }
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        self.flush_all().inspect_err(|e| self.fail_unless_blocked(e.clone()))
    }

    /// Move both positions to `pos` and clear any stored error.
    ///
    /// A disk channel flushes pending writes, seeks the file to the block
    /// boundary below `pos` and refills its read buffer from there, so the
    /// next read of a nearby position is served from memory.
    ///
    /// # Panics
    ///
    /// Raises a [`ContractViolation`](gds_core::ContractViolation) unless
    /// the channel is a disk, memory or memory-mapped channel.
    pub fn seek(&mut self, pos: u64) -> Result<(), ChannelError> {
        if !self.kind.is_seekable() {
            contract_violation("seek", format!("cannot seek a {} channel", self.kind));
        }
        if self.closed {
            return Err(ChannelError::Closed);
        }
        if self.kind == ChannelKind::Disk {
            let result = self.drain_write_buffer().and_then(|()| self.seek_disk(pos));
            if let Err(e) = result {
                self.error = Some(e.clone());
                return Err(e);
            }
        } else {
            self.read_pos = pos;
            self.write_pos = pos;
        }
        self.error = None;
        tracing::debug!(kind = %self.kind, pos, "seek");
        Ok(())
    }

    /// Push a converter on top of the stack. Pending writes are flushed
    /// through the old stack first.
    ///
    /// # Panics
    ///
    /// Raises a [`ContractViolation`](gds_core::ContractViolation) unless
    /// the channel is a disk, connection, character or pipe channel.
    pub fn push_converter<C: Converter + 'static>(
        &mut self,
        converter: C,
    ) -> Result<(), ChannelError> {
        self.require_streaming("push_converter");
        self.drain_pending()?;
        self.converters.push(Box::new(converter));
        Ok(())
    }

    /// Remove the top converter after flushing pending writes and the
    /// converter itself, and run its close hook.
    ///
    /// # Panics
    ///
    /// Raises a [`ContractViolation`](gds_core::ContractViolation) unless
    /// the channel is a disk, connection, character or pipe channel.
    pub fn pop_converter(&mut self) -> Result<Option<Box<dyn Converter>>, ChannelError> {
        self.require_streaming("pop_converter");
        self.drain_pending()?;
        let Some(mut top) = self.converters.pop() else {
            return Ok(None);
        };
        let mut down = Downstream::new(
            &mut self.converters,
            &mut self.backend,
            &mut self.taps,
            self.kind,
        );
        let result = top.flush(&mut down).and_then(|()| top.close(&mut down));
        if let Err(e) = result {
            let e = ChannelError::from(e);
            self.fail(e.clone());
            return Err(e);
        }
        Ok(Some(top))
    }

    /// Number of converters on the stack.
    pub fn converter_count(&self) -> usize {
        self.converters.len()
    }

    /// Register a callback fired on every real transfer against the store.
    /// Only disk, connection, character and pipe channels fire taps.
    pub fn add_tap<F>(&mut self, tap: F)
    where
        F: FnMut(&TapEvent) + Send + 'static,
    {
        self.taps.push(Box::new(tap));
    }

    /// Remove every tap.
    pub fn clear_taps(&mut self) {
        self.taps.clear();
    }

    /// Flush, close every converter and release the store.
    ///
    /// Later calls return `Ok(())` without doing anything. After closing,
    /// transfers return 0 and [`error`](Self::error) reports
    /// [`ChannelError::Closed`]. An error stored before closing skips the
    /// flush and is returned.
    pub fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        let mut result = match self.error.take() {
            Some(e) => Err(e),
            None if self.kind == ChannelKind::Dock => Ok(()),
            None => self.flush_all(),
        };
        while let Some(mut top) = self.converters.pop() {
            let mut down = Downstream::new(
                &mut self.converters,
                &mut self.backend,
                &mut self.taps,
                self.kind,
            );
            if let Err(e) = top.close(&mut down) {
                result = result.and(Err(e.into()));
            }
        }
        self.backend = Backend::Released;
        self.read_buf.clear();
        self.write_buf.clear();
        self.closed = true;
        self.error = Some(ChannelError::Closed);
        registry::unregister(self.kind);
        result
    }

    fn fail(&mut self, error: ChannelError) {
        if self.error.is_none() {
            tracing::debug!(kind = %self.kind, label = %self.label, %error, "channel error stored");
            self.error = Some(error);
        }
    }

    /// Store `error` unless the store merely could not take bytes yet.
    fn fail_unless_blocked(&mut self, error: ChannelError) {
        if error.is_would_block() {
            tracing::trace!(kind = %self.kind, label = %self.label, "store would block");
        } else {
            self.fail(error);
        }
    }

    fn require_streaming(&self, operation: &'static str) {
        if !self.kind.is_streaming() {
            contract_violation(
                operation,
                format!("{} channels do not take converters", self.kind),
            );
        }
    }

    fn drain_pending(&mut self) -> Result<(), ChannelError> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        self.drain_write_buffer()
            .inspect_err(|e| self.fail_unless_blocked(e.clone()))
    }

    fn downstream(&mut self) -> Downstream<'_> {
        Downstream::new(
            &mut self.converters,
            &mut self.backend,
            &mut self.taps,
            self.kind,
        )
    }

    /// Send the write buffer down. Bytes the store did not take stay
    /// buffered.
    fn drain_write_buffer(&mut self) -> Result<(), ChannelError> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        let mut pending = std::mem::take(&mut self.write_buf);
        let (sent, result) = self.send(&pending);
        pending.drain(..sent);
        self.write_buf = pending;
        result.map_err(ChannelError::from)
    }

    /// Write `buf` down the stack until it is all sent or the store
    /// fails, returning how much was sent either way.
    fn send(&mut self, mut buf: &[u8]) -> (usize, io::Result<()>) {
        let mut down = self.downstream();
        let mut sent = 0;
        while !buf.is_empty() {
            match down.write(buf) {
                Ok(0) => return (sent, Err(io::ErrorKind::WriteZero.into())),
                Ok(n) => {
                    sent += n;
                    buf = &buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return (sent, Err(e)),
            }
        }
        (sent, Ok(()))
    }

    fn flush_all(&mut self) -> Result<(), ChannelError> {
        match self.kind {
            ChannelKind::Memory | ChannelKind::Sink | ChannelKind::Undefined => Ok(()),
            ChannelKind::MemoryMapped | ChannelKind::Dock => Ok(self.backend.flush()?),
            ChannelKind::Disk
            | ChannelKind::Connection
            | ChannelKind::NamedPipe
            | ChannelKind::Character => {
                self.drain_write_buffer()?;
                Ok(self.downstream().flush()?)
            }
        }
    }

    /// Line the disk cursor up with the direction about to be used.
    fn enter(&mut self, mode: Mode) -> Result<(), ChannelError> {
        if self.kind != ChannelKind::Disk || self.mode == mode {
            self.mode = mode;
            return Ok(());
        }
        match (self.mode, mode) {
            (Mode::Reading, Mode::Writing) => {
                let pos = self.read_pos;
                self.read_buf.clear();
                if let Backend::Disk(file) = &mut self.backend {
                    if self.appends {
                        self.write_pos = file.metadata()?.len();
                    } else {
                        file.seek(SeekFrom::Start(pos))?;
                        self.write_pos = pos;
                    }
                }
            }
            (Mode::Writing, Mode::Reading) => {
                self.drain_write_buffer()?;
                let pos = self.write_pos;
                if let Backend::Disk(file) = &mut self.backend {
                    file.seek(SeekFrom::Start(pos))?;
                }
                self.read_pos = pos;
            }
            _ => {}
        }
        self.mode = mode;
        Ok(())
    }

    fn seek_disk(&mut self, pos: u64) -> Result<(), ChannelError> {
        let block = self.block_size as u64;
        let boundary = if block == 0 || !self.readable {
            pos
        } else {
            pos - pos % block
        };
        self.read_buf.clear();
        if let Backend::Disk(file) = &mut self.backend {
            file.seek(SeekFrom::Start(boundary))?;
        }
        self.read_pos = pos;
        self.write_pos = pos;
        self.mode = Mode::Idle;
        if self.appends {
            if let Backend::Disk(file) = &self.backend {
                self.write_pos = file.metadata()?.len();
            }
        }
        if boundary == pos {
            return Ok(());
        }
        let skip = (pos - boundary) as usize;
        let mut filled = 0;
        while filled < self.block_size {
            let mut down = Downstream::new(
                &mut self.converters,
                &mut self.backend,
                &mut self.taps,
                self.kind,
            );
            match down.read(&mut self.read_buf.data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        if filled < skip {
            // past the end of the file
            if let Backend::Disk(file) = &mut self.backend {
                file.seek(SeekFrom::Start(pos))?;
            }
            return Ok(());
        }
        self.read_buf.filled = filled;
        self.read_buf.consumed = skip;
        self.mode = Mode::Reading;
        Ok(())
    }

    fn read_stream(&mut self, buf: &mut [u8]) -> usize {
        if let Err(e) = self.enter(Mode::Reading) {
            self.fail(e);
            return 0;
        }
        let mut done = self.read_buf.take(buf);
        while done < buf.len() {
            let direct = buf.len() - done >= self.block_size;
            let mut down = Downstream::new(
                &mut self.converters,
                &mut self.backend,
                &mut self.taps,
                self.kind,
            );
            let result = if direct {
                down.read(&mut buf[done..])
            } else {
                down.read(&mut self.read_buf.data)
            };
            match result {
                Ok(0) => break,
                Ok(n) if direct => done += n,
                Ok(n) => {
                    self.read_buf.filled = n;
                    self.read_buf.consumed = 0;
                    done += self.read_buf.take(&mut buf[done..]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.fail(e.into());
                    break;
                }
            }
        }
        self.read_pos += done as u64;
        done
    }

    fn write_stream(&mut self, buf: &[u8]) -> usize {
        if let Err(e) = self.enter(Mode::Writing) {
            self.fail(e);
            return 0;
        }
        let block = self.block_size;
        let mut done = 0;
        while done < buf.len() {
            let rest = &buf[done..];
            if self.write_buf.is_empty() && rest.len() >= block {
                let (sent, result) = self.send(rest);
                done += sent;
                if let Err(e) = result {
                    self.fail_unless_blocked(e.into());
                    break;
                }
                continue;
            }
            if self.write_buf.len() < block {
                let take = rest.len().min(block - self.write_buf.len());
                self.write_buf.extend_from_slice(&rest[..take]);
                done += take;
            }
            if self.write_buf.len() == block {
                if let Err(e) = self.drain_write_buffer() {
                    self.fail_unless_blocked(e);
                    break;
                }
            }
        }
        self.write_pos += done as u64;
        done
    }

    fn read_region(&mut self, buf: &mut [u8]) -> usize {
        let Some(region) = self.backend.region() else {
            return 0;
        };
        let start = (self.read_pos as usize).min(region.len());
        let n = buf.len().min(region.len() - start);
        buf[..n].copy_from_slice(&region[start..start + n]);
        self.read_pos += n as u64;
        n
    }

    fn write_region(&mut self, buf: &[u8]) -> usize {
        let start = self.write_pos as usize;
        let (n, capacity) = match self.backend.region_mut() {
            None => {
                self.fail(ChannelError::ReadOnly);
                return 0;
            }
            Some(region) => {
                let start = start.min(region.len());
                let n = buf.len().min(region.len() - start);
                region[start..start + n].copy_from_slice(&buf[..n]);
                (n, region.len() as u64)
            }
        };
        self.write_pos += n as u64;
        if n < buf.len() {
            self.fail(ChannelError::Exhausted { capacity });
        }
        n
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::warn!(kind = %self.kind, label = %self.label, %error, "close on drop failed");
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("kind", &self.kind())
            .field("label", &self.label)
            .field("block_size", &self.block_size)
            .field("read_pos", &self.read_pos)
            .field("write_pos", &self.write_pos)
            .field("converters", &self.converters.len())
            .field("error", &self.error)
            .finish()
    }
}

impl io::Read for Channel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = Channel::read(self, buf);
        if n == 0 && !buf.is_empty() {
            if let Some(e) = &self.error {
                return Err(e.clone().into());
            }
        }
        Ok(n)
    }
}

impl io::Write for Channel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = Channel::write(self, buf);
        if n == 0 && !buf.is_empty() {
            return Err(match &self.error {
                Some(e) => e.clone().into(),
                None => io::ErrorKind::WouldBlock.into(),
            });
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(Channel::flush(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open::{create_sink, open_memory};
    use gds_core::ContractViolation;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn memory_write_past_the_end_is_short() {
        let mut ch = open_memory(None, 64);
        assert_eq!(ch.write(&[1; 40]), 40);
        assert_eq!(ch.write(&[2; 30]), 24);
        assert_eq!(ch.tell(), (0, 64));
        assert_eq!(ch.error(), Some(&ChannelError::Exhausted { capacity: 64 }));
        // fail fast until cleared
        assert_eq!(ch.write(&[3]), 0);
        let mut byte = [0u8; 1];
        assert_eq!(ch.read(&mut byte), 0);
        ch.seek(39).unwrap();
        assert_eq!(ch.error(), None);
        let mut two = [0u8; 2];
        assert_eq!(ch.read(&mut two), 2);
        assert_eq!(two, [1, 2]);
    }

    #[test]
    fn memory_positions_are_independent() {
        let mut ch = open_memory(Some(b"abcdef".to_vec()), 6);
        let mut two = [0u8; 2];
        assert_eq!(ch.read(&mut two), 2);
        assert_eq!(&two, b"ab");
        assert_eq!(ch.write(b"XY"), 2);
        assert_eq!(ch.tell(), (2, 2));
        assert_eq!(ch.mapped_bytes(), Some(&b"XYcdef"[..]));
        assert_eq!(ch.bytes_readable(), 4);
    }

    #[test]
    fn sink_advances_writes_and_reads_eof() {
        let mut ch = create_sink();
        assert_eq!(ch.write(&[0; 100]), 100);
        let mut buf = [0u8; 8];
        assert_eq!(ch.read(&mut buf), 0);
        assert_eq!(ch.tell(), (0, 100));
        assert!(ch.error().is_none());
        assert!(ch.flush().is_ok());
    }

    #[test]
    fn seeking_a_sink_is_a_contract_violation() {
        let mut ch = create_sink();
        let payload = catch_unwind(AssertUnwindSafe(|| ch.seek(0))).unwrap_err();
        let violation = payload.downcast_ref::<ContractViolation>().unwrap();
        assert_eq!(violation.operation, "seek");
    }

    #[test]
    fn converters_are_refused_on_memory() {
        let mut ch = open_memory(None, 8);
        let payload = catch_unwind(AssertUnwindSafe(|| ch.pop_converter())).err().unwrap();
        let violation = payload.downcast_ref::<ContractViolation>().unwrap();
        assert_eq!(violation.operation, "pop_converter");
    }

    #[test]
    fn close_is_idempotent() {
        let mut ch = open_memory(None, 8);
        assert_eq!(ch.write(b"hi"), 2);
        ch.close().unwrap();
        ch.close().unwrap();
        assert!(ch.is_closed());
        assert_eq!(ch.kind(), ChannelKind::Undefined);
        assert_eq!(ch.write(b"x"), 0);
        assert_eq!(ch.error(), Some(&ChannelError::Closed));
        assert_eq!(ch.mapped_bytes(), None);
        assert_eq!(ch.seek(0), Err(ChannelError::Closed));
    }

    #[test]
    fn io_traits_surface_stored_errors() {
        use std::io::{Read, Write};
        let mut ch = open_memory(None, 4);
        assert!(ch.write_all(b"abcdef").is_err());
        let mut out = Vec::new();
        ch.seek(0).unwrap();
        ch.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcd");
    }

    #[test]
    fn read_buffer_take_is_bounded() {
        let mut rb = ReadBuffer::new(4);
        rb.data.copy_from_slice(b"wxyz");
        rb.filled = 3;
        let mut out = [0u8; 8];
        assert_eq!(rb.take(&mut out), 3);
        assert_eq!(&out[..3], b"wxy");
        assert_eq!(rb.available(), 0);
    }
}

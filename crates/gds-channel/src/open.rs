//! Opening channels.

use std::fs::{File, Metadata, OpenOptions};
use std::io::{self, Read};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::path::Path;

use gds_core::contract_violation;

use crate::backend::{Backend, PipeEnd};
use crate::channel::Channel;
use crate::config::ChannelConfig;
use crate::error::ChannelError;
use crate::kind::{ChannelKind, MapPolicy, OpenMode};
use crate::mapped::Mapping;

/// Open `path` with a POSIX-style mode string (`"r"`, `"w"`, `"a"`,
/// `"r+"`, `"w+"`, `"a+"` or `"W"` for write-without-truncate).
///
/// FIFOs open as [`ChannelKind::NamedPipe`] channels and character devices
/// as [`ChannelKind::Character`]; everything else is a
/// [`ChannelKind::Disk`] channel buffered at the filesystem block size.
///
/// # Examples
///
/// ```
/// use gds_channel::open_file;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("hello.bin");
/// let mut out = open_file(&path, "w").unwrap();
/// assert_eq!(out.write(b"hello"), 5);
/// out.close().unwrap();
///
/// let mut input = open_file(&path, "r").unwrap();
/// let mut buf = [0u8; 5];
/// assert_eq!(input.read(&mut buf), 5);
/// assert_eq!(&buf, b"hello");
/// ```
pub fn open_file(path: impl AsRef<Path>, mode: &str) -> Result<Channel, ChannelError> {
    open_file_with(path, mode, &ChannelConfig::default())
}

/// [`open_file`] with explicit configuration.
pub fn open_file_with(
    path: impl AsRef<Path>,
    mode: &str,
    config: &ChannelConfig,
) -> Result<Channel, ChannelError> {
    let mode: OpenMode = mode.parse()?;
    let path = path.as_ref();
    let file = mode.options().open(path)?;
    let meta = file.metadata()?;
    let kind = file_kind(&meta);
    let block = config
        .buffer_size
        .unwrap_or_else(|| natural_block_size(&meta, kind));
    let backend = match kind {
        ChannelKind::NamedPipe => Backend::Pipe(PipeEnd::Fifo(file)),
        ChannelKind::Character => Backend::Character(file),
        _ => Backend::Disk(file),
    };
    let mut channel = Channel::new(kind, path.display().to_string(), backend, block)
        .with_access(mode.readable(), mode.writable());
    if mode.appends() && kind == ChannelKind::Disk {
        channel = channel.appending(meta.len());
    }
    tracing::debug!(path = %path.display(), mode = mode.as_str(), %kind, block, "opened file");
    Ok(channel)
}

#[cfg(unix)]
fn file_kind(meta: &Metadata) -> ChannelKind {
    use std::os::unix::fs::FileTypeExt;
    let file_type = meta.file_type();
    if file_type.is_fifo() {
        ChannelKind::NamedPipe
    } else if file_type.is_char_device() {
        ChannelKind::Character
    } else {
        ChannelKind::Disk
    }
}

#[cfg(not(unix))]
fn file_kind(_meta: &Metadata) -> ChannelKind {
    ChannelKind::Disk
}

#[cfg(unix)]
fn natural_block_size(meta: &Metadata, kind: ChannelKind) -> usize {
    use std::os::unix::fs::MetadataExt;
    match (kind, meta.blksize()) {
        (ChannelKind::Disk, size) if size > 0 => size as usize,
        _ => kind.default_block_size(),
    }
}

#[cfg(not(unix))]
fn natural_block_size(_meta: &Metadata, kind: ChannelKind) -> usize {
    kind.default_block_size()
}

/// A memory channel over a region of `size` bytes.
///
/// The region starts as `initial` (truncated or zero-padded to `size`), or
/// all zeros. Reads and writes stop at the end of the region.
pub fn open_memory(initial: Option<Vec<u8>>, size: usize) -> Channel {
    let mut region = initial.unwrap_or_default();
    region.resize(size, 0);
    Channel::new(ChannelKind::Memory, "memory", Backend::Memory(region), 0)
}

/// Open `path` as a memory-mapped channel when `policy` allows, falling
/// back to a buffered disk channel otherwise.
///
/// `writable` mappings write through to the file when `update_on_write`
/// is set and are private copy-on-write mappings when it is not. A private
/// mapping that falls back becomes a memory channel holding a copy of the
/// file, so writes still stay in the process.
pub fn map_disc(
    path: impl AsRef<Path>,
    policy: MapPolicy,
    writable: bool,
    update_on_write: bool,
) -> Result<Channel, ChannelError> {
    map_disc_with(path, policy, writable, update_on_write, &ChannelConfig::default())
}

/// [`map_disc`] with explicit configuration.
pub fn map_disc_with(
    path: impl AsRef<Path>,
    policy: MapPolicy,
    writable: bool,
    update_on_write: bool,
    config: &ChannelConfig,
) -> Result<Channel, ChannelError> {
    let path = path.as_ref();
    let shared_write = writable && update_on_write;
    let file = OpenOptions::new().read(true).write(shared_write).open(path)?;
    let meta = file.metadata()?;
    // Network filesystems are not detected; every regular file counts as local.
    let local = meta.is_file();
    let large = meta.len() >= config.large_mmap_threshold;
    if policy.wants_map(local, large) {
        match Mapping::map(&file, writable, update_on_write) {
            Ok(mapping) => {
                tracing::debug!(path = %path.display(), ?policy, writable, "mapped file");
                let backend = Backend::Mapped {
                    mapping,
                    _file: file,
                };
                return Ok(
                    Channel::new(ChannelKind::MemoryMapped, path.display().to_string(), backend, 0)
                        .with_access(true, writable),
                );
            }
            Err(e) if policy.falls_back() => {
                tracing::debug!(path = %path.display(), error = %e, "mapping failed, falling back");
            }
            Err(e) => return Err(e.into()),
        }
    }
    if writable && !update_on_write {
        return private_copy(file, meta.len());
    }
    drop(file);
    open_file_with(path, if shared_write { "r+" } else { "r" }, config)
}

fn private_copy(mut file: File, len: u64) -> Result<Channel, ChannelError> {
    let mut contents = Vec::with_capacity(len as usize);
    file.read_to_end(&mut contents)?;
    let size = contents.len();
    Ok(open_memory(Some(contents), size))
}

/// Connect to `host:port`.
pub fn open_connection(host: &str, port: u16) -> Result<Channel, ChannelError> {
    open_connection_with(host, port, &ChannelConfig::default())
}

/// [`open_connection`] with explicit configuration.
pub fn open_connection_with(
    host: &str,
    port: u16,
    config: &ChannelConfig,
) -> Result<Channel, ChannelError> {
    let stream = TcpStream::connect((host, port))?;
    connection(stream, config)
}

fn connection(stream: TcpStream, config: &ChannelConfig) -> Result<Channel, ChannelError> {
    stream.set_nodelay(true)?;
    stream.set_nonblocking(config.nonblocking)?;
    let label = stream
        .peer_addr()
        .map_or_else(|_| "connection".to_string(), |a| a.to_string());
    let block = config
        .buffer_size
        .unwrap_or(ChannelKind::Connection.default_block_size());
    tracing::debug!(%label, block, nonblocking = config.nonblocking, "connection opened");
    Ok(Channel::new(
        ChannelKind::Connection,
        label,
        Backend::Connection(stream),
        block,
    ))
}

/// Listen on `addr`. Connections are taken with [`accept_on_dock`].
pub fn open_dock(addr: impl ToSocketAddrs) -> Result<Channel, ChannelError> {
    let listener = TcpListener::bind(addr)?;
    let label = listener
        .local_addr()
        .map_or_else(|_| "dock".to_string(), |a| a.to_string());
    Ok(Channel::new(ChannelKind::Dock, label, Backend::Dock(listener), 0))
}

/// Block until a client connects to `dock` and return the connection.
///
/// # Panics
///
/// Raises a [`ContractViolation`](gds_core::ContractViolation) if `dock`
/// is not an open dock.
pub fn accept_on_dock(dock: &mut Channel) -> Result<Channel, ChannelError> {
    let Some(listener) = dock.listener() else {
        contract_violation(
            "accept_on_dock",
            format!("{} channel is not a dock", dock.kind()),
        );
    };
    let (stream, _) = listener.accept()?;
    connection(stream, &ChannelConfig::default())
}

/// An anonymous pipe as a (read end, write end) pair.
pub fn create_pipe() -> Result<(Channel, Channel), ChannelError> {
    let (reader, writer) = io::pipe()?;
    let block = ChannelKind::NamedPipe.default_block_size();
    let read_end = Channel::new(
        ChannelKind::NamedPipe,
        "pipe:read",
        Backend::Pipe(PipeEnd::Reader(reader)),
        block,
    )
    .with_access(true, false);
    let write_end = Channel::new(
        ChannelKind::NamedPipe,
        "pipe:write",
        Backend::Pipe(PipeEnd::Writer(writer)),
        block,
    )
    .with_access(false, true);
    Ok((read_end, write_end))
}

/// A channel that discards writes and reads as end-of-file.
pub fn create_sink() -> Channel {
    Channel::new(ChannelKind::Sink, "sink", Backend::Sink, 0)
}

//! Integration tests: channel behaviour over real files, pipes and sockets.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use std::thread;
use std::time::Duration;

use gds_channel::{
    accept_on_dock, create_pipe, create_sink, map_disc, open_connection_with, open_dock,
    open_file, open_file_with, open_memory, Channel, ChannelConfig, ChannelError, ChannelKind,
    Direction, MapPolicy,
};
use gds_core::ContractViolation;
use gds_test_utils::{loopback, pattern, OffsetConverter, XorConverter};
use proptest::prelude::*;

fn read_exact(ch: &mut Channel, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    let n = ch.read(&mut buf);
    buf.truncate(n);
    buf
}

fn read_in_splits(ch: &mut Channel, splits: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    for &len in splits {
        out.extend(read_exact(ch, len));
    }
    out
}

// ── Disk ────────────────────────────────────────────────────────────

#[test]
fn disk_seek_mid_block_reads_the_original_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scratch.bin");
    let data = pattern(10_000);
    let mut ch = open_file(&path, "w+").unwrap();
    assert_eq!(ch.kind(), ChannelKind::Disk);
    assert_eq!(ch.write(&data), 10_000);
    assert_eq!(ch.tell().1, 10_000);

    ch.seek(4096).unwrap();
    assert_eq!(read_exact(&mut ch, 10), &data[4096..4106]);
    assert_eq!(ch.tell(), (4106, 4096));

    ch.seek(4095).unwrap();
    assert_eq!(read_exact(&mut ch, 3), &data[4095..4098]);
    ch.seek(9_998).unwrap();
    assert_eq!(read_exact(&mut ch, 10), &data[9_998..]);
    assert!(ch.error().is_none());
}

#[test]
fn disk_small_buffer_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small.bin");
    let config = ChannelConfig::new().with_buffer_size(16);
    let data = pattern(1000);
    let mut ch = open_file_with(&path, "w+", &config).unwrap();
    assert_eq!(ch.block_size(), 16);
    for chunk in data.chunks(7) {
        assert_eq!(ch.write(chunk), chunk.len());
    }
    ch.seek(100).unwrap();
    assert_eq!(read_exact(&mut ch, 50), &data[100..150]);
    ch.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), data);
}

#[test]
fn disk_read_then_write_continues_at_the_read_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("update.bin");
    std::fs::write(&path, b"abcdefgh").unwrap();
    let mut ch = open_file(&path, "r+").unwrap();
    assert_eq!(read_exact(&mut ch, 3), b"abc");
    assert_eq!(ch.write(b"XY"), 2);
    assert_eq!(ch.tell(), (3, 5));
    assert_eq!(read_exact(&mut ch, 3), b"fgh");
    ch.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"abcXYfgh");
}

#[test]
fn disk_bytes_readable_tracks_the_read_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sized.bin");
    std::fs::write(&path, pattern(300)).unwrap();
    let mut ch = open_file(&path, "r").unwrap();
    assert_eq!(ch.bytes_readable(), 300);
    read_exact(&mut ch, 120);
    assert_eq!(ch.bytes_readable(), 180);
    assert_eq!(read_exact(&mut ch, 500).len(), 180);
    assert!(ch.error().is_none());
}

#[test]
fn reading_a_write_only_file_keeps_it_writable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt");
    let mut ch = open_file(&path, "w").unwrap();
    assert_eq!(ch.write(b"hello"), 5);
    assert_eq!(read_exact(&mut ch, 1), b"");
    assert!(ch.error().is_none());
    assert_eq!(ch.write(b"world"), 5);
    ch.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"helloworld");
}

// ── Converters and taps ─────────────────────────────────────────────

#[test]
fn converters_run_last_pushed_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("converted.bin");
    let data = pattern(5000);
    let (key, delta) = (0x0f_u8, 3_u8);

    let mut ch = open_file(&path, "w+").unwrap();
    ch.push_converter(XorConverter::new(key)).unwrap();
    ch.push_converter(OffsetConverter::new(delta)).unwrap();
    assert_eq!(ch.converter_count(), 2);
    assert_eq!(ch.write(&data), data.len());
    ch.flush().unwrap();

    let stored = std::fs::read(&path).unwrap();
    let expected: Vec<u8> = data.iter().map(|b| b.wrapping_add(delta) ^ key).collect();
    assert_eq!(stored, expected);

    ch.seek(0).unwrap();
    assert_eq!(read_exact(&mut ch, data.len()), data);

    assert!(ch.pop_converter().unwrap().is_some());
    assert!(ch.pop_converter().unwrap().is_some());
    assert!(ch.pop_converter().unwrap().is_none());
}

#[test]
fn pushing_a_converter_flushes_pending_writes_untransformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixed.bin");
    let mut ch = open_file(&path, "w").unwrap();
    assert_eq!(ch.write(b"plain"), 5);
    ch.push_converter(XorConverter::new(0xff)).unwrap();
    assert_eq!(ch.write(&[0x00]), 1);
    ch.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"plain\xff");
}

#[test]
fn taps_see_only_real_transfers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tapped.bin");
    let writes = Arc::new(AtomicUsize::new(0));
    let read_bytes = Arc::new(AtomicUsize::new(0));
    let config = ChannelConfig::new().with_buffer_size(16);
    let mut ch = open_file_with(&path, "w+", &config).unwrap();
    {
        let writes = Arc::clone(&writes);
        let read_bytes = Arc::clone(&read_bytes);
        ch.add_tap(move |event| match event.direction {
            Direction::Write => {
                writes.fetch_add(1, Ordering::SeqCst);
            }
            Direction::Read => {
                read_bytes.fetch_add(event.bytes, Ordering::SeqCst);
            }
        });
    }
    assert_eq!(ch.write(&[1; 10]), 10);
    assert_eq!(writes.load(Ordering::SeqCst), 0);
    assert_eq!(ch.write(&[2; 10]), 10);
    assert_eq!(writes.load(Ordering::SeqCst), 1);
    ch.flush().unwrap();
    assert_eq!(writes.load(Ordering::SeqCst), 2);

    ch.seek(0).unwrap();
    assert_eq!(read_exact(&mut ch, 20).len(), 20);
    assert_eq!(read_bytes.load(Ordering::SeqCst), 20);

    let mut mem = open_memory(None, 8);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    mem.add_tap(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    mem.write(b"abc");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn converters_are_refused_on_sinks() {
    let mut sink = create_sink();
    let payload = catch_unwind(AssertUnwindSafe(|| {
        sink.push_converter(XorConverter::new(1))
    }))
    .unwrap_err();
    let violation = payload.downcast_ref::<ContractViolation>().unwrap();
    assert_eq!(violation.operation, "push_converter");
}

// ── Pipes, sockets and sinks ────────────────────────────────────────

#[test]
fn pipe_pair_transfers_in_order() {
    let (mut rx, mut tx) = create_pipe().unwrap();
    assert_eq!(rx.kind(), ChannelKind::NamedPipe);
    assert_eq!(tx.write(b"hello "), 6);
    assert_eq!(tx.write(b"pipe"), 4);
    tx.flush().unwrap();
    assert_eq!(read_exact(&mut rx, 10), b"hello pipe");
    assert_eq!(read_exact(&mut tx, 1), b"");
    assert!(tx.error().is_none());
    assert_eq!(tx.write(b"!"), 1);
    tx.close().unwrap();
    assert_eq!(read_exact(&mut rx, 4), b"!");
    assert_eq!(read_exact(&mut rx, 4), b"");
    assert!(rx.error().is_none());
    assert_eq!(rx.tell(), (11, 0));

    assert_eq!(rx.write(b"x"), 0);
    assert_eq!(rx.error(), Some(&ChannelError::ReadOnly));
}

#[test]
fn seeking_a_pipe_is_a_contract_violation() {
    let (mut rx, _tx) = create_pipe().unwrap();
    let payload = catch_unwind(AssertUnwindSafe(|| rx.seek(0))).unwrap_err();
    assert!(payload.downcast_ref::<ContractViolation>().is_some());
}

#[test]
fn loopback_connection_round_trip() {
    let (mut client, mut server) = loopback().unwrap();
    assert_eq!(client.kind(), ChannelKind::Connection);
    let data = pattern(10_000);
    assert_eq!(client.write(&data), data.len());
    client.flush().unwrap();
    let got = read_in_splits(&mut server, &[1, 4095, 4096, 1000, 808]);
    assert_eq!(got, data);
    assert_eq!(server.tell(), (10_000, 0));
}

#[test]
fn nonblocking_connection_stalls_without_storing_an_error() {
    let mut dock = open_dock("127.0.0.1:0").unwrap();
    let port = dock.local_addr().unwrap().port();
    let config = ChannelConfig::new().with_nonblocking(true);
    let mut client = open_connection_with("127.0.0.1", port, &config).unwrap();
    let mut server = accept_on_dock(&mut dock).unwrap();

    // Nobody reads, so the socket buffers fill and a write comes up short.
    let chunk = pattern(1 << 16);
    let mut sent = 0;
    let mut stalled = false;
    while sent < 1 << 30 {
        let n = client.write(&chunk);
        sent += n;
        if n < chunk.len() {
            stalled = true;
            break;
        }
    }
    assert!(stalled);
    assert!(client.error().is_none());

    // Small writes are buffered, and a blocked flush keeps them.
    let tail = b"tail".to_vec();
    assert_eq!(client.write(&tail), tail.len());
    let mut expected: Vec<u8> = chunk.iter().copied().cycle().take(sent).collect();
    expected.extend_from_slice(&tail);

    let total = expected.len();
    let reader = thread::spawn(move || read_exact(&mut server, total));
    loop {
        match client.flush() {
            Ok(()) => break,
            Err(e) => {
                assert!(e.is_would_block(), "{e}");
                assert!(client.error().is_none());
                thread::sleep(Duration::from_millis(1));
            }
        }
    }
    assert_eq!(reader.join().unwrap(), expected);
}

#[test]
fn sink_reports_eof_while_counting_writes() {
    let mut sink = create_sink();
    for _ in 0..3 {
        assert_eq!(sink.write(&[0; 1000]), 1000);
    }
    assert_eq!(read_exact(&mut sink, 10), b"");
    assert_eq!(sink.tell(), (0, 3000));
    assert_eq!(sink.bytes_readable(), 0);
}

// ── Memory maps ─────────────────────────────────────────────────────

#[test]
fn read_only_mapping_exposes_bytes_without_copy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mapped.bin");
    let data = pattern(5000);
    std::fs::write(&path, &data).unwrap();
    let mut ch = map_disc(&path, MapPolicy::Always, false, false).unwrap();
    assert_eq!(ch.kind(), ChannelKind::MemoryMapped);
    assert_eq!(ch.mapped_bytes(), Some(&data[..]));
    assert!(ch.mapped_bytes_mut().is_none());
    assert_eq!(read_exact(&mut ch, 100), &data[..100]);
    assert_eq!(ch.bytes_readable(), 4900);
    assert_eq!(ch.write(b"x"), 0);
    assert_eq!(ch.error(), Some(&ChannelError::ReadOnly));
}

#[test]
fn shared_mapping_writes_reach_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.bin");
    std::fs::write(&path, [0u8; 64]).unwrap();
    let mut ch = map_disc(&path, MapPolicy::Always, true, true).unwrap();
    ch.mapped_bytes_mut().unwrap()[0] = 0xee;
    ch.seek(10).unwrap();
    assert_eq!(ch.write(b"abc"), 3);
    ch.close().unwrap();
    let stored = std::fs::read(&path).unwrap();
    assert_eq!(stored[0], 0xee);
    assert_eq!(&stored[10..13], b"abc");
}

#[test]
fn private_mapping_leaves_the_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("private.bin");
    std::fs::write(&path, [1u8; 32]).unwrap();
    let mut ch = map_disc(&path, MapPolicy::Always, true, false).unwrap();
    assert_eq!(ch.write(&[9; 8]), 8);
    assert_eq!(&ch.mapped_bytes().unwrap()[..8], &[9; 8]);
    drop(ch);
    assert_eq!(std::fs::read(&path).unwrap(), vec![1u8; 32]);
}

#[test]
fn mapping_writes_stop_at_the_end_of_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.bin");
    std::fs::write(&path, [0u8; 4]).unwrap();
    let mut ch = map_disc(&path, MapPolicy::IfAvailable, true, true).unwrap();
    assert_eq!(ch.write(b"abcdef"), 4);
    assert_eq!(ch.error(), Some(&ChannelError::Exhausted { capacity: 4 }));
}

// ── Split-read idempotence ──────────────────────────────────────────

fn splits(total: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..600, 1..20).prop_map(move |mut v| {
        let sum: usize = v.iter().sum();
        if sum < total {
            v.push(total - sum);
        }
        v
    })
}

#[cfg(not(miri))]
mod proptests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn memory_split_reads_match_one_read(parts in splits(2000)) {
            let data = pattern(2000);
            let mut whole = open_memory(Some(data.clone()), data.len());
            let mut split = open_memory(Some(data.clone()), data.len());
            let expected = read_exact(&mut whole, 2000);
            let got = read_in_splits(&mut split, &parts);
            prop_assert_eq!(&got[..], &expected[..got.len()]);
            prop_assert_eq!(split.tell().0, got.len() as u64);
        }

        #[test]
        fn connection_split_reads_match_what_was_sent(parts in splits(2500)) {
            let (mut client, mut server) = loopback().unwrap();
            let data = pattern(2500);
            prop_assert_eq!(client.write(&data), data.len());
            client.close().unwrap();
            let got = read_in_splits(&mut server, &parts);
            prop_assert_eq!(&got[..], &data[..]);
            prop_assert_eq!(server.tell().0, 2500);
            prop_assert!(server.error().is_none());
        }

        #[test]
        fn disk_split_reads_match_one_read(parts in splits(3000), block in 1usize..700) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("split.bin");
            let data = pattern(3000);
            std::fs::write(&path, &data).unwrap();
            let config = ChannelConfig::new().with_buffer_size(block);
            let mut ch = open_file_with(&path, "r", &config).unwrap();
            let got = read_in_splits(&mut ch, &parts);
            prop_assert_eq!(&got[..], &data[..got.len()]);
            prop_assert!(ch.error().is_none());
        }
    }
}

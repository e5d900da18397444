// LogPump - tests/e2e_pump.rs
//
// End-to-end tests for the pump: real UTF-16LE files written into temporary
// directories, real polling on the worker thread, entries collected through
// the hand-off queue. No mocks.

use logpump::{Entry, EntryReceiver, Pump, PumpConfig};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

const BOM: [u8; 2] = [0xFF, 0xFE];

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn record(second: u32, sequence: u64, payload: &str) -> String {
    format!("2021-04-15T21:30:{second:02}\t{sequence}\t{payload}\r\n")
}

/// Create a log file holding only the BOM, as the game does on rotation.
fn create_log(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), BOM).unwrap();
}

fn append(dir: &Path, name: &str, text: &str) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(dir.join(name))
        .unwrap();
    file.write_all(&utf16(text)).unwrap();
}

fn fast_config() -> PumpConfig {
    PumpConfig {
        scan_interval: Duration::from_millis(25),
        ..PumpConfig::default()
    }
}

/// Drain `rx` until `count` entries have arrived or five seconds pass.
fn collect(rx: &mut EntryReceiver, count: usize) -> Vec<Entry> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut entries = Vec::new();
    while entries.len() < count && Instant::now() < deadline {
        entries.extend(rx.drain(100));
        std::thread::sleep(Duration::from_millis(10));
    }
    entries
}

fn sorted_sequences(entries: &[Entry], category: &str) -> Vec<u64> {
    let mut sequences: Vec<u64> = entries
        .iter()
        .filter(|e| e.category() == category)
        .map(Entry::sequence)
        .collect();
    sequences.sort_unstable();
    sequences
}

// =============================================================================
// Pump E2E
// =============================================================================

/// Two roots, each with Chat and Reward files, produce two independently
/// ordered streams even when records land in the files out of order.
#[test]
fn e2e_two_roots_two_ordered_streams() {
    let root_a = TempDir::new().unwrap();
    let root_b = TempDir::new().unwrap();
    for root in [root_a.path(), root_b.path()] {
        create_log(root, "ChatLog20210415_00.txt");
        create_log(root, "RewardLog20210415_00.txt");
    }

    let (mut pump, mut rx) = Pump::with_channel(
        vec![root_a.path().to_path_buf(), root_b.path().to_path_buf()],
        fast_config(),
    );
    assert_eq!(pump.group_count(), 2);
    pump.start();

    // Baselines first, so each group knows where its sequence starts.
    append(root_a.path(), "ChatLog20210415_00.txt", &record(0, 10, "PARTY\tAlice\thello"));
    append(root_b.path(), "ChatLog20210415_00.txt", &record(0, 500, "PUBLIC\tBob\thi"));
    let baseline = collect(&mut rx, 2);
    assert_eq!(baseline.len(), 2);

    // Chat is scanned before Reward, so the higher numbers arrive first.
    append(root_a.path(), "ChatLog20210415_00.txt", &record(1, 12, "PARTY\tAlice\tgg"));
    append(root_a.path(), "RewardLog20210415_00.txt", &record(1, 11, "Meseta(250)\tNum(1)"));
    append(root_b.path(), "ChatLog20210415_00.txt", &record(1, 502, "PUBLIC\tBob\tbye"));
    append(root_b.path(), "RewardLog20210415_00.txt", &record(1, 501, "Meseta(7)"));

    let entries = collect(&mut rx, 4);
    pump.stop();

    assert_eq!(entries.len(), 4, "entries: {entries:?}");
    let stream_a: Vec<u64> = entries
        .iter()
        .map(Entry::sequence)
        .filter(|s| *s < 100)
        .collect();
    let stream_b: Vec<u64> = entries
        .iter()
        .map(Entry::sequence)
        .filter(|s| *s >= 100)
        .collect();
    assert_eq!(stream_a, vec![11, 12]);
    assert_eq!(stream_b, vec![501, 502]);

    assert_eq!(sorted_sequences(&entries, "Reward"), vec![11, 501]);
    let reward = entries.iter().find(|e| e.sequence() == 11).unwrap();
    assert_eq!(reward.attribute("Meseta"), Some(250));
    assert_eq!(reward.attribute("Num"), Some(1));
    assert_eq!(reward.fields().last().map(String::as_str), Some("Reward"));
}

/// Rotating to a new file mid-run picks it up from the start.
#[test]
fn e2e_rotation_mid_run() {
    let root = TempDir::new().unwrap();
    create_log(root.path(), "ChatLog20210415_00.txt");

    let (mut pump, mut rx) = Pump::with_channel(vec![root.path().to_path_buf()], fast_config());
    pump.start();

    append(root.path(), "ChatLog20210415_00.txt", &record(0, 1, "PARTY\tA\tone"));
    assert_eq!(collect(&mut rx, 1).len(), 1);

    create_log(root.path(), "ChatLog20210416_00.txt");
    append(root.path(), "ChatLog20210416_00.txt", &record(1, 2, "PARTY\tA\ttwo"));
    append(root.path(), "ChatLog20210416_00.txt", &record(1, 3, "PARTY\tA\tthree"));

    let entries = collect(&mut rx, 2);
    pump.stop();
    assert_eq!(
        entries.iter().map(Entry::sequence).collect::<Vec<_>>(),
        vec![2, 3]
    );
}

/// A record written in two halves, with a quoted multi-line column, is
/// delivered once and intact.
#[test]
fn e2e_partial_and_multiline_records() {
    let root = TempDir::new().unwrap();
    create_log(root.path(), "SymbolChatLog20210415_00.txt");

    let (mut pump, mut rx) = Pump::with_channel(vec![root.path().to_path_buf()], fast_config());
    pump.start();

    append(
        root.path(),
        "SymbolChatLog20210415_00.txt",
        "2021-04-15T21:30:00\t1\tPARTY\t\"line one\r\n",
    );
    std::thread::sleep(Duration::from_millis(100));
    assert!(rx.drain(10).is_empty());

    append(root.path(), "SymbolChatLog20210415_00.txt", "line two\"\r\n");
    let entries = collect(&mut rx, 1);
    pump.stop();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].category(), "SymbolChat");
    assert_eq!(entries[0].field(3), Some("line one\r\nline two"));
}

/// Entries still waiting for a missing sequence number are flushed when the
/// pump stops.
#[test]
fn e2e_stop_flushes_buffered_entries() {
    let root = TempDir::new().unwrap();
    create_log(root.path(), "ChatLog20210415_00.txt");

    let (mut pump, mut rx) = Pump::with_channel(vec![root.path().to_path_buf()], fast_config());
    pump.start();

    append(root.path(), "ChatLog20210415_00.txt", &record(0, 1, "PARTY\tA\ta"));
    append(root.path(), "ChatLog20210415_00.txt", &record(0, 3, "PARTY\tA\tc"));
    assert_eq!(collect(&mut rx, 1).len(), 1);

    pump.stop();
    let rest = rx.drain(10);
    assert_eq!(rest.iter().map(Entry::sequence).collect::<Vec<_>>(), vec![3]);
}

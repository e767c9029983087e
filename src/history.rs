use crate::error::LedgerError;
use crate::parser;
use chrono::{DateTime, Local};
use nix::unistd::Pid;
use std::io::{self, Write};
use std::time::Duration;

/// Starting capacity of a fresh ledger.
pub const INITIAL_HISTORY_CAPACITY: usize = 10;

const SUMMARY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One submitted command line and what became of it.
///
/// `pid` and `duration` stay unset until the command completes.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    command: String,
    pid: Option<Pid>,
    started_at: DateTime<Local>,
    duration: Option<Duration>,
}

impl InvocationRecord {
    fn new(command: &str) -> Self {
        let (bounded, _) = parser::bound_line(command);
        Self {
            command: bounded.to_owned(),
            pid: None,
            started_at: Local::now(),
            duration: None,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Duration in seconds, `0.0` while the record is not finalized.
    pub fn duration_secs(&self) -> f64 {
        self.duration.map_or(0.0, |d| d.as_secs_f64())
    }

    pub fn is_finalized(&self) -> bool {
        self.pid.is_some()
    }
}

/// Append-only log of every command submitted during a session.
///
/// Records are kept in submission order. The ledger only grows until it is
/// cleared at the end of the session; when it runs out of room its capacity
/// doubles.
#[derive(Debug)]
pub struct HistoryLedger {
    records: Vec<InvocationRecord>,
    capacity: usize,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_HISTORY_CAPACITY)
    }

    /// Create a ledger with room for `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a newly submitted command and return its index.
    pub fn append(&mut self, command: &str) -> usize {
        if self.records.len() == self.capacity {
            let extra = self.capacity.max(1);
            self.records.reserve_exact(extra);
            self.capacity += extra;
        }
        self.records.push(InvocationRecord::new(command));
        self.records.len() - 1
    }

    /// Fill in the fields that are only known once the command has finished.
    pub fn finalize(
        &mut self,
        index: usize,
        pid: Pid,
        duration: Duration,
    ) -> Result<(), LedgerError> {
        let record = self
            .records
            .get_mut(index)
            .ok_or(LedgerError::NoSuchRecord(index))?;
        record.pid = Some(pid);
        record.duration = Some(duration);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&InvocationRecord> {
        self.records.get(index)
    }

    /// Records in submission order. Each call starts from the first record.
    pub fn iter(&self) -> std::slice::Iter<'_, InvocationRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every record and release the storage.
    pub fn clear(&mut self) {
        self.records = Vec::new();
        self.capacity = 0;
    }

    /// Write the `history` listing: 1-based index and command text.
    pub fn write_listing(&self, out: &mut dyn Write) -> io::Result<()> {
        for (i, record) in self.iter().enumerate() {
            writeln!(out, "{:5}  {}", i + 1, record.command)?;
        }
        Ok(())
    }

    /// Write the end-of-session summary with pid, start time and duration of
    /// every record.
    pub fn write_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "\n\n--- SimpleShell Session Summary ---")?;
        for (i, record) in self.iter().enumerate() {
            let pid = record.pid.map_or(0, Pid::as_raw);
            writeln!(out, "  Cmd {:<3}: {}", i + 1, record.command)?;
            writeln!(
                out,
                " -> PID: {:<7} | Start: {} | Duration: {:.4} s",
                pid,
                record.started_at.format(SUMMARY_TIME_FORMAT),
                record.duration_secs()
            )?;
        }
        writeln!(out)?;
        writeln!(out, "SimpleShell terminated.")?;
        out.flush()
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a HistoryLedger {
    type Item = &'a InvocationRecord;
    type IntoIter = std::slice::Iter<'a, InvocationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    #[test]
    fn test_append_returns_submission_index() {
        let mut ledger = HistoryLedger::new();
        assert_eq!(ledger.append("ls"), 0);
        assert_eq!(ledger.append("pwd"), 1);
        assert_eq!(ledger.len(), 2);

        let record = ledger.get(1).unwrap();
        assert_eq!(record.command(), "pwd");
        assert!(!record.is_finalized());
        assert_eq!(record.duration(), None);
    }

    #[test]
    fn test_capacity_doubles_on_overflow() {
        let mut ledger = HistoryLedger::new();
        assert_eq!(ledger.capacity(), INITIAL_HISTORY_CAPACITY);

        for i in 0..INITIAL_HISTORY_CAPACITY {
            ledger.append(&format!("cmd {i}"));
        }
        assert_eq!(ledger.capacity(), INITIAL_HISTORY_CAPACITY);

        ledger.append("one more");
        assert_eq!(ledger.capacity(), INITIAL_HISTORY_CAPACITY * 2);
        assert!(ledger.len() <= ledger.capacity());
    }

    #[test]
    fn test_zero_capacity_is_bumped_to_one() {
        let mut ledger = HistoryLedger::with_capacity(0);
        assert_eq!(ledger.capacity(), 1);
        ledger.append("a");
        ledger.append("b");
        assert_eq!(ledger.capacity(), 2);
    }

    #[test]
    fn test_finalize_fills_deferred_fields() {
        let mut ledger = HistoryLedger::new();
        let idx = ledger.append("sleep 1");
        ledger
            .finalize(idx, pid(4242), Duration::from_millis(1500))
            .unwrap();

        let record = ledger.get(idx).unwrap();
        assert_eq!(record.pid(), Some(pid(4242)));
        assert!((record.duration_secs() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_finalize_unknown_index_errors() {
        let mut ledger = HistoryLedger::new();
        ledger.append("ls");
        let err = ledger.finalize(3, pid(1), Duration::ZERO).unwrap_err();
        assert!(matches!(err, LedgerError::NoSuchRecord(3)));
    }

    #[test]
    fn test_iter_is_ordered_and_restartable() {
        let mut ledger = HistoryLedger::new();
        let commands = ["a", "b", "c", "d"];
        for c in commands {
            ledger.append(c);
        }
        ledger.finalize(2, pid(7), Duration::ZERO).unwrap();
        ledger.finalize(0, pid(5), Duration::ZERO).unwrap();

        let first: Vec<&str> = ledger.iter().map(|r| r.command()).collect();
        let second: Vec<&str> = (&ledger).into_iter().map(|r| r.command()).collect();
        assert_eq!(first, commands);
        assert_eq!(first, second);
    }

    #[test]
    fn test_long_command_is_bounded() {
        let mut ledger = HistoryLedger::new();
        let long = "x".repeat(parser::MAX_LINE_LEN * 2);
        let idx = ledger.append(&long);
        assert_eq!(
            ledger.get(idx).unwrap().command().len(),
            parser::MAX_LINE_LEN - 1
        );
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut ledger = HistoryLedger::new();
        ledger.append("ls");
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.iter().count(), 0);
    }

    #[test]
    fn test_listing_format() {
        let mut ledger = HistoryLedger::new();
        ledger.append("ls -l");
        ledger.append("history");

        let mut out = Vec::new();
        ledger.write_listing(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "    1  ls -l\n    2  history\n"
        );
    }

    #[test]
    fn test_summary_format() {
        let mut ledger = HistoryLedger::new();
        let idx = ledger.append("echo hi");
        ledger
            .finalize(idx, pid(321), Duration::from_micros(12_345))
            .unwrap();
        ledger.append("pending");

        let mut out = Vec::new();
        ledger.write_summary(&mut out).unwrap();
        let s = String::from_utf8(out).unwrap();

        assert!(s.starts_with("\n\n--- SimpleShell Session Summary ---\n"));
        assert!(s.contains("  Cmd 1  : echo hi\n"));
        assert!(s.contains(" -> PID: 321     | Start: "));
        assert!(s.contains("| Duration: 0.0123 s\n"));
        assert!(s.contains("  Cmd 2  : pending\n"));
        assert!(s.contains(" -> PID: 0       | Start: "));
        assert!(s.contains("| Duration: 0.0000 s\n"));
        assert!(s.ends_with("\nSimpleShell terminated.\n"));
    }
}

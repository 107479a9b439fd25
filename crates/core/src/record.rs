//! Notification buffer decoder
//!
//! A filled notification buffer holds a chain of `FILE_NOTIFY_INFORMATION`
//! records:
//! ```text
//! +0  NextEntryOffset  u32   bytes to the next record, 0 for the last one
//! +4  Action           u32   FILE_ACTION_* code
//! +8  FileNameLength   u32   name length in BYTES
//! +12 FileName         [u16] name, NOT nul-terminated
//! ```
//! Records are DWORD aligned. The name length is authoritative; whatever
//! follows the name in the buffer is never read as part of it.

use crate::error::WatchError;
use crate::event::ChangeEvent;
use crate::flags::{decode_flags, ChangeAction};
use crate::path::CanonicalPath;
use tracing::{debug, trace};

/// Size of the fixed record header
pub const RECORD_HEADER_LEN: usize = 12;

/// `sizeof(FILE_NOTIFY_INFORMATION)`: header plus one code unit, padded
pub const NOTIFY_RECORD_SIZE: usize = 16;

const CODE_UNIT: usize = std::mem::size_of::<u16>();

/// Borrowed view of one record
#[derive(Debug, Clone, Copy)]
pub struct ChangeRecord<'a> {
    offset: usize,
    action: u32,
    name: &'a [u8],
}

impl<'a> ChangeRecord<'a> {
    /// Byte offset of the record inside the buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Raw action code
    pub fn action(&self) -> u32 {
        self.action
    }

    /// Declared name length in bytes
    pub fn name_len(&self) -> usize {
        self.name.len()
    }

    /// Name as UTF-16 code units (`name_len / 2` of them)
    pub fn name_units(&self) -> impl Iterator<Item = u16> + 'a {
        self.name
            .chunks_exact(CODE_UNIT)
            .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
    }

    /// Decode the name to UTF-8
    ///
    /// Unpaired surrogates, which NTFS allows in names, become U+FFFD.
    pub fn decode_name(&self) -> String {
        char::decode_utf16(self.name_units())
            .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

/// Iterator over the raw records of a buffer
#[derive(Debug)]
pub struct Records<'a> {
    buf: &'a [u8],
    next: Option<usize>,
}

impl<'a> Records<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            next: if buf.is_empty() { None } else { Some(0) },
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<ChangeRecord<'a>, WatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next.take()?;

        let header = match offset
            .checked_add(RECORD_HEADER_LEN)
            .and_then(|end| self.buf.get(offset..end))
        {
            Some(header) => header,
            None => return Some(Err(WatchError::MalformedRecord { offset })),
        };

        let next_offset = read_u32(header, 0) as usize;
        let action = read_u32(header, 4);
        let name_len = read_u32(header, 8) as usize;

        let name_start = offset + RECORD_HEADER_LEN;
        let name = match name_start
            .checked_add(name_len)
            .and_then(|end| self.buf.get(name_start..end))
        {
            Some(name) => name,
            None => return Some(Err(WatchError::MalformedRecord { offset })),
        };

        if next_offset != 0 {
            self.next = offset.checked_add(next_offset);
        }

        Some(Ok(ChangeRecord {
            offset,
            action,
            name,
        }))
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Lazy sequence of change events decoded from one buffer
///
/// Consumes the buffer once, in record order. Records with an empty name
/// produce no event.
#[derive(Debug)]
pub struct Changes<'a> {
    records: Records<'a>,
    root: &'a CanonicalPath,
}

impl<'a> Iterator for Changes<'a> {
    type Item = Result<ChangeEvent, WatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };

            if record.name_len() == 0 {
                trace!("Skipping record at offset {} with empty name", record.offset());
                continue;
            }

            let name = record.decode_name();

            if ChangeAction::from_code(record.action()).is_none() {
                debug!(
                    "Unrecognized action code {} for {}, emitting without flags",
                    record.action(),
                    name
                );
            }

            let path = self.root.join_name(&name);
            return Some(Ok(ChangeEvent::new(path, decode_flags(record.action()))));
        }
    }
}

/// Decode the first `bytes_returned` bytes of `buffer` into change events
/// rooted at `root`
pub fn decode<'a>(buffer: &'a [u8], bytes_returned: usize, root: &'a CanonicalPath) -> Changes<'a> {
    let filled = &buffer[..bytes_returned.min(buffer.len())];
    Changes {
        records: Records::new(filled),
        root,
    }
}

/// Builds notification buffers in the native record layout
///
/// Used by the scripted backend and by benchmarks to produce the exact
/// bytes the OS would write.
#[derive(Debug, Default)]
pub struct RecordWriter {
    buf: Vec<u8>,
    last: Option<usize>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record with a UTF-8 name
    pub fn push(&mut self, action: u32, name: &str) -> &mut Self {
        let units: Vec<u16> = name.encode_utf16().collect();
        self.push_units(action, &units)
    }

    /// Append a record with raw UTF-16 code units
    pub fn push_units(&mut self, action: u32, units: &[u16]) -> &mut Self {
        let start = self.buf.len();

        if let Some(last) = self.last {
            let delta = (start - last) as u32;
            self.buf[last..last + 4].copy_from_slice(&delta.to_le_bytes());
        }

        self.buf.extend_from_slice(&0u32.to_le_bytes());
        self.buf.extend_from_slice(&action.to_le_bytes());
        self.buf
            .extend_from_slice(&((units.len() * CODE_UNIT) as u32).to_le_bytes());
        for unit in units {
            self.buf.extend_from_slice(&unit.to_le_bytes());
        }

        // DWORD alignment for the next record
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }

        self.last = Some(start);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(&mut self) -> Vec<u8> {
        self.last = None;
        std::mem::take(&mut self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{ChangeFlag, FlagSet};
    use std::path::{Path, MAIN_SEPARATOR};

    fn root() -> CanonicalPath {
        CanonicalPath::from_path(Path::new("watched"))
    }

    fn expected(name: &str) -> String {
        format!("watched{}{}", MAIN_SEPARATOR, name)
    }

    #[test]
    fn test_decode_three_records_in_order() {
        let buf = RecordWriter::new()
            .push(ChangeAction::Added.code(), "a.txt")
            .push(ChangeAction::Modified.code(), "a.txt")
            .push(ChangeAction::Removed.code(), "a.txt")
            .finish();

        let root = root();
        let events: Vec<_> = decode(&buf, buf.len(), &root)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].flags, FlagSet::from_flags(&[ChangeFlag::Created]));
        assert_eq!(events[1].flags, FlagSet::from_flags(&[ChangeFlag::Updated]));
        assert_eq!(events[2].flags, FlagSet::from_flags(&[ChangeFlag::Removed]));
        for event in &events {
            assert_eq!(event.path, expected("a.txt"));
        }
    }

    #[test]
    fn test_decode_n_records_yields_n_events() {
        let mut writer = RecordWriter::new();
        for i in 0..40 {
            writer.push(ChangeAction::Modified.code(), &format!("file-{i}.rs"));
        }
        let buf = writer.finish();

        let root = root();
        let events: Vec<_> = decode(&buf, buf.len(), &root)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(events.len(), 40);
        for (i, event) in events.iter().enumerate() {
            assert!(!event.path.is_empty());
            assert_eq!(event.path, expected(&format!("file-{i}.rs")));
        }
    }

    #[test]
    fn test_rename_pair_flags() {
        let buf = RecordWriter::new()
            .push(ChangeAction::RenamedOldName.code(), "old.txt")
            .push(ChangeAction::RenamedNewName.code(), "new.txt")
            .finish();

        let root = root();
        let events: Vec<_> = decode(&buf, buf.len(), &root)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            events[0].flags,
            FlagSet::from_flags(&[ChangeFlag::MovedFrom, ChangeFlag::Renamed])
        );
        assert_eq!(
            events[1].flags,
            FlagSet::from_flags(&[ChangeFlag::MovedTo, ChangeFlag::Renamed])
        );
        assert_eq!(events[1].path, expected("new.txt"));
    }

    #[test]
    fn test_name_length_is_authoritative() {
        // Single record whose name bytes are followed by non-zero garbage
        let name: Vec<u16> = "abc".encode_utf16().collect();
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&ChangeAction::Added.code().to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes()); // two code units only
        for unit in &name {
            buf.extend_from_slice(&unit.to_le_bytes());
        }
        buf.extend_from_slice(&[b'Z', 0, b'Z', 0]);

        let root = root();
        let events: Vec<_> = decode(&buf, buf.len(), &root)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, expected("ab"));
    }

    #[test]
    fn test_odd_byte_length_truncates_to_whole_units() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&ChangeAction::Added.code().to_le_bytes());
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&[b'x', 0, b'y', 0]);

        let record = Records::new(&buf).next().unwrap().unwrap();
        assert_eq!(record.name_len(), 3);
        assert_eq!(record.name_units().count(), 1);
        assert_eq!(record.decode_name(), "x");
    }

    #[test]
    fn test_unknown_action_still_emits_event() {
        let buf = RecordWriter::new().push(9, "mystery").finish();

        let root = root();
        let events: Vec<_> = decode(&buf, buf.len(), &root)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(events.len(), 1);
        assert!(events[0].flags.is_empty());
        assert_eq!(events[0].path, expected("mystery"));
    }

    #[test]
    fn test_empty_name_is_skipped() {
        let buf = RecordWriter::new()
            .push_units(ChangeAction::Modified.code(), &[])
            .push(ChangeAction::Added.code(), "kept")
            .finish();

        let root = root();
        let events: Vec<_> = decode(&buf, buf.len(), &root)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, expected("kept"));
    }

    #[test]
    fn test_non_ascii_names() {
        let buf = RecordWriter::new()
            .push(ChangeAction::Added.code(), "résumé.pdf")
            .push(ChangeAction::Added.code(), "日本語.txt")
            .finish();

        let root = root();
        let events: Vec<_> = decode(&buf, buf.len(), &root)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(events[0].path, expected("résumé.pdf"));
        assert_eq!(events[1].path, expected("日本語.txt"));
    }

    #[test]
    fn test_unpaired_surrogate_is_replaced() {
        let buf = RecordWriter::new()
            .push_units(ChangeAction::Added.code(), &[0x0061, 0xD800])
            .push(ChangeAction::Removed.code(), "next")
            .finish();

        let root = root();
        let events: Vec<_> = decode(&buf, buf.len(), &root)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].path, expected("a\u{FFFD}"));
        assert!(events[0].has(ChangeFlag::Created));
        assert_eq!(events[1].path, expected("next"));
    }

    #[test]
    fn test_truncated_buffer_is_malformed() {
        let buf = RecordWriter::new()
            .push(ChangeAction::Added.code(), "complete")
            .push(ChangeAction::Added.code(), "cut-short")
            .finish();

        // Byte count ends in the middle of the second record's name
        let root = root();
        let results: Vec<_> = decode(&buf, buf.len() - 6, &root).collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(WatchError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_zero_bytes_yields_nothing() {
        let buf = vec![0u8; 64];
        let root = root();
        assert_eq!(decode(&buf, 0, &root).count(), 0);
    }

    #[test]
    fn test_writer_links_records() {
        let mut writer = RecordWriter::new();
        writer.push(1, "a").push(2, "bb");
        assert!(!writer.is_empty());
        let buf = writer.finish();

        // "a" = 12 + 2 bytes, padded to 16
        assert_eq!(read_u32(&buf, 0), 16);
        assert_eq!(read_u32(&buf, 16), 0);
        assert_eq!(buf.len(), 32);

        let offsets: Vec<_> = Records::new(&buf).map(|r| r.unwrap().offset()).collect();
        assert_eq!(offsets, vec![0, 16]);
    }
}

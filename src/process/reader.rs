use std::{
    collections::{HashMap, VecDeque},
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::schema::TableSchema;

/// Where each schema field lives in the source header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// `positions[i]` is the header index of schema field `i`.
    positions: Vec<usize>,
}

impl ColumnMapping {
    /// Match header names to schema fields by exact name.
    ///
    /// Column order in the file is free, but the set of names must be exactly
    /// the schema's: missing fields, extra columns and repeated header names
    /// all fail with `SchemaMismatch`.
    pub fn resolve(table_name: &str, headers: &[String], schema: &TableSchema) -> Result<Self> {
        let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(headers.len());
        let mut unexpected = Vec::new();
        for (idx, name) in headers.iter().enumerate() {
            if by_name.insert(name.as_str(), idx).is_some() || schema.field(name).is_none() {
                unexpected.push(name.clone());
            }
        }

        let mut positions = Vec::with_capacity(schema.len());
        let mut missing = Vec::new();
        for field in schema.fields() {
            match by_name.get(field.name) {
                Some(&idx) => positions.push(idx),
                None => missing.push(field.name.to_string()),
            }
        }

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(IngestError::SchemaMismatch {
                table_name: table_name.to_string(),
                missing,
                unexpected,
            });
        }
        Ok(Self { positions })
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// True when the file already lists the fields in schema order.
    pub fn is_identity(&self) -> bool {
        self.positions.iter().enumerate().all(|(i, &p)| i == p)
    }
}

/// Passes bytes through while noting where each line's content begins.
///
/// The csv reader positions a record at the end of the previous record's
/// terminator, which for `\r\n` files is the `\n` itself. Line numbers are
/// therefore resolved here from the first content byte at or after that offset.
struct LineTracker<R> {
    inner: R,
    offset: u64,
    newlines: u64,
    after_terminator: bool,
    /// `(byte offset, line)` of content starts not yet passed by the reader.
    starts: VecDeque<(u64, u64)>,
}

impl<R> LineTracker<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            newlines: 0,
            after_terminator: true,
            starts: VecDeque::new(),
        }
    }

    /// Line of the first content byte at or after `byte`. Queries must not go backwards.
    fn line_at(&mut self, byte: u64) -> u64 {
        while self.starts.front().is_some_and(|&(at, _)| at < byte) {
            self.starts.pop_front();
        }
        self.starts
            .front()
            .map_or(self.newlines + 1, |&(_, line)| line)
    }
}

impl<R: Read> Read for LineTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for (i, &b) in buf[..n].iter().enumerate() {
            match b {
                b'\n' => {
                    self.newlines += 1;
                    self.after_terminator = true;
                }
                b'\r' => self.after_terminator = true,
                _ if self.after_terminator => {
                    self.starts
                        .push_back((self.offset + i as u64, self.newlines + 1));
                    self.after_terminator = false;
                }
                _ => {}
            }
        }
        self.offset += n as u64;
        Ok(n)
    }
}

/// Header-aware reader over one comma-separated source file.
pub struct SourceReader<R: Read = BufReader<File>> {
    path: PathBuf,
    reader: csv::Reader<LineTracker<R>>,
    headers: Vec<String>,
}

impl SourceReader<BufReader<File>> {
    /// Open `path`; a missing (or non-regular) file is `SourceNotFound`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(IngestError::SourceNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(IngestError::io(path, e)),
        };
        let meta = file.metadata().map_err(|e| IngestError::io(path, e))?;
        if !meta.is_file() {
            return Err(IngestError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), bytes = meta.len(), "opened source");
        Self::from_reader(path, BufReader::new(file))
    }
}

impl<R: Read> SourceReader<R> {
    /// Wrap any reader; `path` is only used in error messages.
    pub fn from_reader(path: impl Into<PathBuf>, inner: R) -> Result<Self> {
        let path = path.into();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(b',')
            .flexible(false)
            .from_reader(LineTracker::new(inner));

        let headers = reader.headers().map(|h| {
            h.iter()
                .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
                .collect::<Vec<_>>()
        });
        let headers = match headers {
            Ok(h) => h,
            Err(e) => {
                let line = error_line(&mut reader, &e);
                return Err(malformed(&path, line, e));
            }
        };

        Ok(Self {
            path,
            reader,
            headers,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Trimmed header names, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Read the next data row into `record`. Returns `false` at end of file.
    pub fn next_record(&mut self, record: &mut StringRecord) -> Result<bool> {
        match self.reader.read_record(record) {
            Ok(more) => Ok(more),
            Err(e) => {
                let line = error_line(&mut self.reader, &e);
                Err(malformed(&self.path, line, e))
            }
        }
    }

    /// 1-based source line on which `record` starts, for error messages.
    ///
    /// Call it for the record just read: lines are resolved in file order.
    pub fn record_line(&mut self, record: &StringRecord) -> u64 {
        record
            .position()
            .map_or(0, |p| self.reader.get_mut().line_at(p.byte()))
    }
}

fn error_line<R: Read>(reader: &mut csv::Reader<LineTracker<R>>, err: &csv::Error) -> u64 {
    err.position()
        .map_or(0, |p| reader.get_mut().line_at(p.byte()))
}

fn malformed(path: &Path, line: u64, err: csv::Error) -> IngestError {
    IngestError::MalformedSource {
        path: path.to_path_buf(),
        line,
        source: err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, FieldType};
    use std::io::{Cursor, Write};
    use tempfile::{tempdir, NamedTempFile};

    static FIELDS: &[FieldSpec] = &[
        FieldSpec::nullable("a", FieldType::Integer),
        FieldSpec::nullable("b", FieldType::String),
        FieldSpec::nullable("c", FieldType::Date),
    ];

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mapping_tolerates_reordering() {
        let schema = TableSchema::new(FIELDS);
        let m = ColumnMapping::resolve("t", &names(&["c", "a", "b"]), &schema).unwrap();
        assert_eq!(m.positions(), &[1, 2, 0]);
        assert!(!m.is_identity());

        let m = ColumnMapping::resolve("t", &names(&["a", "b", "c"]), &schema).unwrap();
        assert!(m.is_identity());
    }

    #[test]
    fn mapping_reports_missing_and_extra() {
        let schema = TableSchema::new(FIELDS);
        match ColumnMapping::resolve("t", &names(&["a", "B", "c", "d"]), &schema) {
            Err(IngestError::SchemaMismatch {
                table_name,
                missing,
                unexpected,
            }) => {
                assert_eq!(table_name, "t");
                assert_eq!(missing, vec!["b"]);
                assert_eq!(unexpected, vec!["B", "d"]);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn mapping_rejects_duplicate_headers() {
        let schema = TableSchema::new(FIELDS);
        let err = ColumnMapping::resolve("t", &names(&["a", "b", "c", "a"]), &schema).unwrap_err();
        match err {
            IngestError::SchemaMismatch {
                missing,
                unexpected,
                ..
            } => {
                assert!(missing.is_empty());
                assert_eq!(unexpected, vec!["a"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reads_header_and_records() -> anyhow::Result<()> {
        let data = "\u{feff} a ,b,c\r\n1,\"x, y\",2020-01-01\r\n\r\n2,,\r\n";
        let mut src = SourceReader::from_reader("mem.csv", Cursor::new(data))?;
        assert_eq!(src.headers(), &["a", "b", "c"]);

        let mut rec = StringRecord::new();
        assert!(src.next_record(&mut rec)?);
        assert_eq!(rec.get(1), Some("x, y"));
        assert_eq!(src.record_line(&rec), 2);
        assert!(src.next_record(&mut rec)?);
        assert_eq!(rec.get(0), Some("2"));
        assert_eq!(rec.get(2), Some(""));
        // a blank line sits between the two records
        assert_eq!(src.record_line(&rec), 4);
        assert!(!src.next_record(&mut rec)?);
        Ok(())
    }

    #[test]
    fn ragged_row_is_malformed() -> anyhow::Result<()> {
        let data = "a,b,c\n1,2,3\n4,5\n";
        let mut src = SourceReader::from_reader("mem.csv", Cursor::new(data))?;
        let mut rec = StringRecord::new();
        assert!(src.next_record(&mut rec)?);
        match src.next_record(&mut rec) {
            Err(IngestError::MalformedSource { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected MalformedSource, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn line_numbers_ignore_terminator_style() -> anyhow::Result<()> {
        for data in [
            "a,b,c\n1,2,3\n\"x\ny\",5,6\n7,8,9\n",
            "a,b,c\r\n1,2,3\r\n\"x\r\ny\",5,6\r\n7,8,9\r\n",
        ] {
            let mut src = SourceReader::from_reader("mem.csv", Cursor::new(data))?;
            let mut rec = StringRecord::new();
            let mut lines = Vec::new();
            while src.next_record(&mut rec)? {
                lines.push(src.record_line(&rec));
            }
            // the quoted field spans lines 3 and 4
            assert_eq!(lines, vec![2, 3, 5], "{data:?}");
        }
        Ok(())
    }

    #[test]
    fn crlf_ragged_row_reports_its_own_line() -> anyhow::Result<()> {
        let data = "a,b,c\r\n1,2,3\r\n4,5\r\n";
        let mut src = SourceReader::from_reader("mem.csv", Cursor::new(data))?;
        let mut rec = StringRecord::new();
        assert!(src.next_record(&mut rec)?);
        match src.next_record(&mut rec) {
            Err(IngestError::MalformedSource { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected MalformedSource, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn open_missing_file_is_source_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.csv");
        assert!(matches!(
            SourceReader::open(&path),
            Err(IngestError::SourceNotFound { path: p }) if p == path
        ));
        // a directory is not a source either
        assert!(matches!(
            SourceReader::open(dir.path()),
            Err(IngestError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn open_reads_from_disk() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "a,b,c")?;
        writeln!(tmp, "1,x,2020-01-01")?;
        let mut src = SourceReader::open(tmp.path())?;
        assert_eq!(src.path(), tmp.path());
        let mut rec = StringRecord::new();
        assert!(src.next_record(&mut rec)?);
        assert!(!src.next_record(&mut rec)?);
        Ok(())
    }
}

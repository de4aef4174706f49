// src/ledger.rs
//! Durable URL ledger: a read-only "indexed" snapshot plus the append-only sent log.
//!
//! Both stores are headerless CSV. Indexed rows carry the URL in the first field;
//! sent rows are `url,timestamp` with an RFC 3339 local timestamp. URLs compare
//! exactly (case-sensitive) after trimming surrounding whitespace.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, NaiveDate, SecondsFormat};

use crate::error::{IndexerError, Result};

/// One row of a URL store. Indexed rows have no timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub url: String,
    pub sent_at: Option<String>,
}

/// URLs the remote service already reports as indexed. Immutable after load.
#[derive(Debug, Default, Clone)]
pub struct IndexedSet {
    urls: HashSet<String>,
}

impl IndexedSet {
    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Successful sends in append order, with a hash index for membership.
#[derive(Debug, Default, Clone)]
pub struct SentLog {
    entries: Vec<UrlRecord>,
    index: HashSet<String>,
}

impl SentLog {
    pub fn contains(&self, url: &str) -> bool {
        self.index.contains(url)
    }

    pub fn entries(&self) -> &[UrlRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose timestamp starts with `YYYY-MM-DD` of `day`.
    pub fn count_on(&self, day: NaiveDate) -> usize {
        let prefix = day.format("%Y-%m-%d").to_string();
        self.entries
            .iter()
            .filter(|r| r.sent_at.as_deref().is_some_and(|ts| ts.starts_with(&prefix)))
            .count()
    }

    fn push(&mut self, record: UrlRecord) {
        self.index.insert(record.url.clone());
        self.entries.push(record);
    }

    fn last_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.entries
            .iter()
            .rev()
            .find_map(|r| r.sent_at.as_deref())
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
    }
}

pub struct Ledger {
    indexed: IndexedSet,
    sent: SentLog,
    sent_path: PathBuf,
    last_sent_at: Option<DateTime<FixedOffset>>,
}

impl Ledger {
    /// Load both stores. A missing sent file is created empty; a missing
    /// indexed file is an error like any other unreadable path.
    pub fn load(indexed_path: &Path, sent_path: &Path) -> Result<Self> {
        let indexed = IndexedSet {
            urls: read_records(indexed_path, 1)?
                .into_iter()
                .map(|r| r.url)
                .collect(),
        };

        if !sent_path.exists() {
            tracing::info!(path = %sent_path.display(), "sent log not found, creating it");
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(sent_path)
                .map_err(|e| IndexerError::io(sent_path, e))?;
        }
        let mut sent = SentLog::default();
        for record in read_records(sent_path, 2)? {
            sent.push(record);
        }
        let last_sent_at = sent.last_timestamp();

        tracing::info!(
            indexed = indexed.len(),
            sent = sent.len(),
            "ledger loaded"
        );
        Ok(Self {
            indexed,
            sent,
            sent_path: sent_path.to_path_buf(),
            last_sent_at,
        })
    }

    pub fn indexed(&self) -> &IndexedSet {
        &self.indexed
    }

    pub fn sent_log(&self) -> &SentLog {
        &self.sent
    }

    pub fn is_known(&self, url: &str) -> bool {
        self.indexed.contains(url) || self.sent.contains(url)
    }

    /// Append `url` to the sent log on disk, then in memory.
    ///
    /// A timestamp older than the last logged one is raised to it so the log
    /// stays non-decreasing. On error nothing is recorded and the file keeps
    /// its previous content.
    pub fn record_sent(&mut self, url: &str, at: DateTime<Local>) -> Result<()> {
        let mut ts = at.fixed_offset();
        if let Some(last) = self.last_sent_at {
            if ts < last {
                tracing::debug!(%url, given = %ts, last = %last, "clock went backwards, clamping timestamp");
                ts = last;
            }
        }
        let stamp = ts.to_rfc3339_opts(SecondsFormat::Secs, false);

        append_record(&self.sent_path, url, &stamp)
            .map_err(|e| IndexerError::io(&self.sent_path, e))?;

        self.sent.push(UrlRecord {
            url: url.to_string(),
            sent_at: Some(stamp),
        });
        self.last_sent_at = Some(ts);
        Ok(())
    }
}

fn read_records(path: &Path, min_fields: usize) -> Result<Vec<UrlRecord>> {
    let file = File::open(path).map_err(|e| IndexerError::io(path, e))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut out = Vec::new();
    for row in rdr.records() {
        let row = row.map_err(|e| csv_error(path, e))?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        if row.len() < min_fields {
            return Err(IndexerError::format(
                format!("{}:{line}", path.display()),
                format!("expected {min_fields} fields, found {}", row.len()),
            ));
        }
        let url = row.get(0).unwrap_or_default().trim().to_string();
        if url.is_empty() {
            return Err(IndexerError::format(
                format!("{}:{line}", path.display()),
                "empty url field",
            ));
        }
        let sent_at = if min_fields > 1 {
            row.get(1).map(|s| s.trim().to_string())
        } else {
            None
        };
        out.push(UrlRecord { url, sent_at });
    }
    Ok(out)
}

fn csv_error(path: &Path, e: csv::Error) -> IndexerError {
    let line = e.position().map(|p| p.line()).unwrap_or_default();
    let reason = e.to_string();
    match e.into_kind() {
        csv::ErrorKind::Io(io) => IndexerError::io(path, io),
        _ => IndexerError::format(format!("{}:{line}", path.display()), reason),
    }
}

/// Write one full record with a single `write_all`; roll back to the previous
/// length if anything fails so no partial row survives.
fn append_record(path: &Path, url: &str, stamp: &str) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record([url, stamp]).map_err(io::Error::other)?;
    let row = wtr
        .into_inner()
        .map_err(|e| io::Error::other(e.to_string()))?;

    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)?;
    let prev_len = file.metadata()?.len();

    let mut buf = Vec::with_capacity(row.len() + 1);
    if prev_len > 0 && !ends_with_newline(&mut file, prev_len)? {
        buf.push(b'\n');
    }
    buf.extend_from_slice(&row);

    if let Err(e) = file.write_all(&buf).and_then(|_| file.sync_data()) {
        if let Err(trunc) = file.set_len(prev_len) {
            tracing::error!(path = %path.display(), error = %trunc, "rollback of partial append failed");
        }
        return Err(e);
    }
    Ok(())
}

fn ends_with_newline(file: &mut File, len: u64) -> io::Result<bool> {
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

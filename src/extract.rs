//! Query side: turns a stream of compact records back into JSON.
//!
//! Ungrouped output is streamed record by record. Grouped output has to see
//! the whole stream first, so records are collected per group and written
//! once the input is exhausted. Groups appear in the order their first
//! record was read.

use std::collections::HashMap;
use std::io::{Read, Write};

use serde::Serialize;
use tracing::{debug, info};

use crate::access_time::{day_bucket, format_day, format_timestamp};
use crate::config::{ExtractConfig, GroupBy, PROGRESS_INTERVAL};
use crate::error::Result;
use crate::record_reader::RecordReader;
use crate::slim_record::CompactRecord;

/// JSON shape of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonRecord {
    pub timestamp: u32,
    pub time: String,
    pub ip_hash: String,
    pub podcast_hash: String,
    pub key_hash: String,
    pub bytes_sent_kb: u16,
    pub object_size_kb: u16,
    pub download_time_ms: u16,
    pub status_code: u16,
    pub system_id: u8,
    pub platform_id: u8,
    pub completion_percent: u8,
    pub flags: u8,
}

impl From<&CompactRecord> for JsonRecord {
    fn from(record: &CompactRecord) -> Self {
        JsonRecord {
            timestamp: record.timestamp,
            time: format_timestamp(record.timestamp),
            ip_hash: hex(record.ip_hash),
            podcast_hash: hex(record.podcast_hash),
            key_hash: hex(record.key_hash),
            bytes_sent_kb: record.bytes_sent_kb,
            object_size_kb: record.object_size_kb,
            download_time_ms: record.download_time_ms,
            status_code: record.status_code,
            system_id: record.system_id,
            platform_id: record.platform_id,
            completion_percent: record.completion_percent,
            flags: record.flags,
        }
    }
}

fn hex(value: u32) -> String {
    format!("{value:08x}")
}

/// Records sharing one grouping key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroup {
    pub key: u32,
    pub records: Vec<CompactRecord>,
}

impl LogGroup {
    pub fn count(&self) -> usize {
        self.records.len()
    }
}

/// Groups records by one dimension, remembering discovery order.
#[derive(Debug)]
pub struct GroupIndex {
    group_by: GroupBy,
    groups: Vec<LogGroup>,
    positions: HashMap<u32, usize>,
}

impl GroupIndex {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            groups: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Grouping key of a record, `None` when records are not grouped.
    pub fn key_of(group_by: GroupBy, record: &CompactRecord) -> Option<u32> {
        match group_by {
            GroupBy::None => None,
            GroupBy::Podcast => Some(record.podcast_hash),
            GroupBy::Client => Some(record.ip_hash),
            GroupBy::Day => Some(day_bucket(record.timestamp)),
        }
    }

    /// Renders a key the way it appears in the JSON output.
    pub fn render_key(group_by: GroupBy, key: u32) -> String {
        match group_by {
            GroupBy::Day => format_day(key),
            _ => hex(key),
        }
    }

    /// Appends a record to its group, creating the group on first sight.
    pub fn insert(&mut self, record: CompactRecord) {
        let key = Self::key_of(self.group_by, &record).unwrap_or(0);
        let position = *self.positions.entry(key).or_insert_with(|| {
            self.groups.push(LogGroup {
                key,
                records: Vec::new(),
            });
            self.groups.len() - 1
        });
        self.groups[position].records.push(record);
    }

    pub fn groups(&self) -> &[LogGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Totals of one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub entries: u64,
    /// Number of groups; `0` for ungrouped output.
    pub groups: u64,
}

/// Reads every record from `input` and writes the JSON document to `output`.
///
/// A trailing partial record aborts the run with
/// [`SlimLogError::TruncatedRecord`](crate::error::SlimLogError::TruncatedRecord).
/// Records before it may already have been written, so the document is
/// left incomplete in that case.
pub fn extract_to_json<R: Read, W: Write>(input: R, mut output: W, config: &ExtractConfig) -> Result<ExtractStats> {
    let reader = RecordReader::new(input);
    let stats = match config.group_by {
        GroupBy::None => write_ungrouped(reader, &mut output, config.verbose)?,
        group_by => write_grouped(reader, &mut output, group_by, config.verbose)?,
    };
    output.flush()?;

    info!(entries = stats.entries, groups = stats.groups, "Extraction finished");
    Ok(stats)
}

fn write_ungrouped<R: Read, W: Write>(reader: RecordReader<R>, out: &mut W, verbose: bool) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();
    out.write_all(b"{\"logs\":[")?;
    for record in reader {
        let record = record?;
        if stats.entries > 0 {
            out.write_all(b",")?;
        }
        out.write_all(b"\n")?;
        serde_json::to_writer(&mut *out, &JsonRecord::from(&record))?;
        stats.entries += 1;
        report_progress(stats.entries, verbose);
    }
    write!(out, "\n],\"entries\":{}}}\n", stats.entries)?;
    Ok(stats)
}

fn write_grouped<R: Read, W: Write>(
    reader: RecordReader<R>,
    out: &mut W,
    group_by: GroupBy,
    verbose: bool,
) -> Result<ExtractStats> {
    let mut index = GroupIndex::new(group_by);
    let mut stats = ExtractStats::default();
    for record in reader {
        index.insert(record?);
        stats.entries += 1;
        report_progress(stats.entries, verbose);
    }
    stats.groups = index.len() as u64;
    debug!(groups = stats.groups, grouped_by = %group_by, "Records grouped");

    out.write_all(b"{\"grouped_by\":")?;
    serde_json::to_writer(&mut *out, group_by.name())?;
    out.write_all(b",\"groups\":{")?;
    for (i, group) in index.groups().iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        out.write_all(b"\n")?;
        serde_json::to_writer(&mut *out, &GroupIndex::render_key(group_by, group.key))?;
        write!(out, ":{{\"count\":{},\"logs\":[", group.count())?;
        for (j, record) in group.records.iter().enumerate() {
            if j > 0 {
                out.write_all(b",")?;
            }
            serde_json::to_writer(&mut *out, &JsonRecord::from(record))?;
        }
        out.write_all(b"]}")?;
    }
    write!(out, "\n}},\"total_groups\":{}}}\n", stats.groups)?;
    Ok(stats)
}

fn report_progress(entries: u64, verbose: bool) {
    if verbose && entries % PROGRESS_INTERVAL == 0 {
        info!(entries, "Progress");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_record_fields() {
        let record = CompactRecord {
            timestamp: 1_549_411_238,
            ip_hash: 0xab,
            podcast_hash: 0x0123_4567,
            key_hash: 0xffff_ffff,
            status_code: 206,
            flags: 3,
            ..Default::default()
        };
        let json = JsonRecord::from(&record);
        assert_eq!(json.time, "2019-02-06 00:00:38");
        assert_eq!(json.ip_hash, "000000ab");
        assert_eq!(json.podcast_hash, "01234567");
        assert_eq!(json.key_hash, "ffffffff");
    }

    #[test]
    fn test_groups_keep_discovery_order() {
        let mut index = GroupIndex::new(GroupBy::Podcast);
        for hash in [7, 3, 7, 9, 3, 7] {
            index.insert(CompactRecord {
                podcast_hash: hash,
                ..Default::default()
            });
        }
        let summary: Vec<(u32, usize)> = index.groups().iter().map(|g| (g.key, g.count())).collect();
        assert_eq!(summary, vec![(7, 3), (3, 2), (9, 1)]);
    }

    #[test]
    fn test_render_keys() {
        assert_eq!(GroupIndex::render_key(GroupBy::Client, 0x1f), "0000001f");
        assert_eq!(GroupIndex::render_key(GroupBy::Day, 17_933), "2019-02-06");
    }

    #[test]
    fn test_empty_input() {
        let mut out = Vec::new();
        let stats = extract_to_json(std::io::empty(), &mut out, &ExtractConfig::default()).unwrap();
        assert_eq!(stats, ExtractStats::default());

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["entries"], 0);
        assert_eq!(value["logs"].as_array().unwrap().len(), 0);
    }
}

//! Conversion of parsed log lines into [`CompactRecord`]s.
//!
//! Compaction is split in two steps. [`project`] is a pure function of the
//! parsed line and can run on any thread. [`mark_first_seen`] consults the
//! run's [`DedupTable`] and therefore has to run in line order on the thread
//! that owns the table. [`compact`] performs both.

use tracing::trace;

use crate::access_time::to_epoch_seconds;
use crate::dedup_table::{composite_key, DedupTable};
use crate::error::Result;
use crate::hashing::{fingerprint, path_prefix_fingerprint};
use crate::slim_record::{CompactRecord, DownloadFlags};
use crate::tokenizer::ParsedLogRecord;
use crate::user_agent::{classify_platform, classify_system};

pub const MEGABYTE: u64 = 1_048_576;

/// End-of-object slack used for objects smaller than a megabyte.
pub const SMALL_OBJECT_SLACK: u64 = 1_000;

/// Builds a record from a parsed line, without the unique-client bit.
pub fn project(parsed: &ParsedLogRecord<'_>) -> CompactRecord {
    let platform = classify_platform(parsed.user_agent);
    let flags = if parsed.is_partial_content() {
        position_flags(parsed.byte_start(), parsed.byte_end(), parsed.object_size)
    } else {
        DownloadFlags::NONE
    };

    CompactRecord {
        timestamp: parsed.time.as_ref().map_or(0, to_epoch_seconds),
        ip_hash: fingerprint(parsed.remote_ip),
        podcast_hash: path_prefix_fingerprint(parsed.key),
        key_hash: fingerprint(parsed.key),
        bytes_sent_kb: kilobytes(parsed.bytes_sent),
        object_size_kb: kilobytes(parsed.object_size),
        download_time_ms: saturate_u16(parsed.total_time_ms),
        status_code: parsed.status_code,
        system_id: classify_system(parsed.user_agent).code(),
        platform_id: platform.pack(),
        completion_percent: completion_percent(parsed.bytes_sent, parsed.object_size),
        flags: flags.bits(),
    }
}

/// Sets the unique-client bit on a start-of-download record whose
/// (client, object) pair has not been seen before in this run.
///
/// Records without the start bit are left untouched and do not touch the
/// table.
pub fn mark_first_seen(record: &mut CompactRecord, seen: &mut DedupTable) -> Result<bool> {
    let mut flags = record.download_flags();
    if !flags.contains(DownloadFlags::START) {
        return Ok(false);
    }

    let first = seen.observe(composite_key(record.ip_hash, record.key_hash))?;
    if first {
        flags.insert(DownloadFlags::UNIQUE_CLIENT);
        record.flags = flags.bits();
        trace!(ip_hash = record.ip_hash, key_hash = record.key_hash, "First download by client");
    }
    Ok(first)
}

/// Projects a parsed line and resolves its unique-client bit.
pub fn compact(parsed: &ParsedLogRecord<'_>, seen: &mut DedupTable) -> Result<CompactRecord> {
    let mut record = project(parsed);
    mark_first_seen(&mut record, seen)?;
    Ok(record)
}

/// Where a byte range falls inside an object.
///
/// * `start == 0` sets [`DownloadFlags::START`]
/// * an end within the slack of the object size sets [`DownloadFlags::END`]
/// * a range that is neither gets [`DownloadFlags::MIDDLE`]
///
/// The slack is a megabyte, or 1000 bytes for objects under a megabyte.
pub fn position_flags(byte_start: u64, byte_end: u64, object_size: u64) -> DownloadFlags {
    let mut flags = DownloadFlags::NONE;
    if byte_start == 0 {
        flags.insert(DownloadFlags::START);
    }

    let slack = if object_size < MEGABYTE {
        SMALL_OBJECT_SLACK
    } else {
        MEGABYTE
    };
    if byte_end >= object_size.saturating_sub(slack) {
        flags.insert(DownloadFlags::END);
    } else if flags.is_empty() {
        flags = DownloadFlags::MIDDLE;
    }
    flags
}

/// `100 * bytes_sent / object_size`, capped at 100; `0` for empty objects.
pub fn completion_percent(bytes_sent: u64, object_size: u64) -> u8 {
    if object_size == 0 {
        return 0;
    }
    let percent = (bytes_sent as u128 * 100) / object_size as u128;
    percent.min(100) as u8
}

fn kilobytes(bytes: u64) -> u16 {
    saturate_u16(bytes / 1024)
}

fn saturate_u16(value: u64) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

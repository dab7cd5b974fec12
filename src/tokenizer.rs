//! Single-pass tokenizer for S3 server access log lines.
//!
//! A line is a sequence of space separated fields where quoted text
//! (`"GET /x HTTP/1.1"`) and bracketed text (`[06/Feb/2019:00:00:38 +0000]`)
//! may contain spaces. The tokenizer walks the line once, tracking whether it
//! is inside quotes and how deep it is inside brackets, and hands every
//! completed field to a positional dispatcher.
//!
//! The produced [`ParsedLogRecord`] borrows from the line it was built from,
//! so it lives only as long as the owned line buffer of the caller.

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::access_time::parse_access_time;

/// Number of fixed fields in an access log line.
pub const FIXED_FIELDS: usize = 26;

/// Index of the optional range field, present only on 206 responses.
pub const RANGE_FIELD: usize = 26;

/// Byte offsets of a partial-content response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// Structured view over one access log line.
///
/// Text fields keep their raw form, including surrounding quotes. Fields
/// that the line did not provide stay at their defaults: empty text, `0`,
/// or `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLogRecord<'a> {
    pub bucket_owner: &'a str,
    pub bucket_name: &'a str,
    pub time: Option<DateTime<FixedOffset>>,
    pub remote_ip: &'a str,
    pub requester_id: &'a str,
    pub request_id: &'a str,
    pub operation: &'a str,
    pub key: &'a str,
    pub request_uri: &'a str,
    /// HTTP status, `0` when outside 200..=599.
    pub status_code: u16,
    pub error_code: &'a str,
    pub bytes_sent: u64,
    pub object_size: u64,
    pub total_time_ms: u64,
    pub turnaround_time_ms: u64,
    pub referer: &'a str,
    pub user_agent: &'a str,
    pub version_id: &'a str,
    pub host_id: &'a str,
    pub signature_version: &'a str,
    pub cipher_suite: &'a str,
    pub auth_type: &'a str,
    pub host_header: &'a str,
    pub tls_version: &'a str,
    pub access_point_arn: &'a str,
    pub acl_required: &'a str,
    /// Range of a 206 response; `None` for every other status.
    pub range: Option<ByteRange>,

    /// Number of fields dispatched.
    pub fields: usize,
    /// The time field was present but could not be decoded.
    pub malformed_time: bool,
    /// Content remained after the last interpreted field and was ignored.
    pub overrun: bool,
}

impl<'a> ParsedLogRecord<'a> {
    pub fn byte_start(&self) -> u64 {
        self.range.map_or(0, |r| r.start)
    }

    pub fn byte_end(&self) -> u64 {
        self.range.map_or(0, |r| r.end)
    }

    pub fn is_partial_content(&self) -> bool {
        self.status_code == 206
    }

    /// Stores `field` at position `index`.
    fn assign(&mut self, index: usize, field: &'a str) {
        match index {
            0 => self.bucket_owner = field,
            1 => self.bucket_name = field,
            2 => {
                self.time = parse_access_time(field);
                if self.time.is_none() {
                    self.malformed_time = true;
                    debug!(field, "Failed to parse access time");
                }
            }
            3 => self.remote_ip = field,
            4 => self.requester_id = field,
            5 => self.request_id = field,
            6 => self.operation = field,
            7 => self.key = field,
            8 => self.request_uri = field,
            9 => self.status_code = parse_status(field),
            10 => self.error_code = field,
            11 => self.bytes_sent = parse_u64(field),
            12 => self.object_size = parse_u64(field),
            13 => self.total_time_ms = parse_u64(field),
            14 => self.turnaround_time_ms = parse_u64(field),
            15 => self.referer = field,
            16 => self.user_agent = field,
            17 => self.version_id = field,
            18 => self.host_id = field,
            19 => self.signature_version = field,
            20 => self.cipher_suite = field,
            21 => self.auth_type = field,
            22 => self.host_header = field,
            23 => self.tls_version = field,
            24 => self.access_point_arn = field,
            25 => self.acl_required = field,
            RANGE_FIELD => self.range = Some(parse_range(field)),
            _ => {}
        }
        self.fields = index + 1;
    }

    /// Whether a field at `index` would be interpreted.
    fn accepts(&self, index: usize) -> bool {
        index < FIXED_FIELDS || (index == RANGE_FIELD && self.is_partial_content())
    }
}

/// Tokenizes one line (without its line terminator).
///
/// Spaces separate fields only outside quotes and brackets. The end of the
/// line closes the last field. Scanning stops once every field that can be
/// interpreted has been read; anything after that is ignored and the record
/// is marked as [`overrun`](ParsedLogRecord::overrun).
///
/// # Examples
///
/// ```
/// # use s3slim::tokenizer::parse_line;
/// let line = r#"owner bucket [06/Feb/2019:00:00:38 +0000] 192.0.2.3 - REQ REST.GET.OBJECT /show/ep1.mp3 "GET /show/ep1.mp3 HTTP/1.1" 200 - 2048 4096 70 10 "-" "curl/7.15.1" - HOST SigV2 ECDHE AuthHeader host TLSv1.2 - -"#;
/// let record = parse_line(line);
/// assert_eq!(record.key, "/show/ep1.mp3");
/// assert_eq!(record.status_code, 200);
/// assert_eq!(record.object_size, 4096);
/// assert_eq!(record.fields, 26);
/// ```
pub fn parse_line(line: &str) -> ParsedLogRecord<'_> {
    let mut record = ParsedLogRecord::default();
    let bytes = line.as_bytes();
    let mut in_quote = false;
    let mut bracket_depth: u32 = 0;
    let mut field_start = 0;
    let mut index = 0;

    for (pos, &byte) in bytes.iter().enumerate() {
        match byte {
            b'"' => in_quote = !in_quote,
            b'[' => bracket_depth += 1,
            b']' => bracket_depth = bracket_depth.saturating_sub(1),
            b' ' if !in_quote && bracket_depth == 0 => {
                if !record.accepts(index) {
                    record.overrun = true;
                    return record;
                }
                record.assign(index, &line[field_start..pos]);
                index += 1;
                field_start = pos + 1;
            }
            _ => {}
        }
    }

    let last = &line[field_start..];
    if !last.is_empty() {
        if record.accepts(index) {
            record.assign(index, last);
        } else {
            record.overrun = true;
        }
    }
    record
}

/// Leading-digit integer parser.
///
/// Consumes ASCII digits from the start of `field` and stops at the first
/// other byte. Signs are not recognised and overflow wraps, so the result
/// is `0` for non-numeric input such as `-`.
pub fn parse_u64(field: &str) -> u64 {
    field
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |acc, digit| {
            acc.wrapping_mul(10).wrapping_add((digit - b'0') as u64)
        })
}

/// HTTP status, or `0` when outside 200..=599.
pub fn parse_status(field: &str) -> u16 {
    match parse_u64(field) {
        code @ 200..=599 => code as u16,
        _ => 0,
    }
}

/// Decodes `bytes=<start>-<end>`, tolerating surrounding quotes.
///
/// Missing parts decode as `0`.
pub fn parse_range(field: &str) -> ByteRange {
    let inner = field.trim_matches('"');
    let bounds = inner.strip_prefix("bytes=").unwrap_or(inner);
    let (start, end) = bounds.split_once('-').unwrap_or((bounds, ""));
    ByteRange {
        start: parse_u64(start),
        end: parse_u64(end),
    }
}

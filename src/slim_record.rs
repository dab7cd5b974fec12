use std::fmt;
use std::io::{self, Write};

use crate::user_agent::{Platform, SystemId};

/// Size of one encoded record in bytes.
pub const RECORD_SIZE: usize = 28;

/// Position of a 206 response within a multi-range download.
///
/// Bits are independent: a request that covers a whole object can be both
/// [`START`](DownloadFlags::START) and [`END`](DownloadFlags::END).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DownloadFlags(u8);

impl DownloadFlags {
    pub const NONE: DownloadFlags = DownloadFlags(0);
    /// First time this client requested the start of this object.
    pub const UNIQUE_CLIENT: DownloadFlags = DownloadFlags(0x01);
    pub const START: DownloadFlags = DownloadFlags(0x02);
    pub const MIDDLE: DownloadFlags = DownloadFlags(0x04);
    pub const END: DownloadFlags = DownloadFlags(0x08);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        DownloadFlags(bits)
    }

    pub const fn contains(self, other: DownloadFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: DownloadFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for DownloadFlags {
    type Output = DownloadFlags;

    fn bitor(self, rhs: DownloadFlags) -> DownloadFlags {
        DownloadFlags(self.0 | rhs.0)
    }
}

/// Fixed-size projection of one access log line.
///
/// Records never refer to each other, so they can be stored, sent or
/// grouped independently. On the wire a record is exactly
/// [`RECORD_SIZE`] bytes, little-endian, with no header or padding:
///
/// | offset | field | width |
/// |---|---|---|
/// | 0 | `timestamp` | 4 |
/// | 4 | `ip_hash` | 4 |
/// | 8 | `podcast_hash` | 4 |
/// | 12 | `key_hash` | 4 |
/// | 16 | `bytes_sent_kb` | 2 |
/// | 18 | `object_size_kb` | 2 |
/// | 20 | `download_time_ms` | 2 |
/// | 22 | `status_code` | 2 |
/// | 24 | `system_id` | 1 |
/// | 25 | `platform_id` | 1 |
/// | 26 | `completion_percent` | 1 |
/// | 27 | `flags` | 1 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CompactRecord {
    /// Seconds since the epoch, `0` when the access time was unusable.
    pub timestamp: u32,
    pub ip_hash: u32,
    pub podcast_hash: u32,
    pub key_hash: u32,
    pub bytes_sent_kb: u16,
    pub object_size_kb: u16,
    pub download_time_ms: u16,
    pub status_code: u16,
    pub system_id: u8,
    /// [`Platform`] packed as `(os << 4) | device`.
    pub platform_id: u8,
    pub completion_percent: u8,
    pub flags: u8,
}

impl CompactRecord {
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[4..8].copy_from_slice(&self.ip_hash.to_le_bytes());
        buf[8..12].copy_from_slice(&self.podcast_hash.to_le_bytes());
        buf[12..16].copy_from_slice(&self.key_hash.to_le_bytes());
        buf[16..18].copy_from_slice(&self.bytes_sent_kb.to_le_bytes());
        buf[18..20].copy_from_slice(&self.object_size_kb.to_le_bytes());
        buf[20..22].copy_from_slice(&self.download_time_ms.to_le_bytes());
        buf[22..24].copy_from_slice(&self.status_code.to_le_bytes());
        buf[24] = self.system_id;
        buf[25] = self.platform_id;
        buf[26] = self.completion_percent;
        buf[27] = self.flags;
        buf
    }

    pub fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let u16_at = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);

        CompactRecord {
            timestamp: u32_at(0),
            ip_hash: u32_at(4),
            podcast_hash: u32_at(8),
            key_hash: u32_at(12),
            bytes_sent_kb: u16_at(16),
            object_size_kb: u16_at(18),
            download_time_ms: u16_at(20),
            status_code: u16_at(22),
            system_id: buf[24],
            platform_id: buf[25],
            completion_percent: buf[26],
            flags: buf[27],
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.encode())
    }

    pub fn download_flags(&self) -> DownloadFlags {
        DownloadFlags::from_bits(self.flags)
    }

    pub fn system(&self) -> SystemId {
        SystemId::from_code(self.system_id)
    }

    pub fn platform(&self) -> Platform {
        Platform::unpack(self.platform_id)
    }
}

/// Column names of the CSV projection, in field order.
pub const CSV_HEADER: &str = "timestamp,ip_hash,podcast_hash,key_hash,bytes_sent_kb,object_size_kb,\
download_time_ms,status_code,system_id,platform_id,completion_percent,flags";

/// CSV row of the record, without a line terminator.
impl fmt::Display for CompactRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            self.timestamp,
            self.ip_hash,
            self.podcast_hash,
            self.key_hash,
            self.bytes_sent_kb,
            self.object_size_kb,
            self.download_time_ms,
            self.status_code,
            self.system_id,
            self.platform_id,
            self.completion_percent,
            self.flags
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_offsets() {
        let record = CompactRecord {
            timestamp: 0x0403_0201,
            ip_hash: 0x0807_0605,
            podcast_hash: 0x0C0B_0A09,
            key_hash: 0x100F_0E0D,
            bytes_sent_kb: 0x1211,
            object_size_kb: 0x1413,
            download_time_ms: 0x1615,
            status_code: 0x1817,
            system_id: 0x19,
            platform_id: 0x1A,
            completion_percent: 0x1B,
            flags: 0x1C,
        };
        let bytes = record.encode();
        let expected: Vec<u8> = (1..=28).collect();
        assert_eq!(bytes.as_slice(), expected.as_slice());
        assert_eq!(CompactRecord::decode(&bytes), record);
    }

    #[test]
    fn test_typed_accessors() {
        use crate::user_agent::{DeviceType, OsFamily};

        let platform = Platform {
            device: DeviceType::Tablet,
            os: OsFamily::Ios,
        };
        let record = CompactRecord {
            system_id: SystemId::Spotify.code(),
            platform_id: platform.pack(),
            ..Default::default()
        };
        let decoded = CompactRecord::decode(&record.encode());
        assert_eq!(decoded.system(), SystemId::Spotify);
        assert_eq!(decoded.platform(), platform);
    }

    #[test]
    fn test_flags() {
        let mut flags = DownloadFlags::START;
        flags.insert(DownloadFlags::UNIQUE_CLIENT);
        assert_eq!(flags.bits(), 0x03);
        assert!(flags.contains(DownloadFlags::START));
        assert!(!flags.contains(DownloadFlags::END));
        assert_eq!((DownloadFlags::START | DownloadFlags::END).bits(), 0x0A);
        assert!(DownloadFlags::NONE.is_empty());
    }

    #[test]
    fn test_csv_row() {
        let record = CompactRecord {
            timestamp: 1,
            status_code: 206,
            flags: 3,
            ..Default::default()
        };
        assert_eq!(record.to_string(), "1,0,0,0,0,0,0,206,0,0,0,3");
        assert_eq!(CSV_HEADER.split(',').count(), 12);
    }
}

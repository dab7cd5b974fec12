//! User-agent classification.
//!
//! Classification is a set of ordered rule tables. Each table is walked top
//! to bottom and the first rule whose predicate matches decides the result,
//! so precedence is the position in the table. Unrecognised clients map to
//! the `Unknown` variants.

/// Client application that issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SystemId {
    #[default]
    Unknown = 0,
    Blubrry = 1,
    Spotify = 2,
    ApplePodcasts = 3,
    GooglePodcasts = 4,
    YouTube = 5,
    PlayerFm = 6,
    WebPlayer = 7,
}

impl SystemId {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => SystemId::Blubrry,
            2 => SystemId::Spotify,
            3 => SystemId::ApplePodcasts,
            4 => SystemId::GooglePodcasts,
            5 => SystemId::YouTube,
            6 => SystemId::PlayerFm,
            7 => SystemId::WebPlayer,
            _ => SystemId::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DeviceType {
    #[default]
    Unknown = 0,
    Mobile = 1,
    Desktop = 2,
    Tablet = 3,
    SmartSpeaker = 4,
    Tv = 5,
    Watch = 6,
}

impl DeviceType {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => DeviceType::Mobile,
            2 => DeviceType::Desktop,
            3 => DeviceType::Tablet,
            4 => DeviceType::SmartSpeaker,
            5 => DeviceType::Tv,
            6 => DeviceType::Watch,
            _ => DeviceType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum OsFamily {
    #[default]
    Unknown = 0,
    Android = 1,
    Ios = 2,
    Windows = 3,
    MacOs = 4,
    Linux = 5,
    Chromecast = 6,
    TvOs = 7,
    WatchOs = 8,
}

impl OsFamily {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => OsFamily::Android,
            2 => OsFamily::Ios,
            3 => OsFamily::Windows,
            4 => OsFamily::MacOs,
            5 => OsFamily::Linux,
            6 => OsFamily::Chromecast,
            7 => OsFamily::TvOs,
            8 => OsFamily::WatchOs,
            _ => OsFamily::Unknown,
        }
    }
}

/// Device and operating system of a client.
///
/// Kept as two enums until the record is serialized; [`Platform::pack`]
/// places the OS in the high nibble and the device in the low nibble of one
/// byte. Both enums have fewer than 16 variants so packing is lossless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Platform {
    pub device: DeviceType,
    pub os: OsFamily,
}

impl Platform {
    pub fn pack(self) -> u8 {
        ((self.os as u8) << 4) | (self.device as u8 & 0x0F)
    }

    pub fn unpack(byte: u8) -> Self {
        Platform {
            device: DeviceType::from_code(byte & 0x0F),
            os: OsFamily::from_code(byte >> 4),
        }
    }
}

/// Predicate over the user agent text.
pub enum Pattern {
    /// Matches when any of the substrings occurs.
    Any(&'static [&'static str]),
}

impl Pattern {
    pub fn matches(&self, ua: &str) -> bool {
        match self {
            Pattern::Any(needles) => needles.iter().any(|n| ua.contains(n)),
        }
    }
}

pub struct SystemRule {
    pub pattern: Pattern,
    pub system: SystemId,
}

pub const SYSTEM_RULES: &[SystemRule] = &[
    SystemRule { pattern: Pattern::Any(&["RawVoice Generator/"]), system: SystemId::Blubrry },
    SystemRule { pattern: Pattern::Any(&["Spotify/"]), system: SystemId::Spotify },
    SystemRule { pattern: Pattern::Any(&["AppleCoreMedia/"]), system: SystemId::ApplePodcasts },
    SystemRule { pattern: Pattern::Any(&["Googlebot/"]), system: SystemId::GooglePodcasts },
    SystemRule { pattern: Pattern::Any(&["Youtube/"]), system: SystemId::YouTube },
    SystemRule { pattern: Pattern::Any(&["Player FM", "PlayerFM"]), system: SystemId::PlayerFm },
    SystemRule { pattern: Pattern::Any(&["Mozilla/"]), system: SystemId::WebPlayer },
];

pub struct OsRule {
    pub pattern: Pattern,
    pub os: OsFamily,
}

pub const OS_RULES: &[OsRule] = &[
    OsRule { pattern: Pattern::Any(&["Android"]), os: OsFamily::Android },
    OsRule { pattern: Pattern::Any(&["iPhone", "iPad", "iOS"]), os: OsFamily::Ios },
    OsRule { pattern: Pattern::Any(&["Windows"]), os: OsFamily::Windows },
    OsRule { pattern: Pattern::Any(&["Mac"]), os: OsFamily::MacOs },
    OsRule { pattern: Pattern::Any(&["tvOS"]), os: OsFamily::TvOs },
    OsRule { pattern: Pattern::Any(&["watchOS"]), os: OsFamily::WatchOs },
    OsRule { pattern: Pattern::Any(&["CrKey"]), os: OsFamily::Chromecast },
    OsRule { pattern: Pattern::Any(&["Linux"]), os: OsFamily::Linux },
];

/// Device rules may look at the OS chosen earlier as well as the text.
pub struct DeviceRule {
    pub matches: fn(&str, OsFamily) -> bool,
    pub device: DeviceType,
}

pub const DEVICE_RULES: &[DeviceRule] = &[
    DeviceRule {
        matches: |_, os| os == OsFamily::WatchOs,
        device: DeviceType::Watch,
    },
    DeviceRule {
        matches: |_, os| matches!(os, OsFamily::TvOs | OsFamily::Chromecast),
        device: DeviceType::Tv,
    },
    DeviceRule {
        matches: |ua, os| ua.contains("Mobile") || (os == OsFamily::Ios && ua.contains("iPhone")),
        device: DeviceType::Mobile,
    },
    DeviceRule {
        matches: |ua, _| ua.contains("Tablet") || ua.contains("iPad"),
        device: DeviceType::Tablet,
    },
    DeviceRule {
        matches: |ua, _| Pattern::Any(&["Echo", "HomePod", "GoogleHome"]).matches(ua),
        device: DeviceType::SmartSpeaker,
    },
    DeviceRule {
        matches: |_, os| matches!(os, OsFamily::Windows | OsFamily::MacOs | OsFamily::Linux),
        device: DeviceType::Desktop,
    },
];

pub fn classify_system(ua: &str) -> SystemId {
    if ua.is_empty() {
        return SystemId::Unknown;
    }
    SYSTEM_RULES
        .iter()
        .find(|rule| rule.pattern.matches(ua))
        .map_or(SystemId::Unknown, |rule| rule.system)
}

pub fn classify_os(ua: &str) -> OsFamily {
    OS_RULES
        .iter()
        .find(|rule| rule.pattern.matches(ua))
        .map_or(OsFamily::Unknown, |rule| rule.os)
}

pub fn classify_device(ua: &str, os: OsFamily) -> DeviceType {
    DEVICE_RULES
        .iter()
        .find(|rule| (rule.matches)(ua, os))
        .map_or(DeviceType::Unknown, |rule| rule.device)
}

/// OS family first, then device type conditioned on it.
pub fn classify_platform(ua: &str) -> Platform {
    let os = classify_os(ua);
    Platform {
        device: classify_device(ua, os),
        os,
    }
}

//! Timezone inference and offset lookup.
//!
//! Inference is a best-effort heuristic over addresses, not geocoding. The
//! static offset table ignores daylight saving; `TzMode::Iana` switches to
//! real zone rules.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use crate::error::ConfigurationError;

/// Zone used when nothing else resolves.
pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

/// How local wall-clock times are converted to UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TzMode {
    /// Fixed standard-time offsets, no DST.
    #[default]
    Static,
    /// IANA rules, DST-correct.
    Iana,
}

impl TzMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "static" | "fixed" => Some(TzMode::Static),
            "iana" | "dst" => Some(TzMode::Iana),
            _ => None,
        }
    }
}

const REGION_ZONES: &[(&str, &str)] = &[
    // Eastern
    ("NY", "America/New_York"),
    ("NJ", "America/New_York"),
    ("PA", "America/New_York"),
    ("CT", "America/New_York"),
    ("MA", "America/New_York"),
    ("RI", "America/New_York"),
    ("VT", "America/New_York"),
    ("NH", "America/New_York"),
    ("ME", "America/New_York"),
    ("DE", "America/New_York"),
    ("MD", "America/New_York"),
    ("DC", "America/New_York"),
    ("VA", "America/New_York"),
    ("WV", "America/New_York"),
    ("NC", "America/New_York"),
    ("SC", "America/New_York"),
    ("GA", "America/New_York"),
    ("FL", "America/New_York"),
    ("OH", "America/New_York"),
    ("MI", "America/Detroit"),
    ("IN", "America/Indiana/Indianapolis"),
    ("KY", "America/New_York"),
    ("ON", "America/Toronto"),
    ("QC", "America/Toronto"),
    // Central
    ("IL", "America/Chicago"),
    ("WI", "America/Chicago"),
    ("MN", "America/Chicago"),
    ("IA", "America/Chicago"),
    ("MO", "America/Chicago"),
    ("AR", "America/Chicago"),
    ("LA", "America/Chicago"),
    ("MS", "America/Chicago"),
    ("AL", "America/Chicago"),
    ("TN", "America/Chicago"),
    ("OK", "America/Chicago"),
    ("KS", "America/Chicago"),
    ("NE", "America/Chicago"),
    ("SD", "America/Chicago"),
    ("ND", "America/Chicago"),
    ("TX", "America/Chicago"),
    ("MB", "America/Winnipeg"),
    ("SK", "America/Regina"),
    // Mountain
    ("CO", "America/Denver"),
    ("WY", "America/Denver"),
    ("MT", "America/Denver"),
    ("NM", "America/Denver"),
    ("UT", "America/Denver"),
    ("ID", "America/Boise"),
    ("AZ", "America/Phoenix"),
    ("AB", "America/Edmonton"),
    // Pacific
    ("CA", "America/Los_Angeles"),
    ("WA", "America/Los_Angeles"),
    ("OR", "America/Los_Angeles"),
    ("NV", "America/Los_Angeles"),
    ("BC", "America/Vancouver"),
    // Other
    ("AK", "America/Anchorage"),
    ("HI", "Pacific/Honolulu"),
    ("PR", "America/Puerto_Rico"),
    ("NS", "America/Halifax"),
    ("NB", "America/Halifax"),
    ("PE", "America/Halifax"),
    ("NL", "America/St_Johns"),
];

// Multi-word names first so "kansas city" wins over shorter matches.
const CITY_ZONES: &[(&str, &str)] = &[
    ("salt lake city", "America/Denver"),
    ("oklahoma city", "America/Chicago"),
    ("kansas city", "America/Chicago"),
    ("new york", "America/New_York"),
    ("los angeles", "America/Los_Angeles"),
    ("san francisco", "America/Los_Angeles"),
    ("san diego", "America/Los_Angeles"),
    ("san antonio", "America/Chicago"),
    ("las vegas", "America/Los_Angeles"),
    ("new orleans", "America/Chicago"),
    ("st. louis", "America/Chicago"),
    ("st louis", "America/Chicago"),
    ("chicago", "America/Chicago"),
    ("houston", "America/Chicago"),
    ("dallas", "America/Chicago"),
    ("austin", "America/Chicago"),
    ("minneapolis", "America/Chicago"),
    ("nashville", "America/Chicago"),
    ("milwaukee", "America/Chicago"),
    ("boston", "America/New_York"),
    ("philadelphia", "America/New_York"),
    ("atlanta", "America/New_York"),
    ("miami", "America/New_York"),
    ("orlando", "America/New_York"),
    ("charlotte", "America/New_York"),
    ("pittsburgh", "America/New_York"),
    ("cleveland", "America/New_York"),
    ("columbus", "America/New_York"),
    ("baltimore", "America/New_York"),
    ("detroit", "America/Detroit"),
    ("indianapolis", "America/Indiana/Indianapolis"),
    ("toronto", "America/Toronto"),
    ("montreal", "America/Toronto"),
    ("denver", "America/Denver"),
    ("albuquerque", "America/Denver"),
    ("boise", "America/Boise"),
    ("phoenix", "America/Phoenix"),
    ("tucson", "America/Phoenix"),
    ("calgary", "America/Edmonton"),
    ("edmonton", "America/Edmonton"),
    ("seattle", "America/Los_Angeles"),
    ("portland", "America/Los_Angeles"),
    ("sacramento", "America/Los_Angeles"),
    ("vancouver", "America/Vancouver"),
    ("winnipeg", "America/Winnipeg"),
    ("regina", "America/Regina"),
    ("anchorage", "America/Anchorage"),
    ("honolulu", "Pacific/Honolulu"),
    ("halifax", "America/Halifax"),
];

/// Standard-time UTC offsets in minutes.
const STATIC_OFFSETS: &[(&str, i32)] = &[
    ("America/St_Johns", -210),
    ("America/Halifax", -240),
    ("America/Puerto_Rico", -240),
    ("America/New_York", -300),
    ("America/Detroit", -300),
    ("America/Toronto", -300),
    ("America/Indiana/Indianapolis", -300),
    ("America/Chicago", -360),
    ("America/Winnipeg", -360),
    ("America/Regina", -360),
    ("America/Denver", -420),
    ("America/Boise", -420),
    ("America/Edmonton", -420),
    ("America/Phoenix", -420),
    ("America/Los_Angeles", -480),
    ("America/Vancouver", -480),
    ("America/Anchorage", -540),
    ("Pacific/Honolulu", -600),
    ("Europe/London", 0),
    ("UTC", 0),
];

/// Region codes are matched as standalone two-letter uppercase tokens,
/// the last one winning since US/Canadian addresses put them at the end; city
/// names are matched case-insensitively. A `CA` that follows another region
/// code is the country (`Toronto, ON, CA`), not California.
pub fn detect_timezone(address: &str) -> &'static str {
    let regions: Vec<(&str, &'static str)> = address
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter_map(|token| REGION_ZONES.iter().find(|(code, _)| *code == token).copied())
        .collect();

    match regions.as_slice() {
        [.., (_, zone), ("CA", _)] => return *zone,
        [.., (_, zone)] => return *zone,
        [] => {}
    }

    let lowered = address.to_lowercase();
    if let Some((_, zone)) = CITY_ZONES.iter().find(|(city, _)| lowered.contains(city)) {
        return zone;
    }

    DEFAULT_TIMEZONE
}

pub fn static_offset_minutes(zone: &str) -> Result<i32, ConfigurationError> {
    STATIC_OFFSETS
        .iter()
        .find(|(name, _)| *name == zone)
        .map(|(_, offset)| *offset)
        .ok_or_else(|| ConfigurationError::UnknownTimezone(zone.to_string()))
}

/// Whether `zone` can be converted under `mode`.
pub fn is_known(zone: &str, mode: TzMode) -> bool {
    match mode {
        TzMode::Static => static_offset_minutes(zone).is_ok(),
        TzMode::Iana => zone.parse::<chrono_tz::Tz>().is_ok(),
    }
}

/// Converts a wall-clock time in `zone` to UTC.
///
/// Under `Iana`, ambiguous times (DST fall-back) take the earlier instant
/// and nonexistent times (spring-forward gap) move one hour later.
pub fn local_to_utc(
    zone: &str,
    local: NaiveDateTime,
    mode: TzMode,
) -> Result<DateTime<Utc>, ConfigurationError> {
    match mode {
        TzMode::Static => {
            let offset = static_offset_minutes(zone)?;
            let utc = local - Duration::minutes(offset as i64);
            Ok(Utc.from_utc_datetime(&utc))
        }
        TzMode::Iana => {
            let tz: chrono_tz::Tz = zone
                .parse()
                .map_err(|_| ConfigurationError::UnknownTimezone(zone.to_string()))?;
            tz.from_local_datetime(&local)
                .earliest()
                .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| ConfigurationError::UnknownTimezone(zone.to_string()))
        }
    }
}

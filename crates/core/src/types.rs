use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

/// Single-letter household identifier (`A`, `B`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HouseholdId(char);

impl HouseholdId {
    pub fn new(letter: char) -> Option<Self> {
        letter.is_ascii_uppercase().then_some(Self(letter))
    }

    pub fn letter(&self) -> char {
        self.0
    }
}

impl fmt::Display for HouseholdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("household id must be a single upper-case letter, got {0:?}")]
pub struct InvalidHouseholdId(pub String);

impl FromStr for HouseholdId {
    type Err = InvalidHouseholdId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c).ok_or_else(|| InvalidHouseholdId(s.to_string())),
            _ => Err(InvalidHouseholdId(s.to_string())),
        }
    }
}

impl TryFrom<String> for HouseholdId {
    type Error = InvalidHouseholdId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HouseholdId> for String {
    fn from(id: HouseholdId) -> Self {
        id.0.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayType::Weekday => "weekday",
            DayType::Weekend => "weekend",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clock band a chapter starts in.
///
/// The bands are contiguous and cover the whole day:
/// night `[0, 6)`, morning `[6, 12)`, afternoon `[12, 18)`, evening `[18, 24)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Display order used by the dashboard.
    pub const ALL: [TimeOfDay; 4] = [
        TimeOfDay::Morning,
        TimeOfDay::Afternoon,
        TimeOfDay::Evening,
        TimeOfDay::Night,
    ];

    /// Half-open hour range `[start, end)` of this band.
    pub fn hours(&self) -> (u32, u32) {
        match self {
            TimeOfDay::Night => (0, 6),
            TimeOfDay::Morning => (6, 12),
            TimeOfDay::Afternoon => (12, 18),
            TimeOfDay::Evening => (18, 24),
        }
    }

    pub fn from_hour(hour: u32) -> Self {
        match hour % 24 {
            6..12 => TimeOfDay::Morning,
            12..18 => TimeOfDay::Afternoon,
            18..24 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    /// Bucket for an offset in seconds from the start of the recording.
    /// Offsets past 24h wrap around the clock.
    pub fn from_seconds(seconds: f64) -> Self {
        let hour = (seconds.max(0.0) / 3600.0).floor() as u64 % 24;
        Self::from_hour(hour as u32)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A video file resolved from the inventory directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub household_id: HouseholdId,
    pub day_number: u32,
    pub day_type: DayType,
    pub file_path: PathBuf,
}

impl VideoRecord {
    /// Canonical file name for a household/day pair.
    pub fn file_name(household_id: HouseholdId, day_number: u32) -> String {
        format!("household_{}_day{}.mp4", household_id, day_number)
    }

    pub fn label(&self) -> String {
        format!("Household {}, Day {}", self.household_id, self.day_number)
    }
}

/// A chapter as returned by the analysis service, after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub video_id: String,
    pub chapter_number: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub title: String,
    pub summary: String,
}

/// One output row. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub household_id: HouseholdId,
    pub day_number: u32,
    pub day_type: DayType,
    pub video_id: String,
    pub chapter_number: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub duration_seconds: f64,
    pub time_of_day: TimeOfDay,
    pub time_range: String,
    pub chapter_title: String,
    pub chapter_summary: String,
    pub timestamp: String,
}

pub const CSV_COLUMNS: [&str; 13] = [
    "household_id",
    "day_number",
    "day_type",
    "video_id",
    "chapter_number",
    "start_time",
    "end_time",
    "duration_seconds",
    "time_of_day",
    "time_range",
    "chapter_title",
    "chapter_summary",
    "timestamp",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn household_id_parses_single_upper_case_letter() {
        assert_eq!("A".parse::<HouseholdId>().unwrap().letter(), 'A');
        assert!("a".parse::<HouseholdId>().is_err());
        assert!("AB".parse::<HouseholdId>().is_err());
        assert!("".parse::<HouseholdId>().is_err());
    }

    #[test]
    fn time_of_day_bands_partition_the_clock() {
        let mut covered = [0u8; 24];
        for band in TimeOfDay::ALL {
            let (start, end) = band.hours();
            for hour in start..end {
                covered[hour as usize] += 1;
                assert_eq!(TimeOfDay::from_hour(hour), band);
            }
        }
        assert!(covered.iter().all(|&n| n == 1), "{covered:?}");
    }

    #[test]
    fn every_start_second_maps_to_its_band() {
        for second in (0..2 * 86_400).step_by(7) {
            let band = TimeOfDay::from_seconds(second as f64);
            let (start, end) = band.hours();
            let hour = (second / 3600) % 24;
            assert!(start <= hour && hour < end, "second {second} -> {band}");
        }
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(TimeOfDay::from_seconds(0.0), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_seconds(6.0 * 3600.0 - 0.5), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_seconds(6.0 * 3600.0), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_seconds(12.0 * 3600.0), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_seconds(18.0 * 3600.0), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_seconds(24.0 * 3600.0), TimeOfDay::Night);
    }
}

//! Resolves `household_<ID>_day<N>.mp4` files in a video directory.

use std::{
    collections::BTreeSet,
    path::Path,
    sync::LazyLock,
};

use regex::Regex;
use tracing::debug;

use crate::{
    config::DayCalendar,
    error::{KinscopeError, Result},
    types::{HouseholdId, VideoRecord},
};

static VIDEO_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^household_([A-Z])_day([0-9]+)\.mp4$").expect("video file name pattern")
});

/// Which household/day combinations to include. Empty sets match everything.
#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    pub households: BTreeSet<HouseholdId>,
    pub days: BTreeSet<u32>,
}

impl InventoryFilter {
    pub fn new(
        households: impl IntoIterator<Item = HouseholdId>,
        days: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            households: households.into_iter().collect(),
            days: days.into_iter().collect(),
        }
    }

    pub fn matches(&self, household_id: HouseholdId, day_number: u32) -> bool {
        (self.households.is_empty() || self.households.contains(&household_id))
            && (self.days.is_empty() || self.days.contains(&day_number))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub videos: Vec<VideoRecord>,
    /// Requested household/day pairs with no file. Only filled when both
    /// households and days were given explicitly.
    pub missing: Vec<(HouseholdId, u32)>,
    pub skipped_files: usize,
}

/// Parse a file name into its household and day.
pub fn parse_file_name(file_name: &str) -> Result<(HouseholdId, u32)> {
    let mismatch = || KinscopeError::FilenamePatternMismatch {
        file_name: file_name.to_string(),
    };

    let caps = VIDEO_FILE_NAME.captures(file_name).ok_or_else(mismatch)?;
    let household_id = caps[1].parse::<HouseholdId>().map_err(|_| mismatch())?;
    let day_number = caps[2].parse::<u32>().map_err(|_| mismatch())?;
    if day_number == 0 {
        return Err(mismatch());
    }

    Ok((household_id, day_number))
}

/// List matching videos under `root`, ordered by household then day.
pub fn resolve(root: &Path, filter: &InventoryFilter, calendar: &DayCalendar) -> Result<Inventory> {
    let entries = std::fs::read_dir(root).map_err(|source| KinscopeError::InventoryUnavailable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut inventory = Inventory::default();

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();

        let (household_id, day_number) = match parse_file_name(&file_name) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("skipping {}: {}", path.display(), e);
                inventory.skipped_files += 1;
                continue;
            }
        };

        if filter.matches(household_id, day_number) {
            inventory.videos.push(VideoRecord {
                household_id,
                day_number,
                day_type: calendar.day_type(day_number),
                file_path: path,
            });
        }
    }

    inventory
        .videos
        .sort_by(|a, b| (a.household_id, a.day_number).cmp(&(b.household_id, b.day_number)));

    if !filter.households.is_empty() && !filter.days.is_empty() {
        let found: BTreeSet<(HouseholdId, u32)> = inventory
            .videos
            .iter()
            .map(|v| (v.household_id, v.day_number))
            .collect();
        for household_id in &filter.households {
            for day in &filter.days {
                if !found.contains(&(*household_id, *day)) {
                    inventory.missing.push((*household_id, *day));
                }
            }
        }
    }

    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DayType;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    fn hh(s: &str) -> HouseholdId {
        s.parse().unwrap()
    }

    #[test]
    fn file_name_round_trip() {
        for letter in 'A'..='Z' {
            for day in [1u32, 2, 4, 10, 365] {
                let id = HouseholdId::new(letter).unwrap();
                let name = VideoRecord::file_name(id, day);
                assert_eq!(parse_file_name(&name).unwrap(), (id, day));
            }
        }
    }

    #[test]
    fn rejects_malformed_names() {
        for name in [
            "household_A_day1.mov",
            "household_a_day1.mp4",
            "household_AB_day1.mp4",
            "household_A_day.mp4",
            "household_A_day0.mp4",
            "household_A_dayX.mp4",
            "xhousehold_A_day1.mp4",
            "household_A_day1.mp4.bak",
            "README.md",
        ] {
            assert!(
                matches!(
                    parse_file_name(name),
                    Err(KinscopeError::FilenamePatternMismatch { .. })
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn filters_by_household_and_day() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "household_A_day1.mp4",
            "household_A_day2.mp4",
            "household_B_day1.mp4",
            "household_C_day3.mp4",
            "notes.txt",
            "household_A_day1.mov",
        ] {
            touch(dir.path(), name);
        }
        std::fs::create_dir(dir.path().join("household_A_day4.mp4")).unwrap();

        let filter = InventoryFilter::new([hh("A")], [1]);
        let inventory = resolve(dir.path(), &filter, &DayCalendar::default()).unwrap();

        assert_eq!(inventory.videos.len(), 1);
        let video = &inventory.videos[0];
        assert_eq!(video.household_id, hh("A"));
        assert_eq!(video.day_number, 1);
        assert_eq!(video.day_type, DayType::Weekday);
        assert_eq!(video.file_path, dir.path().join("household_A_day1.mp4"));
        assert_eq!(inventory.skipped_files, 2);
        assert!(inventory.missing.is_empty());
    }

    #[test]
    fn no_filter_matches_all_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "household_B_day1.mp4",
            "household_A_day3.mp4",
            "household_A_day1.mp4",
        ] {
            touch(dir.path(), name);
        }

        let inventory =
            resolve(dir.path(), &InventoryFilter::default(), &DayCalendar::default()).unwrap();
        let keys: Vec<_> = inventory
            .videos
            .iter()
            .map(|v| (v.household_id.to_string(), v.day_number, v.day_type))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("A".to_string(), 1, DayType::Weekday),
                ("A".to_string(), 3, DayType::Weekend),
                ("B".to_string(), 1, DayType::Weekday),
            ]
        );
    }

    #[test]
    fn reports_missing_requested_pairs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "household_A_day1.mp4");

        let filter = InventoryFilter::new([hh("A"), hh("B")], [1, 2]);
        let inventory = resolve(dir.path(), &filter, &DayCalendar::default()).unwrap();

        assert_eq!(inventory.videos.len(), 1);
        assert_eq!(
            inventory.missing,
            vec![(hh("A"), 2), (hh("B"), 1), (hh("B"), 2)]
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(
            &dir.path().join("nope"),
            &InventoryFilter::default(),
            &DayCalendar::default(),
        )
        .unwrap_err();
        assert!(matches!(err, KinscopeError::InventoryUnavailable { .. }));
    }
}

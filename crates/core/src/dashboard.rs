//! Read-only view model over an aggregate dataset: filters, metrics and
//! groupings the dashboard renders.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    aggregate::AggregateDataset,
    types::{AnalysisRow, DayType, HouseholdId, TimeOfDay},
};

/// Households that can be compared side by side.
pub const MAX_COMPARED: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DayFilter {
    #[default]
    All,
    Weekdays,
    Weekends,
}

impl DayFilter {
    pub const ALL: [DayFilter; 3] = [DayFilter::All, DayFilter::Weekdays, DayFilter::Weekends];

    pub fn matches(&self, day_type: DayType) -> bool {
        match self {
            DayFilter::All => true,
            DayFilter::Weekdays => day_type == DayType::Weekday,
            DayFilter::Weekends => day_type == DayType::Weekend,
        }
    }
}

impl std::fmt::Display for DayFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DayFilter::All => "All",
            DayFilter::Weekdays => "Weekdays",
            DayFilter::Weekends => "Weekends",
        })
    }
}

/// Empty `households` means every household.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardFilter {
    pub households: BTreeSet<HouseholdId>,
    pub days: DayFilter,
}

impl DashboardFilter {
    pub fn matches(&self, row: &AnalysisRow) -> bool {
        (self.households.is_empty() || self.households.contains(&row.household_id))
            && self.days.matches(row.day_type)
    }

    pub fn toggle(&mut self, household_id: HouseholdId) {
        if !self.households.remove(&household_id) {
            self.households.insert(household_id);
        }
    }
}

/// Households picked for side-by-side comparison, independent of the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompareSelection {
    households: BTreeSet<HouseholdId>,
}

impl CompareSelection {
    /// The first [`MAX_COMPARED`] of `households`.
    pub fn first_of(households: &[HouseholdId]) -> Self {
        Self {
            households: households.iter().copied().take(MAX_COMPARED).collect(),
        }
    }

    /// Add or remove a household. Adding fails once [`MAX_COMPARED`] are chosen.
    pub fn toggle(&mut self, household_id: HouseholdId) -> bool {
        if self.households.remove(&household_id) {
            return true;
        }
        if self.is_full() {
            return false;
        }
        self.households.insert(household_id)
    }

    pub fn contains(&self, household_id: &HouseholdId) -> bool {
        self.households.contains(household_id)
    }

    pub fn is_full(&self) -> bool {
        self.households.len() >= MAX_COMPARED
    }

    pub fn ids(&self) -> Vec<HouseholdId> {
        self.households.iter().copied().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overview {
    pub households: usize,
    pub days: usize,
    pub chapters: usize,
    pub total_hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HouseholdActivity {
    pub household_id: HouseholdId,
    pub chapters: usize,
    pub hours: f64,
}

/// Chapter counts per time of day, in [`TimeOfDay::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeOfDayCounts {
    pub household_id: HouseholdId,
    pub counts: [usize; 4],
}

impl TimeOfDayCounts {
    pub fn get(&self, band: TimeOfDay) -> usize {
        TimeOfDay::ALL
            .iter()
            .position(|b| *b == band)
            .map(|i| self.counts[i])
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayTimeline<'a> {
    pub day_number: u32,
    pub day_type: DayType,
    pub rows: Vec<&'a AnalysisRow>,
}

pub struct Dashboard {
    dataset: AggregateDataset,
}

impl Dashboard {
    pub fn new(mut dataset: AggregateDataset) -> Self {
        dataset.sort();
        Self { dataset }
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn households(&self) -> Vec<HouseholdId> {
        self.dataset
            .rows()
            .iter()
            .map(|r| r.household_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Households the filter selects, or every household when none is selected.
    pub fn selected_households(&self, filter: &DashboardFilter) -> Vec<HouseholdId> {
        let all = self.households();
        if filter.households.is_empty() {
            return all;
        }
        all.into_iter()
            .filter(|id| filter.households.contains(id))
            .collect()
    }

    pub fn rows<'a>(&'a self, filter: &'a DashboardFilter) -> impl Iterator<Item = &'a AnalysisRow> + 'a {
        self.dataset.rows().iter().filter(move |r| filter.matches(r))
    }

    pub fn overview(&self, filter: &DashboardFilter) -> Overview {
        let mut households = BTreeSet::new();
        let mut days = BTreeSet::new();
        let mut chapters = 0;
        let mut seconds = 0.0;
        for row in self.rows(filter) {
            households.insert(row.household_id);
            days.insert(row.day_number);
            chapters += 1;
            seconds += row.duration_seconds;
        }
        Overview {
            households: households.len(),
            days: days.len(),
            chapters,
            total_hours: seconds / 3600.0,
        }
    }

    pub fn activity_by_household(&self, filter: &DashboardFilter) -> Vec<HouseholdActivity> {
        let mut by_household: BTreeMap<HouseholdId, (usize, f64)> = BTreeMap::new();
        for row in self.rows(filter) {
            let entry = by_household.entry(row.household_id).or_default();
            entry.0 += 1;
            entry.1 += row.duration_seconds;
        }
        by_household
            .into_iter()
            .map(|(household_id, (chapters, seconds))| HouseholdActivity {
                household_id,
                chapters,
                hours: seconds / 3600.0,
            })
            .collect()
    }

    pub fn time_of_day_counts(&self, filter: &DashboardFilter) -> Vec<TimeOfDayCounts> {
        let mut by_household: BTreeMap<HouseholdId, [usize; 4]> = BTreeMap::new();
        for row in self.rows(filter) {
            let counts = by_household.entry(row.household_id).or_default();
            if let Some(i) = TimeOfDay::ALL.iter().position(|b| *b == row.time_of_day) {
                counts[i] += 1;
            }
        }
        by_household
            .into_iter()
            .map(|(household_id, counts)| TimeOfDayCounts {
                household_id,
                counts,
            })
            .collect()
    }

    /// Time-of-day profiles for up to [`MAX_COMPARED`] households over the
    /// selected days. Returns `None` unless at least two households are chosen.
    pub fn compare(
        &self,
        days: DayFilter,
        households: &[HouseholdId],
    ) -> Option<Vec<TimeOfDayCounts>> {
        let chosen: Vec<HouseholdId> = households
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .take(MAX_COMPARED)
            .collect();
        if chosen.len() < 2 {
            return None;
        }

        let counts = self.time_of_day_counts(&DashboardFilter {
            households: BTreeSet::new(),
            days,
        });
        Some(
            chosen
                .into_iter()
                .map(|household_id| {
                    counts
                        .iter()
                        .find(|c| c.household_id == household_id)
                        .cloned()
                        .unwrap_or(TimeOfDayCounts {
                            household_id,
                            counts: [0; 4],
                        })
                })
                .collect(),
        )
    }

    /// Chapters of one household grouped by day, in chapter order.
    pub fn timeline<'a>(
        &'a self,
        filter: &'a DashboardFilter,
        household_id: HouseholdId,
    ) -> Vec<DayTimeline<'a>> {
        let mut days: BTreeMap<u32, DayTimeline<'a>> = BTreeMap::new();
        for row in self.rows(filter).filter(|r| r.household_id == household_id) {
            days.entry(row.day_number)
                .or_insert_with(|| DayTimeline {
                    day_number: row.day_number,
                    day_type: row.day_type,
                    rows: Vec::new(),
                })
                .rows
                .push(row);
        }
        days.into_values().collect()
    }
}

//! Accumulates rows for a run and persists them as CSV and per-household JSON.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::{
    error::{KinscopeError, Result},
    types::{AnalysisRow, CSV_COLUMNS, HouseholdId},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateDataset {
    rows: Vec<AnalysisRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HouseholdStats {
    pub household_id: HouseholdId,
    pub chapters: usize,
    pub total_duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdSummary {
    pub household_id: HouseholdId,
    pub run_id: Uuid,
    pub generated_at: String,
    pub total_chapters: usize,
    pub total_duration_seconds: f64,
    pub days: Vec<u32>,
    pub rows: Vec<AnalysisRow>,
}

impl AggregateDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<AnalysisRow>) -> Self {
        Self { rows }
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = AnalysisRow>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[AnalysisRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stable sort by household, day, chapter so re-runs produce the same file.
    pub fn sort(&mut self) {
        self.rows.sort_by_key(|r| (r.household_id, r.day_number, r.chapter_number));
    }

    pub fn household_stats(&self) -> Vec<HouseholdStats> {
        let mut by_household: BTreeMap<HouseholdId, HouseholdStats> = BTreeMap::new();
        for row in &self.rows {
            let stats = by_household
                .entry(row.household_id)
                .or_insert_with(|| HouseholdStats {
                    household_id: row.household_id,
                    chapters: 0,
                    total_duration_seconds: 0.0,
                });
            stats.chapters += 1;
            stats.total_duration_seconds += row.duration_seconds;
        }
        by_household.into_values().collect()
    }

    pub fn household_summaries(&self, run_id: Uuid, generated_at: &str) -> Vec<HouseholdSummary> {
        let mut grouped: BTreeMap<HouseholdId, Vec<AnalysisRow>> = BTreeMap::new();
        for row in &self.rows {
            grouped.entry(row.household_id).or_default().push(row.clone());
        }

        grouped
            .into_iter()
            .map(|(household_id, rows)| {
                let mut days: Vec<u32> = rows.iter().map(|r| r.day_number).collect();
                days.sort_unstable();
                days.dedup();
                HouseholdSummary {
                    household_id,
                    run_id,
                    generated_at: generated_at.to_string(),
                    total_chapters: rows.len(),
                    total_duration_seconds: rows.iter().map(|r| r.duration_seconds).sum(),
                    days,
                    rows,
                }
            })
            .collect()
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(CSV_COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| KinscopeError::IoError(e.into_error()))
    }

    /// Write the combined CSV. The file is replaced atomically so an
    /// interrupted run never leaves a half-written dataset behind.
    pub async fn write_csv(&self, path: &Path) -> Result<()> {
        let bytes = self.to_csv_bytes()?;
        write_atomic(path, &bytes).await
    }

    /// Write one `household_<ID>.json` per household into `dir`.
    pub async fn write_household_summaries(
        &self,
        dir: &Path,
        run_id: Uuid,
        generated_at: &str,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| KinscopeError::output_write(dir, e))?;

        let mut written = Vec::new();
        for summary in self.household_summaries(run_id, generated_at) {
            let path = dir.join(format!("household_{}.json", summary.household_id));
            let pretty_json = serde_json::to_string_pretty(&summary)?;
            write_atomic(&path, pretty_json.as_bytes()).await?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Load a dataset written by [`AggregateDataset::write_csv`].
pub fn read_csv(path: &Path) -> Result<AggregateDataset> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize::<AnalysisRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(AggregateDataset { rows })
}

pub fn read_household_summary(path: &Path) -> Result<HouseholdSummary> {
    let json_content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json_content)?)
}

/// Load every `household_*.json` summary in `dir` into one dataset.
pub fn read_summaries_dir(dir: &Path) -> Result<AggregateDataset> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy())
                .is_some_and(|n| n.starts_with("household_") && n.ends_with(".json"))
        })
        .collect();
    paths.sort();

    let mut dataset = AggregateDataset::new();
    for path in paths {
        dataset.extend(read_household_summary(&path)?.rows);
    }
    dataset.sort();
    Ok(dataset)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| KinscopeError::output_write(parent, e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".partial");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| KinscopeError::output_write(&tmp_path, e))?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| KinscopeError::output_write(path, e))?;
    Ok(())
}

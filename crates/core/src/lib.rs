pub mod aggregate;
pub mod cache;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod format;
pub mod inventory;
pub mod job;
pub mod pipeline;
pub mod projector;
pub mod provider;
pub mod types;

pub use aggregate::{AggregateDataset, HouseholdStats, HouseholdSummary, read_csv, read_summaries_dir};
pub use cache::{IndexCache, get_root_cache_dir};
pub use client::{AnalysisClient, AnalysisService, RawChapter, TaskStatus, TwelveLabsService};
pub use config::{DayCalendar, KinscopeConfig, PollPolicy, RetryPolicy};
pub use dashboard::{CompareSelection, Dashboard, DashboardFilter, DayFilter};
pub use error::{KinscopeError, Result};
pub use format::{format_hours, format_row_readable, format_time_range, format_timestamp};
pub use inventory::{Inventory, InventoryFilter};
pub use job::{JobStage, JobState, VideoJob};
pub use pipeline::{BatchEvent, BatchReport, BatchRunner, FailedVideo};
pub use projector::{project, project_all};
pub use provider::Provider;
pub use types::{AnalysisRow, ChapterRecord, DayType, HouseholdId, TimeOfDay, VideoRecord};

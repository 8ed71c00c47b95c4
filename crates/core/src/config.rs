use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use crate::{provider::Provider, types::DayType};

pub const DEFAULT_VIDEO_DIR: &str = "videos";
pub const DEFAULT_OUTPUT: &str = "multi_household_analysis.csv";

pub const ACTIVITY_CHAPTER_PROMPT: &str = r#"Generate chapters focused on daily life activities.

Chapter description rules:
- Limit to one or two sentences
- Include only people's main actions (e.g., "using laptop", "watching TV", "cooking", "talking")
- Absolutely exclude background, environment, or object location descriptions
- Include time of day when possible (morning/afternoon/evening/night)

Good examples:
- "Morning - Husband using laptop and phone at dining table, sharing screen with wife"
- "Afternoon - Couple watching documentary on TV from sofa while talking"
- "Evening - Wife alone on sofa working on laptop while watching TV, with cat"

Bad examples (absolutely forbidden):
- "The video captures a detailed scene..."
- "The environment is meticulously presented..."
- Any descriptions of hallways, boxes, doors, or room layouts

Describe only people's actions and activities concisely."#;

/// Maps day numbers to weekday/weekend. Days not listed as weekend are weekdays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCalendar {
    weekend_days: BTreeSet<u32>,
}

impl DayCalendar {
    pub fn new(weekend_days: impl IntoIterator<Item = u32>) -> Self {
        Self {
            weekend_days: weekend_days.into_iter().collect(),
        }
    }

    pub fn day_type(&self, day_number: u32) -> DayType {
        if self.weekend_days.contains(&day_number) {
            DayType::Weekend
        } else {
            DayType::Weekday
        }
    }

    pub fn weekend_days(&self) -> impl Iterator<Item = u32> + '_ {
        self.weekend_days.iter().copied()
    }
}

impl Default for DayCalendar {
    /// Recording days 1-2 fell on weekdays and 3-4 on a weekend.
    fn default() -> Self {
        Self::new([3, 4])
    }
}

/// Per-call timeout and bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub call_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            call_timeout: Duration::from_secs(300),
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// How long and how often to wait for indexing to finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(60 * 60),
        }
    }
}

/// Chapter generation request parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterRequest {
    pub prompt: String,
    pub temperature: f32,
    pub language: String,
}

impl Default for ChapterRequest {
    fn default() -> Self {
        Self {
            prompt: ACTIVITY_CHAPTER_PROMPT.to_string(),
            temperature: 0.2,
            language: "en".to_string(),
        }
    }
}

/// Everything a batch run needs, passed explicitly to each component.
#[derive(Debug, Clone)]
pub struct KinscopeConfig {
    pub provider: Provider,
    pub api_key: String,
    pub index_id: String,
    pub chapters: ChapterRequest,
    pub retry: RetryPolicy,
    pub poll: PollPolicy,
    pub calendar: DayCalendar,
    pub concurrency: usize,
    pub pause_between_videos: Duration,
    /// `None` disables the upload cache.
    pub cache_dir: Option<PathBuf>,
}

impl KinscopeConfig {
    pub fn new(provider: Provider, api_key: String, index_id: String) -> Self {
        Self {
            provider,
            api_key,
            index_id,
            chapters: ChapterRequest::default(),
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
            calendar: DayCalendar::default(),
            concurrency: 1,
            pause_between_videos: Duration::from_secs(2),
            cache_dir: None,
        }
    }
}

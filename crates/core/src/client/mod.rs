//! Per-video analysis: submit the file, wait for indexing, fetch chapters.

pub mod retry;
pub mod twelvelabs;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    config::{PollPolicy, RetryPolicy},
    error::{KinscopeError, Result},
    job::{JobStage, JobState, VideoJob},
    types::{ChapterRecord, VideoRecord},
};

pub use retry::with_retry;
pub use twelvelabs::TwelveLabsService;

/// Indexing progress of an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending { status: String },
    Ready { video_id: String },
    Failed { reason: String },
}

/// A chapter exactly as the service returned it; any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawChapter {
    #[serde(default)]
    pub chapter_number: Option<u32>,
    #[serde(default, alias = "start")]
    pub start_sec: Option<f64>,
    #[serde(default, alias = "end")]
    pub end_sec: Option<f64>,
    #[serde(default, alias = "title")]
    pub chapter_title: Option<String>,
    #[serde(default, alias = "summary")]
    pub chapter_summary: Option<String>,
}

/// The external video analysis API, reduced to the three calls a batch needs.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Upload a video for indexing and return the task id.
    async fn submit(&self, video: &VideoRecord) -> Result<String>;

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus>;

    async fn chapters(&self, video_id: &str) -> Result<Vec<RawChapter>>;
}

/// Validated chapters of one video plus the reasons any were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterSet {
    pub chapters: Vec<ChapterRecord>,
    pub dropped: Vec<String>,
}

fn check_chapter(raw: &RawChapter) -> std::result::Result<(f64, f64, String), String> {
    let start = raw.start_sec.ok_or("missing start time")?;
    let end = raw.end_sec.ok_or("missing end time")?;
    let title = raw
        .chapter_title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or("missing title")?;

    if !start.is_finite() || !end.is_finite() {
        return Err(format!("non-finite times {start}..{end}"));
    }
    if start < 0.0 {
        return Err(format!("negative start time {start}"));
    }
    if end < start {
        return Err(format!("end time {end} before start time {start}"));
    }

    Ok((start, end, title.to_string()))
}

/// Drop malformed chapters, order the rest by start time and number them 1..n.
pub fn normalize_chapters(video_id: &str, raw: Vec<RawChapter>) -> ChapterSet {
    let mut set = ChapterSet::default();
    let mut valid = Vec::new();

    for (index, chapter) in raw.into_iter().enumerate() {
        match check_chapter(&chapter) {
            Ok((start, end, title)) => {
                let order = chapter.chapter_number.unwrap_or(index as u32);
                valid.push((
                    order,
                    ChapterRecord {
                        video_id: video_id.to_string(),
                        chapter_number: 0,
                        start_time: start,
                        end_time: end,
                        title,
                        summary: chapter.chapter_summary.unwrap_or_default().trim().to_string(),
                    },
                ));
            }
            Err(reason) => {
                let reason = format!("chapter {} of {}: {}", index + 1, video_id, reason);
                warn!("dropping malformed chapter: {}", reason);
                set.dropped.push(reason);
            }
        }
    }

    valid.sort_by(|(a_order, a), (b_order, b)| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a_order.cmp(b_order))
    });

    set.chapters = valid
        .into_iter()
        .enumerate()
        .map(|(i, (_, mut chapter))| {
            chapter.chapter_number = i as u32 + 1;
            chapter
        })
        .collect();
    set
}

/// Drives a [`VideoJob`] through its states against an [`AnalysisService`].
#[derive(Clone)]
pub struct AnalysisClient {
    service: Arc<dyn AnalysisService>,
    retry: RetryPolicy,
    poll: PollPolicy,
}

impl AnalysisClient {
    pub fn new(service: Arc<dyn AnalysisService>, retry: RetryPolicy, poll: PollPolicy) -> Self {
        Self {
            service,
            retry,
            poll,
        }
    }

    /// Advance the job by one state. Terminal jobs are left untouched.
    ///
    /// A job resumed from the upload cache whose video id the service refuses
    /// goes back to `Queued` with `cached` cleared, so it is uploaded again once.
    pub async fn step(&self, job: &mut VideoJob) {
        let next = match &job.state {
            JobState::Queued => match self.submit(&job.video).await {
                Ok(task_id) => JobState::Submitted { task_id },
                Err(e) => failed(JobStage::Submit, e),
            },
            JobState::Submitted { task_id } => match self.wait_for_index(task_id).await {
                Ok(video_id) => JobState::Indexed { video_id },
                Err(e) => failed(JobStage::Index, e),
            },
            JobState::Indexed { video_id } => match self.fetch_chapters(video_id).await {
                Ok(set) => JobState::Complete {
                    video_id: video_id.clone(),
                    chapters: set.chapters,
                    dropped: set.dropped.len(),
                },
                Err(e) if job.cached && e.is_client_rejection() => {
                    warn!(
                        "cached video {} was refused ({}), uploading {} again",
                        video_id,
                        e,
                        job.video.label()
                    );
                    job.cached = false;
                    JobState::Queued
                }
                Err(e) => failed(JobStage::Chapters, e),
            },
            JobState::Complete { .. } | JobState::Failed { .. } => return,
        };
        job.state = next;
    }

    /// Run the job until it completes or fails.
    pub async fn run(&self, job: &mut VideoJob) {
        while !job.is_terminal() {
            self.step(job).await;
        }
    }

    async fn submit(&self, video: &VideoRecord) -> Result<String> {
        info!("uploading {}", video.file_path.display());
        let task_id = with_retry(&self.retry, "submit video", || self.service.submit(video)).await?;
        debug!("{} submitted as task {}", video.label(), task_id);
        Ok(task_id)
    }

    async fn wait_for_index(&self, task_id: &str) -> Result<String> {
        let started = Instant::now();
        loop {
            let status =
                with_retry(&self.retry, "poll task", || self.service.task_status(task_id)).await?;

            match status {
                TaskStatus::Ready { video_id } => {
                    info!("task {} indexed as video {}", task_id, video_id);
                    return Ok(video_id);
                }
                TaskStatus::Failed { reason } => {
                    return Err(KinscopeError::IndexingFailed {
                        task_id: task_id.to_string(),
                        reason,
                    });
                }
                TaskStatus::Pending { status } => {
                    if started.elapsed() + self.poll.interval > self.poll.max_wait {
                        return Err(KinscopeError::Timeout {
                            operation: format!("indexing task {}", task_id),
                            after: self.poll.max_wait,
                        });
                    }
                    debug!("task {} is {}", task_id, status);
                    tokio::time::sleep(self.poll.interval).await;
                }
            }
        }
    }

    async fn fetch_chapters(&self, video_id: &str) -> Result<ChapterSet> {
        let raw =
            with_retry(&self.retry, "generate chapters", || self.service.chapters(video_id)).await?;
        let set = normalize_chapters(video_id, raw);
        info!(
            "video {}: {} chapters ({} dropped)",
            video_id,
            set.chapters.len(),
            set.dropped.len()
        );
        Ok(set)
    }
}

fn failed(stage: JobStage, e: KinscopeError) -> JobState {
    warn!("{} stage failed: {}", stage, e);
    JobState::Failed {
        stage,
        reason: e.to_string(),
    }
}

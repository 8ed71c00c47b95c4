//! Batch run over resolved videos.
//!
//! Jobs run as tokio tasks (at most `concurrency` at a time) and hand their
//! finished [`VideoJob`] to a single collector over an mpsc channel. The
//! collector projects chapters into rows and owns the [`AggregateDataset`], so
//! no row storage is shared between tasks. A shutdown broadcast stops new jobs,
//! aborts running ones and returns whatever was collected.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, broadcast, mpsc},
    task::JoinSet,
};
use tracing::{info, warn};

use crate::{
    aggregate::AggregateDataset,
    cache::IndexCache,
    client::AnalysisClient,
    job::{JobStage, JobState, VideoJob},
    projector::{now_timestamp, project_all},
    types::VideoRecord,
};

/// Progress notifications for a front end.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize },
    VideoStarted { video: VideoRecord },
    VideoIndexed { video: VideoRecord, video_id: String, cached: bool },
    VideoCompleted { video: VideoRecord, chapters: usize, dropped: usize },
    VideoFailed { video: VideoRecord, reason: String },
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct FailedVideo {
    pub video: VideoRecord,
    /// `None` when the job was aborted by cancellation.
    pub stage: Option<JobStage>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedVideo>,
    pub dropped_chapters: usize,
    pub cancelled: bool,
    pub dataset: AggregateDataset,
}

impl BatchReport {
    /// A run counts as successful when at least one video produced rows.
    pub fn is_success(&self) -> bool {
        self.succeeded > 0 && !self.dataset.is_empty()
    }
}

pub struct BatchRunner {
    client: AnalysisClient,
    concurrency: usize,
    pause_between_videos: Duration,
    cache: Option<Arc<Mutex<IndexCache>>>,
    events: Option<mpsc::UnboundedSender<BatchEvent>>,
}

impl BatchRunner {
    pub fn new(client: AnalysisClient, concurrency: usize, pause_between_videos: Duration) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            pause_between_videos,
            cache: None,
            events: None,
        }
    }

    pub fn with_cache(mut self, cache: IndexCache) -> Self {
        self.cache = Some(Arc::new(Mutex::new(cache)));
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<BatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: BatchEvent) {
        emit(&self.events, event);
    }

    pub async fn run(
        &self,
        videos: Vec<VideoRecord>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        self.emit(BatchEvent::Started {
            total: videos.len(),
        });

        let (done_tx, mut done_rx) = mpsc::channel::<VideoJob>(self.concurrency);
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut queue = videos.into_iter().enumerate();
        let mut in_flight: Vec<VideoRecord> = Vec::new();
        let mut shutdown_open = true;

        loop {
            while in_flight.len() < self.concurrency {
                let Some((index, video)) = queue.next() else {
                    break;
                };
                let pause = if index >= self.concurrency {
                    self.pause_between_videos
                } else {
                    Duration::ZERO
                };
                in_flight.push(video.clone());
                report.attempted += 1;
                tasks.spawn(run_job(
                    self.client.clone(),
                    video,
                    pause,
                    self.cache.clone(),
                    self.events.clone(),
                    done_tx.clone(),
                ));
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                signal = shutdown.recv(), if shutdown_open => match signal {
                    Err(broadcast::error::RecvError::Closed) => shutdown_open = false,
                    _ => {
                        warn!("batch cancelled with {} video(s) in flight", in_flight.len());
                        report.cancelled = true;
                        tasks.abort_all();
                        break;
                    }
                },
                Some(job) = done_rx.recv() => {
                    in_flight.retain(|v| v != &job.video);
                    self.collect(job, &mut report);
                }
            }
        }

        if report.cancelled {
            while tasks.join_next().await.is_some() {}
            while let Ok(job) = done_rx.try_recv() {
                in_flight.retain(|v| v != &job.video);
                self.collect(job, &mut report);
            }
            for video in in_flight {
                report.failed.push(FailedVideo {
                    video,
                    stage: None,
                    reason: "cancelled".to_string(),
                });
            }
            self.emit(BatchEvent::Cancelled);
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.lock().await.save().await {
                warn!("could not save upload cache: {}", e);
            }
        }

        report.dataset.sort();
        info!(
            "batch finished: {} attempted, {} succeeded, {} failed, {} rows",
            report.attempted,
            report.succeeded,
            report.failed.len(),
            report.dataset.len()
        );
        report
    }

    fn collect(&self, job: VideoJob, report: &mut BatchReport) {
        match job.state {
            JobState::Complete {
                chapters, dropped, ..
            } => {
                let rows = project_all(&job.video, &chapters, &now_timestamp());
                report.succeeded += 1;
                report.dropped_chapters += dropped;
                report.dataset.extend(rows);
                self.emit(BatchEvent::VideoCompleted {
                    video: job.video,
                    chapters: chapters.len(),
                    dropped,
                });
            }
            JobState::Failed { stage, reason } => {
                warn!("{} failed at {}: {}", job.video.label(), stage, reason);
                self.emit(BatchEvent::VideoFailed {
                    video: job.video.clone(),
                    reason: reason.clone(),
                });
                report.failed.push(FailedVideo {
                    video: job.video,
                    stage: Some(stage),
                    reason,
                });
            }
            other => {
                warn!("{} returned in non-terminal state {:?}", job.video.label(), other);
                report.failed.push(FailedVideo {
                    video: job.video,
                    stage: None,
                    reason: "job did not finish".to_string(),
                });
            }
        }
    }
}

fn emit(events: &Option<mpsc::UnboundedSender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

async fn run_job(
    client: AnalysisClient,
    video: VideoRecord,
    pause: Duration,
    cache: Option<Arc<Mutex<IndexCache>>>,
    events: Option<mpsc::UnboundedSender<BatchEvent>>,
    done: mpsc::Sender<VideoJob>,
) {
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
    emit(
        &events,
        BatchEvent::VideoStarted {
            video: video.clone(),
        },
    );

    let cached_id = match &cache {
        Some(cache) => cache.lock().await.video_id(&video).map(str::to_string),
        None => None,
    };
    let mut job = match cached_id {
        Some(video_id) => VideoJob::resume_indexed(video, video_id),
        None => VideoJob::new(video),
    };

    if let JobState::Indexed { video_id } = &job.state {
        emit(
            &events,
            BatchEvent::VideoIndexed {
                video: job.video.clone(),
                video_id: video_id.clone(),
                cached: job.cached,
            },
        );
    }

    while !job.is_terminal() {
        let was_cached = job.cached;
        client.step(&mut job).await;

        if was_cached && matches!(job.state, JobState::Queued) {
            if let Some(cache) = &cache {
                cache.lock().await.remove(&job.video);
            }
            emit(
                &events,
                BatchEvent::VideoStarted {
                    video: job.video.clone(),
                },
            );
        }
        if let JobState::Indexed { video_id } = &job.state {
            if let Some(cache) = &cache {
                cache.lock().await.insert(&job.video, video_id);
            }
            emit(
                &events,
                BatchEvent::VideoIndexed {
                    video: job.video.clone(),
                    video_id: video_id.clone(),
                    cached: false,
                },
            );
        }
    }

    let _ = done.send(job).await;
}

use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use kinscope_core::{
    AnalysisClient, AnalysisService, BatchEvent, BatchRunner, DayCalendar, IndexCache,
    InventoryFilter, JobStage, KinscopeError, PollPolicy, RawChapter, Result, RetryPolicy,
    TaskStatus, VideoRecord, inventory, read_csv,
};
use tokio::sync::{broadcast, mpsc};

/// In-memory stand-in for the analysis API. Task ids are the file names and
/// video ids are `vid_<file name>`.
#[derive(Default)]
struct FakeService {
    reject: Vec<&'static str>,
    hang: Vec<&'static str>,
    unknown_ids: Vec<&'static str>,
    submit_delay: Duration,
    submits: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

fn file_name(video: &VideoRecord) -> String {
    video
        .file_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string()
}

#[async_trait]
impl AnalysisService for FakeService {
    async fn submit(&self, video: &VideoRecord) -> Result<String> {
        let name = file_name(video);
        self.submits.lock().unwrap().push(name.clone());

        if self.hang.contains(&name.as_str()) {
            std::future::pending::<()>().await;
        }
        if self.reject.contains(&name.as_str()) {
            return Err(KinscopeError::ServiceRejected {
                operation: "submit video".into(),
                status: 400,
                body: "unsupported container".into(),
            });
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.submit_delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(name)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        Ok(TaskStatus::Ready {
            video_id: format!("vid_{task_id}"),
        })
    }

    async fn chapters(&self, video_id: &str) -> Result<Vec<RawChapter>> {
        if self.unknown_ids.contains(&video_id) {
            return Err(KinscopeError::ServiceRejected {
                operation: "generate chapters".into(),
                status: 404,
                body: format!("video {video_id} not found"),
            });
        }
        Ok(vec![
            RawChapter {
                chapter_number: Some(1),
                start_sec: Some(36.0),
                end_sec: Some(42.0),
                chapter_title: Some("Man Enters with Plates".into()),
                chapter_summary: Some("A man carries plates to the table.".into()),
            },
            RawChapter {
                chapter_number: Some(0),
                start_sec: Some(0.0),
                end_sec: Some(36.0),
                chapter_title: Some("Empty Room".into()),
                chapter_summary: None,
            },
        ])
    }
}

fn write_videos(dir: &Path, names: &[&str]) -> Vec<VideoRecord> {
    for name in names {
        std::fs::write(dir.join(name), b"not really a video").unwrap();
    }
    inventory::resolve(dir, &InventoryFilter::default(), &DayCalendar::default())
        .unwrap()
        .videos
}

fn client(service: Arc<FakeService>) -> AnalysisClient {
    let retry = RetryPolicy {
        max_retries: 1,
        call_timeout: Duration::from_secs(3600),
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(10),
    };
    let poll = PollPolicy {
        interval: Duration::from_secs(1),
        max_wait: Duration::from_secs(60),
    };
    AnalysisClient::new(service, retry, poll)
}

#[tokio::test(start_paused = true)]
async fn one_failed_video_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let videos = write_videos(
        dir.path(),
        &[
            "household_A_day1.mp4",
            "household_A_day2.mp4",
            "household_A_day3.mp4",
        ],
    );
    let service = Arc::new(FakeService {
        reject: vec!["household_A_day2.mp4"],
        ..Default::default()
    });
    let runner = BatchRunner::new(client(service), 1, Duration::from_secs(2));
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let report = runner.run(videos, shutdown_rx).await;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].video.day_number, 2);
    assert!(report.failed[0].reason.contains("unsupported container"));
    assert!(!report.cancelled);
    assert!(report.is_success());

    let days: Vec<_> = report
        .dataset
        .rows()
        .iter()
        .map(|r| (r.day_number, r.chapter_number, r.chapter_title.as_str()))
        .collect();
    assert_eq!(
        days,
        vec![
            (1, 1, "Empty Room"),
            (1, 2, "Man Enters with Plates"),
            (3, 1, "Empty Room"),
            (3, 2, "Man Enters with Plates"),
        ]
    );

    let plates = &report.dataset.rows()[1];
    assert_eq!(plates.duration_seconds, 6.0);
    assert_eq!(plates.time_range, "00:36 - 00:42");
    assert_eq!(plates.video_id, "vid_household_A_day1.mp4");
}

#[tokio::test(start_paused = true)]
async fn all_failures_is_not_a_success() {
    let dir = tempfile::tempdir().unwrap();
    let videos = write_videos(dir.path(), &["household_B_day1.mp4"]);
    let service = Arc::new(FakeService {
        reject: vec!["household_B_day1.mp4"],
        ..Default::default()
    });
    let runner = BatchRunner::new(client(service), 1, Duration::ZERO);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let report = runner.run(videos, shutdown_rx).await;

    assert_eq!(report.succeeded, 0);
    assert!(report.dataset.is_empty());
    assert!(!report.is_success());
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_collected_rows() {
    let dir = tempfile::tempdir().unwrap();
    let videos = write_videos(
        dir.path(),
        &[
            "household_A_day1.mp4",
            "household_B_day1.mp4",
            "household_C_day1.mp4",
        ],
    );
    let service = Arc::new(FakeService {
        hang: vec!["household_C_day1.mp4"],
        ..Default::default()
    });
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let runner =
        BatchRunner::new(client(service), 1, Duration::ZERO).with_events(events_tx);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let cancel = async {
        while let Some(event) = events_rx.recv().await {
            if let BatchEvent::VideoStarted { video } = event {
                if video.household_id.letter() == 'C' {
                    shutdown_tx.send(()).unwrap();
                    break;
                }
            }
        }
    };
    let (report, ()) = tokio::join!(runner.run(videos, shutdown_rx), cancel);

    assert!(report.cancelled);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.dataset.len(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].video.household_id.letter(), 'C');
    assert!(report.failed[0].stage.is_none());
    assert_eq!(report.failed[0].reason, "cancelled");
}

#[tokio::test(start_paused = true)]
async fn runs_videos_concurrently_up_to_the_limit() {
    let dir = tempfile::tempdir().unwrap();
    let videos = write_videos(
        dir.path(),
        &[
            "household_A_day1.mp4",
            "household_A_day2.mp4",
            "household_B_day1.mp4",
            "household_B_day2.mp4",
            "household_C_day1.mp4",
        ],
    );
    let service = Arc::new(FakeService {
        submit_delay: Duration::from_secs(5),
        ..Default::default()
    });
    let runner = BatchRunner::new(client(service.clone()), 2, Duration::ZERO);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let report = runner.run(videos, shutdown_rx).await;

    assert_eq!(report.succeeded, 5);
    assert_eq!(report.dataset.len(), 10);
    assert_eq!(service.peak.load(Ordering::SeqCst), 2);

    let order: Vec<_> = report
        .dataset
        .rows()
        .iter()
        .map(|r| (r.household_id.letter(), r.day_number))
        .collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
}

#[tokio::test(start_paused = true)]
async fn cached_videos_skip_the_upload() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let videos = write_videos(
        dir.path(),
        &["household_A_day1.mp4", "household_A_day2.mp4"],
    );

    let first = Arc::new(FakeService::default());
    let cache = IndexCache::load(cache_dir.path(), "idx").await.unwrap();
    let (_tx, rx) = broadcast::channel(1);
    BatchRunner::new(client(first.clone()), 1, Duration::ZERO)
        .with_cache(cache)
        .run(videos.clone(), rx)
        .await;
    assert_eq!(first.submits.lock().unwrap().len(), 2);

    let second = Arc::new(FakeService::default());
    let cache = IndexCache::load(cache_dir.path(), "idx").await.unwrap();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (_tx, rx) = broadcast::channel(1);
    let report = BatchRunner::new(client(second.clone()), 1, Duration::ZERO)
        .with_cache(cache)
        .with_events(events_tx)
        .run(videos, rx)
        .await;

    assert_eq!(report.succeeded, 2);
    assert!(second.submits.lock().unwrap().is_empty());

    let mut cached = 0;
    while let Ok(event) = events_rx.try_recv() {
        if let BatchEvent::VideoIndexed { cached: true, .. } = event {
            cached += 1;
        }
    }
    assert_eq!(cached, 2);
}

async fn seed_cache(cache_dir: &Path, video: &VideoRecord, video_id: &str) {
    let mut cache = IndexCache::load(cache_dir, "idx").await.unwrap();
    cache.insert(video, video_id);
    cache.save().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unknown_cached_video_is_uploaded_again() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let videos = write_videos(dir.path(), &["household_A_day1.mp4"]);
    seed_cache(cache_dir.path(), &videos[0], "stale").await;

    let service = Arc::new(FakeService {
        unknown_ids: vec!["stale"],
        ..Default::default()
    });
    let cache = IndexCache::load(cache_dir.path(), "idx").await.unwrap();
    let (_tx, rx) = broadcast::channel(1);
    let report = BatchRunner::new(client(service.clone()), 1, Duration::ZERO)
        .with_cache(cache)
        .run(videos.clone(), rx)
        .await;

    assert_eq!(report.succeeded, 1);
    assert!(report.failed.is_empty());
    assert_eq!(report.dataset.rows().len(), 2);
    assert_eq!(
        *service.submits.lock().unwrap(),
        vec!["household_A_day1.mp4".to_string()]
    );

    let cache = IndexCache::load(cache_dir.path(), "idx").await.unwrap();
    assert_eq!(cache.video_id(&videos[0]), Some("vid_household_A_day1.mp4"));
}

#[tokio::test(start_paused = true)]
async fn refused_fresh_upload_fails_without_looping() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let videos = write_videos(dir.path(), &["household_A_day1.mp4"]);
    seed_cache(cache_dir.path(), &videos[0], "stale").await;

    let service = Arc::new(FakeService {
        unknown_ids: vec!["stale", "vid_household_A_day1.mp4"],
        ..Default::default()
    });
    let cache = IndexCache::load(cache_dir.path(), "idx").await.unwrap();
    let (_tx, rx) = broadcast::channel(1);
    let report = BatchRunner::new(client(service.clone()), 1, Duration::ZERO)
        .with_cache(cache)
        .run(videos, rx)
        .await;

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].stage, Some(JobStage::Chapters));
    assert!(report.failed[0].reason.contains("not found"));
    assert_eq!(service.submits.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn written_csv_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let videos = write_videos(
        dir.path(),
        &["household_A_day1.mp4", "household_B_day4.mp4"],
    );
    let runner = BatchRunner::new(client(Arc::new(FakeService::default())), 1, Duration::ZERO);
    let (_tx, rx) = broadcast::channel(1);
    let report = runner.run(videos, rx).await;

    let csv_path = out.path().join("multi_household_analysis.csv");
    report.dataset.write_csv(&csv_path).await.unwrap();

    let loaded = read_csv(&csv_path).unwrap();
    assert_eq!(loaded, report.dataset);
    assert_eq!(loaded.rows()[2].day_type.as_str(), "weekend");
}

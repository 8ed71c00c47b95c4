use std::fmt;

use crate::types::{ChapterRecord, VideoRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Submit,
    Index,
    Chapters,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStage::Submit => "submit",
            JobStage::Index => "index",
            JobStage::Chapters => "chapters",
        })
    }
}

/// Where a video is in the submit → index → chapters sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Queued,
    Submitted {
        task_id: String,
    },
    Indexed {
        video_id: String,
    },
    Complete {
        video_id: String,
        chapters: Vec<ChapterRecord>,
        dropped: usize,
    },
    Failed {
        stage: JobStage,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct VideoJob {
    pub video: VideoRecord,
    pub state: JobState,
    /// Whether the video id came from the upload cache.
    pub cached: bool,
}

impl VideoJob {
    pub fn new(video: VideoRecord) -> Self {
        Self {
            video,
            state: JobState::Queued,
            cached: false,
        }
    }

    /// Start from an already indexed video, skipping the upload.
    pub fn resume_indexed(video: VideoRecord, video_id: impl Into<String>) -> Self {
        Self {
            video,
            state: JobState::Indexed {
                video_id: video_id.into(),
            },
            cached: true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, JobState::Complete { .. } | JobState::Failed { .. })
    }
}

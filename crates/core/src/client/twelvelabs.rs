use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::{
    client::{AnalysisService, RawChapter, TaskStatus},
    config::{ChapterRequest, KinscopeConfig},
    error::{KinscopeError, Result},
    provider::Provider,
    types::VideoRecord,
};

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    status: Option<String>,
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    #[serde(default)]
    chapters: Option<Vec<RawChapter>>,
}

/// HTTP client for the Twelve Labs v1.3 API.
pub struct TwelveLabsService {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
    index_id: String,
    chapters: ChapterRequest,
}

impl TwelveLabsService {
    pub fn new(config: &KinscopeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            provider: config.provider.clone(),
            api_key: config.api_key.clone(),
            index_id: config.index_id.clone(),
            chapters: config.chapters.clone(),
        })
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        operation: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(KinscopeError::ServiceRejected {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| KinscopeError::MalformedResponse {
            operation: operation.to_string(),
            reason: format!("{}: {}", e, body),
        })
    }
}

fn task_status_from(task_id: &str, task: TaskResponse) -> Result<TaskStatus> {
    let malformed = |reason: &str| KinscopeError::MalformedResponse {
        operation: format!("poll task {}", task_id),
        reason: reason.to_string(),
    };

    let status = task.status.ok_or_else(|| malformed("missing status"))?;
    match status.as_str() {
        "ready" => {
            let video_id = task
                .video_id
                .filter(|v| !v.is_empty())
                .ok_or_else(|| malformed("ready task without video_id"))?;
            Ok(TaskStatus::Ready { video_id })
        }
        "failed" => Ok(TaskStatus::Failed {
            reason: format!("task {} reported status failed", task.id.as_deref().unwrap_or(task_id)),
        }),
        _ => Ok(TaskStatus::Pending { status }),
    }
}

fn chapters_from(video_id: &str, response: SummarizeResponse) -> Result<Vec<RawChapter>> {
    response
        .chapters
        .ok_or_else(|| KinscopeError::MalformedResponse {
            operation: format!("summarize {}", video_id),
            reason: "response has no chapters".to_string(),
        })
}

#[async_trait]
impl AnalysisService for TwelveLabsService {
    async fn submit(&self, video: &VideoRecord) -> Result<String> {
        let file_name = video
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| VideoRecord::file_name(video.household_id, video.day_number));
        let file = tokio::fs::File::open(&video.file_path).await?;
        let file_size = file.metadata().await?.len();
        // Streamed from disk; recordings can be several gigabytes.
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let video_part = multipart::Part::stream_with_length(body, file_size)
            .file_name(file_name)
            .mime_str("video/mp4")?;

        let form = multipart::Form::new()
            .text("index_id", self.index_id.clone())
            .text("language", self.chapters.language.clone())
            .part("video_file", video_part);

        let response = self
            .http
            .post(self.provider.tasks_url())
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let task: CreateTaskResponse = Self::read_json("submit video", response).await?;
        Ok(task.id)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        let response = self
            .http
            .get(self.provider.task_url(task_id))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let task: TaskResponse = Self::read_json("poll task", response).await?;
        task_status_from(task_id, task)
    }

    async fn chapters(&self, video_id: &str) -> Result<Vec<RawChapter>> {
        let response = self
            .http
            .post(self.provider.summarize_url())
            .header("x-api-key", &self.api_key)
            .json(&serde_json::json!({
                "video_id": video_id,
                "type": "chapter",
                "prompt": self.chapters.prompt,
                "temperature": self.chapters.temperature,
            }))
            .send()
            .await?;

        let summary: SummarizeResponse = Self::read_json("generate chapters", response).await?;
        chapters_from(video_id, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(json: &str) -> TaskResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn ready_task_yields_video_id() {
        let status = task_status_from(
            "t1",
            task(r#"{"_id": "t1", "index_id": "i", "video_id": "v9", "status": "ready"}"#),
        )
        .unwrap();
        assert_eq!(
            status,
            TaskStatus::Ready {
                video_id: "v9".into()
            }
        );
    }

    #[test]
    fn in_progress_statuses_are_pending() {
        for s in ["validating", "pending", "queued", "indexing"] {
            let status =
                task_status_from("t1", task(&format!(r#"{{"_id": "t1", "status": "{s}"}}"#)))
                    .unwrap();
            assert_eq!(status, TaskStatus::Pending { status: s.into() });
        }
    }

    #[test]
    fn failed_task() {
        let status = task_status_from("t1", task(r#"{"_id": "t1", "status": "failed"}"#)).unwrap();
        assert!(matches!(status, TaskStatus::Failed { .. }));
    }

    #[test]
    fn ready_without_video_id_is_malformed() {
        let err = task_status_from("t1", task(r#"{"_id": "t1", "status": "ready"}"#)).unwrap_err();
        assert!(matches!(err, KinscopeError::MalformedResponse { .. }));
        let err = task_status_from("t1", task(r#"{"_id": "t1"}"#)).unwrap_err();
        assert!(matches!(err, KinscopeError::MalformedResponse { .. }));
    }

    #[test]
    fn summarize_response_chapters() {
        let response: SummarizeResponse = serde_json::from_str(
            r#"{
                "id": "s1",
                "summarize_type": "chapter",
                "chapters": [
                    {"chapter_number": 0, "start_sec": 0, "end_sec": 36,
                     "chapter_title": "Empty Room", "chapter_summary": "Nobody is present."},
                    {"chapter_number": 1, "start_sec": 36, "end_sec": 42,
                     "chapter_title": "Man Enters with Plates"}
                ]
            }"#,
        )
        .unwrap();
        let chapters = chapters_from("v1", response).unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[1].start_sec, Some(36.0));
        assert!(chapters[1].chapter_summary.is_none());

        let empty: SummarizeResponse = serde_json::from_str(r#"{"id": "s2"}"#).unwrap();
        assert!(chapters_from("v1", empty).is_err());
    }
}

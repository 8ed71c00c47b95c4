use crate::{
    format::format_time_range,
    types::{AnalysisRow, ChapterRecord, TimeOfDay, VideoRecord},
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Flatten a chapter and its video context into one output row.
///
/// `processed_at` is the pre-formatted wall-clock time of processing so the
/// projection itself stays deterministic.
pub fn project(video: &VideoRecord, chapter: &ChapterRecord, processed_at: &str) -> AnalysisRow {
    AnalysisRow {
        household_id: video.household_id,
        day_number: video.day_number,
        day_type: video.day_type,
        video_id: chapter.video_id.clone(),
        chapter_number: chapter.chapter_number,
        start_time: chapter.start_time,
        end_time: chapter.end_time,
        duration_seconds: chapter.end_time - chapter.start_time,
        time_of_day: TimeOfDay::from_seconds(chapter.start_time),
        time_range: format_time_range(chapter.start_time, chapter.end_time),
        chapter_title: chapter.title.clone(),
        chapter_summary: chapter.summary.clone(),
        timestamp: processed_at.to_string(),
    }
}

pub fn project_all(
    video: &VideoRecord,
    chapters: &[ChapterRecord],
    processed_at: &str,
) -> Vec<AnalysisRow> {
    chapters
        .iter()
        .map(|chapter| project(video, chapter, processed_at))
        .collect()
}

pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

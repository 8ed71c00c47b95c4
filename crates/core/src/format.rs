use crate::types::AnalysisRow;

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format a chapter span as `MM:SS - MM:SS`
pub fn format_time_range(start: f64, end: f64) -> String {
    format!("{} - {}", format_timestamp(start), format_timestamp(end))
}

pub fn format_hours(seconds: f64) -> String {
    format!("{:.1}h", seconds / 3600.0)
}

/// Format a single row as a one-line chapter listing
pub fn format_row_readable(row: &AnalysisRow) -> String {
    let mut output = format!("[{}] {}", row.time_range, row.chapter_title);
    if !row.chapter_summary.is_empty() {
        output.push_str(&format!("\n    {}", row.chapter_summary));
    }
    output
}

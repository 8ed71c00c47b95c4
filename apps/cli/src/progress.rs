use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use kinscope_core::BatchEvent;
use tokio::sync::mpsc;

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

fn create_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} [{pos}/{len}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Render batch events until the runner drops its sender.
pub async fn render(mut events: mpsc::UnboundedReceiver<BatchEvent>) {
    let mut bar: Option<ProgressBar> = None;

    while let Some(event) = events.recv().await {
        match event {
            BatchEvent::Started { total } => bar = Some(create_bar(total)),
            BatchEvent::VideoStarted { video } => {
                if let Some(pb) = &bar {
                    pb.set_message(format!("Uploading {}...", video.label()));
                }
            }
            BatchEvent::VideoIndexed { video, cached, .. } => {
                if let Some(pb) = &bar {
                    let note = if cached { " (cached upload)" } else { "" };
                    pb.set_message(format!(
                        "Generating chapters for {}{}...",
                        video.label(),
                        note
                    ));
                }
            }
            BatchEvent::VideoCompleted {
                video,
                chapters,
                dropped,
            } => {
                let dropped_note = if dropped > 0 {
                    format!(" {}", style(format!("({} malformed dropped)", dropped)).dim())
                } else {
                    String::new()
                };
                let line = format!(
                    "{} {}: {} chapters{}",
                    style("✓").green().bold(),
                    video.label(),
                    chapters,
                    dropped_note
                );
                match &bar {
                    Some(pb) => {
                        pb.println(line);
                        pb.inc(1);
                    }
                    None => println!("{}", line),
                }
            }
            BatchEvent::VideoFailed { video, reason } => {
                let line = format!(
                    "{} {}: {}",
                    style("✗").red().bold(),
                    video.label(),
                    style(reason).dim()
                );
                match &bar {
                    Some(pb) => {
                        pb.println(line);
                        pb.inc(1);
                    }
                    None => println!("{}", line),
                }
            }
            BatchEvent::Cancelled => {
                let line = format!(
                    "{} Cancelled, keeping completed videos",
                    style("!").yellow().bold()
                );
                match &bar {
                    Some(pb) => pb.println(line),
                    None => println!("{}", line),
                }
            }
        }
    }

    if let Some(pb) = bar {
        pb.finish_and_clear();
    }
}

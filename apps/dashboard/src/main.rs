use std::path::{Path, PathBuf};

use iced::widget::{Column, button, column, pick_list, row, scrollable, text};
use iced::{Element, Task};

use kinscope_core::{
    AggregateDataset, CompareSelection, Dashboard, DashboardFilter, DayFilter, HouseholdId,
    TimeOfDay, config::DEFAULT_OUTPUT, dashboard::MAX_COMPARED, format_hours,
    format_row_readable, read_csv, read_summaries_dir,
};

const BAR_WIDTH: usize = 30;

fn main() -> iced::Result {
    let source = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    iced::application(move || App::new(source.clone()), App::update, App::view)
        .title("Household Activity Dashboard")
        .run()
}

/// A CSV file or a directory of household summaries.
fn load(source: &Path) -> kinscope_core::Result<AggregateDataset> {
    if source.is_dir() {
        read_summaries_dir(source)
    } else {
        read_csv(source)
    }
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let filled = ((value / max) * BAR_WIDTH as f64).round().max(1.0) as usize;
    "█".repeat(filled.min(BAR_WIDTH))
}

struct App {
    source: PathBuf,
    dashboard: Option<Dashboard>,
    error: Option<String>,
    filter: DashboardFilter,
    compare: CompareSelection,
    timeline: Option<HouseholdId>,
}

#[derive(Debug, Clone)]
enum Message {
    ToggleHousehold(HouseholdId),
    SelectAll,
    ToggleCompare(HouseholdId),
    DayFilterSelected(DayFilter),
    TimelineSelected(HouseholdId),
    Reload,
}

impl App {
    fn new(source: PathBuf) -> (Self, Task<Message>) {
        let mut app = Self {
            source,
            dashboard: None,
            error: None,
            filter: DashboardFilter::default(),
            compare: CompareSelection::default(),
            timeline: None,
        };
        app.reload();
        (app, Task::none())
    }

    fn reload(&mut self) {
        match load(&self.source) {
            Ok(dataset) => {
                let dashboard = Dashboard::new(dataset);
                let households = dashboard.households();
                self.filter.households = households.iter().copied().collect();
                self.compare = CompareSelection::first_of(&households);
                self.timeline = households.first().copied();
                self.dashboard = Some(dashboard);
                self.error = None;
            }
            Err(e) => {
                self.dashboard = None;
                self.error = Some(format!(
                    "Could not load {}: {}. Run batch_analysis first.",
                    self.source.display(),
                    e
                ));
            }
        }
    }

    /// Keep the timeline on a household the filter still shows.
    fn sync_timeline(&mut self) {
        let Some(dashboard) = &self.dashboard else {
            return;
        };
        let choices = dashboard.selected_households(&self.filter);
        if !self.timeline.is_some_and(|id| choices.contains(&id)) {
            self.timeline = choices.first().copied();
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ToggleHousehold(id) => {
                self.filter.toggle(id);
                self.sync_timeline();
            }
            Message::SelectAll => {
                if let Some(dashboard) = &self.dashboard {
                    self.filter.households = dashboard.households().into_iter().collect();
                }
                self.sync_timeline();
            }
            Message::ToggleCompare(id) => {
                self.compare.toggle(id);
            }
            Message::DayFilterSelected(days) => self.filter.days = days,
            Message::TimelineSelected(id) => self.timeline = Some(id),
            Message::Reload => self.reload(),
        }
        Task::none()
    }

    fn view(&self) -> Element<'_, Message> {
        let header = row![
            text("Household Activity Dashboard").size(24),
            button("Reload").on_press(Message::Reload),
        ]
        .spacing(20);

        let Some(dashboard) = &self.dashboard else {
            let error = self.error.clone().unwrap_or_default();
            return column![header, text(error)].padding(20).spacing(10).into();
        };

        let content = column![
            header,
            text(format!("Source: {}", self.source.display())).size(12),
            self.filters_view(dashboard),
            self.overview_view(dashboard),
            self.activity_view(dashboard),
            self.time_of_day_view(dashboard),
            self.comparison_view(dashboard),
            self.timeline_view(dashboard),
        ]
        .padding(20)
        .spacing(16);

        scrollable(content).into()
    }

    fn filters_view(&self, dashboard: &Dashboard) -> Element<'_, Message> {
        let mut households = row![text("Households:")].spacing(6);
        for id in dashboard.households() {
            let mark = if self.filter.households.contains(&id) {
                "[x]"
            } else {
                "[ ]"
            };
            households = households.push(
                button(text(format!("{} {}", mark, id))).on_press(Message::ToggleHousehold(id)),
            );
        }
        households = households.push(button("Select all").on_press(Message::SelectAll));

        let days = row![
            text("Days:"),
            pick_list(
                DayFilter::ALL,
                Some(self.filter.days),
                Message::DayFilterSelected
            ),
        ]
        .spacing(6);

        let hint = if self.filter.households.is_empty() {
            text("No household selected, showing all").size(12)
        } else {
            text("")
        };

        column![households, days, hint].spacing(8).into()
    }

    fn overview_view(&self, dashboard: &Dashboard) -> Element<'_, Message> {
        let overview = dashboard.overview(&self.filter);
        column![
            text("Overview").size(18),
            row![
                text(format!("Households: {}", overview.households)),
                text(format!("Days: {}", overview.days)),
                text(format!("Chapters: {}", overview.chapters)),
                text(format!("Total activity: {:.1} hours", overview.total_hours)),
            ]
            .spacing(24),
        ]
        .spacing(6)
        .into()
    }

    fn activity_view(&self, dashboard: &Dashboard) -> Element<'_, Message> {
        let activity = dashboard.activity_by_household(&self.filter);
        let max = activity.iter().map(|a| a.hours).fold(0.0, f64::max);

        let rows: Vec<Element<'_, Message>> = activity
            .into_iter()
            .map(|a| {
                text(format!(
                    "{}  {:<30}  {} ({} chapters)",
                    a.household_id,
                    bar(a.hours, max),
                    format_hours(a.hours * 3600.0),
                    a.chapters
                ))
                .font(iced::Font::MONOSPACE)
                .into()
            })
            .collect();

        column![
            text("Activity time by household").size(18),
            Column::with_children(rows).spacing(2),
        ]
        .spacing(6)
        .into()
    }

    fn time_of_day_view(&self, dashboard: &Dashboard) -> Element<'_, Message> {
        let counts = dashboard.time_of_day_counts(&self.filter);
        let max = counts
            .iter()
            .flat_map(|c| c.counts.iter())
            .copied()
            .max()
            .unwrap_or(0) as f64;

        let mut sections = column![text("Activities by time of day").size(18)].spacing(6);
        for household in counts {
            let lines: Vec<Element<'_, Message>> = TimeOfDay::ALL
                .iter()
                .map(|band| {
                    let count = household.get(*band);
                    text(format!(
                        "  {:<10} {:<30} {}",
                        band.as_str(),
                        bar(count as f64, max),
                        count
                    ))
                    .font(iced::Font::MONOSPACE)
                    .into()
                })
                .collect();
            sections = sections
                .push(text(format!("Household {}", household.household_id)))
                .push(Column::with_children(lines).spacing(2));
        }
        sections.into()
    }

    fn comparison_view(&self, dashboard: &Dashboard) -> Element<'_, Message> {
        let title = text("Household comparison").size(18);

        let mut picker = row![text(format!("Compare (up to {}):", MAX_COMPARED))].spacing(6);
        for id in dashboard.households() {
            let chosen = self.compare.contains(&id);
            let mark = if chosen { "[x]" } else { "[ ]" };
            let toggle = button(text(format!("{} {}", mark, id)));
            // Full selection: only removals stay clickable.
            picker = picker.push(if chosen || !self.compare.is_full() {
                toggle.on_press(Message::ToggleCompare(id))
            } else {
                toggle
            });
        }

        let Some(compared) = dashboard.compare(self.filter.days, &self.compare.ids()) else {
            return column![title, picker, text("Select at least two households to compare")]
                .spacing(6)
                .into();
        };

        let mut header = format!("{:<10}", "");
        for household in &compared {
            header.push_str(&format!(" {:>8}", household.household_id));
        }
        let mut lines: Vec<Element<'_, Message>> =
            vec![text(header).font(iced::Font::MONOSPACE).into()];
        for band in TimeOfDay::ALL {
            let mut line = format!("{:<10}", band.as_str());
            for household in &compared {
                line.push_str(&format!(" {:>8}", household.get(band)));
            }
            lines.push(text(line).font(iced::Font::MONOSPACE).into());
        }

        column![title, picker, Column::with_children(lines).spacing(2)]
            .spacing(6)
            .into()
    }

    fn timeline_view(&self, dashboard: &Dashboard) -> Element<'_, Message> {
        let households = dashboard.selected_households(&self.filter);
        let picker = row![
            text("Daily timeline for household:"),
            pick_list(households, self.timeline, Message::TimelineSelected),
        ]
        .spacing(6);

        let mut section = column![text("Daily timeline").size(18), picker].spacing(6);
        let Some(household_id) = self.timeline else {
            return section.into();
        };

        for day in dashboard.timeline(&self.filter, household_id) {
            section = section
                .push(text(format!("Day {} ({})", day.day_number, day.day_type)).size(16));
            for chapter in day.rows {
                section = section.push(text(format_row_readable(chapter)));
            }
        }
        section.into()
    }
}

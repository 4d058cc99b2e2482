//! Eisenhower-matrix placement for tasks.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::dates::{date_from_value, today};
use crate::normalize::{
    first_present, Record, DEADLINE_ALIASES, END_DATE_ALIASES, KEY_AREA_ALIASES,
    PRIORITY_ALIASES, START_DATE_ALIASES, STATUS_ALIASES,
};
use crate::priority::{priority_level, PriorityLevel};

const COMPLETED_STATUSES: [&str; 4] = ["done", "completed", "closed", "archived"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    UrgentImportant,
    Important,
    Urgent,
    Neither,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::UrgentImportant,
        Quadrant::Important,
        Quadrant::Urgent,
        Quadrant::Neither,
    ];

    pub fn number(self) -> u8 {
        match self {
            Quadrant::UrgentImportant => 1,
            Quadrant::Important => 2,
            Quadrant::Urgent => 3,
            Quadrant::Neither => 4,
        }
    }

    pub fn color_class(self) -> &'static str {
        match self {
            Quadrant::UrgentImportant => "red",
            Quadrant::Important => "green",
            Quadrant::Urgent => "amber",
            Quadrant::Neither => "grey",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Quadrant::UrgentImportant => "Do now",
            Quadrant::Important => "Schedule",
            Quadrant::Urgent => "Delegate",
            Quadrant::Neither => "Drop",
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{} {}", self.number(), self.title())
    }
}

/// Everything the classifier looks at. `status` is kept raw so that values
/// outside the canonical vocabulary (closed, archived) still count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuadrantInput {
    pub deadline: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub priority: PriorityLevel,
    pub key_area_id: Option<String>,
    pub status: String,
}

impl QuadrantInput {
    pub fn from_record(record: &Record) -> Self {
        let date = |aliases: &[&str]| first_present(record, aliases).and_then(date_from_value);
        Self {
            deadline: date(DEADLINE_ALIASES),
            end_date: date(END_DATE_ALIASES),
            start_date: date(START_DATE_ALIASES),
            priority: priority_level(first_present(record, PRIORITY_ALIASES)),
            key_area_id: first_present(record, KEY_AREA_ALIASES).map(|value| match value {
                serde_json::Value::String(text) => text.trim().to_string(),
                other => other.to_string(),
            }),
            status: first_present(record, STATUS_ALIASES)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

pub fn is_completed_status(status: &str) -> bool {
    let lowered = status.trim().to_ascii_lowercase();
    COMPLETED_STATUSES.contains(&lowered.as_str())
}

pub fn classify(input: &QuadrantInput, today: NaiveDate) -> Quadrant {
    let important = input.key_area_id.is_some();
    let completed = is_completed_status(&input.status);
    let due = |date: Option<NaiveDate>| date.is_some_and(|date| date <= today);

    let mut urgent = !completed && (due(input.start_date) || due(input.end_date));
    if !urgent {
        urgent = !completed && due(input.deadline);
    }

    match (urgent, important, input.priority) {
        (true, _, _) => Quadrant::UrgentImportant,
        (false, true, _) => Quadrant::Important,
        (false, false, PriorityLevel::Low) => Quadrant::Neither,
        (false, false, PriorityLevel::Normal | PriorityLevel::High) => Quadrant::Urgent,
    }
}

pub fn classify_today(input: &QuadrantInput) -> Quadrant {
    classify(input, today())
}

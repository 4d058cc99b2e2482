//! Two status vocabularies: the one shown to people and the one the backend stores.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UiStatus {
    #[default]
    Open,
    InProgress,
    Done,
}

impl UiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiStatus::Open => "open",
            UiStatus::InProgress => "in_progress",
            UiStatus::Done => "done",
        }
    }

    /// Total mapping from the backend vocabulary; unknown values read as open.
    pub fn from_server(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "todo" | "open" => UiStatus::Open,
            "in_progress" => UiStatus::InProgress,
            "completed" | "done" => UiStatus::Done,
            _ => UiStatus::Open,
        }
    }

    pub fn to_server(self) -> ServerStatus {
        match self {
            UiStatus::Open => ServerStatus::Todo,
            UiStatus::InProgress => ServerStatus::InProgress,
            UiStatus::Done => ServerStatus::Completed,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, UiStatus::Done)
    }
}

impl fmt::Display for UiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UiStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "todo" => Ok(UiStatus::Open),
            "in_progress" | "in-progress" | "doing" => Ok(UiStatus::InProgress),
            "done" | "completed" => Ok(UiStatus::Done),
            other => Err(anyhow!(
                "Unknown status '{}': expected open|in_progress|done",
                other
            )),
        }
    }
}

impl ValueEnum for UiStatus {
    fn value_variants<'a>() -> &'a [Self] {
        const VARIANTS: [UiStatus; 3] = [UiStatus::Open, UiStatus::InProgress, UiStatus::Done];
        &VARIANTS
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Todo,
    InProgress,
    Completed,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Todo => "todo",
            ServerStatus::InProgress => "in_progress",
            ServerStatus::Completed => "completed",
        }
    }

    /// Total mapping from the UI vocabulary; unknown values are sent as todo.
    pub fn from_ui(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => ServerStatus::Todo,
            "in_progress" => ServerStatus::InProgress,
            "done" | "completed" => ServerStatus::Completed,
            _ => ServerStatus::Todo,
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn ui_to_server(raw: &str) -> ServerStatus {
    ServerStatus::from_ui(raw)
}

pub fn server_to_ui(raw: &str) -> UiStatus {
    UiStatus::from_server(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("open")]
    #[case("in_progress")]
    #[case("done")]
    fn ui_statuses_survive_a_server_round_trip(#[case] status: &str) {
        let server = ui_to_server(status);
        assert_eq!(server_to_ui(server.as_str()).as_str(), status);
    }

    #[rstest]
    #[case("todo")]
    #[case("in_progress")]
    #[case("completed")]
    fn server_statuses_survive_a_ui_round_trip(#[case] status: &str) {
        let ui = server_to_ui(status);
        assert_eq!(ui_to_server(ui.as_str()).as_str(), status);
    }

    #[rstest]
    #[case("open", ServerStatus::Todo)]
    #[case("in_progress", ServerStatus::InProgress)]
    #[case("done", ServerStatus::Completed)]
    #[case("completed", ServerStatus::Completed)]
    #[case("blocked", ServerStatus::Todo)]
    #[case("", ServerStatus::Todo)]
    fn maps_ui_values_to_server(#[case] raw: &str, #[case] expected: ServerStatus) {
        assert_eq!(ui_to_server(raw), expected);
    }

    #[rstest]
    #[case("todo", UiStatus::Open)]
    #[case("open", UiStatus::Open)]
    #[case("in_progress", UiStatus::InProgress)]
    #[case("completed", UiStatus::Done)]
    #[case("done", UiStatus::Done)]
    #[case("archived", UiStatus::Open)]
    fn maps_server_values_to_ui(#[case] raw: &str, #[case] expected: UiStatus) {
        assert_eq!(server_to_ui(raw), expected);
    }

    #[test]
    fn parses_cli_spellings() {
        assert_eq!("in-progress".parse::<UiStatus>().unwrap(), UiStatus::InProgress);
        assert!("someday".parse::<UiStatus>().is_err());
    }
}

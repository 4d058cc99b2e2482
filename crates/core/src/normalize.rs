//! Field normalizer: folds the many historical spellings of task and activity
//! fields into one canonical record.
//!
//! Every canonical field is described by a [`FieldRule`]: an ordered list of
//! source keys, the keys the resolved value is written to, and how a raw value
//! is coerced. The first source key whose value coerces wins. Source keys are
//! never removed, so readers of older spellings keep working.

use serde_json::{Map, Number, Value};

use crate::dates::{date_from_value, format_date, format_instant, instant_from_value};
use crate::priority::PriorityLevel;
use crate::status::{server_to_ui, UiStatus};

pub type Record = Map<String, Value>;

pub mod keys {
    pub const ID: &str = "id";
    pub const TEXT: &str = "text";
    pub const TITLE: &str = "title";
    pub const NAME: &str = "name";
    pub const STATUS: &str = "status";
    pub const COMPLETED: &str = "completed";
    pub const COMPLETION_DATE: &str = "completionDate";
    pub const START_DATE: &str = "start_date";
    pub const START_DATE_CAMEL: &str = "startDate";
    pub const END_DATE: &str = "end_date";
    pub const END_DATE_CAMEL: &str = "endDate";
    pub const DEADLINE: &str = "deadline";
    pub const TASK_ID: &str = "taskId";
    pub const PRIORITY: &str = "priority";
    pub const ASSIGNEE: &str = "assignee";
    pub const RESPONSIBLE: &str = "responsible";
    pub const OWNER: &str = "owner";
    pub const ASSIGNED_TO: &str = "assigned_to";
    pub const KEY_AREA_ID: &str = "key_area_id";
    pub const LIST_INDEX: &str = "list_index";
    pub const GOAL_ID: &str = "goal_id";
    pub const NOTES: &str = "notes";
    pub const DESCRIPTION: &str = "description";
    pub const DURATION: &str = "duration";
    pub const CREATED_TASK_ID: &str = "created_task_id";
}

pub const ID_ALIASES: &[&str] = &["id", "activityId", "activity_id"];
pub const TEXT_ALIASES: &[&str] = &["text", "activity_name", "name", "title"];
pub const STATUS_ALIASES: &[&str] = &["status", "state", "activity_status"];
pub const COMPLETION_DATE_ALIASES: &[&str] = &["completionDate", "completion_date", "completed_at"];
pub const START_DATE_ALIASES: &[&str] = &["startDate", "date_start", "start_date", "date"];
pub const END_DATE_ALIASES: &[&str] = &["endDate", "date_end", "end_date"];
pub const DEADLINE_ALIASES: &[&str] = &["deadline", "dueDate", "due_date"];
pub const TASK_ID_ALIASES: &[&str] = &["taskId", "task_id", "task"];
pub const PRIORITY_ALIASES: &[&str] = &["priority", "priority_level"];
pub const ASSIGNEE_ALIASES: &[&str] = &[
    "assignee",
    "responsible",
    "owner",
    "assigned_to",
    "assignee_name",
    "delegatedToUserId",
    "delegated_to_user_id",
];
pub const KEY_AREA_ALIASES: &[&str] = &["key_area_id", "keyAreaId", "keyArea", "ka_id"];
pub const LIST_ALIASES: &[&str] = &["list", "list_index", "listIndex", "parent_list", "list_number"];
pub const GOAL_ALIASES: &[&str] = &["goal", "goalId", "goal_id"];
pub const NOTES_ALIASES: &[&str] = &["description", "note", "notes", "activity_notes"];
pub const DURATION_ALIASES: &[&str] = &["duration", "duration_minutes"];
pub const CREATED_TASK_ALIASES: &[&str] = &["created_task_id", "createdTaskId"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coerce {
    Id,
    Text,
    Status,
    CalendarDate,
    Instant,
    Priority,
    ListIndex,
}

struct FieldRule {
    sources: &'static [&'static str],
    targets: &'static [&'static str],
    coerce: Coerce,
    fallback: fn() -> Value,
}

fn null() -> Value {
    Value::Null
}

fn empty_text() -> Value {
    Value::String(String::new())
}

fn open_status() -> Value {
    Value::String(UiStatus::Open.as_str().to_string())
}

fn normal_priority() -> Value {
    Value::from(PriorityLevel::Normal.level())
}

const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        sources: ID_ALIASES,
        targets: &[keys::ID],
        coerce: Coerce::Id,
        fallback: null,
    },
    FieldRule {
        sources: TEXT_ALIASES,
        targets: &[keys::TEXT, keys::TITLE, keys::NAME],
        coerce: Coerce::Text,
        fallback: empty_text,
    },
    FieldRule {
        sources: STATUS_ALIASES,
        targets: &[keys::STATUS],
        coerce: Coerce::Status,
        fallback: open_status,
    },
    FieldRule {
        sources: COMPLETION_DATE_ALIASES,
        targets: &[keys::COMPLETION_DATE],
        coerce: Coerce::Instant,
        fallback: null,
    },
    FieldRule {
        sources: START_DATE_ALIASES,
        targets: &[keys::START_DATE, keys::START_DATE_CAMEL],
        coerce: Coerce::CalendarDate,
        fallback: null,
    },
    FieldRule {
        sources: END_DATE_ALIASES,
        targets: &[keys::END_DATE, keys::END_DATE_CAMEL],
        coerce: Coerce::CalendarDate,
        fallback: null,
    },
    FieldRule {
        sources: DEADLINE_ALIASES,
        targets: &[keys::DEADLINE],
        coerce: Coerce::CalendarDate,
        fallback: null,
    },
    FieldRule {
        sources: TASK_ID_ALIASES,
        targets: &[keys::TASK_ID],
        coerce: Coerce::Id,
        fallback: null,
    },
    FieldRule {
        sources: PRIORITY_ALIASES,
        targets: &[keys::PRIORITY],
        coerce: Coerce::Priority,
        fallback: normal_priority,
    },
    FieldRule {
        sources: ASSIGNEE_ALIASES,
        targets: &[keys::ASSIGNEE, keys::RESPONSIBLE, keys::OWNER, keys::ASSIGNED_TO],
        coerce: Coerce::Text,
        fallback: null,
    },
    FieldRule {
        sources: KEY_AREA_ALIASES,
        targets: &[keys::KEY_AREA_ID],
        coerce: Coerce::Id,
        fallback: null,
    },
    FieldRule {
        sources: LIST_ALIASES,
        targets: &[keys::LIST_INDEX],
        coerce: Coerce::ListIndex,
        fallback: null,
    },
    FieldRule {
        sources: GOAL_ALIASES,
        targets: &[keys::GOAL_ID],
        coerce: Coerce::Id,
        fallback: null,
    },
    FieldRule {
        sources: NOTES_ALIASES,
        targets: &[keys::NOTES, keys::DESCRIPTION],
        coerce: Coerce::Text,
        fallback: null,
    },
    FieldRule {
        sources: DURATION_ALIASES,
        targets: &[keys::DURATION],
        coerce: Coerce::Text,
        fallback: null,
    },
    FieldRule {
        sources: CREATED_TASK_ALIASES,
        targets: &[keys::CREATED_TASK_ID],
        coerce: Coerce::Id,
        fallback: null,
    },
];

impl Coerce {
    fn apply(self, value: &Value) -> Option<Value> {
        match self {
            Coerce::Id => id_text(value).map(Value::String),
            Coerce::Text => plain_text(value).map(Value::String),
            Coerce::Status => plain_text(value)
                .map(|raw| Value::String(server_to_ui(&raw).as_str().to_string())),
            Coerce::CalendarDate => date_from_value(value).map(|date| Value::String(format_date(date))),
            Coerce::Instant => {
                instant_from_value(value).map(|instant| Value::String(format_instant(instant)))
            }
            Coerce::Priority => {
                if is_blank(value) {
                    None
                } else {
                    Some(Value::from(PriorityLevel::from_value(value).level()))
                }
            }
            Coerce::ListIndex => list_index(value).map(|index| Value::Number(Number::from(index))),
        }
    }
}

/// Produces the canonical form of `raw`. Never fails: unusable values fall
/// back to the field's default.
pub fn normalize_record(raw: &Record) -> Record {
    let mut canonical = raw.clone();

    for rule in FIELD_RULES {
        let resolved = rule
            .sources
            .iter()
            .filter_map(|key| raw.get(*key))
            .find_map(|value| rule.coerce.apply(value))
            .unwrap_or_else(rule.fallback);
        for target in rule.targets {
            canonical.insert((*target).to_string(), resolved.clone());
        }
    }

    let completed = match raw.get(keys::COMPLETED) {
        Some(Value::Bool(flag)) => *flag,
        _ => canonical.get(keys::STATUS).and_then(Value::as_str) == Some(UiStatus::Done.as_str()),
    };
    canonical.insert(keys::COMPLETED.to_string(), Value::Bool(completed));

    canonical
}

/// Same as [`normalize_record`] for values that may not even be objects.
pub fn normalize_value(value: &Value) -> Record {
    match value {
        Value::Object(record) => normalize_record(record),
        _ => normalize_record(&Record::new()),
    }
}

/// Returns the first alias carrying a non-blank value.
pub fn first_present<'a>(record: &'a Record, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !is_blank(value))
}

/// Writes `patch` into `record`, dropping every other spelling of each patched
/// field first so the patched value is the one a later normalization resolves.
pub fn merge_patch(record: &mut Record, patch: &Record) {
    for (key, value) in patch {
        if let Some(rule) = FIELD_RULES
            .iter()
            .find(|rule| rule.sources.contains(&key.as_str()) || rule.targets.contains(&key.as_str()))
        {
            for alias in rule.sources.iter().chain(rule.targets.iter()) {
                record.remove(*alias);
            }
        }
        record.insert(key.clone(), value.clone());
    }
}

pub fn string_field(record: &Record, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|value| !value.trim().is_empty())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn plain_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(nested) => nested.get("id").and_then(id_text),
        other => plain_text(other),
    }
}

fn list_index(value: &Value) -> Option<u64> {
    let index = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (index > 0).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test records must be objects"),
        }
    }

    fn canonical_view(record: &Record) -> Vec<(&'static str, Option<Value>)> {
        FIELD_RULES
            .iter()
            .flat_map(|rule| rule.targets.iter())
            .chain(std::iter::once(&keys::COMPLETED))
            .map(|key| (*key, record.get(*key).cloned()))
            .collect()
    }

    #[test]
    fn activity_name_populates_every_text_key() {
        let normalized = normalize_record(&record(json!({ "activity_name": "  Call Alex  " })));
        assert_eq!(normalized["text"], json!("Call Alex"));
        assert_eq!(normalized["title"], json!("Call Alex"));
        assert_eq!(normalized["name"], json!("Call Alex"));
        assert_eq!(normalized["activity_name"], json!("  Call Alex  "));
    }

    #[test]
    fn date_end_is_exposed_in_both_conventions() {
        let normalized = normalize_record(&record(json!({ "date_end": "2025-04-02" })));
        assert_eq!(normalized["end_date"], json!("2025-04-02"));
        assert_eq!(normalized["endDate"], normalized["end_date"]);
        assert_eq!(normalized["start_date"], Value::Null);
        assert_eq!(normalized["startDate"], Value::Null);
    }

    #[test]
    fn empty_record_gets_defaults() {
        let normalized = normalize_record(&Record::new());
        assert_eq!(normalized["id"], Value::Null);
        assert_eq!(normalized["text"], json!(""));
        assert_eq!(normalized["status"], json!("open"));
        assert_eq!(normalized["completed"], json!(false));
        assert_eq!(normalized["priority"], json!(2));
        assert_eq!(normalized["deadline"], Value::Null);
        assert_eq!(normalized["assignee"], Value::Null);
        assert_eq!(normalized["key_area_id"], Value::Null);
    }

    #[test]
    fn resolves_aliases_in_order() {
        let normalized = normalize_record(&record(json!({
            "activity_id": 42,
            "name": "Fallback name",
            "activity_name": "Preferred name",
            "state": "completed",
            "completed_at": "2025-01-02T10:00:00Z",
            "date": "2025-01-01",
            "due_date": "2025-01-10",
            "task": { "id": 7 },
            "priority_level": "high",
            "owner": "",
            "assignee_name": "Sam",
            "ka_id": "ka-9",
            "listIndex": "3",
            "goalId": "g-1",
            "activity_notes": "bring slides",
            "duration_minutes": 45
        })));

        assert_eq!(normalized["id"], json!("42"));
        assert_eq!(normalized["text"], json!("Preferred name"));
        assert_eq!(normalized["status"], json!("done"));
        assert_eq!(normalized["completed"], json!(true));
        assert_eq!(normalized["completionDate"], json!("2025-01-02T10:00:00Z"));
        assert_eq!(normalized["startDate"], json!("2025-01-01"));
        assert_eq!(normalized["deadline"], json!("2025-01-10"));
        assert_eq!(normalized["taskId"], json!("7"));
        assert_eq!(normalized["priority"], json!(3));
        assert_eq!(normalized["assignee"], json!("Sam"));
        assert_eq!(normalized["responsible"], json!("Sam"));
        assert_eq!(normalized["owner"], json!("Sam"));
        assert_eq!(normalized["assigned_to"], json!("Sam"));
        assert_eq!(normalized["key_area_id"], json!("ka-9"));
        assert_eq!(normalized["list_index"], json!(3));
        assert_eq!(normalized["goal_id"], json!("g-1"));
        assert_eq!(normalized["notes"], json!("bring slides"));
        assert_eq!(normalized["duration"], json!("45"));
    }

    #[test]
    fn explicit_completed_flag_wins_over_status() {
        let normalized = normalize_record(&record(json!({ "status": "completed", "completed": false })));
        assert_eq!(normalized["status"], json!("done"));
        assert_eq!(normalized["completed"], json!(false));
    }

    #[test]
    fn malformed_values_degrade_to_defaults() {
        let normalized = normalize_record(&record(json!({
            "startDate": "soon",
            "deadline": { "when": "later" },
            "priority": "bogus",
            "list": -4,
            "status": 17
        })));
        assert_eq!(normalized["start_date"], Value::Null);
        assert_eq!(normalized["deadline"], Value::Null);
        assert_eq!(normalized["priority"], json!(2));
        assert_eq!(normalized["list_index"], Value::Null);
        assert_eq!(normalized["status"], json!("open"));
    }

    #[test]
    fn unusable_first_alias_falls_through_to_the_next() {
        let normalized = normalize_record(&record(json!({ "startDate": "soon", "date": "2025-02-01" })));
        assert_eq!(normalized["start_date"], json!("2025-02-01"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = vec![
            json!({}),
            json!({ "activity_name": " Draft ", "date_end": "2025-04-02", "priority": "low" }),
            json!({ "id": 3, "title": "Plan", "state": "in_progress", "dueDate": "2025-02-03T00:00:00Z" }),
            json!({ "startDate": "soon", "date": "2025-02-01", "list": "x", "list_number": 4 }),
            json!({ "completed": true, "completion_date": "2025-01-01", "delegatedToUserId": 12 }),
            json!({ "status": "archived", "keyArea": { "id": "ka" }, "goal": null, "note": "n" }),
        ];

        for input in inputs {
            let once = normalize_record(&record(input.clone()));
            let twice = normalize_record(&once);
            assert_eq!(canonical_view(&twice), canonical_view(&once), "input: {input}");
        }
    }

    #[test]
    fn first_present_skips_blank_values() {
        let raw = record(json!({ "assignee": " ", "owner": null, "assigned_to": "Kim" }));
        assert_eq!(first_present(&raw, ASSIGNEE_ALIASES), Some(&json!("Kim")));
        assert_eq!(first_present(&raw, KEY_AREA_ALIASES), None);
    }

    #[test]
    fn merge_patch_replaces_every_spelling() {
        let mut stored = normalize_record(&record(json!({ "key_area_id": "ka1", "keyAreaId": "ka1" })));
        merge_patch(&mut stored, &record(json!({ "keyAreaId": "ka2" })));
        let normalized = normalize_record(&stored);
        assert_eq!(normalized["key_area_id"], json!("ka2"));
    }
}

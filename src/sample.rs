//! Sample workspace for `--offline`, dated relative to today so every
//! quadrant has something in it.

use chrono::{Duration, NaiveDate};
use serde_json::json;

use keyareas_core::dates::format_date;
use keyareas_core::MemoryBackend;

pub fn sample_backend(today: NaiveDate) -> MemoryBackend {
    let day = |offset: i64| format_date(today + Duration::days(offset));
    let backend = MemoryBackend::new();

    backend.seed_task(json!({
        "id": "t1",
        "title": "Finish quarterly report",
        "key_area_id": "ka-work",
        "priority": "high",
        "assignee": "Me",
        "deadline": day(-1),
        "list_index": 1,
        "goal_id": "g1"
    }));
    backend.seed_task(json!({
        "id": "t2",
        "title": "Plan team offsite",
        "keyAreaId": "ka-work",
        "priority": 2,
        "startDate": day(5),
        "endDate": day(7),
        "list_index": 1
    }));
    backend.seed_task(json!({
        "id": "t3",
        "title": "Renew passport",
        "priority": "normal",
        "dueDate": day(20),
        "list": 1
    }));
    backend.seed_task(json!({
        "id": "t4",
        "title": "Sort old photos",
        "priority": "low",
        "list": 2
    }));
    backend.seed_task(json!({
        "id": "t5",
        "title": "Book dentist",
        "key_area_id": "ka-health",
        "status": "completed",
        "completionDate": format!("{}T09:30:00Z", day(-2)),
        "end_date": day(-3)
    }));

    backend.seed_activity(json!({
        "id": "a1",
        "activity_name": "Collect sales figures",
        "taskId": "t1",
        "status": "completed"
    }));
    backend.seed_activity(json!({
        "id": "a2",
        "activity_name": "Draft executive summary",
        "task_id": "t1",
        "date_end": day(0)
    }));
    backend.seed_activity(json!({
        "id": "a3",
        "text": "Shortlist venues",
        "taskId": "t2",
        "priority": "low",
        "responsible": "Dana"
    }));

    backend.seed_user(json!({ "id": 1, "name": "Me" }));
    backend.seed_user(json!({ "id": 2, "name": "Dana" }));
    backend.seed_user(json!({ "id": 3, "full_name": "Lee Park" }));

    backend.seed_goal(json!({
        "id": "g1",
        "title": "Grow revenue 10%",
        "description": "Across all product lines",
        "status": "active"
    }));

    backend
}

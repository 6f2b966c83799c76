mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime};
use common::{tomorrow, tool_context};
use turnero_assistant::ToolCall;
use turnero_engine::{CalendarTools, ToolResolver};
use turnero_persist::{Event, EventStatus, EventStore, MemoryStore};

fn tools(store: &Arc<MemoryStore>) -> CalendarTools<MemoryStore> {
    CalendarTools::new(Arc::clone(store))
}

fn call(name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::function("call_1", name, args.to_string())
}

fn code_of(output: &str) -> String {
    output
        .split_whitespace()
        .find(|w| w.starts_with("EVT-"))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_insert_event_creates_booking() {
    let store = Arc::new(MemoryStore::new());
    let date = tomorrow().to_string();

    let output = tools(&store)
        .resolve(
            &tool_context("c1"),
            &call("insertEvent", serde_json::json!({ "date": date, "time": "10:00" })),
        )
        .await;

    assert!(output.starts_with("created: code EVT-"), "{output}");
    assert!(output.ends_with(&format!("on {} at 10:00", date)));

    let events = store.all_events().await;
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.code_event, code_of(&output));
    assert_eq!(event.contact_id, "c1");
    assert_eq!(event.title, "Turno");
    assert_eq!(event.end, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
}

#[tokio::test]
async fn test_insert_event_rejects_bad_input() {
    let store = Arc::new(MemoryStore::new());
    let tools = tools(&store);
    let ctx = tool_context("c1");
    let date = tomorrow().to_string();

    let bad_date = tools
        .resolve(&ctx, &call("insertEvent", serde_json::json!({ "date": "02/05/2024", "time": "10:00" })))
        .await;
    assert_eq!(bad_date, "error: invalid date '02/05/2024', expected YYYY-MM-DD");

    let missing = tools
        .resolve(&ctx, &call("insertEvent", serde_json::json!({ "date": date })))
        .await;
    assert!(missing.starts_with("error: invalid arguments"), "{missing}");

    let closed = tools
        .resolve(&ctx, &call("insertEvent", serde_json::json!({ "date": date, "time": "20:00" })))
        .await;
    assert!(closed.contains("outside opening hours"), "{closed}");

    let past = tools
        .resolve(&ctx, &call("insertEvent", serde_json::json!({ "date": "2024-05-02", "time": "10:00" })))
        .await;
    assert!(past.ends_with("is in the past"), "{past}");

    let not_json = tools
        .resolve(&ctx, &ToolCall::function("call_2", "insertEvent", "{date: tomorrow"))
        .await;
    assert!(not_json.starts_with("error: invalid arguments"));

    assert!(store.all_events().await.is_empty());
}

#[tokio::test]
async fn test_overlapping_slot_is_rejected_across_contacts() {
    let store = Arc::new(MemoryStore::new());
    let tools = tools(&store);
    let date = tomorrow().to_string();

    let first = tools
        .resolve(&tool_context("c1"), &call("insertEvent", serde_json::json!({ "date": date, "time": "10:00" })))
        .await;
    let clash = tools
        .resolve(&tool_context("c2"), &call("insertEvent", serde_json::json!({ "date": date, "time": "10:15" })))
        .await;
    let adjacent = tools
        .resolve(&tool_context("c2"), &call("insertEvent", serde_json::json!({ "date": date, "time": "10:30" })))
        .await;

    assert!(first.starts_with("created:"));
    assert!(clash.starts_with("error: the slot"), "{clash}");
    assert!(clash.contains(&code_of(&first)));
    assert!(adjacent.starts_with("created:"), "{adjacent}");
}

#[tokio::test]
async fn test_get_events_lists_only_own_scheduled_events() {
    let store = Arc::new(MemoryStore::new());
    let tools = tools(&store);
    let date = tomorrow();

    let empty = tools
        .resolve(&tool_context("c1"), &call("getEvents", serde_json::json!({})))
        .await;
    assert_eq!(empty, "no events");

    for (contact, time) in [("c1", "11:00"), ("c1", "09:00"), ("c2", "12:00")] {
        tools
            .resolve(
                &tool_context(contact),
                &call("insertEvent", serde_json::json!({ "date": date.to_string(), "time": time, "title": "Control" })),
            )
            .await;
    }

    let listed = tools
        .resolve(&tool_context("c1"), &call("getEvents", serde_json::json!({ "date": date.to_string() })))
        .await;
    let lines: Vec<_> = listed.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(&format!("{} 09:00-09:30 Control", date)));
    assert!(lines[1].contains("11:00-11:30"));

    let other_day = tools
        .resolve(
            &tool_context("c1"),
            &call("getEvents", serde_json::json!({ "date": (date + Duration::days(1)).to_string() })),
        )
        .await;
    assert_eq!(other_day, "no events");
}

#[tokio::test]
async fn test_update_event_reschedules() {
    let store = Arc::new(MemoryStore::new());
    let tools = tools(&store);
    let ctx = tool_context("c1");
    let date = tomorrow().to_string();

    let created = tools
        .resolve(&ctx, &call("insertEvent", serde_json::json!({ "date": date, "time": "10:00", "duration_minutes": 45 })))
        .await;
    let code = code_of(&created);

    let updated = tools
        .resolve(&ctx, &call("updateEvent", serde_json::json!({ "code_event": code.to_lowercase(), "time": "15:00", "title": "Limpieza" })))
        .await;
    assert_eq!(updated, format!("updated: code {} on {} at 15:00", code, date));

    let event = store.find_by_code("asst_internal", &code).await.unwrap().unwrap();
    assert_eq!(event.start, NaiveTime::from_hms_opt(15, 0, 0).unwrap());
    assert_eq!(event.end, NaiveTime::from_hms_opt(15, 45, 0).unwrap());
    assert_eq!(event.title, "Limpieza");

    // moving onto its own former slot is not an overlap with itself
    let back = tools
        .resolve(&ctx, &call("updateEvent", serde_json::json!({ "code_event": code, "time": "15:15" })))
        .await;
    assert!(back.starts_with("updated:"), "{back}");
}

#[tokio::test]
async fn test_events_of_other_contacts_are_not_reachable() {
    let store = Arc::new(MemoryStore::new());
    let tools = tools(&store);
    let date = tomorrow().to_string();

    let created = tools
        .resolve(&tool_context("c1"), &call("insertEvent", serde_json::json!({ "date": date, "time": "10:00" })))
        .await;
    let code = code_of(&created);

    let stolen = tools
        .resolve(&tool_context("c2"), &call("deleteEvent", serde_json::json!({ "code_event": code })))
        .await;
    assert_eq!(stolen, format!("error: no event with code {}", code));
}

#[tokio::test]
async fn test_delete_event_cancels_softly() {
    let store = Arc::new(MemoryStore::new());
    let tools = tools(&store);
    let ctx = tool_context("c1");
    let date = tomorrow().to_string();

    let created = tools
        .resolve(&ctx, &call("insertEvent", serde_json::json!({ "date": date, "time": "10:00" })))
        .await;
    let code = code_of(&created);

    let cancelled = tools
        .resolve(&ctx, &call("deleteEvent", serde_json::json!({ "code_event": code })))
        .await;
    assert_eq!(cancelled, format!("cancelled: code {}", code));

    let events = store.all_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, EventStatus::Cancelled);

    let again = tools
        .resolve(&ctx, &call("deleteEvent", serde_json::json!({ "code_event": code })))
        .await;
    assert!(again.starts_with("error: no event"));

    // the freed slot can be booked again
    let rebooked = tools
        .resolve(&ctx, &call("insertEvent", serde_json::json!({ "date": date, "time": "10:00" })))
        .await;
    assert!(rebooked.starts_with("created:"));
}

#[tokio::test]
async fn test_unknown_function_yields_error_output() {
    let store = Arc::new(MemoryStore::new());
    let output = tools(&store)
        .resolve(&tool_context("c1"), &call("sendInvoice", serde_json::json!({})))
        .await;
    assert_eq!(output, "error: unknown function sendInvoice");
}

/// Event store with a round trip on every read and write of the calendar
struct SlowEvents {
    inner: Arc<MemoryStore>,
}

impl SlowEvents {
    async fn lag() {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

#[async_trait]
impl EventStore for SlowEvents {
    async fn create_event(&self, event: Event) -> turnero_persist::Result<Event> {
        Self::lag().await;
        self.inner.create_event(event).await
    }

    async fn find_by_code(&self, assistant_id: &str, code_event: &str) -> turnero_persist::Result<Option<Event>> {
        self.inner.find_by_code(assistant_id, code_event).await
    }

    async fn code_exists(&self, code_event: &str) -> turnero_persist::Result<bool> {
        self.inner.code_exists(code_event).await
    }

    async fn list_for_contact(
        &self,
        contact_id: &str,
        assistant_id: &str,
        date: Option<NaiveDate>,
    ) -> turnero_persist::Result<Vec<Event>> {
        self.inner.list_for_contact(contact_id, assistant_id, date).await
    }

    async fn list_for_assistant_on(&self, assistant_id: &str, date: NaiveDate) -> turnero_persist::Result<Vec<Event>> {
        Self::lag().await;
        self.inner.list_for_assistant_on(assistant_id, date).await
    }

    async fn update_event(&self, event: &Event) -> turnero_persist::Result<()> {
        Self::lag().await;
        self.inner.update_event(event).await
    }

    async fn cancel_event(&self, event_id: &str) -> turnero_persist::Result<()> {
        self.inner.cancel_event(event_id).await
    }
}

fn slow_tools(store: &Arc<MemoryStore>) -> CalendarTools<SlowEvents> {
    CalendarTools::new(Arc::new(SlowEvents {
        inner: Arc::clone(store),
    }))
}

async fn scheduled_on(store: &MemoryStore, date: NaiveDate) -> Vec<Event> {
    store.list_for_assistant_on("asst_internal", date).await.unwrap()
}

#[tokio::test]
async fn test_concurrent_bookings_of_one_slot_admit_one() {
    let store = Arc::new(MemoryStore::new());
    let tools = slow_tools(&store);
    let date = tomorrow();
    let args = serde_json::json!({ "date": date.to_string(), "time": "10:00" });

    let (ctx1, ctx2) = (tool_context("c1"), tool_context("c2"));
    let (call1, call2) = (call("insertEvent", args.clone()), call("insertEvent", args.clone()));
    let (c1, c2) = tokio::join!(tools.resolve(&ctx1, &call1), tools.resolve(&ctx2, &call2),);

    let created: Vec<_> = [&c1, &c2].into_iter().filter(|o| o.starts_with("created:")).collect();
    assert_eq!(created.len(), 1, "{c1} / {c2}");
    let refused = if c1.starts_with("created:") { &c2 } else { &c1 };
    assert!(refused.starts_with("error: the slot"), "{refused}");

    let day = scheduled_on(&store, date).await;
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].code_event, code_of(created[0]));
}

#[tokio::test]
async fn test_concurrent_reschedules_onto_one_slot_admit_one() {
    let store = Arc::new(MemoryStore::new());
    let tools = slow_tools(&store);
    let date = tomorrow();

    let mut codes = Vec::new();
    for (contact, time) in [("c1", "09:00"), ("c2", "11:00")] {
        let created = tools
            .resolve(
                &tool_context(contact),
                &call("insertEvent", serde_json::json!({ "date": date.to_string(), "time": time })),
            )
            .await;
        codes.push(code_of(&created));
    }

    let (ctx1, ctx2) = (tool_context("c1"), tool_context("c2"));
    let call1 = call("updateEvent", serde_json::json!({ "code_event": codes[0], "time": "10:00" }));
    let call2 = call("updateEvent", serde_json::json!({ "code_event": codes[1], "time": "10:00" }));
    let (c1, c2) = tokio::join!(tools.resolve(&ctx1, &call1), tools.resolve(&ctx2, &call2),);

    let moved = [&c1, &c2].iter().filter(|o| o.starts_with("updated:")).count();
    assert_eq!(moved, 1, "{c1} / {c2}");

    let at_ten: Vec<_> = scheduled_on(&store, date)
        .await
        .into_iter()
        .filter(|e| e.start == NaiveTime::from_hms_opt(10, 0, 0).unwrap())
        .collect();
    assert_eq!(at_ten.len(), 1);
}

#[tokio::test]
async fn test_bookings_from_separate_instances_do_not_overlap() {
    // two engines over one store share no in-process lock
    let store = Arc::new(MemoryStore::new());
    let first = slow_tools(&store);
    let second = slow_tools(&store);
    let date = tomorrow();

    let (ctx1, ctx2) = (tool_context("c1"), tool_context("c2"));
    let call1 = call("insertEvent", serde_json::json!({ "date": date.to_string(), "time": "10:00" }));
    let call2 = call("insertEvent", serde_json::json!({ "date": date.to_string(), "time": "10:00" }));
    let (same_a, same_b) = tokio::join!(first.resolve(&ctx1, &call1), second.resolve(&ctx2, &call2),);
    let created = [&same_a, &same_b].iter().filter(|o| o.starts_with("created:")).count();
    assert_eq!(created, 1, "{same_a} / {same_b}");
    assert!(
        same_a.contains("was just booked") || same_b.contains("was just booked"),
        "{same_a} / {same_b}"
    );

    let (ctx3, ctx4) = (tool_context("c3"), tool_context("c4"));
    let call3 = call("insertEvent", serde_json::json!({ "date": date.to_string(), "time": "14:00" }));
    let call4 = call("insertEvent", serde_json::json!({ "date": date.to_string(), "time": "14:15" }));
    let (near_a, near_b) = tokio::join!(first.resolve(&ctx3, &call3), second.resolve(&ctx4, &call4),);
    let created = [&near_a, &near_b].iter().filter(|o| o.starts_with("created:")).count();
    assert_eq!(created, 1, "{near_a} / {near_b}");

    let afternoon: Vec<_> = scheduled_on(&store, date)
        .await
        .into_iter()
        .filter(|e| e.start >= NaiveTime::from_hms_opt(14, 0, 0).unwrap())
        .collect();
    assert_eq!(afternoon.len(), 1);
}

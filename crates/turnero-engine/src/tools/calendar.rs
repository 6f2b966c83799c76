use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use turnero_assistant::ToolCall;
use turnero_persist::{Event, EventStatus, EventStore, PersistError, PersistenceClient};

use super::args::{
    parse_args, parse_date, parse_time, DeleteEventArgs, GetEventsArgs, InsertEventArgs,
    ToolError, UpdateEventArgs, DATE_FORMAT, TIME_FORMAT,
};
use super::{ToolContext, ToolFunction, ToolResolver};
use crate::locks::KeyedLocks;

const CODE_PREFIX: &str = "EVT-";
const CODE_ATTEMPTS: usize = 8;
const DEFAULT_TITLE: &str = "Turno";

/// Calendar handlers for the assistant's tool calls
///
/// Slot checks and the writes that follow them run under a lock per
/// assistant and date, so two contacts cannot book the same time through
/// one process. The store's slot constraint and a re-check after insert
/// cover concurrent writers elsewhere.
pub struct CalendarTools<E: ?Sized = dyn PersistenceClient> {
    slots: KeyedLocks,
    events: Arc<E>,
}

fn slot_key(assistant_id: &str, date: NaiveDate) -> String {
    format!("{}:{}", assistant_id, date.format(DATE_FORMAT))
}

fn random_code() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", CODE_PREFIX, hex[..6].to_ascii_uppercase())
}

fn fmt_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

impl<E: EventStore + ?Sized> CalendarTools<E> {
    pub fn new(events: Arc<E>) -> Self {
        Self {
            slots: KeyedLocks::new(),
            events,
        }
    }

    /// Run one function with its raw JSON arguments
    pub async fn dispatch(
        &self,
        ctx: &ToolContext,
        function: ToolFunction,
        arguments: &str,
    ) -> Result<String, ToolError> {
        match function {
            ToolFunction::InsertEvent => self.insert_event(ctx, parse_args(arguments)?).await,
            ToolFunction::GetEvents => self.get_events(ctx, parse_args(arguments)?).await,
            ToolFunction::UpdateEvent => self.update_event(ctx, parse_args(arguments)?).await,
            ToolFunction::DeleteEvent => self.delete_event(ctx, parse_args(arguments)?).await,
        }
    }

    async fn insert_event(&self, ctx: &ToolContext, args: InsertEventArgs) -> Result<String, ToolError> {
        let date = parse_date(&args.date)?;
        let start = parse_time(&args.time)?;
        let minutes = match args.duration_minutes {
            Some(0) => {
                return Err(ToolError::InvalidArguments(
                    "duration_minutes must be positive".to_string(),
                ))
            }
            Some(minutes) => minutes,
            None => ctx.calendar.slot_minutes,
        };

        let _slot = self.slots.acquire(&slot_key(&ctx.assistant_id, date)).await;
        let end = self.check_slot(ctx, date, start, minutes, None).await?;

        let now = Utc::now();
        let mut event = Event {
            id: uuid::Uuid::new_v4().simple().to_string(),
            code_event: String::new(),
            assistant_id: ctx.assistant_id.clone(),
            contact_id: ctx.contact_id.clone(),
            title: args
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: args.description,
            date,
            start,
            end,
            status: EventStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };

        for _ in 0..CODE_ATTEMPTS {
            let code = random_code();
            if self.events.code_exists(&code).await? {
                continue;
            }
            event.code_event = code;

            match self.events.create_event(event.clone()).await {
                Ok(created) => {
                    self.confirm_booking(ctx, &created).await?;
                    return Ok(format!(
                        "created: code {} on {} at {}",
                        created.code_event,
                        created.date.format(DATE_FORMAT),
                        fmt_time(created.start)
                    ));
                }
                // lost a race for the code
                Err(PersistError::DuplicateKey(_)) => continue,
                Err(PersistError::SlotTaken(_)) => {
                    return Err(ToolError::SlotTaken {
                        date,
                        start: fmt_time(start),
                    })
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ToolError::CodeExhausted)
    }

    async fn get_events(&self, ctx: &ToolContext, args: GetEventsArgs) -> Result<String, ToolError> {
        let date = args.date.as_deref().map(parse_date).transpose()?;
        let events = self
            .events
            .list_for_contact(&ctx.contact_id, &ctx.assistant_id, date)
            .await?;

        if events.is_empty() {
            return Ok("no events".to_string());
        }

        let lines: Vec<String> = events
            .iter()
            .map(|e| {
                format!(
                    "{} {} {}-{} {}",
                    e.code_event,
                    e.date.format(DATE_FORMAT),
                    fmt_time(e.start),
                    fmt_time(e.end),
                    e.title
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }

    async fn update_event(&self, ctx: &ToolContext, args: UpdateEventArgs) -> Result<String, ToolError> {
        let mut event = self.owned_event(ctx, &args.code_event).await?;

        let date = args.date.as_deref().map(parse_date).transpose()?;
        let start = args.time.as_deref().map(parse_time).transpose()?;

        let rescheduled = date.is_some() || start.is_some();
        let date = date.unwrap_or(event.date);
        let start = start.unwrap_or(event.start);

        // held until the write below
        let _slot = if rescheduled {
            Some(self.slots.acquire(&slot_key(&ctx.assistant_id, date)).await)
        } else {
            None
        };
        if rescheduled {
            let minutes = u32::try_from((event.end - event.start).num_minutes())
                .unwrap_or(ctx.calendar.slot_minutes);
            let end = self
                .check_slot(ctx, date, start, minutes, Some(&event.id))
                .await?;
            event.date = date;
            event.start = start;
            event.end = end;
        }
        if let Some(title) = args.title.filter(|t| !t.trim().is_empty()) {
            event.title = title;
        }

        match self.events.update_event(&event).await {
            Ok(()) => {}
            Err(PersistError::SlotTaken(_)) => {
                return Err(ToolError::SlotTaken {
                    date: event.date,
                    start: fmt_time(event.start),
                })
            }
            Err(e) => return Err(e.into()),
        }
        Ok(format!(
            "updated: code {} on {} at {}",
            event.code_event,
            event.date.format(DATE_FORMAT),
            fmt_time(event.start)
        ))
    }

    async fn delete_event(&self, ctx: &ToolContext, args: DeleteEventArgs) -> Result<String, ToolError> {
        let event = self.owned_event(ctx, &args.code_event).await?;
        self.events.cancel_event(&event.id).await?;
        Ok(format!("cancelled: code {}", event.code_event))
    }

    /// Cancel a just-created event that overlaps an earlier booking written
    /// concurrently by another process
    async fn confirm_booking(&self, ctx: &ToolContext, created: &Event) -> Result<(), ToolError> {
        let day = self
            .events
            .list_for_assistant_on(&created.assistant_id, created.date)
            .await?;
        // compare stored timestamps on both sides
        let ours = day
            .iter()
            .find(|e| e.id == created.id)
            .map_or(created.created_at, |e| e.created_at);

        let earlier = day.iter().find(|e| {
            e.id != created.id
                && e.overlaps(created.date, created.start, created.end)
                && (e.created_at, e.id.as_str()) < (ours, created.id.as_str())
        });
        let Some(other) = earlier else {
            return Ok(());
        };

        warn!(
            contact_id = %ctx.contact_id,
            code_event = %created.code_event,
            overlaps = %other.code_event,
            "Booking lost a concurrent write, cancelling it"
        );
        self.events.cancel_event(&created.id).await?;
        Err(ToolError::Overlap {
            date: created.date,
            start: fmt_time(created.start),
            code: other.code_event.clone(),
        })
    }

    /// Scheduled event of the calling contact with this code
    async fn owned_event(&self, ctx: &ToolContext, code: &str) -> Result<Event, ToolError> {
        let code = code.trim();
        self.events
            .find_by_code(&ctx.assistant_id, code)
            .await?
            .filter(|e| e.contact_id == ctx.contact_id && e.is_scheduled())
            .ok_or_else(|| ToolError::EventNotFound(code.to_string()))
    }

    /// Validate a slot and return its end time
    async fn check_slot(
        &self,
        ctx: &ToolContext,
        date: NaiveDate,
        start: NaiveTime,
        minutes: u32,
        exclude_id: Option<&str>,
    ) -> Result<NaiveTime, ToolError> {
        let starts_at = NaiveDateTime::new(date, start);
        if starts_at <= ctx.calendar.local(ctx.now) {
            return Err(ToolError::InPast(format!(
                "{} {}",
                date.format(DATE_FORMAT),
                fmt_time(start)
            )));
        }

        let (end, wrapped) = start.overflowing_add_signed(Duration::minutes(i64::from(minutes)));
        if wrapped != 0 || !ctx.calendar.within_hours(start, end) {
            return Err(ToolError::OutsideHours {
                start: fmt_time(start),
                end: fmt_time(end),
                opens: fmt_time(ctx.calendar.opens_at),
                closes: fmt_time(ctx.calendar.closes_at),
            });
        }

        let taken = self
            .events
            .list_for_assistant_on(&ctx.assistant_id, date)
            .await?;
        if let Some(other) = taken
            .iter()
            .find(|e| Some(e.id.as_str()) != exclude_id && e.overlaps(date, start, end))
        {
            return Err(ToolError::Overlap {
                date,
                start: fmt_time(start),
                code: other.code_event.clone(),
            });
        }

        Ok(end)
    }
}

#[async_trait]
impl<E: EventStore + ?Sized> ToolResolver for CalendarTools<E> {
    async fn resolve(&self, ctx: &ToolContext, call: &ToolCall) -> String {
        let result = match call.function.name.parse::<ToolFunction>() {
            Ok(function) => self.dispatch(ctx, function, &call.function.arguments).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => {
                info!(
                    contact_id = %ctx.contact_id,
                    tool_call_id = %call.id,
                    function = %call.function.name,
                    "Tool call resolved"
                );
                output
            }
            Err(e) => {
                warn!(
                    contact_id = %ctx.contact_id,
                    tool_call_id = %call.id,
                    function = %call.function.name,
                    arguments = %call.function.arguments,
                    error = %e,
                    "Tool call failed"
                );
                e.to_output()
            }
        }
    }
}

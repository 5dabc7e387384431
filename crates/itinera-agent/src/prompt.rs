use chrono::{DateTime, FixedOffset, NaiveDate};
use crate::overview::schedule_overview;
use itinera_core::Document;
use std::fmt;

const SYSTEM_PROMPT_TEMPLATE: &str = "You are a travel assistant for a family trip. You read and \
edit the trip itinerary only through the provided tools.

[Tool rules]
- Any lookup, change or record must go through a tool call. Never claim a change was made \
unless the tool call that made it succeeded. No tool call means the data did not change.
- When the user asks for a change directly, execute it with the tools instead of only proposing it.
- If an item id is uncertain, call find_item first.
- The overview below is a snapshot taken when this conversation started. After a change, use \
get_schedule or get_item_detail to see the current state.
- Several changes may be issued in one batch; they run in order.
- Keep confirmations short after changes.

[Visits and reviews]
- When the user says they visited a place, record it with update_visit (include optionName for \
items with options). A planned item becomes done.
- Impressions or ratings go to update_review.

[Context]
- Earlier turns of the conversation are included. Resolve references such as \"there\" or \
\"that one\" from them; if that is impossible, ask which item is meant.

- Today: {today}
- Trip status: {day_status}

[Schedule overview]
{schedule_overview}";

/// Where today falls relative to the itinerary's first and last dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripStatus {
    Upcoming { days_left: i64 },
    InProgress { day: i64 },
    Finished,
    Undated,
}

impl TripStatus {
    pub fn at(document: &Document, today: NaiveDate) -> Self {
        let Some((start, end)) = document.date_span() else {
            return TripStatus::Undated;
        };
        if today < start {
            TripStatus::Upcoming {
                days_left: (start - today).num_days(),
            }
        } else if today > end {
            TripStatus::Finished
        } else {
            TripStatus::InProgress {
                day: (today - start).num_days() + 1,
            }
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripStatus::Upcoming { days_left } => {
                write!(f, "starts in {days_left} days (D-{days_left})")
            }
            TripStatus::InProgress { day } => write!(f, "day {day} in progress"),
            TripStatus::Finished => f.write_str("finished"),
            TripStatus::Undated => f.write_str("dates unknown"),
        }
    }
}

/// Assemble the system prompt once, at loop entry.
pub fn build_system_prompt(document: &Document, now: DateTime<FixedOffset>) -> String {
    let today = now.date_naive();
    SYSTEM_PROMPT_TEMPLATE
        .replace("{today}", &now.format("%Y-%m-%d (%a)").to_string())
        .replace("{day_status}", &TripStatus::at(document, today).to_string())
        .replace("{schedule_overview}", &schedule_overview(document))
}

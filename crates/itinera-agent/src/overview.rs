//! Compact, line-per-item rendering of the whole itinerary that goes into the
//! system prompt.

use itinera_core::{Document, Item};

/// One `### Day` block per day, blank line between days, trailing whitespace
/// trimmed.
pub fn schedule_overview(document: &Document) -> String {
    let mut lines = Vec::new();
    for day in &document.days {
        lines.push(format!(
            "### Day {} ({}, {}) - {}",
            day.day_num, day.date, day.dow, day.title
        ));
        for item in &day.items {
            lines.push(item_line(item));
        }
        lines.push(String::new());
    }
    lines.join("\n").trim_end().to_string()
}

fn item_line(item: &Item) -> String {
    format!(
        "  {} {} | {} | {}{}",
        item.status.icon(),
        item.id,
        item.time,
        item.title,
        choice_suffix(item)
    )
}

fn choice_suffix(item: &Item) -> String {
    if !item.chosen.is_empty() {
        return format!(" [chosen: {}]", item.chosen);
    }
    let names: Vec<&str> = item
        .options
        .iter()
        .map(|o| o.name.as_str())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        String::new()
    } else {
        format!(" (candidates: {})", names.join(", "))
    }
}

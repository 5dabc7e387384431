//! Read-only operations. Each takes `&ExecutionContext`, so none can mutate.

use crate::validation::{parse_category, parse_input, parse_status, parse_suitability, require_text};
use crate::{ExecutionContext, ToolError};
use itinera_core::{Day, Item, ItemStatus, Profile, Suitability};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleInput {
    #[serde(default, alias = "day_num")]
    day_num: Option<u32>,
    #[serde(default)]
    date: Option<String>,
}

pub(crate) fn get_schedule(ctx: &ExecutionContext, input: &Value) -> Result<Value, ToolError> {
    let input: ScheduleInput = parse_input(input)?;
    if input.day_num.is_none() && input.date.is_none() {
        return Err(ToolError::MissingField("dayNum"));
    }
    let day = ctx
        .find_day(input.day_num, input.date.as_deref())
        .ok_or_else(|| ToolError::not_found("day", day_key(&input)))?;

    let items: Vec<Value> = day
        .items
        .iter()
        .map(|item| {
            json!({
                "icon": item.status.icon(),
                "id": item.id,
                "time": item.time,
                "title": item.title,
                "status": item.status,
                "chosen": item.chosen,
                "options": item.option_names(),
            })
        })
        .collect();

    Ok(json!({
        "dayNum": day.day_num,
        "date": day.date,
        "dow": day.dow,
        "title": day.title,
        "items": items,
    }))
}

fn day_key(input: &ScheduleInput) -> String {
    match (&input.day_num, &input.date) {
        (Some(n), _) => format!("day {n}"),
        (None, Some(d)) => d.clone(),
        (None, None) => String::new(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct FindInput {
    #[serde(default)]
    query: Option<String>,
}

pub(crate) fn find_item(ctx: &ExecutionContext, input: &Value) -> Result<Value, ToolError> {
    let input: FindInput = parse_input(input)?;
    let query = require_text(input.query, "query")?;
    let items: Vec<Value> = ctx
        .find_items_by_query(query.trim())
        .into_iter()
        .map(|hit| {
            json!({
                "dayNum": hit.day_num,
                "id": hit.item.id,
                "title": hit.item.title,
                "status": hit.item.status,
                "chosen": hit.item.chosen,
            })
        })
        .collect();
    Ok(json!({"count": items.len(), "items": items}))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchInput {
    #[serde(default)]
    cat: Option<String>,
    #[serde(default, alias = "dad")]
    dietary_flag_dad: Option<String>,
    #[serde(default, alias = "hiro")]
    dietary_flag_hiro: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "day_num")]
    day_num: Option<u32>,
}

pub(crate) fn search_items(ctx: &ExecutionContext, input: &Value) -> Result<Value, ToolError> {
    let input: SearchInput = parse_input(input)?;
    let cat = input.cat.as_deref().map(parse_category).transpose()?;
    let status = input.status.as_deref().map(parse_status).transpose()?;
    let dad = input
        .dietary_flag_dad
        .as_deref()
        .map(|raw| parse_suitability("dietaryFlagDad", raw))
        .transpose()?;
    let hiro = input
        .dietary_flag_hiro
        .as_deref()
        .map(|raw| parse_suitability("dietaryFlagHiro", raw))
        .transpose()?;

    let items: Vec<Value> = ctx
        .document()
        .items()
        .filter(|(day, _)| input.day_num.is_none_or(|n| day.day_num == n))
        .filter(|(_, item)| cat.as_deref().is_none_or(|c| item.cat == c))
        .filter(|(_, item)| status.as_ref().is_none_or(|s| &item.status == s))
        .filter(|(_, item)| dad.is_none_or(|f| any_option(item, Profile::Dad, f)))
        .filter(|(_, item)| hiro.is_none_or(|f| any_option(item, Profile::Hiro, f)))
        .map(|(day, item)| {
            json!({
                "dayNum": day.day_num,
                "id": item.id,
                "title": item.title,
                "cat": item.cat,
                "status": item.status,
                "chosen": item.chosen,
            })
        })
        .collect();

    Ok(json!({"count": items.len(), "items": items}))
}

fn any_option(item: &Item, profile: Profile, flag: Suitability) -> bool {
    item.options.iter().any(|o| o.flag(profile) == Some(flag))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemRef {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
}

pub(crate) fn get_item_detail(ctx: &ExecutionContext, input: &Value) -> Result<Value, ToolError> {
    let input: ItemRef = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    let (day, item) = ctx.require_item(&id)?;

    let mut out = json!({
        "dayNum": day.day_num,
        "date": day.date,
        "id": item.id,
        "time": item.time,
        "cat": item.cat,
        "title": item.title,
        "status": item.status,
        "chosen": item.chosen,
        "note": item.note,
        "options": item.options,
    });
    if let Some(guide) = &item.guide {
        out["guide"] = guide.clone();
    }
    if let Some(visited) = item.visited {
        out["visited"] = json!(visited);
    }
    if !item.visited_option.is_empty() {
        out["visitedOption"] = json!(item.visited_option);
    }
    if !item.review.is_empty() {
        out["review"] = json!(item.review);
    }
    Ok(out)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    total: usize,
    planned: usize,
    done: usize,
    skipped: usize,
    chosen: usize,
    undecided: usize,
}

impl Tally {
    fn of_day(day: &Day) -> Self {
        let mut t = Tally::default();
        for item in &day.items {
            t.total += 1;
            match item.status {
                ItemStatus::Planned => t.planned += 1,
                ItemStatus::Done => t.done += 1,
                ItemStatus::Skipped => t.skipped += 1,
                ItemStatus::Other(_) => {}
            }
            if !item.chosen.is_empty() {
                t.chosen += 1;
            } else if !item.options.is_empty() {
                t.undecided += 1;
            }
        }
        t
    }

    fn add(&mut self, other: &Tally) {
        self.total += other.total;
        self.planned += other.planned;
        self.done += other.done;
        self.skipped += other.skipped;
        self.chosen += other.chosen;
        self.undecided += other.undecided;
    }

    fn to_json(self) -> Value {
        json!({
            "total": self.total,
            "planned": self.planned,
            "done": self.done,
            "skipped": self.skipped,
            "chosen": self.chosen,
            "withOptionsUnchosen": self.undecided,
        })
    }
}

pub(crate) fn get_trip_summary(ctx: &ExecutionContext, _input: &Value) -> Result<Value, ToolError> {
    let mut totals = Tally::default();
    let mut days = Vec::with_capacity(ctx.document().days.len());
    for day in &ctx.document().days {
        let tally = Tally::of_day(day);
        totals.add(&tally);
        let mut entry = tally.to_json();
        entry["dayNum"] = json!(day.day_num);
        entry["date"] = json!(day.date);
        entry["title"] = json!(day.title);
        days.push(entry);
    }
    Ok(json!({"days": days, "totals": totals.to_json()}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use itinera_testkit::sample_document;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(&sample_document())
    }

    #[test]
    fn schedule_lists_icons_chosen_and_candidates() {
        let out = get_schedule(&ctx(), &json!({"dayNum": 2})).expect("schedule");
        assert_eq!(out["dayNum"], json!(2));
        let lunch = out["items"]
            .as_array()
            .and_then(|items| items.iter().find(|i| i["id"] == json!("d2_lunch")))
            .expect("d2_lunch listed");
        assert_eq!(lunch["icon"], json!("[ ]"));
        assert_eq!(lunch["options"], json!(["복길", "경주어보"]));
    }

    #[test]
    fn schedule_requires_a_key_and_reports_missing_days() {
        let err = get_schedule(&ctx(), &json!({})).expect_err("no key");
        assert_eq!(err, ToolError::MissingField("dayNum"));
        let err = get_schedule(&ctx(), &json!({"day_num": 42})).expect_err("no day");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn find_item_requires_query() {
        let err = find_item(&ctx(), &json!({"query": ""})).expect_err("blank");
        assert_eq!(err, ToolError::MissingField("query"));
        let out = find_item(&ctx(), &json!({"query": "경주어보"})).expect("hit");
        assert_eq!(out["count"], json!(1));
        assert_eq!(out["items"][0]["id"], json!("d2_lunch"));
        assert_eq!(out["items"][0]["dayNum"], json!(2));
    }

    #[test]
    fn search_filters_are_anded() {
        let meals = search_items(&ctx(), &json!({"cat": "meal"})).expect("meals");
        let meals_day2 =
            search_items(&ctx(), &json!({"cat": "meal", "dayNum": 2})).expect("meals day 2");
        assert!(meals["count"].as_u64() >= meals_day2["count"].as_u64());
        for item in meals_day2["items"].as_array().expect("array") {
            assert_eq!(item["dayNum"], json!(2));
            assert_eq!(item["cat"], json!("meal"));
        }
    }

    #[test]
    fn dietary_filter_matches_any_option() {
        let out = search_items(&ctx(), &json!({"hiro": "caution"})).expect("search");
        let ids: Vec<&str> = out["items"]
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|i| i["id"].as_str())
            .collect();
        assert!(ids.contains(&"d2_lunch"));
    }

    #[test]
    fn search_rejects_unknown_enum_values() {
        let err = search_items(&ctx(), &json!({"status": "maybe"})).expect_err("bad");
        assert_eq!(err.kind(), "invalid_value");
        let err = search_items(&ctx(), &json!({"dietaryFlagDad": "bad"})).expect_err("bad");
        assert_eq!(
            err,
            ToolError::invalid_value("dietaryFlagDad", "bad", &["good", "caution"])
        );
    }

    #[test]
    fn item_detail_includes_options_and_guide() {
        let out = get_item_detail(&ctx(), &json!({"itemId": "d2_lunch"})).expect("detail");
        assert_eq!(out["options"][0]["name"], json!("복길"));
        assert_eq!(out["status"], json!("planned"));
        let err = get_item_detail(&ctx(), &json!({"itemId": "nope"})).expect_err("missing");
        assert_eq!(err, ToolError::not_found("item", "nope"));
    }

    #[test]
    fn trip_summary_totals_match_item_count() {
        let c = ctx();
        let out = get_trip_summary(&c, &Value::Null).expect("summary");
        assert_eq!(out["totals"]["total"], json!(c.document().item_count()));
        let per_day: u64 = out["days"]
            .as_array()
            .expect("days")
            .iter()
            .filter_map(|d| d["total"].as_u64())
            .sum();
        assert_eq!(per_day as usize, c.document().item_count());
    }
}

//! Mutating operations.
//!
//! Every handler validates its whole input and resolves every reference
//! before touching the document, so an `Err` always means nothing changed.
//! On success it returns [`Applied`]; the dispatcher then stamps the context
//! exactly once with the note.

use crate::validation::{
    NoteMode, coordinate_pair, parse_category, parse_input, parse_note_mode, parse_status,
    parse_suitability, require, require_text, type_name,
};
use crate::{ExecutionContext, ToolError};
use itinera_core::{Item, ItemOption, ItemStatus, Suitability};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// A successful write: the model-facing result plus the change note.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub output: Value,
    pub note: String,
}

impl Applied {
    fn new(output: Value, note: impl Into<String>) -> Self {
        Self {
            output,
            note: note.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateItemInput {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

pub(crate) fn update_item(ctx: &mut ExecutionContext, input: &Value) -> Result<Applied, ToolError> {
    let input: UpdateItemInput = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    if input.time.is_none() && input.title.is_none() {
        return Err(ToolError::MissingField("time"));
    }
    if input.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ToolError::InvalidInput("title must not be blank".to_string()));
    }

    let item = ctx.require_item_mut(&id)?;
    let mut updated = Vec::new();
    if let Some(time) = input.time {
        item.time = time;
        updated.push("time");
    }
    if let Some(title) = input.title {
        item.title = title;
        updated.push("title");
    }
    Ok(Applied::new(
        json!({
            "ok": true,
            "itemId": id,
            "time": item.time,
            "title": item.title,
            "updatedFields": updated,
        }),
        format!("{id} updated: {}", updated.join(", ")),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStatusInput {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

pub(crate) fn update_status(
    ctx: &mut ExecutionContext,
    input: &Value,
) -> Result<Applied, ToolError> {
    let input: UpdateStatusInput = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    let status = parse_status(&require(input.status, "status")?)?;

    let item = ctx.require_item_mut(&id)?;
    let old = std::mem::replace(&mut item.status, status.clone());
    Ok(Applied::new(
        json!({"ok": true, "itemId": id, "oldStatus": old, "newStatus": status}),
        format!("{id} status: {old} -> {status}"),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateVisitInput {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
    #[serde(default)]
    visited: Option<bool>,
    #[serde(default, alias = "option_name")]
    option_name: Option<String>,
}

pub(crate) fn update_visit(
    ctx: &mut ExecutionContext,
    input: &Value,
) -> Result<Applied, ToolError> {
    let input: UpdateVisitInput = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    let visited = require(input.visited, "visited")?;

    let item = ctx.require_item_mut(&id)?;
    let option = match input.option_name.as_deref().filter(|n| !n.trim().is_empty()) {
        Some(partial) if visited => Some(resolve_option_name(item, partial)?),
        _ => None,
    };

    item.visited = Some(visited);
    if visited {
        if let Some(name) = option {
            item.visited_option = name;
        }
        if item.status == ItemStatus::Planned {
            item.status = ItemStatus::Done;
        }
    } else {
        item.visited_option.clear();
    }

    let note = if visited {
        match item.visited_option.as_str() {
            "" => format!("{id} visited"),
            name => format!("{id} visited: {name}"),
        }
    } else {
        format!("{id} visit cleared")
    };
    Ok(Applied::new(
        json!({
            "ok": true,
            "itemId": id,
            "visited": visited,
            "visitedOption": item.visited_option,
            "status": item.status,
        }),
        note,
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateReviewInput {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
    #[serde(default)]
    review: Option<String>,
}

pub(crate) fn update_review(
    ctx: &mut ExecutionContext,
    input: &Value,
) -> Result<Applied, ToolError> {
    let input: UpdateReviewInput = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    let review = require(input.review, "review")?;

    let item = ctx.require_item_mut(&id)?;
    item.review = review.trim().to_string();
    Ok(Applied::new(
        json!({"ok": true, "itemId": id, "review": item.review}),
        format!("{id} review recorded"),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateNoteInput {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    mode: Option<String>,
}

pub(crate) fn update_note(ctx: &mut ExecutionContext, input: &Value) -> Result<Applied, ToolError> {
    let input: UpdateNoteInput = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    let note = require(input.note, "note")?;
    let mode = parse_note_mode(input.mode.as_deref())?;

    let item = ctx.require_item_mut(&id)?;
    match mode {
        NoteMode::Replace => item.note = note,
        NoteMode::Append if item.note.is_empty() => item.note = note,
        NoteMode::Append => {
            item.note.push('\n');
            item.note.push_str(&note);
        }
    }
    Ok(Applied::new(
        json!({"ok": true, "itemId": id, "mode": mode.as_str(), "note": item.note}),
        format!("{id} note updated ({})", mode.as_str()),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetChosenInput {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
    #[serde(default)]
    chosen: Option<String>,
}

pub(crate) fn set_chosen(ctx: &mut ExecutionContext, input: &Value) -> Result<Applied, ToolError> {
    let input: SetChosenInput = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    let partial = require(input.chosen, "chosen")?;

    let item = ctx.require_item_mut(&id)?;
    if partial.trim().is_empty() {
        item.chosen.clear();
        return Ok(Applied::new(
            json!({"ok": true, "itemId": id, "chosen": ""}),
            format!("{id} choice cleared"),
        ));
    }

    let full = resolve_option_name(item, partial.trim())?;
    item.chosen = full.clone();
    Ok(Applied::new(
        json!({"ok": true, "itemId": id, "chosen": full}),
        format!("{id} chosen: {full}"),
    ))
}

fn resolve_option_name(item: &Item, partial: &str) -> Result<String, ToolError> {
    ExecutionContext::find_option(item, partial)
        .map(|o| o.name.clone())
        .ok_or_else(|| ToolError::option_not_found(partial, item.option_names()))
}

/// Keys `update_option` may write, in their canonical spelling.
pub const OPTION_FIELDS: [&str; 11] = [
    "menu",
    "dietaryFlagDad",
    "dietaryFlagHiro",
    "dietaryNote",
    "hours",
    "address",
    "phone",
    "photo",
    "tags",
    "lat",
    "lng",
];

fn canonical_option_field(key: &str) -> Option<&'static str> {
    match key {
        "dad" => Some("dietaryFlagDad"),
        "hiro" => Some("dietaryFlagHiro"),
        "hiroNote" => Some("dietaryNote"),
        "photo_url" | "photoUrl" => Some("photo"),
        other => OPTION_FIELDS.iter().copied().find(|f| *f == other),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum OptionPatch {
    Menu(String),
    DietaryFlagDad(Suitability),
    DietaryFlagHiro(Suitability),
    DietaryNote(String),
    Hours(String),
    Address(String),
    Phone(String),
    Photo(String),
    Tags(Vec<String>),
    Coordinates(f64, f64),
}

impl OptionPatch {
    fn apply(self, option: &mut ItemOption) {
        match self {
            OptionPatch::Menu(v) => option.menu = Some(v),
            OptionPatch::DietaryFlagDad(v) => option.dietary_flag_dad = Some(v),
            OptionPatch::DietaryFlagHiro(v) => option.dietary_flag_hiro = Some(v),
            OptionPatch::DietaryNote(v) => option.dietary_note = Some(v),
            OptionPatch::Hours(v) => option.hours = Some(v),
            OptionPatch::Address(v) => option.address = Some(v),
            OptionPatch::Phone(v) => option.phone = Some(v),
            OptionPatch::Photo(v) => option.photo = Some(v),
            OptionPatch::Tags(v) => option.tags = v,
            OptionPatch::Coordinates(lat, lng) => {
                option.lat = Some(lat);
                option.lng = Some(lng);
            }
        }
    }
}

fn text_field(field: &str, value: &Value) -> Result<String, ToolError> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        ToolError::InvalidInput(format!("'{field}' must be a string, got {}", type_name(value)))
    })
}

fn number_field(field: &str, value: &Value) -> Result<f64, ToolError> {
    value.as_f64().ok_or_else(|| {
        ToolError::InvalidInput(format!("'{field}' must be a number, got {}", type_name(value)))
    })
}

fn tags_field(value: &Value) -> Result<Vec<String>, ToolError> {
    let invalid = || ToolError::InvalidInput("'tags' must be an array of strings".to_string());
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|t| t.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// Validate every key of `fields` up front. Returns the patches to apply and
/// the canonical names they touch, in the map's key order. A legacy alias
/// together with its canonical key is rejected.
fn plan_option_patches(
    fields: &Map<String, Value>,
) -> Result<(Vec<OptionPatch>, Vec<&'static str>), ToolError> {
    if fields.is_empty() {
        return Err(ToolError::InvalidInput(
            "'fields' must name at least one field".to_string(),
        ));
    }

    let mut patches = Vec::new();
    let mut names = Vec::new();
    let mut lat = None;
    let mut lng = None;
    for (key, value) in fields {
        let field = canonical_option_field(key).ok_or_else(|| ToolError::UnknownField {
            field: key.clone(),
            allowed: OPTION_FIELDS.iter().map(|f| f.to_string()).collect(),
        })?;
        if names.contains(&field) {
            return Err(ToolError::InvalidInput(format!(
                "'{key}' sets '{field}', which is already given"
            )));
        }
        let patch = match field {
            "menu" => OptionPatch::Menu(text_field(field, value)?),
            "dietaryFlagDad" => {
                OptionPatch::DietaryFlagDad(parse_suitability(field, &text_field(field, value)?)?)
            }
            "dietaryFlagHiro" => {
                OptionPatch::DietaryFlagHiro(parse_suitability(field, &text_field(field, value)?)?)
            }
            "dietaryNote" => OptionPatch::DietaryNote(text_field(field, value)?),
            "hours" => OptionPatch::Hours(text_field(field, value)?),
            "address" => OptionPatch::Address(text_field(field, value)?),
            "phone" => OptionPatch::Phone(text_field(field, value)?),
            "photo" => OptionPatch::Photo(text_field(field, value)?),
            "tags" => OptionPatch::Tags(tags_field(value)?),
            "lat" | "lng" => {
                let n = number_field(field, value)?;
                if field == "lat" {
                    lat = Some(n);
                } else {
                    lng = Some(n);
                }
                names.push(field);
                continue;
            }
            other => {
                return Err(ToolError::UnknownField {
                    field: other.to_string(),
                    allowed: OPTION_FIELDS.iter().map(|f| f.to_string()).collect(),
                });
            }
        };
        patches.push(patch);
        names.push(field);
    }
    if let Some((lat, lng)) = coordinate_pair(lat, lng)? {
        patches.push(OptionPatch::Coordinates(lat, lng));
    }
    Ok((patches, names))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateOptionInput {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
    #[serde(default, alias = "option_name")]
    option_name: Option<String>,
    #[serde(default)]
    fields: Option<Map<String, Value>>,
}

pub(crate) fn update_option(
    ctx: &mut ExecutionContext,
    input: &Value,
) -> Result<Applied, ToolError> {
    let input: UpdateOptionInput = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    let partial = require_text(input.option_name, "optionName")?;
    let fields = require(input.fields, "fields")?;

    let item = ctx.require_item_mut(&id)?;
    let index = item
        .option_position(partial.trim())
        .ok_or_else(|| ToolError::option_not_found(partial.trim(), item.option_names()))?;
    let (patches, updated) = plan_option_patches(&fields)?;

    let option = &mut item.options[index];
    for patch in patches {
        patch.apply(option);
    }
    let name = option.name.clone();
    Ok(Applied::new(
        json!({"ok": true, "itemId": id, "option": name, "updatedFields": updated}),
        format!("{id} option '{name}' updated: {}", updated.join(", ")),
    ))
}

/// Option payload shared by `add_item.options[]` and `add_option`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionInput {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    menu: Option<String>,
    #[serde(default, alias = "dad")]
    dietary_flag_dad: Option<String>,
    #[serde(default, alias = "hiro")]
    dietary_flag_hiro: Option<String>,
    #[serde(default, alias = "hiroNote")]
    dietary_note: Option<String>,
    #[serde(default)]
    hours: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default, alias = "photo_url")]
    photo: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lng: Option<f64>,
}

impl OptionInput {
    fn into_option(self) -> Result<ItemOption, ToolError> {
        let name = require_text(self.name, "name")?;
        let dietary_flag_dad = self
            .dietary_flag_dad
            .as_deref()
            .map(|raw| parse_suitability("dietaryFlagDad", raw))
            .transpose()?;
        let dietary_flag_hiro = self
            .dietary_flag_hiro
            .as_deref()
            .map(|raw| parse_suitability("dietaryFlagHiro", raw))
            .transpose()?;
        let coords = coordinate_pair(self.lat, self.lng)?;
        Ok(ItemOption {
            name: name.trim().to_string(),
            menu: self.menu,
            dietary_flag_dad,
            dietary_flag_hiro,
            dietary_note: self.dietary_note,
            hours: self.hours,
            address: self.address,
            phone: self.phone,
            photo: self.photo,
            tags: self.tags,
            lat: coords.map(|c| c.0),
            lng: coords.map(|c| c.1),
            extra: Default::default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItemInput {
    #[serde(default, alias = "day_num")]
    day_num: Option<u32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    cat: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default, alias = "after_item_id")]
    after_item_id: Option<String>,
    #[serde(default)]
    options: Vec<OptionInput>,
}

/// Insertion point in a day: right after `anchor`, or the end.
fn insertion_index(
    ctx: &ExecutionContext,
    day_index: usize,
    anchor: Option<&str>,
) -> Result<usize, ToolError> {
    let day = &ctx.document().days[day_index];
    match anchor.filter(|a| !a.trim().is_empty()) {
        Some(anchor) => day
            .item_position(anchor)
            .map(|i| i + 1)
            .ok_or_else(|| ToolError::not_found("anchor item", anchor)),
        None => Ok(day.items.len()),
    }
}

pub(crate) fn add_item(ctx: &mut ExecutionContext, input: &Value) -> Result<Applied, ToolError> {
    let input: AddItemInput = parse_input(input)?;
    let day_num = require(input.day_num, "dayNum")?;
    let title = require_text(input.title, "title")?;
    let cat = parse_category(input.cat.as_deref().unwrap_or("activity"))?;
    let options = input
        .options
        .into_iter()
        .map(OptionInput::into_option)
        .collect::<Result<Vec<_>, _>>()?;

    let day_index = ctx.require_day_index(day_num)?;
    let at = insertion_index(ctx, day_index, input.after_item_id.as_deref())?;

    let mut n = ctx.document().days[day_index].items.len() + 1;
    let mut id = format!("d{day_num}_item{n}");
    while ctx.document().contains_item_id(&id) {
        n += 1;
        id = format!("d{day_num}_item{n}");
    }

    let mut item = Item::new(id.clone(), title.trim(), cat);
    item.time = input.time.unwrap_or_default();
    item.options = options;
    ctx.day_mut(day_index).items.insert(at, item);

    Ok(Applied::new(
        json!({"ok": true, "itemId": id, "dayNum": day_num, "title": title.trim(), "position": at}),
        format!("item added: {id} ({})", title.trim()),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddOptionInput {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
    #[serde(flatten)]
    option: OptionInput,
}

pub(crate) fn add_option(ctx: &mut ExecutionContext, input: &Value) -> Result<Applied, ToolError> {
    let input: AddOptionInput = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    let option = input.option.into_option()?;

    let item = ctx.require_item_mut(&id)?;
    let name = option.name.clone();
    item.options.push(option);
    Ok(Applied::new(
        json!({"ok": true, "itemId": id, "optionName": name, "optionCount": item.options.len()}),
        format!("{id} option added: {name}"),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveItemInput {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
    #[serde(default, alias = "to_day_num")]
    to_day_num: Option<u32>,
    #[serde(default, alias = "new_time")]
    new_time: Option<String>,
    #[serde(default, alias = "after_item_id")]
    after_item_id: Option<String>,
}

/// Destination id: swap a `d{src}_` prefix for `d{dst}_`, or prefix the whole
/// old id. Collisions with other items get `_2`, `_3`, ...
fn moved_id(ctx: &ExecutionContext, old_id: &str, src_day: u32, dst_day: u32) -> String {
    let src_prefix = format!("d{src_day}_");
    let base = match old_id.strip_prefix(&src_prefix) {
        Some(suffix) => format!("d{dst_day}_{suffix}"),
        None => format!("d{dst_day}_{old_id}"),
    };
    let taken = |candidate: &str| candidate != old_id && ctx.document().contains_item_id(candidate);
    if !taken(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

pub(crate) fn move_item(ctx: &mut ExecutionContext, input: &Value) -> Result<Applied, ToolError> {
    let input: MoveItemInput = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    let to_day = require(input.to_day_num, "toDayNum")?;

    let (src_index, item_index) = ctx
        .locate_item(&id)
        .ok_or_else(|| ToolError::not_found("item", id.as_str()))?;
    let dst_index = ctx.require_day_index(to_day)?;
    let anchor = input.after_item_id.as_deref().filter(|a| !a.trim().is_empty());
    if anchor == Some(id.as_str()) {
        return Err(ToolError::InvalidInput(
            "afterItemId must differ from itemId".to_string(),
        ));
    }
    // Validate the anchor against the destination before anything moves.
    insertion_index(ctx, dst_index, anchor)?;

    let src_day = ctx.document().days[src_index].day_num;
    let new_id = moved_id(ctx, &id, src_day, to_day);

    let mut item = ctx.day_mut(src_index).items.remove(item_index);
    item.id = new_id.clone();
    if let Some(time) = input.new_time {
        item.time = time;
    }
    let at = insertion_index(ctx, dst_index, anchor)?;
    ctx.day_mut(dst_index).items.insert(at, item);

    Ok(Applied::new(
        json!({"ok": true, "oldId": id, "newId": new_id, "fromDayNum": src_day, "toDayNum": to_day}),
        format!("item moved: {id} -> Day {to_day} ({new_id})"),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveItemInput {
    #[serde(default, alias = "item_id")]
    item_id: Option<String>,
}

pub(crate) fn remove_item(ctx: &mut ExecutionContext, input: &Value) -> Result<Applied, ToolError> {
    let input: RemoveItemInput = parse_input(input)?;
    let id = require_text(input.item_id, "itemId")?;
    let (d, i) = ctx
        .locate_item(&id)
        .ok_or_else(|| ToolError::not_found("item", id.as_str()))?;
    let removed = ctx.day_mut(d).items.remove(i);
    Ok(Applied::new(
        json!({"ok": true, "itemId": id, "title": removed.title}),
        format!("item removed: {id} ({})", removed.title),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use itinera_testkit::sample_document;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(&sample_document())
    }

    fn item<'a>(ctx: &'a ExecutionContext, id: &str) -> &'a Item {
        ctx.find_item(id).map(|(_, item)| item).expect("item present")
    }

    #[test]
    fn update_status_changes_only_the_target() {
        let mut c = ctx();
        let before = c.document().clone();
        let applied = update_status(&mut c, &json!({"itemId": "d2_lunch", "status": "done"}))
            .expect("update");
        assert_eq!(applied.output["oldStatus"], json!("planned"));
        assert_eq!(applied.output["newStatus"], json!("done"));
        assert_eq!(item(&c, "d2_lunch").status, ItemStatus::Done);
        for (day, other) in before.items() {
            if other.id != "d2_lunch" {
                let now = c.find_item(&other.id).map(|(d, i)| (d.day_num, i.clone()));
                assert_eq!(now, Some((day.day_num, other.clone())));
            }
        }
    }

    #[test]
    fn update_status_rejects_bad_value_without_mutation() {
        let mut c = ctx();
        let err = update_status(&mut c, &json!({"itemId": "d2_lunch", "status": "gone"}))
            .expect_err("invalid");
        assert_eq!(err.kind(), "invalid_value");
        assert_eq!(item(&c, "d2_lunch").status, ItemStatus::Planned);
    }

    #[test]
    fn set_chosen_stores_full_option_name() {
        let mut c = ctx();
        let applied =
            set_chosen(&mut c, &json!({"itemId": "d2_lunch", "chosen": "어보"})).expect("chosen");
        assert_eq!(applied.output["chosen"], json!("경주어보"));
        assert_eq!(item(&c, "d2_lunch").chosen, "경주어보");
    }

    #[test]
    fn set_chosen_without_match_lists_every_option() {
        let mut c = ctx();
        let err = set_chosen(&mut c, &json!({"item_id": "d2_lunch", "chosen": "없는집"}))
            .expect_err("no match");
        assert_eq!(
            err,
            ToolError::option_not_found("없는집", vec!["복길".into(), "경주어보".into()])
        );
        assert!(item(&c, "d2_lunch").chosen.is_empty());
    }

    #[test]
    fn set_chosen_with_empty_value_clears() {
        let mut c = ctx();
        set_chosen(&mut c, &json!({"itemId": "d2_lunch", "chosen": "복길"})).expect("set");
        set_chosen(&mut c, &json!({"itemId": "d2_lunch", "chosen": ""})).expect("clear");
        assert!(item(&c, "d2_lunch").chosen.is_empty());
    }

    #[test]
    fn update_note_appends_with_newline_then_replaces() {
        let mut c = ctx();
        update_note(&mut c, &json!({"itemId": "d2_lunch", "note": "first"})).expect("first");
        update_note(&mut c, &json!({"itemId": "d2_lunch", "note": "second"})).expect("second");
        assert_eq!(item(&c, "d2_lunch").note, "first\nsecond");
        update_note(
            &mut c,
            &json!({"itemId": "d2_lunch", "note": "only", "mode": "replace"}),
        )
        .expect("replace");
        assert_eq!(item(&c, "d2_lunch").note, "only");
        let err = update_note(
            &mut c,
            &json!({"itemId": "d2_lunch", "note": "x", "mode": "prepend"}),
        )
        .expect_err("bad mode");
        assert_eq!(err.kind(), "invalid_value");
    }

    #[test]
    fn update_option_sets_dietary_flag() {
        let mut c = ctx();
        let applied = update_option(
            &mut c,
            &json!({"itemId": "d2_lunch", "optionName": "복길", "fields": {"dietaryFlagDad": "caution"}}),
        )
        .expect("update");
        assert_eq!(
            applied.output,
            json!({"ok": true, "itemId": "d2_lunch", "option": "복길", "updatedFields": ["dietaryFlagDad"]})
        );
        assert_eq!(
            item(&c, "d2_lunch").options[0].dietary_flag_dad,
            Some(Suitability::Caution)
        );
    }

    #[test]
    fn update_option_is_all_or_nothing() {
        let mut c = ctx();
        let err = update_option(
            &mut c,
            &json!({"itemId": "d2_lunch", "optionName": "복길",
                    "fields": {"menu": "비빔밥", "price": 9000}}),
        )
        .expect_err("unknown field");
        match err {
            ToolError::UnknownField { field, allowed } => {
                assert_eq!(field, "price");
                assert!(allowed.contains(&"menu".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_ne!(item(&c, "d2_lunch").options[0].menu.as_deref(), Some("비빔밥"));
    }

    #[test]
    fn update_option_reports_every_field_and_rejects_alias_collisions() {
        let mut c = ctx();
        let applied = update_option(
            &mut c,
            &json!({"itemId": "d2_lunch", "optionName": "복길",
                    "fields": {"menu": "비빔밥", "dietaryFlagDad": "caution", "hours": "11-21"}}),
        )
        .expect("update");
        assert_eq!(
            applied.output["updatedFields"],
            json!(["dietaryFlagDad", "hours", "menu"])
        );

        let before = c.document().clone();
        let err = update_option(
            &mut c,
            &json!({"itemId": "d2_lunch", "optionName": "복길",
                    "fields": {"menu": "x", "dietaryFlagDad": "good", "dad": "caution"}}),
        )
        .expect_err("alias collision");
        assert_eq!(err.kind(), "invalid_input");
        assert_eq!(c.document(), &before);
    }

    #[test]
    fn update_option_accepts_legacy_keys_and_paired_coordinates() {
        let mut c = ctx();
        let applied = update_option(
            &mut c,
            &json!({"item_id": "d2_lunch", "option_name": "경주",
                    "fields": {"hiro": "good", "lat": 35.84, "lng": 129.22, "tags": ["한식"]}}),
        )
        .expect("update");
        assert_eq!(applied.output["option"], json!("경주어보"));
        let opt = &item(&c, "d2_lunch").options[1];
        assert_eq!(opt.dietary_flag_hiro, Some(Suitability::Good));
        assert_eq!(opt.coordinates(), Some((35.84, 129.22)));
        assert_eq!(opt.tags, vec!["한식".to_string()]);

        let err = update_option(
            &mut c,
            &json!({"itemId": "d2_lunch", "optionName": "경주", "fields": {"lat": 1.0}}),
        )
        .expect_err("half pair");
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn add_item_generates_next_sequential_id() {
        let mut c = ctx();
        let day = c.find_day(Some(1), None).expect("day 1");
        let expected = format!("d1_item{}", day.items.len() + 1);
        let applied = add_item(
            &mut c,
            &json!({"dayNum": 1, "title": "산책", "cat": "activity",
                    "options": [{"name": "대릉원", "dad": "good"}]}),
        )
        .expect("add");
        assert_eq!(applied.output["itemId"], json!(expected));
        let added = item(&c, &expected);
        assert_eq!(added.status, ItemStatus::Planned);
        assert_eq!(added.options[0].dietary_flag_dad, Some(Suitability::Good));
    }

    #[test]
    fn add_item_inserts_after_anchor() {
        let mut c = ctx();
        let first = c.document().days[0].items[0].id.clone();
        let applied = add_item(
            &mut c,
            &json!({"dayNum": 1, "title": "휴식", "cat": "cafe", "afterItemId": first}),
        )
        .expect("add");
        let new_id = applied.output["itemId"].as_str().expect("id").to_string();
        assert_eq!(c.document().days[0].items[1].id, new_id);
    }

    #[test]
    fn add_item_with_unknown_anchor_changes_nothing() {
        let mut c = ctx();
        let before = c.document().clone();
        let err = add_item(
            &mut c,
            &json!({"dayNum": 1, "title": "x", "cat": "meal", "afterItemId": "ghost"}),
        )
        .expect_err("anchor");
        assert_eq!(err, ToolError::not_found("anchor item", "ghost"));
        assert_eq!(c.document(), &before);
    }

    #[test]
    fn add_item_rejects_unknown_category() {
        let mut c = ctx();
        let err = add_item(&mut c, &json!({"dayNum": 1, "title": "x", "cat": "hotel"}))
            .expect_err("cat");
        assert_eq!(err.kind(), "invalid_value");
    }

    #[test]
    fn add_option_then_visit_by_partial_name() {
        let mut c = ctx();
        add_option(
            &mut c,
            &json!({"itemId": "d2_lunch", "name": "교리김밥", "hiroNote": "계란 지단"}),
        )
        .expect("add option");
        let applied = update_visit(
            &mut c,
            &json!({"itemId": "d2_lunch", "visited": true, "optionName": "김밥"}),
        )
        .expect("visit");
        assert_eq!(applied.output["visitedOption"], json!("교리김밥"));
        let lunch = item(&c, "d2_lunch");
        assert_eq!(lunch.status, ItemStatus::Done);
        assert_eq!(lunch.options[2].dietary_note.as_deref(), Some("계란 지단"));
    }

    #[test]
    fn clearing_a_visit_keeps_status() {
        let mut c = ctx();
        update_visit(&mut c, &json!({"itemId": "d2_lunch", "visited": true, "optionName": "복길"}))
            .expect("visit");
        update_visit(&mut c, &json!({"itemId": "d2_lunch", "visited": false})).expect("undo");
        let lunch = item(&c, "d2_lunch");
        assert_eq!(lunch.visited, Some(false));
        assert!(lunch.visited_option.is_empty());
        assert_eq!(lunch.status, ItemStatus::Done);
    }

    #[test]
    fn move_item_reprefixes_id_and_shifts_counts() {
        let mut c = ctx();
        let src_before = c.find_day(Some(1), None).expect("day 1").items.len();
        let dst_before = c.find_day(Some(3), None).expect("day 3").items.len();
        let applied = move_item(
            &mut c,
            &json!({"itemId": "d1_foo", "toDayNum": 3, "newTime": "15:00"}),
        )
        .expect("move");
        assert_eq!(applied.output["newId"], json!("d3_foo"));
        assert_eq!(c.find_day(Some(1), None).expect("day 1").items.len(), src_before - 1);
        assert_eq!(c.find_day(Some(3), None).expect("day 3").items.len(), dst_before + 1);
        let moved = item(&c, "d3_foo");
        assert_eq!(moved.time, "15:00");
        assert_eq!(
            c.document().days[2].items.last().map(|i| i.id.as_str()),
            Some("d3_foo")
        );
    }

    #[test]
    fn move_item_suffixes_colliding_ids() {
        let mut c = ctx();
        let d3 = c.require_day_index(3).expect("day 3");
        c.day_mut(d3).items.push(Item::new("d3_foo", "already here", "activity"));
        let applied = move_item(&mut c, &json!({"itemId": "d1_foo", "toDayNum": 3})).expect("move");
        assert_eq!(applied.output["newId"], json!("d3_foo_2"));
        assert_eq!(c.document().validate(), Vec::new());
    }

    #[test]
    fn move_item_prefixes_unconventional_ids() {
        let mut c = ctx();
        let (d, i) = c.locate_item("d1_foo").expect("foo");
        c.day_mut(d).items[i].id = "legacy".to_string();
        let applied = move_item(&mut c, &json!({"itemId": "legacy", "toDayNum": 2})).expect("move");
        assert_eq!(applied.output["newId"], json!("d2_legacy"));
    }

    #[test]
    fn move_item_to_unknown_day_or_anchor_is_rejected() {
        let mut c = ctx();
        let before = c.document().clone();
        let err = move_item(&mut c, &json!({"itemId": "d1_foo", "toDayNum": 99})).expect_err("day");
        assert_eq!(err.kind(), "not_found");
        let err = move_item(
            &mut c,
            &json!({"itemId": "d1_foo", "toDayNum": 3, "afterItemId": "ghost"}),
        )
        .expect_err("anchor");
        assert_eq!(err.kind(), "not_found");
        assert_eq!(c.document(), &before);
    }

    #[test]
    fn remove_item_returns_title() {
        let mut c = ctx();
        let title = item(&c, "d2_lunch").title.clone();
        let applied = remove_item(&mut c, &json!({"itemId": "d2_lunch"})).expect("remove");
        assert_eq!(applied.output["title"], json!(title));
        assert!(c.find_item("d2_lunch").is_none());
    }

    #[test]
    fn update_item_requires_a_field() {
        let mut c = ctx();
        let err = update_item(&mut c, &json!({"itemId": "d2_lunch"})).expect_err("nothing");
        assert_eq!(err.kind(), "missing_field");
        let applied = update_item(&mut c, &json!({"itemId": "d2_lunch", "time": "12:30"}))
            .expect("update");
        assert_eq!(applied.output["updatedFields"], json!(["time"]));
        assert_eq!(item(&c, "d2_lunch").time, "12:30");
    }

    #[test]
    fn update_review_trims() {
        let mut c = ctx();
        update_review(&mut c, &json!({"itemId": "d2_lunch", "review": "  맛있었다 "}))
            .expect("review");
        assert_eq!(item(&c, "d2_lunch").review, "맛있었다");
    }
}

//! Input schemas for the tool catalog, in the shape the Messages API expects.

use itinera_core::ToolDefinition;
use serde_json::{Value, json};

fn def(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn item_id() -> Value {
    json!({"type": "string", "description": "Item id, e.g. d1_dinner"})
}

fn suitability(who: &str) -> Value {
    json!({
        "type": "string",
        "enum": ["good", "caution"],
        "description": format!("Dietary suitability for {who}")
    })
}

fn option_properties() -> Value {
    json!({
        "name": {"type": "string", "description": "Option name"},
        "menu": {"type": "string", "description": "Signature menu"},
        "dietaryFlagDad": suitability("Dad (diabetes)"),
        "dietaryFlagHiro": suitability("Hiro (wheat/egg allergy)"),
        "dietaryNote": {"type": "string", "description": "Allergy note for Hiro"},
        "hours": {"type": "string", "description": "Opening hours"},
        "address": {"type": "string", "description": "Street address"},
        "phone": {"type": "string", "description": "Phone number"},
        "photo": {"type": "string", "description": "Photo URL"},
        "tags": {"type": "array", "items": {"type": "string"}, "description": "Tags"},
        "lat": {"type": "number", "description": "Latitude; give together with lng"},
        "lng": {"type": "number", "description": "Longitude; give together with lat"}
    })
}

/// Every operation's definition, in catalog order.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    let mut option_fields = option_properties();
    if let Some(map) = option_fields.as_object_mut() {
        map.remove("name");
    }
    let mut add_option_props = option_properties();
    if let Some(map) = add_option_props.as_object_mut() {
        map.insert("itemId".to_string(), item_id());
    }

    vec![
        def(
            "get_schedule",
            "Show one day's full schedule. Provide dayNum or date (at least one).",
            json!({
                "type": "object",
                "properties": {
                    "dayNum": {"type": "integer", "description": "Day number"},
                    "date": {"type": "string", "description": "Date (YYYY-MM-DD)"}
                },
                "required": []
            }),
        ),
        def(
            "find_item",
            "Search items by keyword. Matches item titles and option names by \
             case-insensitive substring.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Keyword"}
                },
                "required": ["query"]
            }),
        ),
        def(
            "search_items",
            "Filter items. All given conditions are combined with AND. A dietary \
             filter matches when any option of the item carries that flag.",
            json!({
                "type": "object",
                "properties": {
                    "cat": {"type": "string", "enum": ["meal", "cafe", "activity"]},
                    "dietaryFlagDad": suitability("Dad (diabetes)"),
                    "dietaryFlagHiro": suitability("Hiro (wheat/egg allergy)"),
                    "status": {"type": "string", "enum": ["planned", "done", "skipped"]},
                    "dayNum": {"type": "integer", "description": "Day number"}
                },
                "required": []
            }),
        ),
        def(
            "get_item_detail",
            "Show one item in full, including options and guide.",
            json!({
                "type": "object",
                "properties": {"itemId": item_id()},
                "required": ["itemId"]
            }),
        ),
        def(
            "get_trip_summary",
            "Trip-wide statistics: planned/done/skipped counts, chosen counts and \
             items still waiting for a choice, per day and in total.",
            json!({"type": "object", "properties": {}, "required": []}),
        ),
        def(
            "update_item",
            "Change an item's time and/or title.",
            json!({
                "type": "object",
                "properties": {
                    "itemId": item_id(),
                    "time": {"type": "string", "description": "New time label, e.g. \"14:00~16:00\""},
                    "title": {"type": "string", "description": "New title"}
                },
                "required": ["itemId"]
            }),
        ),
        def(
            "update_status",
            "Change an item's status.",
            json!({
                "type": "object",
                "properties": {
                    "itemId": item_id(),
                    "status": {"type": "string", "enum": ["planned", "done", "skipped"]}
                },
                "required": ["itemId", "status"]
            }),
        ),
        def(
            "update_visit",
            "Record whether a place was visited and, for items with options, which \
             option. A planned item becomes done when marked visited.",
            json!({
                "type": "object",
                "properties": {
                    "itemId": item_id(),
                    "visited": {"type": "boolean", "description": "true: visited, false: undo"},
                    "optionName": {"type": "string", "description": "Visited option (partial name allowed)"}
                },
                "required": ["itemId", "visited"]
            }),
        ),
        def(
            "update_review",
            "Record a one-line review of a place.",
            json!({
                "type": "object",
                "properties": {
                    "itemId": item_id(),
                    "review": {"type": "string", "description": "One-line review"}
                },
                "required": ["itemId", "review"]
            }),
        ),
        def(
            "update_note",
            "Append to or replace an item's note.",
            json!({
                "type": "object",
                "properties": {
                    "itemId": item_id(),
                    "note": {"type": "string", "description": "Note text"},
                    "mode": {"type": "string", "enum": ["append", "replace"], "description": "Default: append"}
                },
                "required": ["itemId", "note"]
            }),
        ),
        def(
            "set_chosen",
            "Confirm which option of an item was chosen. Partial names are resolved \
             to the first option containing them. An empty value clears the choice.",
            json!({
                "type": "object",
                "properties": {
                    "itemId": item_id(),
                    "chosen": {"type": "string", "description": "Option name (partial allowed)"}
                },
                "required": ["itemId", "chosen"]
            }),
        ),
        def(
            "update_option",
            "Edit fields of one option. The option is found by partial name. \
             Unknown field names are rejected and nothing is written.",
            json!({
                "type": "object",
                "properties": {
                    "itemId": item_id(),
                    "optionName": {"type": "string", "description": "Option name (partial allowed)"},
                    "fields": {
                        "type": "object",
                        "description": "Fields to overwrite",
                        "properties": option_fields
                    }
                },
                "required": ["itemId", "optionName", "fields"]
            }),
        ),
        def(
            "add_item",
            "Add a schedule item to a day. With afterItemId it is inserted after that \
             item, otherwise appended at the end of the day.",
            json!({
                "type": "object",
                "properties": {
                    "dayNum": {"type": "integer", "description": "Day number"},
                    "title": {"type": "string", "description": "Item title"},
                    "cat": {"type": "string", "enum": ["meal", "cafe", "activity"]},
                    "time": {"type": "string", "description": "Time label, e.g. \"14:00~\""},
                    "afterItemId": {"type": "string", "description": "Insert after this item"},
                    "options": {
                        "type": "array",
                        "description": "Initial options",
                        "items": {
                            "type": "object",
                            "properties": option_properties(),
                            "required": ["name"]
                        }
                    }
                },
                "required": ["dayNum", "title", "cat"]
            }),
        ),
        def(
            "add_option",
            "Append a new option to an existing item.",
            json!({
                "type": "object",
                "properties": add_option_props,
                "required": ["itemId", "name"]
            }),
        ),
        def(
            "move_item",
            "Move an item to another day. Its id is re-prefixed for the new day. With \
             afterItemId it is inserted after that item, otherwise appended.",
            json!({
                "type": "object",
                "properties": {
                    "itemId": item_id(),
                    "toDayNum": {"type": "integer", "description": "Destination day number"},
                    "newTime": {"type": "string", "description": "New time label"},
                    "afterItemId": {"type": "string", "description": "Insert after this item"}
                },
                "required": ["itemId", "toDayNum"]
            }),
        ),
        def(
            "remove_item",
            "Delete an item permanently.",
            json!({
                "type": "object",
                "properties": {"itemId": item_id()},
                "required": ["itemId"]
            }),
        ),
    ]
}

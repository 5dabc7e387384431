//! Itinerary document model: trip → days → items → options.
//!
//! The wire format is the camelCase JSON kept by the document store. Every
//! level carries a flattened `extra` map so keys this crate does not model
//! survive a read/modify/write cycle untouched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Unmodelled keys carried through verbatim.
pub type Extra = Map<String, Value>;

pub const CATEGORIES: [&str; 3] = ["meal", "cafe", "activity"];

/// Progress of an item. A stored value outside the known set is kept as
/// [`ItemStatus::Other`] and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemStatus {
    #[default]
    Planned,
    Done,
    Skipped,
    Other(String),
}

impl ItemStatus {
    pub const NAMES: [&'static str; 3] = ["planned", "done", "skipped"];

    pub fn as_str(&self) -> &str {
        match self {
            ItemStatus::Planned => "planned",
            ItemStatus::Done => "done",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Other(raw) => raw,
        }
    }

    /// Only the known values; tools never write an unknown status.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "planned" => Some(ItemStatus::Planned),
            "done" => Some(ItemStatus::Done),
            "skipped" => Some(ItemStatus::Skipped),
            _ => None,
        }
    }

    /// Checkbox-style marker used in schedule listings.
    pub fn icon(&self) -> &'static str {
        match self {
            ItemStatus::Planned => "[ ]",
            ItemStatus::Done => "[v]",
            ItemStatus::Skipped => "[x]",
            ItemStatus::Other(_) => "[?]",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::NAMES.to_vec()
    }
}

impl From<String> for ItemStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw).unwrap_or(ItemStatus::Other(raw))
    }
}

impl From<ItemStatus> for String {
    fn from(status: ItemStatus) -> Self {
        match status {
            ItemStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dietary suitability of an option for one family member profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suitability {
    Good,
    Caution,
}

impl Suitability {
    pub const ALL: [Suitability; 2] = [Suitability::Good, Suitability::Caution];

    pub fn as_str(&self) -> &'static str {
        match self {
            Suitability::Good => "good",
            Suitability::Caution => "caution",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Suitability::as_str).collect()
    }
}

/// The two profiles that carry a dietary flag on every option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Diabetes management.
    Dad,
    /// Wheat/egg allergy.
    Hiro,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_note: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub days: Vec<Day>,
    /// Contacts, shopping lists, distances. Opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Day {
    pub day_num: u32,
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dow: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub time: String,
    #[serde(default = "default_category")]
    pub cat: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub chosen: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub options: Vec<ItemOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guide: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visited: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub visited_option: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub review: String,
    #[serde(flatten)]
    pub extra: Extra,
}

fn default_category() -> String {
    "activity".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<String>,
    #[serde(default, alias = "dad", skip_serializing_if = "Option::is_none")]
    pub dietary_flag_dad: Option<Suitability>,
    #[serde(default, alias = "hiro", skip_serializing_if = "Option::is_none")]
    pub dietary_flag_hiro: Option<Suitability>,
    #[serde(default, alias = "hiroNote", skip_serializing_if = "Option::is_none")]
    pub dietary_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, alias = "photo_url", skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ItemOption {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn flag(&self, profile: Profile) -> Option<Suitability> {
        match profile {
            Profile::Dad => self.dietary_flag_dad,
            Profile::Hiro => self.dietary_flag_hiro,
        }
    }

    /// Latitude/longitude pair, only when both halves are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lng)
    }
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>, cat: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            time: String::new(),
            cat: cat.into(),
            title: title.into(),
            status: ItemStatus::Planned,
            chosen: String::new(),
            note: String::new(),
            options: Vec::new(),
            guide: None,
            visited: None,
            visited_option: String::new(),
            review: String::new(),
            extra: Extra::new(),
        }
    }

    pub fn option_names(&self) -> Vec<String> {
        self.options.iter().map(|o| o.name.clone()).collect()
    }

    /// Index of the first option whose name contains `partial`,
    /// compared case-insensitively. List order decides; there is no ranking.
    pub fn option_position(&self, partial: &str) -> Option<usize> {
        let needle = partial.to_lowercase();
        self.options
            .iter()
            .position(|o| o.name.to_lowercase().contains(&needle))
    }

    pub fn has_option_named(&self, name: &str) -> bool {
        self.options.iter().any(|o| o.name == name)
    }

    /// True when the title or any option name contains `needle_lower`.
    pub fn matches_query(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self
                .options
                .iter()
                .any(|o| o.name.to_lowercase().contains(needle_lower))
    }
}

impl Day {
    pub fn new(day_num: u32, date: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            day_num,
            date: date.into(),
            dow: String::new(),
            title: title.into(),
            items: Vec::new(),
            extra: Extra::new(),
        }
    }

    /// Prefix every item id on this day is expected to carry, e.g. `d3_`.
    pub fn id_prefix(&self) -> String {
        format!("d{}_", self.day_num)
    }

    pub fn item_position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }
}

/// A broken document invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("item id '{0}' appears more than once")]
    DuplicateItemId(String),
    #[error("day number {0} appears more than once")]
    DuplicateDayNum(u32),
    #[error("item '{item}' has chosen '{chosen}' which matches no option")]
    DanglingChosen { item: String, chosen: String },
    #[error("item '{item}' has visited option '{option}' which matches no option")]
    DanglingVisitedOption { item: String, option: String },
    #[error("option '{option}' of item '{item}' has only one of lat/lng")]
    HalfCoordinates { item: String, option: String },
}

impl Document {
    pub fn day(&self, day_num: u32) -> Option<&Day> {
        self.days.iter().find(|d| d.day_num == day_num)
    }

    pub fn item_count(&self) -> usize {
        self.days.iter().map(|d| d.items.len()).sum()
    }

    /// Every item with the day it belongs to, in document order.
    pub fn items(&self) -> impl Iterator<Item = (&Day, &Item)> {
        self.days
            .iter()
            .flat_map(|day| day.items.iter().map(move |item| (day, item)))
    }

    pub fn contains_item_id(&self, id: &str) -> bool {
        self.items().any(|(_, item)| item.id == id)
    }

    /// First and last calendar dates among the days that carry a parseable date.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self
            .days
            .iter()
            .filter_map(|d| NaiveDate::parse_from_str(&d.date, "%Y-%m-%d").ok());
        let first = dates.next()?;
        let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some((min, max))
    }

    /// Collect every invariant violation. An empty list means the document is sound.
    pub fn validate(&self) -> Vec<Violation> {
        let mut out = Vec::new();

        let mut day_nums = HashSet::new();
        for day in &self.days {
            if !day_nums.insert(day.day_num) {
                out.push(Violation::DuplicateDayNum(day.day_num));
            }
        }

        let mut ids = HashSet::new();
        for (_, item) in self.items() {
            if !ids.insert(item.id.as_str()) {
                out.push(Violation::DuplicateItemId(item.id.clone()));
            }
            if !item.chosen.is_empty() && !item.has_option_named(&item.chosen) {
                out.push(Violation::DanglingChosen {
                    item: item.id.clone(),
                    chosen: item.chosen.clone(),
                });
            }
            if !item.visited_option.is_empty() && !item.has_option_named(&item.visited_option) {
                out.push(Violation::DanglingVisitedOption {
                    item: item.id.clone(),
                    option: item.visited_option.clone(),
                });
            }
            for opt in &item.options {
                if opt.lat.is_some() != opt.lng.is_some() {
                    out.push(Violation::HalfCoordinates {
                        item: item.id.clone(),
                        option: opt.name.clone(),
                    });
                }
            }
        }
        out
    }
}

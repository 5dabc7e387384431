use chrono::FixedOffset;
use crate::ToolError;
use itinera_core::{Day, Document, Item, ItemOption, fixed_offset, now_in};

/// An item found by query, tagged with the day it lives on.
#[derive(Debug, Clone, Copy)]
pub struct ItemHit<'a> {
    pub day_num: u32,
    pub item: &'a Item,
}

/// One conversation's private, mutable copy of the document.
///
/// The caller's document is cloned on entry and never touched again. Writes
/// land on the copy and flip the dirty flag through [`mark_modified`];
/// [`into_mutation`] hands the copy back only when something changed.
///
/// [`mark_modified`]: ExecutionContext::mark_modified
/// [`into_mutation`]: ExecutionContext::into_mutation
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    document: Document,
    modified: bool,
    offset: FixedOffset,
}

impl ExecutionContext {
    pub fn new(document: &Document) -> Self {
        Self::with_offset(document, fixed_offset(9))
    }

    pub fn with_offset(document: &Document, offset: FixedOffset) -> Self {
        Self {
            document: document.clone(),
            modified: false,
            offset,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The working copy if any write succeeded, otherwise `None`.
    pub fn into_mutation(self) -> Option<Document> {
        self.modified.then_some(self.document)
    }

    /// Flag the copy dirty and stamp `meta.lastUpdated`. A non-blank note
    /// replaces `meta.updateNote`.
    pub fn mark_modified(&mut self, note: Option<&str>) {
        self.modified = true;
        let meta = &mut self.document.meta;
        meta.last_updated = Some(now_in(self.offset).to_rfc3339());
        if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
            meta.update_note = Some(note.to_string());
        }
    }

    pub fn find_item(&self, id: &str) -> Option<(&Day, &Item)> {
        self.document.items().find(|(_, item)| item.id == id)
    }

    /// Day and item indices for `id`.
    pub fn locate_item(&self, id: &str) -> Option<(usize, usize)> {
        self.document
            .days
            .iter()
            .enumerate()
            .find_map(|(d, day)| day.item_position(id).map(|i| (d, i)))
    }

    /// Items whose title, or failing that any option name, contains `text`
    /// case-insensitively. Document order is preserved.
    pub fn find_items_by_query(&self, text: &str) -> Vec<ItemHit<'_>> {
        let needle = text.to_lowercase();
        self.document
            .items()
            .filter(|(_, item)| item.matches_query(&needle))
            .map(|(day, item)| ItemHit {
                day_num: day.day_num,
                item,
            })
            .collect()
    }

    /// First day matching either `day_num` or `date`, in document order.
    pub fn find_day(&self, day_num: Option<u32>, date: Option<&str>) -> Option<&Day> {
        self.day_index(day_num, date).map(|i| &self.document.days[i])
    }

    pub fn day_index(&self, day_num: Option<u32>, date: Option<&str>) -> Option<usize> {
        self.document.days.iter().position(|day| {
            day_num.is_some_and(|n| day.day_num == n) || date.is_some_and(|d| day.date == d)
        })
    }

    /// First option whose name contains `partial`, case-insensitively.
    /// List order decides; a short name that is also a substring of an
    /// earlier, longer name resolves to the longer one.
    pub fn find_option<'a>(item: &'a Item, partial: &str) -> Option<&'a ItemOption> {
        item.option_position(partial).map(|i| &item.options[i])
    }

    pub fn require_item(&self, id: &str) -> Result<(&Day, &Item), ToolError> {
        self.find_item(id).ok_or_else(|| ToolError::not_found("item", id))
    }

    pub fn require_item_mut(&mut self, id: &str) -> Result<&mut Item, ToolError> {
        let (d, i) = self
            .locate_item(id)
            .ok_or_else(|| ToolError::not_found("item", id))?;
        Ok(&mut self.document.days[d].items[i])
    }

    pub fn require_day_index(&self, day_num: u32) -> Result<usize, ToolError> {
        self.day_index(Some(day_num), None)
            .ok_or_else(|| ToolError::not_found("day", day_num.to_string()))
    }

    pub(crate) fn day_mut(&mut self, index: usize) -> &mut Day {
        &mut self.document.days[index]
    }
}

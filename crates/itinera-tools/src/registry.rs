use crate::definitions::tool_definitions;
use crate::write::Applied;
use crate::{ExecutionContext, ToolError, read, write};
use itinera_core::ToolDefinition;
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;

pub type ReadHandler = fn(&ExecutionContext, &Value) -> Result<Value, ToolError>;
pub type WriteHandler = fn(&mut ExecutionContext, &Value) -> Result<Applied, ToolError>;

/// A registered operation. Reads only ever see a shared borrow.
#[derive(Clone, Copy)]
pub enum Handler {
    Read(ReadHandler),
    Write(WriteHandler),
}

impl Handler {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Handler::Read(_))
    }
}

/// Result of one dispatch, already shaped for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub success: bool,
    pub output: Value,
}

impl ToolOutcome {
    fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
        }
    }

    fn failed(err: &ToolError) -> Self {
        Self {
            success: false,
            output: err.to_output(),
        }
    }
}

/// Immutable name → handler table.
pub struct ToolRegistry {
    handlers: BTreeMap<&'static str, Handler>,
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Build a registry from explicit entries. Definitions are kept only for
    /// registered names, in the order given.
    pub fn new(
        entries: impl IntoIterator<Item = (&'static str, Handler)>,
        definitions: Vec<ToolDefinition>,
    ) -> Self {
        let handlers: BTreeMap<_, _> = entries.into_iter().collect();
        let definitions = definitions
            .into_iter()
            .filter(|d| handlers.contains_key(d.name.as_str()))
            .collect();
        Self {
            handlers,
            definitions,
        }
    }

    /// The full itinerary catalog.
    pub fn itinerary() -> Self {
        Self::new(
            [
                ("get_schedule", Handler::Read(read::get_schedule)),
                ("find_item", Handler::Read(read::find_item)),
                ("search_items", Handler::Read(read::search_items)),
                ("get_item_detail", Handler::Read(read::get_item_detail)),
                ("get_trip_summary", Handler::Read(read::get_trip_summary)),
                ("update_item", Handler::Write(write::update_item)),
                ("update_status", Handler::Write(write::update_status)),
                ("update_visit", Handler::Write(write::update_visit)),
                ("update_review", Handler::Write(write::update_review)),
                ("update_note", Handler::Write(write::update_note)),
                ("set_chosen", Handler::Write(write::set_chosen)),
                ("update_option", Handler::Write(write::update_option)),
                ("add_item", Handler::Write(write::add_item)),
                ("add_option", Handler::Write(write::add_option)),
                ("move_item", Handler::Write(write::move_item)),
                ("remove_item", Handler::Write(write::remove_item)),
            ],
            tool_definitions(),
        )
    }

    /// Process-wide itinerary catalog, built on first use.
    pub fn standard() -> &'static ToolRegistry {
        static REGISTRY: OnceLock<ToolRegistry> = OnceLock::new();
        REGISTRY.get_or_init(ToolRegistry::itinerary)
    }

    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn is_read_only(&self, name: &str) -> bool {
        self.get(name).is_some_and(|h| h.is_read_only())
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Run `name` against `ctx`. Unknown names, validation failures and
    /// handler panics all come back as a failed [`ToolOutcome`].
    pub fn dispatch(&self, ctx: &mut ExecutionContext, name: &str, input: &Value) -> ToolOutcome {
        let Some(handler) = self.get(name) else {
            return ToolOutcome::failed(&ToolError::UnknownTool(name.to_string()));
        };

        let result = match handler {
            Handler::Read(f) => catch_unwind(AssertUnwindSafe(|| f(ctx, input))),
            Handler::Write(f) => {
                let snapshot = ctx.clone();
                let result = catch_unwind(AssertUnwindSafe(|| {
                    f(ctx, input).map(|applied| {
                        ctx.mark_modified(Some(&applied.note));
                        applied.output
                    })
                }));
                // A panic may leave a half-applied edit behind.
                if result.is_err() {
                    *ctx = snapshot;
                }
                result
            }
        };

        match result {
            Ok(Ok(output)) => ToolOutcome::ok(output),
            Ok(Err(err)) => ToolOutcome::failed(&err),
            Err(panic) => ToolOutcome::failed(&ToolError::Execution(panic_message(&*panic))),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

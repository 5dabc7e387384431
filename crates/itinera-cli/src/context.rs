use anyhow::{Context, Result};
use itinera_agent::{EventCallback, LoopConfig};
use itinera_core::{AppConfig, Document};
use itinera_observe::Observer;
use itinera_store::{DocumentStore, FileStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command-line values that take precedence over the layered settings.
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub document: Option<PathBuf>,
    pub model: Option<String>,
    pub max_rounds: Option<u32>,
}

pub(crate) struct CliContext {
    pub workspace: PathBuf,
    pub config: AppConfig,
    pub store: FileStore,
    pub observer: Arc<Observer>,
    pub json: bool,
}

impl CliContext {
    pub fn load(workspace: &Path, overrides: Overrides, verbose: bool, json: bool) -> Result<Self> {
        let mut config = AppConfig::ensure(workspace)?;
        apply_overrides(&mut config, &overrides);

        let document_path = overrides
            .document
            .unwrap_or_else(|| config.store.resolve(workspace));
        let store = FileStore::new(document_path).with_backup(config.store.keep_backup);

        let mut observer = Observer::new(workspace)?;
        observer.set_verbose(verbose);
        observer.verbose_log(&format!("itinerary: {}", store.path().display()));

        Ok(Self {
            workspace: workspace.to_path_buf(),
            config,
            store,
            observer: Arc::new(observer),
            json,
        })
    }

    pub fn load_document(&self) -> Result<Document> {
        self.store
            .get()
            .with_context(|| "run with --document <path> or set store.document_path".to_string())
    }

    /// Persist and report violations the write would introduce.
    pub fn save_document(&self, document: &Document) -> Result<()> {
        for violation in document.validate() {
            self.observer.warn_log(&format!("saving with violation: {violation}"));
        }
        self.store.put(document)?;
        self.observer
            .verbose_log(&format!("saved {}", self.store.path().display()));
        Ok(())
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig::from_app(&self.config)
    }

    pub fn event_sink(&self) -> EventCallback {
        let observer = Arc::clone(&self.observer);
        Arc::new(move |kind| {
            if let Err(err) = observer.record(kind) {
                observer.warn_log(&format!("failed to record event: {err}"));
            }
        })
    }
}

fn apply_overrides(config: &mut AppConfig, overrides: &Overrides) {
    if let Some(model) = &overrides.model {
        config.llm.model = model.clone();
    }
    if let Some(max_rounds) = overrides.max_rounds {
        config.agent_loop.max_rounds = max_rounds;
    }
}

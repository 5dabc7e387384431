use anyhow::Result;
use chrono::Utc;
use itinera_core::{EventEnvelope, EventKind, runtime_dir};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

pub struct Observer {
    log_path: PathBuf,
    conversation_id: Uuid,
    seq_no: AtomicU64,
    verbose: bool,
}

impl Observer {
    pub fn new(workspace: &Path) -> Result<Self> {
        let dir = runtime_dir(workspace);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            log_path: dir.join("observe.log"),
            conversation_id: Uuid::now_v7(),
            seq_no: AtomicU64::new(0),
            verbose: false,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    /// Wrap `kind` in an envelope with the next sequence number and append it.
    pub fn record(&self, kind: EventKind) -> Result<EventEnvelope> {
        let envelope = EventEnvelope {
            seq_no: self.seq_no.fetch_add(1, Ordering::SeqCst) + 1,
            at: Utc::now(),
            conversation_id: self.conversation_id,
            kind,
        };
        self.record_event(&envelope)?;
        Ok(envelope)
    }

    pub fn record_event(&self, event: &EventEnvelope) -> Result<()> {
        self.verbose_log(&format!("{} {}", event.kind.category(), event_label(&event.kind)));
        self.append_log_line(&format!(
            "{} EVENT {}",
            Utc::now().to_rfc3339(),
            serde_json::to_string(event)?
        ))
    }

    /// Enable or disable verbose logging to stderr.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Log a message to stderr with `[itinera]` prefix when verbose mode is on.
    pub fn verbose_log(&self, msg: &str) {
        if self.verbose {
            eprintln!("[itinera] {msg}");
        }
    }

    /// Log a warning to stderr and the log file.
    pub fn warn_log(&self, msg: &str) {
        eprintln!("[itinera WARN] {msg}");
        let _ = self.append_log_line(&format!("{} WARN {msg}", Utc::now().to_rfc3339()));
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

fn event_label(kind: &EventKind) -> String {
    match kind {
        EventKind::ConversationStartedV1 { history_turns, .. } => {
            format!("started (history={history_turns})")
        }
        EventKind::RoundStartedV1 { round } => format!("round {round}"),
        EventKind::ToolExecutedV1 {
            tool_name,
            success,
            duration_ms,
            ..
        } => format!(
            "{tool_name} {} in {duration_ms}ms",
            if *success { "ok" } else { "failed" }
        ),
        EventKind::DocumentMutatedV1 {
            tool_name,
            update_note,
        } => format!("{tool_name}: {}", update_note.as_deref().unwrap_or("-")),
        EventKind::TransportFailedV1 { auth, error } => {
            format!("transport failed (auth={auth}): {error}")
        }
        EventKind::ConversationFinishedV1 {
            rounds,
            mutated,
            finish_reason,
        } => format!("finished {finish_reason} after {rounds} round(s), mutated={mutated}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itinera_core::EventKind;

    #[test]
    fn records_events_as_json_lines() {
        let workspace = tempfile::tempdir().expect("tempdir");
        let observer = Observer::new(workspace.path()).expect("observer");
        observer
            .record(EventKind::RoundStartedV1 { round: 1 })
            .expect("record round");
        let second = observer
            .record(EventKind::ToolExecutedV1 {
                call_id: "toolu_1".to_string(),
                tool_name: "find_item".to_string(),
                success: true,
                duration_ms: 2,
            })
            .expect("record tool");
        assert_eq!(second.seq_no, 2);
        assert_eq!(second.conversation_id, observer.conversation_id());

        let log = fs::read_to_string(observer.log_path()).expect("read log");
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        let (_, json) = lines[1].split_once(" EVENT ").expect("event marker");
        let parsed: EventEnvelope = serde_json::from_str(json).expect("envelope json");
        assert_eq!(parsed.kind, second.kind);
    }

    #[test]
    fn warnings_land_in_log_file() {
        let workspace = tempfile::tempdir().expect("tempdir");
        let observer = Observer::new(workspace.path()).expect("observer");
        observer.warn_log("itinerary backup skipped");
        let log = fs::read_to_string(observer.log_path()).expect("read log");
        assert!(log.contains(" WARN itinerary backup skipped"));
    }

    #[test]
    fn verbose_toggle() {
        let workspace = tempfile::tempdir().expect("tempdir");
        let mut observer = Observer::new(workspace.path()).expect("observer");
        assert!(!observer.is_verbose());
        observer.set_verbose(true);
        assert!(observer.is_verbose());
        observer.verbose_log("visible on stderr");
    }

    #[test]
    fn labels_read_naturally() {
        let label = event_label(&EventKind::ConversationFinishedV1 {
            rounds: 2,
            mutated: true,
            finish_reason: "completed".to_string(),
        });
        assert_eq!(label, "finished completed after 2 round(s), mutated=true");
    }
}

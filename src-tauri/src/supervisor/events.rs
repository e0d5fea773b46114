use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const OUTPUT_EVENT: &str = "agent-output";
pub const ERROR_EVENT: &str = "agent-error";
pub const EXITED_EVENT: &str = "agent-exited";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn label(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }

    pub fn event(self, run_id: Uuid, text: String) -> AgentEvent {
        let at = Utc::now();
        match self {
            StreamKind::Stdout => AgentEvent::Output { run_id, text, at },
            StreamKind::Stderr => AgentEvent::Error { run_id, text, at },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AgentEvent {
    Output {
        run_id: Uuid,
        text: String,
        at: DateTime<Utc>,
    },
    Error {
        run_id: Uuid,
        text: String,
        at: DateTime<Utc>,
    },
    Exited {
        run_id: Uuid,
        code: Option<i32>,
        at: DateTime<Utc>,
    },
}

impl AgentEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            AgentEvent::Output { .. } => OUTPUT_EVENT,
            AgentEvent::Error { .. } => ERROR_EVENT,
            AgentEvent::Exited { .. } => EXITED_EVENT,
        }
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            AgentEvent::Output { run_id, .. }
            | AgentEvent::Error { run_id, .. }
            | AgentEvent::Exited { run_id, .. } => *run_id,
        }
    }

    /// Log-pane rendering; `None` for chunks that are only whitespace.
    pub fn display_line(&self) -> Option<String> {
        match self {
            AgentEvent::Output { text, at, .. } => {
                let text = text.trim();
                (!text.is_empty()).then(|| format!("[{}] {text}", clock(at)))
            }
            AgentEvent::Error { text, at, .. } => {
                let text = text.trim();
                (!text.is_empty()).then(|| format!("[{}] ERROR: {text}", clock(at)))
            }
            AgentEvent::Exited { code, at, .. } => Some(match code {
                Some(code) => format!("[{}] Agent exited with code {code}", clock(at)),
                None => format!("[{}] Agent terminated", clock(at)),
            }),
        }
    }
}

/// What the window receives: the event plus its log-pane line. A `None` line
/// means there is nothing to show.
#[derive(Debug, Clone, Serialize)]
pub struct EventPayload<'a> {
    #[serde(flatten)]
    pub event: &'a AgentEvent,
    pub line: Option<String>,
}

impl AgentEvent {
    pub fn payload(&self) -> EventPayload<'_> {
        EventPayload {
            event: self,
            line: self.display_line(),
        }
    }
}

fn clock(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

//! Event models streamed to clients by the HTTP layer.
//!
//! Every event carries a generated id and creation timestamp; the concrete
//! payload is discriminated by the `type` field on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a plan over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanEventStatus {
    Created,
    Updated,
    Completed,
}

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepEventStatus {
    Started,
    Completed,
    Failed,
}

/// A plan produced by the agent: an ordered list of steps toward a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default = "new_id")]
    pub id: String,
    pub goal: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A single step within a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(default = "new_id")]
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub done: bool,
}

/// Fields shared by every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMeta {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Default for EventMeta {
    fn default() -> Self {
        Self {
            id: new_id(),
            created_at: Utc::now(),
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// An event emitted while the agent works on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Plan {
        #[serde(flatten)]
        meta: EventMeta,
        plan: Plan,
        status: PlanEventStatus,
    },
    Title {
        #[serde(flatten)]
        meta: EventMeta,
        title: String,
    },
    Step {
        #[serde(flatten)]
        meta: EventMeta,
        step: Step,
        status: StepEventStatus,
    },
    Message {
        #[serde(flatten)]
        meta: EventMeta,
        role: MessageRole,
        message: String,
    },
    Tool {
        #[serde(flatten)]
        meta: EventMeta,
        name: String,
        #[serde(default)]
        output: Option<serde_json::Value>,
    },
    Wait {
        #[serde(flatten)]
        meta: EventMeta,
    },
    Error {
        #[serde(flatten)]
        meta: EventMeta,
        error: String,
    },
    Done {
        #[serde(flatten)]
        meta: EventMeta,
    },
}

impl Event {
    /// Convenience constructor for assistant messages.
    pub fn assistant_message(message: impl Into<String>) -> Self {
        Event::Message {
            meta: EventMeta::default(),
            role: MessageRole::Assistant,
            message: message.into(),
        }
    }

    /// Convenience constructor for error events.
    pub fn error(error: impl Into<String>) -> Self {
        Event::Error {
            meta: EventMeta::default(),
            error: error.into(),
        }
    }

    pub fn done() -> Self {
        Event::Done {
            meta: EventMeta::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagged_serialization() {
        let event = Event::Title {
            meta: EventMeta::default(),
            title: "Research trip options".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "title");
        assert_eq!(json["title"], "Research trip options");
        assert!(json["id"].is_string());
        assert!(json["created_at"].is_string());
    }

    #[test]
    fn test_event_deserialize_by_tag() {
        let json = serde_json::json!({
            "type": "step",
            "step": { "description": "open the booking page" },
            "status": "started",
        });
        let event: Event = serde_json::from_value(json).unwrap();
        match event {
            Event::Step { step, status, .. } => {
                assert_eq!(step.description, "open the booking page");
                assert_eq!(status, StepEventStatus::Started);
                assert!(!step.id.is_empty());
            }
            other => panic!("expected step event, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_event_roundtrip() {
        let event = Event::Plan {
            meta: EventMeta::default(),
            plan: Plan {
                id: "plan-1".to_string(),
                goal: "summarize the article".to_string(),
                steps: vec![Step {
                    id: "step-1".to_string(),
                    description: "fetch the page".to_string(),
                    done: false,
                }],
            },
            status: PlanEventStatus::Created,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        match back {
            Event::Plan { plan, status, .. } => {
                assert_eq!(plan.goal, "summarize the article");
                assert_eq!(plan.steps.len(), 1);
                assert_eq!(status, PlanEventStatus::Created);
            }
            other => panic!("expected plan event, got {other:?}"),
        }
    }

    #[test]
    fn test_done_event_has_fresh_id() {
        let a = Event::done();
        let b = Event::done();
        let (Event::Done { meta: ma }, Event::Done { meta: mb }) = (a, b) else {
            unreachable!()
        };
        assert_ne!(ma.id, mb.id);
    }
}

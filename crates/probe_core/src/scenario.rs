//! Scenario scripting: scheduled events that fire once at a named tick, and
//! the externally injected event queue.

use serde::{Deserialize, Serialize};

use crate::events::EventType;
use crate::types::Uid;

pub const MAX_INJECTED: usize = 64;

/// A scripted event that fires at `at_tick` as part of the tick pipeline.
/// Fire-once: `fired` flips and the entry never repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub at_tick: u64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub subtype: u8,
    #[serde(default)]
    pub severity: f32,
    #[serde(default)]
    pub target: Option<Uid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fired: bool,
}

/// An externally injected event, applied on the next tick's flush step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectedEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub subtype: u8,
    #[serde(default)]
    pub severity: f32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "probe")]
    pub target: Option<Uid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InjectionQueue {
    pub pending: Vec<InjectedEvent>,
}

impl InjectionQueue {
    pub fn push(&mut self, event: InjectedEvent) -> Result<usize, crate::error::SimError> {
        if self.pending.len() >= MAX_INJECTED {
            return Err(crate::error::SimError::capacity("injection queue full"));
        }
        self.pending.push(event);
        Ok(self.pending.len())
    }

    pub fn drain(&mut self) -> Vec<InjectedEvent> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_event_parses_from_wire_form() {
        let event: InjectedEvent = serde_json::from_str(
            r#"{"type":"hazard","subtype":1,"description":"drill","severity":0.8,"probe":"1-1"}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, EventType::Hazard);
        assert_eq!(event.subtype, 1);
        assert_eq!(event.target, Some(Uid::new(1, 1)));
    }

    #[test]
    fn scheduled_event_defaults() {
        let event: ScheduledEvent =
            serde_json::from_str(r#"{"at_tick":100,"type":"wonder"}"#).unwrap();
        assert_eq!(event.at_tick, 100);
        assert!(!event.fired);
        assert!(event.target.is_none());
    }

    #[test]
    fn queue_caps_out() {
        let mut queue = InjectionQueue::default();
        let event = InjectedEvent {
            event_type: EventType::Wonder,
            subtype: 0,
            severity: 0.5,
            description: None,
            target: None,
        };
        for _ in 0..MAX_INJECTED {
            queue.push(event.clone()).unwrap();
        }
        assert!(queue.push(event).is_err());
        assert_eq!(queue.drain().len(), MAX_INJECTED);
        assert!(queue.pending.is_empty());
    }
}

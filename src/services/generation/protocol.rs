//! Wire records and caller-visible rendering of a turn's events.
//!
//! The loop's [`LoopEvent`]s are encoded as [`StreamEvent`] records (the
//! raw wire form), and a [`Relay`] turns those records into the text chunks
//! a caller reads.

use std::collections::HashSet;
use std::sync::Arc;

use forge_models::StreamEvent;

use super::LoopEvent;
use crate::services::tools::ToolRegistry;

/// Acknowledgement shown instead of a silent tool's output.
pub const SILENT_ACK: &str = "✅ Read successful";

/// Wire form of a loop event; terminal events have none.
pub fn encode(event: &LoopEvent) -> Option<StreamEvent> {
    match event {
        LoopEvent::TextDelta(text) => Some(StreamEvent::AiResponse { data: text.clone() }),
        LoopEvent::ToolRequest { id, name, arguments } => Some(StreamEvent::ToolRequest {
            id: id.clone(),
            name: name.clone(),
            arguments: arguments.clone(),
        }),
        LoopEvent::ToolExecuted {
            id,
            name,
            arguments,
            result,
        } => Some(StreamEvent::ToolExecuted {
            id: id.clone(),
            name: name.clone(),
            arguments: arguments.clone(),
            result: result.clone(),
        }),
        LoopEvent::Completed { .. } | LoopEvent::Failed(_) => None,
    }
}

/// Maps wire records to caller text for one turn.
pub struct Relay {
    tools: Arc<ToolRegistry>,
    silent_tools: HashSet<String>,
    announced: HashSet<String>,
}

impl Relay {
    pub fn new(tools: Arc<ToolRegistry>, silent_tools: &[String]) -> Self {
        Self {
            tools,
            silent_tools: silent_tools.iter().cloned().collect(),
            announced: HashSet::new(),
        }
    }

    pub fn is_silent(&self, tool_name: &str) -> bool {
        self.silent_tools.contains(tool_name)
    }

    /// Caller text for one record, or `None` when nothing should be shown
    /// (a repeated request for an announced id, an empty delta).
    pub fn render(&mut self, event: &StreamEvent) -> Option<String> {
        match event {
            StreamEvent::AiResponse { data } => (!data.is_empty()).then(|| data.clone()),
            StreamEvent::ToolRequest { id, name, .. } => {
                if self.announced.insert(id.clone()) {
                    Some(self.tools.format_request(name))
                } else {
                    None
                }
            }
            StreamEvent::ToolExecuted { id, name, arguments, .. } => {
                // An executed call implies its request; never announce it afterwards
                self.announced.insert(id.clone());
                let body = if self.is_silent(name) {
                    SILENT_ACK.to_string()
                } else {
                    self.tools.format_executed(name, arguments)
                };
                Some(format!("\n\n{}\n\n", body))
            }
        }
    }

    /// Wire record with a silent tool's result replaced by the acknowledgement.
    pub fn redact(&self, event: StreamEvent) -> StreamEvent {
        match event {
            StreamEvent::ToolExecuted {
                id,
                name,
                arguments,
                ..
            } if self.is_silent(&name) => StreamEvent::ToolExecuted {
                id,
                name,
                arguments,
                result: SILENT_ACK.to_string(),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenerationConfig, ToolsConfig};

    fn relay() -> Relay {
        Relay::new(
            Arc::new(ToolRegistry::with_defaults(&ToolsConfig::default())),
            &GenerationConfig::default().silent_tools,
        )
    }

    fn request(id: &str, name: &str) -> StreamEvent {
        StreamEvent::ToolRequest {
            id: id.into(),
            name: name.into(),
            arguments: String::new(),
        }
    }

    #[test]
    fn test_request_announced_once_per_id() {
        let mut relay = relay();
        assert_eq!(
            relay.render(&request("c1", "writeFile")).as_deref(),
            Some("\n\n[Tool selected] Write file\n\n")
        );
        assert_eq!(relay.render(&request("c1", "writeFile")), None);
        assert!(relay.render(&request("c2", "writeFile")).is_some());
    }

    #[test]
    fn test_executed_rendering() {
        let mut relay = relay();
        let written = StreamEvent::ToolExecuted {
            id: "c1".into(),
            name: "writeFile".into(),
            arguments: r#"{"relativeFilePath":"src/App.vue","content":"<template/>"}"#.into(),
            result: "File written: src/App.vue".into(),
        };
        assert_eq!(
            relay.render(&written).unwrap(),
            "\n\n[Tool call] Write file src/App.vue\n```vue\n<template/>\n```\n\n\n"
        );

        let read = StreamEvent::ToolExecuted {
            id: "c2".into(),
            name: "readFile".into(),
            arguments: r#"{"relativeFilePath":"src/App.vue"}"#.into(),
            result: "a very long file".into(),
        };
        assert_eq!(relay.render(&read).unwrap(), "\n\n✅ Read successful\n\n");
        match relay.redact(read) {
            StreamEvent::ToolExecuted { result, .. } => assert_eq!(result, SILENT_ACK),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_encode_skips_terminal_events() {
        assert!(encode(&LoopEvent::Failed("x".into())).is_none());
        assert_eq!(
            encode(&LoopEvent::TextDelta("hi".into())),
            Some(StreamEvent::AiResponse { data: "hi".into() })
        );
    }
}

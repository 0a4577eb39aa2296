//! Per-turn accumulation of relayed text and tool calls.

use std::sync::Mutex;

use forge_models::ToolCallRecord;

/// Thread-safe buffer for one turn's output.
///
/// Text is appended in arrival order. Tool calls are kept in request order
/// and deduplicated by id; a later record for a known id only refreshes
/// its arguments (deltas arrive before the complete call).
#[derive(Debug, Default)]
pub struct StreamCollector {
    inner: Mutex<Collected>,
}

#[derive(Debug, Default, Clone)]
struct Collected {
    text: String,
    tool_calls: Vec<ToolCallRecord>,
}

impl StreamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_text(&self, chunk: &str) {
        self.lock().text.push_str(chunk);
    }

    /// Record a tool call. Returns true the first time an id is seen.
    pub fn record_tool_call(&self, record: ToolCallRecord) -> bool {
        let mut inner = self.lock();
        match inner.tool_calls.iter_mut().find(|c| c.id == record.id) {
            Some(existing) => {
                if !record.arguments.is_empty() {
                    existing.arguments = record.arguments;
                }
                if existing.name.is_empty() {
                    existing.name = record.name;
                }
                false
            }
            None => {
                inner.tool_calls.push(record);
                true
            }
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.lock().tool_calls.is_empty()
    }

    pub fn tool_call_count(&self) -> usize {
        self.lock().tool_calls.len()
    }

    pub fn full_text(&self) -> String {
        self.lock().text.clone()
    }

    pub fn tool_calls(&self) -> Vec<ToolCallRecord> {
        self.lock().tool_calls.clone()
    }

    // A poisoned lock still holds consistent data: every write is a single push.
    fn lock(&self) -> std::sync::MutexGuard<'_, Collected> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_dedup_keeps_first_position() {
        let collector = StreamCollector::new();
        assert!(collector.record_tool_call(ToolCallRecord::new("a", "writeFile", "{\"rel")));
        assert!(collector.record_tool_call(ToolCallRecord::new("b", "readFile", "{}")));
        assert!(!collector.record_tool_call(ToolCallRecord::new("a", "writeFile", "{\"relativeFilePath\":\"x\"}")));

        let calls = collector.tool_calls();
        assert_eq!(collector.tool_call_count(), 2);
        assert_eq!(calls[0].id, "a");
        assert_eq!(calls[0].arguments, "{\"relativeFilePath\":\"x\"}");
        assert_eq!(calls[1].id, "b");
    }

    #[test]
    fn test_text_from_many_threads() {
        let collector = Arc::new(StreamCollector::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = collector.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        c.append_text("x");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(collector.full_text().len(), 400);
        assert!(!collector.has_tool_calls());
    }
}

//! JSON output for status and run summaries.
//!
//! Serializes for scripting and piping.

use serde::Serialize;

pub fn render<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        serde_json::json!({ "error": e.to_string() }).to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SyncOutcome;

    #[test]
    fn unchanged_outcome_is_tagged() {
        let value: serde_json::Value =
            serde_json::from_str(&render(&SyncOutcome::Unchanged)).unwrap();
        assert_eq!(value, serde_json::json!({ "outcome": "unchanged" }));
    }
}

//! Tool-usage scorers
//!
//! Each scorer maps the recorded tool calls of a run to a score in `[0, 1]`.

use serde::{Deserialize, Serialize};

/// Fraction of `expected` tools that appear in `calls`. Nothing expected scores 1.
pub fn tool_selection(calls: &[String], expected: &[String]) -> f64 {
    if expected.is_empty() {
        return 1.0;
    }
    let hits = expected.iter().filter(|tool| calls.contains(tool)).count();
    hits as f64 / expected.len() as f64
}

/// 1 when none of the `forbidden` tools was called, else 0
pub fn tools_avoided(calls: &[String], forbidden: &[String]) -> f64 {
    if calls.iter().any(|call| forbidden.contains(call)) {
        0.0
    } else {
        1.0
    }
}

/// 1 when `expected` is a subsequence of `calls`, else 0
pub fn tool_order(calls: &[String], expected: &[String]) -> f64 {
    let mut remaining = calls.iter();
    let in_order = expected
        .iter()
        .all(|tool| remaining.any(|call| call == tool));
    if in_order {
        1.0
    } else {
        0.0
    }
}

/// Scores of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalScores {
    pub tool_selection: f64,
    pub tools_avoided: f64,
    pub tool_order: f64,
}

impl EvalScores {
    pub fn compute(
        calls: &[String],
        expected: &[String],
        forbidden: &[String],
        order: &[String],
    ) -> Self {
        Self {
            tool_selection: tool_selection(calls, expected),
            tools_avoided: tools_avoided(calls, forbidden),
            tool_order: tool_order(calls, order),
        }
    }

    /// All scores zero, for runs that never produced calls to score
    pub fn zero() -> Self {
        Self {
            tool_selection: 0.0,
            tools_avoided: 0.0,
            tool_order: 0.0,
        }
    }

    pub fn is_perfect(&self) -> bool {
        self.tool_selection >= 1.0 && self.tools_avoided >= 1.0 && self.tool_order >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tool_selection() {
        let calls = names(&["list_files", "read_file"]);
        assert_eq!(tool_selection(&calls, &names(&["list_files"])), 1.0);
        assert_eq!(
            tool_selection(&calls, &names(&["list_files", "write_file"])),
            0.5
        );
        assert_eq!(tool_selection(&[], &[]), 1.0);
    }

    #[test]
    fn test_tools_avoided() {
        let calls = names(&["list_files", "delete_file"]);
        assert_eq!(tools_avoided(&calls, &names(&["delete_file"])), 0.0);
        assert_eq!(tools_avoided(&calls, &names(&["run_command"])), 1.0);
    }

    #[test]
    fn test_tool_order_is_subsequence() {
        let calls = names(&["list_files", "read_file", "write_file", "read_file"]);
        assert_eq!(tool_order(&calls, &names(&["list_files", "write_file"])), 1.0);
        assert_eq!(tool_order(&calls, &names(&["write_file", "read_file"])), 1.0);
        assert_eq!(tool_order(&calls, &names(&["write_file", "list_files"])), 0.0);
        assert_eq!(tool_order(&calls, &[]), 1.0);
    }
}

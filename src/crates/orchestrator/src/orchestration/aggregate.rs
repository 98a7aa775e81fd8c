//! Aggregation of per-agent results into one response

use super::models::AgentResult;

pub const AGGREGATE_HEADER: &str = "Multi-Agent Analysis Results:\n\n";

/// Returned when no agent produced usable text
pub const FALLBACK_RESPONSE: &str = "No agents were able to process the request successfully.";

/// Concatenate completed responses in dispatch order
pub fn aggregate(results: &[AgentResult]) -> String {
    let contributions: Vec<(&str, &str)> = results
        .iter()
        .filter_map(|r| r.contribution().map(|text| (r.agent_name.as_str(), text)))
        .collect();

    if contributions.is_empty() {
        return FALLBACK_RESPONSE.to_string();
    }

    let mut out = String::from(AGGREGATE_HEADER);
    for (name, text) in &contributions {
        out.push_str(&format!("{} Response:\n{}\n\n", name, text));
    }
    out.push_str(&format!(
        "Summary: Processed by {} agents successfully.",
        contributions.len()
    ));
    out
}

use super::query::{PathEntry, SchemaInfo, SearchHit};

pub const SEARCH_LIMIT: usize = 50;
pub const LIST_LIMIT: usize = 100;

pub fn search_lines(query: &str, hits: &[SearchHit]) -> Vec<String> {
    if hits.is_empty() {
        return vec![format!("No endpoints found matching '{query}'")];
    }

    let mut lines = vec![format!("Found {} matching endpoints:", hits.len()), String::new()];
    for hit in hits.iter().take(SEARCH_LIMIT) {
        lines.push(format!("{:7} {}", hit.method, hit.path));
        if !hit.summary.is_empty() {
            lines.push(format!("        {}", hit.summary));
        }
    }
    if hits.len() > SEARCH_LIMIT {
        lines.push(String::new());
        lines.push(format!("... and {} more", hits.len() - SEARCH_LIMIT));
    }
    lines
}

pub fn list_lines(entries: &[PathEntry]) -> Vec<String> {
    let mut lines: Vec<String> = entries
        .iter()
        .take(LIST_LIMIT)
        .map(|entry| format!("{}: {}", entry.path, entry.methods.join(", ")))
        .collect();
    if entries.len() > LIST_LIMIT {
        lines.push(String::new());
        lines.push(format!("... and {} more paths", entries.len() - LIST_LIMIT));
    }
    lines
}

pub fn not_found_lines(path: &str, suggestions: &[String]) -> Vec<String> {
    let mut lines = vec![format!("Endpoint not found: {path}")];
    if !suggestions.is_empty() {
        lines.push(String::new());
        lines.push("Did you mean:".to_string());
        lines.extend(suggestions.iter().map(|p| format!("  {p}")));
    }
    lines
}

pub fn fetch_lines(info: &SchemaInfo) -> Vec<String> {
    vec![
        format!("Schema version: {}", or_unknown(&info.version)),
        format!("Total endpoints: {}", info.total_endpoints),
    ]
}

pub fn info_lines(info: &SchemaInfo) -> Vec<String> {
    let mut lines = vec![
        "Cloudflare API Schema".to_string(),
        "=====================".to_string(),
        format!("Title: {}", or_unknown(&info.title)),
        format!("Version: {}", or_unknown(&info.version)),
        format!("Total Endpoints: {}", info.total_endpoints),
        String::new(),
        "Methods:".to_string(),
    ];
    lines.extend(
        info.methods
            .iter()
            .map(|(method, count)| format!("  {method}: {count}")),
    );
    lines.push(String::new());
    lines.push("Top-level paths:".to_string());
    lines.extend(info.top_level_paths.iter().map(|p| format!("  {p}")));
    lines
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("unknown")
}

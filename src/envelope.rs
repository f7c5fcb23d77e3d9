//! Reading the `{success, errors, result}` envelope every API response uses.

use serde_json::{Value, json};

/// Envelope for a call that never got an API answer.
pub fn failure(message: &str) -> Value {
    json!({ "success": false, "errors": [{ "message": message }] })
}

pub fn is_success(response: &Value) -> bool {
    response.get("success").and_then(Value::as_bool) == Some(true)
}

/// One-line status trailers printed to stderr after the JSON body.
pub fn summarize(response: &Value) -> Vec<String> {
    if is_success(response) {
        let line = match response.get("result") {
            Some(Value::Array(items)) => format!("[Success: {} items returned]", items.len()),
            Some(Value::Object(result)) => match result.get("id") {
                Some(id) if !id.is_null() => format!("[Success: ID={}]", display_value(id)),
                _ => "[Success]".to_string(),
            },
            _ => "[Success]".to_string(),
        };
        return vec![line];
    }

    let Some(errors) = response.get("errors").and_then(Value::as_array) else {
        return Vec::new();
    };
    errors
        .iter()
        .map(|err| {
            let code = err.get("code").map(display_value).unwrap_or_default();
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            format!("[Error {code}]: {message}")
        })
        .collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(v) => v.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_literal_true() {
        assert!(is_success(&json!({ "success": true })));
        assert!(!is_success(&json!({ "success": "true" })));
        assert!(!is_success(&json!({ "result": [] })));
    }

    #[test]
    fn summarize_counts_list_results() {
        let resp = json!({ "success": true, "result": [{}, {}, {}] });
        assert_eq!(summarize(&resp), vec!["[Success: 3 items returned]"]);
    }

    #[test]
    fn summarize_reports_object_id() {
        let resp = json!({ "success": true, "result": { "id": "023e105f4ecef8ad", "status": "active" } });
        assert_eq!(summarize(&resp), vec!["[Success: ID=023e105f4ecef8ad]"]);

        let no_id = json!({ "success": true, "result": { "status": "active" } });
        assert_eq!(summarize(&no_id), vec!["[Success]"]);
    }

    #[test]
    fn summarize_lists_every_error() {
        let resp = json!({
            "success": false,
            "errors": [
                { "code": 1003, "message": "Invalid or missing zone id." },
                { "message": "second" },
                { "code": 7000 }
            ]
        });
        assert_eq!(
            summarize(&resp),
            vec![
                "[Error 1003]: Invalid or missing zone id.",
                "[Error ]: second",
                "[Error 7000]: Unknown error",
            ]
        );
    }

    #[test]
    fn failure_envelope_reads_as_error() {
        let resp = failure("Connection error: refused");
        assert!(!is_success(&resp));
        assert_eq!(summarize(&resp), vec!["[Error ]: Connection error: refused"]);
    }
}

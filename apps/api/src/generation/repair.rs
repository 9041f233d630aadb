//! Structured-output validation and the repair capability injected into the orchestrator.

use serde_json::Value;

/// Best-effort fix-up of near-valid JSON. Returning `None` means "could not repair".
///
/// Plain closures implement this too, which keeps tests free of mock types.
pub trait JsonRepair: Send + Sync {
    fn try_repair(&self, text: &str) -> Option<String>;
}

impl<F> JsonRepair for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn try_repair(&self, text: &str) -> Option<String> {
        self(text)
    }
}

/// True when `text` parses as JSON whose root is an object.
pub fn is_json_object(text: &str) -> bool {
    matches!(serde_json::from_str::<Value>(text), Ok(Value::Object(_)))
}

/// Default repair strategy for LLM output.
///
/// 1. strip markdown code fences
/// 2. cut from the first `{` to where that object closes (drops commentary)
/// 3. close strings/brackets left open by a truncated response
/// 4. drop trailing commas before `}` / `]`
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicRepair;

impl JsonRepair for HeuristicRepair {
    fn try_repair(&self, text: &str) -> Option<String> {
        let text = strip_json_fences(text);
        if is_json_object(text) {
            return Some(text.to_string());
        }

        let start = text.find('{')?;
        let object = extract_object(&text[start..]);
        let repaired = strip_trailing_commas(&object);

        is_json_object(&repaired).then_some(repaired)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// `text` starts at `{`. Returns the first balanced object, or the whole text with
/// its open string and brackets closed if the object never closes.
fn extract_object(text: &str) -> String {
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' if closers.last() == Some(&ch) => {
                closers.pop();
                if closers.is_empty() {
                    return text[..=i].to_string();
                }
            }
            _ => {}
        }
    }

    let mut out = text.trim_end().to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    while let Some(closer) = closers.pop() {
        out.push(closer);
    }
    out
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }

        if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        if ch == '"' {
            in_string = true;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repair(text: &str) -> Option<String> {
        HeuristicRepair.try_repair(text)
    }

    #[test]
    fn test_is_json_object_requires_object_root() {
        assert!(is_json_object(r#"{"a": 1}"#));
        assert!(!is_json_object("[1, 2]"));
        assert!(!is_json_object("\"text\""));
        assert!(!is_json_object("{not json"));
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_repair_fenced_object() {
        assert_eq!(
            repair("```json\n{\"score\": 80}\n```").as_deref(),
            Some("{\"score\": 80}")
        );
    }

    #[test]
    fn test_repair_drops_surrounding_commentary() {
        let input = "Sure! Here is the JSON:\n{\"text\": \"Led {team} of 4\"}\nHope this helps.";
        assert_eq!(
            repair(input).as_deref(),
            Some("{\"text\": \"Led {team} of 4\"}")
        );
    }

    #[test]
    fn test_repair_trailing_commas() {
        let repaired = repair(r#"{"tags": ["rust", "go",], "n": 1,}"#).unwrap();
        assert_eq!(repaired, r#"{"tags": ["rust", "go"], "n": 1}"#);
    }

    #[test]
    fn test_repair_keeps_commas_inside_strings() {
        let repaired = repair(r#"{"text": "a, }", "n": 1,}"#).unwrap();
        assert_eq!(repaired, r#"{"text": "a, }", "n": 1}"#);
    }

    #[test]
    fn test_repair_closes_truncated_output() {
        let repaired = repair(r#"{"a": {"b": [1, 2"#).unwrap();
        assert_eq!(repaired, r#"{"a": {"b": [1, 2]}}"#);
    }

    #[test]
    fn test_repair_closes_truncated_string() {
        let repaired = repair(r#"{"summary": "Built a distrib"#).unwrap();
        assert_eq!(repaired, r#"{"summary": "Built a distrib"}"#);
    }

    #[test]
    fn test_repair_gives_up_without_object() {
        assert!(repair("I cannot help with that.").is_none());
        assert!(repair("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_closure_implements_repair() {
        let fixed = |_: &str| Some("{}".to_string());
        assert_eq!(fixed.try_repair("junk").as_deref(), Some("{}"));
    }
}

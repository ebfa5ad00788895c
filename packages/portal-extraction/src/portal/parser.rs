//! Narrow regex extraction over portal markup.
//!
//! The portal serves server-rendered HTML with inline state; strategies and
//! discovery mode never touch raw markup themselves, they consume the
//! structured results of these extractors. Contracts per target:
//!
//! - hidden fields: every `<input type="hidden">` as (name, value)
//! - option lists: every `<select>` with its (value, label) options
//! - forms: every `<form>` with action, method, and input names
//! - title: trimmed `<title>` text
//! - practice id: the tenant identifier embedded in authenticated pages

use regex::Regex;

/// Structural extract of one `<form>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormExtract {
    pub action: String,
    pub method: String,
    pub inputs: Vec<String>,
}

/// Structural extract of one `<select>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectExtract {
    pub name: String,
    /// (value, label) pairs in document order.
    pub options: Vec<(String, String)>,
}

/// Pull one attribute value out of a tag fragment.
fn attr(tag: &str, name: &str) -> Option<String> {
    let pattern = Regex::new(&format!(
        r#"(?i){}\s*=\s*["']([^"']*)["']"#,
        regex::escape(name)
    ))
    .unwrap();
    pattern
        .captures(tag)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Every hidden input as (name, value), in document order.
pub fn hidden_fields(html: &str) -> Vec<(String, String)> {
    let input_pattern = Regex::new(r"(?is)<input[^>]*>").unwrap();

    input_pattern
        .find_iter(html)
        .filter_map(|m| {
            let tag = m.as_str();
            let kind = attr(tag, "type")?;
            if !kind.eq_ignore_ascii_case("hidden") {
                return None;
            }
            let name = attr(tag, "name")?;
            Some((name, attr(tag, "value").unwrap_or_default()))
        })
        .collect()
}

/// Every select element with its options, in document order.
pub fn select_lists(html: &str) -> Vec<SelectExtract> {
    let select_pattern = Regex::new(r"(?is)<select([^>]*)>(.*?)</select>").unwrap();

    select_pattern
        .captures_iter(html)
        .map(|cap| SelectExtract {
            name: attr(cap.get(1).map_or("", |m| m.as_str()), "name").unwrap_or_default(),
            options: option_values(cap.get(2).map_or("", |m| m.as_str())),
        })
        .collect()
}

/// (value, label) pairs of every option in a markup fragment.
pub fn option_values(html: &str) -> Vec<(String, String)> {
    let option_pattern =
        Regex::new(r#"(?is)<option[^>]*value\s*=\s*["']([^"']*)["'][^>]*>(.*?)</option>"#).unwrap();

    option_pattern
        .captures_iter(html)
        .map(|cap| {
            (
                cap.get(1).map_or("", |m| m.as_str()).to_string(),
                collapse_whitespace(cap.get(2).map_or("", |m| m.as_str())),
            )
        })
        .collect()
}

/// Every form with its action, method, and input names.
pub fn forms(html: &str) -> Vec<FormExtract> {
    let form_pattern = Regex::new(r"(?is)<form([^>]*)>(.*?)</form>").unwrap();
    let input_pattern = Regex::new(r"(?is)<(?:input|select|textarea)[^>]*>").unwrap();

    form_pattern
        .captures_iter(html)
        .map(|cap| {
            let tag = cap.get(1).map_or("", |m| m.as_str());
            let body = cap.get(2).map_or("", |m| m.as_str());
            FormExtract {
                action: attr(tag, "action").unwrap_or_default(),
                method: attr(tag, "method")
                    .unwrap_or_else(|| "get".to_string())
                    .to_lowercase(),
                inputs: input_pattern
                    .find_iter(body)
                    .filter_map(|m| attr(m.as_str(), "name"))
                    .collect(),
            }
        })
        .collect()
}

/// Trimmed `<title>` text, if any.
pub fn title(html: &str) -> Option<String> {
    let title_pattern = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok()?;
    title_pattern
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// The tenant/practice identifier embedded in authenticated pages, either
/// as a hidden field or an inline script assignment.
pub fn practice_id(html: &str) -> Option<String> {
    for (name, value) in hidden_fields(html) {
        if name.eq_ignore_ascii_case("practiceid") || name.eq_ignore_ascii_case("practice_id") {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }

    let script_pattern =
        Regex::new(r#"(?i)practice_?id["']?\s*[:=]\s*["']?([A-Za-z0-9-]+)"#).unwrap();
    script_pattern
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// First `max` characters of a body with whitespace runs collapsed.
pub fn body_preview(body: &str, max: usize) -> String {
    let collapsed = collapse_whitespace(body);
    collapsed.chars().take(max).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><head><title> Patient Portal </title></head><body>
        <form action="/login/validate" method="POST">
            <input type="hidden" name="__token" value="abc123">
            <input type="text" name="username">
            <input type="password" name="password">
        </form>
        <select name="providerId">
            <option value="">All providers</option>
            <option value="17">Dr. Hopper</option>
            <option value="23">Dr. Lovelace</option>
        </select>
        <script>var practiceId = 'PR-9041';</script>
        </body></html>
    "#;

    #[test]
    fn hidden_fields_extract_name_value_pairs() {
        let fields = hidden_fields(SAMPLE);
        assert_eq!(fields, vec![("__token".to_string(), "abc123".to_string())]);
    }

    #[test]
    fn select_lists_extract_options_in_order() {
        let selects = select_lists(SAMPLE);
        assert_eq!(selects.len(), 1);
        assert_eq!(selects[0].name, "providerId");
        assert_eq!(selects[0].options[1], ("17".to_string(), "Dr. Hopper".to_string()));
    }

    #[test]
    fn forms_extract_action_method_and_input_names() {
        let extracted = forms(SAMPLE);
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].action, "/login/validate");
        assert_eq!(extracted[0].method, "post");
        assert_eq!(extracted[0].inputs, vec!["__token", "username", "password"]);
    }

    #[test]
    fn title_is_trimmed() {
        assert_eq!(title(SAMPLE), Some("Patient Portal".to_string()));
        assert_eq!(title("<body>no title</body>"), None);
    }

    #[test]
    fn practice_id_from_script_assignment() {
        assert_eq!(practice_id(SAMPLE), Some("PR-9041".to_string()));
    }

    #[test]
    fn practice_id_prefers_hidden_field() {
        let html = r#"<input type="hidden" name="practiceId" value="PR-7">"#;
        assert_eq!(practice_id(html), Some("PR-7".to_string()));
    }

    #[test]
    fn body_preview_collapses_whitespace() {
        let preview = body_preview("a\n\n   b\tc", 10);
        assert_eq!(preview, "a b c");
    }
}

//! Static keyword checks on the query text.

const MISSING_PREFIX: &str = "Following keywords are missing in your query: ";
const DENIED_PREFIX: &str = "Following keywords in your query are not allowed in this exercise: ";

/// Keywords a query lacks or should not contain, in list order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordViolations {
    pub missing: Vec<String>,
    pub denied: Vec<String>,
}

impl KeywordViolations {
    /// Matches are case-insensitive substring matches. Blank keywords are
    /// ignored.
    pub fn find(query: &str, mandatory: &[String], deny: &[String]) -> Self {
        let query = query.to_lowercase();
        let relevant = |keyword: &&String| !keyword.trim().is_empty();
        let contained = |keyword: &str| query.contains(&keyword.to_lowercase());

        Self {
            missing: mandatory
                .iter()
                .filter(relevant)
                .filter(|k| !contained(k.as_str()))
                .cloned()
                .collect(),
            denied: deny
                .iter()
                .filter(relevant)
                .filter(|k| contained(k.as_str()))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.denied.is_empty()
    }

    /// The message shown to the student; empty when nothing is violated.
    pub fn message(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("{MISSING_PREFIX}{}", list_literal(&self.missing)));
        }
        if !self.denied.is_empty() {
            parts.push(format!("{DENIED_PREFIX}{}", list_literal(&self.denied)));
        }
        parts.join(" ")
    }
}

/// Empty when `query` satisfies both keyword lists, otherwise a message
/// naming the offending keywords.
pub fn check_mand_deny_list(query: &str, mandatory: &[String], deny: &[String]) -> String {
    KeywordViolations::find(query, mandatory, deny).message()
}

/// `['a', 'b']`
fn list_literal(words: &[String]) -> String {
    let quoted: Vec<String> = words.iter().map(|word| quote(word)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Quote `word` the way Python's `repr` renders a string.
fn quote(word: &str) -> String {
    let escaped = escape_controls(word);
    if word.contains('\'') && !word.contains('"') {
        return format!("\"{escaped}\"");
    }
    format!("'{}'", escaped.replace('\'', "\\'"))
}

fn escape_controls(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn satisfied_lists_give_empty_message() {
        let message = check_mand_deny_list(
            "SELECT * FROM a RIGHT JOIN b ON a.x = b.x",
            &list(&["right join"]),
            &list(&["minus"]),
        );
        assert_eq!(message, "");
    }

    #[test]
    fn names_missing_keyword() {
        let message = check_mand_deny_list(
            "SELECT * FROM b LEFT JOIN a ON a.x = b.x",
            &list(&["RIGHT JOIN"]),
            &[],
        );
        assert_eq!(
            message,
            "Following keywords are missing in your query: ['RIGHT JOIN']"
        );
    }

    #[test]
    fn names_denied_keywords_in_order() {
        let violations = KeywordViolations::find(
            "select a from x minus select a from y union select 1",
            &[],
            &list(&["union", "intersect", "minus"]),
        );
        assert_eq!(violations.denied, list(&["union", "minus"]));
        assert_eq!(
            violations.message(),
            "Following keywords in your query are not allowed in this exercise: ['union', 'minus']"
        );
    }

    #[test]
    fn both_violations_are_joined() {
        let message = check_mand_deny_list("select 1 minus select 2", &list(&["join"]), &list(&["minus"]));
        assert_eq!(
            message,
            "Following keywords are missing in your query: ['join'] \
             Following keywords in your query are not allowed in this exercise: ['minus']"
        );
    }

    #[test]
    fn substring_match_not_token_match() {
        let violations = KeywordViolations::find("select count(*) from photos", &list(&["photo"]), &list(&["count"]));
        assert!(violations.missing.is_empty());
        assert_eq!(violations.denied, list(&["count"]));
    }

    #[test]
    fn quoting_follows_python_repr() {
        assert_eq!(quote("minus"), "'minus'");
        assert_eq!(quote("it's"), "\"it's\"");
        assert_eq!(quote(r"it's a\b"), r#""it's a\\b""#);
        assert_eq!(quote(r#"a'b"c"#), r#"'a\'b"c'"#);
        assert_eq!(quote(r"x\y"), r"'x\\y'");
        assert_eq!(quote("a\nb"), r"'a\nb'");
    }

    #[test]
    fn blank_keywords_are_ignored() {
        let violations = KeywordViolations::find("select 1", &list(&["", "  "]), &list(&[""]));
        assert!(violations.is_empty());
    }

    #[test]
    fn quotes_like_a_list_literal() {
        assert_eq!(list_literal(&list(&["it's", "a"])), "[\"it's\", 'a']");
    }
}

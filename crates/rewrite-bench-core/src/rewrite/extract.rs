//! Pulls a candidate SQL statement out of free-form engine output.
//!
//! Fallback order: fenced ```sql block, any fenced block, a keyword at the
//! start of a line, a keyword anywhere, then the raw trimmed text.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const KEYWORDS: &str = "SELECT|WITH|INSERT|UPDATE|DELETE|CREATE|ALTER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractSource {
    SqlFence,
    Fence,
    LineKeyword,
    Keyword,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub sql: String,
    pub source: ExtractSource,
}

fn sql_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```[ \t]*sql\b(.*?)```").expect("static regex"))
}

fn any_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(.*?)```").expect("static regex"))
}

fn line_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?im)^[ \t>*-]*\b({})\b", KEYWORDS)).expect("static regex")
    })
}

fn any_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"(?i)\b({})\b", KEYWORDS)).expect("static regex"))
}

pub fn extract_sql(text: &str) -> Extracted {
    if let Some(sql) = first_fenced(sql_fence(), text, false) {
        return Extracted {
            sql,
            source: ExtractSource::SqlFence,
        };
    }
    if let Some(sql) = first_fenced(any_fence(), text, true) {
        return Extracted {
            sql,
            source: ExtractSource::Fence,
        };
    }

    for (re, source) in [
        (line_keyword(), ExtractSource::LineKeyword),
        (any_keyword(), ExtractSource::Keyword),
    ] {
        if let Some(start) = re.captures(text).and_then(|c| c.get(1)).map(|m| m.start()) {
            let sql = strip_fence_marks(&text[start..]);
            if !sql.is_empty() {
                return Extracted { sql, source };
            }
        }
    }

    Extracted {
        sql: text.trim().to_string(),
        source: ExtractSource::Raw,
    }
}

fn first_fenced(re: &Regex, text: &str, drop_info_string: bool) -> Option<String> {
    for caps in re.captures_iter(text) {
        let Some(body) = caps.get(1) else { continue };
        let mut body = body.as_str();
        if drop_info_string {
            body = without_info_string(body);
        }
        let body = body.trim();
        if !body.is_empty() {
            return Some(body.to_string());
        }
    }
    None
}

/// Drops a language tag such as `postgresql` from the first line of a fence body.
fn without_info_string(body: &str) -> &str {
    let Some((first, rest)) = body.split_once('\n') else {
        return body;
    };
    let tag = first.trim();
    let is_tag = !tag.is_empty()
        && !tag.contains(char::is_whitespace)
        && !any_keyword().is_match(tag)
        && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if is_tag {
        rest
    } else {
        body
    }
}

fn strip_fence_marks(s: &str) -> String {
    s.trim().trim_end_matches('`').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_fence_wins() {
        let text = "Here you go:\n```sql\nSELECT a FROM t;\n```\nThis avoids a subquery.";
        let e = extract_sql(text);
        assert_eq!(e.sql, "SELECT a FROM t;");
        assert_eq!(e.source, ExtractSource::SqlFence);
    }

    #[test]
    fn test_generic_fence_drops_language_tag() {
        let e = extract_sql("```postgresql\nWITH x AS (SELECT 1) SELECT * FROM x\n```");
        assert_eq!(e.sql, "WITH x AS (SELECT 1) SELECT * FROM x");
        assert_eq!(e.source, ExtractSource::Fence);

        let inline = extract_sql("```SELECT 1```");
        assert_eq!(inline.sql, "SELECT 1");
    }

    #[test]
    fn test_empty_fence_falls_through() {
        let e = extract_sql("```sql\n```\nSELECT 2");
        assert_eq!(e.sql, "SELECT 2");
        assert_eq!(e.source, ExtractSource::LineKeyword);
    }

    #[test]
    fn test_chain_of_thought_commentary_is_discarded() {
        let text = "Step 1: the correlated subquery is expensive, so we join instead.\n\
                    Step 2: push the filter down.\n\
                    SELECT o.id FROM orders o JOIN customer c ON c.id = o.customer";
        let e = extract_sql(text);
        assert!(e.sql.starts_with("SELECT o.id"));
        assert_eq!(e.source, ExtractSource::LineKeyword);
    }

    #[test]
    fn test_keyword_inside_prose() {
        let e = extract_sql("Optimized: select 1 as one");
        assert_eq!(e.sql, "select 1 as one");
        assert_eq!(e.source, ExtractSource::Keyword);
    }

    #[test]
    fn test_unterminated_fence_keeps_statement() {
        let e = extract_sql("```sql\nSELECT * FROM t\n``");
        assert_eq!(e.sql, "SELECT * FROM t");
    }

    #[test]
    fn test_raw_fallback() {
        let e = extract_sql("  I cannot improve this query.  ");
        assert_eq!(e.sql, "I cannot improve this query.");
        assert_eq!(e.source, ExtractSource::Raw);

        assert_eq!(extract_sql("").sql, "");
    }

    #[test]
    fn test_keyword_requires_word_boundary() {
        // "selection" and "withdrawn" are not statements
        let e = extract_sql("The selection was withdrawn.");
        assert_eq!(e.source, ExtractSource::Raw);
    }
}

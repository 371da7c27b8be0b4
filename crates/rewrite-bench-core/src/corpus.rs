use anyhow::Context;
use std::path::Path;

/// Splits corpus text into queries. Queries are separated by one or more
/// blank lines; a block whose trimmed text starts with `--` is a comment and
/// is dropped. Internal newlines of a query are kept.
pub fn parse_queries(text: &str) -> Vec<String> {
    let mut queries = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    let mut flush = |block: &mut Vec<&str>| {
        let q = block.join("\n");
        let q = q.trim();
        if !q.is_empty() && !q.starts_with("--") {
            queries.push(q.to_string());
        }
        block.clear();
    };

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut block);
        } else {
            block.push(line.trim_end_matches('\r'));
        }
    }
    flush(&mut block);
    queries
}

pub fn read_queries(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read corpus {}", path.display()))?;
    let queries = parse_queries(&text);
    tracing::info!(
        event = "corpus.loaded",
        file = %path.display(),
        queries = queries.len(),
    );
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_and_comments() {
        let text = "-- header\n-- more\n\nSELECT 1;\n\n\n  SELECT a\n  FROM t;  \n\n-- disabled\nSELECT 2;\n";
        let q = parse_queries(text);
        assert_eq!(q, vec!["SELECT 1;".to_string(), "SELECT a\n  FROM t;".to_string()]);
    }

    #[test]
    fn test_crlf_and_whitespace_only_separators() {
        let q = parse_queries("SELECT 1\r\n \t\r\nSELECT\r\n 2\r\n");
        assert_eq!(q, vec!["SELECT 1".to_string(), "SELECT\n 2".to_string()]);
        assert!(parse_queries("\n\n   \n").is_empty());
    }

    #[test]
    fn test_comment_inside_query_is_kept() {
        let q = parse_queries("SELECT 1 -- one\nFROM dual");
        assert_eq!(q.len(), 1);
        assert!(q[0].contains("-- one"));
    }
}

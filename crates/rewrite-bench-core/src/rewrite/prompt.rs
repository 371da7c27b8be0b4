use crate::model::PromptMode;

const PLAIN_INSTRUCTION: &str = "Rewrite the input SQL query to produce an equivalent query that can be executed \
on a PostgreSQL database with decreased latency. Return ONLY the SQL.";

const STRICT_INSTRUCTION: &str = "Rewrite the input SQL query to produce an equivalent query that can be executed \
on a PostgreSQL database with decreased latency. \
Return ONLY the final SQL query, with NO explanations, NO comments and NO markdown. \
The answer must start directly with SELECT, WITH, INSERT, UPDATE, DELETE, CREATE or ALTER.";

const EXAMPLE: &str = "Example Input:
select ... from t1 where t1.a=(select avg(a) from t3 where t1.b=t3.b);

Example Output:
select ... from t1 inner join (
    select avg(a) avg, t3.b from t3 group by t3.b
) as t3
on (t1.a = avg and t1.b = t3.b);
";

const COT_TAIL: &str = "First, explain step by step how you would optimize this query for lower latency in PostgreSQL. \
Then, provide ONLY the final optimized SQL query.";

pub fn build_prompt(mode: PromptMode, original_sql: &str, schema_hint: &str) -> String {
    let sql = original_sql.trim();
    let hint = schema_hint.trim();
    let schema_line = if hint.is_empty() {
        String::new()
    } else {
        format!("Schema: {}", hint)
    };

    match mode {
        PromptMode::Plain => {
            let mut parts = vec![PLAIN_INSTRUCTION.to_string(), String::new(), EXAMPLE.to_string()];
            if !hint.is_empty() {
                parts.push("Schema:".into());
                parts.push(hint.to_string());
                parts.push(String::new());
            }
            parts.push("Input:".into());
            parts.push(sql.to_string());
            parts.join("\n")
        }
        PromptMode::ZeroShot => format!(
            "{}\n{}\nInput SQL:\n{}\nOutput SQL:",
            STRICT_INSTRUCTION, schema_line, sql
        ),
        PromptMode::FewShot => format!(
            "{}\n{}\n{}\nInput SQL:\n{}\nOutput SQL:",
            STRICT_INSTRUCTION, EXAMPLE, schema_line, sql
        ),
        PromptMode::ChainOfThought => format!(
            "{}\n{}\nInput SQL:\n{}\n{}",
            STRICT_INSTRUCTION, schema_line, sql, COT_TAIL
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_mode_embeds_the_query() {
        for mode in [
            PromptMode::Plain,
            PromptMode::ZeroShot,
            PromptMode::FewShot,
            PromptMode::ChainOfThought,
        ] {
            let p = build_prompt(mode, "  SELECT 42\n", "t(a, b)");
            assert!(p.contains("SELECT 42"), "{mode}: {p}");
            assert!(p.contains("t(a, b)"), "{mode}: {p}");
        }
    }

    #[test]
    fn test_mode_shapes_differ() {
        let few = build_prompt(PromptMode::FewShot, "SELECT 1", "");
        let zero = build_prompt(PromptMode::ZeroShot, "SELECT 1", "");
        let cot = build_prompt(PromptMode::ChainOfThought, "SELECT 1", "");

        assert!(few.contains("Example Input:"));
        assert!(!zero.contains("Example Input:"));
        assert!(zero.ends_with("Output SQL:"));
        assert!(cot.contains("step by step"));
        assert!(!zero.contains("Schema:"));
    }

    #[test]
    fn test_plain_layout() {
        let p = build_prompt(PromptMode::Plain, "SELECT 1", "");
        assert!(p.starts_with(PLAIN_INSTRUCTION));
        assert!(p.ends_with("Input:\nSELECT 1"));
    }
}

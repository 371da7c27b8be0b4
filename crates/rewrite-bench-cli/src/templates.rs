pub const GITIGNORE: &str = r#"# rewrite-bench outputs
results/
*.sqlite
*.sqlite3
"#;

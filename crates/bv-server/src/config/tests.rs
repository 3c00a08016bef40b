use super::*;

#[test]
fn test_parse_full_config() {
    let toml_str = r#"
roster = [
    "google/gemini-2.5-pro",
    "anthropic/claude-sonnet-4.5",
    "openai/gpt-4.1",
    "openai/gpt-5",
]

[server]
listen = "127.0.0.1:9090"

[logging]
level = "debug"
format = "pretty"

[voting]
database_path = "/var/lib/blindvote/votes.db"
session_vote_cap = 25
"#;

    let config: AppConfig = toml::from_str(toml_str).unwrap();

    assert_eq!(config.server.listen, "127.0.0.1:9090");

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "pretty");

    assert_eq!(config.voting.database_path, "/var/lib/blindvote/votes.db");
    assert_eq!(config.voting.session_vote_cap, 25);

    assert_eq!(config.roster.len(), 4);
    assert_eq!(config.roster[0], "google/gemini-2.5-pro");
    assert_eq!(config.roster[3], "openai/gpt-5");
}

#[test]
fn test_defaults_applied() {
    let toml_str = r#"
roster = ["model-a", "model-b"]
"#;

    let config: AppConfig = toml::from_str(toml_str).unwrap();

    // ServerConfig defaults
    assert_eq!(config.server.listen, "0.0.0.0:8080");

    // LoggingConfig defaults
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, "json");

    // VotingConfig defaults
    assert_eq!(config.voting.database_path, "blindvote.db");
    assert_eq!(config.voting.session_vote_cap, 50);
}

#[test]
fn test_missing_roster_rejected() {
    let toml_str = r#"
[server]
listen = "127.0.0.1:9090"
"#;

    assert!(toml::from_str::<AppConfig>(toml_str).is_err());
}

use std::path::PathBuf;

use anyhow::{ensure, Context};
use bv_core::{ModelId, Roster};

use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// RuntimeConfig — fully validated runtime configuration
// ---------------------------------------------------------------------------

pub struct RuntimeConfig {
    pub roster: Roster,
    pub listen_addr: String,
    pub database_path: PathBuf,
    pub session_vote_cap: u32,
    pub log_level: String,
    pub log_format: String,
}

// ---------------------------------------------------------------------------
// into_runtime — converts raw AppConfig into validated RuntimeConfig
// ---------------------------------------------------------------------------

pub fn into_runtime(config: AppConfig) -> Result<RuntimeConfig, anyhow::Error> {
    ensure!(
        config.voting.session_vote_cap >= 1,
        "session_vote_cap must be at least 1"
    );
    ensure!(
        !config.voting.database_path.trim().is_empty(),
        "database_path must not be empty"
    );

    let models: Vec<ModelId> = config.roster.into_iter().map(ModelId::new).collect();
    let roster = Roster::new(models).context("invalid roster")?;

    Ok(RuntimeConfig {
        roster,
        listen_addr: config.server.listen,
        database_path: PathBuf::from(config.voting.database_path),
        session_vote_cap: config.voting.session_vote_cap,
        log_level: config.logging.level,
        log_format: config.logging.format,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoggingConfig, ServerConfig, VotingConfig};

    fn make_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            voting: VotingConfig::default(),
            roster: vec![
                "google/gemini-2.5-pro".to_owned(),
                "anthropic/claude-sonnet-4.5".to_owned(),
                "openai/gpt-4.1".to_owned(),
                "openai/gpt-5".to_owned(),
            ],
        }
    }

    #[test]
    fn test_valid_config_conversion() {
        let runtime = into_runtime(make_config()).expect("valid config should convert");

        assert_eq!(runtime.roster.size(), 4);
        assert_eq!(runtime.listen_addr, "0.0.0.0:8080");
        assert_eq!(runtime.database_path, PathBuf::from("blindvote.db"));
        assert_eq!(runtime.session_vote_cap, 50);
        assert_eq!(runtime.log_level, "info");
        assert_eq!(runtime.log_format, "json");
    }

    #[test]
    fn test_empty_roster_rejected() {
        let mut config = make_config();
        config.roster.clear();

        match into_runtime(config) {
            Err(e) => assert!(format!("{e:#}").contains("invalid roster")),
            Ok(_) => panic!("expected error for empty roster"),
        }
    }

    #[test]
    fn test_duplicate_roster_model_rejected() {
        let mut config = make_config();
        config.roster.push("openai/gpt-5".to_owned());

        match into_runtime(config) {
            Err(e) => assert!(format!("{e:#}").contains("duplicate model")),
            Ok(_) => panic!("expected error for duplicate roster model"),
        }
    }

    #[test]
    fn test_zero_vote_cap_rejected() {
        let mut config = make_config();
        config.voting.session_vote_cap = 0;

        match into_runtime(config) {
            Err(e) => assert!(e.to_string().contains("session_vote_cap")),
            Ok(_) => panic!("expected error for zero vote cap"),
        }
    }

    #[test]
    fn test_blank_database_path_rejected() {
        let mut config = make_config();
        config.voting.database_path = "   ".to_owned();

        match into_runtime(config) {
            Err(e) => assert!(e.to_string().contains("database_path")),
            Ok(_) => panic!("expected error for blank database path"),
        }
    }
}

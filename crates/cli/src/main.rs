use anyhow::Context;
use clap::{Parser, Subcommand};
use emr_core::{
    config::{language_from_env_value, ExtractionConfig},
    parse_conversation,
    validation::validate_content,
    CoreConfig, EmrError, EmrResult, EvidenceId, EvidenceIdSet, EvidenceIndex, Language,
    LogSnapshot, MedicalRewriteEngine, Orchestrator, Statement, StatementSource,
};
use emr_extraction::ChatCompletionsClient;
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "emr")]
#[command(about = "Evidence-linked EMR drafting CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a role-marked transcript into turns
    Parse {
        /// Transcript file (stdin when omitted)
        input: Option<PathBuf>,
    },
    /// Index statements (one per line) into evidence blocks
    Evidence {
        /// Statement file (stdin when omitted)
        input: Option<PathBuf>,
        /// Label language: zh or en
        #[arg(long)]
        language: Option<String>,
    },
    /// Rule-based rewrite of a transcript, no network access
    Rewrite {
        /// Transcript file (stdin when omitted)
        input: Option<PathBuf>,
    },
    /// Validate raw extraction output against a set of evidence ids
    Validate {
        /// Model output file (stdin when omitted)
        input: Option<PathBuf>,
        /// Comma-separated valid evidence ids, e.g. E1,E2
        #[arg(long, default_value = "")]
        ids: String,
    },
    /// Generate a structured record through the extraction service
    Draft {
        /// Statement file, one statement per line (stdin when omitted)
        input: Option<PathBuf>,
        /// Prior-visit history file
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("emr=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Parse { input } => {
            let turns = parse_conversation(&read_input(input)?);
            json!({ "turns": turns })
        }
        Commands::Evidence { input, language } => {
            let language = language_from_env_value(language)?;
            let snapshot = LogSnapshot::from_statements(statements_from_lines(&read_input(input)?)?);
            let index = EvidenceIndex::build(&snapshot, language)?;
            let valid_ids: Vec<String> = index.valid_ids().iter().map(ToString::to_string).collect();
            json!({ "blocks": index.blocks(), "validIds": valid_ids })
        }
        Commands::Rewrite { input } => {
            let text = read_input(input)?;
            if text.trim().is_empty() {
                return Err(EmrError::InputMissing.into());
            }
            serde_json::to_value(MedicalRewriteEngine::new().rewrite_transcript(&text))?
        }
        Commands::Validate { input, ids } => {
            let valid_ids = parse_id_list(&ids)?;
            let record = validate_content(&read_input(input)?, &valid_ids)?;
            serde_json::to_value(record)?
        }
        Commands::Draft { input, history } => {
            let cfg = config_from_env()?;
            let client = ChatCompletionsClient::from_config(cfg.extraction())
                .context("LLM_API_KEY must be set for draft generation")?;
            let orchestrator = Orchestrator::new(client, cfg.language());

            let snapshot = LogSnapshot::from_statements(statements_from_lines(&read_input(input)?)?);
            let history = match history {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => String::new(),
            };

            let timeout = cfg.extraction().timeout();
            tracing::info!(statements = snapshot.len(), "drafting structured record");
            let record = tokio::time::timeout(
                timeout,
                orchestrator.generate_from_snapshot(&snapshot, &history),
            )
            .await
            .map_err(|_| timeout_error(timeout))??;
            serde_json::to_value(record)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_input(path: Option<PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

fn config_from_env() -> anyhow::Result<CoreConfig> {
    let extraction = ExtractionConfig::from_env_values(
        std::env::var("LLM_API_URL").ok(),
        std::env::var("LLM_MODEL").ok(),
        std::env::var("LLM_API_KEY").ok(),
        std::env::var("EMR_LLM_TIMEOUT_SECS").ok(),
    )?;
    let language: Language = language_from_env_value(std::env::var("EMR_LANGUAGE").ok())?;
    Ok(CoreConfig::new(extraction, language))
}

fn timeout_error(timeout: std::time::Duration) -> EmrError {
    tracing::warn!(timeout_secs = timeout.as_secs(), "extraction service timed out");
    EmrError::UpstreamUnavailable(format!("no response within {}s", timeout.as_secs()))
}

/// One statement per non-blank line.
fn statements_from_lines(text: &str) -> EmrResult<Vec<Statement>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Statement::new(line, StatementSource::Text))
        .collect()
}

fn parse_id_list(ids: &str) -> EmrResult<EvidenceIdSet> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| EvidenceId::parse(id).map_err(EmrError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_from_lines_skips_blank_lines() {
        let statements = statements_from_lines("医生：哪里不舒服？\n\n  \n患者：咳嗽三天\n").unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].text.as_str(), "患者：咳嗽三天");
    }

    #[test]
    fn test_parse_id_list() {
        let ids = parse_id_list("E1, E2,,E2").unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.resolves("E2").is_some());
        assert!(parse_id_list("").unwrap().is_empty());
        assert!(parse_id_list("E1,X2").is_err());
    }

    #[test]
    fn test_timeout_is_an_upstream_failure() {
        let err = timeout_error(std::time::Duration::from_secs(60));
        assert!(matches!(
            err,
            EmrError::UpstreamUnavailable(ref reason) if reason == "no response within 60s"
        ));
    }

    #[test]
    fn test_cli_parses_validate_ids() {
        let cli = Cli::try_parse_from(["emr", "validate", "out.json", "--ids", "E1,E2"]).unwrap();
        match cli.command {
            Commands::Validate { input, ids } => {
                assert_eq!(input, Some(PathBuf::from("out.json")));
                assert_eq!(ids, "E1,E2");
            }
            _ => panic!("expected validate"),
        }
    }
}

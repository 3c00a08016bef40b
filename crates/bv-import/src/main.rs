use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use uuid::Uuid;

use bv_core::{ModelId, Roster, SourceId};
use bv_store::{
    ensure_assignment, reshuffle_assignment, Conversation, Response, SqliteVoteStore, Turn,
    VoteStore,
};

use crate::parser::RawConversation;

mod parser;

const DEFAULT_ROSTER: &str =
    "google/gemini-2.5-pro,anthropic/claude-sonnet-4.5,openai/gpt-4.1,openai/gpt-5";

#[derive(Debug, Parser)]
#[command(
    name = "bv-import",
    about = "Import OpenRouter markdown exports into the blindvote store"
)]
struct Args {
    /// Markdown file or directory of .md files to import.
    path: Option<PathBuf>,
    #[arg(long, default_value = "blindvote.db")]
    database: PathBuf,
    /// Comma-separated model roster, in export order.
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_ROSTER)]
    roster: Vec<String>,
    /// Re-randomize position assignments for every turn already stored.
    /// Existing votes keep their label and may point at a different model
    /// afterwards, so only reshuffle before voting starts.
    #[arg(long)]
    reshuffle: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("{}", format!("Error: {err:#}").red());
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let models: Vec<ModelId> = args.roster.iter().map(ModelId::new).collect();
    let roster = Roster::new(models).context("invalid roster")?;

    let store = SqliteVoteStore::new(&args.database)
        .with_context(|| format!("failed to open database {}", args.database.display()))?;
    store.init().context("failed to initialize schema")?;

    if args.path.is_none() && !args.reshuffle {
        bail!("nothing to do: give a path to import, or --reshuffle");
    }

    if let Some(path) = &args.path {
        import_path(&store, &roster, path)?;
    }

    if args.reshuffle {
        reshuffle_all(&store, &roster)?;
    }

    Ok(())
}

fn import_path(store: &SqliteVoteStore, roster: &Roster, path: &Path) -> Result<()> {
    let files = collect_files(path)?;
    if files.is_empty() {
        bail!("no markdown files found under {}", path.display());
    }

    let mut imported = 0usize;
    let mut rejected = 0usize;
    for file in &files {
        match import_file(store, roster, file) {
            Ok((title, turn_count)) => {
                imported += 1;
                println!(
                    "{} {} ({} turns)",
                    "Imported".green(),
                    title.bold(),
                    turn_count
                );
            }
            Err(err) => {
                rejected += 1;
                eprintln!(
                    "{}",
                    format!("Rejected {}: {err:#}", file.display()).yellow()
                );
            }
        }
    }

    println!(
        "\n{imported} conversation(s) imported, {rejected} file(s) rejected"
    );
    if imported == 0 {
        bail!("no conversations imported");
    }
    Ok(())
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("{} is not a file or directory", path.display());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?
    {
        let entry = entry?;
        let entry_path = entry.path();
        if entry_path.extension().is_some_and(|ext| ext == "md") {
            files.push(entry_path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse one export and store it whole. A file with any malformed turn is
/// rejected before anything is written.
fn import_file(
    store: &SqliteVoteStore,
    roster: &Roster,
    file: &Path,
) -> Result<(String, usize)> {
    let content =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_owned());

    let parsed = parser::parse_export(&content, &stem);
    validate(&parsed, roster)?;

    let conversation = Conversation {
        id: Uuid::new_v4(),
        title: parsed.title.clone(),
        source: SourceId::new(file.display().to_string()),
        imported_at: Utc::now(),
        metadata: serde_json::json!({ "format": "openrouter-markdown" }),
    };
    let turns: Vec<(Turn, Vec<Response>)> = parsed
        .turns
        .iter()
        .enumerate()
        .map(|(index, raw_turn)| {
            let turn = Turn {
                id: Uuid::new_v4(),
                conversation_id: conversation.id,
                turn_number: index as u32 + 1,
                user_prompt: raw_turn.user_prompt.clone(),
            };
            let responses = roster
                .models()
                .iter()
                .zip(&raw_turn.responses)
                .enumerate()
                .map(|(ordinal0, (model, text))| Response {
                    id: Uuid::new_v4(),
                    turn_id: turn.id,
                    model: model.clone(),
                    response_text: text.clone(),
                    ordinal: ordinal0 as u32 + 1,
                })
                .collect();
            (turn, responses)
        })
        .collect();

    // One transaction: a storage failure mid-import leaves no partial
    // conversation behind.
    store.insert_conversation_tree(&conversation, &turns)?;

    let mut rng = rand::rng();
    for (turn, _) in &turns {
        ensure_assignment(store, roster, turn.id, &mut rng)?;
    }

    Ok((parsed.title, parsed.turns.len()))
}

fn validate(parsed: &RawConversation, roster: &Roster) -> Result<()> {
    if parsed.turns.is_empty() {
        bail!("no turns found");
    }
    for (index, turn) in parsed.turns.iter().enumerate() {
        if turn.responses.len() != roster.size() {
            bail!(
                "turn {} has {} responses, expected {}",
                index + 1,
                turn.responses.len(),
                roster.size()
            );
        }
    }
    Ok(())
}

fn reshuffle_all(store: &SqliteVoteStore, roster: &Roster) -> Result<()> {
    let mut rng = rand::rng();
    let mut reshuffled = 0usize;

    for summary in store.list_conversations()? {
        for turn in store.get_turns_for_conversation(&summary.id)? {
            reshuffle_assignment(store, roster, turn.id, &mut rng)
                .with_context(|| format!("failed to reshuffle turn {}", turn.id))?;
            reshuffled += 1;
        }
    }

    println!("{} {reshuffled} turn(s)", "Reshuffled".green());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

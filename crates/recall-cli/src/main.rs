//! Recall CLI
//!
//! The `recall` command inspects and edits a local memory store.
//!
//! ## Commands
//!
//! - `add` / `forget` / `list` / `retrieve`: manage memories
//! - `start` / `update` / `prompt` / `window` / `learn`: drive a conversation
//! - `export` / `import` / `clear` / `stats`: whole-store operations

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use recall_core::telemetry::level_for;
use recall_core::{
    ContextUpdate, MemoryEntry, MemoryManager, MemoryType, NewMemory, RecallConfig,
    RetrievalQuery,
};

#[derive(Parser)]
#[command(name = "recall")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Conversation memory store for assistants", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// State directory (default: .recall)
    #[arg(long, global = true, env = "RECALL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Maximum memories retained on every write
    #[arg(long, global = true)]
    max_memories: Option<usize>,

    /// Advisory token budget for context windows
    #[arg(long, global = true)]
    max_tokens: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a memory, or reinforce an identical one
    Add {
        content: String,

        /// Memory type: fact, preference, context, pattern, correction
        #[arg(short = 't', long = "type", default_value = "fact")]
        kind: MemoryType,

        /// Base importance in [0, 1]
        #[arg(short, long, value_parser = parse_importance)]
        importance: Option<f64>,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Conversation the memory came from
        #[arg(long)]
        source: Option<String>,
    },

    /// Rank memories against a query
    Retrieve {
        query: String,

        /// Restrict to these types (repeatable)
        #[arg(short = 't', long = "type")]
        types: Vec<MemoryType>,

        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Minimum current importance
        #[arg(long, default_value = "0.3")]
        min_importance: f64,
    },

    /// List memories by current importance
    List {
        #[arg(short = 't', long = "type")]
        kind: Option<MemoryType>,
    },

    /// Delete a memory by id
    Forget { id: String },

    /// Start a new conversation, replacing the current one
    Start {
        #[arg(long)]
        topic: Option<String>,
    },

    /// Record a question/response exchange in the current conversation
    Update {
        question: String,
        response: String,

        /// Entity mentioned in the exchange (repeatable)
        #[arg(long = "entity")]
        entities: Vec<String>,

        /// Key point worth remembering (repeatable)
        #[arg(long = "key-point")]
        key_points: Vec<String>,

        /// Preference as key=value; value is parsed as JSON when possible
        #[arg(long = "pref", value_parser = parse_preference)]
        preferences: Vec<(String, Value)>,
    },

    /// Show the context window for a query
    Window {
        query: String,

        /// Drop entries until the window fits the token budget
        #[arg(long)]
        fit: bool,

        /// Print prompt sections instead of JSON
        #[arg(long)]
        render: bool,
    },

    /// Print the prompt briefing for the current conversation
    Prompt,

    /// Turn the current conversation into durable memories
    Learn,

    /// Export all state as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import state previously written by `export`
    Import { file: PathBuf },

    /// Delete all memories, the profile, and the current conversation
    Clear {
        /// Required: confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show store statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    recall_core::init_tracing(cli.json, level_for(cli.verbose));

    let config = resolve_config(&cli)?;
    let manager = MemoryManager::open_dir(config.clone())
        .with_context(|| format!("Failed to open state in {}", config.data_dir.display()))?;

    run(&manager, cli.command)
}

/// Environment first, then explicit flags.
fn resolve_config(cli: &Cli) -> Result<RecallConfig> {
    let mut config = RecallConfig::from_env().context("Invalid RECALL_* environment")?;
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(max) = cli.max_memories {
        config = config.with_max_memories(max);
    }
    if let Some(max) = cli.max_tokens {
        config = config.with_max_tokens(max);
    }
    Ok(config)
}

fn run(manager: &MemoryManager, command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            content,
            kind,
            importance,
            tags,
            source,
        } => {
            let opts = NewMemory {
                importance,
                tags,
                source_conversation: source,
            };
            cmd_add(manager, &content, kind, opts)
        }
        Commands::Retrieve {
            query,
            types,
            limit,
            min_importance,
        } => {
            let mut q = RetrievalQuery::new(query)
                .with_limit(limit)
                .with_min_importance(min_importance);
            if !types.is_empty() {
                q = q.with_types(types);
            }
            cmd_retrieve(manager, &q)
        }
        Commands::List { kind } => cmd_list(manager, kind),
        Commands::Forget { id } => cmd_forget(manager, &id),
        Commands::Start { topic } => cmd_start(manager, topic.as_deref()),
        Commands::Update {
            question,
            response,
            entities,
            key_points,
            preferences,
        } => {
            let update = ContextUpdate {
                entities,
                key_points,
                preferences: preferences.into_iter().collect(),
            };
            cmd_update(manager, &question, &response, &update)
        }
        Commands::Window { query, fit, render } => cmd_window(manager, &query, fit, render),
        Commands::Prompt => {
            println!("{}", manager.get_context_for_prompt());
            Ok(())
        }
        Commands::Learn => cmd_learn(manager),
        Commands::Export { output } => cmd_export(manager, output.as_deref()),
        Commands::Import { file } => cmd_import(manager, &file),
        Commands::Clear { yes } => cmd_clear(manager, yes),
        Commands::Stats => print_json(&manager.stats()),
    }
}

fn cmd_add(
    manager: &MemoryManager,
    content: &str,
    kind: MemoryType,
    opts: NewMemory,
) -> Result<()> {
    let entry = manager.add_memory(content, kind, opts)?;
    if entry.access_count > 1 {
        println!(
            "Reinforced {} (accesses: {}, importance: {:.2})",
            short_id(&entry.id),
            entry.access_count,
            entry.importance
        );
    } else {
        println!("Added {} [{}]", entry.id, entry.kind);
    }
    Ok(())
}

fn cmd_retrieve(manager: &MemoryManager, query: &RetrievalQuery) -> Result<()> {
    let hits = manager.retrieve_memories(query)?;
    if hits.is_empty() {
        println!("No memories matched '{}'", query.text);
        return Ok(());
    }
    for entry in &hits {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn cmd_list(manager: &MemoryManager, kind: Option<MemoryType>) -> Result<()> {
    let ranked = manager.list_memories(kind);
    if ranked.is_empty() {
        println!("No memories stored.");
        return Ok(());
    }
    for r in ranked {
        println!("{:.3}  {}", r.score, format_entry(&r.entry));
    }
    Ok(())
}

fn cmd_forget(manager: &MemoryManager, id: &str) -> Result<()> {
    let removed = manager
        .forget(id)
        .with_context(|| format!("Failed to forget memory '{}'", id))?;
    println!("Forgot {}: {}", short_id(&removed.id), removed.content);
    Ok(())
}

fn cmd_start(manager: &MemoryManager, topic: Option<&str>) -> Result<()> {
    let ctx = manager.start_conversation(topic)?;
    info!(conversation_id = %ctx.id, "conversation started");
    println!("Started conversation {} ({})", ctx.id, ctx.topic);
    Ok(())
}

fn cmd_update(
    manager: &MemoryManager,
    question: &str,
    response: &str,
    update: &ContextUpdate,
) -> Result<()> {
    let ctx = manager.update_context(question, response, update)?;
    println!(
        "Conversation {}: {} exchange(s), expertise {}, tone {}",
        short_id(&ctx.id),
        ctx.history.len(),
        ctx.expertise,
        ctx.emotional_tone
    );
    Ok(())
}

fn cmd_window(manager: &MemoryManager, query: &str, fit: bool, render: bool) -> Result<()> {
    let mut window = manager.build_context_window(query)?;
    if fit {
        window = window.fit_to_budget();
    }
    if render {
        println!("{}", window.render());
        return Ok(());
    }
    print_json(&window)
}

fn cmd_learn(manager: &MemoryManager) -> Result<()> {
    match manager.learn_from_conversation()? {
        Some(summary) => {
            println!(
                "Learned {} fact(s) from {}",
                summary.facts_recorded,
                short_id(&summary.conversation_id)
            );
            if let Some(topic) = summary.topic_recorded {
                println!("Topic: {}", topic);
            }
            if let Some((domain, level)) = summary.expertise_recorded {
                println!("Expertise: {} = {}", domain, level);
            }
        }
        None => println!("No active conversation. Run 'recall start' first."),
    }
    Ok(())
}

fn cmd_export(manager: &MemoryManager, output: Option<&std::path::Path>) -> Result<()> {
    let data = manager.export_memories()?;
    match output {
        Some(path) => {
            std::fs::write(path, data)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{}", data),
    }
    Ok(())
}

fn cmd_import(manager: &MemoryManager, file: &std::path::Path) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    manager
        .try_import(&data)
        .with_context(|| format!("Failed to import {}", file.display()))?;
    println!("Imported {}", file.display());
    Ok(())
}

fn cmd_clear(manager: &MemoryManager, yes: bool) -> Result<()> {
    if !yes {
        bail!("refusing to clear all state without --yes");
    }
    manager.clear()?;
    println!("Cleared all memories, profile and conversation.");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_entry(entry: &MemoryEntry) -> String {
    let tags = if entry.tags.is_empty() {
        String::new()
    } else {
        format!(
            " #{}",
            entry.tags.iter().cloned().collect::<Vec<_>>().join(" #")
        )
    };
    format!(
        "{} [{}] {}{}",
        short_id(&entry.id),
        entry.kind,
        entry.content,
        tags
    )
}

/// First eight characters of an id. Imported ids need not be ASCII.
fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(end, _)| &id[..end])
}

/// Parse an importance weight; NaN and values outside `[0, 1]` are rejected.
fn parse_importance(raw: &str) -> std::result::Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("invalid importance '{raw}': {e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("importance must be within [0, 1], got '{raw}'"))
    }
}

/// Parse `key=value`. Values that are not valid JSON are kept as strings.
fn parse_preference(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty preference key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    fn manager() -> MemoryManager {
        MemoryManager::in_memory(RecallConfig::default())
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_preference_values() {
        assert_eq!(
            parse_preference("theme=dark").unwrap(),
            ("theme".to_string(), json!("dark"))
        );
        assert_eq!(
            parse_preference("width=120").unwrap(),
            ("width".to_string(), json!(120))
        );
        assert_eq!(
            parse_preference("tabs=true").unwrap(),
            ("tabs".to_string(), json!(true))
        );
        assert!(parse_preference("novalue").is_err());
        assert!(parse_preference("=x").is_err());
    }

    #[test]
    fn test_parse_add_with_type_and_tags() {
        let cli = Cli::try_parse_from([
            "recall",
            "add",
            "Prefers tabs",
            "--type",
            "preference",
            "--tag",
            "editor",
            "--tag",
            "style",
        ])
        .unwrap();
        match cli.command {
            Commands::Add { kind, tags, .. } => {
                assert_eq!(kind, MemoryType::Preference);
                assert_eq!(tags, vec!["editor", "style"]);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_parse_importance_bounds() {
        assert_eq!(parse_importance("0.75").unwrap(), 0.75);
        assert_eq!(parse_importance(" 1 ").unwrap(), 1.0);
        for bad in ["NaN", "inf", "-inf", "1.5", "-0.1", "high"] {
            assert!(parse_importance(bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_add_rejects_nan_importance() {
        let nan = Cli::try_parse_from(["recall", "add", "x", "--importance", "NaN"]);
        assert!(nan.is_err());
        let ok = Cli::try_parse_from(["recall", "add", "x", "--importance", "0.9"]).unwrap();
        match ok.command {
            Commands::Add { importance, .. } => assert_eq!(importance, Some(0.9)),
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(Cli::try_parse_from(["recall", "add", "x", "--type", "rumour"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "recall",
            "--data-dir",
            "/tmp/recall-test",
            "--max-memories",
            "7",
            "stats",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/recall-test"));
        assert_eq!(config.max_memories, 7);
    }

    #[test]
    fn test_run_update_merges_preferences() {
        let m = manager();
        let cli = Cli::try_parse_from([
            "recall",
            "update",
            "what is a lifetime?",
            "It is a scope.",
            "--pref",
            "lang=\"rust\"",
        ])
        .unwrap();
        run(&m, cli.command).unwrap();
        assert_eq!(m.profile().preferences["lang"], json!("rust"));
        assert_eq!(m.current_context().unwrap().history.len(), 1);
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let m = manager();
        m.add_memory("keep", MemoryType::Fact, NewMemory::default())
            .unwrap();
        assert!(cmd_clear(&m, false).is_err());
        assert_eq!(m.stats().total_memories, 1);
        cmd_clear(&m, true).unwrap();
        assert_eq!(m.stats().total_memories, 0);
    }

    #[test]
    fn test_export_import_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let source = manager();
        source
            .add_memory("Uses podman", MemoryType::Fact, NewMemory::default())
            .unwrap();
        cmd_export(&source, Some(&path)).unwrap();

        let target = manager();
        cmd_import(&target, &path).unwrap();
        assert_eq!(target.stats().total_memories, 1);
    }

    #[test]
    fn test_import_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{broken").unwrap();
        assert!(cmd_import(&manager(), &path).is_err());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abcdef0123456789"), "abcdef01");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("日本語のメモ"), "日本語のメモ");
        assert_eq!(short_id("メモリーの識別子です"), "メモリーの識別子");
    }

    #[test]
    fn test_list_after_importing_multibyte_ids() {
        let m = manager();
        let payload = json!({
            "memories": [{
                "id": "日本語のメモ識別子",
                "type": "fact",
                "content": "Speaks Japanese",
                "importance": 0.6,
                "created": "2026-03-01T00:00:00Z",
                "last_accessed": "2026-03-01T00:00:00Z",
                "access_count": 1
            }]
        });
        m.try_import(&payload.to_string()).unwrap();
        let listed = m.list_memories(None);
        let line = format_entry(&listed[0].entry);
        assert!(line.starts_with("日本語のメモ識別 [fact]"));
        cmd_list(&m, None).unwrap();
    }
}

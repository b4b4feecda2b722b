use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use flipcard_core::model::{
    AnswerOption, Card, CardId, CardMetadata, Category, Difficulty, EngineConfig, Scenario,
    Solution, UserId,
};
use services::{EngineEvent, FlipCardEngine};
use storage::{ProgressStore, SqliteStore};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- demo   [--db <sqlite_url>] [--user <id>]");
    eprintln!("  cargo run -p app -- export [--db <sqlite_url>] [--user <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:flipcard.sqlite3");
    eprintln!("  --user learner");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FLIPCARD_DB_URL, FLIPCARD_USER");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Demo,
    Export,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "demo" => Some(Self::Demo),
            "export" => Some(Self::Export),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user: UserId,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("FLIPCARD_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://flipcard.sqlite3".into(), normalize_sqlite_url);
        let mut user = std::env::var("FLIPCARD_USER")
            .ok()
            .map_or_else(|| UserId::new("learner"), UserId::new);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    user = UserId::new(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, user })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn demo_card(
    id: &str,
    category: Category,
    difficulty: Difficulty,
    title: &str,
    description: &str,
    options: Vec<AnswerOption>,
    explanation: &str,
    best_practices: &[&str],
    tags: &[&str],
) -> Card {
    let now = flipcard_core::Clock::default().now();
    Card {
        id: CardId::new(id),
        category,
        difficulty,
        scenario: Scenario {
            title: title.into(),
            description: description.into(),
            context: String::new(),
        },
        options,
        solution: Solution {
            explanation: explanation.into(),
            best_practices: best_practices.iter().map(|s| (*s).to_string()).collect(),
            related_concepts: Vec::new(),
        },
        tags: tags.iter().map(|s| (*s).to_string()).collect::<BTreeSet<_>>(),
        estimated_time: 3,
        points: 10,
        metadata: CardMetadata {
            created_at: now,
            updated_at: now,
            version: "2.0.0".into(),
        },
    }
}

fn option(id: &str, text: &str, feedback: &str, is_correct: bool) -> AnswerOption {
    AnswerOption {
        id: flipcard_core::model::OptionId::new(id),
        text: text.into(),
        feedback: feedback.into(),
        is_correct,
    }
}

fn demo_deck() -> Vec<Card> {
    vec![
        demo_card(
            "linkedin-profile",
            Category::Fundamentals,
            Difficulty::Beginner,
            "LinkedIn Profile Optimization",
            "A recruiter reaches out but your LinkedIn profile is not optimized. What is your first move?",
            vec![
                option(
                    "a",
                    "Update the profile photo right away",
                    "The photo matters, but it is not the most critical piece.",
                    false,
                ),
                option(
                    "b",
                    "Review and sharpen the headline and summary",
                    "Correct! The headline and summary are the first things people see.",
                    true,
                ),
                option(
                    "c",
                    "Quickly add more connections",
                    "Connections help, but profile quality comes first.",
                    false,
                ),
            ],
            "The headline and summary are the most visible and critical parts of your profile.",
            &[
                "Use relevant keywords",
                "Be specific about your value",
                "Include quantifiable achievements",
            ],
            &["linkedin", "profile", "optimization"],
        ),
        demo_card(
            "content-calendar",
            Category::Content,
            Difficulty::Beginner,
            "Running Out of Content Ideas",
            "You committed to posting weekly but your idea backlog is empty. What do you do?",
            vec![
                option(
                    "a",
                    "Skip this week and wait for inspiration",
                    "Consistency is what builds an audience; skipping breaks it.",
                    false,
                ),
                option(
                    "b",
                    "Repurpose a past post from a new angle",
                    "Correct! Repurposing keeps the cadence without starting from zero.",
                    true,
                ),
            ],
            "A single idea can feed several posts when you change the angle or format.",
            &["Keep an idea backlog", "Turn questions you get into posts"],
            &["content", "consistency"],
        ),
        demo_card(
            "event-followup",
            Category::Networking,
            Difficulty::Intermediate,
            "After the Networking Event",
            "You collected a dozen contacts at an industry event. What is the highest-leverage next step?",
            vec![
                option(
                    "a",
                    "Send a personalized follow-up referencing your conversation",
                    "Correct! A specific follow-up within a day or two cements the connection.",
                    true,
                ),
                option(
                    "b",
                    "Add everyone on LinkedIn with the default invite",
                    "Generic invites are easy to ignore and easy to forget.",
                    false,
                ),
            ],
            "Personalized, timely follow-up converts brief encounters into relationships.",
            &["Follow up within 48 hours", "Reference something concrete"],
            &["networking", "follow-up"],
        ),
    ]
}

async fn run_demo(mut engine: FlipCardEngine) -> Result<(), Box<dyn std::error::Error>> {
    engine.on_event(Box::new(|event| {
        if let EngineEvent::CardAnswered { card_id, is_correct, .. } = event {
            log::info!("answered {card_id}: correct={is_correct}");
        }
    }));

    engine.initialize().await?;
    if engine.catalog().is_empty() {
        engine.load_cards(demo_deck()).await?;
    }

    let batch_size = engine.config().recommended_batch;
    let picks: Vec<(CardId, flipcard_core::model::OptionId, String)> = engine
        .recommended_cards(batch_size)
        .into_iter()
        .filter_map(|card| {
            card.options
                .iter()
                .find(|o| o.is_correct)
                .map(|o| (card.id.clone(), o.id.clone(), card.scenario.title.clone()))
        })
        .collect();

    for (card_id, option_id, title) in picks {
        engine.start(&card_id)?;
        println!("== {title}");
        if let Some(hint) = engine.request_hint(&card_id)? {
            println!("   hint: {hint}");
        }
        let correct = engine
            .answer(&card_id, &option_id, Duration::from_secs(30))
            .await?;
        println!("   answered correctly: {correct}");
    }

    let stats = engine.stats();
    println!();
    println!("cards:      {}/{} completed", stats.completed_cards, stats.total_cards);
    println!("accuracy:   {:.0}%", stats.accuracy * 100.0);
    println!("avg time:   {:.1}s per attempt", stats.average_time_per_card);
    println!("streak:     {} (best {})", stats.current_streak, stats.best_streak);
    for (category, cs) in &stats.category_breakdown {
        println!(
            "  {category}: {}/{} correct, accuracy {:.0}%",
            cs.completed,
            cs.total,
            cs.accuracy * 100.0
        );
    }

    engine.destroy();
    Ok(())
}

async fn run_export(mut engine: FlipCardEngine) -> Result<(), Box<dyn std::error::Error>> {
    engine.initialize().await?;
    println!("{}", engine.export_progress()?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Demo,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Demo,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let store: Arc<dyn ProgressStore> = Arc::new(SqliteStore::connect(&parsed.db_url).await?);
    let engine = FlipCardEngine::new(parsed.user, EngineConfig::default(), store);

    match cmd {
        Command::Demo => run_demo(engine).await,
        Command::Export => run_export(engine).await,
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use curriculum_core::ClassCatalog;
use curriculum_core::model::{Category, ClassId, GradeLevel, UserId};
use services::{Clock, EngineConfig, ProgressionEngine};
use storage::{AccessRecord, Storage};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DB_URL_ENV: &str = "PROGRESSION_DB_URL";
const CATALOG_ENV: &str = "PROGRESSION_CATALOG";
const DEFAULT_DB_URL: &str = "sqlite://progression.sqlite3";

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingArgument { name: &'static str },
    UnknownArg(String),
    InvalidValue { name: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing subcommand"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { name, raw } => write!(f, "invalid <{name}> value: {raw}"),
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
    eprintln!("  app catalog");
    eprintln!("  app init        <user> <level>");
    eprintln!("  app show        <user> [class]");
    eprintln!("  app active      <user>");
    eprintln!("  app can-upgrade <user> <class>");
    eprintln!("  app upgrade     <user> <class>");
    eprintln!("  app progress    <user> <class> <category> <score> [--completed]");
    eprintln!("  app unlockable  <user>");
    eprintln!("  app overview    <user>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>       default {DEFAULT_DB_URL}");
    eprintln!("  --catalog <json_file>   default: built-in pre-K..grade 12 track");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {DB_URL_ENV}, {CATALOG_ENV}, PROGRESSION_NAMESPACE,");
    eprintln!("  PROGRESSION_STORE_TIMEOUT_MS, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Catalog,
    Init {
        user: UserId,
        level: GradeLevel,
    },
    Show {
        user: UserId,
        class: Option<ClassId>,
    },
    Active {
        user: UserId,
    },
    CanUpgrade {
        user: UserId,
        class: ClassId,
    },
    Upgrade {
        user: UserId,
        class: ClassId,
    },
    Progress {
        user: UserId,
        class: ClassId,
        category: Category,
        score: u32,
        completed: bool,
    },
    Unlockable {
        user: UserId,
    },
    Overview {
        user: UserId,
    },
}

#[derive(Debug)]
struct Args {
    db_url: String,
    catalog_path: Option<PathBuf>,
    command: Command,
}

/// Pops positional arguments in order, naming the missing one on failure.
struct Positionals(std::vec::IntoIter<String>);

impl Positionals {
    fn next_raw(&mut self, name: &'static str) -> Result<String, ArgsError> {
        self.0.next().ok_or(ArgsError::MissingArgument { name })
    }

    fn next<T: std::str::FromStr>(&mut self, name: &'static str) -> Result<T, ArgsError> {
        let raw = self.next_raw(name)?;
        raw.parse()
            .map_err(|_| ArgsError::InvalidValue { name, raw })
    }

    fn optional<T: std::str::FromStr>(
        &mut self,
        name: &'static str,
    ) -> Result<Option<T>, ArgsError> {
        match self.0.next() {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ArgsError::InvalidValue { name, raw }),
        }
    }

    fn finish(mut self) -> Result<(), ArgsError> {
        match self.0.next() {
            None => Ok(()),
            Some(extra) => Err(ArgsError::UnknownArg(extra)),
        }
    }
}

impl Args {
    fn parse(
        args: impl IntoIterator<Item = String>,
        env_db_url: Option<String>,
        env_catalog: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env_db_url.map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut catalog_path = env_catalog
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        let mut completed = false;
        let mut positionals = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--catalog" => {
                    catalog_path = Some(PathBuf::from(require_value(&mut args, "--catalog")?));
                }
                "--completed" => completed = true,
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positionals.push(arg),
            }
        }

        let mut positionals = positionals.into_iter();
        let name = positionals.next().ok_or(ArgsError::MissingCommand)?;
        let mut rest = Positionals(positionals);

        let command = match name.as_str() {
            "catalog" => Command::Catalog,
            "init" => Command::Init {
                user: rest.next("user")?,
                level: rest.next("level")?,
            },
            "show" => Command::Show {
                user: rest.next("user")?,
                class: rest.optional("class")?,
            },
            "active" => Command::Active {
                user: rest.next("user")?,
            },
            "can-upgrade" => Command::CanUpgrade {
                user: rest.next("user")?,
                class: rest.next("class")?,
            },
            "upgrade" => Command::Upgrade {
                user: rest.next("user")?,
                class: rest.next("class")?,
            },
            "progress" => Command::Progress {
                user: rest.next("user")?,
                class: rest.next("class")?,
                category: rest.next("category")?,
                score: rest.next("score")?,
                completed,
            },
            "unlockable" => Command::Unlockable {
                user: rest.next("user")?,
            },
            "overview" => Command::Overview {
                user: rest.next("user")?,
            },
            _ => return Err(ArgsError::UnknownCommand(name)),
        };
        rest.finish()?;

        if completed && !matches!(command, Command::Progress { .. }) {
            return Err(ArgsError::UnknownArg("--completed".into()));
        }

        Ok(Self {
            db_url,
            catalog_path,
            command,
        })
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

fn load_catalog(path: Option<&PathBuf>) -> Result<ClassCatalog, Box<dyn std::error::Error>> {
    match path {
        None => Ok(ClassCatalog::standard()?),
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let catalog = ClassCatalog::from_json(&json)?;
            debug!(path = %path.display(), classes = catalog.len(), "loaded catalog file");
            Ok(catalog)
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_usage();
        return Ok(());
    }

    let parsed = Args::parse(
        argv,
        std::env::var(DB_URL_ENV).ok(),
        std::env::var(CATALOG_ENV).ok(),
    )
    .map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let catalog = load_catalog(parsed.catalog_path.as_ref())?;
    if parsed.command == Command::Catalog {
        return print_json(&catalog.available_classes());
    }

    let config = EngineConfig::from_env()?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let engine = ProgressionEngine::from_config(
        Arc::new(catalog),
        Arc::clone(&storage.access_blobs),
        &config,
        Clock::default(),
    );

    match parsed.command {
        Command::Catalog => Ok(()),
        Command::Init { user, level } => {
            let records = engine.initialize_user_class_access(&user, level).await?;
            print_json(&records.iter().map(AccessRecord::from_access).collect::<Vec<_>>())
        }
        Command::Show { user, class: None } => {
            let records = engine.get_user_class_access(&user).await?;
            print_json(&records.iter().map(AccessRecord::from_access).collect::<Vec<_>>())
        }
        Command::Show {
            user,
            class: Some(class),
        } => {
            let record = engine.get_user_class(&user, &class).await?;
            print_json(&AccessRecord::from_access(&record))
        }
        Command::Active { user } => {
            let record = engine.get_user_active_class(&user).await?;
            print_json(&AccessRecord::from_access(&record))
        }
        Command::CanUpgrade { user, class } => {
            print_json(&engine.can_upgrade_to_class(&user, &class).await?)
        }
        Command::Upgrade { user, class } => {
            print_json(&engine.upgrade_to_class(&user, &class).await?)
        }
        Command::Progress {
            user,
            class,
            category,
            score,
            completed,
        } => {
            let record = engine
                .update_class_progress(&user, &class, category, score, completed)
                .await?;
            print_json(&AccessRecord::from_access(&record))
        }
        Command::Unlockable { user } => print_json(&engine.get_unlockable_classes(&user).await?),
        Command::Overview { user } => print_json(&engine.get_progress_overview(&user).await?),
    }
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

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

use anyhow::{Context, Result};
use bookfind::config::{find_config_file, load_config, Config, ConfigFile};
use bookfind::models::{
    interest_codes, BookRecord, Candidate, QuizType, ScannedItem, SearchQuery, SortOrder,
};
use bookfind::utils::{normalize_isbn, validate_isbn10, validate_isbn13};
use bookfind::Aggregator;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// bookfind - Find reading levels and quiz points for children's books
#[derive(Parser, Debug)]
#[command(name = "bookfind")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find reading levels and quiz points for children's books", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds (overrides the configuration file)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

/// Quiz type filter
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum QuizArg {
    /// Reading practice quizzes
    #[value(name = "rp")]
    ReadingPractice,
    /// Vocabulary practice quizzes
    #[value(name = "vp")]
    Vocabulary,
    /// Literacy skills quizzes
    #[value(name = "ls")]
    LiteracySkills,
}

impl From<QuizArg> for QuizType {
    fn from(arg: QuizArg) -> Self {
        match arg {
            QuizArg::ReadingPractice => QuizType::ReadingPractice,
            QuizArg::Vocabulary => QuizType::Vocabulary,
            QuizArg::LiteracySkills => QuizType::LiteracySkills,
        }
    }
}

/// Result ordering
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortArg {
    Relevance,
    Title,
    Author,
    Level,
    Points,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Relevance => SortOrder::Relevance,
            SortArg::Title => SortOrder::Title,
            SortArg::Author => SortOrder::Author,
            SortArg::Level => SortOrder::Level,
            SortArg::Points => SortOrder::Points,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find books by title, author or series (bibliographic lookup, then catalog)
    #[command(alias = "s")]
    Search {
        /// Free-text query
        query: String,
    },

    /// Find a book by ISBN
    #[command(alias = "i")]
    Isbn {
        /// ISBN-10 or ISBN-13; hyphens and spaces are ignored
        isbn: String,
    },

    /// Submit keywords straight to the catalog's quick search
    #[command(alias = "k")]
    Keywords {
        /// Keywords as typed into the catalog
        text: String,
    },

    /// Structured catalog search
    #[command(alias = "a")]
    Advanced {
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        series: Option<String>,

        #[arg(long)]
        publisher: Option<String>,

        #[arg(long)]
        isbn: Option<String>,

        /// Lowest book level
        #[arg(long)]
        level_min: Option<f32>,

        /// Highest book level
        #[arg(long)]
        level_max: Option<f32>,

        /// Interest band (LY, MY, MY+, UY)
        #[arg(long, value_parser = parse_interest)]
        interest: Option<String>,

        /// Quiz type
        #[arg(long, value_enum)]
        quiz_type: Option<QuizArg>,

        /// Only books added in the last N days
        #[arg(long)]
        recency: Option<u32>,

        /// Sort order
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
    },

    /// Look up scanned items: a JSON array of ISBN strings and {title, author} objects
    Scan {
        /// JSON file, or "-" for stdin
        input: PathBuf,
    },

    /// Check whether a string is a valid book ISBN-13
    ValidateIsbn {
        isbn: String,
    },

    /// Show bibliographic candidates without querying the catalog
    #[command(alias = "l")]
    Lookup {
        query: String,
    },

    /// Print the effective configuration, or write it to a file
    Config {
        /// Write a configuration file here instead of printing
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn parse_interest(s: &str) -> Result<String, String> {
    let code = s.trim().to_uppercase();
    if interest_codes().any(|c| c == code) {
        Ok(code)
    } else {
        Err(format!(
            "unknown interest band '{}' (expected one of: {})",
            s,
            interest_codes().collect::<Vec<_>>().join(", ")
        ))
    }
}

/// Print all available environment variables
fn print_env_vars() {
    println!("bookfind - Environment Variables");
    println!();
    println!("API Keys:");
    println!("  OPENAI_API_KEY                      API key for candidate reranking");
    println!();
    println!("Catalog:");
    println!("  BOOKFIND_CATALOG__BASE_URL          Catalog site (default: https://www.arbookfind.co.uk/)");
    println!("  BOOKFIND_CATALOG__USER_TYPE         User type picked on entry (default: radParent)");
    println!("  BOOKFIND_CATALOG__TIMEOUT_SECS      Per-request timeout (default: 30)");
    println!("  BOOKFIND_CATALOG__FETCH_DETAILS     Fetch book detail pages (default: true)");
    println!();
    println!("Bibliographic Lookup:");
    println!("  BOOKFIND_LOOKUP__BASE_URL           Open Library compatible API (default: https://openlibrary.org/)");
    println!("  BOOKFIND_LOOKUP__LANGUAGE           Language filter (default: eng)");
    println!();
    println!("Search:");
    println!("  BOOKFIND_AGGREGATOR__MAX_CONCURRENT_PROBES  Catalog probes in flight (default: 4)");
    println!("  BOOKFIND_AGGREGATOR__QUOTE_QUERIES  Search free text as a phrase (default: true)");
    println!();
    println!("Reranking:");
    println!("  BOOKFIND_RERANK__ENABLED            Reorder candidates with a chat model (default: false)");
    println!("  BOOKFIND_RERANK__MODEL              Model name (default: gpt-4o-mini)");
    println!("  BOOKFIND_RERANK__API_KEY            Overrides OPENAI_API_KEY");
    println!();
    println!("Other Settings:");
    println!("  RUST_LOG                            Rust logging level (e.g., debug, info, warn, error)");
    std::process::exit(0);
}

/// Log level from the `[logging]` section of the configuration file, if any
fn file_log_level(config_path: Option<&Path>) -> Option<String> {
    let path = config_path.map(Path::to_path_buf).or_else(find_config_file)?;
    ConfigFile::load(&path).ok().map(|file| file.logging.level)
}

/// One-line verdict for `validate-isbn`; only ISBN-13s are accepted by the scanner
fn describe_isbn(raw: &str) -> String {
    match validate_isbn13(raw) {
        Ok(normalized) => format!("{} is a valid ISBN-13", normalized),
        Err(e) => match validate_isbn10(raw) {
            Ok(normalized) => format!(
                "{} is a valid ISBN-10, but scanned items must be ISBN-13",
                normalized
            ),
            Err(_) => e.to_string(),
        },
    }
}

fn apply_timeout(config: &mut Config, timeout: Option<u64>) {
    if let Some(secs) = timeout {
        config.catalog.timeout_secs = secs;
        config.lookup.timeout_secs = secs;
        config.rerank.timeout_secs = secs;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show environment variables and exit if requested
    if cli.env {
        print_env_vars();
    }

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => file_log_level(cli.config.as_deref()).unwrap_or_else(|| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let env_filter = if cli.quiet { "error".to_string() } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("bookfind={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    apply_timeout(&mut config, cli.timeout);

    let Some(command) = cli.command else {
        eprintln!("No command given. Run `bookfind --help` for usage.");
        return Ok(());
    };

    match command {
        Commands::ValidateIsbn { isbn } => {
            println!("{}", describe_isbn(&isbn));
            if validate_isbn13(&isbn).is_err() {
                std::process::exit(1);
            }
        }

        Commands::Config { write } => {
            let file = ConfigFile::from(config);
            match write {
                Some(path) => {
                    file.save(&path)?;
                    if !cli.quiet {
                        eprintln!("Wrote configuration to {}", path.display());
                    }
                }
                None => {
                    let mut shown = file;
                    shown.rerank.api_key = shown.rerank.api_key.map(|_| "<redacted>".to_string());
                    print!("{}", toml::to_string_pretty(&shown)?);
                }
            }
        }

        Commands::Lookup { query } => {
            let aggregator = Aggregator::from_config(&config)?;
            let candidates = aggregator.lookup_candidates(&query).await;
            if !cli.quiet {
                eprintln!("Found {} candidates", candidates.len());
            }
            output_candidates(&candidates, cli.output)?;
        }

        command => {
            let aggregator = Aggregator::from_config(&config)?;
            let books = run_search(&aggregator, command).await?;
            if !cli.quiet {
                let in_catalog = books.iter().filter(|b| b.in_catalog).count();
                eprintln!("Found {} books ({} in catalog)", books.len(), in_catalog);
            }
            output_books(&books, cli.output)?;
        }
    }

    Ok(())
}

async fn run_search(aggregator: &Aggregator, command: Commands) -> Result<Vec<BookRecord>> {
    let books = match command {
        Commands::Search { query } => aggregator.search_by_text(&query).await?,

        Commands::Isbn { isbn } => {
            if normalize_isbn(&isbn).is_err() {
                anyhow::bail!("'{}' does not look like an ISBN", isbn);
            }
            aggregator.search_by_isbn(&isbn).await?
        }

        Commands::Keywords { text } => aggregator.search_free_text(&text).await?,

        Commands::Advanced {
            title,
            author,
            series,
            publisher,
            isbn,
            level_min,
            level_max,
            interest,
            quiz_type,
            recency,
            sort,
        } => {
            let query = SearchQuery {
                title,
                author,
                series,
                publisher,
                isbn,
                level_min,
                level_max,
                interest_level: interest,
                quiz_type: quiz_type.map(Into::into),
                recency_days: recency,
                sort: sort.map(Into::into),
                ..Default::default()
            };
            if query.is_empty() {
                anyhow::bail!("advanced search needs at least one field");
            }
            aggregator.search_advanced(&query).await?
        }

        Commands::Scan { input } => {
            let items = read_scanned(&input)?;
            aggregator.search_scanned(&items).await?
        }

        Commands::ValidateIsbn { .. } | Commands::Lookup { .. } | Commands::Config { .. } => {
            Vec::new()
        }
    };
    Ok(books)
}

fn read_scanned(input: &Path) -> Result<Vec<ScannedItem>> {
    let content = if input == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };
    serde_json::from_str(&content).context("Scanned items must be a JSON array")
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

fn output_books(books: &[BookRecord], format: OutputFormat) -> Result<()> {
    match resolve_format(format) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(books)?);
        }
        OutputFormat::Plain => {
            for book in books {
                println!("{} - {}", book.title, book.author);
                if !book.in_catalog {
                    println!("  Not in catalog");
                    println!();
                    continue;
                }
                println!(
                    "  BL: {:.1}  IL: {}  AR Pts: {:.1}",
                    book.reading_level, book.interest_level, book.point_value
                );
                if let Some(ref series) = book.series {
                    println!("  Series: {}", series);
                }
                if book.word_count > 0 {
                    println!("  Words: {}", book.word_count);
                }
                if let Some(ref isbn) = book.isbn {
                    println!("  ISBN: {}", isbn);
                }
                println!();
            }
        }
        OutputFormat::Table => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Title", "Author", "BL", "IL", "Pts", "Words", "Series", "Year"]);

            for book in books {
                let row = if book.in_catalog {
                    vec![
                        Cell::new(truncate(&book.title, 45)).add_attribute(Attribute::Bold),
                        Cell::new(truncate(&book.author, 25)),
                        Cell::new(format!("{:.1}", book.reading_level)),
                        Cell::new(&book.interest_level),
                        Cell::new(format!("{:.1}", book.point_value)),
                        Cell::new(book.word_count),
                        Cell::new(truncate(book.series.as_deref().unwrap_or(""), 25)),
                        Cell::new(if book.published_year > 0 {
                            book.published_year.to_string()
                        } else {
                            String::new()
                        }),
                    ]
                } else {
                    vec![
                        Cell::new(truncate(&book.title, 45)),
                        Cell::new(truncate(&book.author, 25)),
                        Cell::new("not in catalog").add_attribute(Attribute::Italic),
                    ]
                };
                table.add_row(row);
            }
            println!("{table}");
        }
        OutputFormat::Auto => unreachable!(),
    }
    Ok(())
}

fn output_candidates(candidates: &[Candidate], format: OutputFormat) -> Result<()> {
    match resolve_format(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(candidates)?),
        OutputFormat::Plain => {
            for candidate in candidates {
                println!("{} - {}", candidate.title, candidate.author);
            }
        }
        OutputFormat::Table => {
            let mut table = comfy_table::Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Title", "Author"]);
            for candidate in candidates {
                table.add_row(vec![&candidate.title, &candidate.author]);
            }
            println!("{table}");
        }
        OutputFormat::Auto => unreachable!(),
    }
    Ok(())
}

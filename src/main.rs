//! log-distill 命令行入口
//!
//! 日志输出到 stderr，stdout 只输出报告内容，便于直接管道给其它工具。

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use log_distill::archive::LogProcessor;
use log_distill::error::eyre_to_app_error;
use log_distill::models::{BudgetStrategy, LogDocument};
use log_distill::pipeline::analyze_paths;
use log_distill::report::{save_report, OutputFormat, Report, TicketContext};
use log_distill::services::extract_error_sections;
use log_distill::utils::detect_log_format;
use log_distill::AnalyzerConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "log-distill")]
#[command(about = "Reduce large log attachments to a token-budgeted excerpt")]
#[command(version = VERSION)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter and budget log files, archives or directories
    Reduce(ReduceArgs),

    /// Print the error sections found in a log file
    Sections {
        /// Log file
        file: PathBuf,
    },

    /// Detect the format of log files
    Detect {
        /// Log files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(clap::Args)]
struct ReduceArgs {
    /// Files, zip archives or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Comma-separated literal keywords
    #[arg(short, long, value_delimiter = ',')]
    keywords: Vec<String>,

    /// Raw regex pattern (repeatable)
    #[arg(short, long = "pattern")]
    patterns: Vec<String>,

    /// Context lines on both sides of a match
    #[arg(long)]
    context_lines: Option<usize>,

    /// Context lines before a match
    #[arg(long)]
    before: Option<usize>,

    /// Context lines after a match
    #[arg(long)]
    after: Option<usize>,

    /// Case-sensitive matching
    #[arg(long)]
    case_sensitive: bool,

    /// Add the built-in error/failure patterns
    #[arg(long)]
    default_patterns: bool,

    /// Maximum lines kept by the filter (0 = unlimited)
    #[arg(long)]
    max_lines: Option<usize>,

    /// Token budget per file
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Budget strategy: smart, head-tail or head
    #[arg(long)]
    strategy: Option<BudgetStrategy>,

    /// Config file (TOML or JSON)
    #[arg(short, long, env = "LOG_DISTILL_CONFIG")]
    config: Option<PathBuf>,

    /// Ticket context JSON file
    #[arg(long)]
    ticket: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: text, markdown or json (default: by output extension)
    #[arg(long)]
    format: Option<OutputFormat>,
}

impl ReduceArgs {
    /// 命令行参数覆盖配置文件
    fn apply(&self, config: &mut AnalyzerConfig) {
        config.keywords.extend(
            self.keywords
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        );
        config.patterns.extend(self.patterns.iter().cloned());

        if let Some(lines) = self.context_lines {
            config.context_lines_before = lines;
            config.context_lines_after = lines;
        }
        if let Some(before) = self.before {
            config.context_lines_before = before;
        }
        if let Some(after) = self.after {
            config.context_lines_after = after;
        }
        if self.case_sensitive {
            config.case_sensitive = true;
        }
        if self.default_patterns {
            config.use_default_patterns = true;
        }
        if let Some(max_lines) = self.max_lines {
            config.max_lines = max_lines;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_reduce(args: ReduceArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::from_file(path).map_err(eyre_to_app_error)?,
        None => AnalyzerConfig::default(),
    };
    args.apply(&mut config);
    let config = config.validated().map_err(eyre_to_app_error)?;

    let ticket = args
        .ticket
        .as_ref()
        .map(TicketContext::from_json_file)
        .transpose()
        .map_err(eyre_to_app_error)?;

    let run = analyze_paths(&config, args.paths.as_slice())?;
    info!(
        documents = run.summary.count,
        total_lines = run.summary.total_lines,
        "Processed attachments"
    );

    let format = args.format.unwrap_or_else(|| {
        args.output
            .as_deref()
            .map(OutputFormat::from_path)
            .unwrap_or_default()
    });
    let rendered = Report::new(ticket.as_ref(), &run.reduced, run.summary).render(format)?;

    match &args.output {
        Some(path) => save_report(&rendered, path)?,
        None => println!("{}", rendered),
    }
    Ok(())
}

fn load_single(path: &Path) -> Result<Vec<LogDocument>> {
    let documents = LogProcessor::default().process_paths(&[path])?;
    if documents.is_empty() {
        warn!(file = %path.display(), "No readable log content");
    }
    Ok(documents)
}

fn run_sections(file: PathBuf) -> Result<()> {
    for document in load_single(&file)? {
        let sections = extract_error_sections(&document.content);
        println!("== {} ({} error sections) ==", document.filename, sections.len());
        for section in sections {
            println!(
                "\n-- lines {}-{} ({} lines) --",
                section.start_line, section.end_line, section.line_count
            );
            println!("{}", section.content);
        }
    }
    Ok(())
}

fn run_detect(files: Vec<PathBuf>) -> Result<()> {
    for file in &files {
        for document in load_single(file)? {
            println!(
                "{}\t{}\t{} lines",
                document.filename,
                detect_log_format(&document.content),
                document.line_count
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Reduce(args) => run_reduce(args),
        Commands::Sections { file } => run_sections(file),
        Commands::Detect { files } => run_detect(files),
    }
}

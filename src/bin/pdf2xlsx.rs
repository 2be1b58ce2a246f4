//! CLI binary for edgequake-pdf2xlsx.
//!
//! A thin shim over the library crate that maps subcommands and flags to
//! library calls and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgequake_pdf2xlsx::pipeline::input::discover_documents;
use edgequake_pdf2xlsx::{
    add_text_column, convert, convert_directory_stream, inspect, ocr_document, send_email,
    xlsx_dir_to_sqlite, xlsx_to_sqlite, CoercionPlan, ColumnNaming, ConversionConfig,
    ConversionProgressCallback, Email, MailConfig, OcrConfig, ProgressCallback,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn bar_style(unit: &str) -> ProgressStyle {
    ProgressStyle::with_template(&format!(
        "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  ⏱ {{elapsed_precise}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(TICKS)
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over page windows. Windows complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Counting pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, window_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&window_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_windows: usize) {
        self.bar.set_length(total_windows as u64);
        self.bar.set_style(bar_style("windows"));
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting tables from {total_windows} page windows…"))
        ));
    }

    fn on_window_start(&self, window_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(window_num, Instant::now());
        }
        self.bar.set_message(format!("window {window_num}"));
    }

    fn on_window_complete(&self, window_num: usize, total: usize, rows: usize) {
        let secs = self.elapsed_secs(window_num);
        self.bar.println(format!(
            "  {} Window {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            window_num,
            total,
            dim(&format!("{rows:>6} rows")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_window_error(&self, window_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(window_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Window {:>3}/{:<3}  {}  {}",
            red("✗"),
            window_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_merge_start(&self, artifacts: usize) {
        self.bar.set_prefix("Merging");
        self.bar.set_message(format!("{artifacts} intermediates"));
    }

    fn on_conversion_complete(&self, total_windows: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self
            .errors
            .load(Ordering::SeqCst)
            .max(total_windows.saturating_sub(success_count));
        if failed > 0 {
            eprintln!(
                "{} {}/{} windows extracted  ({} failed)",
                red("✘"),
                bold(&success_count.to_string()),
                total_windows,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one report into report.xlsx next to it
  pdf2xlsx convert report.pdf

  # Every PDF in a folder, 3 documents at a time
  pdf2xlsx convert ./reports --documents 3

  # Smaller windows, keep intermediates of a failed run for inspection
  pdf2xlsx convert big.pdf --window-size 50 --keep-partial

  # Page count and window plan only
  pdf2xlsx inspect report.pdf

  # Scanned document: OCR embedded images into scan.txt
  pdf2xlsx ocr scan.pdf --lang rus+eng

  # Spreadsheet into report.db (table `xlsx`), add an address column
  pdf2xlsx sqlite report.xlsx --add-column address

  # Mail a body file using credentials from ./.env
  pdf2xlsx mail boss@example.com --body email.txt

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to an existing libpdfium
  RUST_LOG          Log filter (overrides -v / -q)
  EMAIL_SENDER, EMAIL_PASSWORD, SMTP_SERVER, SMTP_PORT
                    SMTP account for `mail` (also read from .env)
  Every flag can also be set as PDF2XLSX_<FLAG>.
"#;

/// Extract tables from PDF reports into Excel spreadsheets.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2xlsx",
    version,
    about = "Extract tables from PDF reports into Excel spreadsheets",
    long_about = "Extract the tables of long PDF reports into one normalized .xlsx per document. \
Pages are processed in fixed-size windows concurrently and merged in page order. Also exports \
spreadsheets to SQLite, OCRs scanned PDFs and mails reports.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2XLSX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a PDF, or every PDF in a directory, to .xlsx.
    Convert(ConvertArgs),
    /// Print page count and the planned windows.
    Inspect(InspectArgs),
    /// OCR the images embedded in a scanned PDF into {stem}.txt.
    Ocr(OcrArgs),
    /// Load a .xlsx, or every .xlsx in a directory, into SQLite.
    Sqlite(SqliteArgs),
    /// Send an email with a plain-text body file.
    Mail(MailArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// PDF file or directory of PDFs.
    input: PathBuf,

    /// Pages per extraction window.
    #[arg(short, long, env = "PDF2XLSX_WINDOW_SIZE", default_value_t = 100)]
    window_size: usize,

    /// Windows of one document extracted concurrently.
    #[arg(short, long, env = "PDF2XLSX_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Documents converted concurrently (directory input).
    #[arg(long, env = "PDF2XLSX_DOCUMENTS", default_value_t = 2)]
    documents: usize,

    /// Header scheme of the written spreadsheets.
    #[arg(long, env = "PDF2XLSX_COLUMN_NAMING", value_enum, default_value = "generic")]
    column_naming: NamingArg,

    /// Keep intermediates written before a window failed.
    #[arg(long, env = "PDF2XLSX_KEEP_PARTIAL")]
    keep_partial: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2XLSX_PASSWORD")]
    password: Option<String>,

    /// Treat the PDF as scanned images: OCR to {stem}.txt instead.
    #[arg(long, env = "PDF2XLSX_OCR")]
    ocr: bool,

    /// Print the conversion result as JSON on stdout.
    #[arg(long, env = "PDF2XLSX_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2XLSX_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// PDF file.
    pdf: PathBuf,

    /// Pages per extraction window.
    #[arg(short, long, env = "PDF2XLSX_WINDOW_SIZE", default_value_t = 100)]
    window_size: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2XLSX_PASSWORD")]
    password: Option<String>,

    /// Print as JSON.
    #[arg(long, env = "PDF2XLSX_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct OcrArgs {
    /// Scanned PDF file.
    pdf: PathBuf,

    /// Tesseract languages, `+`-separated.
    #[arg(long, env = "PDF2XLSX_OCR_LANG", default_value = "rus+eng")]
    lang: String,

    /// Tesseract page segmentation mode.
    #[arg(long, env = "PDF2XLSX_OCR_PSM", default_value_t = 6)]
    psm: u8,

    /// Binarization threshold (0–255).
    #[arg(long, env = "PDF2XLSX_OCR_THRESHOLD", default_value_t = 150)]
    threshold: u8,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2XLSX_PASSWORD")]
    password: Option<String>,

    /// Print as JSON.
    #[arg(long, env = "PDF2XLSX_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct SqliteArgs {
    /// .xlsx file or directory of .xlsx files.
    input: PathBuf,

    /// 0-indexed columns stored as INTEGER.
    #[arg(long = "int-col", env = "PDF2XLSX_INT_COLS", value_delimiter = ',', default_values_t = [0usize])]
    int_cols: Vec<usize>,

    /// 0-indexed columns stored as ISO dates.
    #[arg(long = "date-col", env = "PDF2XLSX_DATE_COLS", value_delimiter = ',', default_values_t = [1usize, 4])]
    date_cols: Vec<usize>,

    /// chrono format of the date cells.
    #[arg(long, env = "PDF2XLSX_DATE_FORMAT", default_value = "%d.%m.%y")]
    date_format: String,

    /// Store every column as text.
    #[arg(long, env = "PDF2XLSX_TEXT_ONLY")]
    text_only: bool,

    /// After export, add an empty TEXT column with this name.
    #[arg(long, env = "PDF2XLSX_ADD_COLUMN")]
    add_column: Option<String>,

    /// Print as JSON.
    #[arg(long, env = "PDF2XLSX_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct MailArgs {
    /// Recipient address.
    recipient: String,

    /// Plain-text file holding the body.
    #[arg(long, env = "PDF2XLSX_MAIL_BODY", default_value = "email.txt")]
    body: PathBuf,

    /// Subject line.
    #[arg(long, env = "PDF2XLSX_MAIL_SUBJECT", default_value = "Test email")]
    subject: String,

    /// Directory holding the .env with SMTP credentials.
    #[arg(long, env = "PDF2XLSX_ENV_DIR", default_value = ".")]
    env_dir: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum NamingArg {
    /// column_0, column_1, …
    Generic,
    /// 0, 1, …
    Positional,
}

impl From<NamingArg> for ColumnNaming {
    fn from(v: NamingArg) -> Self {
        match v {
            NamingArg::Generic => ColumnNaming::Generic,
            NamingArg::Positional => ColumnNaming::Positional,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A local .env may carry PDF2XLSX_* defaults; it must load before parsing.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v brings them back.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || shows_progress(&cli) {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Convert(args) if args.ocr => {
            let config = OcrConfig {
                password: args.password.clone(),
                ..OcrConfig::default()
            };
            run_ocr(&args.input, &config, args.json, cli.quiet).await
        }
        Command::Convert(args) => run_convert(args, &cli).await,
        Command::Inspect(args) => run_inspect(args).await,
        Command::Ocr(args) => {
            let config = OcrConfig {
                language: args.lang.clone(),
                page_segmentation_mode: args.psm,
                threshold: args.threshold,
                password: args.password.clone(),
            };
            run_ocr(&args.pdf, &config, args.json, cli.quiet).await
        }
        Command::Sqlite(args) => run_sqlite(args, cli.quiet).await,
        Command::Mail(args) => run_mail(args, cli.quiet).await,
    }
}

fn shows_progress(cli: &Cli) -> bool {
    match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress && !args.json && !args.ocr,
        _ => false,
    }
}

// ── convert ──────────────────────────────────────────────────────────────

async fn run_convert(args: &ConvertArgs, cli: &Cli) -> Result<()> {
    let show_progress = shows_progress(cli);
    let mut builder = ConversionConfig::builder()
        .window_size(args.window_size)
        .concurrency(args.concurrency)
        .document_concurrency(args.documents)
        .column_naming(args.column_naming.into())
        .cleanup_on_failure(!args.keep_partial);
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }

    if args.input.is_dir() {
        let config = builder.build().context("Invalid configuration")?;
        return run_convert_dir(&args.input, &config, args.json, cli.quiet, show_progress).await;
    }

    if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        builder = builder.progress_callback(cb as ProgressCallback);
    }
    let config = builder.build().context("Invalid configuration")?;

    let output = convert(&args.input, &config)
        .await
        .with_context(|| format!("{} Failed to convert {}", red("✘"), args.input.display()))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} pages  {} rows × {} columns  {}ms  →  {}",
            green("✔"),
            output.page_count,
            output.stats.total_rows,
            output.stats.total_columns,
            output.stats.total_duration_ms,
            bold(&output.final_artifact.display().to_string()),
        );
    }
    Ok(())
}

async fn run_convert_dir(
    dir: &Path,
    config: &ConversionConfig,
    json: bool,
    quiet: bool,
    show_progress: bool,
) -> Result<()> {
    let total = discover_documents(dir)
        .with_context(|| format!("Cannot list {}", dir.display()))?
        .len();
    if total == 0 {
        anyhow::bail!("No .pdf files in {}", dir.display());
    }

    let bar = if show_progress {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(bar_style("documents"));
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };
    let say = |line: String| match bar {
        Some(ref b) => b.println(line),
        None if !quiet => eprintln!("{line}"),
        None => {}
    };

    let mut stream = convert_directory_stream(dir, config).context("Directory conversion failed")?;
    let mut failed = 0usize;
    let mut outputs = Vec::new();
    while let Some(outcome) = stream.next().await {
        match outcome.result {
            Ok(output) => {
                say(format!(
                    "  {} {}  {}",
                    green("✓"),
                    output.final_artifact.display(),
                    dim(&format!("{} rows", output.stats.total_rows)),
                ));
                outputs.push(output);
            }
            Err(e) => {
                failed += 1;
                say(format!("  {} {}  {}", red("✗"), outcome.source.display(), red(&e.to_string())));
            }
        }
        if let Some(ref b) = bar {
            b.inc(1);
        }
    }
    if let Some(b) = bar {
        b.finish_and_clear();
    }

    if json {
        outputs.sort_by(|a, b| a.source.cmp(&b.source));
        println!(
            "{}",
            serde_json::to_string_pretty(&outputs).context("Failed to serialise output")?
        );
    }
    if failed > 0 {
        anyhow::bail!("{} {}/{} documents failed", red("✘"), failed, total);
    }
    if !quiet {
        eprintln!("{} {} documents converted successfully", green("✔"), bold(&total.to_string()));
    }
    Ok(())
}

// ── inspect ──────────────────────────────────────────────────────────────

async fn run_inspect(args: &InspectArgs) -> Result<()> {
    let mut builder = ConversionConfig::builder().window_size(args.window_size);
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }
    let config = builder.build().context("Invalid configuration")?;
    let info = inspect(&args.pdf, &config).await.context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialise document info")?
        );
        return Ok(());
    }
    println!("File:         {}", info.source.display());
    println!("Pages:        {}", info.page_count);
    println!("Window size:  {}", info.window_size);
    println!("Windows:      {}", info.windows.len());
    for (i, (first, last)) in info.windows.iter().enumerate() {
        println!("  {}_{}.xlsx  pages {}-{}", info.stem, i + 1, first, last);
    }
    Ok(())
}

// ── ocr ──────────────────────────────────────────────────────────────────

async fn run_ocr(pdf: &Path, config: &OcrConfig, json: bool, quiet: bool) -> Result<()> {
    let output = ocr_document(pdf, config)
        .await
        .with_context(|| format!("{} Failed to OCR {}", red("✘"), pdf.display()))?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
    } else if !quiet {
        eprintln!(
            "{}  {} images  {} chars  {}ms  →  {}",
            green("✔"),
            output.images,
            output.chars,
            output.duration_ms,
            bold(&output.text_path.display().to_string()),
        );
    }
    Ok(())
}

// ── sqlite ───────────────────────────────────────────────────────────────

async fn run_sqlite(args: &SqliteArgs, quiet: bool) -> Result<()> {
    let plan = if args.text_only {
        CoercionPlan::text_only()
    } else {
        CoercionPlan {
            integer_columns: args.int_cols.clone(),
            date_columns: args.date_cols.clone(),
            date_format: args.date_format.clone(),
        }
    };
    let input = args.input.clone();
    let add_column = args.add_column.clone();

    let results = tokio::task::spawn_blocking(move || -> Result<_> {
        let results = if input.is_dir() {
            xlsx_dir_to_sqlite(&input, &plan)?
        } else {
            let result = xlsx_to_sqlite(&input, &plan);
            vec![(input.clone(), result)]
        };
        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for (path, result) in results {
            match result {
                Ok(report) => {
                    if let Some(ref name) = add_column {
                        add_text_column(&report.db_path, name)?;
                    }
                    reports.push(report);
                }
                Err(e) => failures.push((path, e)),
            }
        }
        Ok((reports, failures))
    })
    .await
    .context("SQLite task panicked")??;
    let (reports, failures) = results;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialise output")?
        );
    } else if !quiet {
        for r in &reports {
            eprintln!(
                "  {} {}  {}",
                green("✓"),
                r.db_path.display(),
                dim(&format!("{} rows × {} columns", r.rows, r.columns)),
            );
        }
    }
    for (path, e) in &failures {
        eprintln!("  {} {}  {}", red("✗"), path.display(), red(&e.to_string()));
    }
    if !failures.is_empty() {
        anyhow::bail!("{} {} spreadsheets failed", red("✘"), failures.len());
    }
    if reports.is_empty() {
        anyhow::bail!("No .xlsx files in {}", args.input.display());
    }
    if !quiet && !args.json {
        eprintln!("{} Export complete", green("✔"));
    }
    Ok(())
}

// ── mail ─────────────────────────────────────────────────────────────────

async fn run_mail(args: &MailArgs, quiet: bool) -> Result<()> {
    let config = MailConfig::from_env_file(&args.env_dir).context("SMTP credentials")?;
    let email = Email::to(args.recipient.clone())
        .subject(args.subject.clone())
        .body_path(args.body.clone());
    send_email(&config, &email)
        .await
        .with_context(|| format!("{} Failed to send email to {}", red("✘"), args.recipient))?;
    if !quiet {
        eprintln!("{} Email sent to {}", green("✔"), bold(&args.recipient));
    }
    Ok(())
}

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use revcast::api::run_http_server;
use revcast::chat::{ChatSession, send_question};
use revcast::config::{
    DEFAULT_ALLOWED_ORIGIN, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS, ProviderConfig, ServerConfig,
};
use revcast::core::{ForecastLedger, YearOrdering, compute_metrics};
use revcast::llm::OpenAiClient;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliYearOrder {
    Lexicographic,
    Numeric,
}

impl From<CliYearOrder> for YearOrdering {
    fn from(value: CliYearOrder) -> Self {
        match value {
            CliYearOrder::Lexicographic => YearOrdering::Lexicographic,
            CliYearOrder::Numeric => YearOrdering::Numeric,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "revcast",
    about = "Revenue forecast ledger with IRR/NPV metrics and an AI analyst relay"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Print row totals, per-unit rates and financial metrics for a ledger
    Report(ReportArgs),
    /// Ask a running server about a ledger
    Ask(AskArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    #[arg(long, env = "REVCAST_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,
    #[arg(
        long,
        env = "REVCAST_ALLOWED_ORIGIN",
        default_value = DEFAULT_ALLOWED_ORIGIN,
        help = "Browser origin allowed by CORS"
    )]
    allowed_origin: String,
    #[arg(
        long,
        env = "REVCAST_YEAR_ORDER",
        value_enum,
        default_value_t = CliYearOrder::Lexicographic,
        help = "How year labels are ordered into the cash-flow sequence"
    )]
    year_order: CliYearOrder,
    #[arg(
        long,
        env = "REVCAST_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Timeout for chat provider requests in seconds"
    )]
    request_timeout_secs: u64,
}

#[derive(Args, Debug)]
struct ReportArgs {
    #[arg(long, help = "Ledger JSON file; defaults to the sample forecast")]
    ledger: Option<PathBuf>,
    #[arg(long, help = "Re-derive total gross revenue from its contributors first")]
    recompute: bool,
    #[arg(
        long,
        env = "REVCAST_YEAR_ORDER",
        value_enum,
        default_value_t = CliYearOrder::Lexicographic
    )]
    year_order: CliYearOrder,
}

#[derive(Args, Debug)]
struct AskArgs {
    #[arg(long, env = "REVCAST_SERVER", default_value = "http://127.0.0.1:8000")]
    server: String,
    #[arg(long, help = "Ledger JSON file; defaults to the sample forecast")]
    ledger: Option<PathBuf>,
    #[arg(help = "Question to ask; omit to read questions from stdin, one per line")]
    question: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Report(args) => report(args),
        Command::Ask(args) => ask(args).await,
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("revcast=info,tower_http=info"));
    let json = matches!(
        std::env::var("REVCAST_LOG_JSON").as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    );

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_ledger(path: Option<&Path>) -> anyhow::Result<ForecastLedger> {
    let Some(path) = path else {
        return Ok(ForecastLedger::seed());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read ledger {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("invalid ledger JSON in {}", path.display()))
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let provider_config =
        ProviderConfig::from_env(Duration::from_secs(args.request_timeout_secs));
    if provider_config.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; /api/chat will fail until it is");
    }
    let provider = OpenAiClient::new(&provider_config).context("failed to build HTTP client")?;
    let config = ServerConfig::new(
        args.bind,
        args.port,
        &args.allowed_origin,
        args.year_order.into(),
    )?;

    run_http_server(config, Arc::new(provider))
        .await
        .context("server error")
}

fn report(args: ReportArgs) -> anyhow::Result<()> {
    let mut ledger = load_ledger(args.ledger.as_deref())?;
    if args.recompute {
        ledger.recompute_totals();
    }

    println!("{:<26} {:>20} {:>14}", "Metric", "Total", "Per Unit");
    for row in ledger.summary() {
        println!(
            "{:<26} {:>20} {:>14}",
            row.label,
            row.formatted_total,
            row.formatted_per_unit.unwrap_or_default()
        );
    }

    let metrics = compute_metrics(&ledger.total_gross_revenue, args.year_order.into());
    let display = metrics.display();
    println!();
    println!("Cash flows: {:?}", metrics.cash_flows);
    println!(
        "IRR: {}{}",
        display.irr,
        if metrics.irr_converged { "" } else { " (no solution)" }
    );
    println!("NPV @ 10%: {}", display.npv);
    println!("Peak equity: {}", display.peak_equity);
    Ok(())
}

async fn ask(args: AskArgs) -> anyhow::Result<()> {
    let ledger = load_ledger(args.ledger.as_deref())?;
    let client = reqwest::Client::new();
    let mut session = ChatSession::default();

    if !args.question.is_empty() {
        let question = args.question.join(" ");
        ask_once(&client, &args.server, &ledger, &mut session, &question).await;
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        ask_once(&client, &args.server, &ledger, &mut session, &line).await;
    }
    Ok(())
}

async fn ask_once(
    client: &reqwest::Client,
    server: &str,
    ledger: &ForecastLedger,
    session: &mut ChatSession,
    question: &str,
) {
    if !session.begin(question) {
        return;
    }
    let reply = send_question(client, server, question, ledger).await;
    session.finish(reply);

    if let Some(answer) = session.messages().last() {
        println!("{}", answer.content);
    }
    if let Some(error) = session.last_error() {
        eprintln!("error: {error}");
    } else if let Some(metrics) = session.last_metrics() {
        println!(
            "[IRR {} | NPV {} | Peak equity {}]",
            metrics.irr, metrics.npv, metrics.peak_equity
        );
    }
}

//! tauro: terminal front end for the Tauro Q&A client.
//! Asks one question given on the command line, or reads questions from stdin
//! line by line, and types each answer out on stdout.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tauro_client::{
    config, Config, HttpClient, Session, SessionEvent, SessionEvents, SubmitOutcome,
};
use tokio::io::AsyncBufReadExt;

const TITLE: &str = "AI Customer Support Agent";

/// Ask the Tauro assistant a question and watch the answer being typed out.
#[derive(Parser, Debug)]
#[command(name = "tauro", version, about)]
struct Args {
    /// Config file (default: ~/.tauro/config.yaml).
    #[arg(long, env = "TAURO_CONFIG")]
    config: Option<PathBuf>,

    /// Answer service address, overrides the config file.
    #[arg(long)]
    base_url: Option<String>,

    /// Delay between revealed characters in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Only check that the answer service is up.
    #[arg(long)]
    health: bool,

    /// Verbose logging on stderr.
    #[arg(short, long)]
    verbose: bool,

    /// Question to ask. Without it, questions are read from stdin, one per line.
    question: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

/// Resolve and load the config: `--config`/`TAURO_CONFIG` must exist, the
/// default path may be missing.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }
    match config::default_config_path() {
        Some(path) => config::load_or_default(&path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let cfg = load_config(args.config.as_deref())?;
    let base_url = args
        .base_url
        .clone()
        .unwrap_or_else(|| cfg.base_url().to_string());
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| cfg.reveal_interval());
    tracing::debug!(%base_url, ?interval, "starting");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create runtime")?;

    let client = HttpClient::new(base_url).context("failed to build HTTP client")?;
    if args.health {
        return rt.block_on(check_health(&client));
    }

    let question = args.question;
    rt.block_on(async move {
        let (session, mut events) = Session::new(client, interval);
        let stdout = io::stdout();
        let mut out = stdout.lock();

        if let Some(question) = question {
            let outcome = ask(&session, &mut events, question, &mut out).await?;
            return Ok(if outcome == SubmitOutcome::Answered {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }

        eprintln!("{TITLE}");
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
            ask(&session, &mut events, line, &mut out).await?;
        }
        Ok(ExitCode::SUCCESS)
    })
}

async fn check_health(client: &HttpClient) -> anyhow::Result<ExitCode> {
    match client.health().await {
        Ok(status) => {
            println!("{}: {}", client.base_url(), status.status);
            Ok(if status.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(e) => {
            eprintln!("Error: health check failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Submit `question` and render the cycle's events until the answer is fully
/// typed out or the attempt ended without one.
async fn ask(
    session: &Session<HttpClient>,
    events: &mut SessionEvents,
    question: String,
    out: &mut impl Write,
) -> anyhow::Result<SubmitOutcome> {
    session.set_question(question);
    let submit = session.submit();
    tokio::pin!(submit);

    let mut outcome = None;
    let mut finished = false;
    loop {
        tokio::select! {
            o = &mut submit, if outcome.is_none() => outcome = Some(o),
            Some(event) = events.recv() => finished |= render(event, out)?,
            else => break,
        }
        match outcome {
            Some(SubmitOutcome::Answered) if !finished && session.snapshot().revealing => {}
            Some(_) => break,
            None => {}
        }
    }
    while let Ok(event) = events.try_recv() {
        render(event, out)?;
    }
    Ok(outcome.unwrap_or(SubmitOutcome::Failed))
}

/// Render one event. Returns true once a reveal has finished.
fn render(event: SessionEvent, out: &mut impl Write) -> io::Result<bool> {
    match event {
        SessionEvent::Pending(true) => eprintln!("Loading..."),
        SessionEvent::Failed(message) => eprintln!("{message}"),
        SessionEvent::Answered(answer) if answer.is_empty() => writeln!(out)?,
        SessionEvent::Typed(ch) => {
            write!(out, "{ch}")?;
            out.flush()?;
        }
        SessionEvent::RevealFinished => {
            writeln!(out)?;
            out.flush()?;
            return Ok(true);
        }
        SessionEvent::Cleared | SessionEvent::Pending(false) | SessionEvent::Answered(_) => {}
    }
    Ok(false)
}

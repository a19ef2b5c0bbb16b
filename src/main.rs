use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use scam_guard::config::{load_config, Config};
use scam_guard::display::{keyword_cloud, render_report, summary_line};
use scam_guard::{Analyzer, Error};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "scam-guard",
    about = "Assess romance and investment scam risk in chat transcripts",
    version
)]
struct Cli {
    /// TOML config with [thresholds], [dictionary] and [model] sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score transcripts, one result per file (reads stdin if none provided)
    Analyze(AnalyzeArgs),
    /// Interactive session: score each line and ask the hosted model about it
    Chat,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// File paths to analyze
    files: Vec<String>,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Also ask the hosted model for an open-ended assessment
    #[arg(long)]
    ask: bool,

    /// Show detected keywords in random order
    #[arg(long)]
    shuffle: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Report,
}

fn init_tracing() {
    // stdout carries results, so logs go to stderr and only on request
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn read_inputs(files: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    if files.is_empty() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read stdin")?;
        return Ok(vec![("<stdin>".to_string(), input)]);
    }
    files
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {path}"))?;
            Ok((path.clone(), text))
        })
        .collect()
}

async fn run_analyze(config: &Config, analyzer: &Analyzer, args: AnalyzeArgs) -> anyhow::Result<ExitCode> {
    let inputs = read_inputs(&args.files)?;
    let provider = if args.ask {
        match config.provider() {
            Ok(p) => Some(p),
            Err(e) => {
                eprintln!("{e}; skipping model analysis");
                None
            }
        }
    } else {
        None
    };

    let mut failed = false;
    for (label, text) in &inputs {
        let mut session = config.session();
        let asking = async {
            match &provider {
                Some(p) => Some(session.ask(p, text).await),
                None => None,
            }
        };
        let (analysis, reply) = tokio::join!(async { analyzer.analyze(text) }, asking);

        let analysis = match analysis {
            Ok(a) => a,
            Err(e) => {
                eprintln!("{label}: {e}");
                failed = true;
                continue;
            }
        };
        let cloud = args
            .shuffle
            .then(|| keyword_cloud(&analysis.match_result, &mut rand::thread_rng()));

        match args.format {
            Format::Json => {
                let mut value = serde_json::to_value(&analysis)?;
                if let Some(cloud) = &cloud {
                    value["keyword_cloud"] = serde_json::to_value(cloud)?;
                }
                match reply {
                    Some(Ok(text)) => value["model_reply"] = serde_json::Value::String(text),
                    Some(Err(e)) => value["model_error"] = serde_json::Value::String(e.to_string()),
                    None => {}
                }
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Format::Report => {
                if inputs.len() > 1 {
                    println!("== {label} ==");
                }
                print!("{}", render_report(&analysis, cloud.as_deref()));
                match reply {
                    Some(Ok(text)) => println!("\nAI 分析：\n{text}"),
                    Some(Err(e)) => println!("\nAI 分析暫時無法使用：{e}"),
                    None => {}
                }
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn run_chat(config: &Config, analyzer: &Analyzer) -> anyhow::Result<ExitCode> {
    let provider = config
        .provider()
        .context("chat needs a hosted model")?;
    let mut session = config.session();

    println!("貼上對話內容後按 Enter。/clear 清除對話紀錄，/quit 離開。");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "/quit" => break,
            "/clear" => {
                session.clear();
                println!("已清除對話紀錄。");
                continue;
            }
            _ => {}
        }

        let (analysis, reply) = tokio::join!(
            async { analyzer.analyze(line) },
            session.ask(&provider, line)
        );
        match analysis {
            Ok(a) => println!("{}", summary_line(&a)),
            Err(Error::InvalidInput) => {
                println!("請先輸入對話內容");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        match reply {
            Ok(text) => println!("\n{text}\n"),
            Err(e) => eprintln!("AI 分析暫時無法使用：{e}"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let analyzer = config.analyzer().context("invalid keyword dictionary")?;

    match cli.command {
        Command::Analyze(args) => run_analyze(&config, &analyzer, args).await,
        Command::Chat => run_chat(&config, &analyzer).await,
    }
}

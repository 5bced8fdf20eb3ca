use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use fieldops_cli::{
    init_tracing, parse_target, simulate, synthetic_directory, CliConfig, JsonDirectory,
    SimulatedSender, SimulationRequest,
};
use fieldops_fanout::{BroadcastDraft, Broadcaster, RawContent};
use fieldops_types::{
    DeliveryOptions, DeliveryReport, DirectorySnapshot, MediaKind, PollPayload,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

fn source_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("directory")
                .long("directory")
                .value_parser(value_parser!(PathBuf))
                .help("JSON array of recipients (defaults to a synthetic directory)"),
        )
        .arg(
            Arg::new("recipients")
                .long("recipients")
                .default_value("250")
                .value_parser(value_parser!(usize))
                .help("Size of the synthetic directory"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .default_value("42")
                .value_parser(value_parser!(u64))
                .help("Random seed for reproducibility"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("TOML settings with [fanout] and [simulator] sections"),
        )
}

fn content_args(command: Command) -> Command {
    command
        .arg(Arg::new("text").long("text").help("Text announcement"))
        .arg(
            Arg::new("media")
                .long("media")
                .value_names(["KIND", "FILE_ID"])
                .num_args(2)
                .help("Attachment: photo, video, document, audio or voice, then a file id"),
        )
        .arg(
            Arg::new("caption")
                .long("caption")
                .help("Caption for the attachment"),
        )
        .arg(
            Arg::new("poll")
                .long("poll")
                .help("Poll question"),
        )
        .arg(
            Arg::new("option")
                .long("option")
                .action(ArgAction::Append)
                .help("Poll option (repeat 2 to 10 times)"),
        )
        .arg(
            Arg::new("quiz-answer")
                .long("quiz-answer")
                .value_parser(value_parser!(usize))
                .help("Make the poll a quiz with this zero-based correct option"),
        )
        .arg(
            Arg::new("quiz")
                .long("quiz")
                .action(ArgAction::SetTrue)
                .help("Quiz mode (requires --quiz-answer)"),
        )
        .arg(
            Arg::new("multi-answer")
                .long("multi-answer")
                .action(ArgAction::SetTrue)
                .help("Allow several answers (ignored for quizzes)"),
        )
        .arg(
            Arg::new("silent")
                .long("silent")
                .action(ArgAction::SetTrue)
                .help("Deliver without notification sound"),
        )
        .arg(
            Arg::new("pin")
                .long("pin")
                .action(ArgAction::SetTrue)
                .help("Pin the message after delivery"),
        )
}

fn cli() -> Command {
    Command::new("fieldops")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rate-limited broadcast simulator for field technician announcements")
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand_required(true)
        .subcommand(content_args(source_args(
            Command::new("simulate")
                .about("Dispatch a broadcast against the simulated provider")
                .arg(
                    Arg::new("target")
                        .long("target")
                        .default_value("all")
                        .help("all, active, pending, blocked or region:<name>"),
                )
                .arg(
                    Arg::new("rate")
                        .long("rate")
                        .value_parser(value_parser!(u32))
                        .help("Override sends per second"),
                )
                .arg(
                    Arg::new("verbose")
                        .long("verbose")
                        .action(ArgAction::SetTrue)
                        .help("Print every progress render in full"),
                )
                .arg(
                    Arg::new("save-report")
                        .long("save-report")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the final report as JSON"),
                ),
        )))
        .subcommand(content_args(source_args(
            Command::new("preview").about("Show the confirmation screen without sending"),
        )))
        .subcommand(
            Command::new("report")
                .about("Render a saved report")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON report written by simulate --save-report"),
                ),
        )
}

fn load_sources(args: &ArgMatches) -> anyhow::Result<(DirectorySnapshot, CliConfig, u64)> {
    let seed = args.get_one::<u64>("seed").copied().context("missing --seed")?;
    let directory = match args.get_one::<PathBuf>("directory") {
        Some(path) => JsonDirectory::load(path)?.snapshot().clone(),
        None => {
            let count = args
                .get_one::<usize>("recipients")
                .copied()
                .context("missing --recipients")?;
            synthetic_directory(count, seed)
        }
    };
    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    Ok((directory, config, seed))
}

fn parse_media_kind(kind: &str) -> anyhow::Result<MediaKind> {
    Ok(match kind.to_ascii_lowercase().as_str() {
        "photo" => MediaKind::Photo,
        "video" => MediaKind::Video,
        "document" => MediaKind::Document,
        "audio" => MediaKind::Audio,
        "voice" => MediaKind::Voice,
        other => bail!("unknown media kind '{other}'"),
    })
}

fn content_from(args: &ArgMatches) -> anyhow::Result<(RawContent, DeliveryOptions)> {
    let mut content = RawContent {
        text: args.get_one::<String>("text").cloned(),
        caption: args.get_one::<String>("caption").cloned(),
        ..RawContent::default()
    };

    if let Some(mut media) = args.get_many::<String>("media") {
        let (Some(kind), Some(file_id)) = (media.next(), media.next()) else {
            bail!("--media needs KIND and FILE_ID");
        };
        content.attachments.push(fieldops_fanout::RawAttachment::new(
            parse_media_kind(kind)?,
            file_id.clone(),
        ));
    }

    if let Some(question) = args.get_one::<String>("poll") {
        let options: Vec<String> = args
            .get_many::<String>("option")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let mut poll = PollPayload::new(question.clone(), options)
            .with_multi_answer(args.get_flag("multi-answer"));
        let answer = args.get_one::<usize>("quiz-answer").copied();
        if args.get_flag("quiz") || answer.is_some() {
            poll = poll.as_quiz(answer);
        }
        content.poll = Some(poll);
    }

    let options = DeliveryOptions {
        silent: args.get_flag("silent"),
        pin_after_send: args.get_flag("pin"),
    };
    Ok((content, options))
}

async fn run_simulate(args: &ArgMatches) -> anyhow::Result<bool> {
    let (directory, mut config, seed) = load_sources(args)?;
    if let Some(rate) = args.get_one::<u32>("rate") {
        config.fanout = config.fanout.with_sends_per_second(*rate);
    }
    let target = args.get_one::<String>("target").context("missing --target")?;
    let rule = parse_target(target)?;
    let (content, options) = content_from(args)?;

    println!("Running broadcast simulation...");
    println!("Recipients in directory: {}", directory.len());
    println!("Target: {}", rule.describe());
    println!("Seed: {seed}");
    println!();

    let outcome = simulate(SimulationRequest {
        directory,
        config,
        seed,
        content,
        options,
        rule,
        verbose: args.get_flag("verbose"),
    })
    .await?;

    println!();
    if let Some(text) = &outcome.transcript_tail {
        println!("{text}");
    }
    println!();
    println!("Provider calls:");
    println!("  Sends: {}", outcome.provider.sends);
    println!("  Polls: {}", outcome.provider.polls);
    println!("  Pins: {}", outcome.provider.pins);
    println!("  Flood control: {}", outcome.provider.backpressure);
    println!("  Refused: {}", outcome.provider.refused);

    if let (Some(report), Some(path)) = (&outcome.report, args.get_one::<PathBuf>("save-report")) {
        let json = serde_json::to_string_pretty(report).context("serializing report")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "report saved");
    }
    Ok(outcome.succeeded())
}

async fn run_preview(args: &ArgMatches) -> anyhow::Result<()> {
    let (directory, config, seed) = load_sources(args)?;
    let (content, options) = content_from(args)?;

    let broadcaster = Broadcaster::new(
        config.fanout,
        Arc::new(JsonDirectory::new(directory)),
        Arc::new(SimulatedSender::new(config.simulator, seed)),
    );
    let summary = broadcaster.summary().await?;
    let draft = broadcaster.draft(content, options)?;

    println!("{}", draft.confirmation_text(&summary));
    println!();
    println!("Regions (active/total):");
    for line in BroadcastDraft::region_choices(&summary) {
        println!("  📍 {line}");
    }
    draft.cancel();
    Ok(())
}

fn run_report(args: &ArgMatches) -> anyhow::Result<()> {
    let path = args.get_one::<PathBuf>("input").context("missing report path")?;
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let report: DeliveryReport =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    println!("{}", report.render());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));

    match matches.subcommand() {
        Some(("simulate", args)) => {
            if run_simulate(args).await? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Some(("preview", args)) => run_preview(args).await.map(|()| ExitCode::SUCCESS),
        Some(("report", args)) => run_report(args).map(|()| ExitCode::SUCCESS),
        _ => Ok(ExitCode::SUCCESS),
    }
}

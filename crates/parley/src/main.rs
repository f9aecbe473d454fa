//! A terminal viewer for watching a dialogue between two philosophers.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use parley::StageBuilder;
use parley::core::HealthStatus;
use parley::core::conversation::{
    ConversationConfig, ConversationId, SpeakerRole,
};
use parley::core::events::{ConversationEvent, ViewerId};
use tokio::io::{self, AsyncBufReadExt};

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let stage = StageBuilder::from_env().build();

    let args: Vec<String> = env::args().skip(1).collect();
    let [philosopher1, author1, philosopher2, author2, topic] =
        match args.as_slice() {
            [a, b, c, d, rest @ ..] if !rest.is_empty() => {
                [a, b, c, d, &rest.join(" ")].map(String::from)
            }
            _ => {
                print_usage(&stage);
                return;
            }
        };

    let model = env::var("PARLEY_MODEL")
        .unwrap_or_else(|_| "llama3.2:3b".to_owned());

    let report = stage.hub().health().await;
    if report.status == HealthStatus::Unhealthy {
        eprintln!(
            "backend is unreachable: {}",
            report.detail.unwrap_or_default()
        );
        return;
    }
    if !report.models.iter().any(|m| *m == model) {
        eprintln!(
            "warning: model {model} is not in the backend's list: {:?}",
            report.models
        );
    }

    let catalog = stage.hub().catalog();
    let names = [
        format!(
            "{} ({})",
            catalog.philosopher(&philosopher1).name,
            catalog.author(&author1).name
        ),
        format!(
            "{} ({})",
            catalog.philosopher(&philosopher2).name,
            catalog.author(&author2).name
        ),
    ];

    let config = ConversationConfig {
        philosopher1,
        author1,
        model1: model.clone(),
        philosopher2,
        author2,
        model2: model,
        topic: topic.clone(),
    };

    let id = match stage.open(config).await {
        Ok(id) => id,
        Err(err) => {
            eprintln!("cannot open the conversation: {err}");
            return;
        }
    };
    let mut viewer = match stage.hub().join(ViewerId::new(), id, "cli") {
        Ok(viewer) => viewer,
        Err(err) => {
            eprintln!("cannot join the conversation: {err}");
            return;
        }
    };

    println!("{}", format!("topic: {topic}").bold());

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let mut progress_bar: Option<ProgressBar> = None;
    let mut turns_this_round = 0;

    while let Some(event) = viewer.recv().await {
        match event {
            ConversationEvent::Snapshot { snapshot } => {
                for turn in &snapshot.history {
                    print_speaker(turn.role, &names);
                    println!("{}", turn.content);
                }
            }
            ConversationEvent::GenerationStart { speaker } => {
                print_speaker(speaker, &names);
                let bar = ProgressBar::new_spinner();
                bar.set_style(progress_style.clone());
                bar.set_message("composing...");
                bar.enable_steady_tick(Duration::from_millis(100));
                progress_bar = Some(bar);
            }
            ConversationEvent::ContentFragment { speaker, text } => {
                if let Some(bar) = progress_bar.take() {
                    bar.finish_and_clear();
                }
                let styled = match speaker {
                    SpeakerRole::First => text.bright_cyan().to_string(),
                    SpeakerRole::Second => text.bright_magenta().to_string(),
                };
                print!("{styled}");
                std::io::stdout().flush().unwrap();
            }
            ConversationEvent::GenerationComplete { .. } => {
                if let Some(bar) = progress_bar.take() {
                    bar.finish_and_clear();
                }
                println!();
                turns_this_round += 1;
                if turns_this_round == 2 {
                    turns_this_round = 0;
                    if !prompt_next_round(&stage, id).await {
                        break;
                    }
                }
            }
            ConversationEvent::GenerationError { message } => {
                if let Some(bar) = progress_bar.take() {
                    bar.finish_and_clear();
                }
                println!("{}", format!("generation failed: {message}").red());
                turns_this_round = 0;
                if !prompt_next_round(&stage, id).await {
                    break;
                }
            }
            ConversationEvent::ConversationClosed => {
                println!("{}", "the conversation has ended".dimmed());
                break;
            }
        }
    }
}

fn print_speaker(speaker: SpeakerRole, names: &[String; 2]) {
    let (bar, name) = match speaker {
        SpeakerRole::First => {
            (BAR_CHAR.bright_cyan().to_string(), &names[0])
        }
        SpeakerRole::Second => {
            (BAR_CHAR.bright_magenta().to_string(), &names[1])
        }
    };
    println!("\n{bar}{}", name.bold());
}

/// Returns `false` when the viewer loop should stop right away. After
/// `q` the loop keeps running until the closed event arrives.
async fn prompt_next_round(stage: &parley::Stage, id: ConversationId) -> bool {
    print!("\n[Enter] one more round, [q] to end: ");
    std::io::stdout().flush().unwrap();

    let Some(line) = read_line().await else {
        stage.hub().close(id).ok();
        return false;
    };
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") {
        stage.hub().close(id).ok();
        return true;
    }
    stage.hub().continue_conversation(id).is_ok()
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

fn print_usage(stage: &parley::Stage) {
    let catalog = stage.hub().catalog();
    eprintln!(
        "usage: parley <philosopher1> <author1> <philosopher2> <author2> \
         <topic...>"
    );
    eprintln!("\nphilosophers: {}", catalog.philosopher_keys().join(", "));
    eprintln!("\nauthors: {}", catalog.author_keys().join(", "));
}

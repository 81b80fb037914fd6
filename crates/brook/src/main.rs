//! An interactive terminal client for a brook chat backend.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::pin::pin;
use std::time::Duration;

use brook_core::session::{
    EntryKind, ReasoningTime, Speaker, TranscriptEntry,
};
use brook_core::{CancelToken, HistoryDirectory, Session, submit};
use brook_http_backend::{BackendConfigBuilder, HttpBackend};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(token) = env::var("BROOK_TOKEN") else {
        eprintln!("BROOK_TOKEN environment variable is not set");
        return;
    };
    let Ok(base_url) = env::var("BROOK_BASE_URL") else {
        eprintln!("BROOK_BASE_URL environment variable is not set");
        return;
    };
    let model = env::var("BROOK_MODEL")
        .unwrap_or_else(|_| "deepseek-r1:7b".to_string());

    let config = BackendConfigBuilder::with_token(token)
        .with_base_url(base_url)
        .build();
    let backend = HttpBackend::new(config);

    let mut session = Session::new(model);
    let mut directory = HistoryDirectory::new(backend.clone());
    if let Err(err) = directory.refresh().await {
        warn!("failed to list histories: {err}");
    }

    print_help();

    loop {
        print!("{} > ", session.selected_model().bright_black());
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !run_command(command, &mut session, &mut directory).await {
                break;
            }
            continue;
        }

        run_prompt(&mut session, &backend, line).await;
    }
}

async fn run_prompt(
    session: &mut Session,
    backend: &HttpBackend,
    prompt: &str,
) {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style);
    progress_bar.set_message("🤔 Thinking... (Ctrl-C to stop)");
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let already_shown = session.conversation().transcript().len();

    let cancel = CancelToken::new();
    let res = {
        let mut submit_fut = pin!(submit(session, backend, prompt, &cancel));
        loop {
            select! {
                res = &mut submit_fut => break res,
                _ = tokio::signal::ctrl_c() => {
                    cancel.cancel();
                }
            }
        }
    };
    progress_bar.finish_and_clear();

    match res {
        // The prompt itself is already on screen; render what the turn
        // added after it.
        Ok(_) => render_entries(session, already_shown + 1),
        Err(err) => eprintln!("{err}"),
    }
}

async fn run_command(
    command: &str,
    session: &mut Session,
    directory: &mut HistoryDirectory<HttpBackend>,
) -> bool {
    let mut parts = command.splitn(2, ' ');
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().unwrap_or_default().trim();

    match name {
        "new" => {
            session.start_new_conversation();
            if let Err(err) = directory.refresh().await {
                warn!("failed to list histories: {err}");
            }
            println!("started a new conversation");
        }
        "histories" => {
            if let Err(err) = directory.refresh().await {
                eprintln!("failed to list histories: {err}");
                return true;
            }
            if directory.summaries().is_empty() {
                println!("no stored conversations");
            }
            for (idx, summary) in directory.summaries().iter().enumerate() {
                println!(
                    "{:>3}. {} {} {}",
                    idx + 1,
                    summary.created_at.format("%Y-%m-%d %H:%M"),
                    summary.title.bright_white(),
                    summary.model.bright_black(),
                );
            }
        }
        "open" => {
            let Some(history_id) = summary_id_by_index(directory, arg) else {
                eprintln!("usage: /open <index from /histories>");
                return true;
            };
            directory.open(session, &history_id).await;
            render_entries(session, 0);
        }
        "delete" => {
            let Some(history_id) = summary_id_by_index(directory, arg) else {
                eprintln!("usage: /delete <index from /histories>");
                return true;
            };
            match directory.remove(session, &history_id).await {
                Ok(()) => println!("deleted {history_id}"),
                Err(err) => eprintln!("failed to delete: {err}"),
            }
        }
        "models" => match directory.models().await {
            Ok(models) => {
                for model in models {
                    println!("{model}");
                }
            }
            Err(err) => eprintln!("failed to list models: {err}"),
        },
        "model" => {
            if arg.is_empty() {
                println!("{}", session.selected_model());
            } else {
                session.set_selected_model(arg);
            }
        }
        "quit" => return false,
        _ => print_help(),
    }
    true
}

fn summary_id_by_index(
    directory: &HistoryDirectory<HttpBackend>,
    arg: &str,
) -> Option<String> {
    let idx = arg.parse::<usize>().ok()?.checked_sub(1)?;
    let summary = directory.summaries().get(idx)?;
    Some(summary.history_id.clone())
}

fn render_entries(session: &Session, from: usize) {
    for entry in &session.conversation().transcript()[from..] {
        render_entry(entry);
    }
}

fn render_entry(entry: &TranscriptEntry) {
    if entry.kind == EntryKind::Error {
        println!(
            "{}⚠️  {}",
            BAR_CHAR.bright_red(),
            entry.answer.bright_red()
        );
        return;
    }

    match entry.speaker {
        Speaker::User => {
            println!(
                "{}🧑 {}",
                BAR_CHAR.bright_green(),
                entry.answer.bright_white()
            );
        }
        Speaker::Assistant => {
            if !entry.reasoning.is_empty() && entry.reasoning_expanded {
                let label = match entry.reasoning_time {
                    ReasoningTime::Seconds(secs) => {
                        format!("thought for {secs}s")
                    }
                    ReasoningTime::Unspecified => "thought".to_owned(),
                    ReasoningTime::Unknown => "thinking".to_owned(),
                };
                println!(
                    "{}{}",
                    BAR_CHAR.bright_black(),
                    label.bright_black().italic()
                );
                for line in entry.reasoning.lines() {
                    println!(
                        "{}{}",
                        BAR_CHAR.bright_black(),
                        line.bright_black()
                    );
                }
            }
            println!(
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                entry.answer.bright_white()
            );
        }
        Speaker::System => {
            println!("{}{}", BAR_CHAR.bright_yellow(), entry.answer);
        }
    }
}

fn print_help() {
    println!(
        "commands: /new /histories /open <n> /delete <n> /models /model [name] /quit"
    );
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

//! A simple program demonstrates how to use `xylos` as a library.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::pin::pin;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::time::sleep;
use xylos::core::conversation::{Rejection, Role, Turn};
use xylos::providers::{
    GeminiConfigBuilder, GeminiProvider, OpenAIConfigBuilder, OpenAIProvider,
};
use xylos::{FileStore, MemoryStore, Session, SessionBuilder, Theme};

const BAR_CHAR: &str = "▎";

const SYSTEM_PROMPT: &str = "You are Xylos, a friendly assistant. Keep \
    answers short. Use **bold**, *italics*, `- ` lists and fenced code \
    blocks when they help.";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let builder = match env::var("XYLOS_PROVIDER").as_deref() {
        Ok("gemini") => {
            let Some(builder) = gemini_session() else {
                return;
            };
            builder
        }
        Ok("openai") | Err(_) => {
            let Some(builder) = openai_session() else {
                return;
            };
            builder
        }
        Ok(other) => {
            eprintln!("unknown provider `{other}`, expected openai or gemini");
            return;
        }
    };

    let builder = match env::var("XYLOS_MAX_TURNS") {
        Ok(value) => match value.parse() {
            Ok(max_user_turns) => builder.with_max_user_turns(max_user_turns),
            Err(_) => {
                eprintln!("XYLOS_MAX_TURNS must be a number, got `{value}`");
                return;
            }
        },
        Err(_) => builder,
    };

    let builder = match FileStore::default_path() {
        Some(path) => builder.with_store(FileStore::new(path)),
        None => {
            warn!("no data directory, history will not be kept");
            builder.with_store(MemoryStore::new())
        }
    };
    let session = builder
        .with_system_prompt(SYSTEM_PROMPT)
        .with_failure_message("Sorry, I couldn't process your request.")
        .build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let mut show_html = false;

    println!(
        "{}, {} I'm here to help, what can I do for you?",
        "Hello".bright_blue(),
        "Buddy.".bright_magenta()
    );

    loop {
        print!("> ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim_end_matches(['\r', '\n']);

        match line.trim() {
            "/theme" => {
                let theme = session.toggle_theme();
                println!("Switched to the {theme} theme.");
                continue;
            }
            "/history" => {
                print_history(&session);
                continue;
            }
            "/html" => {
                show_html = !show_html;
                let state = if show_html { "on" } else { "off" };
                println!("HTML output is {state}.");
                continue;
            }
            _ => {}
        }

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🤔 Xylos is typing...");

        let mut reply = pin!(session.send_message(line));
        let result = loop {
            progress_bar.inc(1);
            select! {
                result = &mut reply => break result,
                _ = sleep(Duration::from_millis(100)) => {}
            }
        };

        // Finish the progress bar before printing anything else.
        progress_bar.finish_and_clear();

        match result {
            Ok(turn) => print_turn(&session, &turn, show_html),
            Err(Rejection::EmptyInput) => {}
            Err(rejection) => println!("{}", rejection.bright_yellow()),
        }

        if session.turn_limit_alert() {
            println!(
                "{}🔔 You have used all {} messages of this conversation.",
                BAR_CHAR.bright_red(),
                session.conversation().max_user_turns()
            );
            session.acknowledge_alert();
        }
    }
}

fn openai_session() -> Option<SessionBuilder> {
    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return None;
    };
    let mut config = OpenAIConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Ok(model) = env::var("OPENAI_MODEL") {
        config = config.with_model(model);
    }
    let provider = OpenAIProvider::new(
        config.with_retry_timeout(Duration::from_secs(30)).build(),
    );
    Some(SessionBuilder::with_model_provider(provider))
}

fn gemini_session() -> Option<SessionBuilder> {
    let Ok(api_key) = env::var("GEMINI_API_KEY") else {
        eprintln!("GEMINI_API_KEY environment variable is not set");
        return None;
    };
    let mut config = GeminiConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Ok(model) = env::var("GEMINI_MODEL") {
        config = config.with_model(model);
    }
    let provider = GeminiProvider::new(
        config.with_retry_timeout(Duration::from_secs(30)).build(),
    );
    Some(SessionBuilder::with_model_provider(provider))
}

fn print_turn(session: &Session, turn: &Turn, show_html: bool) {
    let text = if show_html {
        match session.render().last() {
            Some(rendered) => rendered.html.clone(),
            None => turn.content().to_owned(),
        }
    } else {
        turn.content().to_owned()
    };

    match turn.role() {
        Role::Assistant => {
            let bar = BAR_CHAR.bright_cyan();
            match session.theme() {
                Theme::Light => println!("{bar}🤖 {}", text.bright_white()),
                Theme::Dark => println!("{bar}🤖 {}", text.white().dimmed()),
            }
        }
        Role::Error => {
            println!("{}⚠️  {}", BAR_CHAR.bright_red(), text.red());
        }
        Role::User => println!("{}", text),
    }
}

fn print_history(session: &Session) {
    let history = session.history();
    if history.is_empty() {
        println!("No history yet.");
        return;
    }
    for turn in history {
        println!("{}{}", BAR_CHAR.bright_black(), turn.content());
    }
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

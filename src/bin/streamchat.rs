//! Interactive terminal chat with streamed replies.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a backend on localhost:3000
//! streamchat
//!
//! # Offline, with canned replies
//! streamchat --environment development
//!
//! # Another backend and model, no colors
//! STREAMCHAT_API_KEY=sk-... streamchat --base-url https://chat.example.com --model large --no-color
//! ```
//!
//! Press Ctrl+C while a reply streams to interrupt it. Diagnostics go to
//! stderr and are controlled with `RUST_LOG`.

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::UtcOffset;
use tracing_subscriber::EnvFilter;

use streamchat::commands::{ChatCommand, help_text, parse_command};
use streamchat::{
    ChatArgs, Config, GenerationParams, OutgoingRequest, PlainTextRenderer, SessionState,
    StreamSessionController, backend_for,
};

type Controller = StreamSessionController<Box<dyn OutgoingRequest>>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The local offset cannot be read once other threads exist.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(chat(offset))
}

async fn chat(offset: UtcOffset) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("streamchat [OPTIONS]");
    let mut config = Config::resolve(args)?;

    let controller: Arc<Controller> = Arc::new(StreamSessionController::with_params(
        backend_for(&config)?,
        GenerationParams::from_config(&config),
    ));
    let mut renderer = PlainTextRenderer::with_color(config.use_color).with_offset(offset);
    let mut rl = DefaultEditor::new()?;

    let interrupt = Arc::clone(&controller);
    ctrlc::set_handler(move || {
        if interrupt.cancel_active() {
            tracing::debug!("interrupt cancelled the active reply");
        }
    })?;

    println!(
        "streamchat ({} environment, model: {})",
        config.environment, config.model
    );
    println!("Type /help for commands, /quit to exit\n");

    let mut last_prompt: Option<String> = None;
    loop {
        let line = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let prompt = match parse_command(line) {
            None => line.to_string(),
            Some(ChatCommand::Quit) => {
                println!("Goodbye!");
                break;
            }
            Some(ChatCommand::Help) => {
                for line in help_text().lines() {
                    println!("    {line}");
                }
                continue;
            }
            Some(ChatCommand::Retry) => match &last_prompt {
                Some(prompt) => prompt.clone(),
                None => {
                    renderer.print_error("nothing to retry yet");
                    continue;
                }
            },
            Some(ChatCommand::Model(model)) => {
                config.model = model;
                controller.set_params(GenerationParams::from_config(&config));
                renderer.print_info(&format!("Model changed to: {}", config.model));
                continue;
            }
            Some(ChatCommand::MaxTokens(value)) => {
                config.max_tokens = value;
                controller.set_params(GenerationParams::from_config(&config));
                renderer.print_info(&format!("max_tokens set to {value}"));
                continue;
            }
            Some(ChatCommand::Temperature(value)) => {
                config.temperature = value;
                controller.set_params(GenerationParams::from_config(&config));
                renderer.print_info(&format!("temperature set to {value:.2}"));
                continue;
            }
            Some(ChatCommand::ShowConfig) => {
                print_config(&config);
                continue;
            }
            Some(ChatCommand::Invalid(message)) => {
                renderer.print_error(&message);
                continue;
            }
        };

        match controller.send(&prompt, &mut renderer).await {
            Ok(session) => {
                last_prompt = Some(session.prompt().to_string());
                if let SessionState::Failed(_) = session.state() {
                    renderer.print_info("Use /retry to send the prompt again.");
                }
            }
            Err(err) => renderer.print_error(&err.to_string()),
        }
    }

    Ok(())
}

fn print_config(config: &Config) {
    println!("    Current Configuration:");
    println!("      Environment: {}", config.environment);
    println!("      Endpoint: {}{}", config.base_url, config.path);
    println!(
        "      API key: {}",
        if config.api_key.is_some() { "set" } else { "(none)" }
    );
    println!("      Model: {}", config.model);
    println!("      Max tokens: {}", config.max_tokens);
    println!("      Temperature: {:.2}", config.temperature);
    println!("      Timeout: {}s", config.timeout.as_secs());
}

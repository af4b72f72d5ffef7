// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use colreg_chat::config;
use colreg_chat::message::{Message, Role};
use colreg_chat::session::{ChatSession, SessionError, TurnOutcome};
use colreg_chat::transcript::Transcript;
use colreg_chat::transport::{CancellationToken, HttpChatTransport};
use colreg_chat::voice::{self, WhisperTranscriber};

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "colreg-chat", about = "Streaming chat client for the COLREGs assistant")]
struct Cli {
    /// Path to the colreg.yaml config file
    #[arg(long, default_value = "colreg.yaml", env = "COLREG_CONFIG")]
    config: PathBuf,

    /// Chat backend root URL, overriding the config file
    #[arg(long, env = "COLREG_API_URL")]
    base_url: Option<String>,

    /// Transcribe this audio file and send it as the first question
    #[arg(long)]
    voice: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let source = config::FileSource {
        path: cli.config.clone(),
        required: false,
    };
    let mut config = match config::load_config(&source) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }

    let client = match reqwest::Client::builder().build() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let transport = HttpChatTransport::new(client.clone(), &config.api);
    tracing::info!(
        endpoint = %transport.endpoint(),
        voice = config.transcription.is_some(),
        "colreg-chat starting"
    );

    let mut session = ChatSession::new(Arc::new(transport), config.messages.clone());
    if let Some(transcription) = &config.transcription {
        session = session.with_transcriber(Arc::new(WhisperTranscriber::new(client, transcription)));
    }

    let interrupts = Interrupts::install();

    if let Some(path) = cli.voice {
        let audio = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(path = %path.display(), "failed to read audio file: {e}");
                std::process::exit(1);
            }
        };
        let clip = path.display().to_string();
        let mime_type = voice::mime_type_for_path(&path);
        let cancel = interrupts.begin_turn();
        let turn = session.send_voice(clip, audio.into(), mime_type, &cancel);
        run_turn(&session, turn).await;
        interrupts.end_turn();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("failed to read stdin: {e}");
                break;
            }
        };
        if !line.trim().is_empty() {
            let cancel = interrupts.begin_turn();
            run_turn(&session, session.send(line, &cancel)).await;
            interrupts.end_turn();
        }
        prompt();
    }
}

/// Routes Ctrl-C for the whole process. While a turn runs it stops the
/// answer; at an idle prompt it exits.
#[derive(Clone, Default)]
struct Interrupts {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupts {
    /// Start the one process-wide Ctrl-C listener.
    fn install() -> Self {
        let interrupts = Self::default();
        let listener = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !listener.interrupt() {
                    eprintln!();
                    std::process::exit(130);
                }
            }
        });
        interrupts
    }

    fn begin_turn(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    fn end_turn(&self) {
        *self.slot() = None;
    }

    /// Cancel the running turn. Returns false when no turn is running.
    fn interrupt(&self) -> bool {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run one turn, echoing the answer as it streams.
async fn run_turn(
    session: &ChatSession,
    turn: impl Future<Output = Result<TurnOutcome, SessionError>>,
) {
    let mut updates = session.subscribe();
    let mut printer = AnswerPrinter::default();
    tokio::pin!(turn);
    let outcome = loop {
        tokio::select! {
            outcome = &mut turn => break outcome,
            Ok(()) = updates.changed() => printer.render(&updates.borrow_and_update()),
        }
    };
    if outcome.is_ok() {
        printer.finish(&session.snapshot());
    }

    match outcome {
        Ok(TurnOutcome::Cancelled) => eprintln!("[stopped]"),
        Ok(TurnOutcome::TranscriptionFailed(reason)) => {
            eprintln!("[voice message could not be transcribed: {reason}]")
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("turn rejected: {e}"),
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Writes the newest assistant message to stdout incrementally.
#[derive(Default)]
struct AnswerPrinter {
    printed: usize,
    visuals: usize,
}

impl AnswerPrinter {
    fn render(&mut self, transcript: &Transcript) {
        let Some(answer) = transcript.last().filter(|m| m.role == Role::Assistant) else {
            return;
        };
        if transcript.is_awaiting_first_token() {
            return;
        }
        let mut out = std::io::stdout().lock();

        // Error notes can append after a visual, so text and visuals are
        // tracked independently.
        if answer.text.len() > self.printed && answer.text.is_char_boundary(self.printed) {
            let _ = write!(out, "{}", &answer.text[self.printed..]);
            self.printed = answer.text.len();
        }
        for visual in answer.visuals().skip(self.visuals) {
            let caption = visual.caption.as_deref().unwrap_or("");
            let _ = writeln!(out, "\n[visual: {}] {}", visual.kind.as_str(), caption);
            self.visuals += 1;
        }
        let _ = out.flush();
    }

    fn finish(&mut self, transcript: &Transcript) {
        self.render(transcript);
        let Some(answer) = transcript.last().filter(|m| m.role == Role::Assistant) else {
            return;
        };
        print_footer(answer);
    }
}

fn print_footer(answer: &Message) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out);
    if !answer.matched_rules.is_empty() {
        let _ = writeln!(out, "\nRules cited:");
        for rule in &answer.matched_rules {
            if rule.title.is_empty() {
                let _ = writeln!(out, "  - {}", rule.id);
            } else {
                let _ = writeln!(out, "  - {}: {}", rule.id, rule.title);
            }
        }
    }
    if !answer.suggested_questions.is_empty() {
        let _ = writeln!(out, "\nYou could also ask:");
        for question in &answer.suggested_questions {
            let _ = writeln!(out, "  * {question}");
        }
    }
    let _ = out.flush();
}

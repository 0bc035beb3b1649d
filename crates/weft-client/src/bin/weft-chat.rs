use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::Write;
use tracing_subscriber::EnvFilter;
use url::Url;
use weft_client::{ResumableClient, ResumableStream, StreamStatus, TransportError};
use weft_contract::Message;
use weft_protocol_ui_stream::{MessageReassembler, UIStreamEvent};

#[derive(Debug, Parser)]
#[command(name = "weft-chat")]
struct Args {
    #[arg(long, env = "WEFT_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a user message and stream the reply.
    Send {
        #[arg(long)]
        chat: String,
        text: String,
    },
    /// Report whether the chat is streaming or finished.
    Status {
        #[arg(long)]
        chat: String,
    },
    /// Re-attach to the chat's stream.
    Resume {
        #[arg(long)]
        chat: String,
    },
    /// Abort the chat's run.
    Cancel {
        #[arg(long)]
        chat: String,
    },
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("{message}");
    std::process::exit(2);
}

async fn render(mut stream: ResumableStream) -> Result<(), TransportError> {
    let mut reassembler = MessageReassembler::new();
    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next().await {
        let event = event?;
        match &event {
            UIStreamEvent::TextDelta { text } => {
                print!("{text}");
                let _ = stdout.flush();
            }
            UIStreamEvent::ToolInvocation {
                tool_name,
                call_id,
                status,
                error_text,
                ..
            } => match error_text {
                Some(err) => eprintln!("[{tool_name} {call_id}] {status:?}: {err}"),
                None => eprintln!("[{tool_name} {call_id}] {status:?}"),
            },
            UIStreamEvent::Data {
                data_type, data, ..
            } => eprintln!("[{data_type}] {data}"),
            UIStreamEvent::Abort { .. } => eprintln!("[aborted]"),
            _ => {}
        }
        reassembler.apply(&event);
    }
    println!();

    if let Some(err) = reassembler.error() {
        exit_with(format!("stream failed: {err}"));
    }
    let message = reassembler.finish();
    tracing::debug!(message_id = %message.id, parts = message.parts.len(), "reply complete");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let base = Url::parse(&args.server)
        .unwrap_or_else(|e| exit_with(format!("invalid server url {}: {e}", args.server)));
    let client = ResumableClient::new(base);

    let result = match args.command {
        Command::Send { chat, text } => match client.start(&chat, &[Message::user(text)]).await {
            Ok(stream) => render(stream).await,
            Err(e) => Err(e),
        },
        Command::Status { chat } => client.status(&chat).await.map(|status| {
            let label = match status {
                StreamStatus::NotStarted => "not-started",
                StreamStatus::InProgress => "in-progress",
                StreamStatus::Completed => "completed",
            };
            println!("{label}");
        }),
        Command::Resume { chat } => match client.resume(&chat).await {
            Ok(stream) => render(stream).await,
            Err(e) => Err(e),
        },
        Command::Cancel { chat } => client.cancel(&chat).await.map(|()| println!("cancelled")),
    };

    match result {
        Ok(()) => {}
        Err(TransportError::NotFound(fingerprint)) => {
            eprintln!("no stream for {fingerprint}");
            std::process::exit(1);
        }
        Err(e) => exit_with(e),
    }
}

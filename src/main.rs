use std::io::Write;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use raisket::db::financial_profile_repository::FinancialProfileRepository;
use raisket::db::profile_repository::ProfileRepository;
use raisket::{ApiClient, ChatRequest, Settings, SupabaseClient};

#[derive(Parser)]
#[command(name = "raisket")]
#[command(about = "Talk to the Raisket financial advisor from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the backend health payload
    Health,

    /// Check that the backend answers
    Ping,

    /// Ask the advisor something
    Chat {
        /// Message to send
        message: String,

        /// User the message belongs to
        #[arg(short, long, env = "RAISKET_USER_ID")]
        user: String,

        /// Continue an existing conversation
        #[arg(short, long)]
        conversation: Option<String>,

        /// Print the answer as it is generated
        #[arg(short, long)]
        stream: bool,
    },

    /// Show the stored turns of a conversation
    History {
        conversation_id: String,
    },

    /// Show a user's profile and financial profile
    Profile {
        user_id: String,
    },
}

fn print_chunk(out: &mut impl Write, chunk: &str) -> std::io::Result<()> {
    out.write_all(chunk.as_bytes())?;
    out.flush()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "raisket=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Configuration (fatal when incomplete) ────────────────────────────────
    let settings = Settings::load().context("invalid configuration")?;
    let backend = SupabaseClient::init_global(settings.supabase.clone())
        .context("failed to initialise backend handle")?;
    let api = ApiClient::new(settings.api.clone())?;
    info!("Using chat API at {}", api.base_url());

    match cli.command {
        Commands::Health => {
            let health = api.health_check().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Commands::Ping => {
            let pong = api.ping().await?;
            println!("{}", pong.message);
        }
        Commands::Chat { message, user, conversation, stream } => {
            let mut request = ChatRequest::new(message, user);
            request.conversation_id = conversation;

            if stream {
                let mut stdout = std::io::stdout();
                let mut write_error: Option<std::io::Error> = None;
                api.stream_message(&request, |chunk| {
                    if write_error.is_none() {
                        write_error = print_chunk(&mut stdout, &chunk).err();
                    }
                })
                .await?;
                if let Some(e) = write_error {
                    return Err(e).context("failed to write answer to stdout");
                }
                println!();
            } else {
                let response = api.send_message(&request).await?;
                println!("{}", response.message);
                for source in response.sources() {
                    println!("  · {}", source.content);
                }
                info!("conversation_id={}", response.conversation_id);
            }
        }
        Commands::History { conversation_id } => {
            let history = api.get_conversation(&conversation_id).await?;
            for turn in history.messages {
                println!("[{}] {}", turn.role, turn.content);
            }
        }
        Commands::Profile { user_id } => {
            let profile = ProfileRepository::new(backend.clone()).find_by_id(&user_id).await?;
            println!("{} <{}>", profile.full_name.as_deref().unwrap_or("(sin nombre)"), profile.email);

            match FinancialProfileRepository::new(backend.clone()).find_by_user(&user_id).await? {
                Some(finances) => {
                    println!("{}", serde_json::to_string_pretty(&finances)?);
                    if let Some(surplus) = finances.monthly_surplus() {
                        println!("Monthly surplus: {surplus:.2} MXN");
                    }
                }
                None => println!("No financial profile yet"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn print_chunk_writes_and_flushes() {
        let mut out = Vec::new();
        print_chunk(&mut out, "Hola, ").unwrap();
        print_chunk(&mut out, "ahorra").unwrap();
        assert_eq!(out, b"Hola, ahorra");
    }

    #[test]
    fn print_chunk_reports_write_failures() {
        let err = print_chunk(&mut BrokenPipe, "Hola").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}

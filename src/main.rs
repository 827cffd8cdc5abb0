use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use promptviz::auth::{AuthClient, SignUpOutcome};
use promptviz::chat::{self, ChatScreen};
use promptviz::claude::{self, ModelResponse, PromptDispatcher, PromptRequest};
use promptviz::config::{self, AppConfig};
use promptviz::visualizer::visualize;

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send one prompt to Claude and show the answer as a chart and tree.
    Ask {
        prompt: String,
        #[arg(long, help = "Print the parsed JSON payload instead of the rendered view.")]
        json: bool,
    },
    /// Open the interactive chat screen.
    Chat,
    /// Render a JSON document from a file (or '-' for stdin) without calling Claude.
    Render { path: PathBuf },
    /// Manage the signed-in account.
    Auth {
        #[command(subcommand)]
        action: AuthCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum AuthCommands {
    /// Sign in with email and password.
    SignIn(Credentials),
    /// Create an account with email and password.
    SignUp(Credentials),
    /// Sign out and forget the stored session.
    SignOut,
    /// Show the current session.
    Status,
}

#[derive(clap::Args, Debug)]
struct Credentials {
    #[arg(long, env = "PROMPTVIZ_EMAIL")]
    email: String,
    #[arg(long, env = "PROMPTVIZ_PASSWORD", hide_env_values = true)]
    password: String,
}

fn auth_client(config: &AppConfig) -> Result<AuthClient> {
    AuthClient::new(&config.supabase, config.session_file.clone()).context("Auth is not available")
}

async fn run_auth(config: &AppConfig, action: AuthCommands) -> Result<()> {
    let auth = auth_client(config)?;
    match action {
        AuthCommands::SignIn(creds) => {
            auth.sign_in(&creds.email, &creds.password)
                .await
                .map_err(|e| anyhow!("Sign In Error: {}", e))?;
            println!("Signed in as {}", creds.email.trim());
        }
        AuthCommands::SignUp(creds) => {
            let outcome = auth
                .sign_up(&creds.email, &creds.password)
                .await
                .map_err(|e| anyhow!("Sign Up Error: {}", e))?;
            match outcome {
                SignUpOutcome::SignedIn => {
                    println!("Signed up and signed in as {}", creds.email.trim())
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!("Sign Up Success: Please check your email for verification!")
                }
            }
        }
        AuthCommands::SignOut => {
            auth.restore_session().await;
            auth.sign_out()
                .await
                .map_err(|e| anyhow!("Sign Out Error: {}", e))?;
            println!("Signed out");
        }
        AuthCommands::Status => match auth.restore_session().await {
            Some(session) => println!(
                "Signed in as {}",
                session.user.email.as_deref().unwrap_or(session.user.id.as_str())
            ),
            None => println!("Signed out"),
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env.local / .env hold the API keys during development
    config::load_env_files();

    // Logs go to stderr so rendered output on stdout stays clean.
    // Reads log level from RUST_LOG (e.g., RUST_LOG=promptviz=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("promptviz starting with command: {:?}", cli.command);

    let config = AppConfig::from_env();

    match cli.command {
        Commands::Ask { prompt, json } => {
            let request =
                PromptRequest::new(&prompt).ok_or_else(|| anyhow!("Enter a prompt first"))?;
            let dispatcher = PromptDispatcher::new(config.claude.clone());
            match dispatcher.dispatch(&request).await {
                ModelResponse::Success(payload) if json => {
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                ModelResponse::Success(payload) => print!("{}", visualize(&payload)),
                ModelResponse::Failure(message) => {
                    if chat::needs_alert(&message) {
                        warn!("Credential problem reported by Claude request");
                    }
                    return Err(anyhow!(message));
                }
            }
        }
        Commands::Chat => {
            info!("Starting interactive chat session...");
            let mut screen = ChatScreen::new(PromptDispatcher::new(config.claude.clone()));
            let auth = match auth_client(&config) {
                Ok(auth) => {
                    auth.restore_session().await;
                    Some(auth)
                }
                Err(e) => {
                    warn!("Chat without account: {:#}", e);
                    None
                }
            };
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            chat::run_chat(&mut screen, auth.as_ref(), stdin, &mut stdout)
                .await
                .context("Chat session failed")?;
            info!("Chat session finished.");
        }
        Commands::Render { path } => {
            let raw = if path.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read stdin")?;
                buf
            } else {
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?
            };
            print!("{}", visualize(&claude::parse_model_text(raw.trim())));
        }
        Commands::Auth { action } => run_auth(&config, action).await?,
    }

    Ok(())
}

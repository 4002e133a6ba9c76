//! CipherKeep CLI - Command line client for the password vault.
//!
//! Records are sealed on this machine with a key derived from the master
//! password before they are sent to the server.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cipherkeep_common::{Error, RecordId};
use cipherkeep_sync::{ClientConfig, ListPoller, PollOutcome, SyncClient, DEFAULT_SERVER_URL};
use cipherkeep_vault::{Card, Credentials, FileRecord, Login, VaultSession};

#[derive(Parser)]
#[command(name = "cipherkeep")]
#[command(about = "CipherKeep - Client-side encrypted password vault")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Server base URL.
    #[arg(long, env = "CIPHERKEEP_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Directory for downloaded files.
    #[arg(long, env = "CIPHERKEEP_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Account name.
    #[arg(short, long, env = "CIPHERKEEP_USERNAME")]
    username: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account.
    Signup,

    /// Manage saved logins.
    Logins {
        #[command(subcommand)]
        action: LoginAction,
    },

    /// Manage bank cards.
    Cards {
        #[command(subcommand)]
        action: CardAction,
    },

    /// Manage encrypted files.
    Files {
        #[command(subcommand)]
        action: FileAction,
    },

    /// Keep a list on screen, refreshing until Ctrl-C.
    Watch {
        /// Which list to follow.
        kind: RecordKind,

        /// Refresh interval in milliseconds.
        #[arg(short, long, default_value = "500")]
        interval_ms: u64,
    },
}

#[derive(Subcommand)]
enum LoginAction {
    /// List logins.
    List {
        /// Print passwords instead of masking them.
        #[arg(long)]
        reveal: bool,
    },
    /// Create a login, or update one with --id. The password is prompted.
    Save {
        #[arg(long, default_value = "0")]
        id: i64,
        /// Account name on the remote site.
        #[arg(long)]
        login: String,
        #[arg(long)]
        note: String,
    },
    /// Delete a login.
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum CardAction {
    /// List cards.
    List {
        /// Print numbers and CVVs instead of masking them.
        #[arg(long)]
        reveal: bool,
    },
    /// Create a card, or update one with --id. The CVV is prompted.
    Save {
        #[arg(long, default_value = "0")]
        id: i64,
        #[arg(long)]
        bank: String,
        #[arg(long)]
        number: String,
        /// Expiry date, e.g. 12/24.
        #[arg(long)]
        expiry: String,
        #[arg(long)]
        note: String,
    },
    /// Delete a card.
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum FileAction {
    /// List files.
    List,
    /// Upload a file, or update the note of one with --id.
    Upload {
        /// Local file to seal and upload.
        path: Option<PathBuf>,
        #[arg(long, default_value = "0")]
        id: i64,
        /// Display name (defaults to the local file name).
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        note: String,
    },
    /// Download and decrypt a file into the download directory.
    Download { id: i64 },
    /// Delete a file.
    Delete { id: i64 },
}

#[derive(Clone, Copy, ValueEnum)]
enum RecordKind {
    Logins,
    Cards,
    Files,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let result = run(cli).await;

    if let Err(e) = &result {
        if let Some(Error::Unauthorized) = e.downcast_ref::<Error>() {
            bail!("invalid username/password pair or expired session, sign in again");
        }
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::new(&cli.server);
    if let Some(dir) = cli.download_dir {
        config = config.with_download_dir(dir);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let client = SyncClient::new(&config)
        .context("Invalid client configuration")?
        .with_cancellation(cancel.clone());
    let username = cli
        .username
        .context("Account name required (--username or CIPHERKEEP_USERNAME)")?;

    if let Commands::Signup = cli.command {
        return cmd_signup(&client, username).await;
    }

    let password = prompt_password("Master password: ")?;
    let session = client
        .sign_in(&Credentials::new(username, password))
        .await
        .context("Sign-in failed")?;

    match cli.command {
        Commands::Signup => Ok(()),
        Commands::Logins { action } => cmd_logins(&client, &session, action).await,
        Commands::Cards { action } => cmd_cards(&client, &session, action).await,
        Commands::Files { action } => cmd_files(&client, &session, &config, action).await,
        Commands::Watch { kind, interval_ms } => {
            cmd_watch(client, session, kind, Duration::from_millis(interval_ms), cancel).await
        }
    }
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read password")
}

fn mask(secret: &str, reveal: bool) -> String {
    if reveal {
        secret.to_string()
    } else {
        "*".repeat(secret.chars().count().min(8))
    }
}

/// Print one line per record; unreadable records are reported in place.
fn print_records<T>(records: &[cipherkeep_common::Result<T>], render: impl Fn(&T) -> String) {
    if records.is_empty() {
        println!("No records.");
        return;
    }
    for record in records {
        match record {
            Ok(record) => println!("  {}", render(record)),
            Err(e) => println!("  [unreadable] {}", e),
        }
    }
}

/// Create an account.
async fn cmd_signup(client: &SyncClient, username: String) -> Result<()> {
    let password = prompt_password("Choose master password: ")?;
    let confirm = prompt_password("Confirm master password: ")?;

    if password != confirm {
        bail!("Passwords do not match");
    }

    client
        .sign_up(&Credentials::new(username.as_str(), password))
        .await
        .context("Sign-up failed")?;

    println!("Account {} created.", username);
    Ok(())
}

fn render_login(login: &Login, reveal: bool) -> String {
    format!(
        "[{}] {} / {}  ({})",
        login.id,
        login.username,
        mask(&login.password, reveal),
        login.note
    )
}

async fn cmd_logins(
    client: &SyncClient,
    session: &VaultSession,
    action: LoginAction,
) -> Result<()> {
    match action {
        LoginAction::List { reveal } => {
            let logins = client.list_logins(session).await.context("Failed to list logins")?;
            print_records(&logins, |l| render_login(l, reveal));
        }
        LoginAction::Save { id, login, note } => {
            let password = prompt_password("Login password: ")?;
            let mut record = Login {
                id: RecordId::new(id),
                username: login,
                password,
                note,
            };
            client
                .save_login(session, &mut record)
                .await
                .context("Failed to save login")?;
            println!("Login saved with id {}.", record.id);
        }
        LoginAction::Delete { id } => {
            client
                .delete_login(RecordId::new(id))
                .await
                .context("Failed to delete login")?;
            println!("Login {} deleted.", id);
        }
    }
    Ok(())
}

fn render_card(card: &Card, reveal: bool) -> String {
    let number = if reveal {
        card.number.clone()
    } else {
        let digits: Vec<char> = card.number.chars().collect();
        let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
        format!("**** {}", tail)
    };
    format!(
        "[{}] {} {} exp {} cvv {}  ({})",
        card.id,
        card.bank,
        number,
        card.expiry,
        mask(&card.cvv, reveal),
        card.note
    )
}

async fn cmd_cards(client: &SyncClient, session: &VaultSession, action: CardAction) -> Result<()> {
    match action {
        CardAction::List { reveal } => {
            let cards = client.list_cards(session).await.context("Failed to list cards")?;
            print_records(&cards, |c| render_card(c, reveal));
        }
        CardAction::Save {
            id,
            bank,
            number,
            expiry,
            note,
        } => {
            let cvv = prompt_password("CVV: ")?;
            let mut card = Card {
                id: RecordId::new(id),
                bank,
                number,
                expiry,
                cvv,
                note,
            };
            client
                .save_card(session, &mut card)
                .await
                .context("Failed to save card")?;
            println!("Card saved with id {}.", card.id);
        }
        CardAction::Delete { id } => {
            client
                .delete_card(RecordId::new(id))
                .await
                .context("Failed to delete card")?;
            println!("Card {} deleted.", id);
        }
    }
    Ok(())
}

fn render_file(file: &FileRecord) -> String {
    format!("[{}] {}  ({})", file.id, file.name, file.note)
}

async fn cmd_files(
    client: &SyncClient,
    session: &VaultSession,
    config: &ClientConfig,
    action: FileAction,
) -> Result<()> {
    match action {
        FileAction::List => {
            let files = client.list_files(session).await.context("Failed to list files")?;
            print_records(&files, render_file);
        }
        FileAction::Upload {
            path,
            id,
            name,
            note,
        } => {
            let id = RecordId::new(id);
            let mut record = if id.is_new() {
                FileRecord {
                    id,
                    name: String::new(),
                    note: String::new(),
                }
            } else {
                find_file(client, session, id).await?
            };
            record.note = note;
            if let Some(name) = name {
                record.name = name;
            }

            info!(path = ?path, "Uploading");
            client
                .save_file(session, &mut record, path.as_deref())
                .await
                .context("Failed to upload file")?;
            println!("File saved with id {}.", record.id);
        }
        FileAction::Download { id } => {
            let record = find_file(client, session, RecordId::new(id)).await?;
            let written = client
                .download_file(session, &record, &config.download_dir)
                .await
                .context("Failed to download file")?;
            println!("Written to {}.", written.display());
        }
        FileAction::Delete { id } => {
            client
                .delete_file(RecordId::new(id))
                .await
                .context("Failed to delete file")?;
            println!("File {} deleted.", id);
        }
    }
    Ok(())
}

async fn find_file(
    client: &SyncClient,
    session: &VaultSession,
    id: RecordId,
) -> Result<FileRecord> {
    let files = client.list_files(session).await.context("Failed to list files")?;
    for file in files {
        match file {
            Ok(file) if file.id == id => return Ok(file),
            Err(Error::Decode { id: bad, reason }) if bad == id => {
                bail!("File {} cannot be decrypted: {}", id, reason)
            }
            _ => {}
        }
    }
    bail!("file not exist")
}

/// Follow one list until Ctrl-C or until the session is rejected.
async fn cmd_watch(
    client: SyncClient,
    session: VaultSession,
    kind: RecordKind,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let session = Arc::new(session);
    let poller = ListPoller::new(interval, cancel);

    let outcome = match kind {
        RecordKind::Logins => {
            let fetch =
                |c: SyncClient, s: Arc<VaultSession>| async move { c.list_logins(&s).await };
            follow(poller, &client, &session, fetch, |l| render_login(l, false)).await?
        }
        RecordKind::Cards => {
            let fetch =
                |c: SyncClient, s: Arc<VaultSession>| async move { c.list_cards(&s).await };
            follow(poller, &client, &session, fetch, |c| render_card(c, false)).await?
        }
        RecordKind::Files => {
            let fetch =
                |c: SyncClient, s: Arc<VaultSession>| async move { c.list_files(&s).await };
            follow(poller, &client, &session, fetch, render_file).await?
        }
    };

    match outcome {
        PollOutcome::Unauthorized => Err(Error::Unauthorized).context("Watch stopped"),
        PollOutcome::Cancelled | PollOutcome::Closed => Ok(()),
    }
}

async fn follow<T, F, Fut, R>(
    poller: ListPoller,
    client: &SyncClient,
    session: &Arc<VaultSession>,
    fetch: F,
    render: R,
) -> Result<PollOutcome>
where
    T: Send + Sync + 'static,
    F: Fn(SyncClient, Arc<VaultSession>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = cipherkeep_common::Result<Vec<cipherkeep_common::Result<T>>>>
        + Send
        + 'static,
    R: Fn(&T) -> String,
{
    let client = client.clone();
    let session = session.clone();
    let (mut rx, handle) = poller.spawn(move || fetch(client.clone(), session.clone()));

    let mut refresh = 0u64;
    while rx.changed().await.is_ok() {
        let Some(snapshot) = rx.borrow_and_update().clone() else {
            continue;
        };
        refresh += 1;
        println!("--- refresh {} ---", refresh);
        match &*snapshot {
            Ok(records) => print_records(records, &render),
            Err(e) => println!("  refresh failed: {}", e),
        }
    }

    handle.await.context("Poller task failed")
}

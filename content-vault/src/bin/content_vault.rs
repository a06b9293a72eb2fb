//! Command-line front end for a content vault
//!
//! Run with: cargo run -- paste --text "hello"
//!           cargo run -- search hello

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use content_vault::{
    Attachment, CaptureEvent, ContentItem, ContentVault, ContentVaultApi, IngestOutcome, Layout,
    VaultConfig,
};
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const PREVIEW_CHARS: usize = 72;

#[derive(Parser, Debug)]
#[command(author, version, about = "Collect pasted content into a searchable vault", long_about = None)]
struct Cli {
    /// Path to the vault database (overrides config file and CONTENT_VAULT_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture one paste. With no flags, plain text is read from stdin.
    Paste {
        /// HTML markup (stored as an article)
        #[arg(long)]
        html: Option<String>,
        /// URI list (stored as a link)
        #[arg(long)]
        uri_list: Option<String>,
        /// PNG or JPEG file (stored as an encoded image)
        #[arg(long)]
        image: Option<PathBuf>,
        /// Plain text
        #[arg(long)]
        text: Option<String>,
    },
    /// Print the items matching the saved query
    List {
        /// Ignore the saved query
        #[arg(long)]
        all: bool,
    },
    /// Save a new query and print what it matches. An empty query shows everything.
    Search { query: String },
    /// Remove one item by id
    Remove { id: Uuid },
    /// Remove every item and reset the query
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show or change preferences
    Prefs {
        #[arg(long)]
        dark_mode: Option<bool>,
        #[arg(long)]
        layout: Option<Layout>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "content_vault=info".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_items(items: &[ContentItem]) {
    if items.is_empty() {
        println!("(no items)");
        return;
    }
    for item in items {
        println!(
            "{}  {:<7}  {}  {}",
            item.id(),
            item.content_type(),
            item.created_at().format("%Y-%m-%d %H:%M"),
            item.preview(PREVIEW_CHARS)
        );
    }
}

fn build_event(
    html: Option<String>,
    uri_list: Option<String>,
    image: Option<PathBuf>,
    text: Option<String>,
) -> Result<CaptureEvent> {
    let nothing_given = html.is_none() && uri_list.is_none() && image.is_none() && text.is_none();

    let mut event = CaptureEvent::new();
    if let Some(html) = html {
        event = event.with_data(content_vault::capture::FORMAT_HTML, html);
    }
    if let Some(uris) = uri_list {
        event = event.with_data(content_vault::capture::FORMAT_URI_LIST, uris);
    }
    if let Some(path) = image {
        if !path.is_file() {
            bail!("Image file not found: {}", path.display());
        }
        event = event.with_file(Attachment::from_image_path(&path));
    }
    if let Some(text) = text {
        event = event.with_data(content_vault::capture::FORMAT_PLAIN, text);
    }

    if nothing_given {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read text from stdin")?;
        let text = strip_line_ending(input);
        event = event.with_data(content_vault::capture::FORMAT_PLAIN, text);
    }
    Ok(event)
}

/// Drop the single newline a shell pipe adds after the pasted text
fn strip_line_ending(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = VaultConfig::load();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    let vault = ContentVault::open(&config)
        .with_context(|| format!("Failed to open vault at {}", config.db_path.display()))?;

    match cli.command {
        Commands::Paste {
            html,
            uri_list,
            image,
            text,
        } => {
            let event = build_event(html, uri_list, image, text)?;
            match vault.ingest(event).await {
                IngestOutcome::Added { id, content_type } => println!("Added {} {}", content_type, id),
                IngestOutcome::Empty => println!("Nothing to add"),
                IngestOutcome::Failed { error } => bail!("Capture failed: {}", error),
            }
        }
        Commands::List { all } => {
            if all {
                print_items(&vault.all_items());
            } else {
                let query = vault.query();
                if !query.is_empty() {
                    println!("Query: {:?}", query);
                }
                print_items(&vault.items());
            }
        }
        Commands::Search { query } => {
            vault.set_query(query);
            print_items(&vault.items());
        }
        Commands::Remove { id } => {
            if !vault.remove(id) {
                bail!("No item with id {}", id);
            }
            println!("Removed {}", id);
        }
        Commands::Clear { yes } => {
            let count = vault.all_items().len();
            if count > 0 && !yes && !confirm(&format!("Delete all {} items?", count))? {
                println!("Cancelled");
                return Ok(());
            }
            // Also resets a saved query when there is nothing to delete
            vault.clear_all();
            if count == 0 {
                println!("Vault is already empty");
            } else {
                println!("Cleared {} items", count);
            }
        }
        Commands::Prefs { dark_mode, layout } => {
            if let Some(enabled) = dark_mode {
                vault.set_dark_mode(enabled);
            }
            if let Some(layout) = layout {
                vault.set_layout(layout);
            }
            let prefs = vault.preferences();
            println!("dark-mode: {}", prefs.dark_mode);
            println!("layout:    {}", prefs.layout);
        }
    }

    Ok(())
}

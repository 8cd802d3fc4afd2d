use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pagegrab_client::{PageExtractor, RelayFetcher};
use pagegrab_core::config::{GrabConfig, parse_relay_list};
use pagegrab_core::curation::PageList;
use pagegrab_core::grab::{Committed, GrabService};
use pagegrab_core::models::Relay;
use pagegrab_core::store::JsonlChapterStore;
use pagegrab_core::traits::{AttemptObserver, ChapterStore, Extractor, NullStore};

const NO_IMAGES_NOTICE: &str = "No images found on that page. The site may need to run scripts \
     before its images appear; try a different URL or enter page URLs manually.";

#[derive(Parser)]
#[command(name = "pagegrab", version, about = "Grab comic chapter pages from reader sites")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RelayArgs {
    /// Relays to try, in priority order (allorigins, corsproxy, direct)
    #[arg(long = "relay", value_delimiter = ',')]
    relays: Vec<String>,

    /// Per-relay timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a chapter page through the relays and list its page images
    Grab {
        /// Chapter page URL on the source site
        #[arg(short, long)]
        url: String,

        #[command(flatten)]
        relay: RelayArgs,

        /// Print a JSON array instead of one URL per line
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Extract page images from a local HTML file ("-" for stdin)
    Extract {
        #[arg(short, long)]
        file: PathBuf,

        /// Skip document-tree parsing and only scan the raw text
        #[arg(long, default_value_t = false)]
        text_only: bool,

        /// Print every accepted candidate with its score and origin as JSON
        #[arg(long, default_value_t = false)]
        scores: bool,
    },

    /// Save a chapter from a grabbed or hand-written page list
    Commit {
        #[arg(long)]
        comic_id: u64,

        /// Chapter number (1 or higher)
        #[arg(short, long)]
        number: u64,

        #[arg(short, long, default_value = "")]
        title: String,

        /// Grab pages from this URL
        #[arg(short, long, conflicts_with = "pages_file", required_unless_present = "pages_file")]
        url: Option<String>,

        /// Read pages from a file, one URL per line ("-" for stdin)
        #[arg(long)]
        pages_file: Option<PathBuf>,

        /// Drop the page at this 1-based position (repeatable, applied before moves)
        #[arg(long = "remove")]
        remove: Vec<usize>,

        /// Move a page, as FROM:TO 1-based positions (repeatable)
        #[arg(long = "move", value_parser = parse_move)]
        moves: Vec<(usize, usize)>,

        /// Chapter store file
        #[arg(long, env = "PAGEGRAB_STORE", default_value = "chapters.jsonl")]
        store: PathBuf,

        #[command(flatten)]
        relay: RelayArgs,
    },

    /// List stored chapters of a comic
    Chapters {
        #[arg(long)]
        comic_id: u64,

        #[arg(long, env = "PAGEGRAB_STORE", default_value = "chapters.jsonl")]
        store: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pagegrab=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Ctrl-C abandons an in-flight grab instead of leaving the relay request running.
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    match cli.command {
        Commands::Grab { url, relay, json } => {
            let config = build_config(&relay)?;
            cmd_grab(&url, &config, json, &cancel).await?;
        }
        Commands::Extract {
            file,
            text_only,
            scores,
        } => {
            cmd_extract(&file, text_only, scores)?;
        }
        Commands::Commit {
            comic_id,
            number,
            title,
            url,
            pages_file,
            remove,
            moves,
            store,
            relay,
        } => {
            let config = build_config(&relay)?;
            let svc = GrabService::with_store(
                RelayFetcher::from_config(&config).context("Failed to create HTTP client")?,
                PageExtractor::new(),
                JsonlChapterStore::new(store),
            );

            let mut pages = match (url, pages_file) {
                (Some(url), _) => grab_pages(&svc, &url, &cancel).await?,
                (None, Some(path)) => PageList::from_manual_text(&read_input(&path)?),
                (None, None) => bail!("either --url or --pages-file is required"),
            };
            apply_edits(&mut pages, &remove, &moves)?;
            cmd_commit(&svc, pages, comic_id, number, &title).await?;
        }
        Commands::Chapters { comic_id, store } => {
            cmd_chapters(comic_id, store).await?;
        }
    }

    Ok(())
}

/// `PAGEGRAB_*` environment first, then command-line flags on top.
fn build_config(args: &RelayArgs) -> Result<GrabConfig> {
    let mut config = GrabConfig::from_env()?;
    if !args.relays.is_empty() {
        config = config.with_relays(parse_relay_list(&args.relays.join(","))?)?;
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_attempt_timeout(Duration::from_secs(secs))?;
    }
    Ok(config)
}

fn parse_move(raw: &str) -> Result<(usize, usize), String> {
    let (from, to) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected FROM:TO, got '{raw}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| format!("'{s}' is not a page position (1 or higher)"))
    };
    Ok((parse(from)?, parse(to)?))
}

/// Removals are applied highest position first so earlier ones don't shift later ones.
fn apply_edits(pages: &mut PageList, remove: &[usize], moves: &[(usize, usize)]) -> Result<()> {
    let mut remove = remove.to_vec();
    remove.sort_unstable_by(|a, b| b.cmp(a));
    remove.dedup();
    for position in remove {
        let index = to_index(position)?;
        let url = pages.remove(index)?;
        tracing::info!(position, %url, "Removed page");
    }
    for &(from, to) in moves {
        pages.move_page(to_index(from)?, to_index(to)?)?;
    }
    Ok(())
}

fn to_index(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .context("page positions start at 1")
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).context("Failed to read stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn progress_observer() -> impl Fn(Relay) + Send + Sync {
    |relay: Relay| eprintln!("Trying {} ...", relay.host_label())
}

async fn grab_pages<S>(
    svc: &GrabService<RelayFetcher, PageExtractor, S>,
    url: &str,
    cancel: &CancellationToken,
) -> Result<PageList>
where
    S: ChapterStore,
{
    let observer = progress_observer();
    let outcome = svc
        .grab(url, Some(&observer as &AttemptObserver), cancel)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        relay = %outcome.used_relay,
        "Found {} page images in {} bytes of HTML",
        outcome.pages.len(),
        outcome.html_bytes
    );
    Ok(outcome.pages)
}

async fn cmd_grab(
    url: &str,
    config: &GrabConfig,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let svc = GrabService::<_, _, NullStore>::new(
        RelayFetcher::from_config(config).context("Failed to create HTTP client")?,
        PageExtractor::new(),
    );
    let pages = grab_pages(&svc, url, cancel).await?;
    print_pages(&pages, json)
}

fn cmd_extract(file: &Path, text_only: bool, scores: bool) -> Result<()> {
    let html = read_input(file)?;
    let extractor = if text_only {
        PageExtractor::text_only()
    } else {
        PageExtractor::new()
    };

    if scores {
        let candidates = extractor.candidates(&html).into_candidates();
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    let pages = PageList::new(extractor.extract(&html));
    print_pages(&pages, false)
}

fn print_pages(pages: &PageList, json: bool) -> Result<()> {
    if pages.is_empty() {
        eprintln!("{NO_IMAGES_NOTICE}");
        if json {
            println!("[]");
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(pages.as_slice())?);
    } else {
        println!("{}", pages.to_manual_text());
    }
    Ok(())
}

async fn cmd_commit(
    svc: &GrabService<RelayFetcher, PageExtractor, JsonlChapterStore>,
    pages: PageList,
    comic_id: u64,
    number: u64,
    title: &str,
) -> Result<()> {
    if pages.is_empty() {
        eprintln!("{NO_IMAGES_NOTICE}");
    }
    let page_count = pages.len();
    match svc
        .commit(pages, comic_id, number, title)
        .await
        .map_err(|e| anyhow::anyhow!(e))?
    {
        Committed::Saved(chapter) => {
            println!(
                "Saved chapter {} of comic {} with {} pages ({})",
                chapter.number, chapter.comic_id, page_count, chapter.id
            );
        }
        Committed::Unsaved(chapter) => {
            println!("{}", serde_json::to_string_pretty(&chapter)?);
        }
    }
    Ok(())
}

async fn cmd_chapters(comic_id: u64, store: PathBuf) -> Result<()> {
    let store = JsonlChapterStore::new(store);
    let chapters = store
        .list_by_comic(comic_id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if chapters.is_empty() {
        println!(
            "No chapters stored for comic {} in {}",
            comic_id,
            store.path().display()
        );
        return Ok(());
    }

    println!("Chapters of comic {}:\n", comic_id);
    for chapter in &chapters {
        println!(
            "  #{:<4} {} ({} pages, saved {}, id {})",
            chapter.number,
            if chapter.title.is_empty() {
                "(untitled)"
            } else {
                chapter.title.as_str()
            },
            chapter.pages.len(),
            chapter.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            chapter.id,
        );
    }
    println!("\nTotal: {} chapters", chapters.len());

    Ok(())
}

mod app;
mod assets;
mod config;
mod document;
mod editor;
mod error;
mod event;
mod logging;
mod markdown;
mod pipeline;
mod scroll;
mod timer;
mod ui;
mod watch;
mod worker;

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use app::App;
use assets::LocalAssetResolver;
use config::Config;
use event::run_app;
use markdown::MarkdownConverter;
use scroll::persistence::STORE_FILE;
use scroll::FileScrollStore;
use worker::ThreadedServices;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const IMAGE_INDEX_FILE: &str = "image_index.bin";

fn print_help() {
    println!("mdpane {}", VERSION);
    println!("A terminal markdown viewer with live outline and synchronized split panes");
    println!();
    println!("USAGE:");
    println!("    mdpane [OPTIONS] [FILE]");
    println!();
    println!("ARGUMENTS:");
    println!("    [FILE]           Markdown file to open");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
    println!("    -c, --config     Print config file path");
    println!("    --clean-cache    Clear saved scroll positions and the image index");
    println!();
    println!("KEYS:");
    println!("    Alt+p / Alt+e / Alt+s   Preview, edit, split view");
    println!("    Tab                     Cycle focus");
    println!("    Ctrl+o                  Toggle outline");
    println!("    Ctrl+s                  Save");
    println!("    Ctrl+w                  Close document");
    println!("    Ctrl+q                  Quit");
    println!();
    println!("ENVIRONMENT:");
    println!("    {}        Log filter, e.g. debug (log file: {})", logging::LOG_ENV, logging::log_path().display());
}

fn clean_cache() {
    let cache_dir = Config::cache_dir();

    println!("Cleaning mdpane cache...");
    println!();

    if cache_dir.exists() {
        let total_size = get_dir_size(&cache_dir);
        match fs::remove_dir_all(&cache_dir) {
            Ok(_) => println!("  Deleted: {} ({})", cache_dir.display(), format_size(total_size)),
            Err(e) => eprintln!("  Failed to remove cache: {}", e),
        }
    } else {
        println!("  Cache directory not found (skipped)");
    }

    println!();
    println!("Cache cleared! Scroll positions start fresh.");
}

fn get_dir_size(path: &Path) -> u64 {
    let mut total = 0;
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if entry_path.is_dir() {
                total += get_dir_size(&entry_path);
            } else if let Ok(metadata) = entry.metadata() {
                total += metadata.len();
            }
        }
    }
    total
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn resolve_path(path_str: &str) -> Option<PathBuf> {
    let expanded = shellexpand::tilde(path_str).to_string();
    let path = PathBuf::from(&expanded);
    let absolute = if path.is_absolute() {
        path
    } else {
        env::current_dir().ok()?.join(path)
    };

    absolute.canonicalize().ok().or(Some(absolute))
}

fn open_store(cache_dir: &Path) -> FileScrollStore {
    let path = cache_dir.join(STORE_FILE);
    match FileScrollStore::open(&path) {
        Ok(store) => store,
        Err(e) => {
            log::warn!("scroll positions unavailable ({}), starting empty", e);
            FileScrollStore::empty(&path)
        }
    }
}

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut initial_path: Option<PathBuf> = None;

    if args.len() > 1 {
        match args[1].as_str() {
            "-v" | "--version" => {
                println!("mdpane {}", VERSION);
                return Ok(());
            }
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            "-c" | "--config" => {
                println!("{}", Config::config_path().display());
                return Ok(());
            }
            "--clean-cache" => {
                clean_cache();
                return Ok(());
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                eprintln!("Run 'mdpane --help' for usage information");
                return Ok(());
            }
            path_arg => match resolve_path(path_arg) {
                Some(path) => initial_path = Some(path),
                None => {
                    eprintln!("Invalid path: {}", path_arg);
                    return Ok(());
                }
            },
        }
    }

    logging::init();
    log::info!("mdpane {} starting", VERSION);

    let config = Config::load_or_create();
    let cache_dir = Config::cache_dir();

    let resolver = LocalAssetResolver::new(config.search_roots(), Some(cache_dir.join(IMAGE_INDEX_FILE)));
    let services = match ThreadedServices::spawn(MarkdownConverter, resolver) {
        Ok(services) => services,
        Err(e) => {
            log::error!("could not start background services: {}", e);
            eprintln!("Error: could not start background services: {}", e);
            return Err(e);
        }
    };
    let store = open_store(&cache_dir);

    let mut app = App::new(config, Box::new(services), Box::new(store));
    if let Some(path) = &initial_path {
        if let Err(e) = app.open(path, Instant::now()) {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            return Ok(());
        }
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    app.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        log::error!("{:?}", err);
        eprintln!("Error: {err:?}");
    }
    log::info!("mdpane exiting");

    Ok(())
}

//! ao: acme front end for the Go source analyzer.
//!
//! Run from an acme window (`ao [SCOPE...]`). The first invocation opens a
//! menu window listing the query modes and stays running; middle-clicking a
//! mode queries the analyzer at the selection in the invoking window. Later
//! invocations hand their window to the running instance and exit.
//!
//! `SCOPE` defaults to `.`, the invoking window's file.

mod logging;

use ao_core::acme::AcmeFs;
use ao_core::config::{self, Config, Overrides};
use ao_core::coordinator::{self, Role};
use ao_core::event_loop::{spawn_event_pump, EventLoop, LoopEvent};
use ao_core::session;
use ao_core::{AoError, CommandAnalyzer, Menu, Window, WindowSystem};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "ao")]
#[command(about = "acme front end for the Go source analyzer")]
#[command(version)]
struct Cli {
    /// Analysis scope: packages or files, `.` for the current window's file
    #[arg(value_name = "SCOPE")]
    scope: Vec<String>,

    /// Rendezvous socket shared by all ao instances [env: AO_SOCKET]
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Analyzer program to run [env: AO_ANALYZER]
    #[arg(long, value_name = "PROGRAM")]
    analyzer: Option<String>,

    /// Where acme's file server is mounted [env: ACME_MOUNT]
    #[arg(long, value_name = "DIR")]
    acme_mount: Option<PathBuf>,
}

impl From<Cli> for Overrides {
    fn from(cli: Cli) -> Self {
        Overrides {
            scope: cli.scope,
            socket: cli.socket,
            analyzer: cli.analyzer,
            acme_mount: cli.acme_mount,
        }
    }
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli.into()) {
        tracing::error!(target: logging::FATAL_TARGET, error = %e, "ao failed");
        eprintln!("ao: {}", e);
        std::process::exit(1);
    }
}

fn run(overrides: Overrides) -> ao_core::Result<()> {
    let config = Config::from_env(overrides)?;
    debug!(?config, "Starting");

    let rendezvous = match coordinator::claim(&config.socket_path, config.window_id)? {
        Role::Secondary => {
            info!(window = %config.window_id, "Handed window to running instance");
            return Ok(());
        }
        Role::Primary(rendezvous) => rendezvous,
    };

    let acme = AcmeFs::new(&config.acme_mount);
    let scope = config::resolve_scope(&config.scope, || {
        session::resolve_file_name(&acme, config.window_id)
    })?;
    let analyzer = CommandAnalyzer::new(&config.analyzer, scope.clone())?;

    let mut window = acme.create().map_err(AoError::CreateWindow)?;
    let events = window
        .events()
        .map_err(AoError::window(window.id(), "Cannot read window events"))?;

    let mut menu = Menu::new(window);
    if let Some(first) = scope.first() {
        menu.set_name(first)?;
    }

    let mut event_loop = EventLoop::new(acme, menu, analyzer, config.window_id);
    event_loop.render()?;

    let (tx, rx) = mpsc::channel::<LoopEvent>();
    spawn_event_pump(events, tx.clone());
    rendezvous.spawn_acceptor(tx);

    info!(
        menu = %event_loop.menu_id(),
        socket = %config.socket_path.display(),
        "Serving queries"
    );
    event_loop.run(rx)
}

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use rs_mail_fetch::auth::credentials;
use rs_mail_fetch::config::{Config, load_config};
use rs_mail_fetch::logging;
use rs_mail_fetch::mail::session::{ImapConnector, with_session};
use rs_mail_fetch::output::writer::{today_path, write_mailbox_listing, write_records};
use rs_mail_fetch::pipeline::progress::CancelFlag;
use rs_mail_fetch::pipeline::ranking::SortOrder;
use rs_mail_fetch::pipeline::resolver::describe_mailboxes;
use rs_mail_fetch::pipeline::run_fetch;

#[derive(Parser)]
#[command(name = "rs_mail_fetch")]
#[command(about = "Fetch recent mail over IMAP into a text file", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch messages and write them to the dated output file
    Fetch {
        /// How many messages to keep; 0 or absent means the configured maximum
        count: Option<usize>,

        #[arg(long, conflicts_with = "single_thread")]
        multi_thread: bool,

        #[arg(long)]
        single_thread: bool,

        #[arg(long, value_enum)]
        order: Option<SortOrder>,
    },

    /// Write every mailbox with its message count
    ListMailboxes {
        #[arg(long)]
        sort_by_count: bool,
    },

    /// Store the IMAP password in keyring
    SetPassword {
        #[arg(long)]
        user: String,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Fetch { .. } => "fetch",
            Command::ListMailboxes { .. } => "list-mailboxes",
            Command::SetPassword { .. } => "set-password",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::SetPassword { user } = &cli.cmd {
        env_logger::init();
        return match set_password(user) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e:#}");
                ExitCode::FAILURE
            }
        };
    }

    let loaded = load_config(cli.config.as_deref());
    let defaults = Config::default();
    let log_cfg = loaded.as_ref().unwrap_or(&defaults);
    match logging::init(&log_cfg.log_level, log_cfg.log_file_path.as_deref()) {
        Ok(Some(path)) => debug!("logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => eprintln!("logging setup failed: {e}"),
    }
    let delay = log_cfg.exit_delay_seconds;

    let name = cli.cmd.name();
    info!("{name}: start");
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<()> {
        let cfg = loaded.context("Configuration error")?;
        match cli.cmd {
            Command::Fetch {
                count,
                multi_thread,
                single_thread,
                order,
            } => {
                let threading = match (multi_thread, single_thread) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                fetch(&cfg, count.filter(|&n| n > 0), threading, order)
            }
            Command::ListMailboxes { sort_by_count } => list_mailboxes(&cfg, sort_by_count),
            Command::SetPassword { .. } => Ok(()),
        }
    }));

    let code = match outcome {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            error!("{name} failed: {err:#}");
            debug!("{err:?}");
            ExitCode::FAILURE
        }
        Err(_) => {
            error!("{name} panicked");
            ExitCode::FAILURE
        }
    };
    info!("{name}: end");
    exit_delay(delay);
    code
}

fn set_password(user: &str) -> Result<()> {
    eprintln!("Paste password for {user} (end with Ctrl-D):");
    let mut password = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut password)?;
    let password = password.trim();
    if password.is_empty() {
        return Err(anyhow!("empty password, nothing saved"));
    }
    credentials::save_password(user, password)?;
    println!("Saved password for {user}");
    Ok(())
}

fn connector(cfg: &Config) -> Result<ImapConnector> {
    let host = cfg.host()?;
    let user = cfg.user()?;
    let password = credentials::resolve_password(user)?;
    Ok(ImapConnector::new(host, cfg.imap_port, user, password))
}

fn fetch(
    cfg: &Config,
    count: Option<usize>,
    threading: Option<bool>,
    order: Option<SortOrder>,
) -> Result<()> {
    let connector = connector(cfg)?;
    let mut settings = cfg.fetch_settings();
    if let Some(multi) = threading {
        settings.multi_threaded = multi;
    }
    if let Some(order) = order {
        settings.order = order;
    }
    info!(
        "host: {} / user: {} / count: {} / multi-threaded: {} / workers: {}",
        connector.host,
        connector.user,
        count.map_or_else(|| "max".to_string(), |n| n.to_string()),
        settings.multi_threaded,
        settings.workers
    );

    let cancel = CancelFlag::default();
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupted, stopping after the batches in flight");
        flag.cancel();
    })?;

    let records = run_fetch(&connector, &settings, count, &cancel)?;
    let path = today_path(&cfg.output_file_path);
    if !write_records(&path, &records) {
        warn!("nothing written to {}", path.display());
    }
    Ok(())
}

fn list_mailboxes(cfg: &Config, sort_by_count: bool) -> Result<()> {
    let connector = connector(cfg)?;
    let summaries = with_session(&connector, |session| describe_mailboxes(session))?;
    let path = today_path(&cfg.mailbox_list_path);
    if !write_mailbox_listing(&path, &summaries, sort_by_count) {
        return Err(anyhow!("cannot write mailbox listing to {}", path.display()));
    }
    Ok(())
}

fn exit_delay(seconds: u64) {
    if seconds == 0 {
        return;
    }
    print!("closing in {seconds}s ");
    for _ in 0..seconds {
        print!(".");
        let _ = std::io::stdout().flush();
        thread::sleep(Duration::from_secs(1));
    }
    println!();
}

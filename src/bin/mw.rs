extern crate monthwidget as lib;

use chrono::NaiveDate;
use flexi_logger::{Duplicate, FileSpec, Logger};
use lib::clock::{Clock, FixedClock, LocalClock};
use lib::config::load_suitable_config;
use lib::host::{Cmd, WidgetHost};
use lib::render::TextRenderer;
use lib::store::{Backend, FileBackend, InstanceId, InstanceStateStore, MemoryBackend};
use std::convert::TryFrom;
use std::io::stdout;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "mw",
    about = "Monthwidget - month calendar widgets with per-instance navigation."
)]
pub struct Args {
    #[structopt(
        name = "CONFIG",
        short = "c",
        long = "config",
        help = "path to config file",
        parse(from_os_str)
    )]
    pub configfile: Option<PathBuf>,

    #[structopt(long = "state", help = "path to state file", parse(from_os_str))]
    pub state_file: Option<PathBuf>,

    #[structopt(long = "log-file", help = "path to log file", parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    #[structopt(long = "today", help = "use this date (YYYY-MM-DD) as today")]
    pub today: Option<NaiveDate>,

    #[structopt(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    #[structopt(about = "render the month shown by an instance")]
    Show { id: InstanceId },

    #[structopt(about = "step an instance one month forward and render it")]
    Next { id: InstanceId },

    #[structopt(about = "step an instance one month back and render it")]
    Prev { id: InstanceId },

    #[structopt(about = "mark a day of an instance and render it")]
    Select { id: InstanceId, date: NaiveDate },

    #[structopt(about = "forget the state of removed instances")]
    Remove {
        #[structopt(required = true)]
        ids: Vec<InstanceId>,
    },

    #[structopt(about = "list instances with stored state")]
    List,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::from_args();

    const DEFAULT_LOG_LEVEL: &str = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let mut logger = Logger::try_with_env_or_str(DEFAULT_LOG_LEVEL)?;

    if let Some(log_file) = args.log_file {
        logger = logger
            .log_to_file(FileSpec::try_from(log_file)?)
            .duplicate_to_stderr(Duplicate::Warn);
    }

    logger.start()?;

    let config = load_suitable_config(args.configfile.as_deref())?;

    let clock: Box<dyn Clock> = match args.today {
        Some(today) => Box::new(FixedClock(today)),
        None => Box::new(LocalClock),
    };

    let state_file = args.state_file.unwrap_or_else(|| config.state_file());
    let backend: Box<dyn Backend> = match FileBackend::open(&state_file) {
        Ok(backend) => {
            log::debug!("Keeping state in '{}'", backend.path().display());
            Box::new(backend)
        }
        Err(e) => {
            log::warn!(
                "State in '{}' unavailable, changes will not be kept: {}",
                state_file.display(),
                e
            );
            Box::new(MemoryBackend::default())
        }
    };

    let store = InstanceStateStore::from_boxed(backend, clock);
    let renderer = TextRenderer::new(stdout())
        .today_symbol_opt(config.today_symbol)
        .selected_symbol_opt(config.selected_symbol)
        .colored(config.color);
    let mut host = WidgetHost::from_config(&config, store, renderer);

    match args.cmd {
        Command::Show { id } => host.handle(id, Cmd::Update)?,
        Command::Next { id } => host.handle(id, Cmd::NextMonth)?,
        Command::Prev { id } => host.handle(id, Cmd::PrevMonth)?,
        Command::Select { id, date } => host.handle(id, Cmd::Select(date))?,
        Command::Remove { ids } => {
            let failed = host.deleted(&ids);
            if failed > 0 {
                return Err(format!(
                    "Could not remove {} of {} instance(s)",
                    failed,
                    ids.len()
                )
                .into());
            }
        }
        Command::List => {
            let store = host.store();
            for id in store.instances() {
                println!("{}\t{}", id, store.current(id));
            }
        }
    }

    Ok(())
}

use clap::{Arg, Command, value_parser};
use flux_logger::{
    acquisition::{Acquisition, Settings},
    link::open_link,
    ports::accessible_ports,
    profile::InstrumentProfile,
    scheduler::SystemClock,
};
use std::{
    error::Error,
    path::PathBuf,
    process::exit,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use thread_priority::{ThreadPriority, set_current_thread_priority};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let matches = Command::new("flux-logger")
        .about("Log instrument records from a serial port into half-hourly CSV files")
        .arg(
            Arg::new("instrument")
                .short('i')
                .long("instrument")
                .default_value("serial")
                .value_parser(InstrumentProfile::names())
                .help("Instrument connected to the port"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_parser(value_parser!(String))
                .help(
                    "Serial port the instrument is attached to; \
                     lists accessible ports if omitted",
                ),
        )
        .arg(
            Arg::new("directory")
                .short('d')
                .long("directory")
                .value_parser(value_parser!(PathBuf))
                .help("Directory the CSV files are written to (default: current directory)"),
        )
        .get_matches();

    let ports = accessible_ports()?;
    eprintln!("Accessible ports: {:?}", ports);

    let Some(port) = matches.get_one::<String>("port") else {
        return Ok(());
    };
    let profile: InstrumentProfile = matches
        .get_one::<String>("instrument")
        .map(String::as_str)
        .unwrap_or("serial")
        .parse()?;
    let directory = match matches.get_one::<PathBuf>("directory") {
        Some(directory) => directory.clone(),
        None => std::env::current_dir()?,
    };

    let settings = Settings::new(profile, port.as_str(), directory);
    settings.ensure_directory()?;
    eprintln!("{} is the current storage directory.", settings.directory.display());

    if let Err(e) = set_current_thread_priority(ThreadPriority::Max) {
        log::warn!("could not raise sampling thread priority: {:?}", e);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    ctrlc::set_handler(move || {
        if stop_clone.load(Ordering::Relaxed) {
            eprintln!("Killing...");
            exit(-1);
        }
        stop_clone.store(true, Ordering::Relaxed);
    })?;

    let mut acquisition =
        Acquisition::new(settings, SystemClock, stop).with_countdown_display();
    let open = |s: &Settings| open_link(&s.port, s.profile, s.link_timeout);
    acquisition.probe_header(open)?;

    let stats = acquisition.run(open)?;
    log::info!(
        "{} records in {} files, {} malformed records dropped",
        stats.records,
        stats.files,
        stats.decode_failures
    );
    eprintln!("Data collection stopped!");

    Ok(())
}

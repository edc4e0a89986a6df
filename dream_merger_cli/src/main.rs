use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

use libdream_merger::config::Config;
use libdream_merger::process::{create_subsets, process_subset};
use libdream_merger::worker_status::WorkerStatus;

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could not create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

fn make_logger() -> Box<simplelog::CombinedLogger> {
    let term_logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    let stamp = time::OffsetDateTime::now_utc()
        .format(&time::macros::format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .expect("Could not format the log file timestamp!");
    let log_path = format!("dream_merger_{stamp}.log");
    let write_logger = simplelog::WriteLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        File::create(&log_path).expect("Could not create the log file!"),
    );
    simplelog::CombinedLogger::new(vec![term_logger, write_logger])
}

fn main() {
    // Create a cli
    let matches = Command::new("dream_merger_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = make_logger();
    let pb_manager = MultiProgress::new();
    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if matches.subcommand_matches("new").is_some() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("DAQ dump path: {}", config.vme_path.to_string_lossy());
    log::info!("FERS path: {}", config.sipm_path.to_string_lossy());
    log::info!("Output path: {}", config.output_path.to_string_lossy());
    log::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );
    if !config.is_n_threads_valid() {
        log::error!("n_threads must be at least 1");
        return;
    }

    // One progress bar and one worker thread per run subset
    let subsets: Vec<Vec<i32>> = create_subsets(&config)
        .into_iter()
        .filter(|subset| !subset.is_empty())
        .collect();
    let bar_style = ProgressStyle::with_template(
        "{prefix:>18} [{bar:40.cyan/blue}] {percent:>3}% {msg}",
    )
    .expect("Could not create the progress bar style!")
    .progress_chars("=> ");

    let (tx, rx) = channel::<WorkerStatus>();
    let mut bars: Vec<ProgressBar> = Vec::new();
    let mut handles = Vec::new();
    for (worker_id, subset) in subsets.into_iter().enumerate() {
        let bar = pb_manager.add(ProgressBar::new(100));
        bar.set_style(bar_style.clone());
        bar.set_prefix(format!("worker {worker_id}"));
        bars.push(bar);

        let worker_tx = tx.clone();
        let worker_config = config.clone();
        handles.push(std::thread::spawn(move || {
            process_subset(worker_config, worker_tx, worker_id, subset)
        }));
    }
    // Drop our copy so the receive loop ends when the workers hang up.
    drop(tx);

    while let Ok(status) = rx.recv() {
        if let Some(bar) = bars.get(status.worker_id) {
            bar.set_position((status.progress * 100.0) as u64);
            bar.set_message(format!(
                "run {} ({})",
                status.run_number,
                status.phase.label()
            ));
        }
    }

    for (worker_id, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(())) => log::info!("Worker {worker_id} finished."),
            Ok(Err(e)) => log::error!("Worker {worker_id} failed with error: {e}"),
            Err(_) => log::error!("Failed to join worker {worker_id}!"),
        }
    }
    for bar in &bars {
        bar.finish();
    }

    log::info!("Done.");
}

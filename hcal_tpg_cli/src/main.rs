use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

use libhcal_tpg::config::Config;
use libhcal_tpg::process::process;
use libhcal_tpg::worker_status::{BarColor, WorkerStatus};

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

fn bar_style(color: &BarColor) -> ProgressStyle {
    let color = match color {
        BarColor::CYAN => "cyan",
        BarColor::GREEN => "green",
    };
    ProgressStyle::with_template(&format!(
        "Worker {{prefix}} [{{bar:40.{color}}}] {{pos}}% ({{msg}} events)"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn update_bar(bars: &mut Vec<ProgressBar>, pb_manager: &MultiProgress, status: &WorkerStatus) {
    while bars.len() <= status.worker_id {
        let pb = pb_manager.add(ProgressBar::new(100));
        pb.set_prefix(bars.len().to_string());
        bars.push(pb);
    }
    let pb = &bars[status.worker_id];
    pb.set_style(bar_style(&status.color));
    pb.set_position((status.progress * 100.0) as u64);
    pb.set_message(status.events_done.to_string());
}

fn main() {
    // Create a cli
    let matches = Command::new("hcal_tpg_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
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
    log::info!("Event Path: {}", config.input_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    match &config.emap_path {
        Some(p) => log::info!("Electronics Map Path: {}", p.to_string_lossy()),
        None => log::info!("Electronics Map Path: Default"),
    }
    log::info!(
        "Zero suppression: {} Format error check: {}",
        config.run_zs,
        config.run_fe_format_error
    );
    log::info!("Number of Workers: {}", config.n_threads);

    let (tx, rx) = channel::<WorkerStatus>();
    let mut bars: Vec<ProgressBar> = Vec::new();
    // Spawn the task!
    let handle = std::thread::spawn(|| process(config, tx));

    loop {
        std::thread::sleep(std::time::Duration::from_millis(250));
        while let Ok(status) = rx.try_recv() {
            update_bar(&mut bars, &pb_manager, &status);
        }

        if handle.is_finished() {
            while let Ok(status) = rx.try_recv() {
                update_bar(&mut bars, &pb_manager, &status);
            }
            match handle.join() {
                Ok(result) => match result {
                    Ok(_) => log::info!("Successfully emulated trigger primitives!"),
                    Err(e) => log::error!("Emulation failed with error: {e}"),
                },
                Err(_) => log::error!("Failed to join emulation task!"),
            }
            break;
        }
    }

    for pb in bars.iter() {
        pb.finish();
    }

    log::info!("Done.");
}

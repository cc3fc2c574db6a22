#![doc = include_str!("../README.md")]

/*
 * NMEA2CEP is part of the nav-solutions framework.
 * This framework is shipped under Mozilla Public V2 license.
 *
 * Documentation: https://github.com/nav-solutions/nmea2cep
 */

use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    time::Duration,
};

use env_logger::{Builder, Target};

use log::{error, info, warn};

use hifitime::Epoch;

mod analysis;
mod capture;
mod cli;
mod device;
mod errors;
mod nmea;

use crate::{
    analysis::{analyze, planar_offsets},
    capture::{run_capture, run_handshake},
    cli::{AnalysisSettings, CaptureSettings, Cli},
    device::Device,
    errors::Error,
};

/// Current UTC time of day, HHMMSS
fn utc_hhmmss_now() -> String {
    let now = Epoch::now().unwrap_or_else(|e| panic!("Failed to determine system time: {}", e));

    let (_, _, _, hours, minutes, seconds, _) = now.to_gregorian_utc();
    format!("{:02}{:02}{:02}", hours, minutes, seconds)
}

fn capture_session(settings: &CaptureSettings) -> Result<(), Error> {
    let mut device = Device::open(&settings.port, settings.baud_rate)?;

    info!("opened {} @ {} baud", settings.port, settings.baud_rate);

    let results = run_handshake(&mut device, settings.mode)?;

    for result in results.iter().filter(|r| !r.acknowledged) {
        warn!(
            "\"{}\" not acknowledged ({} lines received)",
            result.command,
            result.raw_lines.len()
        );
    }

    let start_utc = utc_hhmmss_now();
    info!("GNSS powered on @ {} UTC", start_utc);

    let fd = File::create(&settings.output)?;
    let mut sink = BufWriter::new(fd);

    let first_fix = run_capture(
        &mut device,
        &mut sink,
        &start_utc,
        Duration::from_secs(settings.duration_secs),
    )?;

    if first_fix.is_none() {
        warn!("no valid fix observed during capture");
    }

    info!("done logging NMEA to {}", settings.output);
    Ok(())
}

fn analysis_run(settings: &AnalysisSettings) -> Result<(), Error> {
    let contents = fs::read_to_string(&settings.log_path)?;

    let observations = nmea::parse_log(contents.lines())?;
    let summary = analyze(&observations, settings.reference, &settings.start_time)?;

    let rendered = summary.render();
    println!("{}", rendered);

    // artifacts land next to the log unless redirected
    let log_dir = Path::new(&settings.log_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let summary_path = match &settings.output {
        Some(path) => PathBuf::from(path),
        None => log_dir.join("summary_notes.txt"),
    };

    fs::write(&summary_path, &rendered)?;
    info!("summary saved to {}", summary_path.display());

    let offsets = planar_offsets(&observations, settings.reference);

    let mut series = String::with_capacity(16 + 16 * offsets.len());
    series.push_str("east_m,north_m\n");

    for offset in &offsets {
        series.push_str(&format!("{:.3},{:.3}\n", offset.east_m, offset.north_m));
    }

    let scatter_path = log_dir.join("enu_scatter.csv");
    fs::write(&scatter_path, series)?;
    info!("East/North series saved to {}", scatter_path.display());

    Ok(())
}

pub fn main() {
    let mut builder = Builder::from_default_env();

    builder
        .target(Target::Stdout)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let cli = Cli::new();

    let result = if let Some(settings) = cli.capture_settings() {
        capture_session(&settings)
    } else if let Some(settings) = cli.analysis_settings() {
        analysis_run(&settings)
    } else {
        unreachable!("clap enforces one subcommand");
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

use clap::{Arg, ArgAction, ArgMatches, ColorChoice, Command};

use crate::{capture::StartMode, nmea::Coordinate};

/// Capture session settings, resolved from the command line
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub port: String,
    pub baud_rate: u32,
    pub mode: StartMode,
    pub duration_secs: u64,
    pub output: String,
}

/// Analysis run settings, resolved from the command line
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub log_path: String,
    pub start_time: String,
    pub reference: Coordinate,
    pub output: Option<String>,
}

pub struct Cli {
    /// Arguments passed by user
    matches: ArgMatches,
}

impl Cli {
    /// Build new command line interface
    pub fn new() -> Self {
        Self {
            matches: {
                Command::new("nmea2cep")
                    .author("nav-solutions")
                    .version(env!("CARGO_PKG_VERSION"))
                    .about("GNSS NMEA capture and TTFF / CEP accuracy analyzer")
                    .color(ColorChoice::Always)
                    .arg_required_else_help(true)
                    .subcommand_required(true)
                    .subcommand(
                        Command::new("capture")
                            .about("Drive the GNSS module handshake and log its NMEA stream")
                            .next_help_heading("Serial port (Active device, GNSS module)")
                            .arg(
                                Arg::new("port")
                                    .short('p')
                                    .long("port")
                                    .value_name("PORT")
                                    .required(true)
                                    .help("Define serial port. Example /dev/ttyUSB0 on Linux")
                            )
                            .arg(
                                Arg::new("baudrate")
                                    .short('b')
                                    .long("baud")
                                    .required(false)
                                    .value_name("Baudrate (u32)")
                                    .help("Define serial port baud rate. Communications will not work if your module streams at a different data-rate. By default we use 115_200"),
                            )
                            .next_help_heading("GNSS start sequence")
                            .arg(
                                Arg::new("mode")
                                    .short('m')
                                    .long("mode")
                                    .action(ArgAction::Set)
                                    .help("GNSS engine start mode: cold, warm or hot.
Selects the reset command issued before power on. Default is \"cold\"."),
                            )
                            .arg(
                                Arg::new("duration")
                                    .short('d')
                                    .long("duration")
                                    .action(ArgAction::Set)
                                    .help("Capture duration in seconds (wall clock bound).
Default is 900 s, the standard 15 minute qualification window."),
                            )
                            .next_help_heading("Capture log")
                            .arg(
                                Arg::new("output")
                                    .short('o')
                                    .long("output")
                                    .action(ArgAction::Set)
                                    .help("Path of the NMEA capture log. Default is \"nmea_capture.txt\""),
                            ),
                    )
                    .subcommand(
                        Command::new("analyze")
                            .about("Characterize TTFF and horizontal accuracy from a capture log")
                            .next_help_heading("Capture log (Passive mode)")
                            .arg(
                                Arg::new("file")
                                    .short('f')
                                    .long("file")
                                    .value_name("FILENAME")
                                    .required(true)
                                    .help("NMEA capture log to analyze"),
                            )
                            .next_help_heading("Ground truth")
                            .arg(
                                Arg::new("start-time")
                                    .long("start-time")
                                    .short('t')
                                    .required(true)
                                    .help("Acquisition start time, UTC, exactly 6 digits (HHMMSS).
Captured logs carry it in their \"# START\" header record."),
                            )
                            .arg(
                                Arg::new("ref-lat")
                                    .long("ref-lat")
                                    .required(true)
                                    .allow_hyphen_values(true)
                                    .help("Reference latitude in signed decimal degrees (south negative)"),
                            )
                            .arg(
                                Arg::new("ref-lon")
                                    .long("ref-lon")
                                    .required(true)
                                    .allow_hyphen_values(true)
                                    .help("Reference longitude in signed decimal degrees (west negative)"),
                            )
                            .next_help_heading("Artifacts")
                            .arg(
                                Arg::new("output")
                                    .short('o')
                                    .long("output")
                                    .action(ArgAction::Set)
                                    .help("Path of the plain text summary.
Default is \"summary_notes.txt\" next to the capture log."),
                            ),
                    )
                    .get_matches()
            },
        }
    }

    /// Returns capture settings when the capture subcommand was selected
    pub fn capture_settings(&self) -> Option<CaptureSettings> {
        let matches = self.matches.subcommand_matches("capture")?;

        let port = matches
            .get_one::<String>("port")
            .expect("port is a required argument")
            .to_string();

        let baud_rate = match matches.get_one::<String>("baudrate") {
            Some(baud) => baud
                .parse::<u32>()
                .unwrap_or_else(|e| panic!("Invalid baud rate value: {}", e)),
            None => 115_200,
        };

        let mode = match matches.get_one::<String>("mode") {
            Some(mode) => mode
                .parse::<StartMode>()
                .unwrap_or_else(|e| panic!("Invalid start mode: {}", e)),
            None => StartMode::Cold,
        };

        let duration_secs = match matches.get_one::<String>("duration") {
            Some(duration) => {
                let secs = duration
                    .parse::<u64>()
                    .unwrap_or_else(|e| panic!("Invalid duration value: {}", e));

                if secs == 0 {
                    panic!("Invalid duration value: must be strictly positive");
                }

                secs
            },
            None => 900,
        };

        let output = matches
            .get_one::<String>("output")
            .map(|s| s.to_string())
            .unwrap_or_else(|| "nmea_capture.txt".to_string());

        Some(CaptureSettings {
            port,
            baud_rate,
            mode,
            duration_secs,
            output,
        })
    }

    /// Returns analysis settings when the analyze subcommand was selected
    pub fn analysis_settings(&self) -> Option<AnalysisSettings> {
        let matches = self.matches.subcommand_matches("analyze")?;

        let log_path = matches
            .get_one::<String>("file")
            .expect("file is a required argument")
            .to_string();

        let start_time = matches
            .get_one::<String>("start-time")
            .expect("start-time is a required argument")
            .to_string();

        if start_time.len() != 6 || !start_time.bytes().all(|b| b.is_ascii_digit()) {
            panic!("Invalid start time \"{}\": expected 6 digits (HHMMSS)", start_time);
        }

        let latitude = matches
            .get_one::<String>("ref-lat")
            .expect("ref-lat is a required argument")
            .parse::<f64>()
            .unwrap_or_else(|e| panic!("Invalid reference latitude: {}", e));

        let longitude = matches
            .get_one::<String>("ref-lon")
            .expect("ref-lon is a required argument")
            .parse::<f64>()
            .unwrap_or_else(|e| panic!("Invalid reference longitude: {}", e));

        let output = matches.get_one::<String>("output").map(|s| s.to_string());

        Some(AnalysisSettings {
            log_path,
            start_time,
            reference: Coordinate {
                latitude,
                longitude,
            },
            output,
        })
    }
}

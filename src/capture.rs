//! Acquisition sequencing: fixed AT handshake, then time-bounded streaming
//! of the NMEA feed to the capture log.

use std::{
    io::Write,
    str::FromStr,
    time::{Duration, Instant},
};

use log::{info, warn};

use crate::{
    device::{CommandResult, Device},
    errors::Error,
};

/// Per-command acknowledgement deadline
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Enables GGA, GLL, RMC, GSA, GSV and VTG in one exchange
const NMEA_ENABLE: &str = "AT$GPSNMUN=3,1,1,1,1,1,1";

const POWER_ON: &str = "AT$GPSP=1";

/// Sentence families that report a fix quality field usable
/// for first-fix detection
const FIX_REPORT_PREFIXES: [&str; 4] = ["$GPGGA", "$GNGGA", "$GAGGA", "$GNGNS"];

/// GNSS engine start mode, selecting the reset behavior
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum StartMode {
    /// Discard all aiding data
    Cold,
    /// Keep almanac, discard ephemeris
    Warm,
    /// Keep everything still valid
    Hot,
}

impl StartMode {
    /// AT$GPSR reset code
    pub fn reset_code(&self) -> u8 {
        match self {
            Self::Cold => 1,
            Self::Warm => 2,
            Self::Hot => 3,
        }
    }

    fn reset_command(&self) -> String {
        format!("AT$GPSR={}", self.reset_code())
    }
}

impl FromStr for StartMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cold" => Ok(Self::Cold),
            "warm" => Ok(Self::Warm),
            "hot" => Ok(Self::Hot),
            _ => Err(format!("invalid start mode \"{}\": expected cold, warm or hot", s)),
        }
    }
}

impl std::fmt::Display for StartMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cold => write!(f, "cold"),
            Self::Warm => write!(f, "warm"),
            Self::Hot => write!(f, "hot"),
        }
    }
}

/// First valid fix, as reported by the live stream
#[derive(Debug, Clone, PartialEq)]
pub struct FirstFix {
    /// UTC time embedded in the sentence (HHMMSS, fraction stripped)
    pub utc_time: String,

    /// Reported fix quality (> 0)
    pub quality: u32,
}

/// One-bit monotonic latch: reports the first qualifying sentence,
/// then stays silent for the rest of the session even if the fix
/// quality later drops and recovers.
pub struct FirstFixLatch {
    notified: bool,
}

impl FirstFixLatch {
    pub fn new() -> Self {
        Self { notified: false }
    }

    /// Feeds one logged sentence; yields the fix exactly once per session.
    pub fn observe(&mut self, line: &str) -> Option<FirstFix> {
        if self.notified {
            return None;
        }

        if !FIX_REPORT_PREFIXES.iter().any(|p| line.starts_with(p)) {
            return None;
        }

        let fields: Vec<&str> = line.split(',').collect();

        if fields.len() < 7 {
            return None;
        }

        if fields[6].is_empty() || !fields[6].bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let quality = fields[6].parse::<u32>().ok()?;

        if quality == 0 {
            return None;
        }

        let utc_time = fields[1].split('.').next().unwrap_or("").to_string();

        self.notified = true;

        Some(FirstFix { utc_time, quality })
    }
}

impl Default for FirstFixLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the fixed handshake: engine reset per `mode`, power on, NMEA stream
/// enable. A missing acknowledgement is a warning, never an abort: cold
/// booting hardware routinely answers late and the capture is still worth
/// running. All exchange outcomes are returned for inspection.
pub fn run_handshake(device: &mut Device, mode: StartMode) -> Result<Vec<CommandResult>, Error> {
    let mut results = Vec::with_capacity(3);

    let reset = device.send_command(&mode.reset_command(), HANDSHAKE_TIMEOUT)?;
    if !reset.acknowledged {
        warn!("continuing despite {} reset issue", mode);
    }
    results.push(reset);

    let power = device.send_command(POWER_ON, HANDSHAKE_TIMEOUT)?;
    if !power.acknowledged {
        warn!("power-on command failed, continuing anyway");
    }
    results.push(power);

    let nmea = device.send_command(NMEA_ENABLE, HANDSHAKE_TIMEOUT)?;
    if !nmea.acknowledged {
        warn!("NMEA enable failed, output may be missing");
    }
    results.push(nmea);

    Ok(results)
}

/// Streams the live feed until `duration` elapsed (wall-clock). Every
/// non-empty line is echoed; only `$`-prefixed sentences are persisted,
/// after the one `# START <HHMMSS>` header record. A read-only interface
/// that drains ends the capture early.
pub fn run_capture<W: Write>(
    device: &mut Device,
    sink: &mut W,
    start_utc: &str,
    duration: Duration,
) -> Result<Option<FirstFix>, Error> {
    writeln!(sink, "# START {}", start_utc)?;

    let mut latch = FirstFixLatch::new();
    let mut first_fix = None;

    let deadline = Instant::now() + duration;

    while Instant::now() < deadline {
        let line = match device.read_line()? {
            Some(line) => line,
            None => {
                if device.interface.is_read_only() {
                    // consumed all content
                    break;
                }
                continue;
            },
        };

        if line.is_empty() {
            continue;
        }

        println!("{}", line);

        if !line.starts_with('$') {
            continue;
        }

        writeln!(sink, "{}", line)?;

        if let Some(fix) = latch.observe(&line) {
            info!("FIRST FIX @ {} (quality={})", fix.utc_time, fix.quality);
            first_fix = Some(fix);
        }
    }

    sink.flush()?;

    Ok(first_fix)
}

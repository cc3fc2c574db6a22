//! TTFF and horizontal accuracy statistics over a parsed observation table.
//!
//! All clock values are date-less UTC HHMMSS wall-clock times. TTFF applies
//! a single +24 h correction when the first fix lands "before" the declared
//! start (midnight crossing); per-fix timestamps are carried verbatim and
//! never extended past that single correction.

use itertools::Itertools;

use crate::{
    errors::Error,
    nmea::{Coordinate, FixObservation},
};

/// Shared by the haversine error metric and the planar projection,
/// so the two cannot drift apart if recalibrated.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const SECONDS_PER_DAY: u32 = 86_400;

/// How many per-fix rows the rendered summary table retains
const SAMPLE_TABLE_ROWS: usize = 20;

/// Horizontal error of one good fix against the reference point.
#[derive(Debug, Clone)]
pub struct FixError {
    /// UTC time of the fix (HHMMSS)
    pub utc_time: String,

    /// Satellites used in the solution
    pub satellites: Option<u32>,

    /// Horizontal dilution of precision
    pub hdop: Option<f64>,

    /// Great-circle distance to the reference point [m]
    pub error_m: f64,
}

/// East/North offset of one good fix from the reference point [m].
/// Small-angle flat-Earth approximation, for scatter rendering only:
/// the statistical metrics always come from the haversine distances.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlanarOffset {
    pub east_m: f64,
    pub north_m: f64,
}

/// Computed once per analysis run, read-only thereafter.
#[derive(Debug, Clone)]
pub struct AccuracySummary {
    /// Declared acquisition start (HHMMSS UTC)
    pub start_time: String,

    /// Declared reference position
    pub reference: Coordinate,

    /// Time of the first good fix (HHMMSS UTC)
    pub first_fix_time: String,

    /// Time to first fix [s]
    pub ttff_seconds: f64,

    /// Number of good fixes retained
    pub fix_count: usize,

    /// 50th percentile of horizontal error [m]
    pub cep50_m: f64,

    /// 95th percentile of horizontal error [m]
    pub cep95_m: f64,

    /// Root mean square horizontal error [m]
    pub rms_error_m: f64,

    /// Per-fix error series, in log order. Doubles as the HDOP-vs-time
    /// and satellites-vs-time series for external plotting.
    pub per_fix: Vec<FixError>,
}

/// Runs the full accuracy analysis: quality filter, TTFF, per-fix haversine
/// errors, CEP50/CEP95/RMS. `start_time` is the declared acquisition start
/// (HHMMSS UTC). Fails when no observation passes the quality filter.
pub fn analyze(
    observations: &[FixObservation],
    reference: Coordinate,
    start_time: &str,
) -> Result<AccuracySummary, Error> {
    let good: Vec<(&FixObservation, Coordinate)> = observations
        .iter()
        .filter(|obs| obs.fix_quality > 0)
        .filter_map(|obs| obs.coordinate.map(|c| (obs, c)))
        .collect();

    if good.is_empty() {
        return Err(Error::NoValidFixes);
    }

    let start_s = clock_seconds(start_time)?;

    let (first, _) = good[0];
    let first_fix_s = clock_seconds(&first.utc_time)?;

    let ttff_seconds = if first_fix_s < start_s {
        // fix clocked "before" start: capture crossed midnight
        (first_fix_s + SECONDS_PER_DAY - start_s) as f64
    } else {
        (first_fix_s - start_s) as f64
    };

    let per_fix: Vec<FixError> = good
        .iter()
        .map(|(obs, coordinate)| FixError {
            utc_time: obs.utc_time.clone(),
            satellites: obs.satellites,
            hdop: obs.hdop,
            error_m: haversine_m(reference, *coordinate),
        })
        .collect();

    let sorted: Vec<f64> = per_fix
        .iter()
        .map(|fix| fix.error_m)
        .sorted_by(f64::total_cmp)
        .collect();

    let cep50_m = percentile(&sorted, 50.0);
    let cep95_m = percentile(&sorted, 95.0);

    let mean_sq = sorted.iter().map(|e| e * e).sum::<f64>() / sorted.len() as f64;
    let rms_error_m = mean_sq.sqrt();

    Ok(AccuracySummary {
        start_time: start_time.to_string(),
        reference,
        first_fix_time: first.utc_time.clone(),
        ttff_seconds,
        fix_count: per_fix.len(),
        cep50_m,
        cep95_m,
        rms_error_m,
        per_fix,
    })
}

/// East/North offsets of every good fix, for spatial scatter rendering.
pub fn planar_offsets(observations: &[FixObservation], reference: Coordinate) -> Vec<PlanarOffset> {
    let meters_per_deg_lat = std::f64::consts::PI / 180.0 * EARTH_RADIUS_M;
    let meters_per_deg_lon = meters_per_deg_lat * reference.latitude.to_radians().cos();

    observations
        .iter()
        .filter(|obs| obs.fix_quality > 0)
        .filter_map(|obs| obs.coordinate)
        .map(|c| PlanarOffset {
            east_m: (c.longitude - reference.longitude) * meters_per_deg_lon,
            north_m: (c.latitude - reference.latitude) * meters_per_deg_lat,
        })
        .collect()
}

/// Great-circle distance between two points, spherical Earth [m].
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Seconds past midnight for a 6-digit HHMMSS value
pub fn clock_seconds(hhmmss: &str) -> Result<u32, Error> {
    if hhmmss.len() != 6 || !hhmmss.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidClockTime(hhmmss.to_string()));
    }

    let hours: u32 = hhmmss[0..2].parse().unwrap_or(0);
    let minutes: u32 = hhmmss[2..4].parse().unwrap_or(0);
    let seconds: u32 = hhmmss[4..6].parse().unwrap_or(0);

    Ok(hours * 3600 + minutes * 60 + seconds)
}

/// Percentile with linear interpolation between order statistics.
/// `sorted` must be ascending and non-empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let frac = rank - below as f64;

    if below + 1 < sorted.len() {
        sorted[below] + frac * (sorted[below + 1] - sorted[below])
    } else {
        sorted[below]
    }
}

impl AccuracySummary {
    /// Plain text rendering: key/value block followed by a sample table of
    /// the first 20 good fixes. This is the persisted analysis artifact.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(1024);

        out.push_str(&format!("GNSS Start Time (UTC): {}\n", self.start_time));
        out.push_str(&format!(
            "Reference (lat,lon): {:.6}, {:.6}\n",
            self.reference.latitude, self.reference.longitude
        ));
        out.push_str(&format!("First Fix Time (UTC): {}\n", self.first_fix_time));
        out.push_str(&format!("TTFF (s): {:.1}\n", self.ttff_seconds));
        out.push_str(&format!("Num Fixes: {}\n", self.fix_count));
        out.push_str(&format!("CEP50: {:.2} m\n", self.cep50_m));
        out.push_str(&format!("CEP95: {:.2} m\n", self.cep95_m));
        out.push_str(&format!("RMS Error: {:.2} m\n", self.rms_error_m));

        out.push_str("\nSample Fixes (Time | Sats | HDOP | Err(m)):\n");

        for fix in self.per_fix.iter().take(SAMPLE_TABLE_ROWS) {
            let satellites = match fix.satellites {
                Some(n) => format!("{}", n),
                None => "-".to_string(),
            };

            let hdop = match fix.hdop {
                Some(h) => format!("{:.2}", h),
                None => "-".to_string(),
            };

            out.push_str(&format!(
                "{:>6} | {:>4} | {:>5} | {:>8.2}\n",
                fix.utc_time, satellites, hdop, fix.error_m
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::parse_log;

    const REF: Coordinate = Coordinate {
        latitude: 48.1173,
        longitude: 11.5167,
    };

    fn observation(time: &str, quality: u32, coordinate: Option<Coordinate>) -> FixObservation {
        FixObservation {
            utc_time: time.to_string(),
            fix_quality: quality,
            coordinate,
            hdop: Some(1.0),
            satellites: Some(8),
        }
    }

    #[test]
    fn haversine_identity_and_symmetry() {
        let munich = REF;
        let sydney = Coordinate {
            latitude: -33.8688,
            longitude: 151.2093,
        };

        assert_eq!(haversine_m(munich, munich), 0.0);
        assert!((haversine_m(munich, sydney) - haversine_m(sydney, munich)).abs() < 1e-6);
    }

    #[test]
    fn haversine_one_degree_latitude() {
        let north = Coordinate {
            latitude: REF.latitude + 1.0,
            longitude: REF.longitude,
        };

        // one degree of latitude on the 6371 km sphere
        let expected = std::f64::consts::PI / 180.0 * EARTH_RADIUS_M;
        assert!((haversine_m(REF, north) - expected).abs() < 1.0);
    }

    #[test]
    fn ttff_same_day() {
        let obs = vec![observation("120510", 1, Some(REF))];
        let summary = analyze(&obs, REF, "120000").unwrap();

        assert_eq!(summary.ttff_seconds, 310.0);
        assert_eq!(summary.first_fix_time, "120510");
    }

    #[test]
    fn ttff_wraps_past_midnight() {
        let obs = vec![observation("000030", 1, Some(REF))];
        let summary = analyze(&obs, REF, "235950").unwrap();

        // 30 s past midnight, started 10 s before: 40 s, not negative
        assert_eq!(summary.ttff_seconds, 40.0);
    }

    #[test]
    fn reference_equal_to_fix_zeroes_all_metrics() {
        let obs = vec![observation("120510", 1, Some(REF))];
        let summary = analyze(&obs, REF, "120000").unwrap();

        assert!(summary.cep50_m.abs() < 1e-9);
        assert!(summary.cep95_m.abs() < 1e-9);
        assert!(summary.rms_error_m.abs() < 1e-9);
    }

    #[test]
    fn cep50_never_exceeds_cep95() {
        let offsets = [0.0001, 0.0002, 0.0005, 0.001];

        let obs: Vec<FixObservation> = offsets
            .iter()
            .enumerate()
            .map(|(i, dlat)| {
                observation(
                    &format!("1200{:02}", i),
                    1,
                    Some(Coordinate {
                        latitude: REF.latitude + dlat,
                        longitude: REF.longitude,
                    }),
                )
            })
            .collect();

        let summary = analyze(&obs, REF, "120000").unwrap();

        assert!(summary.cep50_m < summary.cep95_m);
        assert!(summary.cep50_m > 0.0);
    }

    #[test]
    fn quality_filter_rejects_everything() {
        let obs = vec![
            observation("120000", 0, Some(REF)),
            observation("120001", 1, None),
        ];

        assert!(matches!(analyze(&obs, REF, "120000"), Err(Error::NoValidFixes)));
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0];

        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 50.0), 2.5);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
        assert!((percentile(&sorted, 95.0) - 3.85).abs() < 1e-12);
    }

    #[test]
    fn planar_offset_matches_latitude_scale() {
        let obs = vec![observation(
            "120000",
            1,
            Some(Coordinate {
                latitude: REF.latitude + 0.001,
                longitude: REF.longitude,
            }),
        )];

        let offsets = planar_offsets(&obs, REF);
        assert_eq!(offsets.len(), 1);

        let expected_north = 0.001 * std::f64::consts::PI / 180.0 * EARTH_RADIUS_M;
        assert!((offsets[0].north_m - expected_north).abs() < 1e-6);
        assert!(offsets[0].east_m.abs() < 1e-9);
    }

    #[test]
    fn end_to_end_from_log_text() {
        let log = "# START 120000\n\
                   $GPGGA,120510,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\n\
                   $GPGGA,120511,4807.038,N,01131.001,E,1,08,0.9,545.4,M,46.9,M,,*47\n";

        let observations = parse_log(log.lines()).unwrap();
        let summary = analyze(&observations, REF, "120000").unwrap();

        assert_eq!(summary.fix_count, 2);
        assert_eq!(summary.ttff_seconds, 310.0);

        let rendered = summary.render();
        assert!(rendered.contains("GNSS Start Time (UTC): 120000"));
        assert!(rendered.contains("TTFF (s): 310.0"));
        assert!(rendered.contains("Num Fixes: 2"));
        assert!(rendered.contains("Sample Fixes (Time | Sats | HDOP | Err(m)):"));
    }

    #[test]
    fn invalid_start_time_reported() {
        let obs = vec![observation("120510", 1, Some(REF))];
        assert!(matches!(
            analyze(&obs, REF, "12:00"),
            Err(Error::InvalidClockTime(_))
        ));
    }
}

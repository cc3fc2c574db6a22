//! GGA sentence extraction from a capture log.
//!
//! Only the Global Positioning Fix Data family is decoded here: the capture
//! side requests six sentence families for completeness of the raw log, but
//! fix quality characterization needs GGA alone.

use crate::errors::Error;

/// Geographic coordinate, signed decimal degrees
/// (south and west are negative).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// One fix report parsed from a single GGA line.
/// Immutable once created; collected in log order, never re-sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct FixObservation {
    /// UTC time of the fix, HHMMSS, fractional seconds stripped
    pub utc_time: String,

    /// Fix quality indicator, 0 = no fix
    pub fix_quality: u32,

    /// Reported position. GGA carries a full coordinate pair or none,
    /// which the single Option encodes.
    pub coordinate: Option<Coordinate>,

    /// Horizontal dilution of precision
    pub hdop: Option<f64>,

    /// Number of satellites used in the solution
    pub satellites: Option<u32>,
}

/// Parses a capture log (any iterator of text lines) into the ordered
/// [FixObservation] list. Torn or malformed lines are expected noise in a
/// live NMEA stream and are skipped silently; an input yielding zero
/// observations is a hard [Error::NoObservations].
pub fn parse_log<'a, I>(lines: I) -> Result<Vec<FixObservation>, Error>
where
    I: IntoIterator<Item = &'a str>,
{
    let observations: Vec<FixObservation> =
        lines.into_iter().filter_map(parse_gga_line).collect();

    if observations.is_empty() {
        return Err(Error::NoObservations);
    }

    Ok(observations)
}

/// Decodes one line when it is an acceptable GGA sentence:
/// `$` + two-character talker + `GGA`, at least 9 comma-separated fields,
/// 6-digit time field. Anything else yields None.
pub fn parse_gga_line(line: &str) -> Option<FixObservation> {
    let line = line.trim();

    if !line.starts_with('$') || line.len() < 6 || &line.as_bytes()[3..6] != b"GGA" {
        return None;
    }

    let fields: Vec<&str> = line.split(',').collect();

    if fields.len() < 9 {
        return None;
    }

    // time field: strip fractional seconds, require exactly HHMMSS
    let utc_time = fields[1].split('.').next().unwrap_or("");

    if utc_time.len() != 6 || !utc_time.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let fix_quality = if fields[6].bytes().all(|b| b.is_ascii_digit()) {
        fields[6].parse::<u32>().unwrap_or(0)
    } else {
        0
    };

    let coordinate = parse_coordinate(fields[2], fields[3], fields[4], fields[5]);

    let satellites = if !fields[7].is_empty() && fields[7].bytes().all(|b| b.is_ascii_digit()) {
        fields[7].parse::<u32>().ok()
    } else {
        None
    };

    let hdop = if !fields[8].is_empty() {
        fields[8].parse::<f64>().ok()
    } else {
        None
    };

    Some(FixObservation {
        utc_time: utc_time.to_string(),
        fix_quality,
        coordinate,
        hdop,
        satellites,
    })
}

/// DDMM.MMMM (latitude) and DDDMM.MMMM (longitude) decoding.
/// Both raw fields must be present, or the pair is absent as a whole.
fn parse_coordinate(lat: &str, lat_hem: &str, lon: &str, lon_hem: &str) -> Option<Coordinate> {
    if lat.is_empty() || lon.is_empty() {
        return None;
    }

    let latitude = parse_angle(lat, 2, lat_hem == "S")?;
    let longitude = parse_angle(lon, 3, lon_hem == "W")?;

    Some(Coordinate {
        latitude,
        longitude,
    })
}

fn parse_angle(field: &str, degree_digits: usize, negated: bool) -> Option<f64> {
    if !field.is_ascii() || field.len() <= degree_digits {
        return None;
    }

    let degrees = field[..degree_digits].parse::<f64>().ok()?;
    let minutes = field[degree_digits..].parse::<f64>().ok()?;

    let angle = degrees + minutes / 60.0;
    Some(if negated { -angle } else { angle })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GGA: &str = "$GPGGA,120510,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

    #[test]
    fn canonical_gga_sentence() {
        let obs = parse_gga_line(GGA).unwrap();

        assert_eq!(obs.utc_time, "120510");
        assert_eq!(obs.fix_quality, 1);
        assert_eq!(obs.satellites, Some(8));
        assert_eq!(obs.hdop, Some(0.9));

        let coordinate = obs.coordinate.unwrap();
        assert!((coordinate.latitude - 48.1173).abs() < 1e-4);
        assert!((coordinate.longitude - 11.5167).abs() < 1e-4);
    }

    #[test]
    fn southern_western_hemispheres_negate() {
        let line = "$GNGGA,120510.00,3352.250,S,15112.750,W,1,07,1.2,10.0,M,,M,,*00";
        let obs = parse_gga_line(line).unwrap();

        let coordinate = obs.coordinate.unwrap();
        assert!(coordinate.latitude < 0.0);
        assert!(coordinate.longitude < 0.0);
        assert!((coordinate.latitude + (33.0 + 52.25 / 60.0)).abs() < 1e-9);
        assert!((coordinate.longitude + (151.0 + 12.75 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn fractional_seconds_stripped() {
        let line = "$GPGGA,120510.50,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
        let obs = parse_gga_line(line).unwrap();
        assert_eq!(obs.utc_time, "120510");
    }

    #[test]
    fn missing_coordinate_pair_is_absent() {
        // searching: no position yet, quality 0
        let line = "$GPGGA,120510,,,,,0,00,99.9,,M,,M,,*00";
        let obs = parse_gga_line(line).unwrap();

        assert_eq!(obs.fix_quality, 0);
        assert!(obs.coordinate.is_none());
        assert_eq!(obs.satellites, Some(0));
    }

    #[test]
    fn torn_lines_rejected() {
        // fewer than 9 fields
        assert!(parse_gga_line("$GPGGA,120510,4807.038,N").is_none());
        // wrong time width
        assert!(parse_gga_line("$GPGGA,1205,4807.038,N,01131.000,E,1,08,0.9,545.4,M").is_none());
        // non-numeric time
        assert!(parse_gga_line("$GPGGA,12x510,4807.038,N,01131.000,E,1,08,0.9,545.4,M").is_none());
        // other sentence families
        assert!(parse_gga_line("$GPRMC,120510,A,4807.038,N,01131.000,E,0.0,0.0,230394,,*00").is_none());
        assert!(parse_gga_line("# START 120000").is_none());
    }

    #[test]
    fn log_without_observations_is_fatal() {
        let log = "# START 120000\n$GPGSV,3,1,12,01,40,083,46*75\ngarbage";
        let result = parse_log(log.lines());
        assert!(matches!(result, Err(Error::NoObservations)));
    }

    #[test]
    fn parsing_is_idempotent() {
        let log = format!("# START 120000\n{}\n$GPGGA,torn\n{}\n", GGA, GGA);
        let first = parse_log(log.lines()).unwrap();
        let second = parse_log(log.lines()).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }
}

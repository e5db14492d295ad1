//! Naming rules for the traffic archive layout.
//!
//! ```text
//! <base>/<district>/<year>/<date>.traffic      zip container, entries = file names
//! <base>/<district>/<year>/<date>/<name>       loose sample files
//! <base>/<district>/<year>/<date>/<id>.vlog    raw vehicle event log
//! ```

use crate::binning::ChannelKind;

/// Extension of a per-date zip container.
pub const TRAFFIC_EXT: &str = ".traffic";

/// Extension of a raw vehicle event log.
pub const VLOG_EXT: &str = ".vlog";

/// Longest sample file name accepted in a request.
pub const MAX_FILE_NAME_LEN: usize = 24;

/// Extensions of binned (fixed period) sample files.
const BINNED_EXTS: [&str; 5] = [".v30", ".c30", ".s30", ".pr60", ".pt60"];

/// Storage width of one sample in a binned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    /// Signed 8-bit samples.
    Byte,
    /// Big-endian signed 16-bit samples.
    Short,
}

impl SampleWidth {
    pub fn for_file_name(name: &str) -> Self {
        if name.ends_with(".c30") || name.ends_with(".pr60") {
            SampleWidth::Short
        } else {
            SampleWidth::Byte
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            SampleWidth::Byte => 1,
            SampleWidth::Short => 2,
        }
    }
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// A year is exactly four digits.
pub fn is_valid_year(year: &str) -> bool {
    is_digits(year, 4)
}

/// A date is exactly eight digits, `yyyyMMdd`.
pub fn is_valid_date(date: &str) -> bool {
    is_digits(date, 8)
}

/// The year prefix of a valid date.
pub fn year_of(date: &str) -> &str {
    &date[..4]
}

/// A path component that cannot escape its parent directory.
pub fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

/// A requested sample file name: short and a plain path component.
pub fn is_valid_file_name(name: &str) -> bool {
    name.len() <= MAX_FILE_NAME_LEN && is_plain_component(name)
}

pub fn is_binned_file(name: &str) -> bool {
    BINNED_EXTS.iter().any(|ext| name.ends_with(ext))
}

pub fn is_valid_sample_file(name: &str) -> bool {
    is_binned_file(name) || name.ends_with(VLOG_EXT)
}

/// Sensor ID of a sample file: the part before the first dot.
pub fn sensor_id(name: &str) -> &str {
    match name.find('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    }
}

/// Name of the `.vlog` a derivable channel file is computed from.
pub fn vlog_name(name: &str) -> Option<String> {
    ChannelKind::from_file_name(name)?;
    let (stem, _) = name.rsplit_once('.')?;
    Some(format!("{stem}{VLOG_EXT}"))
}

/// Date named by an entry of a year directory, if it is a date directory
/// (`is_dir`) or a date container file.
pub fn traffic_date(name: &str, is_dir: bool) -> Option<&str> {
    let date = name.get(..8)?;
    if !is_valid_date(date) {
        return None;
    }
    let rest = &name[8..];
    if (rest.is_empty() && is_dir) || (rest == TRAFFIC_EXT && !is_dir) {
        Some(date)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_and_date_validation() {
        assert!(is_valid_year("2023"));
        assert!(!is_valid_year("23"));
        assert!(!is_valid_year("20a3"));
        assert!(!is_valid_year("+202"));
        assert!(is_valid_date("20230101"));
        assert!(!is_valid_date("2023011"));
        assert!(!is_valid_date("2023-01-01"));
        assert_eq!(year_of("20230101"), "2023");
    }

    #[test]
    fn test_file_name_validation() {
        assert!(is_valid_file_name("det1.v30"));
        assert!(is_valid_file_name("det1.v30.json"));
        assert!(!is_valid_file_name(""));
        assert!(!is_valid_file_name("../det1.v30"));
        assert!(!is_valid_file_name("a/b.v30"));
        assert!(!is_valid_file_name("a_very_long_detector_name.v30"));
    }

    #[test]
    fn test_sample_file_classification() {
        for name in ["1.v30", "1.c30", "1.s30", "1.pr60", "1.pt60"] {
            assert!(is_binned_file(name), "{name}");
            assert!(is_valid_sample_file(name), "{name}");
        }
        assert!(!is_binned_file("1.vlog"));
        assert!(is_valid_sample_file("1.vlog"));
        assert!(!is_valid_sample_file("notes.txt"));
    }

    #[test]
    fn test_sensor_id() {
        assert_eq!(sensor_id("det1.v30"), "det1");
        assert_eq!(sensor_id("det1.v30.json"), "det1");
        assert_eq!(sensor_id("nodot"), "nodot");
        assert_eq!(sensor_id(".v30"), ".v30");
    }

    #[test]
    fn test_vlog_name() {
        assert_eq!(vlog_name("det1.v30").as_deref(), Some("det1.vlog"));
        assert_eq!(vlog_name("det1.s30").as_deref(), Some("det1.vlog"));
        assert_eq!(vlog_name("det1.c30"), None);
        assert_eq!(vlog_name("det1.vlog"), None);
    }

    #[test]
    fn test_sample_width() {
        assert_eq!(SampleWidth::for_file_name("1.c30"), SampleWidth::Short);
        assert_eq!(SampleWidth::for_file_name("1.pr60"), SampleWidth::Short);
        assert_eq!(SampleWidth::for_file_name("1.v30"), SampleWidth::Byte);
        assert_eq!(SampleWidth::Short.bytes(), 2);
    }

    #[test]
    fn test_traffic_date() {
        assert_eq!(traffic_date("20230101", true), Some("20230101"));
        assert_eq!(traffic_date("20230101.traffic", false), Some("20230101"));
        assert_eq!(traffic_date("20230101", false), None);
        assert_eq!(traffic_date("20230101.traffic", true), None);
        assert_eq!(traffic_date("20230101.zip", false), None);
        assert_eq!(traffic_date("2023010x", true), None);
        assert_eq!(traffic_date("2023", true), None);
    }
}

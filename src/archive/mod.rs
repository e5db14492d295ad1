//! Read-only access to the traffic sample archive.
//!
//! A sample file for one date is looked up in three tiers, first hit wins:
//!
//! 1. an entry of the date's zip container (`<date>.traffic`),
//! 2. a loose file in the date directory,
//! 3. for `.v30` / `.s30` only, a channel computed from the sensor's `.vlog`,
//!    which is itself looked up through tiers 1 and 2.
//!
//! Files and containers are opened per call and closed before returning.

pub mod names;

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::binning::{Channel, ChannelKind, bin};
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, EventError};
use crate::event_log::EventLog;
use names::{
    TRAFFIC_EXT, VLOG_EXT, is_plain_component, is_valid_date, is_valid_file_name,
    is_valid_sample_file, is_valid_year, sensor_id, traffic_date, vlog_name, year_of,
};

/// Reconstructs and bins raw `.vlog` bytes into a channel.
pub fn compute_channel(vlog: &[u8], kind: ChannelKind) -> Result<Channel, EventError> {
    let mut log = EventLog::from_bytes(vlog);
    log.reconstruct()?;
    bin(&log, kind)
}

/// A traffic archive rooted at a base directory holding one directory per district.
#[derive(Debug, Clone)]
pub struct TrafficArchive {
    base: PathBuf,
}

impl TrafficArchive {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(&config.base_path)
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// Dates with a date directory or a zip container in `year`, ascending.
    #[tracing::instrument(skip(self))]
    pub fn list_dates(&self, district: &str, year: &str) -> Result<Vec<String>, ArchiveError> {
        check_district(district)?;
        if !is_valid_year(year) {
            return Err(ArchiveError::InvalidYear(year.to_string()));
        }
        let dir = self.base.join(district).join(year);
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "No year directory");
            return Ok(Vec::new());
        }
        let mut dates = BTreeSet::new();
        for entry in fs::read_dir(&dir).map_err(|e| ArchiveError::io(&dir, e))? {
            let entry = entry.map_err(|e| ArchiveError::io(&dir, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let path = entry.path();
            let date = if path.is_dir() {
                traffic_date(name, true)
            } else if path.is_file() {
                traffic_date(name, false)
            } else {
                None
            };
            if let Some(date) = date {
                dates.insert(date.to_string());
            }
        }
        Ok(dates.into_iter().collect())
    }

    /// Sensor IDs with at least one sample file on `date`, sorted.
    #[tracing::instrument(skip(self))]
    pub fn list_sensors(&self, district: &str, date: &str) -> Result<Vec<String>, ArchiveError> {
        let names = self.sample_names(district, date)?;
        let sensors: BTreeSet<&str> = names.iter().map(|n| sensor_id(n)).collect();
        Ok(sensors.into_iter().map(String::from).collect())
    }

    /// Sample file names available on `date`, sorted.
    #[tracing::instrument(skip(self))]
    pub fn list_files(&self, district: &str, date: &str) -> Result<Vec<String>, ArchiveError> {
        Ok(self.sample_names(district, date)?.into_iter().collect())
    }

    /// Returns the contents of sample file `name` for `date`.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::NotFound`] when no tier holds the file. A `.vlog` that
    /// cannot be reconstructed or binned fails with [`ArchiveError::Event`].
    #[tracing::instrument(skip(self))]
    pub fn resolve(&self, district: &str, date: &str, name: &str) -> Result<Vec<u8>, ArchiveError> {
        check_request(district, date, name)?;
        if let Some(bytes) = self.read_stored(district, date, name)? {
            return Ok(bytes);
        }
        if let (Some(kind), Some(vlog)) = (ChannelKind::from_file_name(name), vlog_name(name)) {
            if let Some(bytes) = self.read_stored(district, date, &vlog)? {
                debug!(tier = "computed", vlog = %vlog, ?kind, "Binning vehicle event log");
                return Ok(compute_channel(&bytes, kind)?.to_bytes());
            }
        }
        debug!("Sample file not found in any tier");
        Err(not_found(district, date, name))
    }

    /// Loads and parses a sensor's raw event log without reconstructing it.
    #[tracing::instrument(skip(self))]
    pub fn load_event_log(
        &self,
        district: &str,
        date: &str,
        sensor: &str,
    ) -> Result<EventLog, ArchiveError> {
        let name = format!("{sensor}{VLOG_EXT}");
        check_request(district, date, &name)?;
        match self.read_stored(district, date, &name)? {
            Some(bytes) => Ok(EventLog::from_bytes(&bytes)),
            None => Err(not_found(district, date, &name)),
        }
    }

    fn date_dir(&self, district: &str, date: &str) -> PathBuf {
        self.base.join(district).join(year_of(date)).join(date)
    }

    fn traffic_path(&self, district: &str, date: &str) -> PathBuf {
        self.base
            .join(district)
            .join(year_of(date))
            .join(format!("{date}{TRAFFIC_EXT}"))
    }

    /// Tiers 1 and 2.
    fn read_stored(
        &self,
        district: &str,
        date: &str,
        name: &str,
    ) -> Result<Option<Vec<u8>>, ArchiveError> {
        if let Some(bytes) = self.read_zip_entry(district, date, name)? {
            debug!(tier = "zip", name, "Sample file found");
            return Ok(Some(bytes));
        }
        if let Some(bytes) = self.read_loose_file(district, date, name)? {
            debug!(tier = "file", name, "Sample file found");
            return Ok(Some(bytes));
        }
        Ok(None)
    }

    /// Opens the date's zip container. A missing or corrupt container is `None`.
    fn open_container(&self, path: &Path) -> Option<ZipArchive<File>> {
        if !path.is_file() {
            return None;
        }
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cannot open traffic container");
                return None;
            }
        };
        match ZipArchive::new(file) {
            Ok(zip) => Some(zip),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable traffic container");
                None
            }
        }
    }

    fn read_zip_entry(
        &self,
        district: &str,
        date: &str,
        name: &str,
    ) -> Result<Option<Vec<u8>>, ArchiveError> {
        let path = self.traffic_path(district, date);
        let Some(mut zip) = self.open_container(&path) else {
            return Ok(None);
        };
        let mut entry = match zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                warn!(path = %path.display(), name, error = %e, "Unreadable container entry");
                return Ok(None);
            }
        };
        // Sized by what is actually read; header sizes are not trusted.
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| ArchiveError::io(path.join(name), e))?;
        Ok(Some(bytes))
    }

    fn read_loose_file(
        &self,
        district: &str,
        date: &str,
        name: &str,
    ) -> Result<Option<Vec<u8>>, ArchiveError> {
        let path = self.date_dir(district, date).join(name);
        if !path.is_file() {
            return Ok(None);
        }
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Cannot open sample file");
                return Ok(None);
            }
        };
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| ArchiveError::io(&path, e))?;
        Ok(Some(bytes))
    }

    fn sample_names(&self, district: &str, date: &str) -> Result<BTreeSet<String>, ArchiveError> {
        check_district(district)?;
        check_date(date)?;
        let mut names = BTreeSet::new();
        if let Some(zip) = self.open_container(&self.traffic_path(district, date)) {
            names.extend(
                zip.file_names()
                    .filter(|n| is_valid_sample_file(n))
                    .map(String::from),
            );
        }
        let dir = self.date_dir(district, date);
        if dir.is_dir() {
            for entry in fs::read_dir(&dir).map_err(|e| ArchiveError::io(&dir, e))? {
                let entry = entry.map_err(|e| ArchiveError::io(&dir, e))?;
                let file_name = entry.file_name();
                if let Some(name) = file_name.to_str().filter(|n| is_valid_sample_file(n)) {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names)
    }
}

fn not_found(district: &str, date: &str, name: &str) -> ArchiveError {
    ArchiveError::NotFound {
        district: district.to_string(),
        date: date.to_string(),
        name: name.to_string(),
    }
}

fn check_district(district: &str) -> Result<(), ArchiveError> {
    if is_plain_component(district) {
        Ok(())
    } else {
        Err(ArchiveError::InvalidDistrict(district.to_string()))
    }
}

fn check_date(date: &str) -> Result<(), ArchiveError> {
    if is_valid_date(date) {
        Ok(())
    } else {
        Err(ArchiveError::InvalidDate(date.to_string()))
    }
}

fn check_request(district: &str, date: &str, name: &str) -> Result<(), ArchiveError> {
    check_district(district)?;
    check_date(date)?;
    if is_valid_file_name(name) {
        Ok(())
    } else {
        Err(ArchiveError::InvalidFileName(name.to_string()))
    }
}

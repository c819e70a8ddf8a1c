//! Serial session: device discovery and the open link
//!
//! The session owns the one device reference the bridge ever holds. The
//! reference is set by [`SerialSession::discover`] and cleared by
//! [`SerialSession::close`] or a failed discovery/open, so an open link always
//! has a device path behind it.

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::transport::{Connector, SerialConnector, Transport};
use std::fs;
use std::path::{Path, PathBuf};

/// Finds the microcontroller by scanning a directory for a path prefix
#[derive(Debug, Clone)]
pub struct DeviceLocator {
    directory: PathBuf,
    prefix: String,
    sort_candidates: bool,
}

impl DeviceLocator {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            sort_candidates: false,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(config.directory.clone(), config.prefix.clone())
            .sort_candidates(config.sort_candidates)
    }

    /// Select the smallest matching name instead of the first enumerated one
    pub fn sort_candidates(mut self, sort: bool) -> Self {
        self.sort_candidates = sort;
        self
    }

    /// Scan the directory once
    ///
    /// Without sorting, the first entry in enumeration order wins, which is
    /// not stable across runs when several devices match.
    pub fn scan(&self) -> Option<PathBuf> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot scan {}: {}", self.directory.display(), e);
                return None;
            }
        };

        let mut candidates = entries
            .flatten()
            .map(|entry| self.directory.join(entry.file_name()))
            .filter(|path| self.matches(path));

        if self.sort_candidates {
            candidates.min()
        } else {
            candidates.next()
        }
    }

    fn matches(&self, path: &Path) -> bool {
        path.to_string_lossy().starts_with(&self.prefix)
    }
}

/// Open/closed handle to the serial device
pub struct SerialSession {
    locator: DeviceLocator,
    connector: Box<dyn Connector>,
    /// Serial device reference - `None` until discovery succeeds
    device: Option<PathBuf>,
    /// Open link - only `Some` while `device` is `Some`
    link: Option<Box<dyn Transport>>,
}

impl SerialSession {
    pub fn new(locator: DeviceLocator, connector: impl Connector + 'static) -> Self {
        Self {
            locator,
            connector: Box::new(connector),
            device: None,
            link: None,
        }
    }

    /// Session over real serial ports
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            DeviceLocator::from_config(config),
            SerialConnector::from_config(config),
        )
    }

    /// Currently recorded device path
    pub fn device(&self) -> Option<&Path> {
        self.device.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Look for the device and record its path
    ///
    /// A failed scan clears any previously recorded path.
    pub fn discover(&mut self) -> bool {
        match self.locator.scan() {
            Some(path) => {
                log::info!("Serial device found in {}", path.display());
                self.device = Some(path);
                true
            }
            None => {
                log::warn!("Serial device not found, attach it!");
                self.device = None;
                false
            }
        }
    }

    /// Open the recorded device
    ///
    /// On failure the path is forgotten so the next exchange discovers again.
    pub fn open(&mut self) -> Result<()> {
        let Some(path) = self.device.clone() else {
            return Err(Error::DeviceNotFound);
        };

        // Replace rather than leak a link that is still around
        self.link = None;

        match self.connector.connect(&path) {
            Ok(link) => {
                log::info!("Serial session open on {}", path.display());
                self.link = Some(link);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to open {}: {}", path.display(), e);
                self.device = None;
                Err(e)
            }
        }
    }

    /// Discover and open unless a session is already live
    pub fn ensure_open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        if !self.discover() {
            return Err(Error::DeviceNotFound);
        }
        self.open().map_err(|_| Error::DeviceNotFound)
    }

    /// Release the link and forget the device path
    ///
    /// Safe to call on a closed session.
    pub fn close(&mut self) {
        if self.link.take().is_some()
            && let Some(path) = &self.device
        {
            log::info!("Serial session closed on {}", path.display());
        }
        self.device = None;
    }

    /// Write all of `data` to the link
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let link = self.link.as_mut().ok_or(Error::DeviceNotFound)?;
        let mut written = 0;
        while written < data.len() {
            match link.write(&data[written..])? {
                0 => {
                    return Err(Error::Io(std::io::Error::from(
                        std::io::ErrorKind::WriteZero,
                    )));
                }
                n => written += n,
            }
        }
        link.flush()?;
        Ok(written)
    }

    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let link = self.link.as_mut().ok_or(Error::DeviceNotFound)?;
        link.read(buffer)
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        self.close();
    }
}

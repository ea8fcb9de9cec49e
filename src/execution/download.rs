//! Installer Download
//!
//! Fetches a single artifact over HTTP(S) into a file. No retries.

use std::fs::File;
use std::io;
use std::path::Path;

use log::info;

use crate::error::{ProvisionError, Result};

/// Capability to fetch an artifact.
pub trait Downloader {
    /// Downloads `url` into `dest`, returning the number of bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Blocking HTTP downloader.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpDownloader;

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {} -> {}", url, dest.display());

        let download_error = |reason: String| ProvisionError::Download {
            url: url.to_string(),
            reason,
        };

        let mut response = reqwest::blocking::get(url)
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_error(e.to_string()))?;

        let mut file = File::create(dest)?;
        let bytes = io::copy(&mut response, &mut file).map_err(|e| download_error(e.to_string()))?;

        info!("Downloaded {} bytes", bytes);
        Ok(bytes)
    }
}

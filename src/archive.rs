use anyhow::{Context, Result};
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// Returns the project.json text stored in an `.sb3` archive.
pub fn read_project_json(bytes: &[u8]) -> Result<String> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).context("Input is not a valid zip/.sb3 file.")?;
    debug!(entries = zip.len(), "opened archive");

    let mut entry = zip
        .by_name("project.json")
        .context("project.json not found in the archive.")?;
    let mut json = String::new();
    entry
        .read_to_string(&mut json)
        .context("Failed to read project.json from the archive.")?;
    Ok(json)
}

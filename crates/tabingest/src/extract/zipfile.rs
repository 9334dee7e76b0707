use std::path::Path;

use tracing::debug;

use super::{guard, open_archive, write_entry, Unpacked};
use crate::error::ExtractionError;

fn malformed(e: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Malformed {
        format: "zip",
        reason: e.to_string(),
    }
}

pub(super) fn extract_zip(archive_path: &Path, dest: &Path) -> Result<Unpacked, ExtractionError> {
    let file = open_archive(archive_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(malformed)?;
    let mut unpacked = Unpacked::default();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(malformed)?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        // Raw name and the zip crate's own view must both stay inside dest.
        let target = match (guard::confine(dest, &name), entry.enclosed_name()) {
            (Some(target), Some(_)) => target,
            _ => {
                unpacked.drop_entry(&name, "path escapes extraction directory");
                continue;
            }
        };
        if guard::is_hidden(&name) {
            debug!("Skipping hidden zip entry '{}'", name);
            continue;
        }

        write_entry(&mut entry, &target)?;
        unpacked.add_file(target);
    }

    Ok(unpacked)
}

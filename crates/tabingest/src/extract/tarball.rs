use std::io::Read;
use std::path::Path;

use tracing::debug;

use super::{guard, write_entry, Unpacked};
use crate::error::ExtractionError;

fn malformed(e: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Malformed {
        format: "tar",
        reason: e.to_string(),
    }
}

/// Unpacks a tar stream into `dest`. Only regular files are written; links
/// are dropped so no later entry can be redirected through one.
pub(super) fn extract_tar<R: Read>(
    reader: R,
    dest: &Path,
    unpacked: &mut Unpacked,
) -> Result<(), ExtractionError> {
    let mut archive = tar::Archive::new(reader);

    for entry_result in archive.entries().map_err(malformed)? {
        let mut entry = entry_result.map_err(malformed)?;
        let name = entry
            .path()
            .map_err(malformed)?
            .to_string_lossy()
            .into_owned();
        let kind = entry.header().entry_type();

        if kind.is_symlink() || kind.is_hard_link() {
            unpacked.drop_entry(&name, "link entries are not extracted");
            continue;
        }
        if !kind.is_file() {
            continue;
        }

        let Some(target) = guard::confine(dest, &name) else {
            unpacked.drop_entry(&name, "path escapes extraction directory");
            continue;
        };
        if guard::is_hidden(&name) {
            debug!("Skipping hidden tar entry '{}'", name);
            continue;
        }

        write_entry(&mut entry, &target)?;
        unpacked.add_file(target);
    }

    Ok(())
}

//! 7z and RAR extraction through the system's command-line tools.
//!
//! The archive is listed first. Entries whose names escape the working
//! directory, link entries, and entries stored beneath a link are excluded
//! from the extraction command and reported, so the tool never writes
//! through a link it has just created.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::{guard, Unpacked};
use crate::error::ExtractionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalTool {
    SevenZip,
    Rar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    SevenZip,
    Unrar,
}

impl Dialect {
    /// Whether `-x` names are matched literally. unrar always treats them
    /// as wildcard masks.
    fn literal_exclusions(self) -> bool {
        matches!(self, Self::SevenZip)
    }
}

/// One entry of an archive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ListedEntry {
    path: String,
    is_link: bool,
}

struct Program {
    name: &'static str,
    dialect: Dialect,
}

const SEVEN_ZIP_PROGRAMS: &[Program] = &[
    Program { name: "7z", dialect: Dialect::SevenZip },
    Program { name: "7za", dialect: Dialect::SevenZip },
    Program { name: "7zz", dialect: Dialect::SevenZip },
];

const RAR_PROGRAMS: &[Program] = &[
    Program { name: "unrar", dialect: Dialect::Unrar },
    Program { name: "7z", dialect: Dialect::SevenZip },
];

impl ExternalTool {
    fn label(self) -> &'static str {
        match self {
            Self::SevenZip => "7z",
            Self::Rar => "rar",
        }
    }

    fn programs(self) -> &'static [Program] {
        match self {
            Self::SevenZip => SEVEN_ZIP_PROGRAMS,
            Self::Rar => RAR_PROGRAMS,
        }
    }
}

pub(super) fn extract(
    tool: ExternalTool,
    archive: &Path,
    dest: &Path,
) -> Result<Unpacked, ExtractionError> {
    let mut unpacked = Unpacked::default();

    for program in tool.programs() {
        let listing = match run(program.name, list_args(program.dialect, archive)) {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} not installed, trying next program", program.name);
                continue;
            }
            Err(e) => return Err(tool_failed(program.name, e.to_string())),
        };
        if !listing.status.success() {
            return Err(tool_failed(program.name, failure_reason(&listing)));
        }

        let stdout = String::from_utf8_lossy(&listing.stdout);
        let entries = match program.dialect {
            Dialect::SevenZip => parse_7z_listing(&stdout),
            Dialect::Unrar => parse_unrar_listing(&stdout),
        };
        let mut refused = Vec::new();
        let excluded = plan_exclusions(&entries, dest, &mut refused);
        if !program.dialect.literal_exclusions() && excluded.iter().any(|n| has_wildcard(n)) {
            debug!(
                "{} cannot exclude wildcard names literally, trying next program",
                program.name
            );
            continue;
        }
        for (name, reason) in &refused {
            unpacked.drop_entry(name, reason);
        }

        info!(
            "Extracting {} archive with {} ({} entr{} excluded)",
            tool.label(),
            program.name,
            excluded.len(),
            if excluded.len() == 1 { "y" } else { "ies" }
        );
        let output = run(
            program.name,
            extract_args(program.dialect, archive, dest, &excluded),
        )
        .map_err(|e| tool_failed(program.name, e.to_string()))?;
        if !output.status.success() {
            return Err(tool_failed(program.name, failure_reason(&output)));
        }

        collect_files(dest, &mut unpacked);
        return Ok(unpacked);
    }

    let tried: Vec<&str> = tool.programs().iter().map(|p| p.name).collect();
    Err(tool_failed(
        tool.label(),
        format!("no usable extraction program found (tried {})", tried.join(", ")),
    ))
}

/// Names to pass as exclusions, with the reason each one is refused.
fn plan_exclusions(
    entries: &[ListedEntry],
    dest: &Path,
    refused: &mut Vec<(String, &'static str)>,
) -> Vec<String> {
    let links: Vec<String> = entries
        .iter()
        .filter(|e| e.is_link)
        .map(|e| normalize(&e.path))
        .collect();

    let mut excluded = Vec::new();
    for entry in entries {
        let reason = if guard::confine(dest, &entry.path).is_none() {
            "path escapes extraction directory"
        } else if entry.is_link {
            "link entries are not extracted"
        } else if beneath_link(&normalize(&entry.path), &links) {
            "parent directory is a link"
        } else {
            continue;
        };
        refused.push((entry.path.clone(), reason));
        excluded.push(entry.path.clone());
    }
    excluded
}

fn normalize(name: &str) -> String {
    name.replace('\\', "/").trim_matches('/').to_string()
}

fn beneath_link(path: &str, links: &[String]) -> bool {
    links.iter().any(|link| {
        path.strip_prefix(link.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    })
}

fn has_wildcard(name: &str) -> bool {
    name.contains(['*', '?'])
}

fn tool_failed(tool: &str, reason: String) -> ExtractionError {
    ExtractionError::ToolFailed {
        tool: tool.to_string(),
        reason,
    }
}

fn run(program: &str, args: Vec<OsString>) -> io::Result<Output> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
}

fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| format!("exited with {}", output.status))
}

fn list_args(dialect: Dialect, archive: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = match dialect {
        Dialect::SevenZip => vec!["l".into(), "-slt".into(), "--".into()],
        Dialect::Unrar => vec!["lt".into(), "--".into()],
    };
    args.push(archive.as_os_str().to_os_string());
    args
}

fn extract_args(
    dialect: Dialect,
    archive: &Path,
    dest: &Path,
    excluded: &[String],
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    match dialect {
        Dialect::SevenZip => {
            args.extend(["x", "-y", "-bd", "-spd"].map(OsString::from));
            let mut out = OsString::from("-o");
            out.push(dest.as_os_str());
            args.push(out);
            args.extend(excluded.iter().map(|n| OsString::from(format!("-x!{}", n))));
            args.push("--".into());
            args.push(archive.as_os_str().to_os_string());
        }
        Dialect::Unrar => {
            args.extend(["x", "-o+", "-idq", "-y"].map(OsString::from));
            args.extend(excluded.iter().map(|n| OsString::from(format!("-x{}", n))));
            args.push("--".into());
            args.push(archive.as_os_str().to_os_string());
            let mut out = dest.as_os_str().to_os_string();
            out.push("/");
            args.push(out);
        }
    }
    args
}

/// Entries from `7z l -slt`. The block before the `----------` line
/// describes the archive itself.
fn parse_7z_listing(stdout: &str) -> Vec<ListedEntry> {
    let mut entries: Vec<ListedEntry> = Vec::new();
    for line in stdout.lines().skip_while(|l| l.trim() != "----------") {
        let field = line
            .split_once(" = ")
            .or_else(|| line.strip_suffix(" =").map(|key| (key, "")));
        let Some((key, value)) = field else {
            continue;
        };
        if key == "Path" {
            entries.push(ListedEntry {
                path: value.to_string(),
                is_link: false,
            });
            continue;
        }
        let Some(current) = entries.last_mut() else {
            continue;
        };
        let link = match key {
            "Symbolic Link" | "Hard Link" | "Link" => !value.trim().is_empty(),
            "Attributes" => mode_is_link(value),
            _ => false,
        };
        current.is_link |= link;
    }
    entries
}

/// True when a 7z attribute string carries a Unix mode of a symlink,
/// e.g. `A_ -lrwxrwxrwx` or `_ lrwxrwxrwx`.
fn mode_is_link(attributes: &str) -> bool {
    attributes.split_whitespace().any(|token| {
        let mode = match token.strip_prefix('-') {
            Some(rest) if rest.len() == 10 => rest,
            _ => token,
        };
        mode.len() == 10 && mode.starts_with('l')
    })
}

/// Entries from `unrar lt`: indented `Name:` / `Type:` / `Target:` fields.
fn parse_unrar_listing(stdout: &str) -> Vec<ListedEntry> {
    let mut entries: Vec<ListedEntry> = Vec::new();
    for line in stdout.lines() {
        let Some((key, value)) = line.trim().split_once(": ") else {
            continue;
        };
        if key == "Name" {
            entries.push(ListedEntry {
                path: value.to_string(),
                is_link: false,
            });
            continue;
        }
        let Some(current) = entries.last_mut() else {
            continue;
        };
        match key {
            "Type" => {
                let kind = value.trim();
                current.is_link |= kind != "File" && kind != "Directory";
            }
            "Target" => current.is_link = true,
            _ => {}
        }
    }
    entries
}

/// Regular, non-hidden files under `dest`, in name order. Symlinks created
/// by the tool are not followed and are reported as dropped.
fn collect_files(dest: &Path, unpacked: &mut Unpacked) {
    for entry in WalkDir::new(dest)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let name = e
                    .path()
                    .and_then(|p| p.strip_prefix(dest).ok())
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                debug!("Walk error under extraction directory: {}", e);
                unpacked.drop_entry(&name, "unreadable after extraction");
                continue;
            }
        };
        let Ok(relative) = entry.path().strip_prefix(dest) else {
            continue;
        };
        let name = relative.to_string_lossy();
        if entry.file_type().is_symlink() {
            unpacked.drop_entry(&name, "link entries are not extracted");
            continue;
        }
        if !entry.file_type().is_file() || guard::is_hidden(&name) {
            continue;
        }
        unpacked.add_file(entry.path().to_path_buf());
    }
}

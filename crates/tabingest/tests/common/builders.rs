//! Builders for configurations and in-memory archive fixtures.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use tabingest::config::{Config, ParseTemplate};

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from `Config::default()`.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn root(mut self, root: &std::path::Path) -> Self {
        self.config.root_directory = Some(root.to_string_lossy().into_owned());
        self
    }

    pub fn database_name(mut self, name: &str) -> Self {
        self.config.database_name = name.to_string();
        self
    }

    /// Replaces the template list.
    pub fn templates(mut self, templates: Vec<ParseTemplate>) -> Self {
        self.config.templates = templates;
        self
    }

    pub fn mime_category(mut self, mime: &str, category: &str) -> Self {
        self.config
            .mime_categories
            .insert(mime.to_string(), category.to_string());
        self
    }

    pub fn without_mime(mut self, mime: &str) -> Self {
        self.config.mime_categories.remove(mime);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    buf.into_inner()
}

/// Tar with regular entries. Names are written raw, so traversal names
/// can be used as fixtures.
pub fn tar_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
        header.set_cksum();
        builder.append(&header, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

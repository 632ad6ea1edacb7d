use std::path::{Path, PathBuf};

use anyhow::Result;
use base64::Engine;

use crate::config::RuntimeConfig;
use crate::error::{Error, ErrorKind};
use crate::resource::blob::archive::{ArchiveBlobSource, ZipArchive};
use crate::resource::blob::glb::GlbContainer;

pub mod archive;
pub mod file;
pub mod glb;

/// Resolves the non-data URIs a document references (buffers, images, audio clips).
pub trait BlobSource: Send + Sync {
    fn read_uri(&self, uri: &str, allow_external_files: bool) -> Result<Vec<u8>>;
}

/// A source for in-memory documents; it can only reach files when given a base directory.
pub struct MemoryBlobSource {
    pub base_directory: Option<PathBuf>,
}

impl BlobSource for MemoryBlobSource {
    fn read_uri(&self, uri: &str, allow_external_files: bool) -> Result<Vec<u8>> {
        match &self.base_directory {
            Some(base_directory) => read_relative_file(base_directory, uri, allow_external_files),
            None => Err(Error::new(
                ErrorKind::MissingSource,
                format!("No base directory is available to resolve: {uri}"),
            )
            .into()),
        }
    }
}

pub fn read_relative_file(root: &Path, uri: &str, allow_external_files: bool) -> Result<Vec<u8>> {
    if !allow_external_files {
        return Err(Error::new(
            ErrorKind::MissingSource,
            format!("External files are not allowed: {uri}"),
        )
        .into());
    }

    let path = root.join(percent_decode(uri)?);
    match std::fs::read(&path) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::new(
            ErrorKind::MissingSource,
            format!("Unable to read {}: {error}", path.display()),
        )
        .into()),
    }
}

pub fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// Decodes a `data:<mime>;base64,<payload>` URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let payload = match uri.find(";base64,") {
        Some(position) if is_data_uri(uri) => &uri[position + ";base64,".len()..],
        _ => {
            return Err(Error::new(
                ErrorKind::MissingSource,
                format!(
                    "Only base64 data URIs are supported: {}",
                    uri.chars().take(48).collect::<String>()
                ),
            )
            .into())
        }
    };

    match base64::engine::general_purpose::STANDARD.decode(payload.trim()) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::new(
            ErrorKind::MissingSource,
            format!("Invalid base64 payload in data URI: {error}"),
        )
        .into()),
    }
}

/// Mime type of a data URI, e.g. `image/png` for `data:image/png;base64,...`.
pub fn data_uri_mime_type(uri: &str) -> Option<&str> {
    let header = uri.strip_prefix("data:")?;
    let end = header.find([';', ','])?;
    match &header[..end] {
        "" => None,
        mime_type => Some(mime_type),
    }
}

fn percent_decode(uri: &str) -> Result<String> {
    match percent_encoding::percent_decode_str(uri).decode_utf8() {
        Ok(decoded) => Ok(decoded.into_owned()),
        Err(error) => Err(Error::new(
            ErrorKind::MissingSource,
            format!("The uri is not valid UTF-8 once decoded: {uri} ({error})"),
        )
        .into()),
    }
}

/// Unwraps gzip and zip layers and splits the result into JSON and binary chunk.
pub fn open_document(
    bytes: Vec<u8>,
    config: &RuntimeConfig,
    fallback: Box<dyn BlobSource>,
) -> Result<(GlbContainer, Box<dyn BlobSource>)> {
    let bytes = if archive::is_gzip(&bytes) {
        archive::inflate_gzip(&bytes)?
    } else {
        bytes
    };

    if archive::is_zip(&bytes) {
        let archive = ZipArchive::from_bytes(bytes)?;
        let entry_point = archive.find_entry_point(
            config.archive_entry_point.as_deref(),
            &config.archive_additional_entry_points,
        )?;
        log::debug!("Loading glTF document from archive entry: {entry_point}");

        let mut document = archive.read(&entry_point)?;
        if archive::is_gzip(&document) {
            document = archive::inflate_gzip(&document)?;
        }
        let container = split_container(document)?;
        let source = ArchiveBlobSource::new(archive, &entry_point, Some(fallback));
        return Ok((container, Box::new(source)));
    }

    Ok((split_container(bytes)?, fallback))
}

fn split_container(bytes: Vec<u8>) -> Result<GlbContainer> {
    if glb::is_glb(&bytes) {
        return glb::parse(&bytes);
    }

    Ok(GlbContainer {
        json: bytes,
        binary_chunk: None,
    })
}

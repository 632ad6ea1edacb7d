use std::collections::BTreeMap;
use std::io::Read;

use anyhow::Result;

use crate::error::{Error, ErrorKind};
use crate::resource::blob::BlobSource;

const LOCAL_HEADER_SIGNATURE: u32 = 0x04034b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x02014b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;

const LOCAL_HEADER_LENGTH: usize = 30;
const CENTRAL_HEADER_LENGTH: usize = 46;
const END_OF_CENTRAL_DIRECTORY_LENGTH: usize = 22;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04])
}

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x1F, 0x8B, 0x08])
}

pub fn inflate_gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut inflated = Vec::new();
    if let Err(error) = decoder.read_to_end(&mut inflated) {
        return Err(Error::new(
            ErrorKind::MalformedContainer,
            format!("Unable to inflate gzip data: {error}"),
        )
        .into());
    }
    Ok(inflated)
}

#[derive(Debug, Clone)]
struct ArchiveEntry {
    compression: u16,
    compressed_size: usize,
    uncompressed_size: usize,
    local_header_offset: usize,
}

/// Read-only view over a zip archive held in memory.
#[derive(Debug)]
pub struct ZipArchive {
    data: Vec<u8>,
    entries: BTreeMap<String, ArchiveEntry>,
}

fn u16_at(bytes: &[u8], offset: usize) -> Option<u16> {
    let slice = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([slice[0], slice[1]]))
}

fn u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn malformed(message: String) -> anyhow::Error {
    Error::new(ErrorKind::MalformedContainer, message).into()
}

impl ZipArchive {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() < END_OF_CENTRAL_DIRECTORY_LENGTH {
            return Err(malformed(String::from("Archive is too short")));
        }

        let end_offset = (0..=data.len() - END_OF_CENTRAL_DIRECTORY_LENGTH)
            .rev()
            .find(|offset| u32_at(&data, *offset) == Some(END_OF_CENTRAL_DIRECTORY_SIGNATURE))
            .ok_or_else(|| malformed(String::from("Archive has no end of central directory")))?;

        let entry_count = u16_at(&data, end_offset + 10).unwrap_or_default() as usize;
        let mut offset = u32_at(&data, end_offset + 16).unwrap_or_default() as usize;

        let mut entries = BTreeMap::new();
        for _ in 0..entry_count {
            if u32_at(&data, offset) != Some(CENTRAL_HEADER_SIGNATURE)
                || offset + CENTRAL_HEADER_LENGTH > data.len()
            {
                return Err(malformed(format!(
                    "Invalid central directory header at offset {offset}"
                )));
            }

            let compression = u16_at(&data, offset + 10).unwrap_or_default();
            let compressed_size = u32_at(&data, offset + 20).unwrap_or_default() as usize;
            let uncompressed_size = u32_at(&data, offset + 24).unwrap_or_default() as usize;
            let name_length = u16_at(&data, offset + 28).unwrap_or_default() as usize;
            let extra_length = u16_at(&data, offset + 30).unwrap_or_default() as usize;
            let comment_length = u16_at(&data, offset + 32).unwrap_or_default() as usize;
            let local_header_offset = u32_at(&data, offset + 42).unwrap_or_default() as usize;

            let name_start = offset + CENTRAL_HEADER_LENGTH;
            let name = match data.get(name_start..name_start + name_length) {
                Some(name) => String::from_utf8_lossy(name).into_owned(),
                None => return Err(malformed(format!("Truncated entry name at offset {offset}"))),
            };

            entries.insert(
                name,
                ArchiveEntry {
                    compression,
                    compressed_size,
                    uncompressed_size,
                    local_header_offset,
                },
            );

            offset = name_start + name_length + extra_length + comment_length;
        }

        Ok(Self { data, entries })
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|name| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let entry = match self.entries.get(name) {
            Some(entry) => entry,
            None => {
                return Err(Error::new(
                    ErrorKind::MissingSource,
                    format!("Archive has no entry named: {name}"),
                )
                .into())
            }
        };

        let offset = entry.local_header_offset;
        if u32_at(&self.data, offset) != Some(LOCAL_HEADER_SIGNATURE) {
            return Err(malformed(format!("Invalid local header for entry: {name}")));
        }
        let name_length = u16_at(&self.data, offset + 26).unwrap_or_default() as usize;
        let extra_length = u16_at(&self.data, offset + 28).unwrap_or_default() as usize;

        let data_start = offset + LOCAL_HEADER_LENGTH + name_length + extra_length;
        let compressed = match self
            .data
            .get(data_start..data_start + entry.compressed_size)
        {
            Some(compressed) => compressed,
            None => return Err(malformed(format!("Truncated data for entry: {name}"))),
        };

        match entry.compression {
            METHOD_STORED => Ok(compressed.to_vec()),
            METHOD_DEFLATE => {
                let mut inflated = Vec::with_capacity(entry.uncompressed_size);
                let mut decoder = flate2::read::DeflateDecoder::new(compressed);
                if let Err(error) = decoder.read_to_end(&mut inflated) {
                    return Err(malformed(format!(
                        "Unable to inflate entry {name}: {error}"
                    )));
                }
                Ok(inflated)
            }
            method => Err(malformed(format!(
                "Unsupported compression method {method} for entry: {name}"
            ))),
        }
    }

    /// Picks the document inside the archive: the explicit entry point, else the first
    /// `.glb`/`.gltf` entry, else the first of the additional candidates that exists.
    pub fn find_entry_point(
        &self,
        entry_point: Option<&str>,
        additional_entry_points: &[String],
    ) -> Result<String> {
        if let Some(entry_point) = entry_point {
            if self.contains(entry_point) {
                return Ok(entry_point.to_string());
            }
            return Err(Error::new(
                ErrorKind::MissingSource,
                format!("Archive entry point not found: {entry_point}"),
            )
            .into());
        }

        let by_extension = self.entry_names().find(|name| {
            let lowercase = name.to_lowercase();
            lowercase.ends_with(".glb") || lowercase.ends_with(".gltf")
        });
        if let Some(name) = by_extension {
            return Ok(name.to_string());
        }

        match additional_entry_points
            .iter()
            .find(|candidate| self.contains(candidate))
        {
            Some(candidate) => Ok(candidate.clone()),
            None => Err(Error::new(
                ErrorKind::MissingSource,
                String::from("Archive contains no glTF document"),
            )
            .into()),
        }
    }
}

/// Resolves sibling URIs against the archive, relative to the entry point's directory first.
pub struct ArchiveBlobSource {
    archive: ZipArchive,
    entry_directory: String,
    fallback: Option<Box<dyn BlobSource>>,
}

impl ArchiveBlobSource {
    pub fn new(
        archive: ZipArchive,
        entry_point: &str,
        fallback: Option<Box<dyn BlobSource>>,
    ) -> Self {
        let entry_directory = match entry_point.rfind('/') {
            Some(separator) => entry_point[..=separator].to_string(),
            None => String::new(),
        };

        Self {
            archive,
            entry_directory,
            fallback,
        }
    }
}

impl BlobSource for ArchiveBlobSource {
    fn read_uri(&self, uri: &str, allow_external_files: bool) -> Result<Vec<u8>> {
        let relative = format!("{}{uri}", self.entry_directory);
        if self.archive.contains(&relative) {
            return self.archive.read(&relative);
        }
        if self.archive.contains(uri) {
            return self.archive.read(uri);
        }

        match &self.fallback {
            Some(fallback) => fallback.read_uri(uri, allow_external_files),
            None => Err(Error::new(
                ErrorKind::MissingSource,
                format!("Unable to find {uri} in the archive"),
            )
            .into()),
        }
    }
}

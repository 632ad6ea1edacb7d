use std::borrow::Cow;

use anyhow::Result;
use gltf::binary::{Glb, Header};

use crate::error::{Error, ErrorKind};

const GLB_MAGIC: [u8; 4] = *b"glTF";
const HEADER_LENGTH: usize = 12;

/// The two payloads of a binary glTF container.
#[derive(Debug, Clone, PartialEq)]
pub struct GlbContainer {
    pub json: Vec<u8>,
    pub binary_chunk: Option<Vec<u8>>,
}

pub fn is_glb(bytes: &[u8]) -> bool {
    bytes.starts_with(&GLB_MAGIC)
}

fn malformed(message: String) -> anyhow::Error {
    Error::new(ErrorKind::MalformedContainer, message).into()
}

pub fn parse(bytes: &[u8]) -> Result<GlbContainer> {
    if bytes.len() < HEADER_LENGTH {
        return Err(malformed(format!(
            "Binary container is too short for its header: {} bytes",
            bytes.len()
        )));
    }

    let declared = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    if declared < HEADER_LENGTH || declared > bytes.len() {
        return Err(malformed(format!(
            "Binary container declares {declared} bytes but {} are available",
            bytes.len()
        )));
    }

    let glb = match Glb::from_slice(&bytes[..declared]) {
        Ok(glb) => glb,
        Err(error) => return Err(malformed(format!("Invalid binary container: {error}"))),
    };

    log::debug!(
        "Parsed binary container: {} JSON bytes, {} BIN bytes",
        glb.json.len(),
        glb.bin.as_ref().map_or(0, |bin| bin.len())
    );

    Ok(GlbContainer {
        json: glb.json.into_owned(),
        binary_chunk: glb.bin.map(Cow::into_owned),
    })
}

/// Assembles a binary container, padding JSON with spaces and BIN with zeros.
pub fn write(json: &[u8], binary_chunk: Option<&[u8]>) -> Result<Vec<u8>> {
    let glb = Glb {
        header: Header {
            magic: GLB_MAGIC,
            version: 2,
            // recomputed by the writer
            length: 0,
        },
        json: Cow::Borrowed(json),
        bin: binary_chunk.map(Cow::Borrowed),
    };

    let mut bytes = Vec::new();
    match glb.to_writer(&mut bytes) {
        Ok(()) => Ok(bytes),
        Err(error) => Err(malformed(format!("Unable to write binary container: {error}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;

    #[test]
    fn round_trips_json_and_binary() {
        let bytes = write(br#"{"asset":{"version":"2.0"}}"#, Some(&[1, 2, 3])).unwrap();
        assert!(is_glb(&bytes));
        assert_eq!(bytes.len() % 4, 0);

        let container = parse(&bytes).unwrap();
        assert!(container.json.starts_with(br#"{"asset""#));
        assert_eq!(container.binary_chunk, Some(vec![1, 2, 3, 0]));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = write(b"{}", None).unwrap();
        bytes[0] = b'x';

        let error = parse(&bytes).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::MalformedContainer));
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = write(b"{}", None).unwrap();
        bytes[4] = 1;

        let error = parse(&bytes).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::MalformedContainer));
    }

    #[test]
    fn rejects_truncated_container() {
        let bytes = write(b"{}", Some(&[0; 8])).unwrap();

        let error = parse(&bytes[..bytes.len() - 4]).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::MalformedContainer));
    }

    #[test]
    fn rejects_declared_length_below_header() {
        let mut bytes = write(b"{}", None).unwrap();
        bytes[8..12].copy_from_slice(&4u32.to_le_bytes());

        let error = parse(&bytes).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::MalformedContainer));
    }

    #[test]
    fn rejects_missing_json() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&GLB_MAGIC);
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&12u32.to_le_bytes());

        let error = parse(&bytes).unwrap_err();
        assert_eq!(kind_of(&error), Some(ErrorKind::MalformedContainer));
    }
}

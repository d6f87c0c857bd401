//! File header: file type, API version and binary version.

use crate::error::{Advisory, GraphError, Result};
use crate::schema::Schema;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::warn;
use std::io::{Read, Write};

/// Upper bound on a header string; anything longer is treated as corrupt.
const MAX_FIELD_LEN: u32 = 4096;

/// Identification block written at the start of every graph file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Language model name, e.g. `JavaScriptLanguage`
    pub file_type: String,
    /// Version of the node and edge catalogue
    pub api_version: String,
    /// Version of the record layout
    pub binary_version: String,
}

impl Header {
    /// Header describing files written with `schema`.
    pub fn for_schema(schema: &Schema) -> Self {
        Self {
            file_type: schema.file_type().to_string(),
            api_version: schema.api_version().to_string(),
            binary_version: schema.binary_version().to_string(),
        }
    }

    /// Write the three fields as length-prefixed strings.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Io`] if the writer fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for field in [&self.file_type, &self.api_version, &self.binary_version] {
            write_string(writer, field)?;
        }
        Ok(())
    }

    /// Read a header written by [`write_to`](Self::write_to).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::TruncatedStream`] if the input ends early and
    /// [`GraphError::Corrupt`] for an oversized or non-UTF-8 field.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            file_type: read_string(reader)?,
            api_version: read_string(reader)?,
            binary_version: read_string(reader)?,
        })
    }

    /// Compare against the header `schema` would write.
    ///
    /// A differing file type or API version is fatal. A differing binary
    /// version alone is reported as an advisory and loading continues.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::VersionMismatch`] naming the first field that
    /// differs.
    pub fn check(&self, schema: &Schema) -> Result<Option<Advisory>> {
        let expected = Self::for_schema(schema);
        let mismatch = |field: &str, expected: &str, found: &str| GraphError::VersionMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        };
        if self.file_type != expected.file_type {
            return Err(mismatch("file type", &expected.file_type, &self.file_type));
        }
        if self.api_version != expected.api_version {
            return Err(mismatch("API version", &expected.api_version, &self.api_version));
        }
        if self.binary_version != expected.binary_version {
            let advisory = Advisory::BinaryVersionDiffers {
                expected: expected.binary_version,
                found: self.binary_version.clone(),
            };
            warn!("{advisory}");
            return Ok(Some(advisory));
        }
        Ok(None)
    }
}

fn write_string<W: Write>(writer: &mut W, text: &str) -> Result<()> {
    let io = |e: std::io::Error| GraphError::io("writing header", e);
    writer
        .write_u32::<LittleEndian>(text.len() as u32)
        .map_err(io)?;
    writer.write_all(text.as_bytes()).map_err(io)
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let io = |e: std::io::Error| GraphError::io("header", e);
    let len = reader.read_u32::<LittleEndian>().map_err(io)?;
    if len > MAX_FIELD_LEN {
        return Err(GraphError::corrupt(format!("header field of {len} bytes")));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).map_err(io)?;
    String::from_utf8(bytes).map_err(|_| GraphError::corrupt("header field is not UTF-8"))
}

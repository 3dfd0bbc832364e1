//! Media types accepted by `to_byte_array` and `from_data`.

use crate::error::{Result, RuntimeError};
use std::fmt;
use std::str::FromStr;

const GZIP_SUFFIX: &str = "+gzip";

/// Base encoding of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// The instance's JSON form.
    Json,
    /// Avro binary keyed to the embedded schema.
    AvroBinary,
}

impl Encoding {
    pub fn media_type(&self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::AvroBinary => "avro/binary",
        }
    }
}

/// A parsed content type: a base encoding, optionally gzip-compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentType {
    pub encoding: Encoding,
    pub gzip: bool,
}

impl ContentType {
    pub const JSON: ContentType = ContentType {
        encoding: Encoding::Json,
        gzip: false,
    };
    pub const AVRO_BINARY: ContentType = ContentType {
        encoding: Encoding::AvroBinary,
        gzip: false,
    };

    /// Every content type, uncompressed first.
    pub const ALL: [ContentType; 4] = [
        ContentType::JSON,
        ContentType::AVRO_BINARY,
        ContentType::JSON.gzipped(),
        ContentType::AVRO_BINARY.gzipped(),
    ];

    pub const fn gzipped(self) -> Self {
        ContentType {
            encoding: self.encoding,
            gzip: true,
        }
    }

    /// Parse a media type string. Parameters after `;` are ignored and
    /// matching is case-insensitive.
    pub fn parse(content_type: &str) -> Result<Self> {
        let base = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        let (base, gzip) = match base.strip_suffix(GZIP_SUFFIX) {
            Some(inner) => (inner, true),
            None => (base.as_str(), false),
        };
        let encoding = match base {
            "application/json" => Encoding::Json,
            "avro/binary" | "application/avro" | "application/vnd.apache.avro+avro" => Encoding::AvroBinary,
            _ => return Err(RuntimeError::UnsupportedMediaType(content_type.to_string())),
        };
        Ok(ContentType { encoding, gzip })
    }
}

impl FromStr for ContentType {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        ContentType::parse(s)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoding.media_type())?;
        if self.gzip {
            f.write_str(GZIP_SUFFIX)?;
        }
        Ok(())
    }
}

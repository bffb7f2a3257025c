// Encoding-resilient CSV loading

use crate::data::{Table, Value};
use crate::error::{ConfigError, EncodingAttempt, LoadError};
use encoding_rs::{Encoding, EUC_KR, UTF_8};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

/// Text encodings the loader knows how to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodingCandidate {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "euc-kr")]
    EucKr,
    #[serde(rename = "cp949")]
    Cp949,
}

/// Default fallback order.
pub const DEFAULT_ENCODINGS: [EncodingCandidate; 3] = [
    EncodingCandidate::Utf8,
    EncodingCandidate::EucKr,
    EncodingCandidate::Cp949,
];

impl EncodingCandidate {
    pub fn label(&self) -> &'static str {
        match self {
            EncodingCandidate::Utf8 => "UTF-8",
            EncodingCandidate::EucKr => "EUC-KR",
            EncodingCandidate::Cp949 => "CP949",
        }
    }

    fn encoding(&self) -> &'static Encoding {
        match self {
            EncodingCandidate::Utf8 => UTF_8,
            // encoding_rs implements the WHATWG "EUC-KR", which is the CP949 superset.
            // Plain EUC-KR is narrowed by `is_ks_x_1001` before decoding.
            EncodingCandidate::EucKr | EncodingCandidate::Cp949 => EUC_KR,
        }
    }

    /// Decode strictly; `None` when the bytes are malformed for this encoding.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        let bytes = match self {
            EncodingCandidate::Utf8 => bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes),
            EncodingCandidate::EucKr => {
                if !is_ks_x_1001(bytes) {
                    return None;
                }
                bytes
            }
            EncodingCandidate::Cp949 => bytes,
        };
        self.encoding()
            .decode_without_bom_handling_and_without_replacement(bytes)
    }
}

impl fmt::Display for EncodingCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EncodingCandidate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(EncodingCandidate::Utf8),
            "euc-kr" | "euckr" => Ok(EncodingCandidate::EucKr),
            "cp949" | "windows-949" | "uhc" => Ok(EncodingCandidate::Cp949),
            _ => Err(ConfigError::UnknownEncoding(s.to_string())),
        }
    }
}

/// True when every non-ASCII byte pair lies in the KS X 1001 (EUC-KR proper)
/// range. CP949's extended Hangul uses lead or trail bytes below 0xA1.
fn is_ks_x_1001(bytes: &[u8]) -> bool {
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < 0x80 {
            i += 1;
            continue;
        }
        let Some(&trail) = bytes.get(i + 1) else {
            return false;
        };
        if !(0xA1..=0xFE).contains(&b) || !(0xA1..=0xFE).contains(&trail) {
            return false;
        }
        i += 2;
    }
    true
}

/// Where table bytes come from.
#[derive(Debug, Clone)]
pub enum Source {
    Path(PathBuf),
    /// In-memory content such as an upload; `name` is for messages only.
    Bytes { name: String, bytes: Vec<u8> },
}

impl Source {
    pub fn name(&self) -> String {
        match self {
            Source::Path(p) => p.display().to_string(),
            Source::Bytes { name, .. } => name.clone(),
        }
    }

    /// Read the raw bytes without decoding.
    pub fn read_bytes(&self) -> Result<Cow<'_, [u8]>, LoadError> {
        match self {
            Source::Path(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|source| LoadError::Unreachable {
                    path: path.clone(),
                    source,
                }),
            Source::Bytes { bytes, .. } => Ok(Cow::Borrowed(bytes.as_slice())),
        }
    }
}

/// Read everything from stdin as an in-memory source.
pub fn read_stdin_source() -> Result<Source, LoadError> {
    let mut bytes = Vec::new();
    std::io::stdin()
        .read_to_end(&mut bytes)
        .map_err(|source| LoadError::Unreachable {
            path: PathBuf::from("<stdin>"),
            source,
        })?;
    Ok(Source::Bytes {
        name: "<stdin>".to_string(),
        bytes,
    })
}

/// A decoded table plus the encoding that worked.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTable {
    pub table: Table,
    pub encoding: EncodingCandidate,
}

/// Load a source with the default encoding order.
pub fn load(source: &Source) -> Result<LoadedTable, LoadError> {
    load_with(source, &DEFAULT_ENCODINGS)
}

/// Load a source, trying `encodings` strictly in order.
pub fn load_with(
    source: &Source,
    encodings: &[EncodingCandidate],
) -> Result<LoadedTable, LoadError> {
    let bytes = source.read_bytes()?;
    load_bytes(&source.name(), &bytes, encodings)
}

/// Decode and parse raw bytes. The first candidate that both decodes and
/// parses as CSV wins.
pub fn load_bytes(
    name: &str,
    bytes: &[u8],
    encodings: &[EncodingCandidate],
) -> Result<LoadedTable, LoadError> {
    let mut attempts = Vec::with_capacity(encodings.len());

    for &candidate in encodings {
        let Some(text) = candidate.decode(bytes) else {
            debug!(source = name, encoding = candidate.label(), "decode failed");
            attempts.push(EncodingAttempt {
                encoding: candidate.label().to_string(),
                reason: "malformed byte sequence".to_string(),
            });
            continue;
        };

        match parse_csv(&text) {
            Ok(table) => {
                info!(
                    source = name,
                    encoding = candidate.label(),
                    rows = table.row_count(),
                    columns = table.column_count(),
                    "loaded table"
                );
                return Ok(LoadedTable {
                    table,
                    encoding: candidate,
                });
            }
            Err(e) => {
                debug!(source = name, encoding = candidate.label(), error = %e, "csv parse failed");
                attempts.push(EncodingAttempt {
                    encoding: candidate.label().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Err(LoadError::AllEncodingsFailed {
        name: name.to_string(),
        attempts,
    })
}

/// Parse decoded CSV text. Blank input gives an empty table with no columns.
pub fn parse_csv(text: &str) -> Result<Table, csv::Error> {
    if text.trim().is_empty() {
        return Ok(Table::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Value::parse).collect());
    }

    Ok(Table::new(headers, rows))
}

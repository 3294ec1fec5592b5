//! Part 21 record lexer.
//!
//! Splits a STEP file into `;`-terminated records and buckets them by
//! keyword. Only the handful of entity types needed for assembly structure
//! are kept; everything else is discarded. Handles:
//! - `/* ... */` comments between and inside records
//! - quoted strings (with `''` escapes) containing `;`
//! - line breaks inside a record (removed)
//! - stray non-UTF-8 bytes (replaced with U+FFFD, with a warning)

use std::borrow::Cow;

use serde::Serialize;
use tracing::{trace, warn};

use crate::error::StepTreeError;

/// Keywords of the records the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// `FILE_NAME` header record.
    FileName,
    /// `FILE_SCHEMA` header record.
    FileSchema,
    /// `FILE_DESCRIPTION` header record.
    FileDescription,
    /// `PRODUCT` data record.
    Product,
    /// `PRODUCT_DEFINITION` data record.
    ProductDefinition,
    /// `PRODUCT_DEFINITION_FORMATION` (or its `_WITH_SPECIFIED_SOURCE` subtype).
    ProductDefinitionFormation,
    /// `NEXT_ASSEMBLY_USAGE_OCCURRENCE` data record.
    NextAssemblyUsageOccurrence,
}

impl RecordKind {
    /// Map an exact keyword to a record kind.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "FILE_NAME" => Some(Self::FileName),
            "FILE_SCHEMA" => Some(Self::FileSchema),
            "FILE_DESCRIPTION" => Some(Self::FileDescription),
            "PRODUCT" => Some(Self::Product),
            "PRODUCT_DEFINITION" => Some(Self::ProductDefinition),
            "PRODUCT_DEFINITION_FORMATION"
            | "PRODUCT_DEFINITION_FORMATION_WITH_SPECIFIED_SOURCE" => {
                Some(Self::ProductDefinitionFormation)
            }
            "NEXT_ASSEMBLY_USAGE_OCCURRENCE" => Some(Self::NextAssemblyUsageOccurrence),
            _ => None,
        }
    }
}

/// One record of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Record text without the terminating `;` and without line breaks.
    pub text: String,
    /// Detected keyword (empty for records without one, e.g. complex instances).
    pub keyword: String,
}

impl RawRecord {
    /// Create a record from its text, detecting the keyword.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let keyword = detect_keyword(&text).to_string();
        Self { text, keyword }
    }
}

/// Header section contents, kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepHeader {
    /// `FILE_DESCRIPTION(...)` record text.
    pub file_description: String,
    /// `FILE_NAME(...)` record text.
    pub file_name: String,
    /// `FILE_SCHEMA(...)` record text.
    pub file_schema: String,
}

/// Records bucketed by kind, each bucket in file order.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedRecords {
    /// Header tags.
    pub header: StepHeader,
    /// `PRODUCT` records.
    pub products: Vec<RawRecord>,
    /// `PRODUCT_DEFINITION` records.
    pub product_definitions: Vec<RawRecord>,
    /// `PRODUCT_DEFINITION_FORMATION` records.
    pub formations: Vec<RawRecord>,
    /// `NEXT_ASSEMBLY_USAGE_OCCURRENCE` records.
    pub relations: Vec<RawRecord>,
    /// Number of records discarded as irrelevant.
    pub discarded: usize,
}

impl ClassifiedRecords {
    /// Split `input` into records and bucket them.
    pub fn classify(input: &[u8]) -> Result<Self, StepTreeError> {
        let text = decode_text(input)?;
        let mut classified = Self::default();

        for record in RecordLexer::new(&text) {
            let Some(kind) = RecordKind::from_keyword(&record.keyword) else {
                classified.discarded += 1;
                continue;
            };
            trace!(keyword = %record.keyword, "classified record");
            match kind {
                RecordKind::FileName => classified.header.file_name = record.text,
                RecordKind::FileSchema => classified.header.file_schema = record.text,
                RecordKind::FileDescription => {
                    classified.header.file_description = record.text
                }
                RecordKind::Product => classified.products.push(record),
                RecordKind::ProductDefinition => classified.product_definitions.push(record),
                RecordKind::ProductDefinitionFormation => classified.formations.push(record),
                RecordKind::NextAssemblyUsageOccurrence => classified.relations.push(record),
            }
        }

        Ok(classified)
    }
}

/// Interpret the raw bytes as text. A leading UTF-8 BOM is ignored.
///
/// Invalid UTF-8 sequences (typically Latin-1 text in a comment or string)
/// are replaced rather than rejected. NUL bytes mean the input is binary or
/// UTF-16, which cannot be a Part 21 file.
fn decode_text(input: &[u8]) -> Result<Cow<'_, str>, StepTreeError> {
    let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
    if let Some(pos) = input.iter().position(|&b| b == 0) {
        return Err(StepTreeError::decode(format!(
            "input contains a NUL byte at offset {pos}; not a text file"
        )));
    }
    let text = String::from_utf8_lossy(input);
    if let Cow::Owned(_) = text {
        warn!("input is not valid UTF-8; invalid bytes replaced with U+FFFD");
    }
    Ok(text)
}

/// Keyword of a record: the identifier after `=` for data records, the
/// leading identifier otherwise.
fn detect_keyword(text: &str) -> &str {
    let trimmed = text.trim_start();
    let rest = if trimmed.starts_with('#') {
        match trimmed.find('=') {
            Some(eq) => trimmed[eq + 1..].trim_start(),
            None => return "",
        }
    } else {
        trimmed
    };
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Iterator over the `;`-terminated records of a STEP file.
pub struct RecordLexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> RecordLexer<'a> {
    /// Create a new lexer for the given text.
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn at_comment_start(&self) -> bool {
        self.input.as_bytes()[self.pos..].starts_with(b"/*")
    }

    fn skip_comment(&mut self) {
        match self.input[self.pos + 2..].find("*/") {
            Some(end) => self.pos += 2 + end + 2,
            // Unterminated comment swallows the rest of the file
            None => self.pos = self.input.len(),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some(ch) = self.peek_byte() {
                if ch.is_ascii_whitespace() {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if self.pos < self.input.len() && self.at_comment_start() {
                self.skip_comment();
                continue;
            }
            break;
        }
    }

    /// Read one record; returns `None` at end of input.
    fn read_record(&mut self) -> Option<String> {
        self.skip_whitespace_and_comments();
        if self.pos >= self.input.len() {
            return None;
        }

        let mut text = String::new();
        let mut chunk_start = self.pos;
        let mut in_string = false;

        while let Some(ch) = self.peek_byte() {
            if in_string {
                self.pos += 1;
                if ch == b'\'' {
                    // '' is an escaped quote and keeps the string open
                    if self.peek_byte() == Some(b'\'') {
                        self.pos += 1;
                    } else {
                        in_string = false;
                    }
                }
                continue;
            }
            match ch {
                b'\'' => {
                    in_string = true;
                    self.pos += 1;
                }
                b';' => {
                    text.push_str(&self.input[chunk_start..self.pos]);
                    self.pos += 1;
                    return Some(strip_linebreaks(&text));
                }
                b'/' if self.at_comment_start() => {
                    text.push_str(&self.input[chunk_start..self.pos]);
                    self.skip_comment();
                    chunk_start = self.pos;
                }
                _ => self.pos += 1,
            }
        }

        // Trailing text without a terminator still counts as a record
        text.push_str(&self.input[chunk_start..self.pos]);
        let text = strip_linebreaks(&text);
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl Iterator for RecordLexer<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        self.read_record().map(RawRecord::new)
    }
}

/// Remove the line breaks STEP writers insert inside long records.
pub fn strip_linebreaks(text: &str) -> String {
    text.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

//! Attribute decoder for single records.
//!
//! Decodes `#<id>=KEYWORD(attr1,attr2,...)` into an ID and a flat list of
//! attribute strings. The attribute list is split on every `,` inside the
//! outermost parentheses: nested lists and commas embedded in quoted strings
//! are not handled, so such attributes come back in pieces.

use crate::error::StepTreeError;
use crate::lexer::RawRecord;

/// `\X\<hex>` escapes and their ASCII transliterations.
const SPECIAL_CHARS: [(&str, &str); 6] = [
    ("\\X\\C4", "Ae"),
    ("\\X\\E4", "ae"),
    ("\\X\\D6", "Oe"),
    ("\\X\\F6", "oe"),
    ("\\X\\DC", "Ue"),
    ("\\X\\FC", "ue"),
];

/// A record split into its ID and raw attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    /// Entity ID without the leading `#`.
    pub id: String,
    /// Record keyword.
    pub keyword: String,
    /// Attributes in order, whitespace-trimmed, still quoted.
    pub attributes: Vec<String>,
}

impl DecodedRecord {
    /// Decode a raw record. Never fails; attribute access is validated instead.
    pub fn decode(record: &RawRecord) -> Self {
        Self {
            id: decode_id(&record.text),
            keyword: record.keyword.clone(),
            attributes: decode_attributes(&record.text),
        }
    }

    /// Get the raw attribute at `idx`.
    pub fn attribute(&self, idx: usize) -> Result<&str, StepTreeError> {
        self.attributes
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| StepTreeError::malformed(&self.id, idx, self.attributes.len()))
    }

    /// Get the string attribute at `idx`, unquoted and with escapes fixed.
    pub fn string(&self, idx: usize) -> Result<String, StepTreeError> {
        let raw = self.attribute(idx)?;
        Ok(fix_special_chars(&unquote(raw)))
    }

    /// Get the entity reference at `idx` without its `#` marker.
    pub fn entity_ref(&self, idx: usize) -> Result<String, StepTreeError> {
        let raw = self.attribute(idx)?;
        Ok(strip_ref_marker(raw).to_string())
    }
}

fn decode_id(text: &str) -> String {
    let head = match text.find('=') {
        Some(eq) => &text[..eq],
        None => "",
    };
    strip_ref_marker(head.trim()).to_string()
}

/// Split the contents of the outermost parentheses on `,`.
fn decode_attributes(text: &str) -> Vec<String> {
    let Some(open) = text.find('(') else {
        return Vec::new();
    };
    let body_start = open + 1;
    let mut depth = 1usize;
    let mut body_end = text.len();
    for (i, ch) in text[body_start..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    body_end = body_start + i;
                    break;
                }
            }
            _ => {}
        }
    }

    let body = &text[body_start..body_end];
    if body.trim().is_empty() {
        return Vec::new();
    }
    body.split(',').map(|attr| attr.trim().to_string()).collect()
}

/// Remove the `#` in front of an entity reference.
pub fn strip_ref_marker(value: &str) -> &str {
    let value = value.trim();
    value.strip_prefix('#').unwrap_or(value)
}

/// Strip the surrounding quotes of a string attribute and collapse `''`.
pub fn unquote(value: &str) -> String {
    let value = value.trim();
    match value
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        Some(inner) => inner.replace("''", "'"),
        None => value.to_string(),
    }
}

/// Replace `\X\<hex>` umlaut escapes with their ASCII transliteration.
pub fn fix_special_chars(value: &str) -> String {
    if !value.contains("\\X\\") {
        return value.to_string();
    }
    SPECIAL_CHARS
        .iter()
        .fold(value.to_string(), |acc, (code, replacement)| {
            acc.replace(code, replacement)
        })
}

//! Product `SourceXml` parser.
//!
//! The Product service describes its selectable inputs as a small XML
//! document:
//!
//! ```xml
//! <SourceList>
//!   <Source>
//!     <Name>Playlist</Name>
//!     <Type>Playlist</Type>
//!     <Visible>true</Visible>
//!   </Source>
//! </SourceList>
//! ```
//!
//! Device order is significant and is preserved.

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};
use crate::xml_decode::{self, parse_bool};

/// One decoded `<Source>` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    pub name: String,
    pub source_type: String,
    pub visible: bool,
}

impl SourceRecord {
    pub fn new(name: impl Into<String>, source_type: impl Into<String>, visible: bool) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            visible,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename = "SourceList")]
struct SourceListXml {
    #[serde(rename = "Source", default)]
    sources: Vec<SourceXml>,
}

#[derive(Debug, Deserialize)]
struct SourceXml {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Type", default)]
    source_type: String,
    #[serde(rename = "Visible", default)]
    visible: Option<String>,
}

/// Decode a `SourceXml` document into its ordered list of sources.
///
/// A single bad `<Visible>` value rejects the whole document; callers keep
/// their previous list in that case.
pub fn parse_source_list(xml: &str) -> ParseResult<Vec<SourceRecord>> {
    let doc: SourceListXml = xml_decode::parse(xml)?;

    doc.sources
        .into_iter()
        .map(|s| {
            let visible = s
                .visible
                .ok_or_else(|| ParseError::MissingRequiredElement("Visible".to_string()))?;
            Ok(SourceRecord {
                visible: parse_bool("Visible", &visible)?,
                name: s.name,
                source_type: s.source_type,
            })
        })
        .collect()
}

//! # ohtopology-parser
//!
//! Decoding of the payloads an OpenHome `Product` service reports through its
//! evented state variables. Only the semantic level is handled here: the
//! transport layer hands over already-unescaped strings.
//!
//! ## Usage
//!
//! ```rust
//! use ohtopology_parser::{parse_source_list, ProductAttributes};
//!
//! let xml = "<SourceList><Source><Name>Radio</Name><Type>Radio</Type>\
//!            <Visible>true</Visible></Source></SourceList>";
//! let sources = parse_source_list(xml).unwrap();
//! assert_eq!(sources[0].name, "Radio");
//!
//! let attributes = ProductAttributes::parse("Info Time Volume");
//! assert!(attributes.has_volume_control());
//! ```

pub mod attributes;
pub mod error;
pub mod source_list;
pub mod xml_decode;

pub use attributes::ProductAttributes;
pub use error::{ParseError, ParseResult};
pub use source_list::{parse_source_list, SourceRecord};
pub use xml_decode::parse_bool;

//! Reading and writing `osmChange` XML.

mod compression;
mod read;
mod write;

use std::io;

use osctrim_core::ElementError;
use thiserror::Error;

pub use compression::{CompressedWriter, Compression};
pub use read::read_change_document;
pub use write::write_change_document;

const TAG_ROOT: &str = "osmChange";
const TAG_TAG: &str = "tag";
const TAG_ND: &str = "nd";
const TAG_MEMBER: &str = "member";
const ATTR_ID: &str = "id";
const ATTR_KEY: &str = "k";
const ATTR_VALUE: &str = "v";
const ATTR_REF: &str = "ref";
const ATTR_TYPE: &str = "type";
const ATTR_ROLE: &str = "role";

/// Errors raised while parsing an `osmChange` document.
#[derive(Debug, Error)]
pub enum OscReadError {
    /// The input was not well-formed XML, or could not be read.
    #[error("malformed XML near byte {position}")]
    Xml {
        /// Byte offset reported by the parser.
        position: u64,
        /// Parser error.
        #[source]
        source: quick_xml::Error,
    },
    /// An attribute on `element` could not be decoded.
    #[error("malformed attribute on <{element}>")]
    Attribute {
        /// Name of the element carrying the attribute.
        element: String,
        /// Parser error.
        #[source]
        source: quick_xml::Error,
    },
    /// The input held no `osmChange` root element.
    #[error("input has no <osmChange> root element")]
    MissingRoot,
    /// The input ended before the root element was closed.
    #[error("input ended before </osmChange>")]
    Truncated,
    /// An element appeared where the change format does not allow it.
    #[error("unexpected <{name}> inside {parent}")]
    UnexpectedElement {
        /// Name of the offending element.
        name: String,
        /// Description of where it appeared.
        parent: &'static str,
    },
    /// A required attribute of a child element was missing.
    #[error("<{element}> is missing the `{attribute}` attribute")]
    MissingAttribute {
        /// Child element name.
        element: &'static str,
        /// Missing attribute name.
        attribute: &'static str,
    },
    /// A `ref` attribute was not an integer.
    #[error("<{element}> has a non-integer ref {value:?}")]
    InvalidReference {
        /// Child element name.
        element: &'static str,
        /// Raw attribute value.
        value: String,
    },
    /// A node, way or relation could not be assembled.
    #[error(transparent)]
    Element(#[from] ElementError),
}

/// Errors raised while serialising an `osmChange` document.
#[derive(Debug, Error)]
pub enum OscWriteError {
    /// The destination rejected a write.
    #[error("failed to write change document")]
    Io(#[from] io::Error),
}

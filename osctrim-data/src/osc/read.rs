//! Streaming `osmChange` reader built on `quick-xml`.

use std::io::BufRead;
use std::str::FromStr;

use log::debug;
use osctrim_core::{
    Action, Attributes, ChangeDocument, Element, ElementKind, Member, Node, Operation, Relation,
    Tag, Way,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{
    ATTR_KEY, ATTR_REF, ATTR_ROLE, ATTR_TYPE, ATTR_VALUE, OscReadError, TAG_MEMBER, TAG_ND,
    TAG_ROOT, TAG_TAG,
};

/// Parse an `osmChange` document from `input`.
///
/// The whole document is held in memory. Text content and comments are
/// ignored; element children other than `tag`, `nd` and `member` are
/// rejected.
///
/// # Errors
/// Returns an [`OscReadError`] for malformed XML, an unexpected document
/// structure, or an element whose attributes cannot be interpreted.
///
/// # Examples
/// ```
/// use osctrim_data::read_change_document;
///
/// let xml = r#"<osmChange version="0.6">
///   <create><node id="1" lat="0.5" lon="0.5"/></create>
/// </osmChange>"#;
/// let document = read_change_document(xml.as_bytes()).expect("valid change");
/// assert_eq!(document.elements().count(), 1);
/// ```
pub fn read_change_document<R: BufRead>(input: R) -> Result<ChangeDocument, OscReadError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);
    let mut builder = DocumentBuilder::default();
    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| OscReadError::Xml {
                position: reader.error_position(),
                source,
            })?;
        match event {
            Event::Start(start) => builder.open(&start)?,
            Event::Empty(start) => {
                builder.open(&start)?;
                builder.close()?;
            }
            Event::End(_) => builder.close()?,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    builder.finish()
}

/// Element whose children are still being read.
#[derive(Debug)]
struct PendingElement {
    kind: ElementKind,
    attributes: Attributes,
    tags: Vec<Tag>,
    node_refs: Vec<i64>,
    members: Vec<Member>,
}

impl PendingElement {
    const fn new(kind: ElementKind, attributes: Attributes) -> Self {
        Self {
            kind,
            attributes,
            tags: Vec::new(),
            node_refs: Vec::new(),
            members: Vec::new(),
        }
    }

    fn add_child(&mut self, start: &BytesStart<'_>) -> Result<(), OscReadError> {
        let name = element_name(start);
        let attributes = read_attributes(start, &name)?;
        match (self.kind, name.as_str()) {
            (_, TAG_TAG) => {
                let key = required(&attributes, TAG_TAG, ATTR_KEY)?;
                let value = required(&attributes, TAG_TAG, ATTR_VALUE)?;
                self.tags.push(Tag::new(key, value));
            }
            (ElementKind::Way, TAG_ND) => {
                let raw = required(&attributes, TAG_ND, ATTR_REF)?;
                self.node_refs.push(parse_ref(TAG_ND, raw)?);
            }
            (ElementKind::Relation, TAG_MEMBER) => {
                let kind = ElementKind::from_str(required(&attributes, TAG_MEMBER, ATTR_TYPE)?)?;
                let id = parse_ref(TAG_MEMBER, required(&attributes, TAG_MEMBER, ATTR_REF)?)?;
                let role = lookup(&attributes, ATTR_ROLE).unwrap_or_default();
                self.members.push(Member::new(kind, id, role));
            }
            _ => {
                return Err(OscReadError::UnexpectedElement {
                    name,
                    parent: self.kind.as_str(),
                });
            }
        }
        Ok(())
    }

    fn build(self) -> Result<Element, OscReadError> {
        let element = match self.kind {
            ElementKind::Node => Node::from_attributes(self.attributes, self.tags)?.into(),
            ElementKind::Way => {
                Way::from_attributes(self.attributes, self.node_refs, self.tags)?.into()
            }
            ElementKind::Relation => {
                Relation::from_attributes(self.attributes, self.members, self.tags)?.into()
            }
        };
        Ok(element)
    }
}

/// One open XML element, innermost last.
#[derive(Debug)]
enum Frame {
    Root,
    Operation(Operation),
    Element(PendingElement),
    Child,
}

#[derive(Debug, Default)]
struct DocumentBuilder {
    document: Option<ChangeDocument>,
    closed: bool,
    stack: Vec<Frame>,
}

impl DocumentBuilder {
    fn open(&mut self, start: &BytesStart<'_>) -> Result<(), OscReadError> {
        let name = element_name(start);
        let frame = match self.stack.last_mut() {
            None if self.document.is_none() && name == TAG_ROOT => {
                let attributes = read_attributes(start, &name)?;
                self.document = Some(ChangeDocument::with_attributes(attributes));
                Frame::Root
            }
            None => {
                return Err(OscReadError::UnexpectedElement {
                    name,
                    parent: "document",
                });
            }
            Some(Frame::Root) => match Action::from_str(&name) {
                Ok(action) => Frame::Operation(Operation::new(action)),
                Err(_) => {
                    return Err(OscReadError::UnexpectedElement {
                        name,
                        parent: TAG_ROOT,
                    });
                }
            },
            Some(Frame::Operation(operation)) => match ElementKind::from_str(&name) {
                Ok(kind) => {
                    Frame::Element(PendingElement::new(kind, read_attributes(start, &name)?))
                }
                Err(_) => {
                    return Err(OscReadError::UnexpectedElement {
                        name,
                        parent: operation.action().as_str(),
                    });
                }
            },
            Some(Frame::Element(pending)) => {
                pending.add_child(start)?;
                Frame::Child
            }
            Some(Frame::Child) => {
                return Err(OscReadError::UnexpectedElement {
                    name,
                    parent: "element child",
                });
            }
        };
        self.stack.push(frame);
        Ok(())
    }

    fn close(&mut self) -> Result<(), OscReadError> {
        match self.stack.pop() {
            Some(Frame::Root) => self.closed = true,
            Some(Frame::Operation(operation)) => {
                if let Some(document) = self.document.as_mut() {
                    document.push_operation(operation);
                }
            }
            Some(Frame::Element(pending)) => {
                let element = pending.build()?;
                if let Some(Frame::Operation(operation)) = self.stack.last_mut() {
                    operation.push(element);
                }
            }
            Some(Frame::Child) | None => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<ChangeDocument, OscReadError> {
        let document = self.document.ok_or(OscReadError::MissingRoot)?;
        if !self.closed {
            return Err(OscReadError::Truncated);
        }
        debug!(
            "read change document with {} operation groups and {} elements",
            document.operations().len(),
            document.elements().count()
        );
        Ok(document)
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn read_attributes(start: &BytesStart<'_>, element: &str) -> Result<Attributes, OscReadError> {
    let malformed = |source: quick_xml::Error| OscReadError::Attribute {
        element: element.to_owned(),
        source,
    };
    start
        .attributes()
        .map(|entry| {
            let attribute = entry.map_err(|err| malformed(err.into()))?;
            let name = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(malformed)?.into_owned();
            Ok((name, value))
        })
        .collect()
}

fn lookup(attributes: &Attributes, name: &str) -> Option<String> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

fn required<'a>(
    attributes: &'a Attributes,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'a str, OscReadError> {
    attributes
        .iter()
        .find(|(key, _)| key == attribute)
        .map(|(_, value)| value.as_str())
        .ok_or(OscReadError::MissingAttribute { element, attribute })
}

fn parse_ref(element: &'static str, raw: &str) -> Result<i64, OscReadError> {
    raw.trim()
        .parse()
        .map_err(|_| OscReadError::InvalidReference {
            element,
            value: raw.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use osctrim_core::ElementError;
    use rstest::rstest;

    fn read(xml: &str) -> Result<ChangeDocument, OscReadError> {
        read_change_document(xml.as_bytes())
    }

    #[rstest]
    fn reads_all_element_kinds_with_children() {
        let document = read(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <osmChange version="0.6" generator="test">
              <modify>
                <node id="1" version="2" lat="51.5" lon="-0.1">
                  <tag k="name" v="Fish &amp; Chips"/>
                </node>
                <way id="10" version="3">
                  <nd ref="1"/>
                  <nd ref="2"/>
                  <tag k="highway" v="path"/>
                </way>
                <relation id="100">
                  <member type="way" ref="10" role="outer"/>
                  <member type="node" ref="1"/>
                </relation>
              </modify>
            </osmChange>"#,
        )
        .expect("valid document");

        assert_eq!(
            document.attributes(),
            [
                ("version".to_owned(), "0.6".to_owned()),
                ("generator".to_owned(), "test".to_owned()),
            ]
        );
        let elements: Vec<_> = document.elements().collect();
        let [Element::Node(node), Element::Way(way), Element::Relation(relation)] =
            elements.as_slice()
        else {
            panic!("unexpected elements {elements:?}");
        };
        assert_eq!(node.id(), 1);
        assert_eq!(
            node.location().map(|coord| (coord.x, coord.y)),
            Some((-0.1, 51.5))
        );
        assert_eq!(node.header().tags(), [Tag::new("name", "Fish & Chips")]);
        assert_eq!(node.header().attribute("version"), Some("2"));
        assert_eq!(way.node_refs(), [1, 2]);
        assert_eq!(
            relation.members(),
            [
                Member::new(ElementKind::Way, 10, "outer"),
                Member::new(ElementKind::Node, 1, ""),
            ]
        );
    }

    #[rstest]
    fn empty_groups_are_kept_on_read() {
        let document = read("<osmChange><delete/><create></create></osmChange>").expect("valid");
        let actions: Vec<_> = document.operations().iter().map(Operation::action).collect();
        assert_eq!(actions, [Action::Delete, Action::Create]);
    }

    #[rstest]
    #[case("<osm><create/></osm>", "osm")]
    #[case("<osmChange><upsert/></osmChange>", "upsert")]
    #[case("<osmChange><create><area id=\"1\"/></create></osmChange>", "area")]
    #[case(
        "<osmChange><create><node id=\"1\"><nd ref=\"2\"/></node></create></osmChange>",
        "nd"
    )]
    fn rejects_unexpected_elements(#[case] xml: &str, #[case] expected: &str) {
        match read(xml) {
            Err(OscReadError::UnexpectedElement { name, .. }) => assert_eq!(name, expected),
            other => panic!("expected UnexpectedElement, got {other:?}"),
        }
    }

    #[rstest]
    fn reports_partial_coordinates() {
        let err = read("<osmChange><create><node id=\"7\" lat=\"1\"/></create></osmChange>")
            .expect_err("half a coordinate");
        assert!(matches!(
            err,
            OscReadError::Element(ElementError::PartialCoordinate { id: 7 })
        ));
    }

    #[rstest]
    #[case("<osmChange><create><way id=\"1\"><nd ref=\"x\"/></way></create></osmChange>")]
    #[case(
        "<osmChange><create><relation id=\"1\"><member type=\"way\" ref=\"\"/></relation></create></osmChange>"
    )]
    fn rejects_non_integer_references(#[case] xml: &str) {
        assert!(matches!(
            read(xml),
            Err(OscReadError::InvalidReference { .. })
        ));
    }

    #[rstest]
    fn rejects_tags_without_values() {
        let err = read("<osmChange><create><node id=\"1\"><tag k=\"a\"/></node></create></osmChange>")
            .expect_err("tag without v");
        assert!(matches!(
            err,
            OscReadError::MissingAttribute {
                element: "tag",
                attribute: "v"
            }
        ));
    }

    #[rstest]
    fn rejects_unknown_member_types() {
        let err = read(
            "<osmChange><create><relation id=\"1\"><member type=\"area\" ref=\"2\"/></relation></create></osmChange>",
        )
        .expect_err("unknown member type");
        assert!(matches!(
            err,
            OscReadError::Element(ElementError::UnknownKind { .. })
        ));
    }

    #[rstest]
    #[case("")]
    #[case("<!-- nothing here -->")]
    fn rejects_documents_without_root(#[case] xml: &str) {
        assert!(matches!(read(xml), Err(OscReadError::MissingRoot)));
    }

    #[rstest]
    fn rejects_malformed_xml() {
        assert!(matches!(
            read("<osmChange><create></modify></osmChange>"),
            Err(OscReadError::Xml { .. })
        ));
    }
}

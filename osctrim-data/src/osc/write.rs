//! `osmChange` writer built on `quick-xml`.

use std::io::Write;

use osctrim_core::{ChangeDocument, Element, Header};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use super::{
    ATTR_ID, ATTR_KEY, ATTR_REF, ATTR_ROLE, ATTR_TYPE, ATTR_VALUE, OscWriteError, TAG_MEMBER,
    TAG_ND, TAG_ROOT, TAG_TAG,
};

/// Serialise `document` as indented `osmChange` XML.
///
/// Each element is written with `id` first, followed by its remaining
/// attributes in the order they were read. Elements without children are
/// written as self-closing tags.
///
/// # Errors
/// Returns [`OscWriteError::Io`] when the underlying writer fails.
pub fn write_change_document<W: Write>(
    output: W,
    document: &ChangeDocument,
) -> Result<(), OscWriteError> {
    let mut writer = Writer::new_with_indent(output, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new(TAG_ROOT);
    push_attributes(&mut root, document.attributes());
    if document.operations().is_empty() {
        writer.write_event(Event::Empty(root))?;
    } else {
        writer.write_event(Event::Start(root))?;
        for operation in document.operations() {
            let name = operation.action().as_str();
            if operation.is_empty() {
                writer.write_event(Event::Empty(BytesStart::new(name)))?;
                continue;
            }
            writer.write_event(Event::Start(BytesStart::new(name)))?;
            for element in operation.elements() {
                write_element(&mut writer, element)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        writer.write_event(Event::End(BytesEnd::new(TAG_ROOT)))?;
    }

    let mut output = writer.into_inner();
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> Result<(), OscWriteError> {
    let name = element.kind().as_str();
    let header = element.header();
    let mut start = BytesStart::new(name);
    push_header(&mut start, header);

    let mut children = Vec::new();
    match element {
        Element::Node(_) => {}
        Element::Way(way) => {
            for node_ref in way.node_refs() {
                let mut nd = BytesStart::new(TAG_ND);
                nd.push_attribute((ATTR_REF, node_ref.to_string().as_str()));
                children.push(nd);
            }
        }
        Element::Relation(relation) => {
            for member in relation.members() {
                let mut child = BytesStart::new(TAG_MEMBER);
                child.push_attribute((ATTR_TYPE, member.kind.as_str()));
                child.push_attribute((ATTR_REF, member.id.to_string().as_str()));
                child.push_attribute((ATTR_ROLE, member.role.as_str()));
                children.push(child);
            }
        }
    }
    for tag in header.tags() {
        let mut child = BytesStart::new(TAG_TAG);
        child.push_attribute((ATTR_KEY, tag.key.as_str()));
        child.push_attribute((ATTR_VALUE, tag.value.as_str()));
        children.push(child);
    }

    if children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for child in children {
        writer.write_event(Event::Empty(child))?;
    }
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn push_header(start: &mut BytesStart<'_>, header: &Header) {
    start.push_attribute((ATTR_ID, header.id().to_string().as_str()));
    push_attributes(start, header.attributes());
}

fn push_attributes(start: &mut BytesStart<'_>, attributes: &[(String, String)]) {
    for (name, value) in attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_change_document;
    use osctrim_core::{Action, ElementKind, Member, Node, Operation, Relation, Way};
    use rstest::rstest;

    fn render(document: &ChangeDocument) -> String {
        let mut bytes = Vec::new();
        write_change_document(&mut bytes, document).expect("write document");
        String::from_utf8(bytes).expect("utf-8 output")
    }

    #[rstest]
    fn writes_id_first_and_escapes_values() {
        let document = ChangeDocument::new().with_operation(
            Operation::new(Action::Create)
                .with(Node::new(-1).with_location(0.5, 0.25).with_tag("name", "A & \"B\"")),
        );
        let xml = render(&document);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(
            xml.contains("<node id=\"-1\" lat=\"0.25\" lon=\"0.5\">"),
            "unexpected node start in {xml}"
        );
        assert!(xml.contains("v=\"A &amp; &quot;B&quot;\""), "{xml}");
    }

    #[rstest]
    fn written_document_reads_back_unchanged() {
        let document = ChangeDocument::with_attributes(vec![
            ("version".to_owned(), "0.6".to_owned()),
            ("generator".to_owned(), "osc-trim".to_owned()),
        ])
        .with_operation(
            Operation::new(Action::Modify)
                .with(Node::new(1).with_location(10.0, 20.0))
                .with(Way::new(2, [1, 3]).with_tag("highway", "track"))
                .with(
                    Relation::new(4)
                        .with_member(Member::new(ElementKind::Way, 2, "outer"))
                        .with_member(Member::new(ElementKind::Node, 1, "")),
                ),
        )
        .with_operation(Operation::new(Action::Delete).with(Node::new(9)));

        let xml = render(&document);
        let parsed = read_change_document(xml.as_bytes()).expect("re-read output");
        assert_eq!(parsed, document);
    }

    #[rstest]
    fn empty_document_is_self_closing() {
        let xml = render(&ChangeDocument::with_attributes(vec![(
            "version".to_owned(),
            "0.6".to_owned(),
        )]));
        assert!(xml.contains("<osmChange version=\"0.6\"/>"), "{xml}");
    }
}

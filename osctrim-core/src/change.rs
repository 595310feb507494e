//! In-memory model of an `osmChange` document.
//!
//! A [`ChangeDocument`] is an ordered list of [`Operation`] groups, each
//! holding the nodes, ways and relations it creates, modifies or deletes.
//! Elements keep every attribute and tag they were read with; only the
//! identifier, the node coordinate, way node references and relation members
//! are lifted into typed fields because the trimming passes inspect them.

use std::fmt;
use std::str::FromStr;

use geo::Coord;
use thiserror::Error;

const ATTR_ID: &str = "id";
const ATTR_LAT: &str = "lat";
const ATTR_LON: &str = "lon";

/// Ordered `(name, value)` attribute pairs, excluding the element identifier.
pub type Attributes = Vec<(String, String)>;

/// Kind of OpenStreetMap element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    /// A point feature.
    Node,
    /// A line feature referencing an ordered list of nodes.
    Way,
    /// A multi-feature grouping of members.
    Relation,
}

impl ElementKind {
    /// XML element name used by `osmChange` for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = ElementError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "node" => Ok(Self::Node),
            "way" => Ok(Self::Way),
            "relation" => Ok(Self::Relation),
            other => Err(ElementError::UnknownKind {
                value: other.to_owned(),
            }),
        }
    }
}

/// Action applied to the elements of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Elements that did not exist before the change.
    Create,
    /// New versions of existing elements.
    Modify,
    /// Elements removed by the change.
    Delete,
}

impl Action {
    /// XML element name used by `osmChange` for this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }

    /// Whether elements under this action take part in trimming.
    ///
    /// Deletions pass through untouched.
    #[must_use]
    pub const fn is_trimmed(self) -> bool {
        matches!(self, Self::Create | Self::Modify)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ElementError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "modify" => Ok(Self::Modify),
            "delete" => Ok(Self::Delete),
            other => Err(ElementError::UnknownAction {
                value: other.to_owned(),
            }),
        }
    }
}

/// Errors raised while assembling an element from raw attributes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ElementError {
    /// The element carried no `id` attribute.
    #[error("{kind} is missing the required `id` attribute")]
    MissingId {
        /// Kind of the offending element.
        kind: ElementKind,
    },
    /// The `id` attribute was not a signed 64-bit integer.
    #[error("{kind} has a non-integer id {value:?}")]
    InvalidId {
        /// Kind of the offending element.
        kind: ElementKind,
        /// Raw attribute value.
        value: String,
    },
    /// A coordinate attribute could not be parsed as a finite number.
    #[error("node {id} has a malformed `{attribute}` value {value:?}")]
    InvalidCoordinate {
        /// Identifier of the offending node.
        id: i64,
        /// Either `lat` or `lon`.
        attribute: &'static str,
        /// Raw attribute value.
        value: String,
    },
    /// Only one of `lat`/`lon` was present.
    #[error("node {id} carries only one of `lat` and `lon`")]
    PartialCoordinate {
        /// Identifier of the offending node.
        id: i64,
    },
    /// An element kind name was not `node`, `way` or `relation`.
    #[error("unknown element kind {value:?}")]
    UnknownKind {
        /// Raw kind name.
        value: String,
    },
    /// An action name was not `create`, `modify` or `delete`.
    #[error("unknown change action {value:?}")]
    UnknownAction {
        /// Raw action name.
        value: String,
    },
}

/// A single `k=v` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Build a tag from any string-like key and value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Identifier, attributes and tags shared by every element kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    id: i64,
    attributes: Attributes,
    tags: Vec<Tag>,
}

impl Header {
    /// Create a header with no extra attributes or tags.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self {
            id,
            attributes: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Split the `id` attribute out of raw attributes.
    ///
    /// The remaining attributes keep their input order.
    ///
    /// # Errors
    /// Returns [`ElementError::MissingId`] or [`ElementError::InvalidId`] when
    /// the identifier is absent or not an integer.
    pub fn parse<I>(kind: ElementKind, attributes: I, tags: Vec<Tag>) -> Result<Self, ElementError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut id = None;
        let mut rest = Vec::new();
        for (name, value) in attributes {
            if name == ATTR_ID {
                id = Some(value);
            } else {
                rest.push((name, value));
            }
        }
        let raw = id.ok_or(ElementError::MissingId { kind })?;
        let id = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ElementError::InvalidId { kind, value: raw })?;
        Ok(Self {
            id,
            attributes: rest,
            tags,
        })
    }

    /// Element identifier.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Attributes other than `id`, in input order.
    #[must_use]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Look up an attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Tags in input order.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn set_attribute(&mut self, name: &str, value: String) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_owned(), value)),
        }
    }
}

/// A point feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    header: Header,
    location: Option<Coord<f64>>,
}

impl Node {
    /// Create a node without a coordinate.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self {
            header: Header::new(id),
            location: None,
        }
    }

    /// Build a node from raw attributes, parsing `lat`/`lon` when present.
    ///
    /// The coordinate attributes stay in the attribute list so the node is
    /// written back exactly as read.
    ///
    /// # Errors
    /// Returns an [`ElementError`] when the identifier is missing or
    /// malformed, when a coordinate is not a finite number, or when only one
    /// of the two coordinate attributes is present.
    pub fn from_attributes<I>(attributes: I, tags: Vec<Tag>) -> Result<Self, ElementError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let header = Header::parse(ElementKind::Node, attributes, tags)?;
        let id = header.id();
        let lat = header.attribute(ATTR_LAT);
        let lon = header.attribute(ATTR_LON);
        let location = match (lon, lat) {
            (Some(lon), Some(lat)) => Some(Coord {
                x: parse_coordinate(id, ATTR_LON, lon)?,
                y: parse_coordinate(id, ATTR_LAT, lat)?,
            }),
            (None, None) => None,
            _ => return Err(ElementError::PartialCoordinate { id }),
        };
        Ok(Self { header, location })
    }

    /// Attach a coordinate, recording it as `lat`/`lon` attributes.
    #[must_use]
    pub fn with_location(mut self, lon: f64, lat: f64) -> Self {
        self.header.set_attribute(ATTR_LAT, lat.to_string());
        self.header.set_attribute(ATTR_LON, lon.to_string());
        self.location = Some(Coord { x: lon, y: lat });
        self
    }

    /// Append a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.tags.push(Tag::new(key, value));
        self
    }

    /// Node identifier.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.header.id
    }

    /// Coordinate as `x = longitude`, `y = latitude`, when the node has one.
    #[must_use]
    pub const fn location(&self) -> Option<Coord<f64>> {
        self.location
    }

    /// Shared identifier, attributes and tags.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }
}

fn parse_coordinate(id: i64, attribute: &'static str, raw: &str) -> Result<f64, ElementError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ElementError::InvalidCoordinate {
            id,
            attribute,
            value: raw.to_owned(),
        })
}

/// A line feature referencing an ordered list of nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Way {
    header: Header,
    node_refs: Vec<i64>,
}

impl Way {
    /// Create a way over the given node references.
    pub fn new(id: i64, node_refs: impl IntoIterator<Item = i64>) -> Self {
        Self {
            header: Header::new(id),
            node_refs: node_refs.into_iter().collect(),
        }
    }

    /// Build a way from raw attributes and already parsed node references.
    ///
    /// # Errors
    /// Returns an [`ElementError`] when the identifier is missing or
    /// malformed.
    pub fn from_attributes<I>(
        attributes: I,
        node_refs: Vec<i64>,
        tags: Vec<Tag>,
    ) -> Result<Self, ElementError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let header = Header::parse(ElementKind::Way, attributes, tags)?;
        Ok(Self { header, node_refs })
    }

    /// Append a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.tags.push(Tag::new(key, value));
        self
    }

    /// Way identifier.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.header.id
    }

    /// Referenced node identifiers in way order.
    #[must_use]
    pub fn node_refs(&self) -> &[i64] {
        &self.node_refs
    }

    /// Shared identifier, attributes and tags.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }
}

/// A relation member reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Kind of the referenced element.
    pub kind: ElementKind,
    /// Identifier of the referenced element.
    pub id: i64,
    /// Member role, possibly empty.
    pub role: String,
}

impl Member {
    /// Build a member reference.
    pub fn new(kind: ElementKind, id: i64, role: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            role: role.into(),
        }
    }
}

/// A multi-feature grouping of members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    header: Header,
    members: Vec<Member>,
}

impl Relation {
    /// Create a relation without members.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self {
            header: Header::new(id),
            members: Vec::new(),
        }
    }

    /// Build a relation from raw attributes and already parsed members.
    ///
    /// # Errors
    /// Returns an [`ElementError`] when the identifier is missing or
    /// malformed.
    pub fn from_attributes<I>(
        attributes: I,
        members: Vec<Member>,
        tags: Vec<Tag>,
    ) -> Result<Self, ElementError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let header = Header::parse(ElementKind::Relation, attributes, tags)?;
        Ok(Self { header, members })
    }

    /// Append a member.
    #[must_use]
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// Append a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.tags.push(Tag::new(key, value));
        self
    }

    /// Relation identifier.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.header.id
    }

    /// Members in relation order.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Shared identifier, attributes and tags.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }
}

/// Any element found inside an operation group.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A point feature.
    Node(Node),
    /// A line feature.
    Way(Way),
    /// A relation.
    Relation(Relation),
}

impl Element {
    /// Kind of this element.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Node(_) => ElementKind::Node,
            Self::Way(_) => ElementKind::Way,
            Self::Relation(_) => ElementKind::Relation,
        }
    }

    /// Identifier of this element.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.header().id()
    }

    /// Shared identifier, attributes and tags.
    #[must_use]
    pub const fn header(&self) -> &Header {
        match self {
            Self::Node(node) => node.header(),
            Self::Way(way) => way.header(),
            Self::Relation(relation) => relation.header(),
        }
    }
}

impl From<Node> for Element {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Way> for Element {
    fn from(way: Way) -> Self {
        Self::Way(way)
    }
}

impl From<Relation> for Element {
    fn from(relation: Relation) -> Self {
        Self::Relation(relation)
    }
}

/// An ordered group of elements sharing one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    action: Action,
    elements: Vec<Element>,
}

impl Operation {
    /// Create an empty operation group.
    #[must_use]
    pub const fn new(action: Action) -> Self {
        Self {
            action,
            elements: Vec::new(),
        }
    }

    /// Append an element, builder style.
    #[must_use]
    pub fn with(mut self, element: impl Into<Element>) -> Self {
        self.push(element);
        self
    }

    /// Append an element.
    pub fn push(&mut self, element: impl Into<Element>) {
        self.elements.push(element.into());
    }

    /// Action applied to every element of the group.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.action
    }

    /// Elements in document order.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Whether the group holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Detach every element for which `keep` returns `false`.
    ///
    /// Returns the number of detached elements.
    pub fn retain_elements<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&Element) -> bool,
    {
        let before = self.elements.len();
        self.elements.retain(keep);
        before - self.elements.len()
    }
}

/// Root of an `osmChange` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeDocument {
    attributes: Attributes,
    operations: Vec<Operation>,
}

impl ChangeDocument {
    /// Create an empty document with no root attributes.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attributes: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Create an empty document carrying root attributes such as `version`
    /// and `generator`.
    #[must_use]
    pub const fn with_attributes(attributes: Attributes) -> Self {
        Self {
            attributes,
            operations: Vec::new(),
        }
    }

    /// Append an operation group, builder style.
    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Append an operation group.
    pub fn push_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Root attributes in input order.
    #[must_use]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Operation groups in document order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Mutable access to the operation groups.
    pub fn operations_mut(&mut self) -> &mut [Operation] {
        &mut self.operations
    }

    /// Iterate over elements under create and modify groups, with their
    /// action.
    pub fn trimmed_elements(&self) -> impl Iterator<Item = (Action, &Element)> + '_ {
        self.operations
            .iter()
            .filter(|operation| operation.action.is_trimmed())
            .flat_map(|operation| {
                operation
                    .elements
                    .iter()
                    .map(move |element| (operation.action, element))
            })
    }

    /// Iterate over every element in document order, including deletions.
    pub fn elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.operations
            .iter()
            .flat_map(|operation| operation.elements.iter())
    }

    /// Drop every operation group that holds no elements.
    ///
    /// Returns the number of dropped groups.
    pub fn remove_empty_operations(&mut self) -> usize {
        let before = self.operations.len();
        self.operations.retain(|operation| !operation.is_empty());
        before - self.operations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[rstest]
    fn node_keeps_attribute_order_and_coordinates() {
        let node = Node::from_attributes(
            attrs(&[
                ("id", "7"),
                ("version", "3"),
                ("lat", "52.5"),
                ("lon", "13.25"),
            ]),
            vec![Tag::new("amenity", "cafe")],
        )
        .expect("valid node");
        assert_eq!(node.id(), 7);
        assert_eq!(node.location(), Some(Coord { x: 13.25, y: 52.5 }));
        let names: Vec<_> = node
            .header()
            .attributes()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, ["version", "lat", "lon"]);
        assert_eq!(node.header().tags(), [Tag::new("amenity", "cafe")]);
    }

    #[rstest]
    fn node_without_coordinates_has_no_location() {
        let node = Node::from_attributes(attrs(&[("id", "-4"), ("visible", "false")]), Vec::new())
            .expect("valid node");
        assert_eq!(node.id(), -4);
        assert!(node.location().is_none());
    }

    #[rstest]
    #[case(attrs(&[("lat", "1.0")]), ElementError::MissingId { kind: ElementKind::Node })]
    #[case(
        attrs(&[("id", "n1")]),
        ElementError::InvalidId { kind: ElementKind::Node, value: "n1".into() }
    )]
    #[case(
        attrs(&[("id", "1"), ("lat", "north"), ("lon", "2")]),
        ElementError::InvalidCoordinate { id: 1, attribute: "lat", value: "north".into() }
    )]
    #[case(
        attrs(&[("id", "1"), ("lat", "1"), ("lon", "NaN")]),
        ElementError::InvalidCoordinate { id: 1, attribute: "lon", value: "NaN".into() }
    )]
    #[case(attrs(&[("id", "1"), ("lat", "1")]), ElementError::PartialCoordinate { id: 1 })]
    fn malformed_nodes_are_rejected(
        #[case] attributes: Vec<(String, String)>,
        #[case] expected: ElementError,
    ) {
        let err = Node::from_attributes(attributes, Vec::new()).expect_err("malformed node");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn with_location_replaces_existing_coordinates() {
        let node = Node::new(1).with_location(1.0, 2.0).with_location(3.5, 4.5);
        assert_eq!(node.location(), Some(Coord { x: 3.5, y: 4.5 }));
        assert_eq!(node.header().attribute("lat"), Some("4.5"));
        assert_eq!(node.header().attribute("lon"), Some("3.5"));
        assert_eq!(node.header().attributes().len(), 2);
    }

    #[rstest]
    #[case("node", ElementKind::Node)]
    #[case("way", ElementKind::Way)]
    #[case("relation", ElementKind::Relation)]
    fn element_kinds_round_trip_through_names(#[case] name: &str, #[case] kind: ElementKind) {
        assert_eq!(name.parse::<ElementKind>(), Ok(kind));
        assert_eq!(kind.to_string(), name);
    }

    #[rstest]
    fn unknown_action_is_rejected() {
        assert_eq!(
            "upsert".parse::<Action>(),
            Err(ElementError::UnknownAction {
                value: "upsert".into()
            })
        );
    }

    #[rstest]
    fn trimmed_elements_skip_deletions() {
        let document = ChangeDocument::new()
            .with_operation(Operation::new(Action::Create).with(Node::new(1)))
            .with_operation(Operation::new(Action::Delete).with(Node::new(2)))
            .with_operation(Operation::new(Action::Modify).with(Way::new(3, [1])));
        let seen: Vec<_> = document
            .trimmed_elements()
            .map(|(action, element)| (action, element.kind(), element.id()))
            .collect();
        assert_eq!(
            seen,
            [
                (Action::Create, ElementKind::Node, 1),
                (Action::Modify, ElementKind::Way, 3),
            ]
        );
        assert_eq!(document.elements().count(), 3);
    }

    #[rstest]
    fn retain_and_remove_empty_operations() {
        let mut document = ChangeDocument::new()
            .with_operation(
                Operation::new(Action::Create)
                    .with(Node::new(1))
                    .with(Node::new(2)),
            )
            .with_operation(Operation::new(Action::Modify).with(Relation::new(9)));
        let Some(create) = document.operations_mut().first_mut() else {
            panic!("create group present");
        };
        assert_eq!(create.retain_elements(|element| element.id() == 2), 1);
        let Some(modify) = document.operations_mut().get_mut(1) else {
            panic!("modify group present");
        };
        assert_eq!(modify.retain_elements(|_| false), 1);

        assert_eq!(document.remove_empty_operations(), 1);
        assert_eq!(document.operations().len(), 1);
        assert_eq!(
            document.operations().first().map(Operation::action),
            Some(Action::Create)
        );
    }
}

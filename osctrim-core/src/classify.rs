//! Classification and closure passes deciding which elements survive a trim.
//!
//! Three passes run in a fixed order, each consulting the reference store at
//! most once with a single batch:
//!
//! 1. **Nodes.** Every node under `create`/`modify` with a coordinate is
//!    tested against the region. Modified nodes outside the region that the
//!    store already knows are promoted to inside.
//! 2. **Ways.** A way touching an inside node is kept and drags all of its
//!    nodes inside, which may in turn reach further ways; this repeats until
//!    nothing changes. A way whose classified nodes are all outside is
//!    dropped unless it is a modification the store already knows, in which
//!    case it is kept and drags its nodes inside too. A way none of whose
//!    nodes were classified is left alone.
//! 3. **Relations.** Modified relations unknown to the store are dropped.
//!    Created relations are always kept and members are never dragged in.
//!
//! Way closure runs to a fixed point, so the outcome does not depend on the
//! order of ways in the document and no dropped way references an inside
//! node. Closure only ever upgrades a node to inside.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::{Action, ChangeDocument, Element, ElementKind, ReferenceStore, Region, TrimError, Way};

/// Classification of a node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointStatus {
    /// Inside the region, rescued by the store, or dragged in by a kept way.
    Inside,
    /// Outside the region and not rescued.
    Outside,
    /// Never declared with a coordinate under `create`/`modify`.
    Unknown,
}

/// Outcome of the three classification passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    points: HashMap<i64, PointStatus>,
    drop_ways: HashSet<i64>,
    drop_relations: HashSet<i64>,
}

impl Classification {
    /// Status of the node `id`.
    #[must_use]
    pub fn point_status(&self, id: i64) -> PointStatus {
        self.points.get(&id).copied().unwrap_or(PointStatus::Unknown)
    }

    /// Whether the way `id` is slated for removal.
    #[must_use]
    pub fn drops_way(&self, id: i64) -> bool {
        self.drop_ways.contains(&id)
    }

    /// Whether the relation `id` is slated for removal.
    #[must_use]
    pub fn drops_relation(&self, id: i64) -> bool {
        self.drop_relations.contains(&id)
    }

    /// Whether `element` survives pruning when found under `create`/`modify`.
    #[must_use]
    pub fn keeps(&self, element: &Element) -> bool {
        match element {
            Element::Node(node) => self.point_status(node.id()) != PointStatus::Outside,
            Element::Way(way) => !self.drops_way(way.id()),
            Element::Relation(relation) => !self.drops_relation(relation.id()),
        }
    }

    /// Identifiers of every node classified inside, in ascending order.
    #[must_use]
    pub fn inside_points(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .points
            .iter()
            .filter(|(_, status)| **status == PointStatus::Inside)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn mark_inside(&mut self, ids: &[i64]) {
        for id in ids {
            self.points.insert(*id, PointStatus::Inside);
        }
    }

    fn line_verdict(&self, way: &Way) -> LineVerdict {
        let mut classified = false;
        for id in way.node_refs() {
            match self.point_status(*id) {
                PointStatus::Inside => return LineVerdict::Touches,
                PointStatus::Outside => classified = true,
                PointStatus::Unknown => {}
            }
        }
        if classified {
            LineVerdict::Detached
        } else {
            LineVerdict::Untouched
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineVerdict {
    /// At least one node is inside.
    Touches,
    /// Some nodes were classified and none of them is inside.
    Detached,
    /// No node was classified.
    Untouched,
}

/// Run the node, way and relation passes over `document`.
///
/// # Errors
/// Returns [`TrimError::Store`] when a reference-store lookup fails. No
/// partial classification is returned.
///
/// # Examples
///
/// ```
/// use osctrim_core::test_support::MemoryReferenceStore;
/// use osctrim_core::{Action, Boundary, ChangeDocument, Node, Operation, PointStatus, Way, classify};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let document = ChangeDocument::new().with_operation(
///     Operation::new(Action::Create)
///         .with(Node::new(1).with_location(0.5, 0.5))
///         .with(Node::new(2).with_location(5.0, 5.0))
///         .with(Way::new(10, [1, 2])),
/// );
/// let region = Boundary::from_bbox(0.0, 0.0, 1.0, 1.0)?;
/// let classification = classify(&document, &region, &MemoryReferenceStore::default())?;
/// assert_eq!(classification.point_status(2), PointStatus::Inside);
/// assert!(!classification.drops_way(10));
/// # Ok(())
/// # }
/// ```
pub fn classify<R, S>(
    document: &ChangeDocument,
    region: &R,
    store: &S,
) -> Result<Classification, TrimError>
where
    R: Region + ?Sized,
    S: ReferenceStore + ?Sized,
{
    let mut classification = Classification::default();
    classify_points(document, region, store, &mut classification)?;
    classify_ways(document, store, &mut classification)?;
    classify_relations(document, store, &mut classification)?;
    Ok(classification)
}

fn classify_points<R, S>(
    document: &ChangeDocument,
    region: &R,
    store: &S,
    classification: &mut Classification,
) -> Result<(), TrimError>
where
    R: Region + ?Sized,
    S: ReferenceStore + ?Sized,
{
    let mut candidates = Vec::new();
    for (action, element) in document.trimmed_elements() {
        let Element::Node(node) = element else {
            continue;
        };
        let Some(location) = node.location() else {
            continue;
        };
        let status = if region.contains(location.x, location.y) {
            PointStatus::Inside
        } else {
            PointStatus::Outside
        };
        classification.points.insert(node.id(), status);
        if status == PointStatus::Outside && action == Action::Modify {
            candidates.push(node.id());
        }
    }

    let known = lookup(store, ElementKind::Node, &mut candidates)?;
    let rescued: Vec<i64> = candidates
        .into_iter()
        .filter(|id| known.contains(id))
        .collect();
    classification.mark_inside(&rescued);
    debug!(
        "classified {} nodes, rescued {} modified nodes outside the region",
        classification.points.len(),
        rescued.len()
    );
    Ok(())
}

fn classify_ways<S>(
    document: &ChangeDocument,
    store: &S,
    classification: &mut Classification,
) -> Result<(), TrimError>
where
    S: ReferenceStore + ?Sized,
{
    let pending: Vec<(Action, &Way)> = document
        .trimmed_elements()
        .filter_map(|(action, element)| match element {
            Element::Way(way) => Some((action, way)),
            _ => None,
        })
        .collect();
    let (mut kept, detached) = spread_inside(pending, classification);

    let mut candidate_ids: Vec<i64> = detached
        .iter()
        .filter(|(action, way)| {
            *action == Action::Modify
                && classification.line_verdict(way) == LineVerdict::Detached
        })
        .map(|(_, way)| way.id())
        .collect();
    let known = lookup(store, ElementKind::Way, &mut candidate_ids)?;
    let mut remaining = Vec::with_capacity(detached.len());
    let mut rescued = 0_usize;
    for (action, way) in detached {
        if action == Action::Modify && known.contains(&way.id()) {
            classification.mark_inside(way.node_refs());
            rescued += 1;
        } else {
            remaining.push((action, way));
        }
    }

    // Rescued ways may have pulled shared nodes inside.
    let (touched, dropped) = spread_inside(remaining, classification);
    kept += touched;
    for (_, way) in dropped {
        if classification.line_verdict(way) == LineVerdict::Detached {
            classification.drop_ways.insert(way.id());
        }
    }
    debug!(
        "kept {} ways touching the region, rescued {} modified ways, dropping {}",
        kept,
        rescued,
        classification.drop_ways.len()
    );
    Ok(())
}

/// Keep every way touching an inside node, dragging its nodes inside, until
/// no further way is reached. Returns how many ways were kept and the ways
/// left undecided.
fn spread_inside<'a>(
    mut pending: Vec<(Action, &'a Way)>,
    classification: &mut Classification,
) -> (usize, Vec<(Action, &'a Way)>) {
    let mut kept = 0_usize;
    loop {
        let (touching, rest): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|(_, way)| classification.line_verdict(way) == LineVerdict::Touches);
        pending = rest;
        if touching.is_empty() {
            return (kept, pending);
        }
        kept += touching.len();
        for (_, way) in touching {
            classification.mark_inside(way.node_refs());
        }
    }
}

fn classify_relations<S>(
    document: &ChangeDocument,
    store: &S,
    classification: &mut Classification,
) -> Result<(), TrimError>
where
    S: ReferenceStore + ?Sized,
{
    let mut candidates: Vec<i64> = document
        .trimmed_elements()
        .filter_map(|(action, element)| match element {
            Element::Relation(relation) if action == Action::Modify => Some(relation.id()),
            _ => None,
        })
        .collect();
    let known = lookup(store, ElementKind::Relation, &mut candidates)?;
    classification.drop_relations.extend(
        candidates
            .into_iter()
            .filter(|id| !known.contains(id)),
    );
    debug!(
        "dropping {} modified relations unknown to the reference store",
        classification.drop_relations.len()
    );
    Ok(())
}

/// Query the store once with a deduplicated batch; an empty batch skips the
/// query.
fn lookup<S>(store: &S, kind: ElementKind, ids: &mut Vec<i64>) -> Result<HashSet<i64>, TrimError>
where
    S: ReferenceStore + ?Sized,
{
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    store
        .known_ids(kind, ids)
        .map_err(|source| TrimError::Store { kind, source })
}

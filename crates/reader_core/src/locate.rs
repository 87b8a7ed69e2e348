//! Destination field lookup
//!
//! Ranks text fields relative to a surface: first by distance in the
//! document tree, then by on-screen distance between centers.

use crate::types::{DocumentTree, Field, NodeId, Surface};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Ranking key of a field relative to one surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionScore {
    /// Tree steps to the lowest common ancestor; `None` if disconnected
    pub proximity: Option<u32>,
    /// Euclidean distance between rect centers
    pub distance: f64,
}

impl SelectionScore {
    /// Total order: lower proximity first, disconnected last, then distance
    pub fn cmp_rank(&self, other: &Self) -> Ordering {
        let proximity = match (self.proximity, other.proximity) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        proximity.then_with(|| self.distance.total_cmp(&other.distance))
    }
}

/// Steps from `a` and from `b` up to their lowest common ancestor, summed
pub fn ancestor_proximity(tree: &DocumentTree, a: NodeId, b: NodeId) -> Option<u32> {
    let depths: HashMap<NodeId, u32> = tree.ancestors(a).zip(0..).collect();

    tree.ancestors(b)
        .zip(0u32..)
        .find_map(|(node, b_depth)| depths.get(&node).map(|a_depth| a_depth + b_depth))
}

pub fn score(tree: &DocumentTree, surface: &Surface, field: &Field) -> SelectionScore {
    SelectionScore {
        proximity: ancestor_proximity(tree, surface.node, field.node),
        distance: surface.rect.center_distance(&field.rect),
    }
}

/// Pick the best field to receive text read from `surface`
///
/// Returns `None` only when `fields` is empty. The first field wins exact
/// ties.
pub fn find_nearest_field<'a>(
    tree: &DocumentTree,
    surface: &Surface,
    fields: &'a [Field],
) -> Option<&'a Field> {
    find_nearest_index(tree, surface, fields).map(|index| &fields[index])
}

/// Like [`find_nearest_field`], returning the position in `fields`
pub fn find_nearest_index(tree: &DocumentTree, surface: &Surface, fields: &[Field]) -> Option<usize> {
    let mut best: Option<(usize, SelectionScore)> = None;

    for (index, field) in fields.iter().enumerate() {
        let candidate = score(tree, surface, field);
        match &best {
            Some((_, current)) if candidate.cmp_rank(current) != Ordering::Less => {}
            _ => best = Some((index, candidate)),
        }
    }

    best.map(|(index, _)| index)
}

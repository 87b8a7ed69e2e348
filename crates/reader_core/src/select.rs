//! Target selection
//!
//! Picks the surface most likely to hold the text to read: the largest one
//! that is big enough to matter and at least partly on screen.

use crate::error::NoCandidate;
use crate::types::{Surface, Viewport};

/// Select the read target among `surfaces`
///
/// Keeps surfaces whose rect is wider and taller than `min_size` and that
/// start inside the viewport, then returns the one with the largest area.
/// The first surface wins ties.
pub fn select_target<'a>(
    surfaces: &'a [Surface],
    viewport: &Viewport,
    min_size: f64,
) -> Result<&'a Surface, NoCandidate> {
    if surfaces.is_empty() {
        return Err(NoCandidate::NoSurfaces);
    }

    let mut best: Option<&Surface> = None;
    for surface in surfaces.iter().filter(|s| is_eligible(s, viewport, min_size)) {
        match best {
            Some(current) if surface.rect.area() <= current.rect.area() => {}
            _ => best = Some(surface),
        }
    }

    best.ok_or(NoCandidate::NoneSuitable)
}

fn is_eligible(surface: &Surface, viewport: &Viewport, min_size: f64) -> bool {
    surface.rect.width > min_size && surface.rect.height > min_size && viewport.intersects(&surface.rect)
}

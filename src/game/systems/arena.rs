//! Map geometry
//!
//! Boundary tests, border distances and random placement for both map
//! shapes. Coordinates run from (0, 0) to (width, height); the circular map
//! is the disc inscribed in that box.

use rand::Rng;

use crate::config::{MapConfig, MapShape};
use crate::util::vec2::Vec2;

/// Map center
pub fn center(map: &MapConfig) -> Vec2 {
    Vec2::new(map.width * 0.5, map.height * 0.5)
}

/// Radius of the circular map
pub fn disc_radius(map: &MapConfig) -> f32 {
    map.width.min(map.height) * 0.5
}

/// Distance from `position` to the nearest border. Negative when outside.
pub fn border_distance(map: &MapConfig, position: Vec2) -> f32 {
    match map.shape {
        MapShape::Rectangle => {
            let dx = position.x.min(map.width - position.x);
            let dy = position.y.min(map.height - position.y);
            dx.min(dy)
        }
        MapShape::Circle => disc_radius(map) - position.distance_to(center(map)),
    }
}

/// Inside the playable area (on the border counts as inside)
pub fn contains(map: &MapConfig, position: Vec2) -> bool {
    position.is_finite() && border_distance(map, position) >= 0.0
}

/// Whether any point lies at least `margin` from the border
pub fn has_area(map: &MapConfig, margin: f32) -> bool {
    let extent = match map.shape {
        MapShape::Rectangle => map.width.min(map.height) * 0.5,
        MapShape::Circle => disc_radius(map),
    };
    extent.is_finite() && extent > margin.max(0.0)
}

/// Pull `position` back so it sits at least `margin` inside the border
pub fn clamp_inside(map: &MapConfig, position: Vec2, margin: f32) -> Vec2 {
    match map.shape {
        MapShape::Rectangle => Vec2::new(
            position.x.clamp(margin.min(map.width * 0.5), (map.width - margin).max(map.width * 0.5)),
            position.y.clamp(margin.min(map.height * 0.5), (map.height - margin).max(map.height * 0.5)),
        ),
        MapShape::Circle => {
            let c = center(map);
            let max_r = (disc_radius(map) - margin).max(0.0);
            let offset = position - c;
            if offset.length() <= max_r {
                position
            } else {
                c + offset.normalize() * max_r
            }
        }
    }
}

/// Uniform random point at least `margin` from the border
pub fn random_point<R: Rng + ?Sized>(map: &MapConfig, margin: f32, rng: &mut R) -> Option<Vec2> {
    if !has_area(map, margin) {
        return None;
    }

    let point = match map.shape {
        MapShape::Rectangle => Vec2::new(
            rng.gen_range(margin..=(map.width - margin)),
            rng.gen_range(margin..=(map.height - margin)),
        ),
        MapShape::Circle => {
            let max_r = disc_radius(map) - margin;
            // sqrt keeps the density uniform over the disc
            let r = max_r * rng.gen::<f32>().sqrt();
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            center(map) + Vec2::from_angle(angle) * r
        }
    };
    Some(point)
}

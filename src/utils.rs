use std::cmp::Ordering;

use crate::body::Body;
use ultraviolet::Vec2;

/// Generates `n` bodies distributed in a uniform disc, suitable for a galaxy simulation.
/// - Creates a massive central body.
/// - Places other bodies in random circular orbits around the center.
/// - Assigns velocities to ensure stable orbits based on accumulated mass.
///
/// The same `seed` always produces the same bodies.
pub fn uniform_disc(n: usize, seed: u64) -> Vec<Body> {
    if n == 0 {
        return Vec::new();
    }

    let mut rng = fastrand::Rng::with_seed(seed);
    let inner_radius = 25.0;
    let outer_radius = (n as f32).sqrt() * 5.0;

    let mut bodies: Vec<Body> = Vec::with_capacity(n);

    // Create a massive central black hole / star
    let m = 1e6;
    let center = Body::new(Vec2::zero(), Vec2::zero(), m, inner_radius);
    bodies.push(center);

    while bodies.len() < n {
        let a = rng.f32() * std::f32::consts::TAU;
        let (sin, cos) = a.sin_cos();

        // Random radius with uniform area distribution
        let t = inner_radius / outer_radius;
        let r = rng.f32() * (1.0 - t * t) + t * t;
        let pos = Vec2::new(cos, sin) * outer_radius * r.sqrt();

        // Initial perpendicular velocity direction
        let vel = Vec2::new(sin, -cos);
        let mass = 1.0f32;
        let radius = mass.cbrt();

        bodies.push(Body::new(pos, vel, mass, radius));
    }

    // Sort bodies by distance from center (closest first)
    bodies.sort_by(|a, b| a.pos.mag_sq().total_cmp(&b.pos.mag_sq()));

    // Calculate orbital velocities
    let mut mass = 0.0;
    for body in &mut bodies {
        mass += body.mass;
        if body.pos == Vec2::zero() {
            continue;
        }

        // Velocity for circular orbit: v = sqrt(GM / r), G = 1
        let v = (mass / body.pos.mag()).sqrt();
        body.vel *= v;
    }

    bodies
}

/// Runs shorter than this are insertion sorted.
const INSERTION_SORT_THRESHOLD: usize = 16;

/// Stable merge sort that uses `scratch` instead of allocating.
///
/// # Panics
/// If `scratch` is shorter than `items`.
pub fn stable_sort_by<T, F>(items: &mut [T], scratch: &mut [T], mut compare: F)
where
    T: Copy,
    F: FnMut(&T, &T) -> Ordering,
{
    assert!(scratch.len() >= items.len(), "sort scratch too small");
    merge_sort(items, scratch, &mut compare);
}

fn merge_sort<T: Copy, F: FnMut(&T, &T) -> Ordering>(items: &mut [T], scratch: &mut [T], compare: &mut F) {
    let len = items.len();
    if len <= INSERTION_SORT_THRESHOLD {
        insertion_sort(items, compare);
        return;
    }

    let mid = len / 2;
    merge_sort(&mut items[..mid], scratch, compare);
    merge_sort(&mut items[mid..], scratch, compare);

    // Already ordered across the seam
    if compare(&items[mid - 1], &items[mid]) != Ordering::Greater {
        return;
    }

    let (mut left, mut right, mut out) = (0, mid, 0);
    while left < mid && right < len {
        // Taking from the left on ties keeps the sort stable.
        if compare(&items[right], &items[left]) == Ordering::Less {
            scratch[out] = items[right];
            right += 1;
        } else {
            scratch[out] = items[left];
            left += 1;
        }
        out += 1;
    }

    // Leftover right elements are already in their final place.
    let rest = mid - left;
    scratch[out..out + rest].copy_from_slice(&items[left..mid]);
    out += rest;

    items[..out].copy_from_slice(&scratch[..out]);
}

fn insertion_sort<T, F: FnMut(&T, &T) -> Ordering>(items: &mut [T], compare: &mut F) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && compare(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_disc_is_deterministic() {
        let a = uniform_disc(200, 7);
        let b = uniform_disc(200, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);
        assert_eq!(a[0].mass, 1e6);
        assert_eq!(a[0].pos, Vec2::zero());
    }

    #[test]
    fn test_uniform_disc_bounds() {
        let n = 400;
        let outer = (n as f32).sqrt() * 5.0;
        for body in &uniform_disc(n, 0)[1..] {
            let r = body.pos.mag();
            assert!(r >= 25.0 - 1e-3 && r <= outer + 1e-3);
            // Orbits are tangential.
            assert!(body.pos.dot(body.vel).abs() < 1e-2 * r * body.vel.mag());
        }
    }

    #[test]
    fn test_uniform_disc_empty() {
        assert!(uniform_disc(0, 0).is_empty());
    }

    #[test]
    fn test_stable_sort_orders_and_keeps_ties() {
        let mut items: Vec<(u32, usize)> = (0..200).map(|i| ((i * 37 % 11) as u32, i)).collect();
        let mut scratch = vec![(0, 0); items.len()];
        stable_sort_by(&mut items, &mut scratch, |a, b| a.0.cmp(&b.0));

        for w in items.windows(2) {
            assert!(w[0].0 < w[1].0 || (w[0].0 == w[1].0 && w[0].1 < w[1].1));
        }
    }

    #[test]
    fn test_stable_sort_short_and_sorted_inputs() {
        let mut scratch = [0u32; 64];
        let mut short = [3u32, 1, 2];
        stable_sort_by(&mut short, &mut scratch, |a, b| a.cmp(b));
        assert_eq!(short, [1, 2, 3]);

        let mut sorted: Vec<u32> = (0..64).collect();
        stable_sort_by(&mut sorted, &mut scratch, |a, b| a.cmp(b));
        assert_eq!(sorted, (0..64).collect::<Vec<_>>());
    }

    #[test]
    #[should_panic(expected = "sort scratch too small")]
    fn test_stable_sort_rejects_small_scratch() {
        let mut items = [2u8, 1];
        stable_sort_by(&mut items, &mut [], |a, b| a.cmp(b));
    }
}

//! Broad phase (sweep and prune over cached AABBs) and narrow phase
//! (time-of-impact elastic response) for circular bodies.

use crate::{
    body::Body,
    error::{Result, reserve},
    utils,
};
use ultraviolet::Vec2;

/// Axis-aligned bounding box.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn around(pos: Vec2, radius: f32) -> Self {
        let r = Vec2::broadcast(radius);
        Self {
            min: pos - r,
            max: pos + r,
        }
    }

    /// Closed-interval overlap on both axes.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.max.x < other.min.x
            || other.max.x < self.min.x
            || self.max.y < other.min.y
            || other.max.y < self.min.y)
    }
}

/// Per-tick AABB cache plus the reusable buffers for sweep and prune.
#[derive(Debug, Default, Clone)]
pub struct CollisionIndex {
    /// AABB of body `i` as of the last [`CollisionIndex::update`].
    pub rects: Vec<Aabb>,
    /// Body indices ordered by AABB min-x.
    indices: Vec<usize>,
    /// Merge buffer for the stable sort, never shrunk.
    scratch: Vec<usize>,
}

impl CollisionIndex {
    pub fn with_capacity(n: usize) -> Result<Self> {
        let mut index = Self::default();
        reserve(&mut index.rects, n, "collision rects")?;
        reserve(&mut index.indices, n, "collision indices")?;
        index.grow_scratch(n)?;
        Ok(index)
    }

    fn grow_scratch(&mut self, n: usize) -> Result<()> {
        if self.scratch.len() < n {
            let extra = n - self.scratch.len();
            reserve(&mut self.scratch, extra, "collision sort scratch")?;
            self.scratch.resize(n, 0);
        }
        Ok(())
    }

    /// Rebuilds the AABB cache from `bodies` and sorts the permutation by min-x.
    pub fn update(&mut self, bodies: &[Body]) -> Result<()> {
        let n = bodies.len();
        self.rects.clear();
        reserve(&mut self.rects, n, "collision rects")?;
        self.indices.clear();
        reserve(&mut self.indices, n, "collision indices")?;
        self.grow_scratch(n)?;

        self.rects
            .extend(bodies.iter().map(|body| Aabb::around(body.pos, body.radius)));
        self.indices.extend(0..n);

        let Self {
            rects,
            indices,
            scratch,
        } = self;
        utils::stable_sort_by(indices, &mut scratch[..n], |&a, &b| {
            rects[a].min.x.total_cmp(&rects[b].min.x)
        });
        Ok(())
    }

    /// Body indices in sweep order.
    pub fn order(&self) -> &[usize] {
        &self.indices
    }

    /// Calls `f(i, j)` once for every pair of bodies whose AABBs overlap.
    pub fn sweep(&self, mut f: impl FnMut(usize, usize)) {
        for (current, &i) in self.indices.iter().enumerate() {
            let a = &self.rects[i];
            for &j in &self.indices[current + 1..] {
                let b = &self.rects[j];

                // Everything further along starts even further right.
                if a.max.x < b.min.x {
                    break;
                }
                if a.max.y < b.min.y || b.max.y < a.min.y {
                    continue;
                }
                f(i, j);
            }
        }
    }

    /// All overlapping pairs as `(low, high)` index tuples, sorted.
    pub fn candidates(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        self.sweep(|i, j| pairs.push((i.min(j), i.max(j))));
        pairs.sort_unstable();
        pairs
    }
}

/// Resolves a potential collision between bodies `i` and `j`.
///
/// Returns `true` when the circles actually overlap. Separating or resting
/// pairs are pushed apart along the contact normal, weighted by inverse mass.
/// Approaching pairs are rewound to the moment of contact, receive a normal
/// impulse and are advanced again by the same time.
pub fn resolve(bodies: &mut [Body], i: usize, j: usize) -> bool {
    let b1 = bodies[i];
    let b2 = bodies[j];

    let d = b2.pos - b1.pos;
    let r = b1.radius + b2.radius;

    if d.mag_sq() >= r * r {
        return false;
    }

    let v1 = b1.vel;
    let v2 = b2.vel;
    let v = v2 - v1;

    let d_dot_v = d.dot(v);

    let m1 = b1.mass;
    let m2 = b2.mass;
    let total = m1 + m2;
    if !(total > 0.0) {
        return true;
    }

    let weight1 = m2 / total;
    let weight2 = m1 / total;

    // Moving apart or at rest: separate without an impulse
    if d_dot_v >= 0.0 && d != Vec2::zero() {
        let tmp = d * (r / d.mag() - 1.0);
        bodies[i].pos -= tmp * weight1;
        bodies[j].pos += tmp * weight2;
        return true;
    }

    let v_sq = v.mag_sq();
    if v_sq == 0.0 {
        // Coincident and at rest; there is no normal to act along.
        return true;
    }

    let d_sq = d.mag_sq();
    let r_sq = r * r;

    // Time since first contact: |d - v t|² = r²
    let t = (d_dot_v + (d_dot_v * d_dot_v - v_sq * (d_sq - r_sq)).max(0.0).sqrt()) / v_sq;

    // Rewind positions
    let p1 = b1.pos - v1 * t;
    let p2 = b2.pos - v2 * t;

    let d = p2 - p1;
    let d_dot_v = d.dot(v);
    let d_sq = d.mag_sq();

    let tmp = d * (1.5 * d_dot_v / d_sq);
    let v1 = v1 + tmp * weight1;
    let v2 = v2 - tmp * weight2;

    bodies[i].vel = v1;
    bodies[j].vel = v2;
    // Fast-forward positions after collision response
    bodies[i].pos = p1 + v1 * t;
    bodies[j].pos = p2 + v2 * t;
    true
}

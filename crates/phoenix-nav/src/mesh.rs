//! Half-edge triangle mesh over fixed-capacity arrays.
//!
//! Topology invariants, maintained by every operation here:
//!
//! - every alive face is a CCW triangle (`orient(A, B, C) > 0`);
//! - ring closure: `next(next(next(e))) == e` within a face;
//! - twin reflexivity: `twin(twin(e)) == e` whenever both are set;
//! - a half-edge is alive iff its `face` is valid; a face is alive iff its
//!   `half_edge` anchor is valid.
//!
//! Geometric predicates are exact integer arithmetic on raw Q12
//! coordinates (`i128` where squares of differences appear), so
//! co-circular and collinear cases resolve identically on every machine.

use serde::{Deserialize, Serialize};
use tracing::warn;

use phoenix_core::containers::FixedVec;
use phoenix_fixed::{Distance, Vec2};

use crate::MeshError;

/// Index into the mesh's vertex/edge/face arrays.
pub type MeshIndex = u16;

/// Reserved "no element" index.
pub const INVALID_INDEX: MeshIndex = u16::MAX;

// ---------------------------------------------------------------------------
// Exact predicates
// ---------------------------------------------------------------------------

/// Twice the signed area of triangle `(a, b, p)` in raw Q24.
/// Positive when `p` lies to the left of `a -> b` (CCW).
pub fn orient(a: Vec2, b: Vec2, p: Vec2) -> i128 {
    let abx = b.x.to_bits() as i128 - a.x.to_bits() as i128;
    let aby = b.y.to_bits() as i128 - a.y.to_bits() as i128;
    let apx = p.x.to_bits() as i128 - a.x.to_bits() as i128;
    let apy = p.y.to_bits() as i128 - a.y.to_bits() as i128;
    abx * apy - aby * apx
}

/// In-circle determinant for the CCW triangle `(a, b, c)`:
/// positive iff `p` lies strictly inside the circumcircle.
pub fn in_circle(a: Vec2, b: Vec2, c: Vec2, p: Vec2) -> i128 {
    let ax = a.x.to_bits() as i128 - p.x.to_bits() as i128;
    let ay = a.y.to_bits() as i128 - p.y.to_bits() as i128;
    let bx = b.x.to_bits() as i128 - p.x.to_bits() as i128;
    let by = b.y.to_bits() as i128 - p.y.to_bits() as i128;
    let cx = c.x.to_bits() as i128 - p.x.to_bits() as i128;
    let cy = c.y.to_bits() as i128 - p.y.to_bits() as i128;

    let a2 = ax * ax + ay * ay;
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;

    ax * (by * c2 - cy * b2) - ay * (bx * c2 - cx * b2) + a2 * (bx * cy - cx * by)
}

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

/// Directed edge `vert_a -> vert_b` with CCW ring and twin links.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HalfEdge {
    pub vert_a: MeshIndex,
    pub vert_b: MeshIndex,
    /// The opposite half-edge; [`INVALID_INDEX`] on the mesh border.
    pub twin: MeshIndex,
    /// The next half-edge CCW around the owning face.
    pub next: MeshIndex,
    /// The owning face; [`INVALID_INDEX`] marks a free slot.
    pub face: MeshIndex,
    /// Constrained edges survive Delaunay flips.
    pub locked: bool,
}

impl Default for HalfEdge {
    fn default() -> Self {
        Self {
            vert_a: INVALID_INDEX,
            vert_b: INVALID_INDEX,
            twin: INVALID_INDEX,
            next: INVALID_INDEX,
            face: INVALID_INDEX,
            locked: false,
        }
    }
}

/// A triangle: its half-edge anchor plus user data.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Face {
    pub half_edge: MeshIndex,
    pub data: u32,
}

impl Default for Face {
    fn default() -> Self {
        Self {
            half_edge: INVALID_INDEX,
            data: 0,
        }
    }
}

/// Where a point landed relative to a face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointInFace {
    Outside,
    Inside,
    /// On this boundary half-edge (between its endpoints).
    OnEdge(MeshIndex),
}

// ---------------------------------------------------------------------------
// CdtMesh
// ---------------------------------------------------------------------------

/// Fixed-capacity constrained-Delaunay half-edge mesh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CdtMesh {
    pub(crate) vertices: FixedVec<Vec2>,
    pub(crate) half_edges: FixedVec<HalfEdge>,
    pub(crate) faces: FixedVec<Face>,
    /// Points closer than this to an existing vertex snap onto it.
    pub snap_threshold: Distance,
}

impl CdtMesh {
    /// Storage for up to `max_faces` triangles.
    pub fn with_capacity(max_faces: usize) -> Self {
        Self {
            vertices: FixedVec::with_capacity(max_faces * 3),
            half_edges: FixedVec::with_capacity(max_faces * 3),
            faces: FixedVec::with_capacity(max_faces),
            snap_threshold: Distance::from_f64(0.5),
        }
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.half_edges.clear();
        self.faces.clear();
    }

    // -- element access -----------------------------------------------------

    #[inline]
    pub fn vertex(&self, index: MeshIndex) -> Option<Vec2> {
        self.vertices.get(index as usize).copied()
    }

    #[inline]
    pub fn half_edge(&self, index: MeshIndex) -> Option<&HalfEdge> {
        self.half_edges.get(index as usize)
    }

    #[inline]
    pub fn face(&self, index: MeshIndex) -> Option<&Face> {
        self.faces.get(index as usize)
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Length of the face array (alive and free slots both).
    #[inline]
    pub fn faces_len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_face_alive(&self, index: MeshIndex) -> bool {
        self.face(index)
            .map(|f| f.half_edge != INVALID_INDEX)
            .unwrap_or(false)
    }

    pub fn is_edge_alive(&self, index: MeshIndex) -> bool {
        self.half_edge(index)
            .map(|e| e.face != INVALID_INDEX)
            .unwrap_or(false)
    }

    /// Count of alive faces.
    pub fn num_alive_faces(&self) -> usize {
        self.faces
            .iter()
            .filter(|f| f.half_edge != INVALID_INDEX)
            .count()
    }

    /// Iterate alive face indices.
    pub fn alive_faces(&self) -> impl Iterator<Item = MeshIndex> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.half_edge != INVALID_INDEX)
            .map(|(i, _)| i as MeshIndex)
    }

    /// The three half-edges of an alive face, in ring order.
    pub fn face_edges(&self, face: MeshIndex) -> Option<[MeshIndex; 3]> {
        let f = self.face(face)?;
        if f.half_edge == INVALID_INDEX {
            return None;
        }
        let e0 = f.half_edge;
        let e1 = self.half_edge(e0)?.next;
        let e2 = self.half_edge(e1)?.next;
        Some([e0, e1, e2])
    }

    /// The three vertices of an alive face, in CCW order.
    pub fn face_vertices(&self, face: MeshIndex) -> Option<[MeshIndex; 3]> {
        let [e0, e1, e2] = self.face_edges(face)?;
        Some([
            self.half_edge(e0)?.vert_a,
            self.half_edge(e1)?.vert_a,
            self.half_edge(e2)?.vert_a,
        ])
    }

    /// Arithmetic centroid of a face.
    pub fn face_centroid(&self, face: MeshIndex) -> Option<Vec2> {
        let [a, b, c] = self.face_vertices(face)?;
        let (a, b, c) = (self.vertex(a)?, self.vertex(b)?, self.vertex(c)?);
        let x = (a.x.to_bits() as i64 + b.x.to_bits() as i64 + c.x.to_bits() as i64) / 3;
        let y = (a.y.to_bits() as i64 + b.y.to_bits() as i64 + c.y.to_bits() as i64) / 3;
        Some(Vec2::from_bits(x as i32, y as i32))
    }

    // -- vertex / edge / face insertion -------------------------------------

    /// Find the vertex within the snap threshold of `v`, if any.
    pub fn find_vertex(&self, v: Vec2) -> Option<MeshIndex> {
        self.vertices
            .iter()
            .position(|&existing| Vec2::approx_eq(v, existing, self.snap_threshold))
            .map(|i| i as MeshIndex)
    }

    /// Insert a vertex, snapping to an existing one within the threshold.
    /// Returns [`INVALID_INDEX`] when the vertex pool is exhausted.
    pub fn insert_vertex(&mut self, v: Vec2) -> MeshIndex {
        if let Some(existing) = self.find_vertex(v) {
            return existing;
        }
        if !self.vertices.push(v) {
            warn!("nav mesh vertex pool exhausted");
            return INVALID_INDEX;
        }
        (self.vertices.len() - 1) as MeshIndex
    }

    fn alloc_half_edge(&mut self) -> MeshIndex {
        if let Some(free) = self
            .half_edges
            .iter()
            .position(|e| e.face == INVALID_INDEX)
        {
            return free as MeshIndex;
        }
        if !self.half_edges.push(HalfEdge::default()) {
            return INVALID_INDEX;
        }
        (self.half_edges.len() - 1) as MeshIndex
    }

    fn alloc_face(&mut self) -> MeshIndex {
        if let Some(free) = self.faces.iter().position(|f| f.half_edge == INVALID_INDEX) {
            return free as MeshIndex;
        }
        if !self.faces.push(Face::default()) {
            return INVALID_INDEX;
        }
        (self.faces.len() - 1) as MeshIndex
    }

    /// The alive half-edge `v0 -> v1`, if present.
    pub fn find_half_edge(&self, v0: MeshIndex, v1: MeshIndex) -> Option<MeshIndex> {
        self.half_edges
            .iter()
            .position(|e| e.face != INVALID_INDEX && e.vert_a == v0 && e.vert_b == v1)
            .map(|i| i as MeshIndex)
    }

    /// Both directed half-edges between `v0` and `v1`.
    pub fn find_edge(&self, v0: MeshIndex, v1: MeshIndex) -> (Option<MeshIndex>, Option<MeshIndex>) {
        (self.find_half_edge(v0, v1), self.find_half_edge(v1, v0))
    }

    /// Insert the triangle `(v0, v1, v2)`, which must already be CCW.
    ///
    /// Twins are linked against existing reverse edges. A reverse edge that
    /// already has a different twin means the input was non-manifold; the
    /// insertion is rolled back.
    pub fn insert_face(
        &mut self,
        v0: MeshIndex,
        v1: MeshIndex,
        v2: MeshIndex,
        data: u32,
    ) -> Result<MeshIndex, MeshError> {
        let (a, b, c) = (
            self.vertex(v0).ok_or(MeshError::InvalidIndex)?,
            self.vertex(v1).ok_or(MeshError::InvalidIndex)?,
            self.vertex(v2).ok_or(MeshError::InvalidIndex)?,
        );
        if orient(a, b, c) <= 0 {
            return Err(MeshError::NotCounterClockwise);
        }

        let face = self.alloc_face();
        if face == INVALID_INDEX {
            return Err(MeshError::Full);
        }
        // Keep the face slot reserved while edges allocate.
        self.faces[face as usize] = Face {
            half_edge: 0,
            data,
        };

        let edges = [
            self.insert_half_edge(v0, v1, face),
            self.insert_half_edge(v1, v2, face),
            self.insert_half_edge(v2, v0, face),
        ];
        if edges.iter().any(|&e| e == INVALID_INDEX) {
            for &e in &edges {
                if e != INVALID_INDEX {
                    self.half_edges[e as usize] = HalfEdge::default();
                }
            }
            self.faces[face as usize] = Face::default();
            return Err(MeshError::Full);
        }

        self.faces[face as usize].half_edge = edges[0];
        self.half_edges[edges[0] as usize].next = edges[1];
        self.half_edges[edges[1] as usize].next = edges[2];
        self.half_edges[edges[2] as usize].next = edges[0];

        // Twin linkage, refusing to steal an existing pairing.
        for &e in &edges {
            let (va, vb) = {
                let edge = &self.half_edges[e as usize];
                (edge.vert_a, edge.vert_b)
            };
            if let Some(reverse) = self.find_half_edge(vb, va) {
                let reverse_twin = self.half_edges[reverse as usize].twin;
                if reverse_twin != INVALID_INDEX && reverse_twin != e {
                    // Roll the whole face back.
                    self.rollback_face(face, &edges);
                    return Err(MeshError::NonManifoldEdge);
                }
                self.half_edges[reverse as usize].twin = e;
                self.half_edges[e as usize].twin = reverse;
            }
        }

        Ok(face)
    }

    /// Insert a triangle winding it CCW as needed.
    pub fn insert_face_auto(
        &mut self,
        v0: MeshIndex,
        v1: MeshIndex,
        v2: MeshIndex,
        data: u32,
    ) -> Result<MeshIndex, MeshError> {
        let (a, b, c) = (
            self.vertex(v0).ok_or(MeshError::InvalidIndex)?,
            self.vertex(v1).ok_or(MeshError::InvalidIndex)?,
            self.vertex(v2).ok_or(MeshError::InvalidIndex)?,
        );
        let o = orient(a, b, c);
        if o == 0 {
            return Err(MeshError::NotCounterClockwise);
        }
        if o > 0 {
            self.insert_face(v0, v1, v2, data)
        } else {
            self.insert_face(v0, v2, v1, data)
        }
    }

    fn insert_half_edge(&mut self, va: MeshIndex, vb: MeshIndex, face: MeshIndex) -> MeshIndex {
        let e = self.alloc_half_edge();
        if e == INVALID_INDEX {
            warn!("nav mesh half-edge pool exhausted");
            return INVALID_INDEX;
        }
        self.half_edges[e as usize] = HalfEdge {
            vert_a: va,
            vert_b: vb,
            twin: INVALID_INDEX,
            next: INVALID_INDEX,
            face,
            locked: false,
        };
        e
    }

    fn rollback_face(&mut self, face: MeshIndex, edges: &[MeshIndex; 3]) {
        for &e in edges {
            let twin = self.half_edges[e as usize].twin;
            if twin != INVALID_INDEX && self.half_edges[twin as usize].twin == e {
                self.half_edges[twin as usize].twin = INVALID_INDEX;
            }
            self.half_edges[e as usize] = HalfEdge::default();
        }
        self.faces[face as usize] = Face::default();
    }

    /// Remove a face: its edges become free slots and their twins are
    /// unlinked.
    pub fn remove_face(&mut self, face: MeshIndex) {
        let Some(edges) = self.face_edges(face) else {
            return;
        };
        for e in edges {
            let twin = self.half_edges[e as usize].twin;
            if twin != INVALID_INDEX {
                self.half_edges[twin as usize].twin = INVALID_INDEX;
            }
            self.half_edges[e as usize] = HalfEdge::default();
        }
        self.faces[face as usize].half_edge = INVALID_INDEX;
    }

    // -- point location -----------------------------------------------------

    /// Classify `p` against one face.
    pub fn point_in_face(&self, face: MeshIndex, p: Vec2) -> PointInFace {
        let Some(edges) = self.face_edges(face) else {
            return PointInFace::Outside;
        };
        let mut on_edge = None;
        for e in edges {
            let edge = self.half_edges[e as usize];
            let (a, b) = (
                self.vertices[edge.vert_a as usize],
                self.vertices[edge.vert_b as usize],
            );
            let o = orient(a, b, p);
            if o < 0 {
                return PointInFace::Outside;
            }
            if o == 0 {
                on_edge = Some(e);
            }
        }
        match on_edge {
            Some(e) => PointInFace::OnEdge(e),
            None => PointInFace::Inside,
        }
    }

    /// Find the alive face containing `p` (linear scan; meshes are small).
    pub fn locate(&self, p: Vec2) -> Option<(MeshIndex, PointInFace)> {
        for face in self.alive_faces() {
            match self.point_in_face(face, p) {
                PointInFace::Outside => continue,
                hit => return Some((face, hit)),
            }
        }
        None
    }

    // -- topology checks (used by tests and debug assertions) ---------------

    /// Verify twin reflexivity, ring closure, and CCW orientation for every
    /// alive element. Returns the first violation found.
    pub fn validate(&self) -> Result<(), MeshError> {
        for (i, edge) in self.half_edges.iter().enumerate() {
            if edge.face == INVALID_INDEX {
                continue;
            }
            if edge.twin != INVALID_INDEX {
                let twin = self
                    .half_edge(edge.twin)
                    .ok_or(MeshError::InvalidIndex)?;
                if twin.twin != i as MeshIndex {
                    return Err(MeshError::BrokenTwin);
                }
                if twin.vert_a != edge.vert_b || twin.vert_b != edge.vert_a {
                    return Err(MeshError::BrokenTwin);
                }
            }
        }
        for face in self.alive_faces() {
            let [e0, e1, e2] = self.face_edges(face).ok_or(MeshError::InvalidIndex)?;
            let ring = [e0, e1, e2];
            for (i, &e) in ring.iter().enumerate() {
                let edge = self.half_edges[e as usize];
                if edge.face != face {
                    return Err(MeshError::BrokenRing);
                }
                let next = self.half_edges[ring[(i + 1) % 3] as usize];
                if edge.vert_b != next.vert_a {
                    return Err(MeshError::BrokenRing);
                }
            }
            if self.half_edges[self.half_edges[self.half_edges[e0 as usize].next as usize].next
                as usize]
                .next
                != e0
            {
                return Err(MeshError::BrokenRing);
            }
            let [a, b, c] = self.face_vertices(face).ok_or(MeshError::InvalidIndex)?;
            if orient(
                self.vertices[a as usize],
                self.vertices[b as usize],
                self.vertices[c as usize],
            ) <= 0
            {
                return Err(MeshError::NotCounterClockwise);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64) -> Vec2 {
        Vec2::from_f64(x, y)
    }

    #[test]
    fn orient_signs() {
        assert!(orient(v(0.0, 0.0), v(10.0, 0.0), v(5.0, 5.0)) > 0);
        assert!(orient(v(0.0, 0.0), v(10.0, 0.0), v(5.0, -5.0)) < 0);
        assert_eq!(orient(v(0.0, 0.0), v(10.0, 0.0), v(5.0, 0.0)), 0);
    }

    #[test]
    fn in_circle_signs() {
        let (a, b, c) = (v(0.0, 0.0), v(10.0, 0.0), v(5.0, 10.0));
        assert!(in_circle(a, b, c, v(5.0, 3.0)) > 0, "interior point");
        assert!(in_circle(a, b, c, v(50.0, 50.0)) < 0, "distant point");
        // A triangle vertex is exactly co-circular.
        assert_eq!(in_circle(a, b, c, a), 0);
    }

    #[test]
    fn insert_face_builds_a_valid_triangle() {
        let mut mesh = CdtMesh::with_capacity(16);
        let a = mesh.insert_vertex(v(0.0, 0.0));
        let b = mesh.insert_vertex(v(10.0, 0.0));
        let c = mesh.insert_vertex(v(5.0, 10.0));
        let f = mesh.insert_face(a, b, c, 0).unwrap();
        assert!(mesh.is_face_alive(f));
        assert_eq!(mesh.face_vertices(f), Some([a, b, c]));
        mesh.validate().unwrap();
    }

    #[test]
    fn clockwise_face_is_rejected() {
        let mut mesh = CdtMesh::with_capacity(16);
        let a = mesh.insert_vertex(v(0.0, 0.0));
        let b = mesh.insert_vertex(v(10.0, 0.0));
        let c = mesh.insert_vertex(v(5.0, 10.0));
        assert_eq!(
            mesh.insert_face(a, c, b, 0),
            Err(MeshError::NotCounterClockwise)
        );
        // Auto variant fixes the winding.
        assert!(mesh.insert_face_auto(a, c, b, 0).is_ok());
        mesh.validate().unwrap();
    }

    #[test]
    fn adjacent_faces_link_twins() {
        let mut mesh = CdtMesh::with_capacity(16);
        let a = mesh.insert_vertex(v(0.0, 0.0));
        let b = mesh.insert_vertex(v(10.0, 0.0));
        let c = mesh.insert_vertex(v(10.0, 10.0));
        let d = mesh.insert_vertex(v(0.0, 10.0));
        mesh.insert_face(a, b, c, 0).unwrap();
        mesh.insert_face(a, c, d, 0).unwrap();

        let (e_ac, e_ca) = mesh.find_edge(a, c);
        let e_ac = e_ac.unwrap();
        let e_ca = e_ca.unwrap();
        assert_eq!(mesh.half_edge(e_ac).unwrap().twin, e_ca);
        assert_eq!(mesh.half_edge(e_ca).unwrap().twin, e_ac);
        mesh.validate().unwrap();
    }

    #[test]
    fn vertex_snapping() {
        let mut mesh = CdtMesh::with_capacity(16);
        let a = mesh.insert_vertex(v(0.0, 0.0));
        let a2 = mesh.insert_vertex(v(0.01, 0.01));
        assert_eq!(a, a2);
        let b = mesh.insert_vertex(v(5.0, 5.0));
        assert_ne!(a, b);
        assert_eq!(mesh.num_vertices(), 2);
    }

    #[test]
    fn point_location() {
        let mut mesh = CdtMesh::with_capacity(16);
        let a = mesh.insert_vertex(v(0.0, 0.0));
        let b = mesh.insert_vertex(v(10.0, 0.0));
        let c = mesh.insert_vertex(v(5.0, 10.0));
        let f = mesh.insert_face(a, b, c, 0).unwrap();

        assert_eq!(mesh.point_in_face(f, v(5.0, 3.0)), PointInFace::Inside);
        assert_eq!(mesh.point_in_face(f, v(50.0, 50.0)), PointInFace::Outside);
        match mesh.point_in_face(f, v(5.0, 0.0)) {
            PointInFace::OnEdge(e) => {
                let edge = mesh.half_edge(e).unwrap();
                assert_eq!((edge.vert_a, edge.vert_b), (a, b));
            }
            other => panic!("expected OnEdge, got {other:?}"),
        }

        let (face, hit) = mesh.locate(v(5.0, 3.0)).unwrap();
        assert_eq!(face, f);
        assert_eq!(hit, PointInFace::Inside);
        assert!(mesh.locate(v(-20.0, -20.0)).is_none());
    }

    #[test]
    fn remove_face_frees_slots_and_unlinks_twins() {
        let mut mesh = CdtMesh::with_capacity(16);
        let a = mesh.insert_vertex(v(0.0, 0.0));
        let b = mesh.insert_vertex(v(10.0, 0.0));
        let c = mesh.insert_vertex(v(10.0, 10.0));
        let d = mesh.insert_vertex(v(0.0, 10.0));
        let f0 = mesh.insert_face(a, b, c, 0).unwrap();
        let f1 = mesh.insert_face(a, c, d, 0).unwrap();

        mesh.remove_face(f0);
        assert!(!mesh.is_face_alive(f0));
        assert!(mesh.is_face_alive(f1));
        // The diagonal's surviving half no longer has a twin.
        let (e_ac, e_ca) = mesh.find_edge(a, c);
        assert!(e_ac.is_none());
        assert_eq!(mesh.half_edge(e_ca.unwrap()).unwrap().twin, INVALID_INDEX);
        mesh.validate().unwrap();

        // Freed slots are reused.
        let f2 = mesh.insert_face(a, b, c, 0).unwrap();
        assert_eq!(f2, f0);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn pt(x: i32, y: i32) -> Vec2 {
            Vec2::from_bits(x, y)
        }

        proptest! {
            #[test]
            fn orient_is_antisymmetric(
                ax in -1_000_000i32..1_000_000, ay in -1_000_000i32..1_000_000,
                bx in -1_000_000i32..1_000_000, by in -1_000_000i32..1_000_000,
                px in -1_000_000i32..1_000_000, py in -1_000_000i32..1_000_000,
            ) {
                let (a, b, p) = (pt(ax, ay), pt(bx, by), pt(px, py));
                prop_assert_eq!(orient(a, b, p), -orient(b, a, p));
            }

            #[test]
            fn in_circle_rejects_triangle_vertices(
                ax in -100_000i32..100_000, ay in -100_000i32..100_000,
                bx in -100_000i32..100_000, by in -100_000i32..100_000,
                cx in -100_000i32..100_000, cy in -100_000i32..100_000,
            ) {
                let (a, b, c) = (pt(ax, ay), pt(bx, by), pt(cx, cy));
                prop_assume!(orient(a, b, c) > 0);
                // A circle through three points has those points exactly
                // on it, never strictly inside.
                prop_assert_eq!(in_circle(a, b, c, a), 0);
                prop_assert_eq!(in_circle(a, b, c, b), 0);
                prop_assert_eq!(in_circle(a, b, c, c), 0);
            }

            #[test]
            fn in_circle_is_rotation_invariant(
                ax in -100_000i32..100_000, ay in -100_000i32..100_000,
                bx in -100_000i32..100_000, by in -100_000i32..100_000,
                cx in -100_000i32..100_000, cy in -100_000i32..100_000,
                px in -100_000i32..100_000, py in -100_000i32..100_000,
            ) {
                let (a, b, c, p) = (pt(ax, ay), pt(bx, by), pt(cx, cy), pt(px, py));
                prop_assume!(orient(a, b, c) != 0);
                // Cycling the triangle's vertices preserves the verdict.
                let d1 = in_circle(a, b, c, p);
                let d2 = in_circle(b, c, a, p);
                let d3 = in_circle(c, a, b, p);
                prop_assert_eq!(d1.signum(), d2.signum());
                prop_assert_eq!(d2.signum(), d3.signum());
            }
        }
    }

    #[test]
    fn non_manifold_edge_is_rejected() {
        let mut mesh = CdtMesh::with_capacity(16);
        let a = mesh.insert_vertex(v(0.0, 0.0));
        let b = mesh.insert_vertex(v(10.0, 0.0));
        let c = mesh.insert_vertex(v(5.0, 10.0));
        let d = mesh.insert_vertex(v(5.0, -10.0));
        let e = mesh.insert_vertex(v(15.0, 5.0));
        mesh.insert_face(a, b, c, 0).unwrap();
        mesh.insert_face(b, a, d, 0).unwrap();
        // A third face reusing the a->b direction would need b->a's twin,
        // which is already paired.
        assert_eq!(mesh.insert_face(a, b, e, 0), Err(MeshError::NonManifoldEdge));
        mesh.validate().unwrap();
    }
}

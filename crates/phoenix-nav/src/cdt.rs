//! Incremental constrained-Delaunay construction.
//!
//! [`CdtMesh::insert_point`] locates the containing triangle, splits it (or
//! the containing edge), then restores the empty-circumcircle property by
//! Lawson flipping outward from the new vertex. Locked (constrained) edges
//! are never flipped.
//!
//! [`CdtMesh::insert_edge`] forces a segment into the triangulation: it
//! walks the corridor of triangles the segment crosses, removes them,
//! retriangulates the two pseudo-polygons on either side, and locks both
//! half-edges of the new segment so later flips and constraints respect it.

use phoenix_core::containers::FixedRingQueue;
use phoenix_fixed::Vec2;
use tracing::trace;

use crate::mesh::{orient, in_circle, CdtMesh, MeshIndex, PointInFace, INVALID_INDEX};
use crate::MeshError;

/// Bound on queued edges during one Delaunay repair pass.
const FLIP_QUEUE_CAPACITY: usize = 128;

/// Bound on triangles one constrained segment may cross.
const CORRIDOR_CAPACITY: usize = 64;

impl CdtMesh {
    // -----------------------------------------------------------------------
    // Bounds
    // -----------------------------------------------------------------------

    /// Reset the mesh to a square working area of `half_extent` on each
    /// side of the origin: four corner vertices, two triangles, and a
    /// locked border.
    pub fn init_bounds(&mut self, half_extent: phoenix_fixed::Distance) -> Result<(), MeshError> {
        self.clear();
        let s = half_extent;
        let a = self.insert_vertex(Vec2::new(-s, -s));
        let b = self.insert_vertex(Vec2::new(s, -s));
        let c = self.insert_vertex(Vec2::new(s, s));
        let d = self.insert_vertex(Vec2::new(-s, s));
        if [a, b, c, d].contains(&INVALID_INDEX) {
            return Err(MeshError::Full);
        }
        self.insert_face(a, b, c, 0)?;
        self.insert_face(a, c, d, 0)?;
        for (v0, v1) in [(a, b), (b, c), (c, d), (d, a)] {
            self.lock_edge(v0, v1);
        }
        Ok(())
    }

    /// Mark both half-edges between `v0` and `v1` as constrained.
    pub fn lock_edge(&mut self, v0: MeshIndex, v1: MeshIndex) {
        let (forward, reverse) = self.find_edge(v0, v1);
        if let Some(e) = forward {
            self.half_edges[e as usize].locked = true;
        }
        if let Some(e) = reverse {
            self.half_edges[e as usize].locked = true;
        }
    }

    // -----------------------------------------------------------------------
    // Point insertion
    // -----------------------------------------------------------------------

    /// Insert `p` into the triangulation.
    ///
    /// Snaps to an existing vertex within the threshold. A point outside
    /// every face becomes a dangling vertex (no topology change). Returns
    /// the vertex index.
    pub fn insert_point(&mut self, p: Vec2) -> Result<MeshIndex, MeshError> {
        self.insert_point_with_repair(p, true)
    }

    /// [`insert_point`](Self::insert_point) with the Delaunay repair pass
    /// optionally disabled (debug tooling).
    pub fn insert_point_with_repair(
        &mut self,
        p: Vec2,
        fix_delaunay: bool,
    ) -> Result<MeshIndex, MeshError> {
        if let Some(existing) = self.find_vertex(p) {
            return Ok(existing);
        }

        let located = self.locate(p);
        let vi = self.insert_vertex(p);
        if vi == INVALID_INDEX {
            return Err(MeshError::Full);
        }

        match located {
            None => {
                trace!(vertex = vi, "point outside mesh, dangling vertex");
                return Ok(vi);
            }
            Some((face, PointInFace::Inside)) => {
                self.split_face(face, vi)?;
            }
            Some((_, PointInFace::OnEdge(edge))) => {
                self.split_edge(edge, vi)?;
            }
            Some((_, PointInFace::Outside)) => unreachable!("locate never returns Outside"),
        }

        if fix_delaunay {
            self.fix_delaunay(vi);
        }
        Ok(vi)
    }

    /// Replace `face` with three triangles fanned around `vi` (which must
    /// lie strictly inside).
    pub fn split_face(&mut self, face: MeshIndex, vi: MeshIndex) -> Result<(), MeshError> {
        let [a, b, c] = self.face_vertices(face).ok_or(MeshError::InvalidIndex)?;
        let data = self.faces[face as usize].data;

        // Remember constraints so the sub-edges re-lock.
        let locked = self.face_locked_flags(face);

        self.remove_face(face);
        self.insert_face(vi, a, b, data)?;
        self.insert_face(vi, b, c, data)?;
        self.insert_face(vi, c, a, data)?;

        self.relock(&[(a, b, locked[0]), (b, c, locked[1]), (c, a, locked[2])]);
        Ok(())
    }

    /// Split `edge` (and its twin's face, when present) at `vi`, which lies
    /// on the edge. Constrained edges propagate their lock to both halves.
    pub fn split_edge(&mut self, edge: MeshIndex, vi: MeshIndex) -> Result<(), MeshError> {
        let e = *self.half_edge(edge).ok_or(MeshError::InvalidIndex)?;
        let (u, w) = (e.vert_a, e.vert_b);
        let was_locked = e.locked;

        // Near face: (u, w, x).
        let x = {
            let n = self.half_edge(e.next).ok_or(MeshError::InvalidIndex)?;
            n.vert_b
        };
        let near_face = e.face;
        let near_data = self.faces[near_face as usize].data;
        let near_locked = self.face_locked_flags(near_face);
        let near_verts = self.face_vertices(near_face).ok_or(MeshError::InvalidIndex)?;

        // Far face through the twin: (w, u, y).
        let far = if e.twin != INVALID_INDEX {
            let t = *self.half_edge(e.twin).ok_or(MeshError::InvalidIndex)?;
            let y = self.half_edge(t.next).ok_or(MeshError::InvalidIndex)?.vert_b;
            Some((t.face, self.faces[t.face as usize].data, self.face_locked_flags(t.face), self.face_vertices(t.face).ok_or(MeshError::InvalidIndex)?, y))
        } else {
            None
        };

        self.remove_face(near_face);
        self.insert_face(u, vi, x, near_data)?;
        self.insert_face(vi, w, x, near_data)?;
        // Restore the near face's outer constraints.
        self.relock_ring(near_verts, near_locked);

        if let Some((far_face, far_data, far_locked, far_verts, y)) = far {
            self.remove_face(far_face);
            self.insert_face(w, vi, y, far_data)?;
            self.insert_face(vi, u, y, far_data)?;
            self.relock_ring(far_verts, far_locked);
        }

        if was_locked {
            self.lock_edge(u, vi);
            self.lock_edge(vi, w);
        }
        Ok(())
    }

    /// The locked flags of a face's three ring edges, in ring order.
    fn face_locked_flags(&self, face: MeshIndex) -> [bool; 3] {
        match self.face_edges(face) {
            Some([e0, e1, e2]) => [
                self.half_edges[e0 as usize].locked,
                self.half_edges[e1 as usize].locked,
                self.half_edges[e2 as usize].locked,
            ],
            None => [false; 3],
        }
    }

    fn relock(&mut self, edges: &[(MeshIndex, MeshIndex, bool)]) {
        for &(v0, v1, locked) in edges {
            if locked {
                self.lock_edge(v0, v1);
            }
        }
    }

    fn relock_ring(&mut self, verts: [MeshIndex; 3], locked: [bool; 3]) {
        for i in 0..3 {
            if locked[i] {
                self.lock_edge(verts[i], verts[(i + 1) % 3]);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Delaunay repair
    // -----------------------------------------------------------------------

    /// Lawson flipping outward from `vi`: for every triangle incident to
    /// `vi`, if the vertex across the opposite edge falls inside the
    /// triangle's circumcircle and the edge is not constrained, flip it and
    /// re-examine the two triangles the flip created.
    pub fn fix_delaunay(&mut self, vi: MeshIndex) {
        let mut queue = FixedRingQueue::with_capacity(FLIP_QUEUE_CAPACITY);
        for (i, edge) in self.half_edges.iter().enumerate() {
            if edge.face != INVALID_INDEX && edge.vert_a == vi {
                queue.enqueue(i as MeshIndex);
            }
        }

        while let Some(e0) = queue.dequeue() {
            if !self.is_edge_alive(e0) {
                continue;
            }
            let edge0 = self.half_edges[e0 as usize];
            if edge0.vert_a != vi {
                continue;
            }
            // Face F = (P, A, B) with P = vi; the suspect edge is A-B.
            let e1 = edge0.next;
            let edge1 = self.half_edges[e1 as usize];
            let e2 = edge1.next;

            let t0 = edge1.twin;
            if t0 == INVALID_INDEX {
                continue;
            }
            let twin0 = self.half_edges[t0 as usize];
            if twin0.face == INVALID_INDEX {
                continue;
            }
            if edge1.locked || twin0.locked {
                continue;
            }

            // Opposite triangle TF = (B, A, Q).
            let t1 = twin0.next;
            let twin1 = self.half_edges[t1 as usize];
            let t2 = twin1.next;

            let p = self.vertices[edge0.vert_a as usize];
            let a = self.vertices[edge0.vert_b as usize];
            let b = self.vertices[edge1.vert_b as usize];
            let q = self.vertices[twin1.vert_b as usize];

            if in_circle(p, a, b, q) > 0 {
                self.flip(e0, e1, e2, t0, t1, t2);
                // Both new P-incident triangles need re-checking.
                queue.enqueue(e0);
                queue.enqueue(t0);
            }
        }
    }

    /// Flip the edge shared by faces `F = ring(e0, e1, e2)` and
    /// `TF = ring(t0, t1, t2)` (shared edge `e1`/`t0`), rewiring two faces
    /// and four half-edges so the diagonal connects the opposite vertices.
    fn flip(
        &mut self,
        e0: MeshIndex,
        e1: MeshIndex,
        e2: MeshIndex,
        t0: MeshIndex,
        t1: MeshIndex,
        t2: MeshIndex,
    ) {
        let p = self.half_edges[e0 as usize].vert_a;
        let q = self.half_edges[t1 as usize].vert_b;
        let face = self.half_edges[e0 as usize].face;
        let twin_face = self.half_edges[t0 as usize].face;

        // e1 becomes Q -> P in face F; ring F = (e1, e0, t1).
        {
            let edge1 = &mut self.half_edges[e1 as usize];
            edge1.vert_a = q;
            edge1.vert_b = p;
            edge1.next = e0;
        }
        self.half_edges[e0 as usize].next = t1;
        self.half_edges[t1 as usize].next = e1;
        self.half_edges[t1 as usize].face = face;

        // t0 becomes P -> Q in face TF; ring TF = (t0, t2, e2).
        {
            let twin0 = &mut self.half_edges[t0 as usize];
            twin0.vert_a = p;
            twin0.vert_b = q;
            twin0.next = t2;
        }
        self.half_edges[t2 as usize].next = e2;
        self.half_edges[e2 as usize].next = t0;
        self.half_edges[e2 as usize].face = twin_face;

        // Re-anchor faces whose anchor edge moved across.
        if self.faces[face as usize].half_edge == e2 {
            self.faces[face as usize].half_edge = e0;
        }
        if self.faces[twin_face as usize].half_edge == t1 {
            self.faces[twin_face as usize].half_edge = t0;
        }

        debug_assert!(self.validate().is_ok(), "flip broke mesh invariants");
    }

    // -----------------------------------------------------------------------
    // Constrained edge insertion
    // -----------------------------------------------------------------------

    /// Force the segment `start -> end` into the triangulation as a locked
    /// edge, inserting endpoints as needed.
    pub fn insert_edge(&mut self, start: Vec2, end: Vec2) -> Result<(), MeshError> {
        let v0 = self.insert_point(start)?;
        let v1 = self.insert_point(end)?;
        if v0 == INVALID_INDEX || v1 == INVALID_INDEX {
            return Err(MeshError::Full);
        }
        if v0 == v1 {
            return Err(MeshError::DegenerateEdge);
        }

        // Already connected: just constrain it.
        let (forward, reverse) = self.find_edge(v0, v1);
        if forward.is_some() || reverse.is_some() {
            self.lock_edge(v0, v1);
            return Ok(());
        }

        self.carve_constrained_edge(v0, v1)?;
        self.lock_edge(v0, v1);
        Ok(())
    }

    /// Walk the corridor of triangles crossed by `v0 -> v1`, remove them,
    /// and retriangulate both side polygons against the new segment.
    fn carve_constrained_edge(&mut self, v0: MeshIndex, v1: MeshIndex) -> Result<(), MeshError> {
        let p0 = self.vertices[v0 as usize];
        let p1 = self.vertices[v1 as usize];

        // Find the triangle at v0 whose opposite edge the segment crosses.
        let mut crossed: Option<MeshIndex> = None;
        let mut first_face = INVALID_INDEX;
        for face in self.alive_faces().collect::<Vec<_>>() {
            let Some(edges) = self.face_edges(face) else {
                continue;
            };
            for (i, &e) in edges.iter().enumerate() {
                if self.half_edges[e as usize].vert_a != v0 {
                    continue;
                }
                // Opposite edge is the successor of e in the ring.
                let opp = edges[(i + 1) % 3];
                let oe = self.half_edges[opp as usize];
                let (a, b) = (
                    self.vertices[oe.vert_a as usize],
                    self.vertices[oe.vert_b as usize],
                );
                if segment_crosses(p0, p1, a, b) {
                    crossed = Some(opp);
                    first_face = face;
                    break;
                }
            }
            if crossed.is_some() {
                break;
            }
        }
        let mut crossed_edge = crossed.ok_or(MeshError::NoCorridor)?;

        let mut corridor_faces = Vec::with_capacity(CORRIDOR_CAPACITY);
        corridor_faces.push(first_face);
        let mut left_chain: Vec<MeshIndex> = Vec::with_capacity(CORRIDOR_CAPACITY);
        let mut right_chain: Vec<MeshIndex> = Vec::with_capacity(CORRIDOR_CAPACITY);

        // Classify the first crossed edge's endpoints.
        {
            let oe = self.half_edges[crossed_edge as usize];
            self.classify_vertex(oe.vert_a, p0, p1, &mut left_chain, &mut right_chain)?;
            self.classify_vertex(oe.vert_b, p0, p1, &mut left_chain, &mut right_chain)?;
        }

        loop {
            if corridor_faces.len() >= CORRIDOR_CAPACITY {
                return Err(MeshError::NoCorridor);
            }
            let crossing = self.half_edges[crossed_edge as usize];
            if crossing.locked {
                // The segment would cut another constraint.
                return Err(MeshError::ConstraintConflict);
            }
            let twin = crossing.twin;
            if twin == INVALID_INDEX {
                return Err(MeshError::NoCorridor);
            }
            let entry = self.half_edges[twin as usize];
            let face = entry.face;
            corridor_faces.push(face);

            // Triangle entered through edge (w -> u): far vertex across it.
            let n1 = entry.next;
            let far = self.half_edges[n1 as usize].vert_b;
            if far == v1 {
                break;
            }
            self.classify_vertex(far, p0, p1, &mut left_chain, &mut right_chain)?;

            let far_pos = self.vertices[far as usize];
            let u_pos = self.vertices[entry.vert_b as usize];
            let o_far = orient(p0, p1, far_pos);
            let o_u = orient(p0, p1, u_pos);
            if o_far == 0 {
                // Segment passes through a vertex: topologically ambiguous.
                return Err(MeshError::NoCorridor);
            }
            // The exit edge connects `far` with whichever endpoint is on
            // the other side of the segment.
            crossed_edge = if (o_u > 0) != (o_far > 0) {
                n1
            } else {
                self.half_edges[n1 as usize].next
            };
        }

        // Preserve outer constraints of the corridor boundary: collect the
        // corridor's rim edges that are locked before removal.
        let mut locked_rim: Vec<(MeshIndex, MeshIndex)> = Vec::new();
        for &face in &corridor_faces {
            if let Some(edges) = self.face_edges(face) {
                for e in edges {
                    let edge = self.half_edges[e as usize];
                    if edge.locked {
                        locked_rim.push((edge.vert_a, edge.vert_b));
                    }
                }
            }
        }

        for &face in &corridor_faces {
            self.remove_face(face);
        }

        // Retriangulate each side polygon against the constrained segment.
        self.triangulate_pseudo_polygon(v0, v1, &left_chain)?;
        self.triangulate_pseudo_polygon(v1, v0, &reversed(&right_chain))?;

        for (a, b) in locked_rim {
            self.lock_edge(a, b);
        }
        Ok(())
    }

    fn classify_vertex(
        &self,
        vert: MeshIndex,
        p0: Vec2,
        p1: Vec2,
        left: &mut Vec<MeshIndex>,
        right: &mut Vec<MeshIndex>,
    ) -> Result<(), MeshError> {
        let pos = self.vertices[vert as usize];
        let o = orient(p0, p1, pos);
        if o > 0 {
            if left.last() != Some(&vert) {
                left.push(vert);
            }
        } else if o < 0 {
            if right.last() != Some(&vert) {
                right.push(vert);
            }
        } else {
            return Err(MeshError::NoCorridor);
        }
        Ok(())
    }

    /// Delaunay-aware triangulation of the polygon bounded by the edge
    /// `a -> b` and `chain` (ordered from `a`'s side to `b`'s side, all on
    /// the left of `a -> b`).
    fn triangulate_pseudo_polygon(
        &mut self,
        a: MeshIndex,
        b: MeshIndex,
        chain: &[MeshIndex],
    ) -> Result<(), MeshError> {
        if chain.is_empty() {
            return Ok(());
        }
        // Pick the chain vertex whose circumcircle with (a, b) is empty of
        // the other chain vertices.
        let pa = self.vertices[a as usize];
        let pb = self.vertices[b as usize];
        let mut best = 0;
        for i in 1..chain.len() {
            let pc = self.vertices[chain[best] as usize];
            let pi = self.vertices[chain[i] as usize];
            // Orient the test triangle CCW before the in-circle test.
            let inside = if orient(pa, pb, pc) > 0 {
                in_circle(pa, pb, pc, pi) > 0
            } else {
                in_circle(pb, pa, pc, pi) > 0
            };
            if inside {
                best = i;
            }
        }
        let c = chain[best];
        self.insert_face_auto(a, b, c, 0)?;
        self.triangulate_pseudo_polygon(a, c, &chain[..best])?;
        self.triangulate_pseudo_polygon(c, b, &chain[best + 1..])?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Constraint removal
    // -----------------------------------------------------------------------

    /// Drop every interior constraint (border locks stay) without touching
    /// topology. Paired with a bounds reset this implements "delete edges
    /// and points".
    pub fn unlock_interior(&mut self) {
        for edge in self.half_edges.iter_mut() {
            if edge.face != INVALID_INDEX && edge.twin != INVALID_INDEX {
                edge.locked = false;
            }
        }
    }
}

fn reversed(chain: &[MeshIndex]) -> Vec<MeshIndex> {
    let mut out = chain.to_vec();
    out.reverse();
    out
}

/// Proper crossing of segments `(p0, p1)` and `(a, b)` -- endpoints
/// touching does not count.
fn segment_crosses(p0: Vec2, p1: Vec2, a: Vec2, b: Vec2) -> bool {
    let o1 = orient(p0, p1, a);
    let o2 = orient(p0, p1, b);
    let o3 = orient(a, b, p0);
    let o4 = orient(a, b, p1);
    ((o1 > 0) != (o2 > 0)) && o1 != 0 && o2 != 0 && ((o3 > 0) != (o4 > 0)) && o3 != 0 && o4 != 0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

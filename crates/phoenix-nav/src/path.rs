//! Pathfinding over the navigation mesh.
//!
//! [`PathFinder`] runs A* over face adjacency: neighbors are faces reached
//! through non-locked half-edges with a live twin, and both the cost and
//! the heuristic are centroid distances. The search is resumable one
//! expansion at a time, which the debug tooling uses to visualize the
//! frontier (`path_step`).
//!
//! The crossed half-edges form a portal list; [`funnel`] straightens it
//! into the final polyline. Paths treat the agent as a point -- callers
//! inflate obstacles before insertion if clearance matters.

use serde::{Deserialize, Serialize};

use phoenix_fixed::Vec2;

use crate::mesh::{orient, CdtMesh, MeshIndex, INVALID_INDEX};

// ---------------------------------------------------------------------------
// PathFinder
// ---------------------------------------------------------------------------

/// State of a resumable path search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    InProgress,
    Found,
    Failed,
}

#[derive(Clone, Copy, Debug)]
struct NodeState {
    /// Cost from the start face (raw Q12 distance).
    g: i64,
    /// Face we arrived from.
    prev: MeshIndex,
    /// Half-edge (in `prev`'s ring) crossed to get here.
    via: MeshIndex,
    open: bool,
    closed: bool,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            g: i64::MAX,
            prev: INVALID_INDEX,
            via: INVALID_INDEX,
            open: false,
            closed: false,
        }
    }
}

/// Resumable A* search between two points on the mesh.
#[derive(Clone, Debug)]
pub struct PathFinder {
    start: Vec2,
    goal: Vec2,
    start_face: MeshIndex,
    goal_face: MeshIndex,
    nodes: Vec<NodeState>,
    status: SearchStatus,
    /// Face popped by the most recent step (debug visualization).
    pub last_expanded: MeshIndex,
}

impl PathFinder {
    /// Begin a search. Fails immediately (status `Failed`) when either
    /// endpoint lies outside the mesh.
    pub fn new(mesh: &CdtMesh, start: Vec2, goal: Vec2) -> PathFinder {
        let start_face = mesh.locate(start).map(|(f, _)| f).unwrap_or(INVALID_INDEX);
        let goal_face = mesh.locate(goal).map(|(f, _)| f).unwrap_or(INVALID_INDEX);

        let mut finder = PathFinder {
            start,
            goal,
            start_face,
            goal_face,
            nodes: vec![NodeState::default(); mesh.faces_len()],
            status: SearchStatus::InProgress,
            last_expanded: INVALID_INDEX,
        };

        if start_face == INVALID_INDEX || goal_face == INVALID_INDEX {
            finder.status = SearchStatus::Failed;
            return finder;
        }
        if start_face == goal_face {
            finder.status = SearchStatus::Found;
            return finder;
        }
        finder.nodes[start_face as usize] = NodeState {
            g: 0,
            prev: INVALID_INDEX,
            via: INVALID_INDEX,
            open: true,
            closed: false,
        };
        finder
    }

    #[inline]
    pub fn status(&self) -> SearchStatus {
        self.status
    }

    /// Faces currently on the open frontier (debug visualization).
    pub fn open_faces(&self) -> impl Iterator<Item = MeshIndex> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.open)
            .map(|(i, _)| i as MeshIndex)
    }

    /// Expand the cheapest open face. One call per invocation, so the
    /// search can be single-stepped.
    pub fn step(&mut self, mesh: &CdtMesh) -> SearchStatus {
        if self.status != SearchStatus::InProgress {
            return self.status;
        }

        // Lowest f = g + h, ties broken on the smaller face index so the
        // expansion order is deterministic.
        let mut best: Option<(i64, MeshIndex)> = None;
        for (i, node) in self.nodes.iter().enumerate() {
            if !node.open {
                continue;
            }
            let face = i as MeshIndex;
            let h = self.heuristic(mesh, face);
            let f = node.g.saturating_add(h);
            if best.map(|(bf, _)| f < bf).unwrap_or(true) {
                best = Some((f, face));
            }
        }
        let Some((_, current)) = best else {
            self.status = SearchStatus::Failed;
            return self.status;
        };

        self.nodes[current as usize].open = false;
        self.nodes[current as usize].closed = true;
        self.last_expanded = current;

        if current == self.goal_face {
            self.status = SearchStatus::Found;
            return self.status;
        }

        let Some(edges) = mesh.face_edges(current) else {
            return self.status;
        };
        for e in edges {
            let Some(edge) = mesh.half_edge(e) else {
                continue;
            };
            if edge.locked || edge.twin == INVALID_INDEX {
                continue;
            }
            let Some(twin) = mesh.half_edge(edge.twin) else {
                continue;
            };
            let neighbor = twin.face;
            if neighbor == INVALID_INDEX || self.nodes[neighbor as usize].closed {
                continue;
            }
            let (Some(from), Some(to)) =
                (mesh.face_centroid(current), mesh.face_centroid(neighbor))
            else {
                continue;
            };
            let cost = Vec2::distance(from, to).to_bits() as i64;
            let tentative = self.nodes[current as usize].g.saturating_add(cost);
            let node = &mut self.nodes[neighbor as usize];
            if tentative < node.g {
                node.g = tentative;
                node.prev = current;
                node.via = e;
                node.open = true;
            }
        }
        self.status
    }

    /// Run the search to completion. The iteration bound is defensive; a
    /// search over `n` faces terminates in at most `n` expansions.
    pub fn run(&mut self, mesh: &CdtMesh) -> SearchStatus {
        let limit = self.nodes.len() + 1;
        for _ in 0..limit {
            if self.step(mesh) != SearchStatus::InProgress {
                break;
            }
        }
        if self.status == SearchStatus::InProgress {
            self.status = SearchStatus::Failed;
        }
        self.status
    }

    fn heuristic(&self, mesh: &CdtMesh, face: MeshIndex) -> i64 {
        mesh.face_centroid(face)
            .map(|c| Vec2::distance(c, self.goal).to_bits() as i64)
            .unwrap_or(i64::MAX / 2)
    }

    /// The crossed portals from start to goal: `(left, right)` vertex
    /// positions per crossed half-edge, from the traveler's perspective.
    pub fn portals(&self, mesh: &CdtMesh) -> Option<Vec<(Vec2, Vec2)>> {
        if self.status != SearchStatus::Found {
            return None;
        }
        let mut edges = Vec::new();
        let mut cursor = self.goal_face;
        while cursor != self.start_face {
            let node = self.nodes[cursor as usize];
            if node.via == INVALID_INDEX {
                return None;
            }
            edges.push(node.via);
            cursor = node.prev;
        }
        edges.reverse();

        let mut portals = Vec::with_capacity(edges.len());
        for e in edges {
            let edge = mesh.half_edge(e)?;
            // Crossing a CCW face's edge a -> b outward: b is on the
            // traveler's left, a on the right.
            portals.push((mesh.vertex(edge.vert_b)?, mesh.vertex(edge.vert_a)?));
        }
        Some(portals)
    }

    /// The straightened polyline for a completed search.
    pub fn path(&self, mesh: &CdtMesh) -> Option<Vec<Vec2>> {
        match self.status {
            SearchStatus::Found => {
                if self.start_face == self.goal_face {
                    if same_point(self.start, self.goal) {
                        return Some(vec![self.start]);
                    }
                    return Some(vec![self.start, self.goal]);
                }
                let portals = self.portals(mesh)?;
                Some(funnel(self.start, self.goal, &portals))
            }
            _ => None,
        }
    }
}

/// One-shot search: locate, run, funnel.
pub fn find_path(mesh: &CdtMesh, start: Vec2, goal: Vec2) -> Option<Vec<Vec2>> {
    let mut finder = PathFinder::new(mesh, start, goal);
    finder.run(mesh);
    finder.path(mesh)
}

// ---------------------------------------------------------------------------
// Funnel
// ---------------------------------------------------------------------------

#[inline]
fn same_point(a: Vec2, b: Vec2) -> bool {
    a.x.to_bits() == b.x.to_bits() && a.y.to_bits() == b.y.to_bits()
}

/// Pull the portal list taut: maintain an apex and the funnel's left/right
/// boundaries; when a new portal side crosses the opposite boundary, the
/// boundary vertex becomes a path corner and the funnel restarts there.
pub fn funnel(start: Vec2, goal: Vec2, portals: &[(Vec2, Vec2)]) -> Vec<Vec2> {
    let mut points = vec![start];

    // The goal is the last, degenerate portal.
    let mut list: Vec<(Vec2, Vec2)> = Vec::with_capacity(portals.len() + 1);
    list.extend_from_slice(portals);
    list.push((goal, goal));

    let mut apex = start;
    let mut left = start;
    let mut right = start;
    let mut apex_i = 0usize;
    let mut left_i = 0usize;
    let mut right_i = 0usize;

    let mut i = 0usize;
    while i < list.len() {
        let (portal_left, portal_right) = list[i];

        // Tighten the right boundary: the candidate must not swing the
        // right ray outward (it stays on or left of the current ray) and
        // must stay right of the left ray, or the funnel has closed.
        if orient(apex, right, portal_right) >= 0 {
            if same_point(apex, right) || orient(apex, left, portal_right) < 0 {
                right = portal_right;
                right_i = i;
            } else {
                // Right crossed over left: left vertex is a corner.
                if !same_point(*points.last().expect("non-empty"), left) {
                    points.push(left);
                }
                apex = left;
                apex_i = left_i;
                left = apex;
                right = apex;
                left_i = apex_i;
                right_i = apex_i;
                i = apex_i + 1;
                continue;
            }
        }

        // Tighten the left boundary (mirror image).
        if orient(apex, left, portal_left) <= 0 {
            if same_point(apex, left) || orient(apex, right, portal_left) > 0 {
                left = portal_left;
                left_i = i;
            } else {
                // Left crossed over right: right vertex is a corner.
                if !same_point(*points.last().expect("non-empty"), right) {
                    points.push(right);
                }
                apex = right;
                apex_i = right_i;
                left = apex;
                right = apex;
                left_i = apex_i;
                right_i = apex_i;
                i = apex_i + 1;
                continue;
            }
        }

        i += 1;
    }

    if !same_point(*points.last().expect("non-empty"), goal) {
        points.push(goal);
    }
    points
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use phoenix_fixed::Distance;

    fn v(x: f64, y: f64) -> Vec2 {
        Vec2::from_f64(x, y)
    }

    fn square_mesh(half: f64) -> CdtMesh {
        let mut mesh = CdtMesh::with_capacity(256);
        mesh.init_bounds(Distance::from_f64(half)).unwrap();
        mesh
    }

    #[test]
    fn path_to_self_is_single_point() {
        let mesh = square_mesh(50.0);
        let p = v(5.0, 5.0);
        assert_eq!(find_path(&mesh, p, p), Some(vec![p]));
    }

    #[test]
    fn path_within_one_face_is_straight() {
        let mesh = square_mesh(50.0);
        let path = find_path(&mesh, v(10.0, -20.0), v(30.0, -10.0)).unwrap();
        assert_eq!(path, vec![v(10.0, -20.0), v(30.0, -10.0)]);
    }

    #[test]
    fn path_across_the_diagonal() {
        let mesh = square_mesh(50.0);
        // Opposite corners of the two bound triangles.
        let path = find_path(&mesh, v(20.0, -30.0), v(-30.0, 20.0)).unwrap();
        assert!(path.len() >= 2);
        assert_eq!(path[0], v(20.0, -30.0));
        assert_eq!(*path.last().unwrap(), v(-30.0, 20.0));
    }

    #[test]
    fn open_terrain_path_is_straight_line() {
        // With nothing in the way, the funnel must collapse the portal
        // chain to just [start, goal].
        let mut mesh = square_mesh(50.0);
        for (x, y) in [(0.0, 7.0), (-15.0, -9.0), (12.0, 3.0)] {
            mesh.insert_point(v(x, y)).unwrap();
        }
        let start = v(-40.0, -40.0);
        let goal = v(40.0, 40.5);
        let path = find_path(&mesh, start, goal).unwrap();
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
        // Every interior corner must lie on a mesh vertex; in open terrain
        // a taut path has none beyond slight brushes past vertices.
        for corner in &path[1..path.len() - 1] {
            assert!(
                mesh.find_vertex(*corner).is_some(),
                "corner {corner:?} is not a mesh vertex"
            );
        }
    }

    #[test]
    fn endpoints_outside_mesh_fail() {
        let mesh = square_mesh(50.0);
        assert!(find_path(&mesh, v(500.0, 0.0), v(0.0, 0.0)).is_none());
        assert!(find_path(&mesh, v(0.0, 0.0), v(500.0, 0.0)).is_none());
    }

    #[test]
    fn locked_interior_wall_forces_detour() {
        let mut mesh = square_mesh(50.0);
        // A wall across most of the middle, leaving a gap on the right.
        mesh.insert_edge(v(-50.0, 0.0), v(20.0, 0.0)).unwrap();

        let start = v(-30.0, -25.0);
        let goal = v(-30.0, 25.0);
        let path = find_path(&mesh, start, goal).expect("path exists around the wall");

        // The path must round the wall's free endpoint at x = 20.
        assert!(path.len() > 2, "wall must force corners: {path:?}");
        let max_x = path
            .iter()
            .map(|p| p.x.to_bits())
            .max()
            .unwrap();
        assert!(
            max_x >= Distance::from_int(19).to_bits(),
            "path never rounded the wall endpoint: {path:?}"
        );
    }

    #[test]
    fn stepping_reaches_the_same_result() {
        let mut mesh = square_mesh(50.0);
        for (x, y) in [(0.0, 7.0), (-15.0, -9.0), (12.0, 3.0)] {
            mesh.insert_point(v(x, y)).unwrap();
        }
        let start = v(-40.0, -40.0);
        let goal = v(40.0, 40.5);

        let mut stepped = PathFinder::new(&mesh, start, goal);
        let mut steps = 0;
        while stepped.step(&mesh) == SearchStatus::InProgress {
            steps += 1;
            assert!(steps < 10_000, "search failed to terminate");
        }
        assert_eq!(stepped.status(), SearchStatus::Found);
        assert_eq!(stepped.path(&mesh), find_path(&mesh, start, goal));
    }

    #[test]
    fn funnel_collapses_collinear_portals() {
        let start = v(0.0, 0.0);
        let goal = v(10.0, 0.0);
        // Wide portals that never constrain the straight line.
        let portals = vec![
            (v(2.0, 5.0), v(2.0, -5.0)),
            (v(5.0, 5.0), v(5.0, -5.0)),
            (v(8.0, 5.0), v(8.0, -5.0)),
        ];
        assert_eq!(funnel(start, goal, &portals), vec![start, goal]);
    }

    #[test]
    fn funnel_emits_corner_when_crossed() {
        let start = v(0.0, 0.0);
        let goal = v(10.0, 6.0);
        // A narrowing that pushes the path over the right post at (5, 4).
        let portals = vec![
            (v(4.0, 10.0), v(5.0, 4.0)),
            (v(6.0, 10.0), v(5.0, 4.0)),
            (v(5.0, 4.0), v(9.0, -1.0)),
        ];
        let path = funnel(start, goal, &portals);
        assert!(path.contains(&v(5.0, 4.0)), "corner missing: {path:?}");
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
    }
}

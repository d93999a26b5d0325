//! The navigation-mesh feature: CDT construction and path queries driven
//! by actions.
//!
//! The driver's map loader feeds geometry in as `insert_point` /
//! `insert_edge` / `set_nav_mesh_size` actions; gameplay asks for routes
//! with `find_path`. A stepping mode advances the search one expansion per
//! `path_step` action so tooling can visualize the frontier.

use tracing::{debug, warn};

use phoenix_core::{Color, Name};
use phoenix_fixed::{Distance, Vec2};
use phoenix_nav::{find_path, CdtMesh, PathFinder, SearchStatus, INVALID_INDEX};

use crate::action::Action;
use crate::block::{BlockDefinition, BlockType, Lifecycle};
use crate::debug::{DebugRenderer, DebugState};
use crate::feature::{Channel, Feature, FeatureDefinition};
use crate::world::World;

const DEFAULT_MESH_FACES: usize = 2048;
const DEFAULT_HALF_EXTENT: i32 = 256;

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// The world's navigation state.
#[derive(Clone)]
pub struct NavMeshWorldBlock {
    pub mesh: CdtMesh,
    /// Working area half extent, kept for `delete_edges_and_points`.
    pub half_extent: Distance,
    /// Whether point insertion restores the Delaunay property.
    pub fix_delaunay: bool,
    /// Last completed path, for gameplay reads and debug rendering.
    pub path: Option<Vec<Vec2>>,
    /// In-flight stepped search.
    pub finder: Option<PathFinder>,
    /// When set, `find_path` arms a stepped search instead of running it.
    pub stepping: bool,
}

impl Default for NavMeshWorldBlock {
    fn default() -> Self {
        let mut mesh = CdtMesh::with_capacity(DEFAULT_MESH_FACES);
        let half_extent = Distance::from_int(DEFAULT_HALF_EXTENT);
        // A fresh world always has a walkable area.
        let _ = mesh.init_bounds(half_extent);
        Self {
            mesh,
            half_extent,
            fix_delaunay: true,
            path: None,
            finder: None,
            stepping: false,
        }
    }
}

impl BlockType for NavMeshWorldBlock {
    fn block_name() -> Name {
        Name::hashed("nav_mesh")
    }
    fn lifecycle() -> Lifecycle {
        Lifecycle::Dynamic
    }

    /// Full topology fold: vertices, half-edge wiring, face anchors.
    fn digest(&self, hasher: &mut blake3::Hasher) {
        for i in 0..self.mesh.num_vertices() {
            let v = self.mesh.vertex(i as u16).expect("index in range");
            hasher.update(&v.x.to_bits().to_le_bytes());
            hasher.update(&v.y.to_bits().to_le_bytes());
        }
        for face in self.mesh.alive_faces() {
            hasher.update(&face.to_le_bytes());
            if let Some(edges) = self.mesh.face_edges(face) {
                for e in edges {
                    let edge = self.mesh.half_edge(e).expect("ring edge alive");
                    hasher.update(&[
                        (edge.vert_a & 0xff) as u8,
                        (edge.vert_a >> 8) as u8,
                        (edge.vert_b & 0xff) as u8,
                        (edge.vert_b >> 8) as u8,
                        edge.locked as u8,
                    ]);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// Navigation feature: actions in, mesh and paths out.
#[derive(Default)]
pub struct NavMeshFeature;

impl NavMeshFeature {
    pub fn new() -> Self {
        Self
    }
}

impl Feature for NavMeshFeature {
    fn definition(&self) -> FeatureDefinition {
        FeatureDefinition::new(Name::new("nav_mesh"))
            .with_world_block(BlockDefinition::of::<NavMeshWorldBlock>())
            .with_channels(&[Channel::HandleWorldAction, Channel::DebugRender])
    }

    fn on_handle_world_action(&self, world: &mut World, action: &Action) -> bool {
        let Some(block) = world.get_block_mut::<NavMeshWorldBlock>() else {
            return false;
        };

        if action.verb == Name::hashed("set_nav_mesh_size") {
            let half = action.data[0]
                .as_distance()
                .unwrap_or(Distance::from_int(DEFAULT_HALF_EXTENT));
            block.half_extent = half;
            if let Err(error) = block.mesh.init_bounds(half) {
                warn!(%error, "nav mesh bounds reset failed");
            }
            block.path = None;
            block.finder = None;
            return true;
        }

        if action.verb == Name::hashed("insert_point") {
            let Some(point) = action.data[0].as_vec2() else {
                return true;
            };
            let fix = block.fix_delaunay;
            match block.mesh.insert_point_with_repair(point, fix) {
                Ok(vertex) if vertex != INVALID_INDEX => {
                    debug!(?point, vertex, "nav point inserted");
                }
                Ok(_) => warn!(?point, "nav point rejected (mesh full)"),
                Err(error) => warn!(?point, %error, "nav point insertion failed"),
            }
            return true;
        }

        if action.verb == Name::hashed("insert_edge") {
            let (Some(start), Some(end)) =
                (action.data[0].as_vec2(), action.data[1].as_vec2())
            else {
                return true;
            };
            if let Err(error) = block.mesh.insert_edge(start, end) {
                warn!(?start, ?end, %error, "nav edge insertion failed");
            }
            return true;
        }

        if action.verb == Name::hashed("delete_edges_and_points") {
            let half = block.half_extent;
            if let Err(error) = block.mesh.init_bounds(half) {
                warn!(%error, "nav mesh reset failed");
            }
            block.path = None;
            block.finder = None;
            return true;
        }

        if action.verb == Name::hashed("find_path") {
            let (Some(start), Some(goal)) =
                (action.data[0].as_vec2(), action.data[1].as_vec2())
            else {
                return true;
            };
            if block.stepping {
                block.finder = Some(PathFinder::new(&block.mesh, start, goal));
                block.path = None;
            } else {
                block.path = find_path(&block.mesh, start, goal);
                block.finder = None;
                if block.path.is_none() {
                    debug!(?start, ?goal, "no path");
                }
            }
            return true;
        }

        if action.verb == Name::hashed("path_step") {
            if let Some(finder) = block.finder.as_mut() {
                let status = finder.step(&block.mesh);
                if status == SearchStatus::Found {
                    block.path = finder.path(&block.mesh);
                }
            }
            return true;
        }

        if action.verb == Name::hashed("path_set_stepping") {
            block.stepping = action.data[0].as_bool().unwrap_or(false);
            return true;
        }

        if action.verb == Name::hashed("mesh_set_fix_delaunay_triangulations") {
            block.fix_delaunay = action.data[0].as_bool().unwrap_or(true);
            return true;
        }

        false
    }

    fn on_debug_render(
        &self,
        world: &World,
        _state: &dyn DebugState,
        renderer: &mut dyn DebugRenderer,
    ) {
        let Some(block) = world.get_block::<NavMeshWorldBlock>() else {
            return;
        };

        for face in block.mesh.alive_faces() {
            let Some(edges) = block.mesh.face_edges(face) else {
                continue;
            };
            for e in edges {
                let Some(edge) = block.mesh.half_edge(e) else {
                    continue;
                };
                let (Some(a), Some(b)) =
                    (block.mesh.vertex(edge.vert_a), block.mesh.vertex(edge.vert_b))
                else {
                    continue;
                };
                let color = if edge.locked {
                    Color::RED
                } else {
                    Color::rgb(90, 90, 90)
                };
                renderer.draw_line(a, b, color);
            }
        }

        if let Some(path) = &block.path {
            renderer.draw_lines(path, Color::YELLOW);
        }
        if let Some(finder) = &block.finder {
            for face in finder.open_faces() {
                if let Some(centroid) = block.mesh.face_centroid(face) {
                    renderer.draw_circle(centroid, Distance::from_f64(0.5), Color::CYAN);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

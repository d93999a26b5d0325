//! Phoenix navigation core.
//!
//! A constrained Delaunay triangulation over fixed-capacity half-edge
//! arrays, built incrementally from points and locked segments, plus path
//! queries: A* across face adjacency and funnel straightening of the
//! resulting portal chain.
//!
//! All geometry runs on exact integer predicates over raw fixed-point
//! coordinates, so mesh topology is bit-identical across machines -- the
//! mesh participates in the simulation's determinism contract.
//!
//! # Quick Start
//!
//! ```
//! use phoenix_fixed::{Distance, Vec2};
//! use phoenix_nav::prelude::*;
//!
//! let mut mesh = CdtMesh::with_capacity(64);
//! mesh.init_bounds(Distance::from_int(50)).unwrap();
//! mesh.insert_point(Vec2::from_int(10, 5)).unwrap();
//! mesh.insert_edge(Vec2::from_int(-20, -10), Vec2::from_int(20, -10)).unwrap();
//!
//! let path = find_path(&mesh, Vec2::from_int(-40, -40), Vec2::from_int(40, 40)).unwrap();
//! assert_eq!(path.first(), Some(&Vec2::from_int(-40, -40)));
//! ```

#![deny(unsafe_code)]

pub mod cdt;
pub mod mesh;
pub mod path;

pub use mesh::{CdtMesh, Face, HalfEdge, MeshIndex, PointInFace, INVALID_INDEX};
pub use path::{find_path, funnel, PathFinder, SearchStatus};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures reported by mesh operations. Queries and per-tick paths use
/// sentinel returns instead; these errors surface from construction-time
/// operations (map loading).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MeshError {
    /// A fixed element pool (vertices, half-edges, faces) is exhausted.
    #[error("mesh capacity exhausted")]
    Full,

    /// An element index did not resolve.
    #[error("invalid mesh element index")]
    InvalidIndex,

    /// A face's vertices were collinear or wound clockwise.
    #[error("face is not a counter-clockwise triangle")]
    NotCounterClockwise,

    /// An inserted face would give an edge a third incident face.
    #[error("edge already has both half-edges paired")]
    NonManifoldEdge,

    /// Twin links disagree with each other.
    #[error("twin linkage is not reflexive")]
    BrokenTwin,

    /// A face ring does not close after three steps.
    #[error("face ring does not close")]
    BrokenRing,

    /// Both endpoints of a constraint snapped to the same vertex.
    #[error("constrained edge endpoints coincide")]
    DegenerateEdge,

    /// The corridor walk for a constrained edge could not reach the far
    /// endpoint (segment grazes a vertex, leaves the mesh, or crosses
    /// another constraint).
    #[error("no corridor between constraint endpoints")]
    NoCorridor,

    /// A constrained edge would cross an existing constraint.
    #[error("constraint crosses an existing constrained edge")]
    ConstraintConflict,
}

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::mesh::{CdtMesh, Face, HalfEdge, MeshIndex, PointInFace, INVALID_INDEX};
    pub use crate::path::{find_path, funnel, PathFinder, SearchStatus};
    pub use crate::MeshError;
}

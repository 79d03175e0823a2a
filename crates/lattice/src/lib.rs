//! Lattice: animated procedural lattice mesh generator.
//!
//! Every tick a regular `rx × ry` grid is displaced by fractal noise and turned
//! into a flat-shaded triangle soup ready for GPU upload:
//!
//! 1. [`points`] evaluates one displaced position per lattice sample
//!    (`(rx+1) × (ry+1)` points, rows staggered by ±¼ cell).
//! 2. [`triangles`] runs after an explicit join on stage 1 and emits
//!    `2·rx·ry` triangles (`6·rx·ry` vertices), each with one packed normal.
//! 3. [`manager`] decides between a full rebuild (topology changed) and a
//!    vertex-only update, and refreshes the conservative bounds.
//!
//! Vertex layout (20 bytes, little-endian):
//!   00 : f32[3]  position
//!   0C : i16[4]  normal, signed-normalized (w = 0)
//!
//! The renderer side is abstracted by [`mesh::MeshResource`]; [`mesh::HostMesh`]
//! is an in-memory implementation that counts writes.

pub mod config;
pub mod error;
pub mod index;
pub mod jobs;
pub mod manager;
pub mod mesh;
pub mod noise;
pub mod normal;
pub mod pipeline;
pub mod points;
pub mod triangles;

pub use config::{LatticeConfig, Resolution, MAX_OCTAVES, MIN_RESOLUTION};
pub use error::{LatticeError, Result};
pub use index::identity_indices;
pub use jobs::{JobHandle, JobSystem, DEFAULT_BATCH_SIZE};
pub use manager::{CommitKind, EnvironmentMode, MeshBufferManager};
pub use mesh::{
    Aabb, AttributeFormat, HostMesh, IndexFormat, MeshResource, MeshWriteStats,
    SubMeshDescriptor, VertexAttribute, VertexAttributeDescriptor,
};
pub use crate::noise::{fractal_height, NoiseSampler, SimplexNoise};
pub use normal::{pack_normal, unpack_normal, PackedNormal};
pub use pipeline::{Lattice, TickReport};
pub use triangles::{triangle_indices, Vertex};

//! Face verification oracles.
//!
//! The recognition model is an external capability. The controllers only see
//! the `FaceOracle` contract: two images in, a verified flag and a
//! dissimilarity distance out.

mod backend;
mod digest;
mod registry;

pub use backend::{FaceImage, FaceOracle, OracleVerdict};
pub use digest::DigestOracle;
pub use registry::{OracleRegistry, SharedOracle};

// djinn common library
// Shared types and utilities: DNA alphabet, hash finalizers, junction position file API

pub mod hash;
pub mod position;
pub mod types;

pub use hash::{mix64, mix_pair};
pub use position::{JunctionPosition, JunctionPositionReader, JunctionPositionWriter};
pub use types::{code_of, complement, is_definite, normalize, LITERAL, N};

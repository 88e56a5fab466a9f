// djinn core library
// Enumerates junction vertices of the compacted de Bruijn graph over a set
// of FASTA inputs: a probabilistic edge-set pass narrows every position to a
// candidate set, an exact confirmation pass separates true bifurcations from
// filter noise, and an ordered emission pass streams (sequence, position,
// vertex id) tuples with stable dense ids.

pub mod distributor;
pub mod enumerator;
pub mod error;
pub mod fasta;
pub mod filter;
pub mod kmer;
pub mod occurrence;
pub mod rolling;
pub mod storage;
pub mod task;

pub use enumerator::{Config, JunctionEnumerator};
pub use fasta::{FastaReader, FastaRecord};
pub use filter::{ConcurrentBitVector, CuckooFilter, ExactSetFilter, SetFilter};
pub use kmer::PackedKmer;
pub use rolling::{RollingHash, RollingHashSeed};
pub use storage::BifurcationStorage;

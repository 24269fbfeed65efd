//! Small, dependency-light helpers shared by every crate in this workspace:
//! glob-style pattern matching for `KEYS`, FNV-1a hashing for the segmented
//! lock table and dictionary sharding, and a random run-id generator.

pub mod fnv;
pub mod rand_string;
pub mod wildcard;

pub use fnv::fnv1a32;
pub use rand_string::rand_string;
pub use wildcard::is_match;

pub mod block;
pub mod model;

pub use block::Block;
pub use model::Blockchain;

/// Default Proof-of-Work difficulty (leading `'0'` characters of the base-64 hash).
pub const DEFAULT_DIFFICULTY: u32 = 3;

/// Highest difficulty a genesis block may be created with; base-64 text of a
/// SHA-256 digest is 44 characters and anything near that never solves.
pub const DIFF_MAX: u32 = 8;

//! Collision-free naming and crash-safe relocation of files.

pub mod locks;
pub mod mover;
pub mod resolver;

pub use locks::DirectoryLocks;
pub use mover::{MoveOutcome, SafeFileMover};
pub use resolver::CollisionResolver;

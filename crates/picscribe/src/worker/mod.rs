pub mod job;
pub mod pool;
pub mod scanner;

pub use job::{CandidateFile, Job};
pub use pool::WorkerPool;
pub use scanner::DirectoryScanner;

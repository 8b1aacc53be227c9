mod memory_repository;

pub use memory_repository::{create_memory_repository, InMemoryRepository};

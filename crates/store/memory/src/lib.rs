mod keyspace;
mod store;

pub use store::MemoryDataStore;

//! The operations request handlers call: upload, fetch, append, delete and
//! horde listing, on top of any [`DataStore`](goblin_store::DataStore).

pub mod error;
pub mod facade;
pub mod generator;
pub mod settings;

pub use error::GobError;
pub use facade::GobStore;
pub use generator::{ALPHABET, Generator, Namespace, random_string};
pub use settings::GobSettings;

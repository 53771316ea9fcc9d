pub mod classify;
pub mod corpus;
pub mod dataset;
pub mod db;
pub mod error;
pub mod importer;
pub mod model;
pub mod normalize;
pub mod settings;
pub mod train;

pub use error::{Error, Result};

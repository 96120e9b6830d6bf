pub mod assignment;
pub mod competency;
pub mod config;
pub mod contact;
pub mod db;
pub mod deficiency;
pub mod drill;
pub mod error;
pub mod facility;
pub mod gate;
pub mod io;
pub mod org;
pub mod overview;
pub mod paths;
pub mod poc;
pub mod policy;
pub mod progress;
pub mod staff;
pub mod status;
pub mod track;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{CarecompError, Result};

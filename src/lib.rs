pub mod accounts;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod database;
pub mod error;
pub mod gate;
pub mod genres;
pub mod model;
pub mod watchlist;

pub use error::{Error, ErrorKind, Result};

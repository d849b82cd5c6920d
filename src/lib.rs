pub mod cloze;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod persist;
pub mod repository;
pub mod srs;
pub mod store;

#[cfg(test)]
pub mod testing;

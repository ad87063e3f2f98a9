pub mod category;
pub mod db;
pub mod merge;
pub mod models;
pub mod parser;
pub mod scale;
pub mod service;
pub mod store;
pub mod sync;
pub mod units;

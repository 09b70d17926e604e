pub mod catalog;
pub mod collector;
pub mod config;
pub mod dataset;
pub mod normalize;
pub mod reconciler;
pub mod schema;
pub mod spreadsheet;
pub mod tables;
pub mod wiki;

// Review topics: topic discovery and differential keyword lexicons for
// product reviews.
//
// This is the library root. Each module corresponds to a stage or a
// collaborator of the per-file pipeline.

pub mod clustering;
pub mod config;
pub mod db;
pub mod deadline;
pub mod embedding;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod reviews;
pub mod status;
pub mod text;
pub mod topics;

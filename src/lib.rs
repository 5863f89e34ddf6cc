/// Ranking core of a search engine: posting cursors, the query operator tree, four
/// retrieval models, pseudo-relevance feedback, PM2/xQuAD diversification and a
/// learning-to-rank pipeline, reading and writing TREC-style files.

pub mod config;
pub mod diversify;
pub mod errors;
pub mod feedback;
pub mod index;
pub mod letor;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod posting;
pub mod query;
pub mod ranking;
pub mod trec;

pub use errors::RankError;

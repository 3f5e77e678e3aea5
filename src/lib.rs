pub mod aggregate;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod db;
pub mod dotprod;
pub mod engine;
pub mod error;
pub mod io;
pub mod normalize;
pub mod pipeline;
pub mod scheduler;
pub mod session;
pub mod setup;
pub mod stages;
pub mod sync;
pub mod workflow;

/// Canonical emotion set of the classifier, alphabetical. A configured
/// classifier carries exactly one weight map per entry.
pub const EMOTIONS: [&str; 15] = [
    "amusement",
    "anger",
    "anxiety",
    "awe",
    "calmness",
    "craving",
    "disgust",
    "excitement",
    "fear",
    "horror",
    "joy",
    "neutral",
    "romance",
    "sadness",
    "surprise",
];

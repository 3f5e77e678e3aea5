pub mod aggregate;
pub mod fetch;
pub mod normalize;
pub mod persist;
pub mod precheck;
pub mod score;

pub use aggregate::StageAggregate;
pub use fetch::StageFetch;
pub use normalize::StageNormalize;
pub use persist::StagePersist;
pub use precheck::StagePrecheck;
pub use score::StageScore;

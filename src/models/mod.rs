// Row models for the three ingested tables

pub mod legislator;
pub mod post;
pub mod topic;

pub use legislator::Legislator;
pub use post::Post;
pub use topic::Topic;

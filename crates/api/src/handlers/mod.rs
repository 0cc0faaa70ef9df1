pub mod jobs;
pub mod sources;
pub mod status;

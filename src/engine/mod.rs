pub mod announcements;
pub mod assignment;
pub mod dispatcher;
pub mod feedback;
pub mod lifecycle;
pub mod queue;
pub mod scoring;
pub mod stats;

pub mod actor;
pub mod announcement;
pub mod assignment;
pub mod event;
pub mod feedback;
pub mod order;
pub mod rider;

pub mod batch;
pub mod batch_status_history;
pub mod batch_teacher;
pub mod course;
pub mod enrollment;

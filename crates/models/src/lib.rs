pub mod batch;
pub mod batch_dates;
pub mod batch_status;
pub mod error;
pub mod history;
pub mod transition;

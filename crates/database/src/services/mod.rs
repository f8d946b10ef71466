pub mod batch;
pub mod enrollment;
pub mod reconcile;
pub mod status;

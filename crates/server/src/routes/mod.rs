pub mod batch;
pub mod enrollment;
pub mod health;

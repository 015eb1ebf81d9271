//! Application layer: the batch stepper and its collaborators

pub mod processor;
pub mod scheduler;
pub mod stepper;

pub use processor::ImageProcessor;
pub use scheduler::spawn_scheduler;
pub use stepper::BatchStepper;

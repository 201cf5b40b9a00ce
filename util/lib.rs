pub mod finite;
pub mod id;
pub mod progress_counter;

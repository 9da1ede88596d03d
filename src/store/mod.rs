mod gradebook;

pub use gradebook::Gradebook;

pub mod core;
pub mod grades;
pub mod ids;
pub mod sequences;

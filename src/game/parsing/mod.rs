pub mod notes;
pub mod simfile;

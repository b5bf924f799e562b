pub mod cli;
pub mod ssz_file;
pub mod transition;

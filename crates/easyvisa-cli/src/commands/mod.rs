pub mod benchmark;
pub mod describe;

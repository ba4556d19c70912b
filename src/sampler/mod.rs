pub mod accumulator;
pub mod hungarian;
pub mod kernel;
pub mod label_alignment;
pub mod qbuffers;
pub mod rng;
pub mod stats;

pub mod driver;

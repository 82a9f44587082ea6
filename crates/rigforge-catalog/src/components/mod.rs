//! Component types of the standard catalog

pub mod basic;
pub mod chain;
pub mod finger;

pub use basic::BasicCopy;
pub use chain::{SimpleChain, TweakChain};
pub use finger::FingerGenerator;

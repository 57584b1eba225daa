//! Built-in models: the Dec-Tiger benchmark and a generator of small random Dec-POMDPs.

pub mod dec_tiger;
pub mod random;

pub use random::{random_dec_pomdp, RandomModelSpec};

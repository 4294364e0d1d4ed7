pub mod market;
pub mod mover;
pub mod tracking;

//! Synchronization primitives

pub mod stop;

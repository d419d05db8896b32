//! Adapters implementing the domain ports: the three payment backends, the
//! in-memory registry and the random sources used by the emulator.

pub mod gateway;
pub mod in_memory;
pub mod local;
pub mod processor;
pub mod random;
pub mod terminal;

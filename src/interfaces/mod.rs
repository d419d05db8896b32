//! Adapters for external data formats: CSV input for batch runs and the
//! framed byte protocol spoken by payment terminals.

pub mod csv;
pub mod wire;

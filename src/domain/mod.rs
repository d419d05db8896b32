//! Domain layer: the transaction entity, its lifecycle rules and the ports
//! that backends and storage implement.

pub mod card;
pub mod ports;
pub mod transaction;

//! Repository layer: connection pooling, migrations, row models, and one
//! `queries` module per entity group. No business rules live here beyond
//! what SQL itself enforces; transition validation, cycle detection, and
//! the rest of the domain logic live in `tx-core`.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;

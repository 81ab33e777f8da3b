//! # Repository Module
//!
//! Repositories wrap the SQL for one table each and hand out plain values.
//!
//! ## Available Repositories
//!
//! - [`kv::KvRepository`] - Durable client records (persisted session)

pub mod kv;

//! Integration test suite.
//!
//! 1. End-to-end transaction flows
//! 2. Locking across threads
//! 3. Persistence and recovery

pub mod end_to_end_tests;
pub mod helpers;
pub mod locking_tests;
pub mod persistence_tests;

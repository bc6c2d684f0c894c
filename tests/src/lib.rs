//! Shared fixtures for the stake client integration tests

pub mod common;

//! Integration tests for favsync
//!
//! These tests use wiremock to stand in for the gallery sites and run full
//! syncs into temporary directories.

mod common;
mod furaffinity_tests;
mod inkbunny_tests;
mod transport_tests;

//! Unit tests for devrig CLI
//!
//! These tests use recording fakes for every port and run fast without
//! docker, git or a VM.

mod agent_lifecycle;
mod docker_enforcer;
mod property_tests;

//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, docker,
//! VirtualBox, the NFS share, git, and configuration and manifest files.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod balancer;
pub mod command_runner;
pub mod config;
pub mod docker;
pub mod fs;
pub mod git;
pub mod manifest;
pub mod network;
pub mod opener;
pub mod share;
pub mod vm;

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Core reconciliation engine for the AEGIS federation control plane.
//!
//! A federated resource is a host-cluster object describing a template
//! plus placement and override rules; this crate continuously reconciles
//! matching concrete resources across a dynamic set of member clusters.
//!
//! # Architecture
//!
//! - [`application::accessor`] - resolves watch events to logical
//!   federated resources
//! - [`application::version_manager`] - propagation history and
//!   convergence detection
//! - [`application::dispatch`] - concurrent per-cluster operations with
//!   isolated failure handling
//! - [`application::scheduling`] - lifecycle of per-kind scheduling
//!   preference controllers

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;

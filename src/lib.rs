// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # ddnsync - IPAM to DNS synchronization
//!
//! ddnsync keeps authoritative DNS in step with an IP address inventory. Every
//! time an address binding is created, changed or removed, it computes which
//! forward (A/AAAA) and reverse (PTR) records must go away or appear, and sends
//! TSIG-signed RFC 2136 dynamic updates to the server responsible for each zone.
//!
//! ## Overview
//!
//! - A locally configured zone catalog maps names and addresses to zones and
//!   the servers accepting updates for them.
//! - Before each update, a live SOA walk confirms the configured zone is still
//!   authoritative for the name, so nothing is written into a zone whose
//!   authority has been delegated further down.
//! - The outcome of every attempt is recorded in a status ledger read by
//!   reporting tools.
//!
//! ## Modules
//!
//! - [`catalog`] - Zone catalog and configuration validation
//! - [`normalize`] - Name and reverse-name normalization
//! - [`authority`] - Live SOA discovery
//! - [`dispatch`] - Signed dynamic update dispatch
//! - [`ledger`] - Per-binding status ledger
//! - [`jobs`] - Job submission and the in-process runner
//! - [`reconciler`] - Binding-change orchestration and the job worker
//!
//! ## Example
//!
//! ```rust,no_run
//! use ddnsync::catalog::ZoneCatalog;
//! use ddnsync::config::Config;
//!
//! let config = Config::load(std::path::Path::new("/etc/ddnsync/config.yaml")).unwrap();
//! let catalog = ZoneCatalog::from_config(&config).unwrap();
//! let zone = catalog.find_forward_zone("host.example.com.");
//! ```

pub mod authority;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod dns_errors;
pub mod jobs;
pub mod ledger;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod reconciler;
pub mod retry;

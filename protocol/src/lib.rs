// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # WEFT Protocol — Core Library
//!
//! WEFT is a two-tier peer-to-peer membership overlay, and this crate is
//! the part that thinks: the directory consensus, the neighbor topology,
//! the gossip, and the funeral arrangements.
//!
//! The two tiers, briefly. A static handful of **seeds** hold the
//! authoritative peer directory and agree on every admission and eviction
//! by simple majority vote — no leader, no log, just idempotent vote sets
//! that commute. A churning population of **peers** registers with a seed
//! majority, learns the world, wires itself into a power-law-biased
//! neighbor graph, and floods application messages epidemically. When a
//! neighbor goes quiet, a peer does not unilaterally declare it dead; it
//! collects a neighborhood quorum first, then tells the seeds. Rumors
//! require witnesses here.
//!
//! ## Architecture
//!
//! The crate is split by concern, engines apart from I/O:
//!
//! - **endpoint** — `(host, port)` as identity. The whole PKI budget.
//! - **config** — every constant, in one room where they can be audited.
//! - **wire** — the closed JSON message set. One frame per connection.
//! - **transport** — dial, write one object, maybe read one, hang up.
//! - **seeds** — the seed list file: the only configuration that matters.
//! - **directory** — the seed side: vote ledgers and the quorum engine.
//! - **overlay** — the peer side: selection, gossip, failure detection.
//!
//! ## Design Philosophy
//!
//! 1. Engines do not own sockets. Everything that can corrupt state is a
//!    synchronous method you can unit-test at a million calls a second.
//! 2. Vote, tally, apply: one critical section. Races choose winners,
//!    never outcomes.
//! 3. Every network failure is the same failure: "not delivered". Carry on.
//! 4. Locks are never held across an await. Snapshot, release, send.

pub mod config;
pub mod directory;
pub mod endpoint;
pub mod overlay;
pub mod seeds;
pub mod transport;
pub mod wire;

// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Leader to follower replication keyed by monotonic log ids.
//!
//! - **transport**: outbound trait, inbound endpoint trait, in-memory hub
//! - **leader**: asynchronous shipper fanning entries out to healthy peers
//! - **follower**: ordered receiver with gap fill and bulk catch-up

pub mod follower;
pub mod leader;
pub mod transport;


// Re-export public API
pub use follower::ReplicaReceiver;
pub use leader::Replicator;
pub use transport::{InMemoryHub, PeerTransport, PushOutcome, ReplicationEndpoint};

// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Service facade: the stable request surface of a node.

pub mod facade;
pub mod types;


// Re-export public API
pub use facade::Node;
pub use types::{
    ClusterStatusReply, CompactionRunReply, ConfigureReply, DeleteOutcome, HistoryReply,
    HistoryVersion, PeerStatusInfo, PutOutcome, SegmentInfo, SegmentsReply, ValueReply,
    VersionsReply, WriteReply,
};

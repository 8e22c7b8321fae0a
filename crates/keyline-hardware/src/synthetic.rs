//! Synthetic key and sounder implementations.
//!
//! These stand in for real hardware in tests, demos, and headless
//! stations: a key that replays a prepared edge script, a sounder that
//! records what it was driven with, and a sounder that swallows
//! everything.

use std::collections::VecDeque;

use keyline_protocol::EdgeEvent;

use crate::{HardwareError, Key, Sounder};

/// A [`Key`] that replays a prepared sequence of edges.
///
/// Each `poll_edge` call yields the next scripted edge; the timestamps
/// are whatever the script says, so tests control timing exactly.
#[derive(Debug, Default)]
pub struct ScriptedKey {
    script: VecDeque<EdgeEvent>,
}

impl ScriptedKey {
    pub fn new(edges: impl IntoIterator<Item = EdgeEvent>) -> Self {
        Self {
            script: edges.into_iter().collect(),
        }
    }

    /// Appends more edges to the script.
    pub fn extend(&mut self, edges: impl IntoIterator<Item = EdgeEvent>) {
        self.script.extend(edges);
    }

    /// Edges not yet polled.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Key for ScriptedKey {
    fn poll_edge(&mut self) -> Option<EdgeEvent> {
        self.script.pop_front()
    }
}

/// A [`Sounder`] that keeps every edge it was driven with.
#[derive(Debug, Default)]
pub struct RecordingSounder {
    driven: Vec<EdgeEvent>,
}

impl RecordingSounder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The edges driven so far, in order.
    pub fn driven(&self) -> &[EdgeEvent] {
        &self.driven
    }

    /// Takes the recorded edges, leaving the recorder empty.
    pub fn take(&mut self) -> Vec<EdgeEvent> {
        std::mem::take(&mut self.driven)
    }
}

impl Sounder for RecordingSounder {
    fn drive_edge(&mut self, edge: EdgeEvent) -> Result<(), HardwareError> {
        self.driven.push(edge);
        Ok(())
    }
}

/// A [`Sounder`] that accepts and discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSounder;

impl Sounder for SilentSounder {
    fn drive_edge(&mut self, _edge: EdgeEvent) -> Result<(), HardwareError> {
        Ok(())
    }
}

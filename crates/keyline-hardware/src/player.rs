//! Deadline-paced sounder playback.

use tokio::time::{Duration, Instant, sleep_until};

use keyline_protocol::EdgeEvent;

use crate::{HardwareError, Sounder};

/// Drives a buffered edge sequence into a sounder at its recorded pace.
///
/// The first edge plays immediately; every later edge plays at its
/// recorded offset from the first. The sequence must already be in hand
/// (a decoded message, an encoder's output, a reorder buffer's drain);
/// pacing waits on the clock, never on the network.
///
/// # Errors
/// Stops at the first [`HardwareError`]; edges after the failure are not
/// driven.
pub async fn play_edges<S: Sounder>(
    sounder: &mut S,
    edges: impl IntoIterator<Item = EdgeEvent>,
) -> Result<(), HardwareError> {
    let start = Instant::now();
    let mut origin_us: Option<u64> = None;

    for edge in edges {
        let origin = *origin_us.get_or_insert(edge.at_us);
        let offset = edge.at_us.saturating_sub(origin);
        sleep_until(start + Duration::from_micros(offset)).await;
        sounder.drive_edge(edge)?;
    }
    Ok(())
}

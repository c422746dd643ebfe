//! # History Walker
//!
//! Reconstructs an identity's change history by following `previousChange`
//! back-pointers from the most recent change block down to the first. Only
//! blocks in which the identity actually changed are visited, so the number
//! of registry round-trips is bounded by the number of change blocks rather
//! than the length of the chain.

use std::time::Duration;

use crate::address::Address;
use crate::error::Error;
use crate::event::{BlockNumber, ChangeEvent};
use crate::provider::Registry;
use crate::resolve::{Stage, timed};

/// Collect every change event recorded for `identity`, most recent first.
///
/// Reads the identity's latest change block from the registry and then walks
/// the history. See [`walk`].
///
/// # Errors
///
/// Returns [`Error::RegistryUnavailable`] if any registry call fails or
/// times out and [`Error::MalformedEvent`] if the returned events do not
/// form a well-linked history.
pub async fn collect(
    registry: &impl Registry, identity: &Address, timeout: Duration,
) -> crate::Result<Vec<ChangeEvent>> {
    let latest = timed(Stage::HistoryCollection, timeout, registry.changed(identity)).await?;
    walk(registry, identity, latest, timeout).await
}

/// Walk the history of `identity` backwards from `latest`, most recent
/// event first.
///
/// Events within a block are returned newest first, so the whole sequence is
/// in reverse chronological order. A `latest` of `None` means the identity
/// has never changed and yields an empty history.
///
/// The walk is iterative and each step must move to a strictly earlier
/// block, so it always terminates.
///
/// # Errors
///
/// Returns [`Error::RegistryUnavailable`] if any registry call fails or
/// times out. Returns [`Error::MalformedEvent`] if a block yields no events,
/// an event belongs to another identity or block, or the back-pointers do not
/// lead to a single earlier block. No partial history is returned.
pub async fn walk(
    registry: &impl Registry, identity: &Address, latest: Option<BlockNumber>, timeout: Duration,
) -> crate::Result<Vec<ChangeEvent>> {
    let mut history = Vec::new();
    let mut cursor = latest;

    while let Some(block) = cursor {
        let events =
            timed(Stage::HistoryCollection, timeout, registry.events(identity, block)).await?;
        cursor = previous_block(identity, block, &events)?;

        tracing::debug!(%identity, block, count = events.len(), next = ?cursor, "collected events");
        history.extend(events.into_iter().rev());
    }

    Ok(history)
}

// Find the single earlier block the events at `block` point back to.
fn previous_block(
    identity: &Address, block: BlockNumber, events: &[ChangeEvent],
) -> crate::Result<Option<BlockNumber>> {
    if events.is_empty() {
        return Err(Error::MalformedEvent(format!(
            "no events for {identity} at block {block} despite a recorded change"
        )));
    }

    // only later events in a block may point at the block itself
    if events[0].previous_change == Some(block) {
        return Err(Error::MalformedEvent(format!(
            "first event at block {block} points to its own block"
        )));
    }

    let mut previous = None;
    for event in events {
        if event.identity != *identity {
            return Err(Error::MalformedEvent(format!(
                "event for {} returned when fetching {identity}",
                event.identity
            )));
        }
        if event.block_number != block {
            return Err(Error::MalformedEvent(format!(
                "event from block {} returned when fetching block {block}",
                event.block_number
            )));
        }

        match event.previous_change {
            Some(prev) if prev > block => {
                return Err(Error::MalformedEvent(format!(
                    "event at block {block} points forward to block {prev}"
                )));
            }
            Some(prev) if prev < block => match previous {
                Some(p) if p != prev => {
                    return Err(Error::MalformedEvent(format!(
                        "events at block {block} point to both block {p} and block {prev}"
                    )));
                }
                _ => previous = Some(prev),
            },
            _ => {}
        }
    }

    Ok(previous)
}

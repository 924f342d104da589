use crate::application::context::SessionContext;
use crate::application::prober::LivenessProber;
use crate::infrastructure::message::SessionMessage;
use crate::infrastructure::transport::{Recipients, Transport};
use lanlobby_core::{RosterListing, SessionEvent};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Cancellable fixed-period timer driving the host's broadcast cycle
///
/// The first tick fires immediately so peers see a listing as soon as the
/// session is up. Late ticks are skipped rather than bunched.
#[derive(Debug)]
pub struct BroadcastScheduler {
    interval: Interval,
    token: CancellationToken,
}

impl BroadcastScheduler {
    /// Must be called from within a tokio runtime
    pub fn start(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            interval,
            token: CancellationToken::new(),
        }
    }

    /// Wait for the next tick; `false` once cancelled
    pub async fn tick(&mut self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            _ = self.interval.tick() => true,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token in-flight work should hang off
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// One host broadcast cycle
///
/// Merges finished probes into the roster, launches the next round of
/// probes, renders the listing, pushes it to every peer and applies it to
/// the host's own mirror. Returns the listing that was sent, or `None` when
/// there is no roster to broadcast.
pub fn run_cycle<T>(
    ctx: &mut SessionContext,
    prober: &mut LivenessProber,
    transport: &T,
) -> Option<RosterListing>
where
    T: Transport + ?Sized,
{
    let roster = ctx.roster.as_mut()?;

    let harvest = prober.harvest();
    for (id, rtt) in harvest.completed {
        let millis = u32::try_from(rtt.as_millis()).unwrap_or(u32::MAX);
        roster.record_rtt(id, millis);
    }

    prober.launch(roster.iter().map(|m| (m.id(), m.address())));

    let listing = RosterListing::render(&ctx.server_name, roster);
    let member_count = listing.member_count();

    match SessionMessage::roster_update(&listing).encode() {
        Ok(data) => {
            if let Err(e) = transport.send(Recipients::Everyone, data) {
                tracing::warn!(error = %e, "Roster broadcast failed");
            }
        }
        Err(e) => tracing::error!(error = %e, "Could not encode roster update"),
    }

    tracing::trace!(
        members = member_count,
        superseded = harvest.superseded.len(),
        "Roster broadcast"
    );

    ctx.mirror.apply(listing.clone());
    ctx.emit(SessionEvent::RosterUpdated { member_count });

    Some(listing)
}

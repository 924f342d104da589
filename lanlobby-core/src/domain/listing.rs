use crate::domain::Roster;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::Arc;

/// Rows the roster panel needs besides one per member: header, blank line,
/// column titles and the local player's own line
const LAYOUT_EXTRA_ROWS: usize = 4;

/// Self-describing text rendering of a roster, as broadcast by the host
///
/// ```text
/// My Server (2/4)
///
/// IP ADDRESS      PING    PLAYER NAME
/// 192.168.1.10    0 ms    Host
/// 192.168.1.11    23 ms   Alice
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterListing {
    text: String,
    member_count: usize,
}

impl RosterListing {
    /// Serialize the authoritative roster
    pub fn render(server_name: &str, roster: &Roster) -> Self {
        let mut text = String::new();

        // Writing into a String cannot fail
        let _ = writeln!(
            text,
            "{} ({}/{})",
            server_name,
            roster.len(),
            roster.max_members()
        );
        text.push('\n');
        text.push_str("IP ADDRESS\t\tPING\t\tPLAYER NAME\n");

        for member in roster.iter() {
            let _ = writeln!(
                text,
                "{}\t\t{} ms\t\t{}",
                member.address(),
                member.last_known_rtt_millis(),
                member.display_name()
            );
        }

        Self {
            text,
            member_count: roster.len(),
        }
    }

    /// Rebuild a listing received over the wire
    pub fn from_parts(text: String, member_count: usize) -> Self {
        Self { text, member_count }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn member_count(&self) -> usize {
        self.member_count
    }

    pub fn into_parts(self) -> (String, usize) {
        (self.text, self.member_count)
    }
}

/// Read-only replica of the host's roster listing
///
/// Every update swaps in a new immutable snapshot; readers holding an older
/// `Arc` keep a consistent view.
#[derive(Debug, Clone, Default)]
pub struct RosterMirror {
    current: Option<Arc<RosterListing>>,
}

impl RosterMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole mirror with a received listing
    pub fn apply(&mut self, listing: RosterListing) {
        self.current = Some(Arc::new(listing));
    }

    pub fn current(&self) -> Option<Arc<RosterListing>> {
        self.current.clone()
    }

    pub fn member_count(&self) -> usize {
        self.current.as_ref().map_or(0, |l| l.member_count())
    }

    /// Number of text rows a presentation layer needs to show the listing
    pub fn layout_rows(&self) -> usize {
        self.member_count() + LAYOUT_EXTRA_ROWS
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

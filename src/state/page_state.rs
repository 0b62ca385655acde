/// Page state definitions for tracking a page through the processor
///
/// This module defines every state a page passes through between being
/// dequeued and being written to disk.
use std::fmt;

/// Represents the current state of a page in the mirror pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// Conditional GET in flight
    Fetching,

    /// 200 response with an HTML body received
    Fetched,

    /// Body is being parsed into a document tree
    Parsing,

    /// Referenced assets are being fetched and localized
    AssetResolution,

    /// Document is being rewritten for offline browsing
    Rewriting,

    // ===== Terminal Success States =====
    /// Rewritten page was written to disk and recorded
    Persisted,

    /// Server answered 304 and the prior local file is still present
    NotModified,

    // ===== Terminal Skip States =====
    /// Response was not HTML; nothing to mirror
    NotHtml,

    // ===== Terminal Error States =====
    /// Fetch, parse, rewrite or write failed
    Errored,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Persisted | Self::NotModified | Self::NotHtml | Self::Errored
        )
    }

    /// Returns true if this is an active state (page may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Persisted | Self::NotModified)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Errored)
    }

    /// Returns true if the processor may move from `self` to `next`
    ///
    /// `Errored` is reachable from every active state.
    pub fn can_transition_to(&self, next: PageState) -> bool {
        if self.is_active() && next == Self::Errored {
            return true;
        }

        matches!(
            (self, next),
            (Self::Fetching, Self::Fetched)
                | (Self::Fetching, Self::NotModified)
                | (Self::Fetching, Self::NotHtml)
                | (Self::Fetched, Self::Parsing)
                | (Self::Parsing, Self::AssetResolution)
                | (Self::AssetResolution, Self::Rewriting)
                | (Self::Rewriting, Self::Persisted)
        )
    }

    /// Short lowercase name used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Fetched => "fetched",
            Self::Parsing => "parsing",
            Self::AssetResolution => "asset_resolution",
            Self::Rewriting => "rewriting",
            Self::Persisted => "persisted",
            Self::NotModified => "not_modified",
            Self::NotHtml => "not_html",
            Self::Errored => "errored",
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Fetching,
            Self::Fetched,
            Self::Parsing,
            Self::AssetResolution,
            Self::Rewriting,
            Self::Persisted,
            Self::NotModified,
            Self::NotHtml,
            Self::Errored,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

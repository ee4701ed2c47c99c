//! Error taxonomy for the session, collection, store, and outreach layers.
//!
//! Fatal conditions (session loss, a dead collection container) carry the
//! number of entities processed so far, so the operator always learns how
//! far a run got before it died. Per-entity failures never appear here;
//! they are recorded as `FAILED(reason)` report rows and the run continues.

use thiserror::Error;

/// Errors from the browser session capability layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The browser or its CDP connection is gone.
    #[error("browser session lost: {0}")]
    Lost(String),

    /// Navigation to a specific URL failed or timed out.
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// A script evaluation or DOM query against the live page failed.
    #[error("script evaluation failed: {0}")]
    Script(String),

    /// The browser process could not be started.
    #[error("browser launch failed: {0}")]
    Launch(String),
}

/// Fatal errors from a collection run.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The scroll or height primitive failed on the collection container.
    /// Everything appended before this point is already flushed.
    #[error("collection container unusable after {collected} entities: {source}")]
    Container {
        collected: usize,
        #[source]
        source: SessionError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fatal errors from an outreach run.
#[derive(Debug, Error)]
pub enum OutreachError {
    /// The browser session died mid-run. `processed` counts the entities
    /// whose outcome rows were already flushed.
    #[error("browser session failed after {processed} entities: {source}")]
    Session {
        processed: usize,
        #[source]
        source: SessionError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the append-only record store and roster loading.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open channel '{channel}': {source}")]
    Open {
        channel: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append to channel '{channel}': {source}")]
    Append {
        channel: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read roster '{path}': {source}")]
    Roster {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("roster '{path}' is missing required column '{column}'")]
    MissingColumn { path: String, column: String },
}

/// Errors from the credentialed login flow.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("{0} is not set")]
    MissingCredentials(&'static str),

    /// The login form never appeared.
    #[error("login form never appeared")]
    FormMissing,

    /// Credentials were submitted but we are still on the login page.
    #[error("credentials rejected (still on the login page)")]
    Rejected,

    #[error(transparent)]
    Session(#[from] SessionError),
}

//! Replies and the caller-facing reply channel.

use std::fmt;

use tokio::sync::mpsc;

use crate::codec::LocationRecord;
use crate::error::{ErrorCondition, LocationError};

/// What a reply carries.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPayload {
    /// A location fix.
    Location(LocationRecord),
    /// Acknowledgement with no body (a cleared watch).
    Empty,
    /// A catalog error.
    Error(ErrorCondition),
}

/// One asynchronous result for a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub payload: ReplyPayload,
    /// When set, the caller's channel must stay open for further replies.
    pub keep_listening: bool,
}

impl Reply {
    pub fn location(record: LocationRecord, keep_listening: bool) -> Self {
        Self {
            payload: ReplyPayload::Location(record),
            keep_listening,
        }
    }

    pub fn error(error: LocationError, keep_listening: bool) -> Self {
        Self {
            payload: ReplyPayload::Error(error.condition()),
            keep_listening,
        }
    }

    pub fn empty() -> Self {
        Self {
            payload: ReplyPayload::Empty,
            keep_listening: false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ReplyPayload::Error(_))
    }

    /// Error code, if this is an error reply.
    pub fn error_code(&self) -> Option<i32> {
        match &self.payload {
            ReplyPayload::Error(condition) => Some(condition.code()),
            _ => None,
        }
    }
}

/// Handle back to the original caller.
///
/// Wraps a delivery closure so any transport (host callback, channel, test
/// collector) can sit behind it. Delivery is fire-and-forget; a caller that
/// went away simply stops receiving.
pub struct ReplyChannel {
    deliver: Box<dyn Fn(Reply) + Send>,
}

impl ReplyChannel {
    /// Wrap a delivery closure.
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(Reply) + Send + 'static,
    {
        Self {
            deliver: Box::new(deliver),
        }
    }

    /// Deliver replies into an unbounded channel.
    pub fn from_sender(tx: mpsc::UnboundedSender<Reply>) -> Self {
        Self::new(move |reply| {
            let _ = tx.send(reply);
        })
    }

    /// Create a channel together with its receiving end.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Reply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::from_sender(tx), rx)
    }

    pub fn send(&self, reply: Reply) {
        (self.deliver)(reply);
    }
}

impl fmt::Debug for ReplyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyChannel").finish_non_exhaustive()
    }
}

//! Runtime primitives shared by the swapmatch lookup services.
//!
//! Everything that spawns or parks work in the workspace goes through this
//! crate so tasks carry a [`TaskClass`] tag in traces and so queueing
//! behavior (bounded mailboxes, delayed hand-off) is implemented once.

mod class;
mod delay;
mod join_set;
mod mailbox;
mod shutdown;
mod spawn;
mod token;

pub use class::TaskClass;
pub use delay::BoundedDelayQueue;
pub use join_set::WorkerJoinSet;
pub use mailbox::{Mailbox, MailboxReceiver, MailboxSendError, MailboxSender};
pub use shutdown::{ShutdownMode, ShutdownReport};
pub use spawn::{spawn, spawn_blocking};
pub use token::GenerationClock;

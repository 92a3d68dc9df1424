//! Channel roster
//!
//! The roster is the durable set of monitored channels. It is read once at
//! startup and rewritten in full after every join/leave:
//!
//! ```text
//!   !join foo ──► ChannelRoster::insert ──┐
//!                                          ├──► Mutex<ChannelList> ──► channels.json
//!   !leave bar ─► ChannelRoster::remove ──┘       (sort, tmp + rename)
//! ```
//!
//! The file is a tab-indented JSON array of channel names.

pub mod list;
pub mod store;

pub use list::ChannelList;
pub use store::{ChannelClaim, ChannelRoster};

pub mod history;
pub mod loadable;
pub mod pin;
pub mod post_hide;
pub mod saved_reply;

pub use history::History;
pub use loadable::{Loadable, LoadableKey, LoadableMode};
pub use pin::Pin;
pub use post_hide::{PostHide, PostHideKey};
pub use saved_reply::{SavedReply, SavedReplyKey};

// Observer session: connection lifecycle, reconciliation and history

mod manager;
pub mod protocol;

pub use manager::{
    HistoryMap, LinkState, SessionError, SessionSnapshot, SessionStats, StreamSession,
};
pub use protocol::{decode_frame, ChannelEvent, DecodedFrame, FeedMessage};

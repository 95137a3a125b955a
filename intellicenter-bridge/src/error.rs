use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The supervisor task has stopped and no longer takes intents
    #[error("Bridge channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, BridgeError>;

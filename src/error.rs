use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Node error: {0}")]
    Node(#[from] bitcoincore_rpc::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Import error: {0}")]
    Import(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn import(msg: impl Into<String>) -> Self {
        Error::Import(msg.into())
    }

    /// Fatal errors must halt the process; everything else is transient
    /// and retried on the next polling cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

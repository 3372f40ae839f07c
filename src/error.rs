use thiserror::Error;

use crate::domain::email::Uid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot build TLS connector")]
    Tls(#[from] native_tls::Error),

    #[error("cannot connect to {host}:{port}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: imap::Error,
    },

    #[error("login rejected for user {user}")]
    Auth {
        user: String,
        #[source]
        source: imap::Error,
    },

    #[error("cannot list mailboxes")]
    List(#[source] imap::Error),

    #[error("cannot read status of mailbox {mailbox}")]
    Status {
        mailbox: String,
        #[source]
        source: imap::Error,
    },

    #[error("search {criteria:?} failed in mailbox {mailbox}")]
    Search {
        mailbox: String,
        criteria: String,
        #[source]
        source: imap::Error,
    },

    /// Every attempt for the batch failed.
    #[error("fetch failed in mailbox {mailbox} for UIDs {uids}")]
    Fetch {
        mailbox: String,
        uids: String,
        #[source]
        source: imap::Error,
    },

    #[error("{} of {requested} messages missing in mailbox {mailbox}: {missing:?}", missing.len())]
    TooManyMissing {
        mailbox: String,
        requested: usize,
        missing: Vec<Uid>,
    },

    #[error("body worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot parse configuration file")]
    ConfigParse(#[from] toml::de::Error),

    #[error("cannot render configuration template")]
    ConfigTemplate(#[from] toml::ser::Error),

    #[error("credential store error: {0}")]
    Credentials(String),

    #[error("cannot install logger")]
    Logger(#[from] log::SetLoggerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

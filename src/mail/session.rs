use log::{debug, error, warn};
use native_tls::TlsConnector;
use std::fmt;
use std::net::TcpStream;
use std::ops::{Deref, DerefMut};

use crate::domain::email::Uid;
use crate::error::{Error, Result};
use crate::mail::response::{FetchedItem, ListedMailbox};

/// The protocol primitives the pipeline needs from one authenticated
/// connection. Raw protocol failures come back as `imap::Error` so callers
/// can attach mailbox/UID context.
pub trait MailSession {
    /// Opens `mailbox`. Returns false when it is missing, cannot be
    /// opened, or holds no messages; the reason is logged.
    fn select_mailbox(&mut self, mailbox: &str, readonly: bool) -> bool;

    /// UID SEARCH in the selected mailbox, ascending.
    fn search_uids(&mut self, criteria: &str) -> imap::error::Result<Vec<Uid>>;

    fn list_mailboxes(&mut self) -> imap::error::Result<Vec<ListedMailbox>>;

    fn message_count(&mut self, mailbox: &str) -> imap::error::Result<u32>;

    /// One UID FETCH round-trip.
    fn uid_fetch(&mut self, uid_set: &str, query: &str) -> imap::error::Result<Vec<FetchedItem>>;

    fn logout(&mut self) -> imap::error::Result<()>;
}

/// Opens new sessions. Each body worker asks for its own.
pub trait Connector: Sync {
    type Session: MailSession + Send;

    fn connect(&self) -> Result<Self::Session>;
}

/// Logs the session out when dropped, whatever path leaves the scope.
pub struct SessionGuard<S: MailSession> {
    session: S,
}

impl<S: MailSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }
}

impl<S: MailSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: MailSession> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: MailSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Err(e) = self.session.logout() {
            warn!("logout failed: {e}");
        }
    }
}

/// Connects, runs `f` on the session and logs out afterwards.
pub fn with_session<C, T, F>(connector: &C, f: F) -> Result<T>
where
    C: Connector + ?Sized,
    F: FnOnce(&mut C::Session) -> Result<T>,
{
    let mut guard = SessionGuard::new(connector.connect()?);
    f(&mut *guard)
}

type TlsSession = imap::Session<native_tls::TlsStream<TcpStream>>;

/// Password-authenticated IMAP over implicit TLS.
#[derive(Clone)]
pub struct ImapConnector {
    pub host: String,
    pub port: u16,
    pub user: String,
    password: String,
}

impl ImapConnector {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ImapConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl Connector for ImapConnector {
    type Session = ImapSession;

    fn connect(&self) -> Result<ImapSession> {
        let tls = TlsConnector::builder().build()?;
        let client = imap::connect((self.host.as_str(), self.port), self.host.as_str(), &tls)
            .map_err(|source| Error::Connection {
                host: self.host.clone(),
                port: self.port,
                source,
            })?;

        let session = client
            .login(&self.user, &self.password)
            .map_err(|(source, _client)| Error::Auth {
                user: self.user.clone(),
                source,
            })?;
        debug!("logged in: host={}, user={}", self.host, self.user);

        Ok(ImapSession {
            inner: session,
            selected: None,
        })
    }
}

pub struct ImapSession {
    inner: TlsSession,
    /// (mailbox, readonly) currently open, so consecutive batches against
    /// the same mailbox skip the round-trip.
    selected: Option<(String, bool)>,
}

impl MailSession for ImapSession {
    fn select_mailbox(&mut self, mailbox: &str, readonly: bool) -> bool {
        if let Some((current, ro)) = &self.selected
            && current == mailbox
            && *ro == readonly
        {
            return true;
        }
        self.selected = None;

        let opened = if readonly {
            self.inner.examine(mailbox)
        } else {
            self.inner.select(mailbox)
        };

        match opened {
            Ok(info) if info.exists == 0 => {
                warn!("mailbox '{mailbox}' is empty, skipping");
                false
            }
            Ok(_) => {
                self.selected = Some((mailbox.to_string(), readonly));
                true
            }
            Err(imap::Error::No(msg)) | Err(imap::Error::Bad(msg)) => {
                warn!("cannot select mailbox '{mailbox}': {msg}");
                false
            }
            Err(e) => {
                error!("IMAP error while selecting mailbox '{mailbox}': {e}");
                false
            }
        }
    }

    fn search_uids(&mut self, criteria: &str) -> imap::error::Result<Vec<Uid>> {
        let mut uids: Vec<Uid> = self.inner.uid_search(criteria)?.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn list_mailboxes(&mut self) -> imap::error::Result<Vec<ListedMailbox>> {
        let names = self.inner.list(Some(""), Some("*"))?;
        Ok(names.iter().map(ListedMailbox::from_name).collect())
    }

    fn message_count(&mut self, mailbox: &str) -> imap::error::Result<u32> {
        Ok(self.inner.status(mailbox, "(MESSAGES)")?.exists)
    }

    fn uid_fetch(&mut self, uid_set: &str, query: &str) -> imap::error::Result<Vec<FetchedItem>> {
        let fetches = self.inner.uid_fetch(uid_set, query)?;
        Ok(fetches.iter().map(FetchedItem::from_fetch).collect())
    }

    fn logout(&mut self) -> imap::error::Result<()> {
        self.selected = None;
        self.inner.logout()
    }
}

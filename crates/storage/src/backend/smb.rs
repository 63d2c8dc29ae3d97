//! SMB network share storage backend.
//!
//! Built on `pavao` (libsmbclient). The connection is established lazily on
//! the first call and reused until the share becomes unreachable, after which
//! the next call reconnects. libsmbclient is
//! blocking and its context is not safe for concurrent use, so every call
//! runs on the blocking pool while holding the connection lock.

use crate::backend::blocking;
use crate::error::{ErrorKind, Result};
use crate::path::{validate as validate_path, validate_dir};
use crate::{Listing, StorageBackend};
use async_trait::async_trait;
use exn::ResultExt;
use pavao::{SmbClient, SmbCredentials, SmbDirentType, SmbMode, SmbOpenOptions, SmbOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Connection details for an SMB share.
#[derive(Clone)]
pub struct ShareCredentials {
    /// Host name or address, without the `smb://` scheme
    pub server: String,
    pub share: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ShareCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareCredentials")
            .field("server", &self.server)
            .field("share", &self.share)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

struct Connection {
    credentials: ShareCredentials,
    /// Library root inside the share, always starting with `/`.
    root: String,
    client: Mutex<Option<SmbClient>>,
}

impl Connection {
    fn url(&self) -> String {
        format!("smb://{}/{}{}", self.credentials.server, self.credentials.share, self.root)
    }

    fn connect(&self) -> Result<SmbClient> {
        let credentials = SmbCredentials::default()
            .server(format!("smb://{}", self.credentials.server))
            .share(format!("/{}", self.credentials.share))
            .username(&self.credentials.username)
            .password(&self.credentials.password);
        let client = SmbClient::new(credentials, SmbOptions::default().one_share_per_server(true))
            .or_raise(|| ErrorKind::Unreachable(self.url()))?;
        // libsmbclient defers the actual connection; force it now so that a
        // dead share fails here rather than looking like a missing file.
        client.list_dir(&self.root).or_raise(|| ErrorKind::Unreachable(self.url()))?;
        tracing::debug!(url = %self.url(), "Connected to SMB share");
        Ok(client)
    }

    fn with_client<T>(&self, op: impl FnOnce(&SmbClient) -> Result<T>) -> Result<T> {
        let mut guard = match self.client.lock() {
            Ok(guard) => guard,
            Err(_) => exn::bail!(ErrorKind::BackendError("SMB connection lock poisoned".to_string())),
        };
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let Some(client) = guard.as_ref() else {
            exn::bail!(ErrorKind::Unreachable(self.url()));
        };
        let result = op(client);
        forget_if_unreachable(&mut *guard, result)
    }

    /// Share-absolute path for a validated library-relative path.
    fn remote(&self, relative: &Path) -> String {
        let relative = relative.to_string_lossy();
        match (self.root.as_str(), relative.is_empty()) {
            (root, true) => root.to_string(),
            ("/", false) => format!("/{relative}"),
            (root, false) => format!("{root}/{relative}"),
        }
    }

    /// After a failed call, tell "no such file" apart from "share went
    /// away" by probing the library root.
    fn classify_failure(&self, client: &SmbClient, relative: &Path) -> ErrorKind {
        match client.list_dir(&self.root) {
            Ok(_) => ErrorKind::NotFound(relative.to_path_buf()),
            Err(_) => ErrorKind::Unreachable(self.url()),
        }
    }
}

/// Drop the cached client when a call found the share gone.
fn forget_if_unreachable<C, T>(client: &mut Option<C>, result: Result<T>) -> Result<T> {
    if let Err(err) = &result
        && matches!(&**err, ErrorKind::Unreachable(_))
        && client.take().is_some()
    {
        tracing::debug!("Dropped SMB connection; reconnecting on next call");
    }
    result
}

/// SMB network share storage backend.
#[derive(Clone)]
pub struct SmbBackend {
    name: String,
    connection: Arc<Connection>,
}

impl SmbBackend {
    /// Create a backend for `root` inside the share. No connection is made
    /// until the first operation.
    pub fn new(name: impl Into<String>, credentials: ShareCredentials, root: impl AsRef<Path>) -> Result<Self> {
        let root = validate_dir(root)?;
        let root = format!("/{}", root.to_string_lossy());
        let root = match root.as_str() {
            "/" => root,
            _ => root.trim_end_matches('/').to_string(),
        };
        Ok(Self {
            name: name.into(),
            connection: Arc::new(Connection { credentials, root, client: Mutex::new(None) }),
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection, &SmbClient) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        blocking(move || connection.with_client(|client| op(&connection, client))).await
    }
}

#[async_trait]
impl StorageBackend for SmbBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_dir(&self, path: &Path) -> Result<Listing> {
        let relative = validate_dir(path)?;
        self.run(move |connection, client| {
            let entries = match client.list_dir(&connection.remote(&relative)) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::debug!(path = %relative.display(), error = %err, "SMB list_dir failed");
                    exn::bail!(connection.classify_failure(client, &relative));
                },
            };
            let mut listing = Listing::default();
            for entry in entries {
                let name = entry.name().to_string();
                if name == "." || name == ".." {
                    continue;
                }
                match entry.get_type() {
                    SmbDirentType::Dir => listing.directories.push(name),
                    SmbDirentType::File => listing.files.push(name),
                    _ => {},
                }
            }
            Ok(listing.sorted())
        })
        .await
    }

    async fn is_file(&self, path: &Path) -> Result<bool> {
        let relative = validate_path(path)?;
        self.run(move |connection, client| {
            let remote = connection.remote(&relative);
            if client.stat(&remote).is_err() {
                return match connection.classify_failure(client, &relative) {
                    ErrorKind::NotFound(_) => Ok(false),
                    kind => Err(kind.into()),
                };
            }
            // Directories stat fine too; only they can be listed.
            Ok(client.list_dir(&remote).is_err())
        })
        .await
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let relative = validate_dir(path)?;
        self.run(move |connection, client| match client.stat(&connection.remote(&relative)) {
            Ok(_) => Ok(true),
            Err(_) => match connection.classify_failure(client, &relative) {
                ErrorKind::NotFound(_) => Ok(false),
                kind => Err(kind.into()),
            },
        })
        .await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let relative = validate_path(path)?;
        self.run(move |connection, client| {
            let mut file = match client.open_with(connection.remote(&relative), SmbOpenOptions::default().read(true)) {
                Ok(file) => file,
                Err(_) => exn::bail!(connection.classify_failure(client, &relative)),
            };
            let mut buffer = Vec::new();
            file.read_to_end(&mut buffer).map_err(ErrorKind::Io)?;
            Ok(buffer)
        })
        .await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let relative = validate_path(path)?;
        let data = data.to_vec();
        self.run(move |connection, client| {
            let mut parent = PathBuf::new();
            for component in relative.parent().into_iter().flat_map(Path::components) {
                parent.push(component);
                // Fails when the directory already exists; the open below
                // reports anything that actually matters.
                let _ = client.mkdir(&connection.remote(&parent), SmbMode::from(0o755));
            }
            let options = SmbOpenOptions::default().create(true).write(true).truncate(true);
            let mut file = client
                .open_with(connection.remote(&relative), options)
                .or_raise(|| ErrorKind::BackendError(format!("cannot create {}", relative.display())))?;
            file.write_all(&data).map_err(ErrorKind::Io)?;
            file.flush().map_err(ErrorKind::Io)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let relative = validate_path(path)?;
        self.run(move |connection, client| match client.unlink(connection.remote(&relative)) {
            Ok(()) => Ok(()),
            Err(_) => exn::bail!(connection.classify_failure(client, &relative)),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> ShareCredentials {
        ShareCredentials {
            server: "nas.local".to_string(),
            share: "comics".to_string(),
            username: "reader".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_remote_paths() {
        let backend = SmbBackend::new("nas", credentials(), "Library/").unwrap();
        assert_eq!(backend.connection.root, "/Library");
        assert_eq!(backend.connection.remote(Path::new("")), "/Library");
        assert_eq!(backend.connection.remote(Path::new("Series/001.cbz")), "/Library/Series/001.cbz");
        let at_root = SmbBackend::new("nas", credentials(), "").unwrap();
        assert_eq!(at_root.connection.remote(Path::new("a.cbz")), "/a.cbz");
        assert_eq!(at_root.connection.url(), "smb://nas.local/comics/");
    }

    #[test]
    fn test_unreachable_drops_cached_client() {
        let mut client = Some(());
        let result: Result<()> = Err(ErrorKind::Unreachable("smb://nas.local/comics/".to_string()).into());
        assert!(forget_if_unreachable(&mut client, result).is_err());
        assert!(client.is_none());
    }

    #[test]
    fn test_other_failures_keep_cached_client() {
        let mut client = Some(());
        let result: Result<()> = Err(ErrorKind::NotFound(PathBuf::from("a.cbz")).into());
        assert!(forget_if_unreachable(&mut client, result).is_err());
        assert!(client.is_some());
        assert_eq!(forget_if_unreachable(&mut client, Ok(7)).unwrap(), 7);
        assert!(client.is_some());
    }

    #[test]
    fn test_password_is_redacted() {
        assert!(!format!("{:?}", credentials()).contains("hunter2"));
    }

    #[test]
    fn test_root_cannot_escape_share() {
        assert!(SmbBackend::new("nas", credentials(), "../other").is_err());
    }
}

use crate::error::{Error, ErrorKind, Result};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;

pub type LibraryId = i64;

/// Where a library's files live.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    /// Directory on the local filesystem
    Local,
    /// Directory inside an SMB network share
    Smb,
}

impl LibraryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryKind::Local => "local",
            LibraryKind::Smb => "smb",
        }
    }
}

impl Display for LibraryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for LibraryKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(LibraryKind::Local),
            "smb" => Ok(LibraryKind::Smb),
            _ => exn::bail!(ErrorKind::InvalidData("library kind")),
        }
    }
}

/// Credentials for a network share library.
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkCredentials {
    pub server: String,
    pub share: String,
    pub username: String,
    pub password: String,
}

impl Debug for NetworkCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("NetworkCredentials")
            .field("server", &self.server)
            .field("share", &self.share)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A stored library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
    /// Local: absolute directory. Smb: directory inside the share.
    pub root: String,
    pub kind: LibraryKind,
    pub hidden: bool,
    /// Present if and only if `kind` is [`LibraryKind::Smb`].
    pub network: Option<NetworkCredentials>,
}

/// A library definition that hasn't been stored yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLibrary {
    pub name: String,
    pub root: String,
    pub kind: LibraryKind,
    pub hidden: bool,
    pub network: Option<NetworkCredentials>,
}

impl NewLibrary {
    pub fn local(name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            kind: LibraryKind::Local,
            hidden: false,
            network: None,
        }
    }

    pub fn smb(name: impl Into<String>, root: impl Into<String>, network: NetworkCredentials) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            kind: LibraryKind::Smb,
            hidden: false,
            network: Some(network),
        }
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Check the definition is usable before anything is written.
    ///
    /// An SMB library needs every credential field filled in; a local
    /// library must carry no network credentials at all.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| ErrorKind::InvalidLibraryConfig(format!("library `{}`: {reason}", self.name));
        if self.name.trim().is_empty() {
            exn::bail!(invalid("name must not be empty"));
        }
        if self.kind == LibraryKind::Local && self.root.trim().is_empty() {
            exn::bail!(invalid("root must not be empty"));
        }
        match (self.kind, &self.network) {
            (LibraryKind::Local, None) => Ok(()),
            (LibraryKind::Local, Some(_)) => exn::bail!(invalid("local libraries take no network credentials")),
            (LibraryKind::Smb, None) => exn::bail!(invalid("smb libraries need network credentials")),
            (LibraryKind::Smb, Some(network)) => {
                for (field, value) in [
                    ("server", &network.server),
                    ("share", &network.share),
                    ("username", &network.username),
                    ("password", &network.password),
                ] {
                    if value.trim().is_empty() {
                        exn::bail!(invalid(&format!("missing network {field}")));
                    }
                }
                Ok(())
            },
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct LibraryRow {
    id: i64,
    name: String,
    root: String,
    kind: String,
    hidden: bool,
    server: Option<String>,
    share: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl TryFrom<LibraryRow> for Library {
    type Error = Error;
    fn try_from(row: LibraryRow) -> Result<Self> {
        let network = match (row.server, row.share, row.username, row.password) {
            (Some(server), Some(share), Some(username), Some(password)) => {
                Some(NetworkCredentials { server, share, username, password })
            },
            (None, None, None, None) => None,
            _ => exn::bail!(ErrorKind::InvalidData("network credentials")),
        };
        Ok(Self {
            id: row.id,
            name: row.name,
            root: row.root,
            kind: row.kind.parse()?,
            hidden: row.hidden,
            network,
        })
    }
}

/// Bind values for inserting a library, in column order.
pub(crate) struct NewLibraryRow<'a> {
    pub(crate) name: &'a str,
    pub(crate) root: &'a str,
    pub(crate) kind: &'static str,
    pub(crate) hidden: bool,
    pub(crate) server: Option<&'a str>,
    pub(crate) share: Option<&'a str>,
    pub(crate) username: Option<&'a str>,
    pub(crate) password: Option<&'a str>,
}

impl<'a> From<&'a NewLibrary> for NewLibraryRow<'a> {
    fn from(library: &'a NewLibrary) -> Self {
        let network = library.network.as_ref();
        Self {
            name: &library.name,
            root: &library.root,
            kind: library.kind.as_str(),
            hidden: library.hidden,
            server: network.map(|n| n.server.as_str()),
            share: network.map(|n| n.share.as_str()),
            username: network.map(|n| n.username.as_str()),
            password: network.map(|n| n.password.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn credentials() -> NetworkCredentials {
        NetworkCredentials {
            server: "nas.local".to_string(),
            share: "comics".to_string(),
            username: "reader".to_string(),
            password: "secret".to_string(),
        }
    }

    #[rstest]
    #[case("local", LibraryKind::Local)]
    #[case("SMB", LibraryKind::Smb)]
    fn test_kind_parse(#[case] input: &str, #[case] expected: LibraryKind) {
        assert_eq!(input.parse::<LibraryKind>().unwrap(), expected);
    }

    #[test]
    fn test_kind_parse_rejects_unknown() {
        assert!("nfs".parse::<LibraryKind>().is_err());
    }

    #[test]
    fn test_validate_local() {
        assert!(NewLibrary::local("Comics", "/srv/comics").validate().is_ok());
        assert!(NewLibrary::local("  ", "/srv/comics").validate().is_err());
        let mut with_network = NewLibrary::local("Comics", "/srv/comics");
        with_network.network = Some(credentials());
        let err = with_network.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidLibraryConfig(_)));
    }

    #[test]
    fn test_validate_smb() {
        assert!(NewLibrary::smb("Nas", "/", credentials()).validate().is_ok());
        let mut no_network = NewLibrary::smb("Nas", "/", credentials());
        no_network.network = None;
        assert!(no_network.validate().is_err());
    }

    #[rstest]
    #[case::server(|c: &mut NetworkCredentials| c.server.clear())]
    #[case::share(|c: &mut NetworkCredentials| c.share.clear())]
    #[case::username(|c: &mut NetworkCredentials| c.username = " ".to_string())]
    #[case::password(|c: &mut NetworkCredentials| c.password.clear())]
    fn test_validate_smb_missing_field(#[case] blank: fn(&mut NetworkCredentials)) {
        let mut network = credentials();
        blank(&mut network);
        let err = NewLibrary::smb("Nas", "/", network).validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidLibraryConfig(_)));
    }

    #[test]
    fn test_row_with_partial_credentials_is_invalid() {
        let row = LibraryRow {
            id: 1,
            name: "Nas".to_string(),
            root: "/".to_string(),
            kind: "smb".to_string(),
            hidden: false,
            server: Some("nas".to_string()),
            share: None,
            username: None,
            password: None,
        };
        let err = Library::try_from(row).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("network credentials"));
    }

    #[test]
    fn test_debug_redacts_password() {
        assert!(!format!("{:?}", credentials()).contains("secret"));
    }
}

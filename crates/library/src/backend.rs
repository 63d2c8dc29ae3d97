use crate::error::{ErrorKind, Result};
use comicback_catalog::{Library, LibraryKind};
use comicback_storage::BackendHandle;
use comicback_storage::backend::LocalBackend;
use std::path::Path;
use std::sync::Arc;

/// Build the storage backend a library lives on.
///
/// This is the only place that looks at [`Library::kind`]; everything
/// downstream works through the [`BackendHandle`].
pub fn open_backend(library: &Library) -> Result<BackendHandle> {
    match library.kind {
        LibraryKind::Local => {
            let backend = LocalBackend::new(&library.name, &library.root)
                .map_err(|err| ErrorKind::storage(err, Path::new(&library.root)))?;
            Ok(Arc::new(backend))
        },
        LibraryKind::Smb => open_smb(library),
    }
}

#[cfg(feature = "smb")]
fn open_smb(library: &Library) -> Result<BackendHandle> {
    use comicback_storage::backend::{ShareCredentials, SmbBackend};

    let Some(network) = &library.network else {
        exn::bail!(ErrorKind::InvalidLibraryConfig(format!("library `{}` has no network credentials", library.name)));
    };
    let credentials = ShareCredentials {
        server: network.server.clone(),
        share: network.share.clone(),
        username: network.username.clone(),
        password: network.password.clone(),
    };
    let backend = SmbBackend::new(&library.name, credentials, &library.root)
        .map_err(|err| ErrorKind::storage(err, Path::new(&library.root)))?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "smb"))]
fn open_smb(library: &Library) -> Result<BackendHandle> {
    exn::bail!(ErrorKind::DisabledBackend(format!("library `{}` needs smb support", library.name)))
}

use crate::cli::{Cli, Command, LibraryCommand, SmbArgs};
use crate::error::{ErrorKind, Result};
use crate::logging::init_logging;
use comicback_catalog::{Database, Library, NetworkCredentials, NewLibrary, Repository};
use comicback_config::Config;
use comicback_library::{Context, Frame, ImageThumbnailer, Page, ReadingSession, Reconciler};
use exn::ResultExt;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    init_logging(&config.log)?;
    let database = config.database_path().or_raise(|| ErrorKind::Config)?;
    if let Some(parent) = database.parent() {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Output(parent.to_path_buf()))?;
    }
    let db = Database::connect(&database).await.or_raise(|| ErrorKind::Catalog)?;
    tracing::debug!(database = %database.display(), "Opened catalog");
    let result = execute(&config, db.repository(), cli.command).await;
    db.close().await;
    result
}

async fn execute(config: &Config, catalog: Repository, command: Command) -> Result<()> {
    match command {
        Command::Library(command) => library(catalog, command).await,
        Command::Scan { library, path, purge, no_purge } => {
            let purge = match (purge, no_purge) {
                (true, _) => true,
                (_, true) => false,
                _ => config.scan.purge,
            };
            let reconciler = reconciler(config, open(catalog, &library).await?);
            let report = reconciler.scan(&path, purge).await.or_raise(|| ErrorKind::Library)?;
            print_json(&json!(report)).await
        },
        Command::Ls { library, path } => {
            let reconciler = reconciler(config, open(catalog, &library).await?);
            let content =
                reconciler.get_dir_content(&path, config.thumbnails.enabled).await.or_raise(|| ErrorKind::Library)?;
            for entry in content.entries() {
                print_json(&json!(entry)).await?;
            }
            Ok(())
        },
        Command::Page { library, file_id, index, out } => {
            let ctx = open(catalog, &library).await?;
            let page = ctx.fetch_page(file_id, index).await.or_raise(|| ErrorKind::Library)?;
            write_page(&out, &page).await
        },
        Command::Cover { library, file_id, out } => {
            let ctx = open(catalog, &library).await?;
            let cover = ctx.fetch_cover(file_id).await.or_raise(|| ErrorKind::Library)?;
            write_page(&out, &cover).await
        },
        Command::Read { library, file_id, out } => read(open(catalog, &library).await?, file_id, &out).await,
    }
}

async fn library(catalog: Repository, command: LibraryCommand) -> Result<()> {
    match command {
        LibraryCommand::Add { name, root, hidden, smb } => {
            let new = new_library(name, root, smb).hidden(hidden);
            let library = catalog.create_library(&new).await.or_raise(|| ErrorKind::Catalog)?;
            print_json(&describe(&library)).await
        },
        LibraryCommand::List => {
            for library in catalog.list_libraries().await.or_raise(|| ErrorKind::Catalog)? {
                print_json(&describe(&library)).await?;
            }
            Ok(())
        },
        LibraryCommand::Show { name } => {
            let library = find(&catalog, &name).await?;
            let files = catalog.count_files(library.id).await.or_raise(|| ErrorKind::Catalog)?;
            let mut description = describe(&library);
            description["files"] = json!(files);
            print_json(&description).await
        },
        LibraryCommand::Update { name, root, hidden } => {
            let library = update(&catalog, &name, root, hidden).await?;
            print_json(&describe(&library)).await
        },
        LibraryCommand::Remove { name } => {
            let library = find(&catalog, &name).await?;
            catalog.delete_library(library.id).await.or_raise(|| ErrorKind::Catalog)?;
            tracing::info!(library = %name, "Removed library");
            Ok(())
        },
    }
}

/// Missing SMB fields are left empty for the catalog to reject.
fn new_library(name: String, root: String, smb: SmbArgs) -> NewLibrary {
    if smb.is_empty() {
        return NewLibrary::local(name, root);
    }
    let network = NetworkCredentials {
        server: smb.smb_server.unwrap_or_default(),
        share: smb.smb_share.unwrap_or_default(),
        username: smb.smb_user.unwrap_or_default(),
        password: smb.smb_password.unwrap_or_default(),
    };
    NewLibrary::smb(name, root, network)
}

/// Unset fields keep their current value.
async fn update(catalog: &Repository, name: &str, root: Option<String>, hidden: Option<bool>) -> Result<Library> {
    let library = find(catalog, name).await?;
    let root = root.unwrap_or(library.root);
    let hidden = hidden.unwrap_or(library.hidden);
    let updated = catalog.update_library(library.id, &root, hidden).await.or_raise(|| ErrorKind::Catalog)?;
    let updated = updated.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("no library named `{name}`"))))?;
    tracing::info!(library = %name, root = %updated.root, hidden = updated.hidden, "Updated library");
    Ok(updated)
}

fn describe(library: &Library) -> serde_json::Value {
    json!({
        "id": library.id,
        "name": library.name,
        "root": library.root,
        "kind": library.kind.as_str(),
        "hidden": library.hidden,
        "server": library.network.as_ref().map(|n| n.server.as_str()),
        "share": library.network.as_ref().map(|n| n.share.as_str()),
    })
}

async fn find(catalog: &Repository, name: &str) -> Result<Library> {
    let library = catalog.get_library_by_name(name).await.or_raise(|| ErrorKind::Catalog)?;
    library.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(format!("no library named `{name}`"))))
}

async fn open(catalog: Repository, name: &str) -> Result<Context> {
    let library = find(&catalog, name).await?;
    Context::open(library, catalog).or_raise(|| ErrorKind::Library)
}

fn reconciler(config: &Config, ctx: Context) -> Reconciler {
    let reconciler = Reconciler::new(ctx, config.scan.clone());
    if config.thumbnails.enabled {
        reconciler.with_thumbnailer(Arc::new(ImageThumbnailer::from(&config.thumbnails)))
    } else {
        reconciler
    }
}

/// One command per line until stdin closes. A failed command is reported
/// and the session carries on.
async fn read(ctx: Context, file_id: i64, out: &Path) -> Result<()> {
    let (session, frame) = ReadingSession::open(ctx, file_id).await.or_raise(|| ErrorKind::Library)?;
    let mut stdout = tokio::io::stdout();
    emit(&mut stdout, &frame, out).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.or_raise(|| ErrorKind::Input)? {
        if line.trim().is_empty() {
            continue;
        }
        match session.handle(&line).await {
            Ok(frame) => emit(&mut stdout, &frame, out).await?,
            Err(err) => {
                tracing::warn!(command = %line.trim(), error = ?err, "Command failed");
                write_json(&mut stdout, &json!({ "error": err.to_string() })).await?;
            },
        }
    }
    Ok(())
}

/// The state line goes out before the page it describes.
async fn emit(writer: &mut (impl AsyncWrite + Unpin), frame: &Frame, out: &Path) -> Result<()> {
    write_json(writer, &json!(frame.state)).await?;
    write_page(out, &frame.page).await
}

async fn write_page(out: &Path, page: &Page) -> Result<()> {
    tokio::fs::write(out, &page.bytes).await.or_raise(|| ErrorKind::Output(out.to_path_buf()))?;
    tracing::debug!(out = %out.display(), bytes = page.bytes.len(), content_type = page.content_type, "Wrote page");
    Ok(())
}

async fn print_json(value: &serde_json::Value) -> Result<()> {
    write_json(&mut tokio::io::stdout(), value).await
}

async fn write_json(writer: &mut (impl AsyncWrite + Unpin), value: &serde_json::Value) -> Result<()> {
    let mut line = value.to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await.or_raise(|| ErrorKind::Output("<stdout>".into()))?;
    writer.flush().await.or_raise(|| ErrorKind::Output("<stdout>".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use comicback_catalog::LibraryKind;
    use comicback_library::FileState;
    use comicback_catalog::error::ErrorKind as CatalogErrorKind;
    use rstest::rstest;

    fn smb(server: Option<&str>, share: Option<&str>, user: Option<&str>, password: Option<&str>) -> SmbArgs {
        SmbArgs {
            smb_server: server.map(String::from),
            smb_share: share.map(String::from),
            smb_user: user.map(String::from),
            smb_password: password.map(String::from),
        }
    }

    #[test]
    fn test_local_library() {
        let new = new_library("Comics".to_string(), "/srv/comics".to_string(), smb(None, None, None, None));
        assert_eq!(new, NewLibrary::local("Comics", "/srv/comics"));
    }

    #[rstest]
    #[case::no_share(smb(Some("nas"), None, Some("reader"), Some("pw")))]
    #[case::no_password(smb(Some("nas"), Some("media"), Some("reader"), None))]
    #[case::password_only(smb(None, None, None, Some("pw")))]
    fn test_incomplete_smb_library_is_rejected(#[case] args: SmbArgs) {
        let new = new_library("Nas".to_string(), "/".to_string(), args);
        assert_eq!(new.kind, LibraryKind::Smb);
        let err = new.validate().unwrap_err();
        assert!(matches!(&*err, CatalogErrorKind::InvalidLibraryConfig(_)));
    }

    #[test]
    fn test_complete_smb_library() {
        let args = smb(Some("nas"), Some("media"), Some("me"), Some("pw"));
        let new = new_library("Nas".to_string(), "/".to_string(), args);
        assert!(new.validate().is_ok());
        assert_eq!(new.network.unwrap().password, "pw");
    }

    fn frame() -> Frame {
        Frame {
            state: FileState { id: 4, page_count: 3, current_page: 1 },
            page: Page { bytes: b"page two".to_vec(), content_type: "image/png" },
        }
    }

    #[tokio::test]
    async fn test_emit_writes_state_then_page() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("page.png");
        let mut written = Vec::new();
        emit(&mut written, &frame(), &out).await.unwrap();
        let state: serde_json::Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(state, json!({ "id": 4, "page_count": 3, "current_page": 1 }));
        assert_eq!(std::fs::read(&out).unwrap(), b"page two");
    }

    #[tokio::test]
    async fn test_emit_announces_state_before_page_fails() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("missing").join("page.png");
        let mut written = Vec::new();
        let err = emit(&mut written, &frame(), &out).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Output(_)));
        assert!(String::from_utf8(written).unwrap().contains("\"current_page\":1"));
    }

    #[tokio::test]
    async fn test_library_lifecycle() {
        let db = Database::connect_in_memory().await.unwrap();
        let catalog = db.repository();
        let dir = tempfile::tempdir().unwrap();
        let add = LibraryCommand::Add {
            name: "Comics".to_string(),
            root: dir.path().to_string_lossy().into_owned(),
            hidden: true,
            smb: smb(None, None, None, None),
        };
        library(catalog.clone(), add).await.unwrap();
        let stored = find(&catalog, "Comics").await.unwrap();
        assert!(stored.hidden);
        library(catalog.clone(), LibraryCommand::Show { name: "Comics".to_string() }).await.unwrap();
        let moved = update(&catalog, "Comics", Some("/mnt/comics".to_string()), None).await.unwrap();
        assert_eq!(moved.root, "/mnt/comics");
        assert!(moved.hidden);
        let visible = update(&catalog, "Comics", None, Some(false)).await.unwrap();
        assert_eq!(visible.root, "/mnt/comics");
        assert!(!visible.hidden);
        let root = dir.path().to_string_lossy().into_owned();
        library(catalog.clone(), LibraryCommand::Update { name: "Comics".to_string(), root: Some(root), hidden: None })
            .await
            .unwrap();
        assert!(open(catalog.clone(), "Comics").await.is_ok());
        library(catalog.clone(), LibraryCommand::Remove { name: "Comics".to_string() }).await.unwrap();
        let err = find(&catalog, "Comics").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let err = update(&catalog, "Comics", None, Some(true)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}

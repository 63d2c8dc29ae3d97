//! Interactive reading sessions.
//!
//! A session is a file id and nothing else. The current page lives in the
//! catalog and is re-read for every command, so progress survives a
//! dropped connection and two readers of the same file never work from a
//! stale copy.

use crate::context::{Context, Page};
use crate::error::{ErrorKind, Result};
use comicback_catalog::{FileId, FileRecord};
use exn::ResultExt;
use serde::Serialize;
use std::str::FromStr;

/// A navigation command, one per client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `+`
    Next,
    /// `-`
    Previous,
    /// Any integer, including out-of-range ones (which do nothing).
    Goto(i64),
}

impl FromStr for Command {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "+" => Ok(Self::Next),
            "-" => Ok(Self::Previous),
            token => token.parse().map(Self::Goto).or_raise(|| ErrorKind::InvalidCommand(token.to_string())),
        }
    }
}

/// What the client is told about the file before each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileState {
    pub id: FileId,
    pub page_count: usize,
    pub current_page: usize,
}

impl From<&FileRecord> for FileState {
    fn from(record: &FileRecord) -> Self {
        Self { id: record.id, page_count: record.page_count(), current_page: record.current_page }
    }
}

/// One response: the file state followed by the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub state: FileState,
    pub page: Page,
}

#[derive(Debug, Clone)]
pub struct ReadingSession {
    ctx: Context,
    file_id: FileId,
}

impl ReadingSession {
    /// Start reading a file, returning the session and its opening frame.
    pub async fn open(ctx: Context, file_id: FileId) -> Result<(Self, Frame)> {
        let session = Self { ctx, file_id };
        let frame = session.frame().await?;
        Ok((session, frame))
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    /// The frame for the file's persisted current page.
    pub async fn frame(&self) -> Result<Frame> {
        let record = self.ctx.file(self.file_id).await?;
        self.frame_for(&record).await
    }

    async fn frame_for(&self, record: &FileRecord) -> Result<Frame> {
        let page = self.ctx.page_of(record, record.current_page).await?;
        Ok(Frame { state: FileState::from(record), page })
    }

    /// Move to `page` if it exists; otherwise leave the record as it is.
    ///
    /// Navigation saturates at both ends instead of wrapping or failing.
    pub async fn set_page(&self, page: i64) -> Result<FileRecord> {
        let record = self.ctx.file(self.file_id).await?;
        self.set_page_of(record, page).await
    }

    async fn set_page_of(&self, record: FileRecord, page: i64) -> Result<FileRecord> {
        let Some(page) = usize::try_from(page).ok().filter(|page| *page < record.page_count()) else {
            tracing::debug!(id = record.id, page, pages = record.page_count(), "Page out of range; ignoring");
            return Ok(record);
        };
        if page == record.current_page {
            return Ok(record);
        }
        let updated = self.ctx.catalog().set_current_page(record.id, page).await.or_raise(|| ErrorKind::Catalog)?;
        match updated {
            Some(updated) => Ok(updated),
            // Deleted or rewritten underneath us; report whatever is there now.
            None => self.ctx.file(self.file_id).await,
        }
    }

    /// Apply a command and return the resulting record.
    pub async fn apply(&self, command: Command) -> Result<FileRecord> {
        let record = self.ctx.file(self.file_id).await?;
        let current = i64::try_from(record.current_page).unwrap_or(i64::MAX);
        let target = match command {
            Command::Next => current.saturating_add(1),
            Command::Previous => current.saturating_sub(1),
            Command::Goto(page) => page,
        };
        self.set_page_of(record, target).await
    }

    /// Handle one client token: parse, apply, and produce the next frame.
    ///
    /// An error only concerns this command; the session stays usable.
    pub async fn handle(&self, token: &str) -> Result<Frame> {
        let command: Command = token.parse()?;
        let record = self.apply(command).await?;
        self.frame_for(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reconciler;
    use crate::fixtures::{comic, context_with};
    use rstest::rstest;

    async fn session(pages: usize) -> (ReadingSession, Frame) {
        let (ctx, _) = context_with([("a.cbz", comic(pages, 1))]).await;
        let record = Reconciler::new(ctx.clone(), Default::default())
            .resolve_file("a.cbz")
            .await
            .unwrap()
            .into_record()
            .unwrap();
        ReadingSession::open(ctx, record.id).await.unwrap()
    }

    #[rstest]
    #[case("+", Command::Next)]
    #[case("-", Command::Previous)]
    #[case("7", Command::Goto(7))]
    #[case(" 2\n", Command::Goto(2))]
    #[case("-3", Command::Goto(-3))]
    fn test_parse(#[case] token: &str, #[case] expected: Command) {
        assert_eq!(token.parse::<Command>().unwrap(), expected);
    }

    #[rstest]
    #[case("next")]
    #[case("")]
    #[case("++")]
    #[case("1.5")]
    fn test_parse_invalid(#[case] token: &str) {
        let err = token.parse::<Command>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn test_opening_frame() {
        let (_, frame) = session(3).await;
        assert_eq!(frame.state.page_count, 3);
        assert_eq!(frame.state.current_page, 0);
        assert_eq!(frame.page.content_type, "image/png");
        let json = serde_json::to_value(frame.state).unwrap();
        assert_eq!(json["page_count"], 3);
        assert_eq!(json["current_page"], 0);
    }

    #[tokio::test]
    async fn test_next_clamps_at_last_page() {
        let (session, _) = session(3).await;
        let mut pages = Vec::new();
        for _ in 0..3 {
            pages.push(session.handle("+").await.unwrap().state.current_page);
        }
        assert_eq!(pages, vec![1, 2, 2]);
        let record = session.ctx.file(session.file_id()).await.unwrap();
        assert!(record.is_on_last_page());
    }

    #[tokio::test]
    async fn test_previous_clamps_at_first_page() {
        let (session, _) = session(3).await;
        assert_eq!(session.handle("-").await.unwrap().state.current_page, 0);
        assert_eq!(session.handle("2").await.unwrap().state.current_page, 2);
        assert_eq!(session.handle("-").await.unwrap().state.current_page, 1);
    }

    #[rstest]
    #[case(3)]
    #[case(-1)]
    #[case(i64::MAX)]
    #[tokio::test]
    async fn test_out_of_range_goto_is_ignored(#[case] page: i64) {
        let (session, _) = session(3).await;
        session.set_page(1).await.unwrap();
        let record = session.set_page(page).await.unwrap();
        assert_eq!(record.current_page, 1);
    }

    #[tokio::test]
    async fn test_progress_is_persisted() {
        let (session, _) = session(4).await;
        session.handle("3").await.unwrap();
        let (_, reopened) = ReadingSession::open(session.ctx.clone(), session.file_id()).await.unwrap();
        assert_eq!(reopened.state.current_page, 3);
    }

    #[tokio::test]
    async fn test_bad_command_keeps_session_usable() {
        let (session, _) = session(2).await;
        assert!(session.handle("forward").await.is_err());
        assert_eq!(session.handle("+").await.unwrap().state.current_page, 1);
    }

    #[tokio::test]
    async fn test_unknown_file() {
        let (ctx, _) = context_with([("a.cbz", comic(1, 1))]).await;
        let err = ReadingSession::open(ctx, 99).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}

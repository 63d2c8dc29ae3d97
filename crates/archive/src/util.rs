use crate::{ArchiveKind, IMAGE_EXTENSIONS};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

impl Display for ArchiveKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for ArchiveKind {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl ArchiveKind {
    /// Returns the short name used for persistence and display.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Rar => "rar",
        }
    }
}

fn lowercase_extension(name: &str) -> Option<String> {
    Path::new(name).extension().and_then(|ext| ext.to_str()).map(str::to_lowercase)
}

/// Returns `true` if an archive member name looks like a page image.
#[must_use]
pub fn is_image(name: &str) -> bool {
    if name.ends_with('/') || name.ends_with('\\') {
        return false;
    }
    lowercase_extension(name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Filter archive members down to page images in page order.
///
/// Page order is plain lexicographic order of the member names, so it is
/// stable for a given archive no matter how often it is scanned.
#[must_use]
pub fn page_names<I, S>(members: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut pages: Vec<String> = members.into_iter().map(Into::into).filter(|name| is_image(name)).collect();
    pages.sort();
    pages
}

/// MIME type of a page, derived from its member name.
#[must_use]
pub fn content_type(name: &str) -> Option<&'static str> {
    Some(match lowercase_extension(name)?.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ArchiveKind::Zip, "zip")]
    #[case(ArchiveKind::Rar, "rar")]
    fn test_display_round_trips(#[case] kind: ArchiveKind, #[case] expected: &str) {
        assert_eq!(kind.to_string(), expected);
        assert_eq!(expected.parse::<ArchiveKind>().unwrap(), kind);
    }

    #[rstest]
    #[case("001.jpg", true)]
    #[case("pages/002.JPEG", true)]
    #[case("cover.Png", true)]
    #[case("anim.gif", true)]
    #[case("p.webp", true)]
    #[case("p.bmp", true)]
    #[case("ComicInfo.xml", false)]
    #[case("Thumbs.db", false)]
    #[case("images.jpg/", false)]
    #[case("jpg", false)]
    fn test_is_image(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_image(name), expected);
    }

    #[test]
    fn test_page_names_filters_and_sorts() {
        let members = ["b/002.jpg", "ComicInfo.xml", "a/010.png", "b/001.jpg", "b/", "a/009.PNG"];
        assert_eq!(page_names(members), vec!["a/009.PNG", "a/010.png", "b/001.jpg", "b/002.jpg"]);
    }

    #[test]
    fn test_page_names_is_stable() {
        let forwards = page_names(["3.jpg", "1.jpg", "2.jpg"]);
        let backwards = page_names(["2.jpg", "1.jpg", "3.jpg"]);
        assert_eq!(forwards, backwards);
    }

    #[rstest]
    #[case("001.jpg", Some("image/jpeg"))]
    #[case("001.JPEG", Some("image/jpeg"))]
    #[case("001.png", Some("image/png"))]
    #[case("001.webp", Some("image/webp"))]
    #[case("001.txt", None)]
    fn test_content_type(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(content_type(name), expected);
    }
}

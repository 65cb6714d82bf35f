//! Network responses to local records.

use crate::error::Result;
use crate::intern::StringTable;
use crate::naming::parse_file_date;
use crate::types::{Artwork, FileKind, InternId, User};

use super::response::{ArtworkResponse, UgoiraMetadataResponse, UserDetailResponse, UserResponse};

/// Builds a local record, interning tag and tool names.
///
/// The file time comes from the first original image URL. When that URL is missing or carries
/// no date, the work is treated as withdrawn: the record is marked officially removed and the
/// creation time stands in for the file time. The unknown-work placeholder thumbnail is treated
/// the same way.
pub fn artwork_from_response(source: &ArtworkResponse, tags: &StringTable, tools: &StringTable) -> Result<Artwork> {
    let mut artwork = Artwork::new(source.id);
    artwork.user_id = source.user.id;
    artwork.total_view = source.total_view;
    artwork.total_bookmarks = source.total_bookmarks;
    artwork.page_count = source.page_count;
    artwork.width = source.width;
    artwork.height = source.height;
    artwork.kind = source.kind;
    artwork.created = source.create_date.to_utc();
    artwork.title = source.title.clone().unwrap_or_default();
    artwork.caption = source.caption.clone().unwrap_or_default();
    artwork.flags.set_restricted(source.x_restrict > 0);
    artwork.flags.set_bookmarked(source.is_bookmarked);
    artwork.flags.set_visible(source.visible);
    artwork.flags.set_muted(source.is_muted);
    artwork.tags = unique(tags.register_all(source.tags.iter().map(|tag| tag.name.as_str()))?);
    artwork.tools = unique(tools.register_all(source.tools.iter().map(String::as_str))?);

    let original = source.first_original_url();
    artwork.extension = original.map(FileKind::from_path).unwrap_or_default();
    match original.and_then(parse_file_date) {
        Some(date) => artwork.file_date = date,
        None => {
            tracing::debug!(artwork.id = source.id, "no dated original url; marking removed");
            artwork.file_date = artwork.created;
            artwork.flags.set_officially_removed(true);
        }
    }
    if source.is_unknown() {
        artwork.flags.set_officially_removed(true);
    }
    Ok(artwork)
}

/// Drops repeated ids, keeping first occurrences in order.
fn unique(ids: Vec<InternId>) -> Vec<InternId> {
    let mut kept = Vec::with_capacity(ids.len());
    for id in ids {
        if !kept.contains(&id) {
            kept.push(id);
        }
    }
    kept
}

#[must_use]
pub fn user_from_response(source: &UserResponse) -> User {
    let mut user = User::new(source.id);
    user.name.clone_from(&source.name);
    user.account.clone_from(&source.account);
    user.is_followed = source.is_followed;
    user.image_url.clone_from(&source.profile_image_urls.medium);
    user.comment.clone_from(&source.comment);
    user
}

#[must_use]
pub fn user_from_detail(source: &UserDetailResponse) -> User {
    let mut user = user_from_response(&source.user);
    user.profile.clone_from(&source.profile);
    user.profile_publicity.clone_from(&source.profile_publicity);
    user.workspace.clone_from(&source.workspace);
    user
}

/// Frame delays in milliseconds, in playback order.
#[must_use]
pub fn frames_from_metadata(source: &UgoiraMetadataResponse) -> Vec<u16> {
    source.ugoira_metadata.frames.iter().map(|frame| frame.delay).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::response::IllustsResponse;

    fn sample(original: &str, square: &str) -> ArtworkResponse {
        let json = format!(
            r#"{{ "id": 7, "type": "manga", "title": "T", "user": {{ "id": 42, "name": "ink" }},
                 "tags": [{{ "name": "sea" }}, {{ "name": "sky" }}, {{ "name": "sea" }}], "tools": ["SAI"],
                 "create_date": "2023-05-01T23:30:00+09:00", "page_count": 3, "x_restrict": 1,
                 "image_urls": {{ "square_medium": "{square}" }},
                 "meta_pages": [{{ "image_urls": {{ "original": "{original}" }} }}],
                 "total_view": 5, "visible": true }}"#
        );
        let page: IllustsResponse = serde_json::from_str(&format!(r#"{{ "illusts": [{json}] }}"#)).unwrap();
        page.illusts.into_iter().next().unwrap()
    }

    #[test]
    fn converts_fields_and_interns_names() {
        let (tags, tools) = (StringTable::new(), StringTable::new());
        let source = sample(
            "https://i.pximg.net/img-original/img/2023/05/01/23/30/00/7_p0.jpg",
            "https://i.pximg.net/c/360x360_70/img-master/img/2023/05/01/23/30/00/7_p0_square1200.jpg",
        );
        let artwork = artwork_from_response(&source, &tags, &tools).unwrap();
        assert_eq!(artwork.user_id, 42);
        assert_eq!(artwork.extension, FileKind::Jpg);
        assert_eq!(artwork.file_date.to_rfc3339(), "2023-05-01T23:30:00+00:00");
        assert_eq!(artwork.created.to_rfc3339(), "2023-05-01T14:30:00+00:00");
        assert!(artwork.flags.restricted() && artwork.flags.visible());
        assert!(!artwork.flags.officially_removed());
        assert_eq!(artwork.tags.len(), 2, "repeated tag collapses");
        assert_eq!(tags.len(), 2);
        assert_eq!(tools.get_id("SAI"), Some(artwork.tools[0]));
    }

    #[test]
    fn undated_or_unknown_work_is_removed() {
        let (tags, tools) = (StringTable::new(), StringTable::new());
        let artwork = artwork_from_response(&sample("", "x"), &tags, &tools).unwrap();
        assert!(artwork.flags.officially_removed());
        assert_eq!(artwork.file_date, artwork.created);

        let unknown = sample(
            "https://i.pximg.net/img-original/img/2023/05/01/23/30/00/7_p0.jpg",
            "https://s.pximg.net/common/images/limit_unknown_360.png",
        );
        assert!(artwork_from_response(&unknown, &tags, &tools).unwrap().flags.officially_removed());
    }

    #[test]
    fn user_fields() {
        let source: UserResponse = serde_json::from_str(
            r#"{ "id": 3, "name": "n", "account": "a", "is_followed": true, "profile_image_urls": { "medium": "m" } }"#,
        )
        .unwrap();
        let user = user_from_response(&source);
        assert_eq!(user.image_url.as_deref(), Some("m"));
        assert!(user.is_followed);
        assert_eq!(user.memo, None);
    }
}

//! Re-syncing the same work through the pipeline.

use std::sync::Mutex;

use pixvault_core::{
    ArchiveConfig, Artwork, CancellationToken, FetchError, HideReason, Pipeline, StaticToken, Store,
    SyncMode, Transport, Upsert,
};

const START: &str = "https://app-api.pixiv.net/v1/user/illusts?user_id=42";

/// Serves one fixed page, then ends the listing.
struct OnePage {
    body: Mutex<Option<Vec<u8>>>,
}

impl OnePage {
    fn new(id: u64, view: u64, author: u64) -> Self {
        let body = format!(
            r#"{{ "illusts": [{{ "id": {id}, "title": "v{view}", "user": {{ "id": {author}, "name": "ink" }},
                 "total_view": {view}, "total_bookmarks": {bookmarks}, "create_date": "2023-06-01T10:00:00+09:00",
                 "meta_single_page": {{ "original_image_url": "https://i.pximg.net/img-original/img/2023/06/01/10/00/00/{id}_p0.png" }} }}],
               "next_url": null }}"#,
            bookmarks = view / 10
        );
        Self {
            body: Mutex::new(Some(body.into_bytes())),
        }
    }
}

impl Transport for OnePage {
    fn fetch_page(&self, _url: &str, _token: &str) -> Result<Vec<u8>, FetchError> {
        Ok(self.body.lock().expect("page lock").take().unwrap_or_default())
    }
}

fn sync(store: &Store, page: OnePage) {
    let config = ArchiveConfig {
        retry_delay_secs: 0,
        ..ArchiveConfig::default()
    };
    Pipeline::new(store, page, StaticToken("token".into()), config)
        .run(START, SyncMode::Full, &CancellationToken::new())
        .expect("sync");
}

#[test]
fn views_only_move_forward_and_author_loss_marks_removal() {
    let store = Store::new();

    sync(&store, OnePage::new(7, 100, 42));
    let first = store.get_artwork(7).expect("inserted");
    assert_eq!(first.total_view, 100);
    assert!(!first.flags.officially_removed());
    assert_eq!(store.get_user(42).and_then(|user| user.name).as_deref(), Some("ink"));

    sync(&store, OnePage::new(7, 150, 42));
    let second = store.get_artwork(7).expect("stored");
    assert_eq!(second.total_view, 150);
    assert_eq!(second.total_bookmarks, 15);

    sync(&store, OnePage::new(7, 90, 0));
    let third = store.get_artwork(7).expect("stored");
    assert_eq!(third.total_view, 150);
    assert_eq!(third.total_bookmarks, 15, "bookmarks follow the view decision");
    assert!(third.flags.officially_removed());
    assert_eq!(third.title, "v90", "other fields are replaced");
    assert_eq!(third.user_id, 42, "the original author is kept");
}

#[test]
fn local_curation_survives_a_resync() {
    let store = Store::new();
    sync(&store, OnePage::new(8, 10, 42));
    store.set_hide_reason(8, HideReason::Dislike).expect("hide");
    store.set_memo(8, Some("keep".into())).expect("memo");
    store.set_page_hide(8, 0, HideReason::Crop).expect("page hide");

    sync(&store, OnePage::new(8, 20, 42));
    let artwork = store.get_artwork(8).expect("stored");
    assert_eq!(artwork.total_view, 20);
    assert_eq!(artwork.hide_reason, HideReason::Dislike);
    assert_eq!(artwork.memo.as_deref(), Some("keep"));
    assert_eq!(artwork.page_hide.map(|pages| pages.len()), Some(1));
}

#[test]
fn removal_is_sticky() {
    let store = Store::new();
    let mut gone = Artwork::new(9);
    gone.user_id = 42;
    gone.flags.set_officially_removed(true);
    assert_eq!(store.merge_artwork(gone), Upsert::Inserted);

    sync(&store, OnePage::new(9, 5, 42));
    assert!(store.get_artwork(9).expect("stored").flags.officially_removed());
}

#[test]
fn an_authorless_work_is_not_inserted() {
    let store = Store::new();
    sync(&store, OnePage::new(10, 5, 0));
    assert!(!store.contains_artwork(10));
    assert_eq!(store.user_count(), 0);
}

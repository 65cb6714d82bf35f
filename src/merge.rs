//! Overwrite rules for folding freshly fetched records into stored ones.
//!
//! Upstream fields are replaced; locally curated fields survive unless the fresh record carries
//! its own value. Counters only move forward.

use crate::types::{Artwork, DetailProfile, ProfilePublicity, User, Workspace};

impl Artwork {
    /// Merges `fresh` into `self`. A record with a different identity is ignored.
    ///
    /// * A changed or zero author marks the record officially removed. The flag is sticky.
    /// * View count is taken when `fresh` is at least as large; bookmarks follow that decision.
    /// * Hide reason, hide-last, memo, page hide map, extra tags and fake tags are kept unless
    ///   `fresh` supplies them.
    pub fn overwrite(&mut self, fresh: &Artwork) {
        if self.id != fresh.id {
            tracing::debug!(artwork.id = self.id, fresh.id = fresh.id, "overwrite with mismatched identity ignored");
            return;
        }

        if fresh.user_id == 0 || fresh.user_id != self.user_id {
            self.flags.set_officially_removed(true);
        }
        if fresh.flags.officially_removed() {
            self.flags.set_officially_removed(true);
        }

        if fresh.total_view >= self.total_view {
            self.total_view = fresh.total_view;
            self.total_bookmarks = fresh.total_bookmarks;
        }

        self.page_count = fresh.page_count;
        self.width = fresh.width;
        self.height = fresh.height;
        self.kind = fresh.kind;
        self.extension = fresh.extension;
        self.flags.set_restricted(fresh.flags.restricted());
        self.flags.set_bookmarked(fresh.flags.bookmarked());
        self.flags.set_visible(fresh.flags.visible());
        self.flags.set_muted(fresh.flags.muted());
        if fresh.flags.hide_last() {
            self.flags.set_hide_last(true);
        }
        self.created = fresh.created;
        self.file_date = fresh.file_date;
        self.tags.clone_from(&fresh.tags);
        self.tools.clone_from(&fresh.tools);
        self.title.clone_from(&fresh.title);
        self.caption.clone_from(&fresh.caption);

        if fresh.hide_reason.is_hidden() {
            self.hide_reason = fresh.hide_reason;
        }
        overlay(&mut self.memo, fresh.memo.as_ref());
        overlay(&mut self.page_hide, fresh.page_hide.as_ref());
        overlay(&mut self.extra_tags, fresh.extra_tags.as_ref());
        overlay(&mut self.fake_tags, fresh.fake_tags.as_ref());
        overlay(&mut self.frames, fresh.frames.as_ref());
    }
}

impl User {
    /// Merges `fresh` into `self`. Follow and mute state come from upstream; image and comment
    /// fill gaps only; nested blocks merge field by field; memo, extra tags and hide reason are
    /// local and never touched.
    pub fn overwrite(&mut self, fresh: &User) {
        if self.id != fresh.id {
            return;
        }
        overlay(&mut self.name, fresh.name.as_ref());
        overlay(&mut self.account, fresh.account.as_ref());
        self.is_followed = fresh.is_followed;
        self.is_muted = fresh.is_muted;
        fill(&mut self.image_url, fresh.image_url.as_ref());
        fill(&mut self.comment, fresh.comment.as_ref());

        if let Some(fresh) = &fresh.profile {
            self.profile.get_or_insert_with(Default::default).overwrite(fresh);
        }
        if let Some(fresh) = &fresh.profile_publicity {
            self.profile_publicity
                .get_or_insert_with(Default::default)
                .overwrite(fresh);
        }
        if let Some(fresh) = &fresh.workspace {
            self.workspace.get_or_insert_with(Default::default).overwrite(fresh);
        }
    }
}

/// Replace when the fresh side has a value.
fn overlay<T: Clone>(target: &mut Option<T>, fresh: Option<&T>) {
    if let Some(value) = fresh {
        *target = Some(value.clone());
    }
}

/// Set only when nothing is stored yet.
fn fill<T: Clone>(target: &mut Option<T>, fresh: Option<&T>) {
    if target.is_none() {
        *target = fresh.cloned();
    }
}

macro_rules! overlay_fields {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $ty {
            /// Field-by-field merge: every `Some` on the fresh side wins.
            pub fn overwrite(&mut self, fresh: &$ty) {
                $(overlay(&mut self.$field, fresh.$field.as_ref());)+
            }
        }
    };
}

overlay_fields!(DetailProfile {
    webpage,
    gender,
    birth,
    birth_day,
    birth_year,
    region,
    address_id,
    country_code,
    job,
    job_id,
    total_follow_users,
    total_mypixiv_users,
    total_illusts,
    total_manga,
    total_novels,
    total_illust_bookmarks_public,
    total_illust_series,
    total_novel_series,
    background_image_url,
    twitter_account,
    twitter_url,
    pawoo_url,
    is_premium,
    is_using_custom_profile_image,
});

overlay_fields!(ProfilePublicity {
    gender,
    region,
    birth_day,
    birth_year,
    job,
    pawoo,
});

overlay_fields!(Workspace {
    pc,
    monitor,
    tool,
    scanner,
    tablet,
    mouse,
    printer,
    desktop,
    music,
    desk,
    chair,
    comment,
    workspace_image_url,
});

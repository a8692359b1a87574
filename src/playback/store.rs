use std::{future::Future, pin::Pin};

use anyhow::Result;

use crate::db::{Database, GroupFilter, Word};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// What the playback loop needs from the word store.
pub trait WordStore: Send + Sync {
    /// Add one play. Resolves to `false` when the word no longer exists.
    fn increment_play_count<'a>(&'a self, word_id: &'a str) -> StoreFuture<'a, bool>;

    /// Selected words under the filter, in list order.
    fn get_selected<'a>(&'a self, filter: GroupFilter) -> StoreFuture<'a, Vec<Word>>;
}

impl WordStore for Database {
    fn increment_play_count<'a>(&'a self, word_id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(Database::increment_play_count(self, word_id))
    }

    fn get_selected<'a>(&'a self, filter: GroupFilter) -> StoreFuture<'a, Vec<Word>> {
        Box::pin(Database::get_selected(self, filter))
    }
}

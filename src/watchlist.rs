use crate::database::{self, MovieDb, WatchlistDb};
use crate::error::{Error, Result};
use crate::model::{Id, WatchStatus, WatchlistEntry, WatchlistItem};
use chrono::Utc;
use log::{debug, info, warn};

/// Per-user movie tracking. At most one entry per (user, movie); only the owner may
/// change or remove an entry.
#[derive(Clone)]
pub struct Watchlist<D> {
    db: D,
}

impl<D: WatchlistDb + MovieDb> Watchlist<D> {
    pub fn new(db: D) -> Self {
        Watchlist { db }
    }

    fn with_movie(&self, item: WatchlistItem) -> Result<Option<WatchlistEntry>> {
        Ok(self
            .db
            .get_movie(item.movie_id)?
            .map(|movie| WatchlistEntry { item, movie }))
    }

    fn entry(&self, item: WatchlistItem) -> Result<WatchlistEntry> {
        let movie_id = item.movie_id;
        self.with_movie(item)?
            .ok_or(Error::MovieNotFound(movie_id))
    }

    /// Fetches the item and checks it belongs to `caller_id`.
    fn owned_item(&self, item_id: Id, caller_id: Id) -> Result<WatchlistItem> {
        let item = self
            .db
            .get_watchlist_item(item_id)?
            .ok_or(Error::ItemNotFound(item_id))?;
        if item.user_id != caller_id {
            warn!(
                "user {} tried to modify watchlist item {} of user {}",
                caller_id, item_id, item.user_id
            );
            return Err(Error::Unauthorized);
        }
        Ok(item)
    }

    /// Newest first, optionally restricted to one status.
    pub fn list_for_user(
        &self,
        user_id: Id,
        status: Option<WatchStatus>,
    ) -> Result<Vec<WatchlistEntry>> {
        let mut items: Vec<_> = self
            .db
            .list_watchlist_items(user_id)?
            .into_iter()
            .filter(|item| status.map_or(true, |status| item.status == status))
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            // The movie may have been deleted since the items were read.
            if let Some(entry) = self.with_movie(item)? {
                entries.push(entry);
            }
        }
        debug!("user {} has {} watchlist entries", user_id, entries.len());
        Ok(entries)
    }

    pub fn add(&self, user_id: Id, movie_id: Id, status: WatchStatus) -> Result<WatchlistEntry> {
        let item = WatchlistItem {
            id: 0,
            user_id,
            movie_id,
            status,
            created_at: Utc::now(),
        };
        let item = match self.db.add_watchlist_item(item) {
            Ok(item) => item,
            Err(database::Error::MissingReference("user")) => {
                return Err(Error::UserNotFound(user_id))
            }
            Err(database::Error::MissingReference(_)) => {
                return Err(Error::MovieNotFound(movie_id))
            }
            Err(database::Error::UniqueViolation(_)) => {
                return Err(Error::AlreadyInWatchlist(movie_id))
            }
            Err(err) => return Err(err.into()),
        };
        info!(
            "user {} added movie {} to watchlist as {}",
            user_id, movie_id, status
        );
        self.entry(item)
    }

    pub fn update_status(
        &self,
        item_id: Id,
        caller_id: Id,
        status: WatchStatus,
    ) -> Result<WatchlistEntry> {
        self.owned_item(item_id, caller_id)?;
        let item = match self.db.set_watchlist_status(item_id, status) {
            Ok(item) => item,
            Err(database::Error::NotFound) => return Err(Error::ItemNotFound(item_id)),
            Err(err) => return Err(err.into()),
        };
        info!("watchlist item {} set to {}", item_id, status);
        self.entry(item)
    }

    pub fn remove(&self, item_id: Id, caller_id: Id) -> Result<()> {
        self.owned_item(item_id, caller_id)?;
        match self.db.remove_watchlist_item(item_id) {
            Ok(_) => {
                info!("watchlist item {} removed by user {}", item_id, caller_id);
                Ok(())
            }
            Err(database::Error::NotFound) => Err(Error::ItemNotFound(item_id)),
            Err(err) => Err(err.into()),
        }
    }

    pub fn remove_by_movie(&self, user_id: Id, movie_id: Id) -> Result<()> {
        let item = self
            .db
            .find_watchlist_item(user_id, movie_id)?
            .ok_or(Error::NotInWatchlist(movie_id))?;
        match self.db.remove_watchlist_item(item.id) {
            Ok(_) => {
                info!("user {} removed movie {} from watchlist", user_id, movie_id);
                Ok(())
            }
            Err(database::Error::NotFound) => Err(Error::NotInWatchlist(movie_id)),
            Err(err) => Err(err.into()),
        }
    }
}

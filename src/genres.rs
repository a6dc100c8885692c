use crate::database::{self, GenreDb};
use crate::error::{Error, Result};
use crate::model::{Genre, Id};
use log::debug;

/// Maps genre names to genre ids, creating missing genres exactly once.
#[derive(Clone)]
pub struct GenreReconciler<D> {
    db: D,
}

impl<D: GenreDb> GenreReconciler<D> {
    pub fn new(db: D) -> Self {
        GenreReconciler { db }
    }

    /// Resolves `names` in order. Names are trimmed but otherwise matched exactly; blank
    /// names are skipped. Repeated names resolve to the same id.
    pub fn resolve<I, S>(&self, names: I) -> Result<Vec<Id>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            ids.push(self.get_or_create(name)?.id);
        }
        Ok(ids)
    }

    fn get_or_create(&self, name: &str) -> Result<Genre> {
        match self.db.upsert_genre(name) {
            Ok(genre) => Ok(genre),
            // Lost a race against a concurrent create: the row exists now.
            Err(database::Error::UniqueViolation(_)) => {
                debug!("genre {:?} created concurrently, re-reading", name);
                self.db
                    .get_genre_by_name(name)?
                    .ok_or_else(|| Error::internal(format_args!("genre {:?} vanished", name)))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// All genres, ordered by name.
    pub fn list(&self) -> Result<Vec<Genre>> {
        let mut genres = self.db.list_genres()?;
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }
}

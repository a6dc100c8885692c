use crate::credentials::Identity;
use crate::database::{self, GenreDb, MovieDb};
use crate::error::{Error, Result};
use crate::gate::ensure_role;
use crate::genres::GenreReconciler;
use crate::model::{Id, Movie, MovieWithGenres, Role};
use chrono::{Datelike, Utc};
use log::{debug, info};
use serde::Deserialize;

const MIN_YEAR: i32 = 1800;
const MAX_RATING: f32 = 10.0;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieFilter {
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub search: Option<String>,
}

/// Input of [`Catalog::create`]. Required fields are optional here so that a missing
/// one is reported as `MissingRequiredField` instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMovie {
    pub title: Option<String>,
    pub description: Option<String>,
    pub year: Option<i32>,
    pub director: Option<String>,
    pub duration: Option<u32>,
    pub rating: Option<f32>,
    pub image: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Input of [`Catalog::update`]. `None` leaves a field unchanged, and so does an empty
/// title, description or director.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub year: Option<i32>,
    pub director: Option<String>,
    pub duration: Option<u32>,
    pub rating: Option<f32>,
    pub image: Option<Option<String>>,
    /// Replaces every genre of the movie when non-empty.
    pub genres: Option<Vec<String>>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::MissingRequiredField(field)),
    }
}

fn non_empty(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|value| !value.trim().is_empty())
}

fn check_year(year: i32) -> Result<()> {
    let max = Utc::now().year() + 5;
    if year < MIN_YEAR || year > max {
        return Err(Error::invalid("Invalid year"));
    }
    Ok(())
}

fn check_rating(rating: f32) -> Result<()> {
    if !(0.0..=MAX_RATING).contains(&rating) {
        return Err(Error::invalid("Rating must be between 0 and 10"));
    }
    Ok(())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl MovieFilter {
    fn normalized(value: &Option<String>) -> Option<String> {
        value
            .as_ref()
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty())
    }

    fn matcher(&self) -> impl Fn(&MovieWithGenres) -> bool {
        let genre = Self::normalized(&self.genre);
        let search = Self::normalized(&self.search);
        let year = self.year;
        move |entry| {
            let movie = &entry.movie;
            if let Some(year) = year {
                if movie.year != year {
                    return false;
                }
            }
            if let Some(genre) = &genre {
                if !entry.genre_names().any(|name| contains_ignore_case(name, genre)) {
                    return false;
                }
            }
            if let Some(search) = &search {
                let hit = contains_ignore_case(&movie.title, search)
                    || contains_ignore_case(&movie.description, search)
                    || contains_ignore_case(&movie.director, search);
                if !hit {
                    return false;
                }
            }
            true
        }
    }
}

/// Movie records and their genre links. Reads are public, mutations are admin only.
pub struct Catalog<D> {
    db: D,
    genres: GenreReconciler<D>,
}

impl<D: MovieDb + GenreDb + Clone> Catalog<D> {
    pub fn new(db: D) -> Self {
        Catalog {
            genres: GenreReconciler::new(db.clone()),
            db,
        }
    }

    pub fn genres(&self) -> &GenreReconciler<D> {
        &self.genres
    }

    /// Newest first. Unset or blank filters match everything.
    pub fn list(&self, filter: &MovieFilter) -> Result<Vec<MovieWithGenres>> {
        let matches = filter.matcher();
        let mut movies: Vec<_> = self
            .db
            .list_movies()?
            .into_iter()
            .filter(|movie| matches(movie))
            .collect();
        movies.sort_by(|a, b| {
            (b.movie.created_at, b.movie.id).cmp(&(a.movie.created_at, a.movie.id))
        });
        debug!("{} movies match {:?}", movies.len(), filter);
        Ok(movies)
    }

    pub fn get(&self, id: Id) -> Result<Option<MovieWithGenres>> {
        Ok(self.db.get_movie(id)?)
    }

    pub fn create(&self, caller: &Identity, data: NewMovie) -> Result<MovieWithGenres> {
        ensure_role(caller, Role::Admin)?;
        let title = required(data.title, "title")?;
        let description = required(data.description, "description")?;
        let year = data.year.ok_or(Error::MissingRequiredField("year"))?;
        let director = required(data.director, "director")?;
        if data.genres.is_empty() {
            return Err(Error::GenreRequired);
        }
        check_year(year)?;
        let rating = data.rating.unwrap_or(0.0);
        check_rating(rating)?;

        let genre_ids = self.genres.resolve(&data.genres)?;
        if genre_ids.is_empty() {
            return Err(Error::GenreRequired);
        }
        let movie = Movie {
            id: 0,
            title,
            description,
            year,
            director,
            duration: data.duration.unwrap_or(0),
            rating,
            image: data.image,
            created_at: Utc::now(),
        };
        let created = self.db.add_movie(movie, &genre_ids)?;
        info!(
            "movie {} {:?} created by user {}",
            created.movie.id, created.movie.title, caller.id
        );
        Ok(created)
    }

    pub fn update(
        &self,
        caller: &Identity,
        id: Id,
        changes: MovieChanges,
    ) -> Result<MovieWithGenres> {
        ensure_role(caller, Role::Admin)?;
        if let Some(year) = changes.year {
            check_year(year)?;
        }
        if let Some(rating) = changes.rating {
            check_rating(rating)?;
        }
        if changes.duration == Some(0) {
            return Err(Error::invalid("Duration must be positive"));
        }

        let genre_ids = match changes.genres.as_ref().filter(|names| !names.is_empty()) {
            Some(names) => {
                // Avoid creating genres for a movie that is not there.
                if self.db.get_movie(id)?.is_none() {
                    return Err(Error::MovieNotFound(id));
                }
                let ids = self.genres.resolve(names)?;
                if ids.is_empty() {
                    return Err(Error::GenreRequired);
                }
                Some(ids)
            }
            None => None,
        };

        let apply = |movie: &mut Movie| {
            if let Some(title) = non_empty(&changes.title) {
                movie.title = title.clone();
            }
            if let Some(description) = non_empty(&changes.description) {
                movie.description = description.clone();
            }
            if let Some(director) = non_empty(&changes.director) {
                movie.director = director.clone();
            }
            if let Some(year) = changes.year {
                movie.year = year;
            }
            if let Some(duration) = changes.duration {
                movie.duration = duration;
            }
            if let Some(rating) = changes.rating {
                movie.rating = rating;
            }
            if let Some(image) = &changes.image {
                movie.image = image.clone();
            }
        };
        match self.db.update_movie(id, apply, genre_ids.as_deref()) {
            Ok(updated) => {
                info!("movie {} updated by user {}", id, caller.id);
                Ok(updated)
            }
            Err(database::Error::NotFound) => Err(Error::MovieNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Also removes every watchlist entry for the movie.
    pub fn delete(&self, caller: &Identity, id: Id) -> Result<()> {
        ensure_role(caller, Role::Admin)?;
        match self.db.delete_movie(id) {
            Ok(removed) => {
                info!(
                    "movie {} deleted by user {}, {} watchlist entries removed",
                    id, caller.id, removed
                );
                Ok(())
            }
            Err(database::Error::NotFound) => Err(Error::MovieNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }
}

use crate::model::*;
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{
    abort, ConflictableTransactionResult, TransactionError, Transactional, TransactionalTree,
};
use std::convert::TryInto;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated on {0}")]
    UniqueViolation(&'static str),
    #[error("dangling reference to {0}")]
    MissingReference(&'static str),
    #[error("corrupt entry in {0}")]
    Corrupt(&'static str),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

type TxResult<T> = ConflictableTransactionResult<T, Error>;

impl From<TransactionError<Error>> for Error {
    fn from(err: TransactionError<Error>) -> Self {
        match err {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => Error::Storage(err),
        }
    }
}

fn serialize_id(id: Id) -> [u8; 8] {
    id.to_le_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Result<Id> {
    let bytes: [u8; 8] = id.as_ref().try_into().map_err(|_| Error::Corrupt("id"))?;
    Ok(u64::from_le_bytes(bytes))
}

/// Key of a composite index, `first ++ second`. Prefix scans by `first` stay possible.
fn pair_key(first: Id, second: Id) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&serialize_id(first));
    key[8..].copy_from_slice(&serialize_id(second));
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(raw)?)
}

fn tx<T>(result: Result<T>) -> TxResult<T> {
    result.or_else(|err| abort(err))
}

/// Drops repeated ids, keeping the first occurrence.
fn distinct(ids: &[Id]) -> Vec<Id> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

fn read_id_set(tree: &TransactionalTree, key: &[u8]) -> TxResult<Vec<Id>> {
    match tree.get(key)? {
        Some(raw) => tx(decode(&raw)),
        None => Ok(Vec::new()),
    }
}

fn write_id_set(tree: &TransactionalTree, key: &[u8], ids: &[Id]) -> TxResult<()> {
    if ids.is_empty() {
        tree.remove(key)?;
    } else {
        tree.insert(key, tx(encode(&ids))?)?;
    }
    Ok(())
}

fn read_movie(
    movies: &TransactionalTree,
    links: &TransactionalTree,
    genres: &TransactionalTree,
    id: Id,
) -> TxResult<Option<MovieWithGenres>> {
    let key = serialize_id(id);
    let movie: Movie = match movies.get(&key[..])? {
        Some(raw) => tx(decode(&raw))?,
        None => return Ok(None),
    };
    let mut resolved = Vec::new();
    for genre_id in read_id_set(links, &key)? {
        match genres.get(&serialize_id(genre_id)[..])? {
            Some(raw) => resolved.push(tx(decode(&raw))?),
            None => return abort(Error::MissingReference("genre")),
        }
    }
    Ok(Some(MovieWithGenres {
        movie,
        genres: resolved,
    }))
}

fn check_genres(genres: &TransactionalTree, ids: &[Id]) -> TxResult<()> {
    for id in ids {
        if genres.get(&serialize_id(*id)[..])?.is_none() {
            return abort(Error::MissingReference("genre"));
        }
    }
    Ok(())
}

pub trait UserDb {
    /// Stores a new user under a fresh id. Fails with `UniqueViolation` if the email is taken.
    fn add_user(&self, user: User) -> Result<User>;
    fn get_user(&self, id: Id) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn list_users(&self) -> Result<Vec<User>>;
}

pub trait GenreDb {
    /// Atomic get-or-create by exact name. A store that cannot do this in one step may
    /// fail with `UniqueViolation` when it loses a race; callers re-read the row then.
    fn upsert_genre(&self, name: &str) -> Result<Genre>;
    fn get_genre_by_name(&self, name: &str) -> Result<Option<Genre>>;
    fn list_genres(&self) -> Result<Vec<Genre>>;
}

pub trait MovieDb {
    /// Stores the movie and its genre links in one transaction.
    fn add_movie(&self, movie: Movie, genre_ids: &[Id]) -> Result<MovieWithGenres>;
    fn get_movie(&self, id: Id) -> Result<Option<MovieWithGenres>>;
    fn list_movies(&self) -> Result<Vec<MovieWithGenres>>;
    /// Applies `apply` to the stored movie and, if given, replaces its genre links, all in
    /// one transaction. `apply` may run more than once.
    fn update_movie<F>(&self, id: Id, apply: F, genre_ids: Option<&[Id]>) -> Result<MovieWithGenres>
    where
        F: Fn(&mut Movie);
    /// Removes the movie, its genre links and every watchlist item pointing at it.
    /// Returns the number of watchlist items removed.
    fn delete_movie(&self, id: Id) -> Result<usize>;
}

pub trait WatchlistDb {
    /// Fails with `MissingReference` if the user or the movie is absent and `UniqueViolation` if the
    /// user already tracks it.
    fn add_watchlist_item(&self, item: WatchlistItem) -> Result<WatchlistItem>;
    fn get_watchlist_item(&self, id: Id) -> Result<Option<WatchlistItem>>;
    fn find_watchlist_item(&self, user_id: Id, movie_id: Id) -> Result<Option<WatchlistItem>>;
    fn list_watchlist_items(&self, user_id: Id) -> Result<Vec<WatchlistItem>>;
    fn set_watchlist_status(&self, id: Id, status: WatchStatus) -> Result<WatchlistItem>;
    fn remove_watchlist_item(&self, id: Id) -> Result<WatchlistItem>;
}

const USERS: &[u8] = b"users";
const USERS_EMAIL: &[u8] = b"users_email";
const GENRES: &[u8] = b"genres";
const GENRES_NAME: &[u8] = b"genres_name";
const MOVIES: &[u8] = b"movies";
const MOVIE_GENRES: &[u8] = b"movie_genres";
const WATCHLIST: &[u8] = b"watchlist";
const WATCHLIST_USER_MOVIE: &[u8] = b"watchlist_user_movie";
const MOVIE_WATCHERS: &[u8] = b"movie_watchers";

impl UserDb for sled::Db {
    fn add_user(&self, mut user: User) -> Result<User> {
        let users = self.open_tree(USERS)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        user.id = self.generate_id()?;
        let key = serialize_id(user.id);
        let value = encode(&user)?;
        (&users, &users_email).transaction(|(users, users_email)| -> TxResult<()> {
            if users_email
                .insert(user.email.as_bytes(), &key[..])?
                .is_some()
            {
                return abort(Error::UniqueViolation("users.email"));
            }
            users.insert(&key[..], value.as_slice())?;
            Ok(())
        })?;
        Ok(user)
    }

    fn get_user(&self, id: Id) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        match users.get(serialize_id(id))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let user = (&users, &users_email).transaction(
            |(users, users_email)| -> TxResult<Option<User>> {
                let id = match users_email.get(email.as_bytes())? {
                    Some(id) => id,
                    None => return Ok(None),
                };
                match users.get(&id)? {
                    Some(raw) => Ok(Some(tx(decode(&raw))?)),
                    None => abort(Error::Corrupt("users_email")),
                }
            },
        )?;
        Ok(user)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let users = self.open_tree(USERS)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let key = serialize_id(user.id);
        let value = encode(user)?;
        (&users, &users_email).transaction(|(users, users_email)| -> TxResult<()> {
            let previous: User = match users.get(&key[..])? {
                Some(raw) => tx(decode(&raw))?,
                None => return abort(Error::NotFound),
            };
            if previous.email != user.email {
                if users_email
                    .insert(user.email.as_bytes(), &key[..])?
                    .is_some()
                {
                    return abort(Error::UniqueViolation("users.email"));
                }
                users_email.remove(previous.email.as_bytes())?;
            }
            users.insert(&key[..], value.as_slice())?;
            Ok(())
        })?;
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        self.open_tree(USERS)?
            .iter()
            .values()
            .map(|raw| decode(&raw?))
            .collect()
    }
}

impl GenreDb for sled::Db {
    fn upsert_genre(&self, name: &str) -> Result<Genre> {
        let genres = self.open_tree(GENRES)?;
        let genres_name = self.open_tree(GENRES_NAME)?;
        // Only used if the name turns out to be new.
        let candidate = self.generate_id()?;
        let genre = (&genres, &genres_name).transaction(
            |(genres, genres_name)| -> TxResult<Genre> {
                if let Some(id) = genres_name.get(name.as_bytes())? {
                    return match genres.get(&id)? {
                        Some(raw) => tx(decode(&raw)),
                        None => abort(Error::Corrupt("genres_name")),
                    };
                }
                let genre = Genre {
                    id: candidate,
                    name: name.to_owned(),
                };
                let key = serialize_id(candidate);
                genres.insert(&key[..], tx(encode(&genre))?)?;
                genres_name.insert(name.as_bytes(), &key[..])?;
                Ok(genre)
            },
        )?;
        Ok(genre)
    }

    fn get_genre_by_name(&self, name: &str) -> Result<Option<Genre>> {
        let genres = self.open_tree(GENRES)?;
        let genres_name = self.open_tree(GENRES_NAME)?;
        match genres_name.get(name.as_bytes())? {
            Some(id) => match genres.get(&id)? {
                Some(raw) => Ok(Some(decode(&raw)?)),
                None => Err(Error::Corrupt("genres_name")),
            },
            None => Ok(None),
        }
    }

    fn list_genres(&self) -> Result<Vec<Genre>> {
        self.open_tree(GENRES)?
            .iter()
            .values()
            .map(|raw| decode(&raw?))
            .collect()
    }
}

impl MovieDb for sled::Db {
    fn add_movie(&self, mut movie: Movie, genre_ids: &[Id]) -> Result<MovieWithGenres> {
        let movies = self.open_tree(MOVIES)?;
        let links = self.open_tree(MOVIE_GENRES)?;
        let genres = self.open_tree(GENRES)?;
        movie.id = self.generate_id()?;
        let key = serialize_id(movie.id);
        let value = encode(&movie)?;
        let genre_ids = distinct(genre_ids);
        let created = (&movies, &links, &genres).transaction(
            |(movies, links, genres)| -> TxResult<MovieWithGenres> {
                check_genres(genres, &genre_ids)?;
                if movies.insert(&key[..], value.as_slice())?.is_some() {
                    return abort(Error::UniqueViolation("movies.id"));
                }
                write_id_set(links, &key, &genre_ids)?;
                match read_movie(movies, links, genres, movie.id)? {
                    Some(created) => Ok(created),
                    None => abort(Error::NotFound),
                }
            },
        )?;
        Ok(created)
    }

    fn get_movie(&self, id: Id) -> Result<Option<MovieWithGenres>> {
        let movies = self.open_tree(MOVIES)?;
        let links = self.open_tree(MOVIE_GENRES)?;
        let genres = self.open_tree(GENRES)?;
        // One read transaction, so the genre links always match the movie record.
        let movie = (&movies, &links, &genres)
            .transaction(|(movies, links, genres)| read_movie(movies, links, genres, id))?;
        Ok(movie)
    }

    fn list_movies(&self) -> Result<Vec<MovieWithGenres>> {
        let ids = self
            .open_tree(MOVIES)?
            .iter()
            .keys()
            .map(|key| deserialize_id(key?))
            .collect::<Result<Vec<_>>>()?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            // Rows deleted since the scan are skipped.
            if let Some(movie) = self.get_movie(id)? {
                out.push(movie);
            }
        }
        Ok(out)
    }

    fn update_movie<F>(&self, id: Id, apply: F, genre_ids: Option<&[Id]>) -> Result<MovieWithGenres>
    where
        F: Fn(&mut Movie),
    {
        let movies = self.open_tree(MOVIES)?;
        let links = self.open_tree(MOVIE_GENRES)?;
        let genres = self.open_tree(GENRES)?;
        let key = serialize_id(id);
        let genre_ids = genre_ids.map(distinct);
        let updated = (&movies, &links, &genres).transaction(
            |(movies, links, genres)| -> TxResult<MovieWithGenres> {
                let mut movie: Movie = match movies.get(&key[..])? {
                    Some(raw) => tx(decode(&raw))?,
                    None => return abort(Error::NotFound),
                };
                apply(&mut movie);
                movie.id = id;
                movies.insert(&key[..], tx(encode(&movie))?)?;
                if let Some(genre_ids) = &genre_ids {
                    check_genres(genres, genre_ids)?;
                    write_id_set(links, &key, genre_ids)?;
                }
                match read_movie(movies, links, genres, id)? {
                    Some(updated) => Ok(updated),
                    None => abort(Error::NotFound),
                }
            },
        )?;
        Ok(updated)
    }

    fn delete_movie(&self, id: Id) -> Result<usize> {
        let movies = self.open_tree(MOVIES)?;
        let links = self.open_tree(MOVIE_GENRES)?;
        let watchlist = self.open_tree(WATCHLIST)?;
        let pairs = self.open_tree(WATCHLIST_USER_MOVIE)?;
        let watchers = self.open_tree(MOVIE_WATCHERS)?;
        let key = serialize_id(id);
        let removed = (&movies, &links, &watchlist, &pairs, &watchers).transaction(
            |(movies, links, watchlist, pairs, watchers)| -> TxResult<usize> {
                if movies.remove(&key[..])?.is_none() {
                    return abort(Error::NotFound);
                }
                links.remove(&key[..])?;
                let item_ids = read_id_set(watchers, &key)?;
                for item_id in &item_ids {
                    if let Some(raw) = watchlist.remove(&serialize_id(*item_id)[..])? {
                        let item: WatchlistItem = tx(decode(&raw))?;
                        pairs.remove(&pair_key(item.user_id, item.movie_id)[..])?;
                    }
                }
                watchers.remove(&key[..])?;
                Ok(item_ids.len())
            },
        )?;
        Ok(removed)
    }
}

impl WatchlistDb for sled::Db {
    fn add_watchlist_item(&self, mut item: WatchlistItem) -> Result<WatchlistItem> {
        let users = self.open_tree(USERS)?;
        let movies = self.open_tree(MOVIES)?;
        let watchlist = self.open_tree(WATCHLIST)?;
        let pairs = self.open_tree(WATCHLIST_USER_MOVIE)?;
        let watchers = self.open_tree(MOVIE_WATCHERS)?;
        item.id = self.generate_id()?;
        let key = serialize_id(item.id);
        let user_key = serialize_id(item.user_id);
        let movie_key = serialize_id(item.movie_id);
        let pair = pair_key(item.user_id, item.movie_id);
        let value = encode(&item)?;
        (&users, &movies, &watchlist, &pairs, &watchers).transaction(
            |(users, movies, watchlist, pairs, watchers)| -> TxResult<()> {
                if users.get(&user_key[..])?.is_none() {
                    return abort(Error::MissingReference("user"));
                }
                if movies.get(&movie_key[..])?.is_none() {
                    return abort(Error::MissingReference("movie"));
                }
                if pairs.insert(&pair[..], &key[..])?.is_some() {
                    return abort(Error::UniqueViolation("watchlist.user_movie"));
                }
                watchlist.insert(&key[..], value.as_slice())?;
                let mut item_ids = read_id_set(watchers, &movie_key)?;
                item_ids.push(item.id);
                write_id_set(watchers, &movie_key, &item_ids)?;
                Ok(())
            },
        )?;
        Ok(item)
    }

    fn get_watchlist_item(&self, id: Id) -> Result<Option<WatchlistItem>> {
        let watchlist = self.open_tree(WATCHLIST)?;
        match watchlist.get(serialize_id(id))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn find_watchlist_item(&self, user_id: Id, movie_id: Id) -> Result<Option<WatchlistItem>> {
        let watchlist = self.open_tree(WATCHLIST)?;
        let pairs = self.open_tree(WATCHLIST_USER_MOVIE)?;
        let pair = pair_key(user_id, movie_id);
        let item = (&watchlist, &pairs).transaction(
            |(watchlist, pairs)| -> TxResult<Option<WatchlistItem>> {
                let id = match pairs.get(&pair[..])? {
                    Some(id) => id,
                    None => return Ok(None),
                };
                match watchlist.get(&id)? {
                    Some(raw) => Ok(Some(tx(decode(&raw))?)),
                    None => abort(Error::Corrupt("watchlist_user_movie")),
                }
            },
        )?;
        Ok(item)
    }

    fn list_watchlist_items(&self, user_id: Id) -> Result<Vec<WatchlistItem>> {
        let watchlist = self.open_tree(WATCHLIST)?;
        let pairs = self.open_tree(WATCHLIST_USER_MOVIE)?;
        let mut items = Vec::new();
        for entry in pairs.scan_prefix(serialize_id(user_id)) {
            let (_, item_id) = entry?;
            if let Some(raw) = watchlist.get(&item_id)? {
                items.push(decode(&raw)?);
            }
        }
        Ok(items)
    }

    fn set_watchlist_status(&self, id: Id, status: WatchStatus) -> Result<WatchlistItem> {
        let watchlist = self.open_tree(WATCHLIST)?;
        let key = serialize_id(id);
        let item = watchlist.transaction(|watchlist| -> TxResult<WatchlistItem> {
            let mut item: WatchlistItem = match watchlist.get(&key[..])? {
                Some(raw) => tx(decode(&raw))?,
                None => return abort(Error::NotFound),
            };
            item.status = status;
            watchlist.insert(&key[..], tx(encode(&item))?)?;
            Ok(item)
        })?;
        Ok(item)
    }

    fn remove_watchlist_item(&self, id: Id) -> Result<WatchlistItem> {
        let watchlist = self.open_tree(WATCHLIST)?;
        let pairs = self.open_tree(WATCHLIST_USER_MOVIE)?;
        let watchers = self.open_tree(MOVIE_WATCHERS)?;
        let key = serialize_id(id);
        let item = (&watchlist, &pairs, &watchers).transaction(
            |(watchlist, pairs, watchers)| -> TxResult<WatchlistItem> {
                let item: WatchlistItem = match watchlist.remove(&key[..])? {
                    Some(raw) => tx(decode(&raw))?,
                    None => return abort(Error::NotFound),
                };
                pairs.remove(&pair_key(item.user_id, item.movie_id)[..])?;
                let movie_key = serialize_id(item.movie_id);
                let mut item_ids = read_id_set(watchers, &movie_key)?;
                item_ids.retain(|other| *other != id);
                write_id_set(watchers, &movie_key, &item_ids)?;
                Ok(item)
            },
        )?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn temp_db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    fn user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: 0,
            email: email.to_owned(),
            password_hash: "x".to_owned(),
            name: None,
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    fn movie(title: &str) -> Movie {
        Movie {
            id: 0,
            title: title.to_owned(),
            description: "d".to_owned(),
            year: 2020,
            director: "z".to_owned(),
            duration: 0,
            rating: 0.0,
            image: None,
            created_at: Utc::now(),
        }
    }

    fn item(user_id: Id, movie_id: Id) -> WatchlistItem {
        WatchlistItem {
            id: 0,
            user_id,
            movie_id,
            status: WatchStatus::Watchlist,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn email_index_rejects_duplicates() {
        let db = temp_db();
        let first = db.add_user(user("a@example.com")).unwrap();
        match db.add_user(user("a@example.com")) {
            Err(Error::UniqueViolation(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(db.list_users().unwrap().len(), 1);
        let found = db.get_user_by_email("a@example.com").unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[test]
    fn update_user_moves_email_index() {
        let db = temp_db();
        let mut a = db.add_user(user("a@example.com")).unwrap();
        db.add_user(user("b@example.com")).unwrap();

        a.email = "b@example.com".to_owned();
        assert!(matches!(
            db.update_user(&a),
            Err(Error::UniqueViolation(_))
        ));

        a.email = "c@example.com".to_owned();
        db.update_user(&a).unwrap();
        assert!(db.get_user_by_email("a@example.com").unwrap().is_none());
        assert_eq!(
            db.get_user_by_email("c@example.com").unwrap().unwrap().id,
            a.id
        );
    }

    #[test]
    fn upsert_genre_is_idempotent() {
        let db = temp_db();
        let first = db.upsert_genre("Drama").unwrap();
        let second = db.upsert_genre("Drama").unwrap();
        assert_eq!(first, second);
        assert_eq!(db.list_genres().unwrap().len(), 1);
    }

    #[test]
    fn movie_links_are_deduplicated() {
        let db = temp_db();
        let drama = db.upsert_genre("Drama").unwrap();
        let created = db
            .add_movie(movie("X"), &[drama.id, drama.id])
            .unwrap();
        assert_eq!(created.genres, vec![drama]);
    }

    #[test]
    fn add_movie_rejects_unknown_genre() {
        let db = temp_db();
        assert!(matches!(
            db.add_movie(movie("X"), &[4242]),
            Err(Error::MissingReference("genre"))
        ));
        assert!(db.list_movies().unwrap().is_empty());
    }

    #[test]
    fn delete_movie_cascades_to_watchlist() {
        let db = temp_db();
        let a = db.add_user(user("a@example.com")).unwrap().id;
        let b = db.add_user(user("b@example.com")).unwrap().id;
        let drama = db.upsert_genre("Drama").unwrap();
        let doomed = db.add_movie(movie("X"), &[drama.id]).unwrap().movie;
        let kept = db.add_movie(movie("Y"), &[drama.id]).unwrap().movie;
        db.add_watchlist_item(item(a, doomed.id)).unwrap();
        db.add_watchlist_item(item(b, doomed.id)).unwrap();
        let survivor = db.add_watchlist_item(item(a, kept.id)).unwrap();

        assert_eq!(db.delete_movie(doomed.id).unwrap(), 2);
        assert!(db.get_movie(doomed.id).unwrap().is_none());
        assert!(db.find_watchlist_item(b, doomed.id).unwrap().is_none());
        assert_eq!(db.list_watchlist_items(a).unwrap(), vec![survivor]);
        assert!(db.list_watchlist_items(b).unwrap().is_empty());
        assert!(matches!(db.delete_movie(doomed.id), Err(Error::NotFound)));
    }

    #[test]
    fn watchlist_pair_is_unique() {
        let db = temp_db();
        let drama = db.upsert_genre("Drama").unwrap();
        let m = db.add_movie(movie("X"), &[drama.id]).unwrap().movie;
        let u = db.add_user(user("a@example.com")).unwrap().id;
        db.add_watchlist_item(item(u, m.id)).unwrap();
        assert!(matches!(
            db.add_watchlist_item(item(u, m.id)),
            Err(Error::UniqueViolation(_))
        ));
        assert!(matches!(
            db.add_watchlist_item(item(u, m.id + 1000)),
            Err(Error::MissingReference("movie"))
        ));
        assert_eq!(db.list_watchlist_items(u).unwrap().len(), 1);
    }

    #[test]
    fn watchlist_item_needs_an_existing_user() {
        let db = temp_db();
        let drama = db.upsert_genre("Drama").unwrap();
        let m = db.add_movie(movie("X"), &[drama.id]).unwrap().movie;
        assert!(matches!(
            db.add_watchlist_item(item(424242, m.id)),
            Err(Error::MissingReference("user"))
        ));
        assert!(db.list_watchlist_items(424242).unwrap().is_empty());
        assert!(db.find_watchlist_item(424242, m.id).unwrap().is_none());
    }

    #[test]
    fn removed_item_frees_the_pair() {
        let db = temp_db();
        let drama = db.upsert_genre("Drama").unwrap();
        let m = db.add_movie(movie("X"), &[drama.id]).unwrap().movie;
        let u = db.add_user(user("a@example.com")).unwrap().id;
        let added = db.add_watchlist_item(item(u, m.id)).unwrap();
        db.remove_watchlist_item(added.id).unwrap();
        assert!(matches!(
            db.remove_watchlist_item(added.id),
            Err(Error::NotFound)
        ));
        db.add_watchlist_item(item(u, m.id)).unwrap();
    }
}

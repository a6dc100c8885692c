use anyhow::Context;
use cinelist::accounts::Accounts;
use cinelist::catalog::{Catalog, MovieFilter, NewMovie};
use cinelist::config::Config;
use cinelist::credentials::{Credentials, Identity};
use log::{debug, info};

fn sample(
    title: &str,
    description: &str,
    year: i32,
    genres: &[&str],
    duration: u32,
    director: &str,
    rating: f32,
) -> NewMovie {
    NewMovie {
        title: Some(title.to_owned()),
        description: Some(description.to_owned()),
        year: Some(year),
        director: Some(director.to_owned()),
        duration: Some(duration),
        rating: Some(rating),
        image: None,
        genres: genres.iter().map(|genre| genre.to_string()).collect(),
    }
}

fn sample_movies() -> Vec<NewMovie> {
    vec![
        sample(
            "Inception",
            "A thief who steals corporate secrets through dream-sharing technology is given the inverse task of planting an idea.",
            2010,
            &["Science Fiction", "Action", "Thriller"],
            148,
            "Christopher Nolan",
            8.8,
        ),
        sample(
            "The Dark Knight",
            "Batman faces the Joker, who wreaks havoc and chaos on the people of Gotham.",
            2008,
            &["Action", "Crime", "Drama"],
            152,
            "Christopher Nolan",
            9.0,
        ),
        sample(
            "Interstellar",
            "A team of explorers travel through a wormhole in space to ensure humanity's survival.",
            2014,
            &["Science Fiction", "Drama", "Adventure"],
            169,
            "Christopher Nolan",
            8.6,
        ),
        sample(
            "The Matrix",
            "A computer hacker learns about the true nature of his reality and his role in the war against its controllers.",
            1999,
            &["Science Fiction", "Action"],
            136,
            "The Wachowskis",
            8.7,
        ),
        sample(
            "Pulp Fiction",
            "The lives of two mob hitmen, a boxer, a gangster and his wife intertwine in four tales of violence and redemption.",
            1994,
            &["Crime", "Drama"],
            154,
            "Quentin Tarantino",
            8.9,
        ),
    ]
}

fn main() -> anyhow::Result<()> {
    let dotenv = dotenv::dotenv();
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "cinelist=debug");
    }
    env_logger::init();
    if let Ok(path) = dotenv {
        debug!("loaded {}", path.display());
    }

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    let db = config
        .open_database()
        .with_context(|| format!("opening {}", config.database.path.display()))?;
    let credentials = Credentials::new(&config.auth);

    let admin = match &config.admin {
        Some(admin) => {
            let accounts = Accounts::new(db.clone(), credentials);
            accounts.ensure_admin(&admin.email, &admin.password, admin.name.clone())?
        }
        None => {
            info!("no admin account configured, nothing to seed");
            return Ok(());
        }
    };
    let caller = Identity::from(&admin);

    let catalog = Catalog::new(db.clone());
    if catalog.list(&MovieFilter::default())?.is_empty() {
        for movie in sample_movies() {
            let created = catalog.create(&caller, movie)?;
            debug!(
                "seeded {:?} with genres {:?}",
                created.movie.title,
                created.genre_names().collect::<Vec<_>>()
            );
        }
    }
    info!(
        "catalog has {} movies in {} genres",
        catalog.list(&MovieFilter::default())?.len(),
        catalog.genres().list()?.len()
    );

    db.flush()?;
    Ok(())
}

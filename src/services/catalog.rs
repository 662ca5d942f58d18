use crate::cache::CacheService;
use crate::config::SeatingConfig;
use crate::error::AppError;
use crate::models::{Event, Movie, MovieCategory, Showtime};
use crate::seating::{AuditoriumLayout, Cell};
use crate::store::{ShowtimeFilter, Store};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieQuery {
    #[serde(default)]
    pub category: MovieCategory,
    pub q: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub upcoming: bool,
}

/// Сеанс для страницы выбора мест: карта плюс раскладка зала.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeDetails {
    #[serde(flatten)]
    pub showtime: Showtime,
    pub layout: Vec<Vec<Cell>>,
}

/// Витрина. Ошибки чтения логируются: списки отдаются пустыми,
/// отдельный фильм или сеанс - как 404.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    cache: Option<CacheService>,
    seating: SeatingConfig,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>, cache: Option<CacheService>, seating: SeatingConfig) -> Self {
        Self {
            store,
            cache,
            seating,
        }
    }

    pub async fn movies(&self, query: &MovieQuery) -> Vec<Movie> {
        let mut movies: Vec<Movie> = self
            .all_movies()
            .await
            .into_iter()
            .filter(|m| m.in_category(query.category))
            .filter(|m| query.q.as_deref().map_or(true, |q| m.matches_query(q)))
            .collect();

        if query.category == MovieCategory::Popular {
            // Без порядка - в конец, дальше по названию
            movies.sort_by(|a, b| {
                let key = |m: &Movie| (m.popular_order.is_none(), m.popular_order);
                key(a).cmp(&key(b)).then_with(|| a.title.cmp(&b.title))
            });
        }
        movies
    }

    async fn all_movies(&self) -> Vec<Movie> {
        if let Some(cache) = &self.cache {
            if let Some(movies) = cache.cached_movies().await {
                debug!("Movie list served from cache");
                return movies;
            }
        }

        match self.store.list_movies().await {
            Ok(movies) => {
                if let Some(cache) = &self.cache {
                    cache.store_movies(&movies).await;
                }
                movies
            }
            Err(e) => {
                error!("Failed to load movies: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn movie(&self, id: Uuid) -> Result<Movie, AppError> {
        let movie = self.store.get_movie(id).await.unwrap_or_else(|e| {
            error!("Failed to load movie {}: {}", id, e);
            None
        });
        movie.ok_or_else(|| AppError::NotFound(format!("movie {}", id)))
    }

    /// Сеансы в продаже, по времени начала.
    pub async fn showtimes_for_movie(&self, movie_id: Uuid) -> Vec<Showtime> {
        if let Some(cache) = &self.cache {
            if let Some(showtimes) = cache.cached_movie_showtimes(movie_id).await {
                return showtimes;
            }
        }

        let filter = ShowtimeFilter {
            movie_id: Some(movie_id),
            on_sale_only: true,
        };
        match self.store.list_showtimes(&filter).await {
            Ok(mut showtimes) => {
                showtimes.sort_by_key(|s| s.datetime);
                if let Some(cache) = &self.cache {
                    cache.store_movie_showtimes(movie_id, &showtimes).await;
                }
                showtimes
            }
            Err(e) => {
                error!("Failed to load showtimes of movie {}: {}", movie_id, e);
                Vec::new()
            }
        }
    }

    pub async fn showtime(&self, id: Uuid) -> Result<ShowtimeDetails, AppError> {
        let showtime = self.fresh_or_cached_showtime(id).await?;
        let layout = AuditoriumLayout::for_auditorium(
            &showtime.auditorium,
            self.seating.default_rows,
            self.seating.default_cols,
        )
        .render(&showtime.seat_map);
        Ok(ShowtimeDetails { showtime, layout })
    }

    /// Арранжементы по дате; `upcoming` оставляет только непрошедшие.
    pub async fn events(&self, query: &EventQuery) -> Vec<Event> {
        let from = query.upcoming.then(Utc::now);
        self.store.list_events(from).await.unwrap_or_else(|e| {
            error!("Failed to load events: {}", e);
            Vec::new()
        })
    }

    async fn fresh_or_cached_showtime(&self, id: Uuid) -> Result<Showtime, AppError> {
        if let Some(cache) = &self.cache {
            if let Some(showtime) = cache.cached_showtime(id).await {
                return Ok(showtime);
            }
        }
        let showtime = self
            .store
            .get_showtime(id)
            .await
            .unwrap_or_else(|e| {
                error!("Failed to load showtime {}: {}", id, e);
                None
            })
            .ok_or_else(|| AppError::NotFound(format!("showtime {}", id)))?;
        if let Some(cache) = &self.cache {
            cache.store_showtime(&showtime).await;
        }
        Ok(showtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::MovieInput;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn movie(title: &str, popular_order: Option<i32>, is_upcoming: bool) -> Movie {
        Movie::from_input(
            MovieInput {
                title: title.into(),
                is_popular: true,
                is_upcoming,
                popular_order,
                ..Default::default()
            },
            Utc::now(),
        )
    }

    async fn catalog_with(movies: &[Movie]) -> CatalogService {
        let store = MemoryStore::new();
        for m in movies {
            store.insert_movie(m).await.unwrap();
        }
        CatalogService::new(Arc::new(store), None, Config::for_tests().seating)
    }

    #[tokio::test]
    async fn popular_movies_follow_popular_order_with_unranked_last() {
        let catalog = catalog_with(&[
            movie("Zulu", None, false),
            movie("Bravo", Some(2), false),
            movie("Alfa", Some(1), false),
        ])
        .await;

        let query = MovieQuery {
            category: MovieCategory::Popular,
            q: None,
        };
        let titles: Vec<_> = catalog.movies(&query).await.into_iter().map(|m| m.title).collect();
        assert_eq!(titles, ["Alfa", "Bravo", "Zulu"]);
    }

    #[tokio::test]
    async fn search_and_category_combine() {
        let catalog = catalog_with(&[
            movie("Flammen & Citronen", None, false),
            movie("Flammer i natten", None, true),
        ])
        .await;

        let query = MovieQuery {
            category: MovieCategory::Upcoming,
            q: Some("FLAM".into()),
        };
        let found = catalog.movies(&query).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Flammer i natten");
    }

    #[tokio::test]
    async fn past_events_are_left_out_of_upcoming() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (title, days) in [("Sommerbio", 10), ("Premiere", -3), ("Filmquiz", 2)] {
            let event = Event::from_input(
                crate::models::EventInput {
                    title: title.into(),
                    description: String::new(),
                    image_url: None,
                    date: now + chrono::Duration::days(days),
                    location: None,
                    price: None,
                    available_seats: None,
                    category: None,
                },
                now,
            );
            store.insert_event(&event).await.unwrap();
        }
        let catalog = CatalogService::new(Arc::new(store), None, Config::for_tests().seating);

        let all: Vec<_> = catalog
            .events(&EventQuery { upcoming: false })
            .await
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(all, ["Premiere", "Filmquiz", "Sommerbio"]);

        let upcoming: Vec<_> = catalog
            .events(&EventQuery { upcoming: true })
            .await
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(upcoming, ["Filmquiz", "Sommerbio"]);
    }

    #[tokio::test]
    async fn unknown_showtime_is_not_found() {
        let catalog = catalog_with(&[]).await;
        let err = catalog.showtime(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub original_title: String,
    pub slug: String,
    pub short_description: String,
    pub long_description: String,
    pub poster_url: String,
    pub backdrop_url: Option<String>,
    pub trailer_url: Option<String>,
    pub genres: Vec<String>,
    pub runtime_minutes: i32,
    pub age_rating: String,
    pub age_rating_image_url: Option<String>,
    pub languages: Vec<String>,
    pub featured: bool,
    pub is_upcoming: bool,
    pub is_popular: bool,
    pub popular_order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Подборки для главной страницы.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovieCategory {
    #[default]
    All,
    Current,
    Upcoming,
    Popular,
    Featured,
}

/// Форма фильма в админке: и создание, и редактирование.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct MovieInput {
    #[validate(length(min = 1, max = 200, message = "a movie must have a title"))]
    pub title: String,
    pub original_title: String,
    #[validate(length(max = 200))]
    pub slug: String,
    #[validate(length(max = 500))]
    pub short_description: String,
    pub long_description: String,
    pub poster_url: String,
    pub backdrop_url: Option<String>,
    pub trailer_url: Option<String>,
    pub genres: Vec<String>,
    #[validate(range(min = 0, max = 1000))]
    pub runtime_minutes: i32,
    pub age_rating: String,
    pub age_rating_image_url: Option<String>,
    pub languages: Vec<String>,
    pub featured: bool,
    pub is_upcoming: bool,
    pub is_popular: bool,
    #[validate(range(min = 0))]
    pub popular_order: Option<i32>,
}

impl Movie {
    pub fn from_input(input: MovieInput, now: DateTime<Utc>) -> Self {
        let mut movie = Movie {
            id: Uuid::new_v4(),
            title: String::new(),
            original_title: String::new(),
            slug: String::new(),
            short_description: String::new(),
            long_description: String::new(),
            poster_url: String::new(),
            backdrop_url: None,
            trailer_url: None,
            genres: Vec::new(),
            runtime_minutes: 0,
            age_rating: String::new(),
            age_rating_image_url: None,
            languages: Vec::new(),
            featured: false,
            is_upcoming: false,
            is_popular: false,
            popular_order: None,
            created_at: now,
            updated_at: now,
        };
        movie.apply(input, now);
        movie
    }

    /// Переносит поля формы, id и дата создания сохраняются.
    pub fn apply(&mut self, input: MovieInput, now: DateTime<Utc>) {
        let title = input.title.trim().to_string();
        self.slug = if input.slug.trim().is_empty() {
            slugify(&title)
        } else {
            slugify(&input.slug)
        };
        self.original_title = if input.original_title.trim().is_empty() {
            title.clone()
        } else {
            input.original_title
        };
        self.title = title;
        self.short_description = input.short_description;
        self.long_description = input.long_description;
        self.poster_url = input.poster_url;
        self.backdrop_url = input.backdrop_url.filter(|s| !s.is_empty());
        self.trailer_url = input.trailer_url.filter(|s| !s.is_empty());
        self.genres = clean_list(input.genres);
        self.runtime_minutes = input.runtime_minutes;
        self.age_rating = input.age_rating;
        self.age_rating_image_url = input.age_rating_image_url.filter(|s| !s.is_empty());
        self.languages = clean_list(input.languages);
        self.featured = input.featured;
        self.is_upcoming = input.is_upcoming;
        self.is_popular = input.is_popular;
        self.popular_order = input.popular_order;
        self.updated_at = now;
    }

    pub fn in_category(&self, category: MovieCategory) -> bool {
        match category {
            MovieCategory::All => true,
            MovieCategory::Current => !self.is_upcoming,
            MovieCategory::Upcoming => self.is_upcoming,
            MovieCategory::Popular => self.is_popular,
            MovieCategory::Featured => self.featured,
        }
    }

    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.title.to_lowercase().contains(&query)
            || self.original_title.to_lowercase().contains(&query)
    }
}

pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.trim().to_lowercase().chars() {
        match ch {
            'æ' => slug.push_str("ae"),
            'ø' => slug.push('o'),
            'å' => slug.push_str("aa"),
            c if c.is_ascii_alphanumeric() => slug.push(c),
            _ if !slug.ends_with('-') && !slug.is_empty() => slug.push('-'),
            _ => {}
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_derived_from_title_when_blank() {
        let input = MovieInput {
            title: "  Den Store Bagedyst: Æblekage! ".into(),
            ..Default::default()
        };
        let movie = Movie::from_input(input, Utc::now());

        assert_eq!(movie.title, "Den Store Bagedyst: Æblekage!");
        assert_eq!(movie.slug, "den-store-bagedyst-aeblekage");
        assert_eq!(movie.original_title, movie.title);
    }

    #[test]
    fn title_is_required() {
        let input = MovieInput::default();
        assert!(input.validate().is_err());
    }

    #[test]
    fn categories_filter_on_flags() {
        let mut movie = Movie::from_input(MovieInput { title: "Dune".into(), ..Default::default() }, Utc::now());
        assert!(movie.in_category(MovieCategory::Current));
        assert!(!movie.in_category(MovieCategory::Upcoming));

        movie.is_upcoming = true;
        movie.featured = true;
        assert!(movie.in_category(MovieCategory::Upcoming));
        assert!(movie.in_category(MovieCategory::Featured));
        assert!(!movie.in_category(MovieCategory::Current));
        assert!(movie.matches_query("du"));
    }
}

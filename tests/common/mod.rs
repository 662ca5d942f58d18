#![allow(dead_code)]

pub mod scripted;

use chrono::{Duration, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use malling_bio::config::Config;
use malling_bio::models::{Movie, MovieInput, Showtime};
use malling_bio::seating::SeatMap;
use malling_bio::services::auth::{Session, SignUpRequest};
use malling_bio::services::booking::Customer;
use malling_bio::services::payment::{CardDetails, SimulatedPayments};
use malling_bio::store::{MemoryStore, Store};
use malling_bio::AppState;
use scripted::ScriptedStore;
use std::sync::Arc;
use uuid::Uuid;

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub payments: Arc<SimulatedPayments>,
}

pub fn app_with(payments: SimulatedPayments) -> TestApp {
    let store = MemoryStore::new();
    let payments = Arc::new(payments);
    let state = AppState::with_components(
        Config::for_tests(),
        Arc::new(store.clone()),
        None,
        payments.clone(),
    );
    TestApp {
        state,
        store,
        payments,
    }
}

/// Приложение поверх `ScriptedStore`; `TestApp::store` видит те же данные.
pub fn scripted_app() -> (TestApp, Arc<ScriptedStore>) {
    let store = MemoryStore::new();
    let scripted = Arc::new(ScriptedStore::new(store.clone()));
    let payments = Arc::new(SimulatedPayments::approving());
    let state = AppState::with_components(
        Config::for_tests(),
        scripted.clone(),
        None,
        payments.clone(),
    );
    let app = TestApp {
        state,
        store,
        payments,
    };
    (app, scripted)
}

pub fn app() -> TestApp {
    app_with(SimulatedPayments::approving())
}

pub fn card() -> CardDetails {
    CardDetails {
        card_number: "4111 1111 1111 1111".into(),
        expiry_date: "12/30".into(),
        cvv: "123".into(),
        cardholder_name: "Test Holder".into(),
    }
}

impl TestApp {
    pub async fn sign_up(&self) -> Session {
        let request = SignUpRequest {
            name: Name().fake(),
            // Уникальный префикс: генератор может повторить адрес
            email: format!("{}.{}", Uuid::new_v4().simple(), SafeEmail().fake::<String>()),
            password: "hemmelig123".into(),
        };
        self.state.auth.sign_up(request).await.unwrap()
    }

    pub async fn customer(&self) -> Customer {
        let session = self.sign_up().await;
        Customer {
            id: session.user.id,
            name: session.user.name,
            email: session.user.email,
        }
    }

    pub async fn movie(&self) -> Movie {
        let movie = Movie::from_input(
            MovieInput {
                title: "Druk".into(),
                runtime_minutes: 117,
                ..Default::default()
            },
            Utc::now(),
        );
        self.store.insert_movie(&movie).await.unwrap();
        movie
    }

    /// Сеанс на 8x12 без мест для колясок, 100 за место.
    pub async fn showtime(&self) -> Showtime {
        let movie = self.movie().await;
        let showtime = Showtime::new(
            movie.id,
            Utc::now() + Duration::days(1),
            "Sal 1".into(),
            "Dansk tale".into(),
            100,
            SeatMap::uniform(8, 12),
            Utc::now(),
        );
        self.store.insert_showtime(&showtime).await.unwrap();
        showtime
    }

    pub async fn reload(&self, showtime: &Showtime) -> Showtime {
        self.store.get_showtime(showtime.id).await.unwrap().unwrap()
    }
}

use crate::cache::CacheService;
use crate::models::{Movie, Showtime};
use tracing::{debug, warn};
use uuid::Uuid;

const MOVIES_KEY: &str = "catalog:movies";
const MOVIES_TTL: u64 = 300;
// Карта мест меняется часто, держим недолго
const SHOWTIME_TTL: u64 = 30;

fn showtime_key(id: Uuid) -> String {
    format!("catalog:showtime:{}", id)
}

fn movie_showtimes_key(movie_id: Uuid) -> String {
    format!("catalog:movie:{}:showtimes", movie_id)
}

// Ошибки кэша не всплывают: промах и идем в хранилище
impl CacheService {
    pub async fn cached_movies(&self) -> Option<Vec<Movie>> {
        match self.get_json(MOVIES_KEY).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Movie cache read failed: {}", e);
                None
            }
        }
    }

    pub async fn store_movies(&self, movies: &[Movie]) {
        if let Err(e) = self.set_json(MOVIES_KEY, &movies, MOVIES_TTL).await {
            warn!("Movie cache write failed: {}", e);
        }
    }

    pub async fn cached_showtime(&self, id: Uuid) -> Option<Showtime> {
        self.get_json(&showtime_key(id)).await.unwrap_or_else(|e| {
            warn!("Showtime cache read failed: {}", e);
            None
        })
    }

    pub async fn store_showtime(&self, showtime: &Showtime) {
        if let Err(e) = self.set_json(&showtime_key(showtime.id), showtime, SHOWTIME_TTL).await {
            warn!("Showtime cache write failed: {}", e);
        }
    }

    pub async fn cached_movie_showtimes(&self, movie_id: Uuid) -> Option<Vec<Showtime>> {
        self.get_json(&movie_showtimes_key(movie_id)).await.unwrap_or_else(|e| {
            warn!("Showtime list cache read failed: {}", e);
            None
        })
    }

    pub async fn store_movie_showtimes(&self, movie_id: Uuid, showtimes: &[Showtime]) {
        if let Err(e) = self
            .set_json(&movie_showtimes_key(movie_id), &showtimes, SHOWTIME_TTL)
            .await
        {
            warn!("Showtime list cache write failed for movie {}: {}", movie_id, e);
        }
    }

    pub async fn invalidate_movies(&self) {
        if let Err(e) = self.invalidate(MOVIES_KEY).await {
            warn!("Failed to invalidate movie cache: {}", e);
        }
    }

    /// Сбрасывает и сеанс, и список сеансов его фильма.
    pub async fn invalidate_showtime(&self, id: Uuid, movie_id: Uuid) {
        for key in [showtime_key(id), movie_showtimes_key(movie_id)] {
            if let Err(e) = self.invalidate(&key).await {
                warn!("Failed to invalidate {}: {}", key, e);
            }
        }
        debug!("Showtime {} cache invalidated", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis_client::RedisClient;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::tcp::OwnedReadHalf;
    use tokio::net::{TcpListener, TcpStream};

    #[derive(Clone)]
    struct LogSink(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    async fn read_command(reader: &mut BufReader<OwnedReadHalf>) -> Option<Vec<String>> {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let count: usize = line.trim().strip_prefix('*')?.parse().ok()?;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            line.clear();
            reader.read_line(&mut line).await.ok()?;
            let len: usize = line.trim().strip_prefix('$')?.parse().ok()?;
            let mut buf = vec![0; len + 2];
            reader.read_exact(&mut buf).await.ok()?;
            args.push(String::from_utf8_lossy(&buf[..len]).into_owned());
        }
        Some(args)
    }

    // PING проходит, все остальное отвечает ошибкой
    async fn serve(socket: TcpStream) {
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        while let Some(args) = read_command(&mut reader).await {
            let ping = args.first().is_some_and(|a| a.eq_ignore_ascii_case("PING"));
            let reply: &[u8] = if ping { b"+PONG\r\n" } else { b"-ERR cache is read-only\r\n" };
            if write.write_all(reply).await.is_err() {
                return;
            }
        }
    }

    async fn failing_redis() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket));
            }
        });
        format!("redis://{}/", addr)
    }

    #[tokio::test]
    async fn showtime_list_cache_errors_are_logged_as_misses() {
        let logs = Arc::new(Mutex::new(Vec::new()));
        let sink = LogSink(logs.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let redis = RedisClient::connect(&failing_redis().await, "test").await.unwrap();
        let cache = CacheService::new(redis);
        let movie_id = Uuid::new_v4();

        cache.store_movie_showtimes(movie_id, &[]).await;
        assert!(cache.cached_movie_showtimes(movie_id).await.is_none());

        let output = String::from_utf8(logs.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Showtime list cache write failed"));
        assert!(output.contains("Showtime list cache read failed"));
    }
}

use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, SERVER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

use crate::config::Config;
use crate::models::PlaylistTestResult;

const ACCEPT_PLAYLIST: &str =
    "application/x-mpegURL,application/vnd.apple.mpegurl,application/json,text/plain,*/*";
const ACCEPT_LANGUAGE_VALUE: &str = "pt-BR,pt;q=0.9,en;q=0.8";
const PREVIEW_CHARS: usize = 200;

/// Content types a playlist server is expected to send
const PLAYLIST_CONTENT_TYPES: &[&str] = &[
    "application/x-mpegurl",
    "application/vnd.apple.mpegurl",
    "audio/x-mpegurl",
    "application/m3u8",
    "text/plain",
    "application/octet-stream",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("URL da playlist não pode estar vazia")]
    EmptyUrl,
    #[error("URL inválida: {0}")]
    InvalidUrl(String),
    #[error("Tempo esgotado ao acessar a playlist")]
    Timeout,
    #[error("Erro de rede: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Acesso negado ({0}). A playlist pode exigir autenticação.")]
    AuthRequired(u16),
    #[error("Playlist não encontrada (404). Verifique a URL.")]
    NotFound,
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },
    #[error("Playlist muito grande: {size_mb:.1}MB (limite {limit_mb}MB)")]
    TooLarge { size_mb: f64, limit_mb: usize },
    #[error("Playlist vazia recebida do servidor")]
    EmptyPlaylist,
    #[error("Formato de playlist inválido - não é um arquivo M3U")]
    InvalidFormat,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err)
        }
    }
}

impl FetchError {
    fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND => FetchError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                FetchError::AuthRequired(status.as_u16())
            }
            _ => FetchError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Erro").to_string(),
            },
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis((1u64 << attempt).saturating_mul(500).min(10_000))
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// HTTP access to remote playlists
#[derive(Clone)]
pub struct PlaylistService {
    client: Client,
    max_retries: u32,
    max_m3u_size_mb: usize,
    credentials_in_query: bool,
}

impl PlaylistService {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            max_m3u_size_mb: config.max_m3u_size_mb,
            credentials_in_query: config.credentials_in_query,
        })
    }

    /// Shared HTTP client (Xtream API calls reuse it)
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn max_bytes(&self) -> usize {
        self.max_m3u_size_mb * 1024 * 1024
    }

    /// Normalize a user-typed playlist URL and embed credentials in the query
    pub fn process_url(&self, url: &str, username: &str, password: &str) -> String {
        let mut processed = url.trim().replace(' ', "%20");

        if !processed.starts_with("http://") && !processed.starts_with("https://") {
            processed = format!("http://{}", processed);
        }

        if self.credentials_in_query
            && has_credentials(username, password)
            && !processed.contains("username=")
            && !processed.contains("password=")
        {
            let separator = if processed.contains('?') { '&' } else { '?' };
            processed = format!(
                "{}{}username={}&password={}",
                processed,
                separator,
                urlencoding::encode(username),
                urlencoding::encode(password)
            );
        }

        processed
    }

    fn prepare(
        &self,
        method: Method,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<(String, Option<(String, String)>), FetchError> {
        if url.trim().is_empty() {
            return Err(FetchError::EmptyUrl);
        }

        let processed = self.process_url(url, username, password);
        url::Url::parse(&processed).map_err(|e| FetchError::InvalidUrl(format!("{} ({})", processed, e)))?;

        let basic_auth = (!self.credentials_in_query && has_credentials(username, password))
            .then(|| (username.to_string(), password.to_string()));

        tracing::debug!(%method, url = %processed, basic_auth = basic_auth.is_some(), "Prepared playlist request");

        Ok((processed, basic_auth))
    }

    fn request(&self, method: Method, url: &str, basic_auth: &Option<(String, String)>) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header(ACCEPT, ACCEPT_PLAYLIST)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .header(CACHE_CONTROL, "no-cache");

        if let Some((user, pass)) = basic_auth {
            request = request.basic_auth(user, Some(pass));
        }

        request
    }

    async fn send_with_retry(
        &self,
        url: &str,
        basic_auth: &Option<(String, String)>,
    ) -> Result<Response, FetchError> {
        let mut attempt = 0;

        loop {
            match self.request(Method::GET, url, basic_auth).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    if is_retryable(status) && attempt < self.max_retries {
                        let backoff = backoff(attempt);
                        tracing::warn!(
                            "fetch_retry" = attempt + 1,
                            "reason" = status.as_u16(),
                            "backoff_ms" = backoff.as_millis() as u64
                        );
                        sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(FetchError::from_status(status));
                }
                Err(err) => {
                    if attempt < self.max_retries {
                        let backoff = backoff(attempt);
                        tracing::warn!(
                            "fetch_retry" = attempt + 1,
                            "reason" = "network",
                            "backoff_ms" = backoff.as_millis() as u64
                        );
                        sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Read the body, refusing anything past the size limit. A declared
    /// `Content-Length` over the limit fails before any byte is read.
    async fn read_body(&self, response: Response) -> Result<String, FetchError> {
        let max_bytes = self.max_bytes();

        if let Some(len) = response.content_length() {
            if len as usize > max_bytes {
                return Err(too_large(len as usize, self.max_m3u_size_mb));
            }
        }

        let body = read_limited(response.bytes_stream(), max_bytes, self.max_m3u_size_mb).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Download playlist text, validating it looks like M3U
    pub async fn fetch_playlist(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<String, FetchError> {
        let (processed, basic_auth) = self.prepare(Method::GET, url, username, password)?;

        tracing::info!("Fetching playlist: {}", redact(&processed));
        let started = Instant::now();

        let response = self.send_with_retry(&processed, &basic_auth).await?;

        let content_type = header_value(&response, CONTENT_TYPE);
        if !is_playlist_content_type(&content_type) {
            tracing::warn!(content_type = %content_type, "Unexpected playlist content type");
        }

        let content = self.read_body(response).await?;

        tracing::info!(
            bytes = content.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Playlist downloaded"
        );

        if content.trim().is_empty() {
            return Err(FetchError::EmptyPlaylist);
        }

        if !content.trim_start().starts_with("#EXTM3U") && !content.contains("#EXTINF") {
            return Err(FetchError::InvalidFormat);
        }

        Ok(content)
    }

    /// Probe a playlist URL without importing it. Transport failures are
    /// reported in the result, not as errors.
    pub async fn test_playlist_url(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> PlaylistTestResult {
        let (processed, basic_auth) = match self.prepare(Method::GET, url, username, password) {
            Ok(prepared) => prepared,
            Err(e) => {
                return PlaylistTestResult {
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let started = Instant::now();
        let response = match self.request(Method::GET, &processed, &basic_auth).send().await {
            Ok(resp) => resp,
            Err(e) => {
                return PlaylistTestResult {
                    response_time_ms: started.elapsed().as_millis() as u64,
                    error: Some(FetchError::from(e).to_string()),
                    ..Default::default()
                }
            }
        };
        let response_time_ms = started.elapsed().as_millis() as u64;

        let status = response.status();
        let mut result = PlaylistTestResult {
            success: status.is_success(),
            http_code: status.as_u16(),
            http_message: status.canonical_reason().unwrap_or_default().to_string(),
            response_time_ms,
            content_type: header_value(&response, CONTENT_TYPE),
            content_length: response.content_length().map(|l| l as i64).unwrap_or(-1),
            server_info: header_value(&response, SERVER),
            ..Default::default()
        };

        if !result.success {
            return result;
        }

        match self.read_body(response).await {
            Ok(content) => {
                let trimmed = content.trim_start();
                result.has_valid_content =
                    trimmed.starts_with("#EXTM3U") || content.contains("#EXTINF");
                result.content_preview = content.chars().take(PREVIEW_CHARS).collect();
                result.estimated_channels = content.matches("#EXTINF").count();
            }
            Err(e) => result.error = Some(e.to_string()),
        }

        result
    }

    /// HEAD the playlist URL and return its response headers plus
    /// `status_code` / `status_message`
    pub async fn check_playlist_headers(
        &self,
        url: &str,
        username: &str,
        password: &str,
    ) -> Result<BTreeMap<String, String>, FetchError> {
        let (processed, basic_auth) = self.prepare(Method::HEAD, url, username, password)?;

        let response = self.request(Method::HEAD, &processed, &basic_auth).send().await?;

        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            headers.insert(
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }

        let status = response.status();
        headers.insert("status_code".to_string(), status.as_u16().to_string());
        headers.insert(
            "status_message".to_string(),
            status.canonical_reason().unwrap_or_default().to_string(),
        );

        Ok(headers)
    }
}

fn too_large(len: usize, limit_mb: usize) -> FetchError {
    FetchError::TooLarge {
        size_mb: len as f64 / 1024.0 / 1024.0,
        limit_mb,
    }
}

/// Collect body chunks, stopping at the first one that crosses `max_bytes`
async fn read_limited<S, B, E>(mut stream: S, max_bytes: usize, limit_mb: usize) -> Result<Vec<u8>, FetchError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    FetchError: From<E>,
{
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        if body.len() + chunk.len() > max_bytes {
            return Err(too_large(body.len() + chunk.len(), limit_mb));
        }
        body.extend_from_slice(chunk);
    }
    Ok(body)
}

fn has_credentials(username: &str, password: &str) -> bool {
    !username.trim().is_empty() && !password.trim().is_empty()
}

fn header_value(response: &Response, name: reqwest::header::HeaderName) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn is_playlist_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    PLAYLIST_CONTENT_TYPES.iter().any(|t| lower.contains(t))
}

/// Hide the password query value in logs
pub fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.query_pairs().any(|(k, _)| k == "password") => {
            let pairs: Vec<(String, String)> = parsed
                .query_pairs()
                .map(|(k, v)| {
                    let v = if k == "password" { "***".to_string() } else { v.into_owned() };
                    (k.into_owned(), v)
                })
                .collect();
            parsed.query_pairs_mut().clear().extend_pairs(pairs);
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLAYLIST: &str = "#EXTM3U\n#EXTINF:-1 group-title=\"News\",A\nhttp://a/1\n#EXTINF:-1,B\nhttp://a/2\n";

    fn service() -> PlaylistService {
        PlaylistService::new(&Config::for_tests()).unwrap()
    }

    #[test]
    fn test_process_url() {
        let svc = service();

        assert_eq!(svc.process_url("  example.com/list.m3u ", "", ""), "http://example.com/list.m3u");
        assert_eq!(
            svc.process_url("https://x.com/my list.m3u", "", ""),
            "https://x.com/my%20list.m3u"
        );
        assert_eq!(
            svc.process_url("http://x.com/get.php", "user", "p@ss"),
            "http://x.com/get.php?username=user&password=p%40ss"
        );
        assert_eq!(
            svc.process_url("http://x.com/get.php?type=m3u", "user", "pass"),
            "http://x.com/get.php?type=m3u&username=user&password=pass"
        );
        // already present, or only one credential given
        assert_eq!(
            svc.process_url("http://x.com/get.php?username=a&password=b", "user", "pass"),
            "http://x.com/get.php?username=a&password=b"
        );
        assert_eq!(svc.process_url("http://x.com/l.m3u", "user", " "), "http://x.com/l.m3u");
    }

    #[test]
    fn test_process_url_basic_auth_mode() {
        let svc = PlaylistService::new(&Config {
            credentials_in_query: false,
            ..Config::for_tests()
        })
        .unwrap();
        assert_eq!(svc.process_url("http://x.com/l.m3u", "user", "pass"), "http://x.com/l.m3u");
    }

    #[test]
    fn test_redact() {
        assert_eq!(
            redact("http://x.com/get.php?username=u&password=secret"),
            "http://x.com/get.php?username=u&password=***"
        );
        assert_eq!(redact("http://x.com/list.m3u"), "http://x.com/list.m3u");
    }

    #[test]
    fn test_playlist_content_types() {
        assert!(is_playlist_content_type("application/vnd.apple.mpegurl; charset=utf-8"));
        assert!(is_playlist_content_type("Audio/X-MpegURL"));
        assert!(!is_playlist_content_type("text/html"));
    }

    #[tokio::test]
    async fn test_fetch_playlist_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.m3u"))
            .and(header("accept-language", ACCEPT_LANGUAGE_VALUE))
            .and(header("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAYLIST))
            .mount(&server)
            .await;

        let content = service()
            .fetch_playlist(&format!("{}/list.m3u", server.uri()), "", "")
            .await
            .unwrap();
        assert_eq!(content, PLAYLIST);
    }

    #[tokio::test]
    async fn test_fetch_playlist_sends_query_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get.php"))
            .and(query_param("username", "user"))
            .and(query_param("password", "pass"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAYLIST))
            .expect(1)
            .mount(&server)
            .await;

        service()
            .fetch_playlist(&format!("{}/get.php", server.uri()), "user", "pass")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_playlist_sends_basic_auth() {
        let server = MockServer::start().await;
        // "user:pass" in base64
        Mock::given(method("GET"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAYLIST))
            .expect(1)
            .mount(&server)
            .await;

        let svc = PlaylistService::new(&Config {
            credentials_in_query: false,
            ..Config::for_tests()
        })
        .unwrap();
        svc.fetch_playlist(&format!("{}/list.m3u", server.uri()), "user", "pass")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_playlist_status_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/private"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let svc = service();
        let err = svc
            .fetch_playlist(&format!("{}/missing", server.uri()), "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound));

        let err = svc
            .fetch_playlist(&format!("{}/private", server.uri()), "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::AuthRequired(403)));
    }

    #[tokio::test]
    async fn test_fetch_playlist_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAYLIST))
            .mount(&server)
            .await;

        let content = service()
            .fetch_playlist(&format!("{}/flaky", server.uri()), "", "")
            .await
            .unwrap();
        assert!(content.starts_with("#EXTM3U"));
    }

    #[tokio::test]
    async fn test_fetch_playlist_retries_rate_limit_only() {
        let server = MockServer::start().await;
        Mock::given(path("/limited"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(path("/limited"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAYLIST))
            .mount(&server)
            .await;
        Mock::given(path("/bad"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service();
        let content = svc
            .fetch_playlist(&format!("{}/limited", server.uri()), "", "")
            .await
            .unwrap();
        assert!(content.starts_with("#EXTM3U"));

        let err = svc
            .fetch_playlist(&format!("{}/bad", server.uri()), "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Http { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_fetch_playlist_retries_network_errors() {
        // Accepts and immediately drops every connection
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let attempts = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = attempts.clone();
        let acceptor = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                drop(socket);
            }
        });

        let err = service()
            .fetch_playlist(&format!("http://{}/list.m3u", addr), "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_) | FetchError::Timeout));
        // first try plus max_retries (2)
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);

        acceptor.abort();
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_fails_early() {
        let server = MockServer::start().await;
        Mock::given(path("/declared"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#".repeat(3 * 1024 * 1024)))
            .mount(&server)
            .await;

        let err = service()
            .fetch_playlist(&format!("{}/declared", server.uri()), "", "")
            .await
            .unwrap_err();
        // the whole declared size is reported, not the point where streaming stopped
        match err {
            FetchError::TooLarge { size_mb, limit_mb } => {
                assert_eq!(size_mb, 3.0);
                assert_eq!(limit_mb, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_limited_stops_streamed_body() {
        let chunks = vec![
            Ok::<_, FetchError>(vec![b'#'; 600 * 1024]),
            Ok(vec![b'#'; 600 * 1024]),
            Ok(vec![b'#'; 600 * 1024]),
        ];
        let err = read_limited(futures::stream::iter(chunks), 1024 * 1024, 1)
            .await
            .unwrap_err();
        match err {
            FetchError::TooLarge { size_mb, .. } => assert!(size_mb > 1.0 && size_mb < 1.2),
            other => panic!("unexpected error {:?}", other),
        }

        let small = vec![Ok::<_, FetchError>(b"#EXTM3U\n".to_vec())];
        let body = read_limited(futures::stream::iter(small), 1024, 1).await.unwrap();
        assert_eq!(body, b"#EXTM3U\n");
    }

    #[tokio::test]
    async fn test_fetch_playlist_content_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   \n"))
            .mount(&server)
            .await;
        Mock::given(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;
        Mock::given(path("/huge"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#".repeat(2 * 1024 * 1024)))
            .mount(&server)
            .await;

        let svc = service();
        assert!(matches!(
            svc.fetch_playlist(&format!("{}/empty", server.uri()), "", "").await,
            Err(FetchError::EmptyPlaylist)
        ));
        assert!(matches!(
            svc.fetch_playlist(&format!("{}/html", server.uri()), "", "").await,
            Err(FetchError::InvalidFormat)
        ));
        assert!(matches!(
            svc.fetch_playlist(&format!("{}/huge", server.uri()), "", "").await,
            Err(FetchError::TooLarge { limit_mb: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_playlist_blank_url() {
        assert!(matches!(
            service().fetch_playlist("  ", "", "").await,
            Err(FetchError::EmptyUrl)
        ));
    }

    #[tokio::test]
    async fn test_test_playlist_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.m3u"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("server", "nginx")
                    .set_body_raw(PLAYLIST, "application/x-mpegurl"),
            )
            .mount(&server)
            .await;
        Mock::given(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let svc = service();
        let result = svc
            .test_playlist_url(&format!("{}/list.m3u", server.uri()), "", "")
            .await;
        assert!(result.is_playlist_valid());
        assert_eq!(result.estimated_channels, 2);
        assert_eq!(result.server_info, "nginx");
        assert_eq!(result.content_type, "application/x-mpegurl");
        assert_eq!(result.content_length, PLAYLIST.len() as i64);
        assert_eq!(result.content_preview, PLAYLIST);

        let gone = svc.test_playlist_url(&format!("{}/gone", server.uri()), "", "").await;
        assert!(!gone.success);
        assert_eq!(gone.http_code, 404);
        assert_eq!(gone.summary(), "HTTP 404 - Not Found");

        let blank = svc.test_playlist_url("", "", "").await;
        assert!(!blank.success);
        assert!(blank.error.is_some());
    }

    #[tokio::test]
    async fn test_preview_is_truncated() {
        let server = MockServer::start().await;
        let long = format!("#EXTM3U\n{}", "#EXTINF:-1,A\nhttp://a/1\n".repeat(40));
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(long.clone()))
            .mount(&server)
            .await;

        let result = service().test_playlist_url(&server.uri(), "", "").await;
        assert_eq!(result.content_preview.chars().count(), PREVIEW_CHARS);
        assert_eq!(result.estimated_channels, 40);
    }

    #[tokio::test]
    async fn test_check_playlist_headers() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/list.m3u"))
            .respond_with(ResponseTemplate::new(200).insert_header("x-provider", "demo"))
            .mount(&server)
            .await;

        let headers = service()
            .check_playlist_headers(&format!("{}/list.m3u", server.uri()), "", "")
            .await
            .unwrap();
        assert_eq!(headers.get("x-provider").map(String::as_str), Some("demo"));
        assert_eq!(headers.get("status_code").map(String::as_str), Some("200"));
        assert_eq!(headers.get("status_message").map(String::as_str), Some("OK"));
    }
}

use anyhow::Result;
use chrono::NaiveDate;
use listening_etl::apis::{ArtistCatalog, SpotifyClient, SunriseSource, SunriseSunsetClient};
use listening_etl::config::{Config, HttpConfig, SpotifyConfig, SunriseConfig};
use listening_etl::db::Database;
use listening_etl::error::EtlError;
use listening_etl::jobs::{run_job, Job};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// One request as the local server saw it. Header names are lowercased.
#[derive(Debug, Clone)]
struct SeenRequest {
    method: String,
    target: String,
    headers: HashMap<String, String>,
    body: String,
}

impl SeenRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Request target with `%2C` decoded, enough for comma-joined id lists.
    fn decoded_target(&self) -> String {
        self.target.replace("%2C", ",").replace("%2c", ",")
    }
}

type Route = Arc<dyn Fn(&SeenRequest) -> (u16, String) + Send + Sync>;

/// Local HTTP/1.1 server answering every request through `route`.
struct LocalServer {
    base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl LocalServer {
    async fn start(route: Route) -> Result<Self> {
        // clients are built after this, so an ambient HTTP_PROXY never sees loopback traffic
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let log = log.clone();
                let route = route.clone();
                tokio::spawn(async move {
                    let _ = answer(stream, route, log).await;
                });
            }
        });

        Ok(Self { base_url, seen })
    }

    async fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().await.clone()
    }
}

async fn answer(mut stream: TcpStream, route: Route, log: Arc<Mutex<Vec<SeenRequest>>>) -> Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };
    let (status, body) = route(&request);
    log.lock().await.push(request);

    let response = format!(
        "HTTP/1.1 {status} Local\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn read_request(stream: &mut TcpStream) -> Result<Option<SeenRequest>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_len = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_len]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < head_len + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(head_len + content_length);
    let body = String::from_utf8_lossy(&buf[head_len..body_end]).into_owned();

    Ok(Some(SeenRequest {
        method,
        target,
        headers,
        body,
    }))
}

fn artist_json(id: &str) -> serde_json::Value {
    json!({
        "followers": { "href": null, "total": 10 },
        "genres": ["dream pop"],
        "id": id,
        "name": format!("Artist {id}"),
        "popularity": 50,
        "type": "artist",
        "uri": format!("spotify:artist:{id}")
    })
}

/// Token endpoint plus an artist endpoint echoing the requested ids.
fn catalog_route(expires_in: u64, artists_status: u16) -> Route {
    Arc::new(move |req: &SeenRequest| {
        if req.method == "POST" && req.target == "/api/token" {
            let body = json!({
                "access_token": "tok",
                "token_type": "Bearer",
                "expires_in": expires_in
            });
            return (200, body.to_string());
        }
        let target = req.decoded_target();
        if let Some(ids) = target.strip_prefix("/v1/artists?ids=") {
            if artists_status != 200 {
                return (artists_status, r#"{"error":{"status":500,"message":"boom"}}"#.to_string());
            }
            let artists: Vec<_> = ids.split(',').map(artist_json).collect();
            return (200, json!({ "artists": artists }).to_string());
        }
        (404, "{}".to_string())
    })
}

fn spotify_config(base_url: &str) -> SpotifyConfig {
    SpotifyConfig {
        client_id: Some("id".into()),
        client_secret: Some("sec".into()),
        api_base: format!("{base_url}/v1"),
        token_url: format!("{base_url}/api/token"),
    }
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_client_credentials_token_is_reused_across_batches() -> Result<()> {
    let server = LocalServer::start(catalog_route(3600, 200)).await?;
    let client = SpotifyClient::new(&spotify_config(&server.base_url), &HttpConfig::default())?;

    let first = client.get_artists(&ids(&["a", "zz"])).await?;
    let second = client.get_artists(&ids(&["a"])).await?;
    assert_eq!(first.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), ["a", "zz"]);
    assert_eq!(second.len(), 1);

    let requests = server.requests().await;
    assert_eq!(requests.len(), 3, "one token request, two lookups");

    let token = &requests[0];
    assert_eq!(token.method, "POST");
    assert_eq!(token.target, "/api/token");
    // base64("id:sec")
    assert_eq!(token.header("authorization"), Some("Basic aWQ6c2Vj"));
    assert!(token.body.contains("grant_type=client_credentials"));

    assert_eq!(requests[1].method, "GET");
    assert_eq!(requests[1].decoded_target(), "/v1/artists?ids=a,zz");
    assert_eq!(requests[2].decoded_target(), "/v1/artists?ids=a");
    for lookup in &requests[1..] {
        assert_eq!(lookup.header("authorization"), Some("Bearer tok"));
    }
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_requested_again() -> Result<()> {
    let server = LocalServer::start(catalog_route(0, 200)).await?;
    let client = SpotifyClient::new(&spotify_config(&server.base_url), &HttpConfig::default())?;

    client.get_artists(&ids(&["a"])).await?;
    client.get_artists(&ids(&["b"])).await?;

    let token_posts = server
        .requests()
        .await
        .iter()
        .filter(|r| r.method == "POST")
        .count();
    assert_eq!(token_posts, 2);
    Ok(())
}

#[tokio::test]
async fn test_server_error_becomes_api_error() -> Result<()> {
    let server = LocalServer::start(catalog_route(3600, 500)).await?;
    let client = SpotifyClient::new(&spotify_config(&server.base_url), &HttpConfig::default())?;

    let err = client.get_artists(&ids(&["a"])).await.unwrap_err();
    match err {
        EtlError::Api { message } => assert!(message.contains("500"), "{message}"),
        other => panic!("expected an API error, got {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_artist_info_job_aborts_on_server_error() -> Result<()> {
    let server = LocalServer::start(catalog_route(3600, 500)).await?;
    let dir = tempfile::tempdir()?;

    let mut config = Config::default();
    config.database.path = dir.path().join("spotify.db");
    config.spotify = spotify_config(&server.base_url);

    let db = Database::open(&config.database.path)?;
    db.execute_batch(
        "CREATE TABLE track_info (uri TEXT, artist_uris TEXT);
         INSERT INTO track_info VALUES ('spotify:track:t', 'spotify:artist:a');",
    )?;
    db.close()?;

    let err = run_job(Job::ArtistInfo, &config).await.unwrap_err();
    assert!(matches!(err, EtlError::Api { .. }));

    let db = Database::open(&config.database.path)?;
    assert!(!db.table_exists("artist_info")?);
    Ok(())
}

const SUN_RESULTS: &str = r#"{
    "results": {
        "sunrise": "2021-01-14T19:12:33+00:00",
        "sunset": "2021-01-15T09:45:02+00:00",
        "solar_noon": "2021-01-15T02:28:48+00:00",
        "day_length": 52349,
        "civil_twilight_begin": "2021-01-14T18:41:32+00:00",
        "civil_twilight_end": "2021-01-15T10:16:03+00:00",
        "nautical_twilight_begin": "2021-01-14T18:02:09+00:00",
        "nautical_twilight_end": "2021-01-15T10:55:26+00:00",
        "astronomical_twilight_begin": "2021-01-14T17:18:52+00:00",
        "astronomical_twilight_end": "2021-01-15T11:38:43+00:00"
    },
    "status": "OK"
}"#;

fn sunrise_client(base_url: &str) -> Result<SunriseSunsetClient> {
    let config = SunriseConfig {
        base_url: format!("{base_url}/json"),
        ..SunriseConfig::default()
    };
    Ok(SunriseSunsetClient::new(&config, &HttpConfig::default())?)
}

#[tokio::test]
async fn test_sunrise_client_sends_location_and_date() -> Result<()> {
    let server = LocalServer::start(Arc::new(|_: &SeenRequest| (200, SUN_RESULTS.to_string()))).await?;
    let client = sunrise_client(&server.base_url)?;

    let day = client
        .get_day(NaiveDate::from_ymd_opt(2021, 1, 15).unwrap())
        .await?;
    assert_eq!(day.day_length, 52349);

    let requests = server.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(
        requests[0].target,
        "/json?lat=-37.8136&lng=144.9631&date=2021-01-15&formatted=0"
    );
    Ok(())
}

#[tokio::test]
async fn test_sunrise_client_maps_failures_to_api_errors() -> Result<()> {
    let server = LocalServer::start(Arc::new(|req: &SeenRequest| {
        if req.target.contains("date=2021-01-15") {
            (500, "upstream down".to_string())
        } else {
            (200, r#"{"results": "", "status": "INVALID_REQUEST"}"#.to_string())
        }
    }))
    .await?;
    let client = sunrise_client(&server.base_url)?;

    let http_error = client
        .get_day(NaiveDate::from_ymd_opt(2021, 1, 15).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(http_error, EtlError::Api { .. }));

    let status_error = client
        .get_day(NaiveDate::from_ymd_opt(2021, 1, 16).unwrap())
        .await
        .unwrap_err();
    match status_error {
        EtlError::Api { message } => assert!(message.contains("INVALID_REQUEST")),
        other => panic!("expected an API error, got {other}"),
    }
    Ok(())
}

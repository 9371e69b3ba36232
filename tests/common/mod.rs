use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
struct StubResponse {
    status: u16,
    body: String,
}

/// In-process stand-in for the directory API: canned JSON per path, every
/// request recorded. Responses can additionally be keyed on the caller's
/// token so authentication outcomes differ per credential.
#[derive(Clone)]
pub struct StubDirectory {
    pub base_url: String,
    routes: Arc<Mutex<HashMap<(String, Option<String>), StubResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubDirectory {
    pub fn start() -> StubDirectory {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener addr");

        let server = StubDirectory {
            base_url: format!("http://{}", addr),
            routes: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let routes = Arc::clone(&server.routes);
        let requests = Arc::clone(&server.requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let routes = Arc::clone(&routes);
                let requests = Arc::clone(&requests);
                thread::spawn(move || serve_one(stream, &routes, &requests));
            }
        });

        server
    }

    /// Registers a response for a path, query string included.
    pub fn route(&self, path: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(
            (path.to_string(), None),
            StubResponse {
                status,
                body: body.to_string(),
            },
        );
    }

    /// Registers a response served only to requests authorized with the
    /// given token.
    pub fn route_for_token(&self, path: &str, token: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(
            (path.to_string(), Some(format!("token {}", token))),
            StubResponse {
                status,
                body: body.to_string(),
            },
        );
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

fn serve_one(
    stream: TcpStream,
    routes: &Mutex<HashMap<(String, Option<String>), StubResponse>>,
    requests: &Mutex<Vec<RecordedRequest>>,
) {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("")
        .to_string();

    let mut authorization = None;
    let mut user_agent = None;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).is_err() {
            return;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        if name.eq_ignore_ascii_case("authorization") {
            authorization = Some(value.trim().to_string());
        } else if name.eq_ignore_ascii_case("user-agent") {
            user_agent = Some(value.trim().to_string());
        }
    }

    requests.lock().unwrap().push(RecordedRequest {
        path: path.clone(),
        authorization: authorization.clone(),
        user_agent,
    });

    let response = {
        let routes = routes.lock().unwrap();
        routes
            .get(&(path.clone(), authorization))
            .or_else(|| routes.get(&(path, None)))
            .cloned()
            .unwrap_or(StubResponse {
                status: 404,
                body: r#"{"message":"Not Found"}"#.to_string(),
            })
    };

    let reason = match response.status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Error",
    };
    let payload = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason,
        response.body.len(),
        response.body
    );
    let _ = reader.get_mut().write_all(payload.as_bytes());
}

/// Writes a config file into `dir` and returns its path.
pub fn config_file(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("forgepass.conf");
    std::fs::write(&path, body).expect("write config file");
    path
}

//! Shared fixtures: a fake dictionary provider and test configuration

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;
use tiny_http::{Header, Request, Response, Server};
use vocabsync::WallpaperConfig;

const EPHEMERAL: &str = r#"[{
    "word": "ephemeral",
    "phonetics": [{"text": "/ɪˈfɛm(ə)rəl/"}],
    "meanings": [{
        "partOfSpeech": "adjective",
        "definitions": [
            {"definition": "Lasting a very short time.", "example": "fashions are ephemeral"}
        ]
    }]
}]"#;

const PETRICHOR: &str = r#"[{
    "word": "petrichor",
    "phonetics": [],
    "meanings": [{
        "partOfSpeech": "noun",
        "definitions": [{"definition": "The pleasant smell of rain on dry earth."}]
    }]
}]"#;

const NEFARIOUS: &str = r#"[{
    "word": "nefarious",
    "phonetics": [{"text": "/nɪˈfɛːrɪəs/"}],
    "meanings": [{
        "partOfSpeech": "adjective",
        "definitions": [
            {"definition": "Wicked <script>alert('x')</script> & criminal.", "example": "the \"nefarious\" activities"}
        ]
    }]
}]"#;

/// Start a fake dictionary API on a free port and return its base URL.
///
/// Known words: `ephemeral` (with example), `petrichor` (no example),
/// `nefarious` (markup in its text). `garbled` returns a malformed payload and
/// anything else returns 404. Requests are answered one at a time.
pub fn start_dictionary_server() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();

    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            answer(request);
        }
    });

    format!("http://{}/api/v2/entries/en/", addr)
}

/// Like `start_dictionary_server`, but each request is answered on its own
/// thread after `delay`, so concurrent lookups overlap. `missing` fails
/// immediately.
pub fn start_slow_dictionary_server(delay: Duration) -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();

    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            std::thread::spawn(move || {
                if !request.url().to_ascii_lowercase().ends_with("/missing") {
                    std::thread::sleep(delay);
                }
                answer(request);
            });
        }
    });

    format!("http://{}/api/v2/entries/en/", addr)
}

fn answer(request: Request) {
    let word = request
        .url()
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    let json = "Content-Type: application/json".parse::<Header>().unwrap();
    let response = match word.as_str() {
        "ephemeral" => Response::from_string(EPHEMERAL).with_header(json),
        "petrichor" => Response::from_string(PETRICHOR).with_header(json),
        "nefarious" => Response::from_string(NEFARIOUS).with_header(json),
        "garbled" => Response::from_string("<html>oops</html>").with_header(json),
        _ => Response::from_string(r#"{"title":"No Definitions Found"}"#)
            .with_status_code(404)
            .with_header(json),
    };
    let _ = request.respond(response);
}

/// Configuration pointing at `dictionary_url` and storing under `dir`
pub fn test_config(dictionary_url: &str, dir: &Path, word_count: usize) -> WallpaperConfig {
    WallpaperConfig {
        word_count,
        public_dir: dir.to_path_buf(),
        dictionary_url: dictionary_url.to_string(),
        lookup_timeout_ms: 5000,
        settle_delay_ms: 0,
        ..Default::default()
    }
}

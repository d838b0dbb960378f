//! HTTP surface for the latest wallpaper.
//!
//! `tiny_http` accepts connections on a dedicated thread and forwards each
//! request to an async loop, which answers from the store and starts a
//! background generation when the artifact is missing.

use crate::pipeline::{Generator, Trigger};
use crate::store::WallpaperStore;
use crate::{Error, Result};
use log::{debug, info, warn};
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tokio::sync::{mpsc, Notify};

/// Path of the always-fresh image
pub const DAILY_ROUTE: &str = "/daily.png";
/// Prefix of the static file route over the store directory
pub const PUBLIC_PREFIX: &str = "/public/";

/// Body sent while the first image is being generated
pub const NOT_READY_BODY: &str = "Image not found. Generating...";

type HttpResponse = Response<Cursor<Vec<u8>>>;

/// Handle for stopping a running server
#[derive(Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
    server: Arc<Server>,
}

impl ShutdownHandle {
    /// Stop accepting requests and end `run`.
    pub fn shutdown(&self) {
        self.server.unblock();
        self.notify.notify_one();
    }
}

/// The serving endpoint, bound but not yet running
pub struct WallpaperServer {
    server: Arc<Server>,
    addr: SocketAddr,
    generator: Arc<Generator>,
    notify: Arc<Notify>,
}

impl WallpaperServer {
    /// Bind to `addr` (port 0 picks a free port).
    pub fn bind(addr: SocketAddr, generator: Arc<Generator>) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| Error::ServerError(format!("Failed to bind {}: {}", addr, e)))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| Error::ServerError("unable to determine bound address".into()))?;

        Ok(Self {
            server: Arc::new(server),
            addr,
            generator,
            notify: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: self.notify.clone(),
            server: self.server.clone(),
        }
    }

    /// Serve until the shutdown handle fires.
    pub async fn run(self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<Request>(64);
        let server = self.server.clone();
        thread::spawn(move || {
            while let Ok(request) = server.recv() {
                if tx.blocking_send(request).is_err() {
                    break;
                }
            }
        });

        info!("Serving wallpaper at http://{}{}", self.addr, DAILY_ROUTE);

        loop {
            tokio::select! {
                _ = self.notify.notified() => {
                    info!("Server on {} shutting down", self.addr);
                    return Ok(());
                }
                maybe_req = rx.recv() => {
                    let Some(req) = maybe_req else {
                        return Ok(());
                    };
                    let generator = self.generator.clone();
                    tokio::spawn(async move {
                        let response = respond_to(&generator, req.method(), req.url()).await;
                        let _ = tokio::task::spawn_blocking(move || {
                            if let Err(e) = req.respond(response) {
                                debug!("Client went away before the response was sent: {}", e);
                            }
                        })
                        .await;
                    });
                }
            }
        }
    }
}

/// Build the response for one request.
pub async fn respond_to(generator: &Arc<Generator>, method: &Method, url: &str) -> HttpResponse {
    if !matches!(method, Method::Get | Method::Head) {
        return text_response(405, "Method Not Allowed");
    }

    let path = url.split(['?', '#']).next().unwrap_or("");
    if path == DAILY_ROUTE {
        return serve_daily(generator).await;
    }
    if let Some(rel) = path.strip_prefix(PUBLIC_PREFIX) {
        return serve_public(generator.store(), rel).await;
    }
    text_response(404, "Not Found")
}

async fn serve_daily(generator: &Arc<Generator>) -> HttpResponse {
    let store = generator.store();
    if !store.exists() {
        info!("{} requested but missing; starting generation", DAILY_ROUTE);
        generator.request_generation(Trigger::RequestMiss);
        return text_response(404, NOT_READY_BODY);
    }

    match store.read().await {
        Ok(bytes) => Response::from_data(bytes)
            .with_header(header("Content-Type", "image/png"))
            .with_header(header("Cache-Control", "no-cache, no-store, must-revalidate"))
            .with_header(header("Pragma", "no-cache"))
            .with_header(header("Expires", "0")),
        Err(e) => {
            warn!("Failed to read {}: {}", store.path().display(), e);
            text_response(500, "Failed to read image")
        }
    }
}

async fn serve_public(store: &WallpaperStore, rel: &str) -> HttpResponse {
    let Some(path) = resolve_public_path(store.dir(), rel) else {
        return text_response(404, "Not Found");
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => Response::from_data(bytes).with_header(header("Content-Type", content_type(&path))),
        Err(_) => text_response(404, "Not Found"),
    }
}

/// Map a `/public/` request path onto a file inside `dir`, refusing anything
/// that would step outside it.
pub fn resolve_public_path(dir: &Path, rel: &str) -> Option<PathBuf> {
    let rel = Path::new(rel);
    if rel.as_os_str().is_empty() {
        return None;
    }
    let mut path = dir.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                if part.to_string_lossy().starts_with('.') {
                    return None;
                }
                path.push(part);
            }
            _ => return None,
        }
    }
    Some(path)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()) {
        Some(ext) => match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "html" | "htm" => "text/html; charset=utf-8",
            "txt" => "text/plain; charset=utf-8",
            "json" => "application/json",
            _ => "application/octet-stream",
        },
        None => "application/octet-stream",
    }
}

fn text_response(status: u16, body: &str) -> HttpResponse {
    Response::from_string(body)
        .with_status_code(StatusCode(status))
        .with_header(header("Content-Type", "text/plain; charset=utf-8"))
}

fn header(name: &'static str, value: &'static str) -> Header {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("static header is valid ASCII")
}

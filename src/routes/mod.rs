//! Request routing.
//!
//! Routes are matched by path first and method second:
//!
//! | path                    | methods    |
//! |-------------------------|------------|
//! | `/`, `/index.html`      | GET        |
//! | `/echo<anything>`       | GET        |
//! | `/user-agent`           | GET        |
//! | `/files/<name>`         | GET, POST  |
//!
//! A known path with another method is `405 Method Not Allowed`, anything
//! else is `404 Not Found`. Routing never fails: storage errors become
//! status codes inside the response.

pub mod files;

use std::path::Path;

use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::serialize_response;
use crate::storage::FileStore;

/// A matched path, borrowing its parameter from the request target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Index,
    Echo(&'a str),
    UserAgent,
    Files(&'a str),
}

impl<'a> Route<'a> {
    pub fn match_uri(uri: &'a str) -> Option<Self> {
        match uri {
            "/" | "/index.html" => Some(Route::Index),
            // Any `/echo` prefix; only a literal `/echo/` is stripped.
            _ if uri.starts_with("/echo") => {
                Some(Route::Echo(uri.strip_prefix("/echo/").unwrap_or(uri)))
            }
            "/user-agent" => Some(Route::UserAgent),
            _ => uri.strip_prefix("/files/").map(Route::Files),
        }
    }

    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Route::Index | Route::Echo(_) | Route::UserAgent => *method == Method::GET,
            Route::Files(_) => matches!(method, Method::GET | Method::POST),
        }
    }
}

/// Maps requests to responses for one served directory.
#[derive(Debug, Clone)]
pub struct Router {
    store: FileStore,
}

impl Router {
    pub fn new(store: FileStore) -> Self {
        Self { store }
    }

    pub async fn route(&self, req: &Request) -> Response {
        let Some(route) = Route::match_uri(&req.uri) else {
            return Response::not_found();
        };

        if !route.allows(&req.method) {
            return Response::empty(StatusCode::MethodNotAllowed);
        }

        match route {
            Route::Index => Response::ok(),
            Route::Echo(message) => Response::text(StatusCode::Ok, message),
            Route::UserAgent => Response::text(StatusCode::Ok, req.header_or_empty("User-Agent")),
            Route::Files(name) if req.method == Method::POST => {
                files::create(&self.store, name, req.body_bytes()).await
            }
            Route::Files(name) => files::fetch(&self.store, name).await,
        }
    }
}

/// Answers `req` against files under `base_dir` and returns the wire bytes.
pub async fn respond(req: &Request, base_dir: impl AsRef<Path>) -> Vec<u8> {
    let router = Router::new(FileStore::new(base_dir.as_ref()));
    serialize_response(&router.route(req).await)
}

use axum::http::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    Stream,
    Capture,
    NotFound,
}

/// Static dispatch table, fixed at build time.
pub static ROUTES: [(Method, &str, Route); 3] = [
    (Method::GET, "/", Route::Index),
    (Method::GET, "/stream", Route::Stream),
    (Method::GET, "/capture", Route::Capture),
];

pub fn route(method: &Method, path: &str) -> Route {
    ROUTES
        .iter()
        .find(|(m, p, _)| m == method && *p == path)
        .map_or(Route::NotFound, |(_, _, route)| *route)
}

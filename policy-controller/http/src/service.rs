use crate::Error;
use dns_policy_controller_k8s_index::PolicyIndex;
use futures::future;
use http::{header, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::task::{Context, Poll};
use tracing::{debug, trace};

type Body = http_body_util::Full<bytes::Bytes>;

/// Serves policy lookups from a [`PolicyIndex`].
#[derive(Clone, Debug)]
pub struct QueryService {
    index: PolicyIndex,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Route {
    Policies,
    Health,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    indexed_policies: usize,
}

#[derive(Serialize)]
struct Failure<'a> {
    error: &'a str,
}

// === impl QueryService ===

impl QueryService {
    pub fn new(index: PolicyIndex) -> Self {
        Self { index }
    }

    fn handle(
        &self,
        route: Route,
        method: &Method,
        query: Option<&str>,
    ) -> Result<Response<Body>, Error> {
        match route {
            Route::Health => json(
                StatusCode::OK,
                &Health {
                    status: "ok",
                    indexed_policies: self.index.size(),
                },
            ),

            Route::Policies if method != Method::GET => {
                let mut rsp = failure(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")?;
                rsp.headers_mut()
                    .insert(header::ALLOW, header::HeaderValue::from_static("GET"));
                Ok(rsp)
            }

            Route::Policies => {
                let Some(hash) = query.and_then(hash_param) else {
                    return failure(StatusCode::BAD_REQUEST, "missing hash parameter");
                };
                match self.index.get(&hash) {
                    Some(policy) => json(StatusCode::OK, &policy),
                    None => {
                        debug!(%hash, "No policy indexed");
                        failure(StatusCode::NOT_FOUND, "policy not found")
                    }
                }
            }
        }
    }
}

impl<B> tower::Service<Request<B>> for QueryService
where
    B: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), uri = %req.uri());
        let Some(route) = Route::of(req.uri().path()) else {
            return Box::pin(future::ready(failure(StatusCode::NOT_FOUND, "not found")));
        };

        let rsp = self.handle(route, req.method(), req.uri().query());
        Box::pin(future::ready(rsp))
    }
}

// === impl Route ===

impl Route {
    fn of(path: &str) -> Option<Self> {
        match path {
            "/api/policies" => Some(Self::Policies),
            "/healthz" => Some(Self::Health),
            _ => None,
        }
    }
}

/// Extracts a non-empty `hash` parameter from a query string.
fn hash_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "hash")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

fn json<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(body)?;
    Ok(Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("json response must be valid"))
}

fn failure(status: StatusCode, error: &str) -> Result<Response<Body>, Error> {
    json(status, &Failure { error })
}

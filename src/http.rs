//! HTTP inspection surface: health, metrics, REST browse/values and GraphQL.
//!
//! The surface runs on its own task. Failing to bind or a later server error is
//! logged and leaves the update loop alone.

use std::net::SocketAddr;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::address_space::AddressSpaceState;
use crate::observability::Metrics;
use crate::protocols::{graphql, rest};

/// Bind `addr` and serve on a background task. Returns `None` if the bind fails.
pub fn spawn(addr: SocketAddr, space: AddressSpaceState, metrics: Metrics) -> Option<JoinHandle<()>> {
    let builder = match Server::try_bind(&addr) {
        Ok(builder) => builder,
        Err(e) => {
            error!(%addr, error=%e, "http bind failed; inspection surface disabled");
            return None;
        }
    };

    let graphql_schema = graphql::build_schema(space.clone());
    let make_svc = make_service_fn(move |_conn| {
        let space = space.clone();
        let metrics = metrics.clone();
        let graphql_schema = graphql_schema.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req: Request<Body>| {
                let space = space.clone();
                let metrics = metrics.clone();
                let graphql_schema = graphql_schema.clone();
                async move { handle(req, space, metrics, graphql_schema).await }
            }))
        }
    });

    let server = builder.serve(make_svc);
    info!(%addr, "http listening");
    Some(tokio::spawn(async move {
        if let Err(e) = server.await {
            error!(error=%e, "http server error");
        }
    }))
}

pub async fn handle(
    req: Request<Body>,
    space: AddressSpaceState,
    metrics: Metrics,
    graphql_schema: graphql::SchemaType,
) -> Result<Response<Body>, hyper::Error> {
    let path = req.uri().path();
    match (req.method().as_str(), path) {
        ("GET", "/healthz") => Ok(Response::new(Body::from("ok"))),
        ("GET", "/metrics") => Ok(metrics.render()),
        ("GET", "/graphql") | ("POST", "/graphql") => graphql::handle(req, graphql_schema).await,
        (_, p) if p.starts_with("/v1/") => rest::handle(req, space).await,
        _ => {
            let mut r = Response::new(Body::from("not found"));
            *r.status_mut() = StatusCode::NOT_FOUND;
            Ok(r)
        }
    }
}

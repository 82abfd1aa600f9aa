use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{info, warn};

use crate::address_space::{AddressSpace, AddressSpaceState};
use crate::error::AddressSpaceError;
use crate::variant::Variant;

const BROWSE_ROOT: &str = "/v1/browse";
const BROWSE_PREFIX: &str = "/v1/browse/";
const VALUES_PREFIX: &str = "/v1/values/";

#[derive(Debug, Serialize)]
pub struct ValueResponse {
    pub path: String,
    pub node_id: String,
    pub value: Variant,
}

/// Browse, read and write over plain HTTP. Paths are dotted browse paths below
/// Objects, e.g. `/v1/values/NewObject.MyBool`.
pub async fn handle(req: Request<Body>, space: AddressSpaceState) -> Result<Response<Body>, hyper::Error> {
    let path = req.uri().path().to_string();

    let browse_path = if path == BROWSE_ROOT { Some("") } else { path.strip_prefix(BROWSE_PREFIX) };
    if let Some(browse_path) = browse_path {
        if req.method() != Method::GET {
            return Ok(status(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"));
        }
        let children = match space.resolve_path(browse_path).await {
            Ok(node) => space.browse(&node).await,
            Err(e) => Err(e),
        };
        return Ok(match children {
            Ok(children) => json(StatusCode::OK, &children),
            Err(e) => error_response(&e),
        });
    }

    let Some(browse_path) = path.strip_prefix(VALUES_PREFIX).map(str::to_string) else {
        return Ok(status(StatusCode::NOT_FOUND, "not found"));
    };
    let node = match space.resolve_path(&browse_path).await {
        Ok(node) => node,
        Err(e) => return Ok(error_response(&e)),
    };

    match *req.method() {
        Method::GET => Ok(match space.read_value(&node).await {
            Ok(value) => json(
                StatusCode::OK,
                &ValueResponse { path: browse_path, node_id: node.to_string(), value },
            ),
            Err(e) => error_response(&e),
        }),
        Method::PUT => {
            let body = hyper::body::to_bytes(req.into_body()).await?;
            let value: Variant = match serde_json::from_slice(&body) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error=%e, "invalid json");
                    return Ok(status(StatusCode::BAD_REQUEST, "invalid json"));
                }
            };
            Ok(match space.client_write(&node, value).await {
                Ok(()) => {
                    info!(node=%node, path=%browse_path, "client write accepted");
                    status(StatusCode::NO_CONTENT, "")
                }
                Err(e) => error_response(&e),
            })
        }
        _ => Ok(status(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")),
    }
}

fn error_response(e: &AddressSpaceError) -> Response<Body> {
    let code = match e {
        AddressSpaceError::UnknownPath(_) | AddressSpaceError::UnknownNode(_) => StatusCode::NOT_FOUND,
        AddressSpaceError::NotWritable(_) => StatusCode::FORBIDDEN,
        AddressSpaceError::TypeMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AddressSpaceError::NotAVariable(_) => StatusCode::BAD_REQUEST,
        AddressSpaceError::DuplicateNode(_) | AddressSpaceError::AccessDowngrade(_) => StatusCode::CONFLICT,
    };
    status(code, &e.to_string())
}

fn json<T: serde::Serialize>(status: StatusCode, v: &T) -> Response<Body> {
    let body = serde_json::to_vec(v).unwrap();
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn status(status: StatusCode, msg: &str) -> Response<Body> {
    Response::builder().status(status).body(Body::from(msg.to_string())).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::create_fixed_hierarchy;

    async fn space() -> AddressSpaceState {
        let space = AddressSpaceState::new("urn://test");
        let ns = space.register_namespace("http://test").await;
        let objects = space.objects_node();
        create_fixed_hierarchy(&space, &objects, ns).await.unwrap();
        space
    }

    async fn call(space: &AddressSpaceState, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
        let req = Request::builder().method(method).uri(uri).body(Body::from(body.to_string())).unwrap();
        let resp = handle(req, space.clone()).await.unwrap();
        let code = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        (code, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn browse_lists_children() {
        let space = space().await;
        let (code, body) = call(&space, Method::GET, "/v1/browse", "").await;
        assert_eq!(code, StatusCode::OK);
        assert!(body.contains("\"browse_name\":\"2:NewObject\""));

        let (code, body) = call(&space, Method::GET, "/v1/browse/NewObject", "").await;
        assert_eq!(code, StatusCode::OK);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn browse_route_needs_a_separator() {
        let space = space().await;
        let (code, _) = call(&space, Method::GET, "/v1/browseNewObject", "").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        let (code, _) = call(&space, Method::GET, "/v1/browse/", "").await;
        assert_eq!(code, StatusCode::OK);
    }

    #[tokio::test]
    async fn read_value_by_path() {
        let space = space().await;
        let (code, body) = call(&space, Method::GET, "/v1/values/NewObject.MyProperty", "").await;
        assert_eq!(code, StatusCode::OK);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["value"], serde_json::json!({"type": "double", "value": 8.8}));

        let (code, _) = call(&space, Method::GET, "/v1/values/NewObject.Nope", "").await;
        assert_eq!(code, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn writes_honour_access_and_type() {
        let space = space().await;
        let bool_false = r#"{"type":"boolean","value":false}"#;
        let (code, _) = call(&space, Method::PUT, "/v1/values/NewObject.MyBool", bool_false).await;
        assert_eq!(code, StatusCode::NO_CONTENT);

        let (code, _) = call(&space, Method::PUT, "/v1/values/NewObject.MyStringVar", r#"{"type":"string","value":"x"}"#).await;
        assert_eq!(code, StatusCode::FORBIDDEN);

        let (code, _) = call(&space, Method::PUT, "/v1/values/NewObject.MyProperty", bool_false).await;
        assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);

        let (code, _) = call(&space, Method::PUT, "/v1/values/NewObject.MyBool", "nope").await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }
}

use async_graphql::{Context, EmptySubscription, Json, Object, Request as GqlRequest, Schema, Variables};
use hyper::{Body, Method, Request, Response, StatusCode};

use crate::address_space::{AddressSpace, AddressSpaceState, NodeSummary};
use crate::variant::Variant;

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(space: AddressSpaceState) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(space)
        .finish()
}

#[derive(serde::Deserialize)]
struct HttpGraphQLRequest {
    query: String,
    #[serde(default)]
    variables: serde_json::Value,
    #[serde(default, rename = "operationName")]
    operation_name: Option<String>,
}

pub async fn handle(req: Request<Body>, schema: SchemaType) -> Result<Response<Body>, hyper::Error> {
    match *req.method() {
        Method::GET => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/plain; charset=utf-8")
            .body(Body::from(
                "GraphQL endpoint. Send POST /graphql with {query, variables, operationName}.",
            ))
            .unwrap()),
        Method::POST => {
            let body = hyper::body::to_bytes(req.into_body()).await?;
            let parsed: HttpGraphQLRequest = match serde_json::from_slice(&body) {
                Ok(v) => v,
                Err(_) => {
                    return Ok(Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .body(Body::from("invalid graphql http request"))
                        .unwrap());
                }
            };

            let mut gql = GqlRequest::new(parsed.query);
            if let Some(op) = parsed.operation_name {
                gql = gql.operation_name(op);
            }
            if !parsed.variables.is_null() {
                if let Ok(vars) = serde_json::from_value::<Variables>(parsed.variables) {
                    gql = gql.variables(vars);
                }
            }

            let resp = schema.execute(gql).await;
            let out = serde_json::to_vec(&resp).expect("serialize graphql response");
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/json")
                .body(Body::from(out))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Body::from("method not allowed"))
            .unwrap()),
    }
}

fn gql_err(e: impl std::fmt::Display) -> async_graphql::Error {
    async_graphql::Error::new(e.to_string())
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn ping(&self) -> &str {
        "pong"
    }

    /// Current value at a dotted browse path below Objects.
    async fn value(&self, ctx: &Context<'_>, path: String) -> async_graphql::Result<Json<Variant>> {
        let space = ctx.data::<AddressSpaceState>()?;
        let node = space.resolve_path(&path).await.map_err(gql_err)?;
        let value = space.read_value(&node).await.map_err(gql_err)?;
        Ok(Json(value))
    }

    /// Children of a browse path; Objects when no path is given.
    async fn browse(&self, ctx: &Context<'_>, path: Option<String>) -> async_graphql::Result<Json<Vec<NodeSummary>>> {
        let space = ctx.data::<AddressSpaceState>()?;
        let node = space.resolve_path(path.as_deref().unwrap_or("")).await.map_err(gql_err)?;
        let children = space.browse(&node).await.map_err(gql_err)?;
        Ok(Json(children))
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn write(&self, ctx: &Context<'_>, path: String, value: Json<Variant>) -> async_graphql::Result<bool> {
        let space = ctx.data::<AddressSpaceState>()?;
        let node = space.resolve_path(&path).await.map_err(gql_err)?;
        space.client_write(&node, value.0).await.map_err(gql_err)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::create_fixed_hierarchy;

    async fn schema() -> (AddressSpaceState, SchemaType) {
        let space = AddressSpaceState::new("urn://test");
        let ns = space.register_namespace("http://test").await;
        let objects = space.objects_node();
        create_fixed_hierarchy(&space, &objects, ns).await.unwrap();
        (space.clone(), build_schema(space))
    }

    #[tokio::test]
    async fn query_reads_value() {
        let (_, schema) = schema().await;
        let resp = schema.execute(r#"{ value(path: "NewObject.MyVariable") }"#).await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        let data = resp.data.into_json().unwrap();
        assert_eq!(data["value"], serde_json::json!({"type": "uint32", "value": 8}));
    }

    #[tokio::test]
    async fn mutation_respects_access_level() {
        let (space, schema) = schema().await;
        let ok = schema
            .execute(r#"mutation { write(path: "NewObject.MyBool", value: {type: "boolean", value: false}) }"#)
            .await;
        assert!(ok.errors.is_empty(), "{:?}", ok.errors);
        let node = space.resolve_path("NewObject.MyBool").await.unwrap();
        assert_eq!(space.read_value(&node).await.unwrap(), Variant::Boolean(false));

        let denied = schema
            .execute(r#"mutation { write(path: "NewObject.MyVariable", value: {type: "uint32", value: 1}) }"#)
            .await;
        assert_eq!(denied.errors.len(), 1);
    }
}

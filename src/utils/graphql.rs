//! Sui GraphQL client and the paginated object-owner traversal
//!
//! Objects are fetched page by page following the Relay cursor connections used
//! by Sui's GraphQL API. Each page is requested only after the previous one
//! has been consumed, and the traversal stops as soon as the caller's limit
//! is reached.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::types::{ObjectRecord, OwnerKind, PageInfo};

/// Maximum items per GraphQL page (Sui's server limit)
pub const MAX_PAGE_SIZE: usize = 50;

/// Error message the server returns once a cursor points at pruned data
pub const OUTSIDE_AVAILABLE_RANGE: &str = "Requested data is outside the available range";

const FIND_OBJECT_OWNERS_QUERY: &str = r#"
    query FindObjectOwners($first: Int!, $type: String!, $after: String) {
        objects(
            first: $first
            after: $after
            filter: {
                type: $type
            }
        ) {
            nodes {
                address
                owner {
                    __typename
                    ... on AddressOwner {
                        owner { address }
                    }
                    ... on Parent {
                        parent { address }
                    }
                }
            }
            pageInfo {
                hasNextPage
                endCursor
            }
        }
    }
"#;

const CLOCK_QUERY: &str = r#"
    query ClockTime {
        object(address: "0x6") {
            asMoveObject {
                contents { json }
            }
        }
    }
"#;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("GraphQL request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GraphQL query failed:\n{payload}")]
    Graphql { payload: String },

    #[error("Query returned no data")]
    NoData,

    #[error("Failed to decode GraphQL response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Raw GraphQL envelope: `data` and `errors` may both be present
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse {
    pub data: Option<Value>,
    pub errors: Option<Vec<Value>>,
}

impl GraphQlResponse {
    /// Message of the first reported error, if any
    pub fn first_error_message(&self) -> Option<&str> {
        self.errors
            .as_ref()
            .and_then(|errors| errors.first())
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
    }

    fn errors_payload(&self) -> String {
        let errors = self.errors.clone().unwrap_or_default();
        serde_json::to_string_pretty(&errors).unwrap_or_else(|_| format!("{:?}", errors))
    }
}

/// One page of the `objects` connection
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectsPage {
    nodes: Vec<ObjectNode>,
    page_info: PageInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct ObjectNode {
    address: String,
    owner: Option<Value>,
}

/// Anything that can answer one page of the type-filtered objects query
#[async_trait]
pub trait ObjectPageSource {
    async fn fetch_objects_page(
        &self,
        type_filter: &str,
        first: usize,
        after: Option<&str>,
    ) -> Result<GraphQlResponse, QueryError>;
}

/// GraphQL client for Sui network queries
#[derive(Clone)]
pub struct GraphQlClient {
    client: Client,
    endpoint: String,
}

impl GraphQlClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST a query and return the raw envelope without interpreting `errors`
    async fn query(&self, query: &str, variables: Value) -> Result<GraphQlResponse, QueryError> {
        let body = json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?;

        // GraphQL servers report query errors with a 200 and an `errors` array;
        // other statuses may still carry one, so decode before checking status.
        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str::<GraphQlResponse>(&text) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(QueryError::Graphql {
                payload: format!("HTTP {}: {}", status, text),
            }),
            Err(e) => Err(QueryError::Decode(e)),
        }
    }

    /// Current on-chain time in milliseconds, read from the clock object `0x6`
    pub async fn clock_timestamp_ms(&self) -> Result<u64, QueryError> {
        let response = self.query(CLOCK_QUERY, json!({})).await?;
        if response.errors.as_ref().is_some_and(|e| !e.is_empty()) {
            return Err(QueryError::Graphql {
                payload: response.errors_payload(),
            });
        }
        let data = response.data.ok_or(QueryError::NoData)?;

        let timestamp = data
            .pointer("/object/asMoveObject/contents/json/timestamp_ms")
            .ok_or(QueryError::NoData)?;

        // u64 values come back as JSON strings
        match timestamp {
            Value::String(s) => s.parse().map_err(|_| QueryError::Graphql {
                payload: format!("invalid timestamp_ms: {}", s),
            }),
            Value::Number(n) => n.as_u64().ok_or(QueryError::NoData),
            _ => Err(QueryError::NoData),
        }
    }
}

#[async_trait]
impl ObjectPageSource for GraphQlClient {
    async fn fetch_objects_page(
        &self,
        type_filter: &str,
        first: usize,
        after: Option<&str>,
    ) -> Result<GraphQlResponse, QueryError> {
        let variables = json!({
            "first": first,
            "type": type_filter,
            "after": after,
        });
        self.query(FIND_OBJECT_OWNERS_QUERY, variables).await
    }
}

/// Normalize an `owner` payload into a kind and optional address.
///
/// A null or missing owner is `Unknown`, never an error.
pub fn parse_owner(owner: Option<&Value>) -> (OwnerKind, Option<String>) {
    let Some(owner) = owner.filter(|o| !o.is_null()) else {
        return (OwnerKind::Unknown, None);
    };

    let nested_address = |field: &str| {
        owner
            .get(field)
            .and_then(|a| a.get("address"))
            .and_then(|a| a.as_str())
            .map(String::from)
    };

    match owner.get("__typename").and_then(|t| t.as_str()) {
        Some("AddressOwner") => (OwnerKind::AddressOwner, nested_address("owner")),
        Some("Parent") => (OwnerKind::Parent, nested_address("parent")),
        Some("Shared") => (OwnerKind::Shared, None),
        Some("Immutable") => (OwnerKind::Immutable, None),
        _ => (OwnerKind::Unknown, None),
    }
}

/// Collect every object of `type_filter` with its owner.
///
/// `limit == 0` means no limit. Results keep the server's order across pages.
/// A cursor that has fallen outside the server's retained range, or a page
/// that reports more data without an end cursor, ends the traversal early
/// with what has been collected so far.
pub async fn find_object_owners<S>(
    source: &S,
    type_filter: &str,
    limit: usize,
) -> Result<Vec<ObjectRecord>, QueryError>
where
    S: ObjectPageSource + Sync + ?Sized,
{
    let limit_reached = |count: usize| limit != 0 && count >= limit;

    let mut results: Vec<ObjectRecord> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut has_next_page = true;
    let mut query_num = 1;

    while has_next_page && !limit_reached(results.len()) {
        tracing::debug!("query {}, cursor: {:?}", query_num, cursor);
        query_num += 1;

        let response = source
            .fetch_objects_page(type_filter, MAX_PAGE_SIZE, cursor.as_deref())
            .await?;

        if response.errors.as_ref().is_some_and(|e| !e.is_empty()) {
            if response.first_error_message() == Some(OUTSIDE_AVAILABLE_RANGE) {
                tracing::info!(
                    "Cursor is outside the available range, stopping with {} objects",
                    results.len()
                );
                break;
            }
            return Err(QueryError::Graphql {
                payload: response.errors_payload(),
            });
        }

        let data = response.data.ok_or(QueryError::NoData)?;
        let page_value = data.get("objects").cloned().ok_or(QueryError::NoData)?;
        let page: ObjectsPage = serde_json::from_value(page_value)?;

        for node in page.nodes {
            if limit_reached(results.len()) {
                break;
            }
            let (kind, owner) = parse_owner(node.owner.as_ref());
            results.push(ObjectRecord::new(node.address, kind, owner));
        }

        has_next_page = page.page_info.has_next_page;
        cursor = page.page_info.end_cursor;
        if has_next_page && cursor.is_none() {
            // Restarting without a cursor would replay the first page
            tracing::warn!(
                "More pages reported but no end cursor given, stopping with {} objects",
                results.len()
            );
            break;
        }
    }

    Ok(results)
}

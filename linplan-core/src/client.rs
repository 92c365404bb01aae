//! Linear GraphQL client
//!
//! A thin wrapper over `reqwest`: every call is one POST of a fixed query,
//! issue lists are paginated with `first`/`after` until `hasNextPage` is false.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::constants::{ARCHIVE_MARKER, INITIATIVES_LIMIT, USER_AGENT};
use crate::linear::{
    GraphQLResponse, Initiative, InitiativesData, Issue, IssuesData, Team, TeamsData,
    INITIATIVES_QUERY, TEAMS_QUERY, TEAM_ISSUES_QUERY,
};
use crate::plan::{belongs_to_initiatives, is_active};
use crate::{Context, PlannerError, Result};

pub struct LinearClient {
    http: reqwest::Client,
    endpoint: url::Url,
    page_size: u32,
}

impl LinearClient {
    /// Build a client from the context; fails when no API key is configured
    pub fn new(ctx: &Context) -> Result<Self> {
        if ctx.api_key.is_empty() {
            return Err(PlannerError::Config(
                "LINEAR_API_KEY not found in environment or .env file".to_string(),
            ));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&ctx.api_key)?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(USER_AGENT),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(ctx.timeout_secs))
            .build()?;

        Ok(LinearClient {
            http,
            endpoint: ctx.api_url.clone(),
            page_size: ctx.page_size,
        })
    }

    /// Run one GraphQL query and return its `data` payload
    pub async fn request<T: DeserializeOwned>(&self, query: &str, variables: Option<Value>) -> Result<T> {
        let mut payload = json!({ "query": query });
        if let Some(variables) = variables {
            payload["variables"] = variables;
        }

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let result: GraphQLResponse<T> = response.json().await?;
        if let Some(errors) = result.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|err| err.message).collect();
            return Err(PlannerError::Linear(format!("GraphQL errors: {}", messages.join("; "))));
        }

        result
            .data
            .ok_or_else(|| PlannerError::Linear("response contained no data".to_string()))
    }

    pub async fn fetch_teams(&self) -> Result<Vec<Team>> {
        let data: TeamsData = self.request(TEAMS_QUERY, None).await?;
        debug!("Fetched {} teams", data.teams.nodes.len());
        Ok(data.teams.nodes)
    }

    /// Initiatives with their slug ids; `[Archive]` ones only on request
    pub async fn fetch_all_initiatives(&self, include_archived: bool) -> Result<Vec<Initiative>> {
        let data: InitiativesData = self
            .request(INITIATIVES_QUERY, Some(json!({ "first": INITIATIVES_LIMIT })))
            .await?;

        let mut initiatives = data.initiatives.nodes;
        if !include_archived {
            initiatives.retain(|initiative| !initiative.name.contains(ARCHIVE_MARKER));
        }
        Ok(initiatives)
    }

    /// Find a team by key, ignoring case
    pub async fn get_team_by_key(&self, team_key: &str) -> Result<Option<Team>> {
        let teams = self.fetch_teams().await?;
        Ok(teams
            .into_iter()
            .find(|team| team.key.eq_ignore_ascii_case(team_key)))
    }

    /// All non-canceled issues of a team, optionally limited to initiatives by slug
    pub async fn fetch_issues_for_team(
        &self,
        team_id: &str,
        initiative_slugs: Option<&[String]>,
    ) -> Result<Vec<Issue>> {
        let initiative_ids = match initiative_slugs.filter(|slugs| !slugs.is_empty()) {
            Some(slugs) => {
                let ids = resolve_initiative_ids(&self.fetch_all_initiatives(false).await?, slugs);
                if ids.is_empty() {
                    warn!("No matching initiatives found for slugs: {:?}", slugs);
                    return Ok(Vec::new());
                }
                Some(ids)
            }
            None => None,
        };

        let mut all_issues = Vec::new();
        let mut end_cursor: Option<String> = None;
        let mut page = 0;

        loop {
            page += 1;
            let variables = json!({
                "teamId": team_id,
                "first": self.page_size,
                "after": end_cursor,
            });
            let data: IssuesData = self.request(TEAM_ISSUES_QUERY, Some(variables)).await?;
            let fetched = data.issues.nodes.len();

            let issues = data.issues.nodes.into_iter().filter(is_active).filter(|issue| {
                initiative_ids
                    .as_ref()
                    .map_or(true, |ids| belongs_to_initiatives(issue, ids))
            });
            let before = all_issues.len();
            all_issues.extend(issues);
            debug!(
                "Page {}: {} issues fetched, {} kept",
                page,
                fetched,
                all_issues.len() - before
            );

            let page_info = data.issues.page_info;
            match page_info.end_cursor {
                Some(cursor) if page_info.has_next_page => end_cursor = Some(cursor),
                _ => break,
            }
        }

        info!("Fetched {} issues in {} page(s)", all_issues.len(), page);
        Ok(all_issues)
    }
}

/// Initiative ids whose slug is one of `slugs`
pub fn resolve_initiative_ids(initiatives: &[Initiative], slugs: &[String]) -> HashSet<String> {
    initiatives
        .iter()
        .filter(|initiative| {
            initiative
                .slug_id
                .as_ref()
                .is_some_and(|slug| slugs.contains(slug))
        })
        .map(|initiative| initiative.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "lin_api_test";

    fn test_context(server: &MockServer) -> Context {
        let mut ctx = Context::new();
        ctx.api_key = KEY.to_string();
        ctx.api_url = url::Url::parse(&format!("{}/graphql", server.uri())).unwrap();
        ctx.page_size = 2;
        ctx
    }

    fn issue_json(identifier: &str, state_type: &str, initiative_id: Option<&str>) -> Value {
        let initiatives: Vec<Value> = initiative_id
            .map(|id| vec![json!({ "id": id, "name": format!("Initiative {}", id), "slugId": format!("{}-slug", id) })])
            .unwrap_or_default();
        json!({
            "identifier": identifier,
            "title": format!("Title {}", identifier),
            "description": null,
            "url": format!("https://linear.app/acme/issue/{}", identifier),
            "estimate": null,
            "assignee": null,
            "state": { "name": state_type, "type": state_type },
            "cycle": null,
            "project": { "name": "Platform", "initiatives": { "nodes": initiatives } }
        })
    }

    fn issues_page(nodes: Vec<Value>, next: Option<&str>) -> Value {
        json!({
            "data": {
                "issues": {
                    "nodes": nodes,
                    "pageInfo": { "hasNextPage": next.is_some(), "endCursor": next }
                }
            }
        })
    }

    async fn mount_initiatives(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_string_contains("initiatives(first"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "initiatives": { "nodes": [
                    { "id": "n1", "name": "Security", "slugId": "sec" },
                    { "id": "n2", "name": "Growth", "slugId": "growth" },
                    { "id": "n3", "name": "[Archive] Legacy", "slugId": "legacy" }
                ] } }
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = LinearClient::new(&Context::new()).err().unwrap();
        assert!(matches!(err, PlannerError::Config(ref msg) if msg.contains("LINEAR_API_KEY")));
    }

    #[tokio::test]
    async fn test_fetch_teams_sends_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", KEY))
            .and(body_string_contains("teams"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "teams": { "nodes": [
                    { "id": "t1", "key": "APP1", "name": "Apps" },
                    { "id": "t2", "key": "WEB", "name": "Web" }
                ] } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LinearClient::new(&test_context(&server)).unwrap();
        let teams = client.fetch_teams().await.unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].key, "APP1");
    }

    #[tokio::test]
    async fn test_get_team_by_key_ignores_case() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "teams": { "nodes": [{ "id": "t1", "key": "APP1", "name": "Apps" }] } }
            })))
            .mount(&server)
            .await;

        let client = LinearClient::new(&test_context(&server)).unwrap();
        let team = client.get_team_by_key("app1").await.unwrap();
        assert_eq!(team.map(|t| t.id), Some("t1".to_string()));
        assert!(client.get_team_by_key("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_all_initiatives_hides_archived() {
        let server = MockServer::start().await;
        mount_initiatives(&server).await;

        let client = LinearClient::new(&test_context(&server)).unwrap();
        let active = client.fetch_all_initiatives(false).await.unwrap();
        let names: Vec<&str> = active.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Security", "Growth"]);

        let all = client.fetch_all_initiatives(true).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_issues_paginates_and_drops_canceled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "variables": { "teamId": "t1", "first": 2, "after": null } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(issues_page(
                vec![issue_json("APP-1", "started", None), issue_json("APP-2", "canceled", None)],
                Some("cursor-1"),
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "variables": { "after": "cursor-1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(issues_page(
                vec![issue_json("APP-3", "completed", None)],
                None,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = LinearClient::new(&test_context(&server)).unwrap();
        let issues = client.fetch_issues_for_team("t1", None).await.unwrap();
        let ids: Vec<&str> = issues.iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(ids, vec!["APP-1", "APP-3"]);
    }

    #[tokio::test]
    async fn test_fetch_issues_filters_by_initiative() {
        let server = MockServer::start().await;
        mount_initiatives(&server).await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "variables": { "teamId": "t1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(issues_page(
                vec![
                    issue_json("APP-1", "started", Some("n1")),
                    issue_json("APP-2", "started", Some("n2")),
                    issue_json("APP-3", "backlog", None),
                ],
                None,
            )))
            .mount(&server)
            .await;

        let client = LinearClient::new(&test_context(&server)).unwrap();
        let slugs = vec!["sec".to_string()];
        let issues = client.fetch_issues_for_team("t1", Some(&slugs)).await.unwrap();
        let ids: Vec<&str> = issues.iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(ids, vec!["APP-1"]);
    }

    #[tokio::test]
    async fn test_unknown_slugs_skip_issue_fetch() {
        let server = MockServer::start().await;
        mount_initiatives(&server).await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({ "variables": { "teamId": "t1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(issues_page(vec![], None)))
            .expect(0)
            .mount(&server)
            .await;

        let client = LinearClient::new(&test_context(&server)).unwrap();
        // Archived initiatives never resolve
        let slugs = vec!["legacy".to_string(), "missing".to_string()];
        let issues = client.fetch_issues_for_team("t1", Some(&slugs)).await.unwrap();
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn test_graphql_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Authentication required" }, { "message": "Try again" }]
            })))
            .mount(&server)
            .await;

        let client = LinearClient::new(&test_context(&server)).unwrap();
        let err = client.fetch_teams().await.unwrap_err();
        match err {
            PlannerError::Linear(msg) => {
                assert!(msg.contains("Authentication required"));
                assert!(msg.contains("Try again"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_data_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = LinearClient::new(&test_context(&server)).unwrap();
        let err = client.fetch_teams().await.unwrap_err();
        assert!(matches!(err, PlannerError::Linear(_)));
    }

    #[tokio::test]
    async fn test_http_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = LinearClient::new(&test_context(&server)).unwrap();
        let err = client.fetch_teams().await.unwrap_err();
        assert!(matches!(err, PlannerError::Http(_)));
    }

    #[test]
    fn test_resolve_initiative_ids() {
        let initiatives = vec![
            Initiative { id: "n1".into(), name: "Security".into(), slug_id: Some("sec".into()) },
            Initiative { id: "n2".into(), name: "Growth".into(), slug_id: None },
        ];
        let ids = resolve_initiative_ids(&initiatives, &["sec".to_string(), "growth".to_string()]);
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("n1"));
    }
}

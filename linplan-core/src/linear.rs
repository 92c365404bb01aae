//! Linear GraphQL data structures
//!
//! This module contains the subset of the Linear schema the planner reads:
//! teams, initiatives and issues with their cycle and project.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Generic GraphQL response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

/// `{ nodes: [...] }` connection without paging information
#[derive(Debug, Clone, Deserialize)]
pub struct Nodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Nodes { nodes: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Team {
    pub id: String,
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiative {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub name: Option<String>,
}

/// Workflow state; `type` is one of triage, backlog, unstarted, started, completed, canceled
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowState {
    pub name: String,
    #[serde(rename = "type")]
    pub state_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub name: Option<String>,
    pub number: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub initiatives: Nodes<Initiative>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub identifier: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub estimate: Option<f64>,
    pub assignee: Option<User>,
    pub state: Option<WorkflowState>,
    pub cycle: Option<Cycle>,
    pub project: Option<Project>,
}

impl Issue {
    /// Raw assignee name, if any
    pub fn assignee_name(&self) -> Option<&str> {
        self.assignee
            .as_ref()
            .and_then(|user| user.name.as_deref())
            .filter(|name| !name.is_empty())
    }
}

/// `teams { nodes }` query payload
#[derive(Debug, Deserialize)]
pub struct TeamsData {
    pub teams: Nodes<Team>,
}

/// `initiatives { nodes }` query payload
#[derive(Debug, Deserialize)]
pub struct InitiativesData {
    pub initiatives: Nodes<Initiative>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueConnection {
    #[serde(default)]
    pub nodes: Vec<Issue>,
    #[serde(default)]
    pub page_info: PageInfo,
}

/// `issues { nodes pageInfo }` query payload
#[derive(Debug, Deserialize)]
pub struct IssuesData {
    pub issues: IssueConnection,
}

pub const TEAMS_QUERY: &str = r#"
query {
    teams {
        nodes { id, key, name }
    }
}
"#;

pub const INITIATIVES_QUERY: &str = r#"
query($first: Int!) {
    initiatives(first: $first) {
        nodes {
            id
            name
            slugId
        }
    }
}
"#;

pub const TEAM_ISSUES_QUERY: &str = r#"
query($teamId: ID!, $first: Int!, $after: String) {
    issues(filter: { team: { id: { eq: $teamId } } }, first: $first, after: $after) {
        nodes {
            identifier
            title
            description
            url
            estimate
            assignee { name }
            state {
                name
                type
            }
            cycle {
                name
                number
                startsAt
                endsAt
            }
            project {
                name
                initiatives { nodes { id, name, slugId } }
            }
        }
        pageInfo { hasNextPage, endCursor }
    }
}
"#;

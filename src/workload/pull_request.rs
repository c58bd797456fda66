use crate::engine::{Check, Outcome, Scenario};
use crate::error::{CheckError, IterationError, SetupError, TeardownError};
use crate::http::classify_error;
use futures_util::future::BoxFuture;
use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const CHECK_STATUS_201: &str = "status is 201";
pub const CHECK_REVIEWERS_ASSIGNED: &str = "reviewers assigned";

/// Shape of the team created during setup.
#[derive(Debug, Clone)]
pub struct TeamSettings {
    pub name_prefix: String,
    pub members: u32,
}

impl Default for TeamSettings {
    fn default() -> Self {
        Self {
            name_prefix: "loadtest_team".to_string(),
            members: 20,
        }
    }
}

#[derive(Debug, Serialize)]
struct TeamMember {
    user_id: String,
    username: String,
    is_active: bool,
}

#[derive(Debug, Serialize)]
struct AddTeamRequest<'a> {
    team_name: &'a str,
    members: &'a [TeamMember],
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'a> {
    pull_request_id: String,
    pull_request_name: String,
    author_id: &'a str,
}

/// Produced once by setup and shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct TeamContext {
    pub team_name: String,
    pub author_id: String,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assigned_reviewers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPullRequest {
    pub pr: PullRequest,
}

/// Typed reply of `POST /pullRequest/create`. `body` is `None` when the
/// response did not decode as a created pull request.
#[derive(Debug, Clone)]
pub struct PullRequestReply {
    pub status: u16,
    pub body: Option<CreatedPullRequest>,
}

impl Outcome for PullRequestReply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn status(&self) -> Option<u16> {
        Some(self.status)
    }
}

/// Creates a team once, then opens pull requests authored by its first
/// member on every iteration.
pub struct PullRequestScenario {
    client: Client,
    base_url: String,
    team: TeamSettings,
}

impl PullRequestScenario {
    pub fn new(client: Client, base_url: impl Into<String>, team: TeamSettings) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            team,
        }
    }

    /// The observational checks run against every iteration.
    pub fn checks() -> Vec<Check<PullRequestReply>> {
        vec![
            Check::infallible(CHECK_STATUS_201, |result| result.status() == Some(201)),
            Check::new(CHECK_REVIEWERS_ASSIGNED, |result| {
                let reply: &PullRequestReply = result
                    .output()
                    .ok_or(CheckError::MissingField("response"))?;
                let created = reply.body.as_ref().ok_or(CheckError::MissingField("pr"))?;
                let reviewers = created
                    .pr
                    .assigned_reviewers
                    .as_ref()
                    .ok_or(CheckError::MissingField("assigned_reviewers"))?;
                Ok(!reviewers.is_empty())
            }),
        ]
    }

    async fn create_team(&self) -> Result<TeamContext, SetupError> {
        let team_name = format!("{}_{}", self.team.name_prefix, random_string(5));
        let members: Vec<TeamMember> = (0..self.team.members)
            .map(|i| TeamMember {
                user_id: format!("user_{}_{}", i, random_string(5)),
                username: format!("User {}", i),
                is_active: true,
            })
            .collect();

        let author_id = members
            .first()
            .map(|m| m.user_id.clone())
            .ok_or_else(|| SetupError::new("team must have at least one member"))?;

        tracing::info!("Creating team: {}", team_name);

        let response = self
            .client
            .post(format!("{}/team/add", self.base_url))
            .json(&AddTeamRequest {
                team_name: &team_name,
                members: &members,
            })
            .send()
            .await
            .map_err(|e| SetupError::new(format!("POST /team/add: {}", e)))?;

        let status = response.status().as_u16();
        if status != 200 && status != 201 {
            let body = response.text().await.unwrap_or_default();
            return Err(SetupError::new(format!(
                "failed to create team: {} {}",
                status, body
            )));
        }

        Ok(TeamContext {
            team_name,
            author_id,
            member_ids: members.into_iter().map(|m| m.user_id).collect(),
        })
    }

    async fn create_pull_request(
        &self,
        ctx: &TeamContext,
    ) -> Result<PullRequestReply, IterationError> {
        let payload = CreatePullRequest {
            pull_request_id: format!("pr_{}", random_string(10)),
            pull_request_name: format!("Feature {}", random_string(5)),
            author_id: &ctx.author_id,
        };

        let response = self
            .client
            .post(format!("{}/pullRequest/create", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(transport_error)?;
        let body = serde_json::from_slice::<CreatedPullRequest>(&bytes).ok();

        Ok(PullRequestReply { status, body })
    }
}

impl Scenario for PullRequestScenario {
    type Context = TeamContext;
    type Output = PullRequestReply;

    fn name(&self) -> &str {
        "pull_request_create"
    }

    fn setup(&self) -> BoxFuture<'_, Result<TeamContext, SetupError>> {
        Box::pin(self.create_team())
    }

    fn iteration<'a>(
        &'a self,
        ctx: &'a TeamContext,
    ) -> BoxFuture<'a, Result<PullRequestReply, IterationError>> {
        Box::pin(self.create_pull_request(ctx))
    }

    fn teardown<'a>(&'a self, ctx: &'a TeamContext) -> BoxFuture<'a, Result<(), TeardownError>> {
        Box::pin(async move {
            // The service has no delete endpoint; the team stays behind.
            tracing::info!(
                "Team '{}' ({} members) left in place",
                ctx.team_name,
                ctx.member_ids.len()
            );
            Ok(())
        })
    }
}

fn transport_error(err: reqwest::Error) -> IterationError {
    IterationError::Transport {
        kind: classify_error(&err),
        message: err.to_string(),
    }
}

fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

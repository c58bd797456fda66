//! Workloads the engine can drive. Each one implements [`crate::engine::Scenario`].

mod pull_request;

pub use pull_request::{
    CHECK_REVIEWERS_ASSIGNED, CHECK_STATUS_201, CreatedPullRequest, PullRequest,
    PullRequestReply, PullRequestScenario, TeamContext, TeamSettings,
};

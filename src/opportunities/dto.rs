use serde::Deserialize;
use time::OffsetDateTime;

use super::services::{ApplicationStatus, StatusAction};

#[derive(Debug, Deserialize)]
pub struct CreateOpportunityRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: Option<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub wage: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deadline: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOpportunityRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub required_skills: Option<Vec<String>>,
    pub wage: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deadline: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct StatusActionRequest {
    pub action: StatusAction,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpportunityFilter {
    pub q: Option<String>,
    pub skill: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    pub cover_letter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationStatusRequest {
    pub status: ApplicationStatus,
}

use time::OffsetDateTime;

use super::repo::Opportunity;
use crate::{
    auth::extractors::AuthUser,
    enums::text_enum,
    error::{AppError, AppResult},
};

text_enum! {
    pub enum OpportunityStatus {
        Active => "active",
        Closed => "closed",
        Hidden => "hidden",
    }
}

text_enum! {
    /// Requested change to a posting's status.
    pub enum StatusAction {
        Open => "open",
        Close => "close",
        Remove => "remove",
    }
}

impl StatusAction {
    pub fn target(self) -> OpportunityStatus {
        match self {
            StatusAction::Open => OpportunityStatus::Active,
            StatusAction::Close => OpportunityStatus::Closed,
            StatusAction::Remove => OpportunityStatus::Hidden,
        }
    }
}

text_enum! {
    pub enum ApplicationStatus {
        Pending => "pending",
        Shortlisted => "shortlisted",
        Accepted => "accepted",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

/// Recruiter decisions on an application.
pub fn check_application_transition(
    current: ApplicationStatus,
    target: ApplicationStatus,
) -> AppResult<()> {
    use ApplicationStatus::*;
    if !matches!(target, Shortlisted | Accepted | Rejected) {
        return Err(AppError::bad_request(format!(
            "Status must be shortlisted, accepted or rejected, not {target}"
        )));
    }
    if current == Withdrawn {
        return Err(AppError::bad_request("Application was withdrawn"));
    }
    Ok(())
}

pub fn check_can_apply(opp: &Opportunity, now: OffsetDateTime) -> AppResult<()> {
    if opp.status != OpportunityStatus::Active {
        return Err(AppError::bad_request("Opportunity is not accepting applications"));
    }
    if matches!(opp.deadline, Some(d) if d < now) {
        return Err(AppError::bad_request("Application deadline has passed"));
    }
    Ok(())
}

/// A posting removed by moderation stays under admin control.
pub fn check_not_moderated(opp: &Opportunity, actor: &AuthUser) -> AppResult<()> {
    if opp.status == OpportunityStatus::Hidden && !actor.is_admin() {
        return Err(AppError::forbidden("This opportunity was removed by a moderator"));
    }
    Ok(())
}

/// Hidden postings are only visible to their owner and admins.
pub fn visible_to(opp: &Opportunity, viewer: Option<&AuthUser>) -> bool {
    opp.status != OpportunityStatus::Hidden
        || viewer.is_some_and(|v| v.is_admin() || v.id == opp.recruiter_id)
}

/// Trimmed, lowercased, deduplicated, order kept.
pub fn normalize_skills(skills: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(skills.len());
    for s in skills {
        let s = s.trim().to_lowercase();
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;
    use time::Duration;
    use uuid::Uuid;

    fn posting(status: OpportunityStatus, deadline: Option<OffsetDateTime>) -> Opportunity {
        let now = OffsetDateTime::now_utc();
        Opportunity {
            id: Uuid::new_v4(),
            recruiter_id: Uuid::new_v4(),
            title: "Harvest hands".into(),
            description: "Maize harvest".into(),
            location: Some("Nakuru".into()),
            required_skills: vec!["harvesting".into()],
            wage: None,
            deadline,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn action_maps_to_status() {
        assert_eq!(StatusAction::Open.target(), OpportunityStatus::Active);
        assert_eq!(StatusAction::Close.target(), OpportunityStatus::Closed);
        assert_eq!(StatusAction::Remove.target(), OpportunityStatus::Hidden);
        assert!("archive".parse::<StatusAction>().is_err());
    }

    #[test]
    fn apply_requires_active_and_open_deadline() {
        let now = OffsetDateTime::now_utc();
        assert!(check_can_apply(&posting(OpportunityStatus::Active, None), now).is_ok());
        assert!(check_can_apply(&posting(OpportunityStatus::Active, Some(now + Duration::days(1))), now).is_ok());
        assert!(check_can_apply(&posting(OpportunityStatus::Active, Some(now - Duration::days(1))), now).is_err());
        assert!(check_can_apply(&posting(OpportunityStatus::Closed, None), now).is_err());
        assert!(check_can_apply(&posting(OpportunityStatus::Hidden, None), now).is_err());
    }

    #[test]
    fn application_transitions() {
        use ApplicationStatus::*;
        assert!(check_application_transition(Pending, Shortlisted).is_ok());
        assert!(check_application_transition(Shortlisted, Accepted).is_ok());
        assert!(check_application_transition(Pending, Rejected).is_ok());
        assert!(check_application_transition(Pending, Withdrawn).is_err());
        assert!(check_application_transition(Pending, Pending).is_err());
        assert!(check_application_transition(Withdrawn, Accepted).is_err());
    }

    #[test]
    fn hidden_visibility() {
        let opp = posting(OpportunityStatus::Hidden, None);
        let owner = AuthUser { id: opp.recruiter_id, role: Role::Recruiter };
        let admin = AuthUser { id: Uuid::new_v4(), role: Role::Admin };
        let stranger = AuthUser { id: Uuid::new_v4(), role: Role::Farmer };
        assert!(visible_to(&opp, Some(&owner)));
        assert!(visible_to(&opp, Some(&admin)));
        assert!(!visible_to(&opp, Some(&stranger)));
        assert!(!visible_to(&opp, None));
        assert!(visible_to(&posting(OpportunityStatus::Closed, None), None));
    }

    #[test]
    fn owner_cannot_touch_moderated_posting() {
        let hidden = posting(OpportunityStatus::Hidden, None);
        let owner = AuthUser { id: hidden.recruiter_id, role: Role::Recruiter };
        let admin = AuthUser { id: Uuid::new_v4(), role: Role::Admin };
        let err = check_not_moderated(&hidden, &owner).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
        assert!(check_not_moderated(&hidden, &admin).is_ok());

        let closed = posting(OpportunityStatus::Closed, None);
        let owner = AuthUser { id: closed.recruiter_id, role: Role::Recruiter };
        assert!(check_not_moderated(&closed, &owner).is_ok());
    }

    #[test]
    fn skills_are_normalized() {
        let skills = vec![" Pruning ".into(), "pruning".into(), "".into(), "Tractor".into()];
        assert_eq!(normalize_skills(skills), vec!["pruning", "tractor"]);
    }
}

//! Aggregation engine: computes rating statistics from the store.
//!
//! Never writes. Every report reads the current latest-version feedback, so
//! results always reflect revisions.

use crate::model::*;
use appraisal_core::error::{NotFoundError, ValidationError};
use appraisal_core::limits::{MAX_PRECISION, MAX_TREND_MONTHS};
use appraisal_core::{CycleId, FeedbackStore, Result, Role, User, UserDirectory, UserId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Read-only statistics over peer feedback.
pub struct AggregationEngine {
    store: Arc<dyn FeedbackStore>,
    directory: Arc<dyn UserDirectory>,
    /// Decimal places for averages and percentages.
    precision: u32,
}

/// Rows listed in the organization overview.
const RECENT_FEEDBACK_ROWS: usize = 10;

impl AggregationEngine {
    /// Precision above [`MAX_PRECISION`] is clamped.
    pub fn new(store: Arc<dyn FeedbackStore>, directory: Arc<dyn UserDirectory>, precision: u32) -> Self {
        if precision > MAX_PRECISION {
            warn!(requested = precision, max = MAX_PRECISION, "Display precision clamped");
        }
        Self {
            store,
            directory,
            precision: precision.min(MAX_PRECISION),
        }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Members of a department; an empty department does not exist.
    async fn department_members(&self, department: &str) -> Result<Vec<User>> {
        let members = self.directory.members_of(department).await?;
        if members.is_empty() {
            return Err(NotFoundError::UnknownDepartment(department.trim().to_string()).into());
        }
        Ok(members)
    }

    /// Averages over all feedback whose subject is in `department`.
    pub async fn department_stats(&self, department: &str) -> Result<RatingSummary> {
        let members = self.department_members(department).await?;
        let ids: Vec<UserId> = members.into_iter().map(|u| u.id).collect();
        let feedback = self.store.peer_feedback_about(&ids).await?;

        let totals: RatingTotals = feedback.iter().map(|f| &f.ratings).collect();
        debug!(department, rows = totals.count(), "Computed department stats");
        Ok(totals.summary(self.precision))
    }

    /// Averages over all feedback about one user.
    pub async fn user_stats(&self, user_id: &UserId) -> Result<RatingSummary> {
        let user = self.directory.resolve(user_id).await?;
        let feedback = self.store.peer_feedback_about(std::slice::from_ref(&user.id)).await?;

        let totals: RatingTotals = feedback.iter().map(|f| &f.ratings).collect();
        Ok(totals.summary(self.precision))
    }

    /// Monthly averages for a department, the `months` most recent months
    /// that have data, oldest first.
    pub async fn monthly_trend(&self, department: &str, months: u32) -> Result<Vec<TrendPoint>> {
        if !(1..=MAX_TREND_MONTHS).contains(&months) {
            return Err(ValidationError::InvalidField {
                field: "months",
                reason: format!("must be between 1 and {MAX_TREND_MONTHS} (got {months})"),
            }
            .into());
        }

        let members = self.department_members(department).await?;
        let ids: Vec<UserId> = members.into_iter().map(|u| u.id).collect();
        let feedback = self.store.peer_feedback_about(&ids).await?;

        let mut by_month: BTreeMap<String, RatingTotals> = BTreeMap::new();
        for record in &feedback {
            let month = record.created_at.format("%Y-%m").to_string();
            by_month.entry(month).or_default().add(&record.ratings);
        }

        let skip = by_month.len().saturating_sub(months as usize);
        Ok(by_month
            .into_iter()
            .skip(skip)
            .map(|(month, totals)| TrendPoint {
                month,
                averages: totals.averages(self.precision),
                count: totals.count(),
            })
            .collect())
    }

    /// Review coverage of a department for one cycle.
    pub async fn team_coverage(&self, department: &str, cycle: &CycleId) -> Result<TeamCoverage> {
        let members = self.department_members(department).await?;
        let ids: Vec<UserId> = members.iter().map(|u| u.id.clone()).collect();
        let feedback = self.store.peer_feedback_about(&ids).await?;

        let reviewed: HashSet<&UserId> = feedback.iter().map(|f| &f.to_user_id).collect();

        let mut with_assessment = 0u64;
        for id in &ids {
            if !self.store.self_assessment_history(id, cycle).await?.is_empty() {
                with_assessment += 1;
            }
        }

        let member_count = ids.len() as u64;
        let members_with_feedback = reviewed.len() as u64;
        Ok(TeamCoverage {
            department: department.trim().to_string(),
            cycle: cycle.to_string(),
            member_count,
            members_with_feedback,
            coverage_pct: rounded_percent(members_with_feedback, member_count, self.precision),
            members_with_assessment: with_assessment,
        })
    }

    /// How many colleagues a reviewer has rated.
    ///
    /// Colleagues are the other employees and team leads in the reviewer's
    /// department.
    pub async fn given_summary(&self, reviewer_id: &UserId) -> Result<GivenSummary> {
        let reviewer = self.directory.resolve(reviewer_id).await?;
        let colleagues = self.directory.colleagues_of(&reviewer).await?;
        let given = self.store.peer_feedback_by(&reviewer.id).await?;

        let rated: HashSet<&UserId> = given.iter().map(|f| &f.to_user_id).collect();
        let colleagues_reviewed = colleagues.iter().filter(|c| rated.contains(&c.id)).count() as u64;
        let colleague_count = colleagues.len() as u64;

        Ok(GivenSummary {
            reviewer: reviewer.id,
            given_count: given.len() as u64,
            colleague_count,
            colleagues_reviewed,
            completion_pct: rounded_percent(colleagues_reviewed, colleague_count, self.precision),
        })
    }

    /// Head counts by role and department plus the newest feedback across
    /// the organization.
    pub async fn org_overview(&self) -> Result<OrgOverview> {
        let users = self.directory.all_users().await?;
        let mut departments = Vec::new();
        for department in self.directory.departments().await? {
            let members = self.directory.members_of(&department).await?;
            departments.push(DepartmentBreakdown {
                members: members.len() as u64,
                team_leads: count_role(&members, Role::TeamLead),
                employees: count_role(&members, Role::Employee),
                department,
            });
        }

        let ids: Vec<UserId> = users.iter().map(|u| u.id.clone()).collect();
        let mut feedback = self.store.peer_feedback_about(&ids).await?;
        let feedback_count = feedback.len() as u64;
        feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let names: HashMap<&UserId, &str> = users.iter().map(|u| (&u.id, u.name.as_str())).collect();
        let name_of = |id: &UserId| names.get(id).map_or_else(|| id.to_string(), |n| n.to_string());
        let recent_feedback = feedback
            .into_iter()
            .take(RECENT_FEEDBACK_ROWS)
            .map(|f| RecentFeedback {
                from_name: name_of(&f.from_user_id),
                to_name: name_of(&f.to_user_id),
                feedback: f,
            })
            .collect();

        debug!(users = users.len(), feedback_count, "Computed organization overview");
        Ok(OrgOverview {
            admins: count_role(&users, Role::Admin),
            team_leads: count_role(&users, Role::TeamLead),
            employees: count_role(&users, Role::Employee),
            departments,
            feedback_count,
            recent_feedback,
        })
    }
}

fn count_role(users: &[User], role: Role) -> u64 {
    users.iter().filter(|u| u.role == role).count() as u64
}

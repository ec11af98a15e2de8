//! Leave requests and attendance.

use super::{patch, status_is, BackOffice};
use crate::dtos::{ActorRequest, AttendanceStatus, LeaveDecisionRequest, Presence, RequestLeaveRequest};
use crate::models::{AttendanceRecord, Entity, LeaveRequest, LeaveStatus, Role};
use crate::services::ids::{next_id, now};
use crate::services::workflow::{leave_transition, require_role};
use crate::store::{Mutation, Precondition};
use serde_json::{json, Value};
use service_core::error::AppError;
use tracing::{info, instrument, warn};
use validator::Validate;

impl BackOffice {
    /// Files a pending request for the acting employee.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id))]
    pub async fn request_leave(&self, req: RequestLeaveRequest) -> Result<LeaveRequest, AppError> {
        req.validate()?;
        let actor = self.actor(&req.actor_id).await?;
        if req.end_date < req.start_date {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "endDate must not be before startDate"
            )));
        }

        let leave = LeaveRequest {
            id: next_id(Entity::LeaveRequests.id_prefix()),
            employee_id: actor.id,
            employee_name: actor.name,
            start_date: req.start_date,
            end_date: req.end_date,
            reason: req.reason.trim().to_string(),
            status: LeaveStatus::Pending,
        };
        self.commit("request_leave", vec![Mutation::insert(&leave)?])
            .await?;
        Ok(leave)
    }

    /// pending -> approved | rejected.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, leave_id = %req.id))]
    pub async fn update_leave_status(
        &self,
        req: LeaveDecisionRequest,
    ) -> Result<LeaveRequest, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_hr_admin, "decide leave requests")?;

        let mut leave: LeaveRequest = self.load(&req.id).await?;
        let next = leave_transition(leave.status, req.status)?;
        self.commit(
            "update_leave_status",
            vec![Mutation::update(
                Entity::LeaveRequests,
                &leave.id,
                patch(json!({ "status": next.as_str() })),
                status_is(leave.status.as_str()),
            )],
        )
        .await?;

        info!(leave_id = %leave.id, status = %next, "Leave request decided");
        leave.status = next;
        Ok(leave)
    }

    /// The open-record check runs before the insert, so two concurrent
    /// clock-ins may both succeed. `clock_out` closes every open record of
    /// the employee, which settles such a pair.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id))]
    pub async fn clock_in(&self, req: ActorRequest) -> Result<AttendanceRecord, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        if self.open_attendance(&actor.id).await?.is_some() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "{} is already clocked in",
                actor.name
            )));
        }

        let record = AttendanceRecord {
            id: next_id(Entity::AttendanceLog.id_prefix()),
            employee_id: actor.id,
            employee_name: actor.name,
            clock_in_time: now(),
            clock_out_time: None,
        };
        self.commit("clock_in", vec![Mutation::insert(&record)?])
            .await?;
        Ok(record)
    }

    #[instrument(skip(self, req), fields(actor_id = %req.actor_id))]
    pub async fn clock_out(&self, req: ActorRequest) -> Result<AttendanceRecord, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        let mut open = self.open_records(&actor.id).await?;
        let mut record = open.pop().ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("{} is not clocked in", actor.name))
        })?;

        let at = now();
        let batch = open
            .iter()
            .chain(std::iter::once(&record))
            .map(|r| {
                Mutation::update(
                    Entity::AttendanceLog,
                    &r.id,
                    patch(json!({ "clockOutTime": at })),
                    Some(Precondition::field_is("clockOutTime", Value::Null)),
                )
            })
            .collect();
        self.commit("clock_out", batch).await?;
        if !open.is_empty() {
            warn!(employee_id = %actor.id, extra = open.len(), "Closed duplicate open attendance records");
        }
        record.clock_out_time = Some(at);
        Ok(record)
    }

    pub async fn attendance_status(&self, req: ActorRequest) -> Result<AttendanceStatus, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        Ok(match self.open_attendance(&actor.id).await? {
            Some(record) => AttendanceStatus {
                status: Presence::In,
                record: Some(record),
            },
            None => AttendanceStatus {
                status: Presence::Out,
                record: None,
            },
        })
    }

    /// The employee's latest record without a clock-out time.
    async fn open_attendance(&self, employee_id: &str) -> Result<Option<AttendanceRecord>, AppError> {
        Ok(self.open_records(employee_id).await?.pop())
    }

    /// Open records of the employee, oldest clock-in first.
    async fn open_records(&self, employee_id: &str) -> Result<Vec<AttendanceRecord>, AppError> {
        let mut open: Vec<AttendanceRecord> = self
            .list::<AttendanceRecord>()
            .await?
            .into_iter()
            .filter(|r| r.employee_id == employee_id && r.is_open())
            .collect();
        open.sort_by_key(|r| r.clock_in_time);
        Ok(open)
    }
}

//! Internal to-do items.

use super::records::prepare_update;
use super::BackOffice;
use crate::dtos::{AddTaskRequest, PatchRequest};
use crate::models::{Entity, EntityRecord, Task, User};
use crate::services::ids::{next_id, now};
use crate::store::Mutation;
use service_core::error::AppError;
use validator::Validate;

impl BackOffice {
    pub async fn add_task(&self, req: AddTaskRequest) -> Result<Task, AppError> {
        req.validate()?;
        let actor = self.actor(&req.actor_id).await?;
        self.load::<User>(&req.assigned_to).await?;

        let task = Task {
            id: next_id(Entity::Tasks.id_prefix()),
            title: req.title.trim().to_string(),
            description: req.description.trim().to_string(),
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
            assigned_to: req.assigned_to,
            created_by: actor.id,
            created_at: now(),
        };
        self.commit("add_task", vec![Mutation::insert(&task)?]).await?;
        Ok(task)
    }

    /// Only the creator, the assignee or a manager may change a task.
    pub async fn update_task(&self, req: PatchRequest) -> Result<Task, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        let current = self
            .store
            .get(Entity::Tasks, &req.id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Tasks '{}' not found", req.id)))?;
        let task = Task::from_record(current.clone())?;
        if actor.id != task.created_by && actor.id != task.assigned_to && !actor.role.is_manager() {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "only the creator, the assignee or a manager may change this task"
            )));
        }

        let mut data = req.data;
        for field in ["createdBy", "createdAt"] {
            data.remove(field);
        }
        let prepared = prepare_update(Entity::Tasks, &current, data)?;
        let updated = self.store.update(Entity::Tasks, &req.id, prepared.patch).await?;
        Task::from_record(updated)
    }
}

//! Session and generic record actions.
//!
//! These keep the shape of the spreadsheet-era API (`getAll`, `add`,
//! `update`, ...) but route every write through the typed models, so a
//! record that would not decode is never stored and protected fields only
//! change through the typed commands.

use super::{audit, patch, BackOffice};
use crate::dtos::{
    ActorRequest, AddRequest, BulkDeleteRequest, BulkUpdateRequest, EntityRequest, LoginRequest,
    UpdateRequest,
};
use crate::models::{
    AttendanceRecord, AuditAction, AuditLogEntry, CashHandover, Customer, Dsr, DsrStatus, Entity,
    EntityRecord, Invoice, InvoiceStatus, LeaveRequest, Record, Supplier, SupplierBill, Task,
    Traveler, User,
};
use crate::services::fares::apply_derivation;
use crate::services::ids::next_id;
use crate::store::{Mutation, Precondition, RecordUpdate};
use serde_json::{json, Map, Value};
use service_core::error::AppError;
use tracing::{info, instrument};
use validator::Validate;

/// Derived DSR fields; caller-supplied values are dropped and recomputed.
const DERIVED_DSR_FIELDS: [&str; 3] = ["sellingFare", "commission", "vatOnCommission"];

impl BackOffice {
    pub async fn test_connection(&self) -> Result<Value, AppError> {
        self.store.health_check().await?;
        Ok(json!({
            "backend": self.store.backend(),
            "message": "Connection successful!",
        }))
    }

    /// Looks the user up by username, case-insensitively. No password is checked.
    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn login(&self, req: LoginRequest) -> Result<User, AppError> {
        let username = req.username.trim();
        if username.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("username is required")));
        }

        let user = self
            .list::<User>()
            .await?
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found.")))?;

        let entry = audit(
            &user,
            AuditAction::UserLogin,
            format!("User {} logged in.", user.name),
            None,
        )?;
        self.commit("login", vec![entry]).await?;

        info!(user_id = %user.id, role = %user.role, "User logged in");
        Ok(user)
    }

    pub async fn logout(&self, req: ActorRequest) -> Result<(), AppError> {
        let actor = self.actor(&req.actor_id).await?;
        let entry = audit(
            &actor,
            AuditAction::UserLogout,
            format!("User {} logged out.", actor.name),
            None,
        )?;
        self.commit("logout", vec![entry]).await?;
        info!(user_id = %actor.id, "User logged out");
        Ok(())
    }

    /// Every collection, keyed by its snapshot name.
    pub async fn fetch_all_data(&self) -> Result<Map<String, Value>, AppError> {
        let mut snapshot = Map::new();
        for entity in Entity::ALL {
            let records = self.store.get_all(entity).await?;
            snapshot.insert(
                entity.data_key().to_string(),
                Value::Array(records.into_iter().map(Value::Object).collect()),
            );
        }
        Ok(snapshot)
    }

    pub async fn get_all(&self, req: EntityRequest) -> Result<Vec<Record>, AppError> {
        let entity: Entity = req.entity.parse()?;
        self.store.get_all(entity).await
    }

    /// Adds a record. Protected fields take their initial values and a
    /// missing id is generated.
    #[instrument(skip(self, req), fields(entity = %req.entity))]
    pub async fn add(&self, req: AddRequest) -> Result<Record, AppError> {
        let entity: Entity = req.entity.parse()?;
        if entity == Entity::Invoices {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoices are issued by submitting a DSR"
            )));
        }

        let mut record = req.data;
        let has_id = matches!(record.get("id"), Some(Value::String(id)) if !id.is_empty());
        if !has_id {
            record.insert("id".to_string(), next_id(entity.id_prefix()).into());
        }
        reset_protected(entity, &mut record);
        let record = conform(entity, record)?;

        if entity == Entity::Users {
            self.ensure_unique_username(username_of(&record), None).await?;
        }

        self.store.add(entity, record).await
    }

    /// Merges `data` into one record.
    #[instrument(skip(self, req), fields(entity = %req.entity, id = %req.id))]
    pub async fn update(&self, req: UpdateRequest) -> Result<Record, AppError> {
        let entity: Entity = req.entity.parse()?;
        let current = self
            .store
            .get(entity, &req.id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("{} '{}' not found", entity, req.id)))?;

        let prepared = prepare_update(entity, &current, req.data)?;
        if entity == Entity::Users {
            self.ensure_unique_username(username_of(&prepared.patch), Some(req.id.as_str()))
                .await?;
        }

        match prepared.guard {
            Some(guard) => {
                self.commit(
                    "update",
                    vec![Mutation::update(entity, &req.id, prepared.patch, Some(guard))],
                )
                .await?;
                self.store
                    .get(entity, &req.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("{} '{}' not found", entity, req.id)))
            }
            None => self.store.update(entity, &req.id, prepared.patch).await,
        }
    }

    /// Deletes by id. Posted DSRs and paid invoices are kept.
    #[instrument(skip(self, req), fields(entity = %req.entity, count = req.ids.len()))]
    pub async fn bulk_delete(&self, req: BulkDeleteRequest) -> Result<u64, AppError> {
        let entity: Entity = req.entity.parse()?;
        let Some(guard) = deletable(entity) else {
            return self.store.bulk_delete(entity, &req.ids).await;
        };

        let mut batch = Vec::new();
        for id in &req.ids {
            if let Some(record) = self.store.get(entity, id).await? {
                if guard.holds(&record) {
                    batch.push(Mutation::delete(entity, id, Some(guard.clone())));
                }
            }
        }
        let deleted = batch.len() as u64;
        if deleted > 0 {
            self.commit("bulk_delete", batch).await?;
        }
        Ok(deleted)
    }

    /// Merges each update into its record; unknown ids are skipped.
    #[instrument(skip(self, req), fields(entity = %req.entity, count = req.updates.len()))]
    pub async fn bulk_update(&self, req: BulkUpdateRequest) -> Result<u64, AppError> {
        let entity: Entity = req.entity.parse()?;

        let mut guarded = Vec::new();
        let mut plain = Vec::new();
        for update in req.updates {
            let Some(current) = self.store.get(entity, &update.id).await? else {
                continue;
            };
            let prepared = prepare_update(entity, &current, update.data)?;
            if entity == Entity::Users {
                self.ensure_unique_username(username_of(&prepared.patch), Some(update.id.as_str()))
                    .await?;
            }
            match prepared.guard {
                Some(guard) => {
                    guarded.push(Mutation::update(entity, &update.id, prepared.patch, Some(guard)))
                }
                None => plain.push(RecordUpdate {
                    id: update.id,
                    data: prepared.patch,
                }),
            }
        }

        if guarded.is_empty() {
            return self.store.bulk_update(entity, plain).await;
        }
        let updated = guarded.len() as u64;
        self.commit("bulk_update", guarded).await?;
        Ok(updated)
    }

    /// Usernames are unique ignoring case.
    pub(super) async fn ensure_unique_username(
        &self,
        username: Option<&str>,
        except_id: Option<&str>,
    ) -> Result<(), AppError> {
        let Some(username) = username else {
            return Ok(());
        };
        let taken = self
            .list::<User>()
            .await?
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(username) && Some(u.id.as_str()) != except_id);
        if taken {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Username '{}' is already taken",
                username
            )));
        }
        Ok(())
    }
}

fn username_of(record: &Record) -> Option<&str> {
    record.get("username").and_then(Value::as_str)
}

/// Patch ready to write, with the guard it must be written under.
#[derive(Debug)]
pub(super) struct PreparedUpdate {
    pub patch: Record,
    pub guard: Option<Precondition>,
}

/// Validates a generic update against the current record.
///
/// Protected fields may be echoed back unchanged; any other value is
/// rejected. DSRs are editable only while draft and have their fares
/// re-derived.
pub(super) fn prepare_update(
    entity: Entity,
    current: &Record,
    mut data: Record,
) -> Result<PreparedUpdate, AppError> {
    if entity == Entity::Dsrs {
        for field in DERIVED_DSR_FIELDS {
            data.remove(field);
        }
    }

    let mut changed = Vec::new();
    for field in entity.protected_fields() {
        if let Some(value) = data.remove(*field) {
            if !same_value(current.get(*field).unwrap_or(&Value::Null), &value) {
                changed.push(*field);
            }
        }
    }
    if !changed.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} field(s) {} can only be changed by their workflow actions",
            entity,
            changed.join(", ")
        )));
    }

    let guard = if entity == Entity::Dsrs {
        let status = current.get("status").and_then(Value::as_str).unwrap_or_default();
        if status != DsrStatus::Draft.as_str() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Only draft DSRs can be edited; this DSR is {}",
                status
            )));
        }
        Some(Precondition::field_is("status", DsrStatus::Draft.as_str()))
    } else {
        None
    };

    let mut merged = current.clone();
    merged.extend(data);
    let mut conformed = conform(entity, merged)?;
    conformed.remove("id");

    Ok(PreparedUpdate {
        patch: conformed,
        guard,
    })
}

/// Numbers compare by value, so `2200` matches a stored `2200.0`.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Initial values of protected fields on a new record.
fn reset_protected(entity: Entity, record: &mut Record) {
    let initial = match entity {
        Entity::Dsrs => json!({ "status": DsrStatus::Draft.as_str() }),
        Entity::Customers => json!({ "totalSpend": 0 }),
        Entity::SupplierBills => json!({ "status": "unpaid" }),
        Entity::LeaveRequests | Entity::CashHandovers => json!({ "status": "pending" }),
        _ => return,
    };
    if entity == Entity::CashHandovers {
        for field in ["managerId", "managerName", "dateConfirmed"] {
            record.remove(field);
        }
    }
    record.extend(patch(initial));
}

/// Decodes the record as its typed model, validates it and encodes it back.
fn conform(entity: Entity, record: Record) -> Result<Record, AppError> {
    match entity {
        Entity::Users => validated::<User>(record),
        Entity::Customers => validated::<Customer>(record),
        Entity::Suppliers => validated::<Supplier>(record),
        Entity::Travelers => validated::<Traveler>(record),
        Entity::Dsrs => {
            let mut dsr = Dsr::from_input(record)?;
            apply_derivation(&mut dsr)?;
            dsr.validate()?;
            dsr.to_record()
        }
        Entity::Invoices => decoded::<Invoice>(record),
        Entity::SupplierBills => validated::<SupplierBill>(record),
        Entity::LeaveRequests => {
            let leave = LeaveRequest::from_input(record)?;
            if leave.end_date < leave.start_date {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "endDate must not be before startDate"
                )));
            }
            leave.to_record()
        }
        Entity::CashHandovers => decoded::<CashHandover>(record),
        Entity::AttendanceLog => decoded::<AttendanceRecord>(record),
        Entity::AuditLog => decoded::<AuditLogEntry>(record),
        Entity::Tasks => validated::<Task>(record),
    }
}

fn validated<T: EntityRecord + Validate>(record: Record) -> Result<Record, AppError> {
    let model = T::from_input(record)?;
    model.validate()?;
    model.to_record()
}

fn decoded<T: EntityRecord>(record: Record) -> Result<Record, AppError> {
    T::from_input(record)?.to_record()
}

/// Guard that keeps finalised records out of bulk deletes.
pub(super) fn deletable(entity: Entity) -> Option<Precondition> {
    match entity {
        Entity::Dsrs => Some(Precondition::field_in(
            "status",
            &[
                DsrStatus::Draft.as_str(),
                DsrStatus::Submitted.as_str(),
                DsrStatus::Approved.as_str(),
            ],
        )),
        Entity::Invoices => Some(Precondition::field_in(
            "status",
            &[
                InvoiceStatus::Draft.as_str(),
                InvoiceStatus::Ready.as_str(),
                InvoiceStatus::Void.as_str(),
            ],
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        patch(value)
    }

    fn draft_dsr() -> Record {
        record(json!({
            "id": "DSR-9",
            "date": "2024-07-20",
            "agentUsername": "agent",
            "agentName": "Sales Agent",
            "customerId": "CUST-2",
            "serviceType": "flight",
            "pnr": "AB1CDE",
            "route": "JED-DXB-JED",
            "baseFare": 1800,
            "taxes": 400,
            "discount": 0,
            "netFare": 2100,
            "sellingFare": 2200,
            "commission": 100,
            "vatOnCommission": 15,
            "status": "draft",
            "paymentMethod": "card"
        }))
    }

    #[test]
    fn echoed_protected_fields_are_accepted() {
        let current = draft_dsr();
        let prepared = prepare_update(
            Entity::Dsrs,
            &current,
            record(json!({ "id": "DSR-9", "status": "draft", "discount": 100 })),
        )
        .unwrap();
        assert_eq!(prepared.patch["sellingFare"], json!(2100.0));
        assert_eq!(prepared.patch["commission"], json!(0.0));
        assert!(prepared.patch.get("id").is_none());
        assert!(prepared.guard.is_some());
    }

    #[test]
    fn changing_a_protected_field_is_rejected() {
        let current = draft_dsr();
        let err = prepare_update(
            Entity::Dsrs,
            &current,
            record(json!({ "status": "posted" })),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn caller_supplied_fares_are_ignored() {
        let current = draft_dsr();
        let prepared = prepare_update(
            Entity::Dsrs,
            &current,
            record(json!({ "sellingFare": 9999, "commission": 9999 })),
        )
        .unwrap();
        assert_eq!(prepared.patch["sellingFare"], json!(2200.0));
    }

    #[test]
    fn only_draft_dsrs_are_editable() {
        let mut current = draft_dsr();
        current.insert("status".into(), "approved".into());
        let err = prepare_update(Entity::Dsrs, &current, record(json!({ "pnr": "ZZ9" }))).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn customer_total_spend_is_protected() {
        let current = record(json!({
            "id": "CUST-1", "name": "Ali", "phone": "1", "email": "", "type": "individual", "totalSpend": 100
        }));
        assert!(prepare_update(Entity::Customers, &current, record(json!({ "totalSpend": 100.0 }))).is_ok());
        assert!(prepare_update(Entity::Customers, &current, record(json!({ "totalSpend": 5 }))).is_err());
    }

    #[test]
    fn new_records_start_in_their_initial_state() {
        let mut handover = record(json!({ "status": "confirmed", "managerId": "2" }));
        reset_protected(Entity::CashHandovers, &mut handover);
        assert_eq!(handover["status"], "pending");
        assert!(handover.get("managerId").is_none());
    }

    #[test]
    fn leave_dates_must_be_ordered() {
        let leave = record(json!({
            "id": "LR-9", "employeeId": "3", "employeeName": "Sales Agent",
            "startDate": "2024-08-05", "endDate": "2024-08-01", "status": "pending"
        }));
        assert!(conform(Entity::LeaveRequests, leave).is_err());
    }
}

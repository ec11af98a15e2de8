//! Customers, suppliers, travelers and employees.

use super::records::prepare_update;
use super::{audit, BackOffice};
use crate::dtos::{
    AddCustomerRequest, AddEmployeeRequest, AddSupplierRequest, AddTravelerRequest, BulkOutcome,
    IdsRequest, PatchRequest,
};
use crate::models::{
    AuditAction, Customer, Dsr, Entity, EntityRecord, Role, Supplier, Traveler, User,
};
use crate::services::ids::next_id;
use crate::services::workflow::require_role;
use crate::store::Mutation;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashSet;
use tracing::{info, instrument};
use validator::Validate;

impl BackOffice {
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id))]
    pub async fn add_customer(&self, req: AddCustomerRequest) -> Result<Customer, AppError> {
        req.validate()?;
        let actor = self.actor(&req.actor_id).await?;

        let customer = Customer {
            id: next_id(Entity::Customers.id_prefix()),
            name: req.name.trim().to_string(),
            phone: req.phone.trim().to_string(),
            email: req.email.trim().to_string(),
            customer_type: req.customer_type,
            total_spend: Decimal::ZERO,
        };
        self.commit(
            "add_customer",
            vec![
                Mutation::insert(&customer)?,
                audit(
                    &actor,
                    AuditAction::CreateCustomer,
                    format!("Created customer {} ({})", customer.name, customer.id),
                    Some(&customer.id),
                )?,
            ],
        )
        .await?;
        Ok(customer)
    }

    /// Customers still referenced by a DSR are kept and reported as skipped.
    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, count = req.ids.len()))]
    pub async fn bulk_delete_customers(&self, req: IdsRequest) -> Result<BulkOutcome, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_manager, "delete customers")?;

        let referenced: HashSet<String> = self
            .list::<Dsr>()
            .await?
            .into_iter()
            .map(|d| d.customer_id)
            .collect();

        let mut batch = Vec::new();
        let mut outcome = BulkOutcome {
            affected: Vec::new(),
            skipped: Vec::new(),
        };
        for id in req.ids {
            match self.find::<Customer>(&id).await? {
                Some(customer) if !referenced.contains(&customer.id) => {
                    batch.push(Mutation::delete(Entity::Customers, &id, None));
                    batch.push(audit(
                        &actor,
                        AuditAction::DeleteCustomer,
                        format!("Deleted customer {} ({})", customer.name, customer.id),
                        Some(&customer.id),
                    )?);
                    outcome.affected.push(id);
                }
                _ => outcome.skipped.push(id),
            }
        }
        if !batch.is_empty() {
            self.commit("bulk_delete_customers", batch).await?;
        }
        Ok(outcome)
    }

    pub async fn add_supplier(&self, req: AddSupplierRequest) -> Result<Supplier, AppError> {
        req.validate()?;
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "add suppliers")?;

        let supplier = Supplier {
            id: next_id(Entity::Suppliers.id_prefix()),
            name: req.name.trim().to_string(),
            supplier_type: req.supplier_type,
        };
        self.commit("add_supplier", vec![Mutation::insert(&supplier)?])
            .await?;
        Ok(supplier)
    }

    pub async fn add_traveler(&self, req: AddTravelerRequest) -> Result<Traveler, AppError> {
        req.validate()?;
        self.actor(&req.actor_id).await?;
        self.load::<Customer>(&req.customer_id).await?;

        let traveler = Traveler {
            id: next_id(Entity::Travelers.id_prefix()),
            name: req.name.trim().to_string(),
            passport_no: req.passport_no.trim().to_uppercase(),
            nationality: req.nationality.trim().to_string(),
            customer_id: req.customer_id,
        };
        self.commit("add_traveler", vec![Mutation::insert(&traveler)?])
            .await?;
        Ok(traveler)
    }

    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, username = %req.username))]
    pub async fn add_employee(&self, req: AddEmployeeRequest) -> Result<User, AppError> {
        req.validate()?;
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_hr_admin, "add employees")?;

        let username = req.username.trim().to_string();
        self.ensure_unique_username(Some(username.as_str()), None).await?;

        let user = User {
            id: next_id(Entity::Users.id_prefix()),
            username,
            email: req.email.trim().to_string(),
            role: req.role,
            branch: req.branch.trim().to_string(),
            name: req.name.trim().to_string(),
        };
        self.commit("add_employee", vec![Mutation::insert(&user)?])
            .await?;
        info!(user_id = %user.id, role = %user.role, "Employee added");
        Ok(user)
    }

    #[instrument(skip(self, req), fields(actor_id = %req.actor_id, user_id = %req.id))]
    pub async fn update_employee(&self, req: PatchRequest) -> Result<User, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_hr_admin, "update employees")?;

        let current = self
            .store
            .get(Entity::Users, &req.id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Users '{}' not found", req.id)))?;
        let prepared = prepare_update(Entity::Users, &current, req.data)?;
        let username = prepared.patch.get("username").and_then(|v| v.as_str());
        self.ensure_unique_username(username, Some(req.id.as_str()))
            .await?;

        let updated = self.store.update(Entity::Users, &req.id, prepared.patch).await?;
        User::from_record(updated)
    }
}

use super::BackOffice;
use crate::dtos::{ActorRequest, CashLedgerRequest, ReportRequest};
use crate::models::{CashHandover, Dsr, Role, Supplier, SupplierBill, User};
use crate::services::reports::{
    agent_cash_ledger, agent_performance, commission_report, fare_discrepancies, sales_summary,
    supplier_bills_report, AgentCommission, AgentPerformance, CashLedger, DateRange,
    FareDiscrepancy, SalesSummary, SupplierBillTotals,
};
use crate::services::workflow::require_role;
use service_core::error::AppError;

impl BackOffice {
    pub async fn sales_summary(&self, req: ReportRequest) -> Result<SalesSummary, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "view sales reports")?;
        let dsrs = self.list::<Dsr>().await?;
        Ok(sales_summary(&dsrs, range(&req)?))
    }

    pub async fn agent_performance(&self, req: ReportRequest) -> Result<Vec<AgentPerformance>, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "view sales reports")?;
        let dsrs = self.list::<Dsr>().await?;
        let users = self.list::<User>().await?;
        Ok(agent_performance(&dsrs, &users, range(&req)?))
    }

    pub async fn commission_report(&self, req: ReportRequest) -> Result<Vec<AgentCommission>, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "view sales reports")?;
        let dsrs = self.list::<Dsr>().await?;
        let users = self.list::<User>().await?;
        Ok(commission_report(&dsrs, &users, range(&req)?))
    }

    pub async fn supplier_bills_report(
        &self,
        req: ReportRequest,
    ) -> Result<Vec<SupplierBillTotals>, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "view supplier reports")?;
        let bills = self.list::<SupplierBill>().await?;
        let suppliers = self.list::<Supplier>().await?;
        Ok(supplier_bills_report(&bills, &suppliers, range(&req)?))
    }

    /// Agents may read their own ledger; finance roles may read anyone's.
    pub async fn agent_cash_ledger(&self, req: CashLedgerRequest) -> Result<CashLedger, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        if actor.id != req.agent_id {
            require_role(&actor, Role::is_finance, "view other agents' cash ledgers")?;
        }
        let agent: User = self.load(&req.agent_id).await?;
        let dsrs = self.list::<Dsr>().await?;
        let handovers = self.list::<CashHandover>().await?;
        Ok(agent_cash_ledger(&agent, &dsrs, &handovers))
    }

    pub async fn fare_discrepancies(&self, req: ActorRequest) -> Result<Vec<FareDiscrepancy>, AppError> {
        let actor = self.actor(&req.actor_id).await?;
        require_role(&actor, Role::is_finance, "audit DSR fares")?;
        let dsrs = self.list::<Dsr>().await?;
        Ok(fare_discrepancies(&dsrs))
    }
}

fn range(req: &ReportRequest) -> Result<DateRange, AppError> {
    if let (Some(from), Some(to)) = (req.from, req.to) {
        if to < from {
            return Err(AppError::BadRequest(anyhow::anyhow!("'to' must not be before 'from'")));
        }
    }
    Ok(DateRange {
        from: req.from,
        to: req.to,
    })
}

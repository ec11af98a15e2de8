//! Read-only reports over DSRs, supplier bills and cash handovers.

use crate::models::{
    CashHandover, Dsr, HandoverStatus, PaymentMethod, ServiceType, Supplier, SupplierBill,
    SupplierBillStatus, User,
};
use crate::services::fares::{derive, DerivedFares, FareInputs};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// Inclusive date range; either bound may be open.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSales {
    pub name: &'static str,
    pub value: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub total_sales: Decimal,
    pub total_commission: Decimal,
    pub total_vat: Decimal,
    pub dsr_count: usize,
    pub sales_by_service: Vec<ServiceSales>,
}

pub fn sales_summary(dsrs: &[Dsr], range: DateRange) -> SalesSummary {
    let mut by_service: HashMap<ServiceType, Decimal> = HashMap::new();
    let mut summary = SalesSummary {
        total_sales: Decimal::ZERO,
        total_commission: Decimal::ZERO,
        total_vat: Decimal::ZERO,
        dsr_count: 0,
        sales_by_service: Vec::new(),
    };

    for dsr in dsrs.iter().filter(|d| range.contains(d.date)) {
        summary.total_sales += dsr.selling_fare;
        summary.total_commission += dsr.commission;
        summary.total_vat += dsr.vat_on_commission;
        summary.dsr_count += 1;
        *by_service.entry(dsr.service_type).or_default() += dsr.selling_fare;
    }

    summary.sales_by_service = ServiceType::ALL
        .iter()
        .map(|s| ServiceSales {
            name: s.label(),
            value: by_service.get(s).copied().unwrap_or_default(),
        })
        .collect();
    summary
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub agent_username: String,
    pub agent_name: String,
    pub total_sales: Decimal,
    pub commission: Decimal,
    pub dsr_count: usize,
}

/// Totals per agent, highest sales first. Names come from the user list,
/// falling back to the username.
pub fn agent_performance(dsrs: &[Dsr], users: &[User], range: DateRange) -> Vec<AgentPerformance> {
    let names = agent_names(users);
    let mut rows: HashMap<String, AgentPerformance> = HashMap::new();
    for dsr in dsrs.iter().filter(|d| range.contains(d.date)) {
        let key = dsr.agent_username.to_lowercase();
        let row = rows.entry(key.clone()).or_insert_with(|| AgentPerformance {
            agent_username: dsr.agent_username.clone(),
            agent_name: display_name(&names, &key, &dsr.agent_username),
            total_sales: Decimal::ZERO,
            commission: Decimal::ZERO,
            dsr_count: 0,
        });
        row.total_sales += dsr.selling_fare;
        row.commission += dsr.commission;
        row.dsr_count += 1;
    }

    let mut rows: Vec<AgentPerformance> = rows.into_values().collect();
    rows.sort_by(|a, b| {
        b.total_sales
            .cmp(&a.total_sales)
            .then_with(|| a.agent_name.cmp(&b.agent_name))
    });
    rows
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCommission {
    pub agent_username: String,
    pub agent_name: String,
    pub flight: Decimal,
    pub hotel: Decimal,
    pub visa: Decimal,
    pub other: Decimal,
    pub total: Decimal,
}

impl AgentCommission {
    fn add(&mut self, service: ServiceType, commission: Decimal) {
        let bucket = match service {
            ServiceType::Flight => &mut self.flight,
            ServiceType::Hotel => &mut self.hotel,
            ServiceType::Visa => &mut self.visa,
            ServiceType::Other => &mut self.other,
        };
        *bucket += commission;
        self.total += commission;
    }
}

/// Commission per agent split by service type, highest total first.
pub fn commission_report(dsrs: &[Dsr], users: &[User], range: DateRange) -> Vec<AgentCommission> {
    let names = agent_names(users);
    let mut rows: HashMap<String, AgentCommission> = HashMap::new();
    for dsr in dsrs.iter().filter(|d| range.contains(d.date)) {
        let key = dsr.agent_username.to_lowercase();
        rows.entry(key.clone())
            .or_insert_with(|| AgentCommission {
                agent_username: dsr.agent_username.clone(),
                agent_name: display_name(&names, &key, &dsr.agent_username),
                flight: Decimal::ZERO,
                hotel: Decimal::ZERO,
                visa: Decimal::ZERO,
                other: Decimal::ZERO,
                total: Decimal::ZERO,
            })
            .add(dsr.service_type, dsr.commission);
    }

    let mut rows: Vec<AgentCommission> = rows.into_values().collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.agent_name.cmp(&b.agent_name)));
    rows
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupplierBillTotals {
    pub supplier_id: String,
    pub supplier_name: String,
    pub total_billed: Decimal,
    pub total_paid: Decimal,
    pub total_unpaid: Decimal,
    pub bill_count: usize,
}

/// Billed, paid and unpaid totals per supplier over bills dated in `range`,
/// largest billed first. Void bills are left out.
pub fn supplier_bills_report(
    bills: &[SupplierBill],
    suppliers: &[Supplier],
    range: DateRange,
) -> Vec<SupplierBillTotals> {
    let names: HashMap<&str, &str> = suppliers
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();

    let mut rows: HashMap<String, SupplierBillTotals> = HashMap::new();
    for bill in bills
        .iter()
        .filter(|b| b.status != SupplierBillStatus::Void && range.contains(b.date))
    {
        let row = rows
            .entry(bill.supplier_id.clone())
            .or_insert_with(|| SupplierBillTotals {
                supplier_id: bill.supplier_id.clone(),
                supplier_name: names
                    .get(bill.supplier_id.as_str())
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "Unknown Supplier".to_string()),
                total_billed: Decimal::ZERO,
                total_paid: Decimal::ZERO,
                total_unpaid: Decimal::ZERO,
                bill_count: 0,
            });
        row.total_billed += bill.total;
        match bill.status {
            SupplierBillStatus::Paid => row.total_paid += bill.total,
            SupplierBillStatus::Unpaid => row.total_unpaid += bill.total,
            SupplierBillStatus::Void => {}
        }
        row.bill_count += 1;
    }

    let mut rows: Vec<SupplierBillTotals> = rows.into_values().collect();
    rows.sort_by(|a, b| {
        b.total_billed
            .cmp(&a.total_billed)
            .then_with(|| a.supplier_name.cmp(&b.supplier_name))
    });
    rows
}

fn agent_names(users: &[User]) -> HashMap<String, &str> {
    users
        .iter()
        .map(|u| (u.username.to_lowercase(), u.name.as_str()))
        .collect()
}

fn display_name(names: &HashMap<String, &str>, key: &str, username: &str) -> String {
    names
        .get(key)
        .map(|n| n.to_string())
        .unwrap_or_else(|| username.to_string())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub description: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CashLedger {
    pub agent_id: String,
    pub cash_in_hand: Decimal,
    pub total_pending: Decimal,
    /// Newest first.
    pub entries: Vec<LedgerEntry>,
}

/// Cash sales are debits, handovers are credits. The running balance is
/// accumulated oldest first and the entries are returned newest first.
pub fn agent_cash_ledger(agent: &User, dsrs: &[Dsr], handovers: &[CashHandover]) -> CashLedger {
    let cash_dsrs: Vec<&Dsr> = dsrs
        .iter()
        .filter(|d| {
            d.payment_method == PaymentMethod::Cash
                && d.agent_username.eq_ignore_ascii_case(&agent.username)
        })
        .collect();
    let own_handovers: Vec<&CashHandover> =
        handovers.iter().filter(|h| h.agent_id == agent.id).collect();

    let mut entries: Vec<LedgerEntry> = cash_dsrs
        .iter()
        .map(|d| LedgerEntry {
            date: d.date,
            description: format!("Cash Sale DSR: {} (PNR: {})", d.id, d.pnr),
            debit: d.selling_fare,
            credit: Decimal::ZERO,
            balance: Decimal::ZERO,
        })
        .chain(own_handovers.iter().map(|h| LedgerEntry {
            date: h.date_initiated.date_naive(),
            description: format!("Handover ID: {} ({})", h.id, h.status.as_str()),
            debit: Decimal::ZERO,
            credit: h.amount,
            balance: Decimal::ZERO,
        }))
        .collect();

    // Stable: same-day entries keep sales before handovers.
    entries.sort_by_key(|e| e.date);

    let mut running = Decimal::ZERO;
    for entry in entries.iter_mut() {
        running += entry.debit - entry.credit;
        entry.balance = running;
    }
    entries.reverse();

    let collected: Decimal = cash_dsrs.iter().map(|d| d.selling_fare).sum();
    let handed_over: Decimal = own_handovers.iter().map(|h| h.amount).sum();
    let total_pending: Decimal = own_handovers
        .iter()
        .filter(|h| h.status == HandoverStatus::Pending)
        .map(|h| h.amount)
        .sum();

    CashLedger {
        agent_id: agent.id.clone(),
        cash_in_hand: collected - handed_over,
        total_pending,
        entries,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FareDiscrepancy {
    pub dsr_id: String,
    pub status: String,
    pub stored: DerivedFares,
    /// `None` when the stored inputs cannot be derived at all.
    pub derived: Option<DerivedFares>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

/// DSRs whose stored derived fares disagree with their inputs. Stored values
/// are reported as they are; nothing is rewritten.
pub fn fare_discrepancies(dsrs: &[Dsr]) -> Vec<FareDiscrepancy> {
    dsrs.iter()
        .filter_map(|dsr| {
            let stored = DerivedFares::of(dsr);
            match derive(FareInputs::of(dsr)) {
                Ok(derived) if derived == stored => None,
                Ok(derived) => Some(FareDiscrepancy {
                    dsr_id: dsr.id.clone(),
                    status: dsr.status.to_string(),
                    stored,
                    derived: Some(derived),
                    problem: None,
                }),
                Err(e) => Some(FareDiscrepancy {
                    dsr_id: dsr.id.clone(),
                    status: dsr.status.to_string(),
                    stored,
                    derived: None,
                    problem: Some(e.to_string()),
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn dsr(id: &str, date: &str, agent: &str, service: &str, selling: i64, method: &str) -> Dsr {
        serde_json::from_value(json!({
            "id": id,
            "date": date,
            "agentUsername": agent,
            "customerId": "CUST-1",
            "serviceType": service,
            "pnr": "PNR1",
            "baseFare": selling,
            "netFare": selling - 100,
            "sellingFare": selling,
            "commission": 100,
            "vatOnCommission": 15,
            "status": "approved",
            "paymentMethod": method
        }))
        .unwrap()
    }

    fn agent() -> User {
        User {
            id: "3".to_string(),
            username: "agent".to_string(),
            email: "agent@arwa.tech".to_string(),
            role: Role::Agent,
            branch: "Jeddah".to_string(),
            name: "Sales Agent".to_string(),
        }
    }

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn summary_respects_inclusive_range() {
        let dsrs = vec![
            dsr("A", "2024-07-20", "agent", "flight", 1000, "card"),
            dsr("B", "2024-07-21", "agent", "hotel", 500, "cash"),
            dsr("C", "2024-07-25", "agent", "visa", 300, "cash"),
        ];
        let range = DateRange {
            from: NaiveDate::from_ymd_opt(2024, 7, 20),
            to: NaiveDate::from_ymd_opt(2024, 7, 21),
        };

        let summary = sales_summary(&dsrs, range);
        assert_eq!(summary.dsr_count, 2);
        assert_eq!(summary.total_sales, d(1500));
        assert_eq!(summary.total_commission, d(200));
        assert_eq!(summary.total_vat, d(30));
        assert_eq!(summary.sales_by_service.len(), 4);
        assert_eq!(summary.sales_by_service[0].name, "Flight");
        assert_eq!(summary.sales_by_service[1].value, d(500));
        assert_eq!(summary.sales_by_service[2].value, d(0));
    }

    #[test]
    fn performance_is_sorted_by_sales() {
        let dsrs = vec![
            dsr("A", "2024-07-20", "agent", "flight", 1000, "card"),
            dsr("B", "2024-07-21", "manager", "hotel", 5000, "cash"),
            dsr("C", "2024-07-22", "agent", "visa", 300, "cash"),
        ];
        let rows = agent_performance(&dsrs, &[agent()], DateRange::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].agent_name, "manager");
        assert_eq!(rows[1].agent_name, "Sales Agent");
        assert_eq!(rows[1].total_sales, d(1300));
        assert_eq!(rows[1].dsr_count, 2);
    }

    #[test]
    fn commission_is_split_by_service() {
        let mut visa = dsr("C", "2024-07-22", "Agent", "visa", 300, "cash");
        visa.commission = d(40);
        let dsrs = vec![
            dsr("A", "2024-07-20", "agent", "flight", 1000, "card"),
            dsr("B", "2024-07-21", "manager", "hotel", 5000, "cash"),
            visa,
            dsr("D", "2024-08-01", "agent", "flight", 1000, "card"),
        ];
        let range = DateRange {
            from: NaiveDate::from_ymd_opt(2024, 7, 1),
            to: NaiveDate::from_ymd_opt(2024, 7, 31),
        };

        let rows = commission_report(&dsrs, &[agent()], range);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].agent_name, "Sales Agent");
        assert_eq!(rows[0].flight, d(100));
        assert_eq!(rows[0].visa, d(40));
        assert_eq!(rows[0].hotel, d(0));
        assert_eq!(rows[0].total, d(140));
        assert_eq!(rows[1].agent_name, "manager");
        assert_eq!(rows[1].hotel, d(100));
    }

    #[test]
    fn supplier_bills_group_by_supplier_and_skip_void() {
        let bill = |id: &str, supplier: &str, date: &str, total: i64, status: &str| {
            serde_json::from_value::<SupplierBill>(json!({
                "id": id,
                "billNo": id,
                "supplierId": supplier,
                "date": date,
                "total": total,
                "status": status
            }))
            .unwrap()
        };
        let bills = vec![
            bill("B1", "SUP-1", "2024-07-20", 2100, "unpaid"),
            bill("B2", "SUP-1", "2024-07-21", 4200, "paid"),
            bill("B3", "SUP-1", "2024-07-21", 9999, "void"),
            bill("B4", "SUP-9", "2024-07-22", 500, "unpaid"),
            bill("B5", "SUP-1", "2024-06-30", 700, "paid"),
        ];
        let suppliers = vec![Supplier {
            id: "SUP-1".to_string(),
            name: "Saudia".to_string(),
            supplier_type: crate::models::SupplierType::Airline,
        }];
        let range = DateRange {
            from: NaiveDate::from_ymd_opt(2024, 7, 1),
            to: None,
        };

        let rows = supplier_bills_report(&bills, &suppliers, range);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].supplier_name, "Saudia");
        assert_eq!(rows[0].total_billed, d(6300));
        assert_eq!(rows[0].total_paid, d(4200));
        assert_eq!(rows[0].total_unpaid, d(2100));
        assert_eq!(rows[0].bill_count, 2);
        assert_eq!(rows[1].supplier_name, "Unknown Supplier");
        assert_eq!(rows[1].total_unpaid, d(500));
    }

    #[test]
    fn cash_ledger_runs_balance_and_lists_newest_first() {
        let dsrs = vec![
            dsr("A", "2024-07-20", "agent", "flight", 1000, "cash"),
            dsr("B", "2024-07-21", "agent", "hotel", 500, "card"),
            dsr("C", "2024-07-23", "agent", "visa", 300, "cash"),
            dsr("D", "2024-07-23", "manager", "visa", 999, "cash"),
        ];
        let handovers: Vec<CashHandover> = vec![
            CashHandover {
                id: "CH-1".to_string(),
                agent_id: "3".to_string(),
                agent_name: "Sales Agent".to_string(),
                manager_id: Some("2".to_string()),
                manager_name: Some("Sales Manager".to_string()),
                amount: d(600),
                date_initiated: Utc.with_ymd_and_hms(2024, 7, 22, 10, 0, 0).unwrap(),
                date_confirmed: None,
                status: HandoverStatus::Confirmed,
            },
            CashHandover {
                id: "CH-2".to_string(),
                agent_id: "3".to_string(),
                agent_name: "Sales Agent".to_string(),
                manager_id: None,
                manager_name: None,
                amount: d(200),
                date_initiated: Utc.with_ymd_and_hms(2024, 7, 24, 10, 0, 0).unwrap(),
                date_confirmed: None,
                status: HandoverStatus::Pending,
            },
        ];

        let ledger = agent_cash_ledger(&agent(), &dsrs, &handovers);
        assert_eq!(ledger.entries.len(), 4);
        assert_eq!(ledger.cash_in_hand, d(500));
        assert_eq!(ledger.total_pending, d(200));
        assert_eq!(ledger.entries[0].description, "Handover ID: CH-2 (pending)");
        assert_eq!(ledger.entries[0].balance, d(500));
        assert_eq!(ledger.entries[3].balance, d(1000));
        assert_eq!(ledger.entries[2].balance, d(400));
    }

    #[test]
    fn discrepancies_report_stored_values() {
        let mut seeded = dsr("DSR-1", "2024-07-20", "agent", "flight", 2300, "card");
        seeded.base_fare = d(1800);
        seeded.taxes = d(400);
        seeded.net_fare = d(2100);
        seeded.commission = d(200);
        seeded.vat_on_commission = d(30);

        let mut consistent = dsr("DSR-5", "2024-07-20", "agent", "flight", 1000, "card");
        consistent.vat_on_commission = d(15);

        let found = fare_discrepancies(&[seeded, consistent]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dsr_id, "DSR-1");
        assert_eq!(found[0].stored.selling_fare, d(2300));
        let derived = found[0].derived.unwrap();
        assert_eq!(derived.selling_fare, d(2200));
        assert_eq!(derived.commission, d(100));
        assert_eq!(derived.vat_on_commission, d(15));
    }
}

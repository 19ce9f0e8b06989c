//! Invoice calculation
//!
//! Pure and stateless: the calculator never inspects the work order's status
//! and performs no I/O. Callers enforce lifecycle preconditions.
//!
//! Order of operations:
//!
//! 1. labor: total hours times the effective hourly rate, one line
//! 2. flat fee: the work order budget when no time was logged
//! 3. materials: one line per usage
//! 4. discount on the subtotal, from the contract
//! 5. tax on the discounted subtotal
//!
//! Rounding happens only at line totals and at the final total. Discount and
//! tax are reported rounded, but the total is computed from their exact
//! values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{Currency, Money, Percentage};
use domain_workorder::WorkOrder;

use crate::config::BillingConfig;
use crate::contract::Contract;
use crate::error::BillingError;
use crate::invoice::{InvoiceLineItem, LineItemKind};
use crate::rate::{RateResolver, ResolvedRate};

/// Monetary breakdown of a prospective invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCalculation {
    pub currency: Currency,
    pub line_items: Vec<InvoiceLineItem>,
    pub labor_subtotal: Money,
    pub materials_subtotal: Money,
    /// Labor plus materials
    pub subtotal: Money,
    pub discount_amount: Money,
    /// Subtotal less discount
    pub taxable_amount: Money,
    pub tax_rate: Percentage,
    pub tax_amount: Money,
    pub total_amount: Money,
    /// Rate used for the labor line; `None` for flat-fee or materials-only work
    pub rate: Option<ResolvedRate>,
}

/// Computes invoice amounts from a work order and its contract
#[derive(Debug, Clone)]
pub struct InvoiceCalculator {
    config: BillingConfig,
}

impl InvoiceCalculator {
    pub fn new(config: BillingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Calculates line items and totals
    ///
    /// # Errors
    ///
    /// - `MissingData` when there is no time, no material and no budget
    /// - `InvalidAmount` for non-positive hours or quantities, or a negative budget
    /// - `Calculation` when a rate, price or budget is in another currency, or
    ///   when an amount overflows the decimal range
    pub fn calculate(
        &self,
        work_order: &WorkOrder,
        contract: Option<&Contract>,
    ) -> Result<InvoiceCalculation, BillingError> {
        let currency = self.config.currency;
        let mut line_items = Vec::with_capacity(work_order.materials.len() + 1);

        let (labor_line, rate) = self.labor_line(work_order, contract)?;
        if let Some(line) = labor_line {
            line_items.push(line);
        }
        let labor_subtotal = Money::sum(currency, line_items.iter().map(|l| &l.line_total))?;

        let material_lines = self.material_lines(work_order)?;
        let materials_subtotal =
            Money::sum(currency, material_lines.iter().map(|l| &l.line_total))?;
        line_items.extend(material_lines);

        if line_items.is_empty() {
            return Err(BillingError::MissingData(format!(
                "work order {} has no time entries, materials or budget",
                work_order.id
            )));
        }

        let subtotal = labor_subtotal.checked_add(&materials_subtotal)?;
        let discount_rate = contract.map(|c| c.discount).unwrap_or_else(Percentage::zero);
        let tax_rate = self.config.tax_rate;

        let discount = discount_rate.apply(subtotal.amount())?;
        let taxable = subtotal.checked_sub(&Money::new(discount, currency))?;
        let tax = tax_rate.apply(taxable.amount())?;
        let total = taxable
            .checked_add(&Money::new(tax, currency))?
            .round_to_currency();

        debug!(
            work_order_id = %work_order.id,
            %labor_subtotal,
            %materials_subtotal,
            discount = %discount,
            tax = %tax,
            total = %total,
            "invoice calculated"
        );

        Ok(InvoiceCalculation {
            currency,
            line_items,
            labor_subtotal,
            materials_subtotal,
            subtotal,
            discount_amount: Money::new(discount, currency).round_to_currency(),
            taxable_amount: taxable.round_to_currency(),
            tax_rate,
            tax_amount: Money::new(tax, currency).round_to_currency(),
            total_amount: total,
            rate,
        })
    }

    fn labor_line(
        &self,
        work_order: &WorkOrder,
        contract: Option<&Contract>,
    ) -> Result<(Option<InvoiceLineItem>, Option<ResolvedRate>), BillingError> {
        if let Some(entry) = work_order.time_entries.iter().find(|e| e.hours <= Decimal::ZERO) {
            return Err(BillingError::InvalidAmount(format!(
                "time entry {} has non-positive hours {}",
                entry.id, entry.hours
            )));
        }

        let hours = work_order.total_hours();
        if hours > Decimal::ZERO {
            let rate = RateResolver::new(&self.config).resolve(work_order, contract);
            let effective = self.ensure_currency(rate.effective_rate()?)?;
            let line = InvoiceLineItem::new(
                LineItemKind::Labor,
                format!(
                    "Labor: {} hours at {}/hour",
                    hours.normalize(),
                    effective.round_to_currency()
                ),
                hours,
                effective,
            )?;
            return Ok((Some(line), Some(rate)));
        }

        match work_order.budget {
            Some(budget) if budget.is_negative() => Err(BillingError::InvalidAmount(format!(
                "work order budget cannot be negative, got {}",
                budget
            ))),
            Some(budget) if !budget.is_zero() => {
                let budget = self.ensure_currency(budget)?;
                let line = InvoiceLineItem::new(
                    LineItemKind::FlatFee,
                    format!("Flat fee: {}", work_order.title),
                    Decimal::ONE,
                    budget,
                )?;
                Ok((Some(line), None))
            }
            _ => Ok((None, None)),
        }
    }

    fn material_lines(&self, work_order: &WorkOrder) -> Result<Vec<InvoiceLineItem>, BillingError> {
        work_order
            .materials
            .iter()
            .map(|usage| {
                if usage.quantity <= Decimal::ZERO {
                    return Err(BillingError::InvalidAmount(format!(
                        "material {} has non-positive quantity {}",
                        usage.product_name, usage.quantity
                    )));
                }
                let unit_price = self.ensure_currency(usage.unit_price())?;
                Ok(InvoiceLineItem::new(
                    LineItemKind::Material,
                    usage.product_name.clone(),
                    usage.quantity,
                    unit_price,
                )?)
            })
            .collect()
    }

    fn ensure_currency(&self, amount: Money) -> Result<Money, BillingError> {
        if amount.currency() != self.config.currency {
            return Err(BillingError::Calculation(format!(
                "amount {} is not in invoice currency {}",
                amount, self.config.currency
            )));
        }
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{ClientId, ProductId, TechnicianId};
    use domain_workorder::{MaterialUsage, Priority, ServiceCategory, TimeEntry};
    use rust_decimal_macros::dec;

    use crate::contract::ContractRate;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn work_order() -> WorkOrder {
        WorkOrder::new(
            ClientId::new(),
            ServiceCategory::new("plumbing"),
            "Replace water heater",
            Priority::Normal,
        )
    }

    fn log(wo: &mut WorkOrder, hours: Decimal) {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        wo.log_time(TimeEntry::new(TechnicianId::new(), hours, date).unwrap())
            .unwrap();
    }

    fn material(wo: &mut WorkOrder, name: &str, qty: Decimal, price: Decimal) {
        wo.add_material(MaterialUsage::new(ProductId::new(), name, usd(price), qty).unwrap())
            .unwrap();
    }

    #[test]
    fn test_labor_materials_discount_and_tax() {
        let mut wo = work_order();
        log(&mut wo, dec!(2));
        log(&mut wo, dec!(1.5));
        material(&mut wo, "Valve", dec!(2), dec!(25.00));

        let contract = Contract::new(wo.client_id, "Standard")
            .with_discount_percent(dec!(10))
            .with_rate(ContractRate::new(ServiceCategory::new("plumbing"), usd(dec!(50.00))));

        let calc = InvoiceCalculator::new(BillingConfig::default())
            .calculate(&wo, Some(&contract))
            .unwrap();

        assert_eq!(calc.labor_subtotal.amount(), dec!(175.00));
        assert_eq!(calc.materials_subtotal.amount(), dec!(50.00));
        assert_eq!(calc.subtotal.amount(), dec!(225.00));
        assert_eq!(calc.discount_amount.amount(), dec!(22.50));
        assert_eq!(calc.taxable_amount.amount(), dec!(202.50));
        assert_eq!(calc.tax_amount.amount(), dec!(36.45));
        assert_eq!(calc.total_amount.amount(), dec!(238.95));
        assert_eq!(calc.line_items.len(), 2);
        assert_eq!(calc.line_items[0].kind, LineItemKind::Labor);
    }

    #[test]
    fn test_flat_fee_without_contract() {
        let wo = work_order().with_budget(usd(dec!(300.00)));

        let calc = InvoiceCalculator::new(BillingConfig::default())
            .calculate(&wo, None)
            .unwrap();

        assert_eq!(calc.line_items.len(), 1);
        assert_eq!(calc.line_items[0].kind, LineItemKind::FlatFee);
        assert!(calc.discount_amount.is_zero());
        assert_eq!(calc.tax_amount.amount(), dec!(54.00));
        assert_eq!(calc.total_amount.amount(), dec!(354.00));
        assert!(calc.rate.is_none());
    }

    #[test]
    fn test_budget_ignored_when_time_logged() {
        let mut wo = work_order().with_budget(usd(dec!(300.00)));
        log(&mut wo, dec!(1));

        let calc = InvoiceCalculator::new(BillingConfig::default())
            .calculate(&wo, None)
            .unwrap();

        assert_eq!(calc.line_items.len(), 1);
        assert_eq!(calc.line_items[0].kind, LineItemKind::Labor);
        assert_eq!(calc.labor_subtotal.amount(), dec!(75.00));
    }

    #[test]
    fn test_nothing_billable() {
        let result = InvoiceCalculator::new(BillingConfig::default()).calculate(&work_order(), None);
        assert!(matches!(result, Err(BillingError::MissingData(_))));

        let zero_budget = work_order().with_budget(usd(Decimal::ZERO));
        let result = InvoiceCalculator::new(BillingConfig::default()).calculate(&zero_budget, None);
        assert!(matches!(result, Err(BillingError::MissingData(_))));
    }

    #[test]
    fn test_total_uses_exact_discount_and_tax() {
        let mut wo = work_order();
        log(&mut wo, dec!(0.25));

        let contract = Contract::new(wo.client_id, "Small jobs")
            .with_discount_percent(dec!(10))
            .with_rate(ContractRate::new(ServiceCategory::new("plumbing"), usd(dec!(1.00))));

        let calc = InvoiceCalculator::new(BillingConfig::default())
            .calculate(&wo, Some(&contract))
            .unwrap();

        // discount 0.025, taxable 0.225, tax 0.0405, total 0.2655
        assert_eq!(calc.discount_amount.amount(), dec!(0.03));
        assert_eq!(calc.tax_amount.amount(), dec!(0.04));
        assert_eq!(calc.total_amount.amount(), dec!(0.27));
    }

    #[test]
    fn test_currency_mismatch() {
        let mut wo = work_order();
        wo.add_material(
            MaterialUsage::new(ProductId::new(), "Pump", Money::new(dec!(10), Currency::EUR), dec!(1))
                .unwrap(),
        )
        .unwrap();

        let result = InvoiceCalculator::new(BillingConfig::default()).calculate(&wo, None);
        assert!(matches!(result, Err(BillingError::Calculation(_))));
    }

    #[test]
    fn test_overflowing_line_is_a_calculation_error() {
        let mut wo = work_order();
        let huge = Decimal::from(1_000_000_000_000_000i64);
        material(&mut wo, "Bulk cable", huge, huge);

        let result = InvoiceCalculator::new(BillingConfig::default()).calculate(&wo, None);
        assert!(matches!(result, Err(BillingError::Calculation(_))));
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let mut wo = work_order();
        material(&mut wo, "Sealant", dec!(1), dec!(8));
        wo.materials[0].quantity = Decimal::ZERO;

        let result = InvoiceCalculator::new(BillingConfig::default()).calculate(&wo, None);
        assert!(matches!(result, Err(BillingError::InvalidAmount(_))));
    }
}

//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::money::MoneyError;
use core_kernel::temporal::TemporalError;
use core_kernel::PortError;

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_from_money_error() {
    let money_error = MoneyError::CurrencyMismatch("USD".to_string(), "EUR".to_string());
    let core_error: CoreError = money_error.into();

    assert!(matches!(core_error, CoreError::Money(_)));
}

#[test]
fn test_core_error_from_temporal_error() {
    let core_error: CoreError = TemporalError::InvalidPeriod("2024-13".to_string()).into();

    assert!(matches!(core_error, CoreError::Temporal(_)));
    assert!(core_error.to_string().contains("2024-13"));
}

#[test]
fn test_core_error_configuration() {
    let error = CoreError::configuration("tax rate must not be negative");

    assert!(error.to_string().starts_with("Configuration error"));
}

#[test]
fn test_port_error_display_names_constraint() {
    let error = PortError::unique_violation("invoices_invoice_number_key", "INV-202401-0001");

    let display = error.to_string();
    assert!(display.contains("invoices_invoice_number_key"));
    assert!(display.contains("INV-202401-0001"));
}

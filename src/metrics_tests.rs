// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for metrics recording and gathering.

use std::time::Duration;

use super::*;

#[test]
fn test_recording_and_gathering_metrics() {
    record_reconciliation("success", Duration::from_millis(42));
    record_reconciliation("error", Duration::from_millis(7));
    record_dns_operation("create");
    record_dns_operation("delete");
    record_connector_sync("success");

    let text = gather_metrics().unwrap();

    assert!(text.contains("ctic_strrl_dev_reconciliations_total"));
    assert!(text.contains("ctic_strrl_dev_reconciliation_duration_seconds"));
    assert!(text.contains("ctic_strrl_dev_dns_operations_total"));
    assert!(text.contains("ctic_strrl_dev_connector_syncs_total"));
}

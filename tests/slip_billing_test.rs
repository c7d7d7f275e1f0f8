// ==========================================
// 发货单与对账端到端测试
// ==========================================
// 职责: 验证按供应商出单、重复生成幂等、值班门控与对账推进
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod slip_billing_test {
    use chrono::NaiveDate;
    use procurement_lifecycle::api::ApiError;
    use procurement_lifecycle::app::AppState;
    use procurement_lifecycle::config::config_keys;
    use procurement_lifecycle::domain::allocation::RepItemEdit;
    use procurement_lifecycle::domain::order::AllocationEdit;
    use procurement_lifecycle::domain::slip::{BillingUpdate, DocumentLine};
    use procurement_lifecycle::domain::types::{
        Actor, AllocationRecordStatus, OrderStage, Role, SlipLineStatus,
    };
    use procurement_lifecycle::repository::DutySessionRepository;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{
        allocator, count_rows, create_test_db, install_abort_trigger, order_row, staff, supervisor,
    };

    fn slip_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    /// 导入 → 手套提交 Acme，口罩仅决定供应商 Beta
    fn setup() -> (NamedTempFile, AppState) {
        let (tmp, db_path) = create_test_db().unwrap();
        let state = AppState::new(db_path).unwrap();

        state
            .import_api
            .ingest(
                vec![
                    order_row(1, "101", "55", 3.0, Some("Acme")),
                    order_row(2, "102", "55", 7.0, None),
                    order_row(3, "102", "56", 4.0, None),
                ],
                "alice",
            )
            .unwrap();

        let ledger = state.allocation_api.list_ledger().unwrap();
        let gloves = ledger.iter().find(|e| e.product_id == "P55").unwrap();
        let masks = ledger.iter().find(|e| e.product_id == "P56").unwrap();

        state
            .allocation_api
            .commit_to_supplier(&gloves.entry_id, "Acme", 1.0, &allocator())
            .unwrap();
        state
            .allocation_api
            .update_allocation(
                &masks.entry_id,
                &AllocationEdit {
                    ordered_qty: Some(4.0),
                    decided_supplier: Some("Beta".to_string()),
                    ..Default::default()
                },
                &allocator(),
            )
            .unwrap();

        (tmp, state)
    }

    fn first_line(state: &AppState, supplier: &str) -> DocumentLine {
        let docs = state.slip_api.list_documents(Some(supplier)).unwrap();
        let doc = state.slip_api.get_document(&docs[0].document_id).unwrap();
        doc.lines.into_iter().next().unwrap()
    }

    #[test]
    fn test_generate_one_document_per_supplier() {
        let (_tmp, state) = setup();

        let candidates = state.slip_api.list_candidates().unwrap();
        assert_eq!(candidates.len(), 2);

        let outcome = state
            .slip_api
            .generate_documents_on("alice", slip_date())
            .unwrap();
        assert_eq!(outcome.generated, 2);

        let suppliers: Vec<&str> = outcome.suppliers.iter().map(|s| s.supplier.as_str()).collect();
        assert_eq!(suppliers, vec!["Acme", "Beta"]);
        assert_eq!(outcome.suppliers[0].slip_no, "SLP-20261016-0001");
        assert_eq!(outcome.suppliers[1].slip_no, "SLP-20261016-0002");
        assert_eq!(outcome.suppliers[0].total_qty, 10.0);
        assert_eq!(outcome.suppliers[1].total_qty, 4.0);

        // 来源需求全部推进到 SLIP_GENERATED 并永久锁定
        for entry in state.allocation_api.list_ledger().unwrap() {
            assert_eq!(entry.stage, OrderStage::SlipGenerated);
            assert!(entry.locked);
            for line in state.allocation_api.entry_lines(&entry.entry_id).unwrap() {
                assert_eq!(line.stage, OrderStage::SlipGenerated);
            }
        }

        // 已提交的代表单变为已下单
        let groups = state
            .rep_api
            .list_allocations(&Default::default())
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].allocations[0].allocation.status, AllocationRecordStatus::Ordered);
    }

    #[test]
    fn test_cancelled_allocation_is_not_slipped() {
        let (_tmp, state) = setup();
        let groups = state.rep_api.list_allocations(&Default::default()).unwrap();
        let gloves = &groups[0].allocations[0].allocation;

        // 数量编辑会同步到台账 ordered_qty，取消后也不能借此出单
        state
            .rep_api
            .update_rep_item(
                &gloves.allocation_id,
                &RepItemEdit {
                    status: Some(AllocationRecordStatus::Cancelled),
                    quantity: Some(10.0),
                    notes: None,
                },
                &allocator(),
            )
            .unwrap();

        let candidates = state.slip_api.list_candidates().unwrap();
        assert!(candidates.iter().all(|c| c.ledger_entry_id != gloves.ledger_entry_id));

        let outcome = state.slip_api.generate_documents_on("alice", slip_date()).unwrap();
        assert_eq!(outcome.generated, 1);
        assert_eq!(outcome.suppliers[0].supplier, "Beta");
        assert!(state.slip_api.list_documents(Some("Acme")).unwrap().is_empty());

        let entry = state.allocation_api.get_entry(&gloves.ledger_entry_id).unwrap();
        assert_eq!(entry.stage, OrderStage::RepAllocation);
    }

    #[test]
    fn test_failed_generation_leaves_no_documents() {
        let (_tmp, state) = setup();
        install_abort_trigger(
            &state.db_path,
            "trg_fail_second_line",
            "document_line",
            "(SELECT COUNT(*) FROM document_line) >= 1",
        )
        .unwrap();

        assert!(state.slip_api.generate_documents_on("alice", slip_date()).is_err());

        assert_eq!(count_rows(&state.db_path, "fulfillment_document").unwrap(), 0);
        assert_eq!(count_rows(&state.db_path, "document_line").unwrap(), 0);
        for entry in state.allocation_api.list_ledger().unwrap() {
            assert_ne!(entry.stage, OrderStage::SlipGenerated);
        }
        let groups = state.rep_api.list_allocations(&Default::default()).unwrap();
        assert_eq!(groups[0].allocations[0].allocation.status, AllocationRecordStatus::Pending);
    }

    #[test]
    fn test_second_generation_is_noop() {
        let (_tmp, state) = setup();

        let first = state.slip_api.generate_documents_on("alice", slip_date()).unwrap();
        assert_eq!(first.generated, 2);

        let second = state.slip_api.generate_documents_on("alice", slip_date()).unwrap();
        assert_eq!(second.generated, 0);
        assert!(second.suppliers.is_empty());
        assert!(second.message.is_some());

        assert_eq!(state.slip_api.list_documents(None).unwrap().len(), 2);
    }

    #[test]
    fn test_consumed_allocation_cannot_roll_back() {
        let (_tmp, state) = setup();
        state.slip_api.generate_documents_on("alice", slip_date()).unwrap();

        let groups = state.rep_api.list_allocations(&Default::default()).unwrap();
        let allocation_id = groups[0].allocations[0].allocation.allocation_id.clone();

        let err = state
            .allocation_api
            .rollback(&allocation_id, &allocator())
            .unwrap_err();
        assert!(matches!(err, ApiError::AlreadyConsumed(_)));
    }

    #[test]
    fn test_staff_needs_duty_session_to_bill() {
        let (_tmp, state) = setup();
        state.slip_api.generate_documents_on("alice", slip_date()).unwrap();
        let line = first_line(&state, "Acme");

        let update = BillingUpdate {
            status: SlipLineStatus::Billed,
            received_qty: Some(10.0),
            billed_qty: Some(10.0),
            invoice_id: Some("INV-7".to_string()),
            notes: None,
        };

        let bob = staff("bob");
        let err = state
            .billing_api
            .update_billing_status(&line.line_id, &update, &bob)
            .unwrap_err();
        assert!(matches!(err, ApiError::DutySessionRequired { ref user_id } if user_id == "bob"));

        // 拒绝后行状态不变
        assert_eq!(first_line(&state, "Acme").status, SlipLineStatus::Pending);

        state.billing_api.start_duty("bob").unwrap();
        let billed = state
            .billing_api
            .update_billing_status(&line.line_id, &update, &bob)
            .unwrap();
        assert_eq!(billed.status, SlipLineStatus::Billed);
        assert_eq!(billed.invoice_id.as_deref(), Some("INV-7"));

        let entry = state.allocation_api.get_entry(&line.ledger_entry_id).unwrap();
        assert_eq!(entry.stage, OrderStage::Executed);
    }

    #[test]
    fn test_duty_gate_ignores_surrounding_whitespace_in_user_id() {
        let (_tmp, state) = setup();
        state.slip_api.generate_documents_on("alice", slip_date()).unwrap();
        let line = first_line(&state, "Beta");

        state.billing_api.start_duty(" bob ").unwrap();
        let updated = state
            .billing_api
            .update_billing_status(
                &line.line_id,
                &BillingUpdate::status(SlipLineStatus::NotBilled),
                &staff("bob  "),
            )
            .unwrap();
        assert_eq!(updated.status, SlipLineStatus::NotBilled);
    }

    #[test]
    fn test_supervisor_bypasses_duty_and_viewer_is_denied() {
        let (_tmp, state) = setup();
        state.slip_api.generate_documents_on("alice", slip_date()).unwrap();
        let line = first_line(&state, "Beta");

        let viewer = Actor::new("vic", Role::Viewer);
        let err = state
            .billing_api
            .update_billing_status(
                &line.line_id,
                &BillingUpdate::status(SlipLineStatus::NotBilled),
                &viewer,
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::PermissionDenied(_)));

        let updated = state
            .billing_api
            .update_billing_status(
                &line.line_id,
                &BillingUpdate::status(SlipLineStatus::SupplierItemMissing),
                &supervisor(),
            )
            .unwrap();
        assert_eq!(updated.status, SlipLineStatus::SupplierItemMissing);

        let err = state
            .billing_api
            .update_billing_status(
                &line.line_id,
                &BillingUpdate::status(SlipLineStatus::Pending),
                &supervisor(),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_billed_requires_received_qty_when_enforced() {
        let (_tmp, state) = setup();
        state
            .config_manager
            .set_global_config_value(config_keys::BILLING_ENFORCE_BILLED_RECEIVED_QTY, "true")
            .unwrap();
        state.slip_api.generate_documents_on("alice", slip_date()).unwrap();
        let line = first_line(&state, "Acme");

        let err = state
            .billing_api
            .update_billing_status(
                &line.line_id,
                &BillingUpdate::status(SlipLineStatus::Billed),
                &supervisor(),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        let ok = state.billing_api.update_billing_status(
            &line.line_id,
            &BillingUpdate {
                received_qty: Some(9.0),
                ..BillingUpdate::status(SlipLineStatus::Billed)
            },
            &supervisor(),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_start_duty_keeps_single_active_session() {
        let (_tmp, state) = setup();

        let first = state.billing_api.start_duty("bob").unwrap();
        let second = state.billing_api.start_duty("bob").unwrap();
        assert_ne!(first.session_id, second.session_id);

        let conn = procurement_lifecycle::db::open_and_init(&state.db_path).unwrap();
        assert_eq!(DutySessionRepository::count_active(&conn, "bob").unwrap(), 1);

        let sessions = DutySessionRepository::list_by_user(&conn, "bob").unwrap();
        let closed = sessions
            .iter()
            .find(|s| s.session_id == first.session_id)
            .unwrap();
        assert!(!closed.active);
        assert!(closed.ended_at.is_some());

        let active = state.billing_api.active_session("bob").unwrap().unwrap();
        assert_eq!(active.session_id, second.session_id);

        let ended = state.billing_api.end_duty("bob").unwrap();
        assert!(ended.is_some());
        assert!(state.billing_api.active_session("bob").unwrap().is_none());
        assert!(state.billing_api.end_duty("bob").unwrap().is_none());
    }
}

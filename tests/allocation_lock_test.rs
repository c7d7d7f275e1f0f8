// ==========================================
// 分配锁定集成测试
// ==========================================
// 职责: 验证锁定后不可编辑、并发提交恰好一次、回滚与代表分组
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod allocation_lock_test {
    use procurement_lifecycle::api::{AllocationApi, ApiError, AuditApi, ImportApi, RepApi};
    use procurement_lifecycle::domain::allocation::{AllocationFilter, RepItemEdit};
    use procurement_lifecycle::domain::audit::ActionType;
    use procurement_lifecycle::domain::order::{AllocationEdit, LedgerEntry};
    use procurement_lifecycle::domain::types::{
        AllocationRecordStatus, AllocationStatus, EntityKind, OrderStage,
    };
    use procurement_lifecycle::engine::EntityLockManager;
    use std::sync::Arc;
    use std::thread;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{allocator, create_test_db, default_config, order_row};

    struct Env {
        _tmp: NamedTempFile,
        db_path: String,
        allocation_api: Arc<AllocationApi>,
        rep_api: RepApi,
    }

    /// 导入两个产品并返回测试环境
    fn setup() -> Env {
        let (tmp, db_path) = create_test_db().unwrap();
        ImportApi::new(db_path.clone(), default_config())
            .ingest(
                vec![
                    order_row(1, "101", "55", 3.0, Some("Acme")),
                    order_row(2, "102", "55", 7.0, None),
                    order_row(3, "102", "56", 4.0, Some("Beta")),
                ],
                "alice",
            )
            .unwrap();

        Env {
            allocation_api: Arc::new(AllocationApi::new(
                db_path.clone(),
                default_config(),
                Arc::new(EntityLockManager::new()),
            )),
            rep_api: RepApi::new(db_path.clone()),
            _tmp: tmp,
            db_path,
        }
    }

    fn entry_for(api: &AllocationApi, product_id: &str) -> LedgerEntry {
        api.list_ledger()
            .unwrap()
            .into_iter()
            .find(|e| e.product_id == product_id)
            .unwrap()
    }

    #[test]
    fn test_update_allocation_bumps_version() {
        let env = setup();
        let entry = entry_for(&env.allocation_api, "P55");

        let edit = AllocationEdit {
            ordered_qty: Some(8.0),
            stock_qty: Some(2.0),
            decided_supplier: Some("Acme".to_string()),
            ..Default::default()
        };
        let updated = env
            .allocation_api
            .update_allocation(&entry.entry_id, &edit, &allocator())
            .unwrap();

        assert_eq!(updated.ordered_qty, 8.0);
        assert_eq!(updated.stock_qty, 2.0);
        assert_eq!(updated.decided_supplier.as_deref(), Some("Acme"));
        assert_ne!(updated.updated_at, entry.updated_at);
        assert!(!updated.locked);
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let env = setup();
        let entry = entry_for(&env.allocation_api, "P55");

        let edit = AllocationEdit {
            ordered_qty: Some(-1.0),
            ..Default::default()
        };
        let err = env
            .allocation_api
            .update_allocation(&entry.entry_id, &edit, &allocator())
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn test_locked_entry_rejects_edits() {
        let env = setup();
        let entry = entry_for(&env.allocation_api, "P55");

        let outcome = env
            .allocation_api
            .commit_to_supplier(&entry.entry_id, "Acme", 1.5, &allocator())
            .unwrap();
        assert_eq!(outcome.quantity, 10.0);

        let locked = env.allocation_api.get_entry(&entry.entry_id).unwrap();
        assert!(locked.locked);
        assert_eq!(locked.allocation_status, AllocationStatus::MovedToRep);
        assert_eq!(locked.stage, OrderStage::RepAllocation);

        let edit = AllocationEdit {
            ordered_qty: Some(1.0),
            ..Default::default()
        };
        let err = env
            .allocation_api
            .update_allocation(&entry.entry_id, &edit, &allocator())
            .unwrap_err();
        assert!(
            matches!(err, ApiError::LockConflict { ref id, .. } if id == &entry.entry_id),
            "unexpected error: {:?}",
            err
        );

        // 编辑被拒后台账保持原值
        let after = env.allocation_api.get_entry(&entry.entry_id).unwrap();
        assert_eq!(after.ordered_qty, locked.ordered_qty);
        assert_eq!(after.updated_at, locked.updated_at);
    }

    #[test]
    fn test_concurrent_commit_succeeds_exactly_once() {
        let env = setup();
        let entry = entry_for(&env.allocation_api, "P55");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let api = Arc::clone(&env.allocation_api);
                let entry_id = entry.entry_id.clone();
                thread::spawn(move || {
                    let supplier = if i % 2 == 0 { "Acme" } else { "Beta" };
                    api.commit_to_supplier(&entry_id, supplier, 1.0, &allocator())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        for result in results.iter().filter(|r| r.is_err()) {
            assert!(matches!(
                result,
                Err(ApiError::LockConflict { .. }) | Err(ApiError::AlreadyConsumed(_))
            ));
        }

        let groups = env.rep_api.list_allocations(&AllocationFilter::default()).unwrap();
        let gloves = groups.iter().find(|g| g.product_id == "P55").unwrap();
        assert_eq!(gloves.allocations.len(), 1);

        let audit = AuditApi::new(env.db_path.clone());
        assert_eq!(audit.count_by_action(ActionType::CommitToSupplier).unwrap(), 1);
    }

    #[test]
    fn test_rollback_unlocks_and_returns_lines_to_pending() {
        let env = setup();
        let entry = entry_for(&env.allocation_api, "P55");
        let outcome = env
            .allocation_api
            .commit_to_supplier(&entry.entry_id, "Acme", 1.0, &allocator())
            .unwrap();

        let lines = env.allocation_api.entry_lines(&entry.entry_id).unwrap();
        assert!(lines.iter().all(|l| l.stage == OrderStage::RepAllocation));

        let unlocked = env
            .allocation_api
            .rollback(&outcome.allocation_id, &allocator())
            .unwrap();
        assert!(!unlocked.locked);
        assert_eq!(unlocked.allocation_status, AllocationStatus::Pending);
        assert_eq!(unlocked.stage, OrderStage::Pending);

        // 源台账被重新聚合，订单行归入新台账
        assert_eq!(unlocked.product_id, "P55");
        assert_eq!(unlocked.quantity, 10.0);
        let lines = env.allocation_api.entry_lines(&unlocked.entry_id).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.stage == OrderStage::Pending));

        // 回滚后可以再次编辑
        let edit = AllocationEdit {
            ordered_qty: Some(6.0),
            ..Default::default()
        };
        assert!(env
            .allocation_api
            .update_allocation(&unlocked.entry_id, &edit, &allocator())
            .is_ok());

        let audit = AuditApi::new(env.db_path.clone());
        let history = audit
            .status_history(EntityKind::LedgerEntry, &entry.entry_id)
            .unwrap();
        let transitions: Vec<(&str, &str)> = history
            .iter()
            .map(|e| (e.old_status.as_str(), e.new_status.as_str()))
            .collect();
        assert!(transitions.contains(&("REP_ACTIVE", "PENDING")));
    }

    #[test]
    fn test_rollback_folds_into_single_open_entry() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let import_api = ImportApi::new(db_path.clone(), default_config());
        let allocation_api = AllocationApi::new(
            db_path.clone(),
            default_config(),
            Arc::new(EntityLockManager::new()),
        );

        import_api
            .ingest(vec![order_row(1, "101", "55", 3.0, None)], "alice")
            .unwrap();
        let first = entry_for(&allocation_api, "P55");
        let outcome = allocation_api
            .commit_to_supplier(&first.entry_id, "Acme", 1.0, &allocator())
            .unwrap();

        // 锁定期间新增需求形成第二条台账
        import_api
            .ingest(vec![order_row(1, "102", "55", 7.0, None)], "alice")
            .unwrap();
        let open_before: Vec<LedgerEntry> = allocation_api
            .list_ledger()
            .unwrap()
            .into_iter()
            .filter(|e| e.product_id == "P55" && !e.locked)
            .collect();
        assert_eq!(open_before.len(), 1);
        assert_eq!(open_before[0].quantity, 7.0);

        let folded = allocation_api
            .rollback(&outcome.allocation_id, &allocator())
            .unwrap();
        assert_eq!(folded.quantity, 10.0);

        let entries: Vec<LedgerEntry> = allocation_api
            .list_ledger()
            .unwrap()
            .into_iter()
            .filter(|e| e.product_id == "P55")
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_id, folded.entry_id);
        assert!(!entries[0].locked);
        assert_eq!(
            allocation_api.entry_lines(&folded.entry_id).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_rep_grouping_with_filters() {
        let env = setup();
        let gloves = entry_for(&env.allocation_api, "P55");
        let masks = entry_for(&env.allocation_api, "P56");

        env.allocation_api
            .commit_to_supplier(&gloves.entry_id, "Acme", 1.0, &allocator())
            .unwrap();
        let masks_outcome = env
            .allocation_api
            .commit_to_supplier(&masks.entry_id, "Beta", 2.0, &allocator())
            .unwrap();

        let all = env.rep_api.list_allocations(&AllocationFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        let gloves_group = all.iter().find(|g| g.product_id == "P55").unwrap();
        assert_eq!(gloves_group.allocated_qty, 10.0);
        assert_eq!(gloves_group.allocations[0].order_references, vec!["101", "102"]);

        let by_rep = env
            .rep_api
            .list_allocations(&AllocationFilter {
                rep: Some("beta".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_rep.len(), 1);
        assert_eq!(by_rep[0].product_id, "P56");

        let by_name = env
            .rep_api
            .list_allocations(&AllocationFilter {
                product_name: Some("nitrile".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].product_id, "P55");

        let by_order = env
            .rep_api
            .list_allocations(&AllocationFilter {
                order_reference: Some("101".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_order.len(), 1);
        assert_eq!(by_order[0].product_id, "P55");

        // 代表单编辑: 数量变更后分组合计实时反映
        env.rep_api
            .update_rep_item(
                &masks_outcome.allocation_id,
                &RepItemEdit {
                    status: Some(AllocationRecordStatus::Short),
                    quantity: Some(3.0),
                    notes: None,
                },
                &allocator(),
            )
            .unwrap();
        let short_only = env
            .rep_api
            .list_allocations(&AllocationFilter {
                status: Some(AllocationRecordStatus::Short),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(short_only.len(), 1);
        assert_eq!(short_only[0].allocated_qty, 3.0);
    }

    #[test]
    fn test_return_to_pending_from_rep_view() {
        let env = setup();
        let masks = entry_for(&env.allocation_api, "P56");
        let outcome = env
            .allocation_api
            .commit_to_supplier(&masks.entry_id, "Beta", 1.0, &allocator())
            .unwrap();

        let entry = env
            .rep_api
            .return_to_pending(&outcome.allocation_id, &allocator())
            .unwrap();
        assert!(!entry.locked);

        let groups = env.rep_api.list_allocations(&AllocationFilter::default()).unwrap();
        assert!(groups.is_empty());
    }
}

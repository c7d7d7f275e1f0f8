// ==========================================
// 离线冲突与审计集成测试
// ==========================================
// 职责: 验证版本检测、裁决原因门槛、审计留痕与追加写约束
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod conflict_audit_test {
    use procurement_lifecycle::api::ApiError;
    use procurement_lifecycle::app::AppState;
    use procurement_lifecycle::config::config_keys;
    use procurement_lifecycle::domain::audit::ActionType;
    use procurement_lifecycle::domain::conflict::{
        ConflictResolution, ConflictResolutionRequest, VersionCheck,
    };
    use procurement_lifecycle::domain::order::{AllocationEdit, LedgerEntry};
    use procurement_lifecycle::domain::types::EntityKind;
    use serde_json::json;
    use tempfile::NamedTempFile;

    use crate::test_helpers::{allocator, create_test_db, order_row, staff, supervisor};

    fn setup() -> (NamedTempFile, AppState, LedgerEntry) {
        let (tmp, db_path) = create_test_db().unwrap();
        let state = AppState::new(db_path).unwrap();
        state
            .import_api
            .ingest(vec![order_row(1, "100", "55", 5.0, None)], "alice")
            .unwrap();
        let entry = state.allocation_api.list_ledger().unwrap().remove(0);
        (tmp, state, entry)
    }

    fn request(entry: &LedgerEntry, reason: &str) -> ConflictResolutionRequest {
        ConflictResolutionRequest {
            entity_type: EntityKind::LedgerEntry,
            entity_id: entry.entry_id.clone(),
            local_version: json!({ "ordered_qty": 3.0, "updated_at": entry.updated_at }),
            server_version: json!({ "ordered_qty": 8.0 }),
            resolution: ConflictResolution::KeepServer,
            reason: reason.to_string(),
        }
    }

    #[test]
    fn test_detect_conflict_after_concurrent_edit() {
        let (_tmp, state, entry) = setup();

        let clean = state
            .conflict_api
            .detect_conflict(EntityKind::LedgerEntry, &entry.entry_id, &entry.updated_at)
            .unwrap();
        assert_eq!(clean, VersionCheck::Clean);

        let edited = state
            .allocation_api
            .update_allocation(
                &entry.entry_id,
                &AllocationEdit {
                    ordered_qty: Some(8.0),
                    ..Default::default()
                },
                &allocator(),
            )
            .unwrap();

        let check = state
            .conflict_api
            .detect_conflict(EntityKind::LedgerEntry, &entry.entry_id, &entry.updated_at)
            .unwrap();
        assert_eq!(
            check,
            VersionCheck::Mismatch {
                local_version: entry.updated_at.clone(),
                server_version: edited.updated_at,
            }
        );
    }

    #[test]
    fn test_short_reason_rejected_without_audit() {
        let (_tmp, state, entry) = setup();

        let err = state
            .conflict_api
            .resolve_conflict(&request(&entry, "bad"), &supervisor())
            .unwrap_err();
        assert!(matches!(err, ApiError::ReasonTooShort { min: 10, actual: 3 }));

        assert_eq!(
            state.audit_api.count_by_action(ActionType::ConflictResolve).unwrap(),
            0
        );
        assert!(state
            .conflict_api
            .list_conflicts(EntityKind::LedgerEntry, &entry.entry_id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_resolution_writes_exactly_one_audit_event() {
        let (_tmp, state, entry) = setup();

        let record = state
            .conflict_api
            .resolve_conflict(
                &request(&entry, "Server value confirmed with ward manager"),
                &supervisor(),
            )
            .unwrap();
        assert_eq!(record.resolution, ConflictResolution::KeepServer);
        assert_eq!(record.resolved_by, "sam");

        assert_eq!(
            state.audit_api.count_by_action(ActionType::ConflictResolve).unwrap(),
            1
        );
        let trail = state
            .audit_api
            .audit_trail(EntityKind::LedgerEntry, &entry.entry_id)
            .unwrap();
        let resolve_events: Vec<_> = trail
            .iter()
            .filter(|e| e.action_type() == Some(ActionType::ConflictResolve))
            .collect();
        assert_eq!(resolve_events.len(), 1);
        assert_eq!(resolve_events[0].actor, "sam");

        let records = state
            .conflict_api
            .list_conflicts(EntityKind::LedgerEntry, &entry.entry_id)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].conflict_id, record.conflict_id);
    }

    #[test]
    fn test_staff_cannot_resolve_conflicts() {
        let (_tmp, state, entry) = setup();

        let err = state
            .conflict_api
            .resolve_conflict(
                &request(&entry, "Keeping the server copy as agreed"),
                &staff("bob"),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::PermissionDenied(_)));
    }

    #[test]
    fn test_min_reason_length_follows_config() {
        let (_tmp, state, entry) = setup();
        state
            .config_manager
            .set_global_config_value(config_keys::CONFLICT_MIN_REASON_LENGTH, "3")
            .unwrap();

        assert!(state
            .conflict_api
            .resolve_conflict(&request(&entry, "ok!"), &supervisor())
            .is_ok());
    }

    #[test]
    fn test_audit_trail_covers_lifecycle() {
        let (_tmp, state, entry) = setup();

        state
            .allocation_api
            .commit_to_supplier(&entry.entry_id, "Acme", 1.0, &allocator())
            .unwrap();

        assert_eq!(state.audit_api.count_by_action(ActionType::Ingest).unwrap(), 1);
        assert_eq!(
            state.audit_api.count_by_action(ActionType::CommitToSupplier).unwrap(),
            1
        );

        let trail = state
            .audit_api
            .audit_trail(EntityKind::LedgerEntry, &entry.entry_id)
            .unwrap();
        assert!(trail
            .iter()
            .any(|e| e.action_type() == Some(ActionType::CommitToSupplier)));

        let recent = state.audit_api.recent(10).unwrap();
        assert!(!recent.is_empty());
        assert!(recent.len() <= 10);
    }

    #[test]
    fn test_audit_log_is_append_only() {
        let (_tmp, state, _entry) = setup();

        let conn = procurement_lifecycle::db::open_and_init(&state.db_path).unwrap();
        let updated = conn.execute("UPDATE audit_event SET actor = 'mallory'", []);
        assert!(updated.is_err());
        let deleted = conn.execute("DELETE FROM audit_event", []);
        assert!(deleted.is_err());
    }
}

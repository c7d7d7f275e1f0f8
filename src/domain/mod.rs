// ==========================================
// 采购订单全流程系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod allocation;
pub mod audit;
pub mod conflict;
pub mod duty;
pub mod order;
pub mod slip;
pub mod types;

// 重导出核心类型
pub use allocation::{
    AllocationFilter, AllocationRecord, AllocationView, CommitOutcome, ProductAllocationGroup,
    RepItemEdit,
};
pub use audit::{ActionType, AuditEvent, StatusEvent};
pub use conflict::{ConflictRecord, ConflictResolution, ConflictResolutionRequest, VersionCheck};
pub use duty::DutySession;
pub use order::{
    AllocationEdit, DuplicateRow, ImportBatch, IngestSummary, InputLine, LedgerEntry, PreviewLine,
    ProductIdentity, RawOrderRow, RowError, RowErrorKind,
};
pub use slip::{
    BillingUpdate, DocumentLine, DocumentWithLines, FulfillmentDocument, GenerationOutcome,
    SlipCandidate, SupplierSlipSummary,
};
pub use types::{
    Actor, AllocationRecordStatus, AllocationStatus, EntityKind, OrderStage, Role, SlipLineStatus,
};

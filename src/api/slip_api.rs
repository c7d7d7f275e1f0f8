// ==========================================
// 采购订单全流程系统 - 发货单 API
// ==========================================
// 红线: 生成过程全有或全无（单一写事务）
// ==========================================

use crate::api::connection::{with_read_conn, with_write_tx};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::slip::{DocumentWithLines, FulfillmentDocument, GenerationOutcome, SlipCandidate};
use crate::engine::SlipGenerator;
use crate::repository::SlipRepository;
use chrono::{NaiveDate, Utc};

pub struct SlipApi {
    db_path: String,
    generator: SlipGenerator,
}

impl SlipApi {
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            generator: SlipGenerator::new(),
        }
    }

    /// 按当天日期生成发货单
    pub fn generate_documents(&self, actor: &str) -> ApiResult<GenerationOutcome> {
        self.generate_documents_on(actor, Utc::now().date_naive())
    }

    pub fn generate_documents_on(&self, actor: &str, slip_date: NaiveDate) -> ApiResult<GenerationOutcome> {
        with_write_tx(&self.db_path, |tx| {
            Ok(self.generator.generate(tx, actor, slip_date)?)
        })
    }

    /// 当前候选项预览（不写入）
    pub fn list_candidates(&self) -> ApiResult<Vec<SlipCandidate>> {
        with_read_conn(&self.db_path, |conn| Ok(self.generator.candidates(conn)?))
    }

    pub fn get_document(&self, document_id: &str) -> ApiResult<DocumentWithLines> {
        with_read_conn(&self.db_path, |conn| {
            SlipRepository::find_document_with_lines(conn, document_id)?
                .ok_or_else(|| ApiError::NotFound(format!("FulfillmentDocument(id={})不存在", document_id)))
        })
    }

    pub fn list_documents(&self, supplier: Option<&str>) -> ApiResult<Vec<FulfillmentDocument>> {
        with_read_conn(&self.db_path, |conn| {
            Ok(SlipRepository::list_documents(conn, supplier)?)
        })
    }
}

// ==========================================
// 生产订单追踪系统 - 扫码 API
// ==========================================
// 接口: POST scan {orderId, partId?, stationId, scanType, timestamp}
//       → {message, orderInfo?}
// ==========================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::config::engine_config::ConfigSnapshot;
use crate::domain::job::OrderSummary;
use crate::domain::scan::RawScan;
use crate::engine::scan_ingestor::{ScanIngestor, ScanResult};

/// 扫码请求 (线上格式与 RawScan 一致)
pub type ScanRequest = RawScan;

/// 扫码响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_info: Option<OrderSummary>,
}

// ==========================================
// ScanApi
// ==========================================
pub struct ScanApi {
    ingestor: Arc<ScanIngestor>,
    config: Arc<ConfigSnapshot>,
}

impl ScanApi {
    pub fn new(ingestor: Arc<ScanIngestor>, config: Arc<ConfigSnapshot>) -> Self {
        Self { ingestor, config }
    }

    /// 提交扫码
    ///
    /// # 返回
    /// - Ok(ScanResponse): 扫码被接受
    /// - Err(ApiError::Rejected): 扫码被拒绝 (无任何写入)
    /// - Err(其他): 单次请求失败
    pub fn post_scan(&self, request: &ScanRequest) -> ApiResult<ScanResponse> {
        let config = self.config.current();
        let accepted = self.ingestor.try_ingest(request, &config)?;

        Ok(ScanResponse {
            message: accepted.message(),
            order_info: Some(accepted.order_info),
        })
    }

    /// 提交扫码,返回带标签的结果 (拒绝不作为错误)
    pub fn post_scan_tagged(&self, request: &ScanRequest) -> ScanResult {
        let config = self.config.current();
        self.ingestor.ingest(request, &config)
    }

    /// 以 JSON 请求体提交扫码
    pub fn post_scan_json(&self, body: &str) -> ApiResult<ScanResponse> {
        let request: ScanRequest = serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidInput(format!("扫码请求格式错误: {}", e)))?;
        self.post_scan(&request)
    }
}

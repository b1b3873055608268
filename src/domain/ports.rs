use crate::domain::model::{AnalysisRequest, AnalysisResponse};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 報表輸出目的地
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// 產生敘述性分析。實作不得讓呼叫端失敗，服務不可用時改用本地分析
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest, context: &serde_json::Value) -> AnalysisResponse;
}

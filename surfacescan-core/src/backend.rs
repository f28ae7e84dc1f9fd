use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;
use surfacescan_model::{CreatedScan, ScanRequest, ScanStatusReport};

use crate::error::GatewayError;
use crate::gateway::Gateway;

/// The three calls the scan controller makes against the backend.
///
/// [`Gateway`] is the production implementation; tests drive the controller
/// with scripted fakes.
#[async_trait]
pub trait ScanBackend: Send + Sync + Debug {
    async fn create_scan(
        &self,
        request: &ScanRequest,
    ) -> Result<CreatedScan, GatewayError>;

    async fn scan_status(
        &self,
        scan_id: &str,
    ) -> Result<ScanStatusReport, GatewayError>;

    async fn scan_results(&self, scan_id: &str) -> Result<Value, GatewayError>;
}

#[async_trait]
impl ScanBackend for Gateway {
    async fn create_scan(
        &self,
        request: &ScanRequest,
    ) -> Result<CreatedScan, GatewayError> {
        Gateway::create_scan(self, request).await
    }

    async fn scan_status(
        &self,
        scan_id: &str,
    ) -> Result<ScanStatusReport, GatewayError> {
        Gateway::scan_status(self, scan_id).await
    }

    async fn scan_results(&self, scan_id: &str) -> Result<Value, GatewayError> {
        Gateway::scan_results(self, scan_id).await
    }
}

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct TransferQrRequest {
    pub bank_bin: String,
    pub account_number: String,
    pub account_name: String,
    pub amount: i64,
    pub memo: String,
}

/// Produces a scannable bank-transfer QR image for the payment screen.
#[async_trait]
pub trait PaymentQrProvider: Send + Sync {
    /// `Ok(None)` when QR generation is not available.
    async fn transfer_qr(&self, request: &TransferQrRequest) -> anyhow::Result<Option<String>>;
}

pub struct VietQrProvider {
    url: String,
    client: reqwest::Client,
}

impl VietQrProvider {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct VietQrResponse {
    code: String,
    desc: Option<String>,
    data: Option<VietQrData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VietQrData {
    qr_data_url: String,
}

#[async_trait]
impl PaymentQrProvider for VietQrProvider {
    async fn transfer_qr(&self, request: &TransferQrRequest) -> anyhow::Result<Option<String>> {
        let body = json!({
            "accountNo": request.account_number,
            "accountName": request.account_name,
            "acqId": request.bank_bin,
            "amount": request.amount,
            "addInfo": request.memo,
            "format": "text",
            "template": "compact",
        });

        let resp: VietQrResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("failed to call QR service")?
            .error_for_status()
            .context("QR service returned error")?
            .json()
            .await
            .context("failed to parse QR service response")?;

        if resp.code != "00" {
            anyhow::bail!(
                "QR service rejected request ({}): {}",
                resp.code,
                resp.desc.unwrap_or_default()
            );
        }

        Ok(resp.data.map(|d| d.qr_data_url))
    }
}

/// Used when no receiving bank account is configured.
pub struct NoQrProvider;

#[async_trait]
impl PaymentQrProvider for NoQrProvider {
    async fn transfer_qr(&self, _request: &TransferQrRequest) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

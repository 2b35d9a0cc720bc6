//! Response envelope for outer layers.
//!
//! Every operation result can be folded into an [`ApiResponse`] carrying a
//! success flag, a human-readable message and either the payload or an
//! error code.

use crate::{
    core::{ledger::BalanceReceipt, records::RecordKind},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use serde::Serialize;

/// Uniform `{success, message, data}` envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Machine-readable error code on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    /// Successful response with a payload
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    /// Failed response built from an error
    #[must_use]
    pub fn failure(error: &Error) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            data: None,
            error: Some(error.kind().as_str()),
        }
    }

    /// Folds an operation result, using `message` on success
    pub fn from_result(result: Result<T>, message: impl Into<String>) -> Self {
        match result {
            Ok(data) => Self::ok(data, message),
            Err(e) => Self::failure(&e),
        }
    }
}

/// Recharge/consume payload: who, how much, and the resulting balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceChangeView {
    /// Member the amount applied to
    pub member_id: String,
    /// Member name recorded on the audit row
    pub name: String,
    /// Amount recharged or consumed
    pub amount: Decimal,
    /// Balance after the operation committed
    pub new_balance: Decimal,
    /// Who performed the operation
    pub operator: String,
}

impl From<BalanceReceipt> for BalanceChangeView {
    fn from(receipt: BalanceReceipt) -> Self {
        Self {
            member_id: receipt.record.member_id,
            name: receipt.record.member_name,
            amount: receipt.record.amount,
            new_balance: receipt.new_balance,
            operator: receipt.record.operator,
        }
    }
}

/// Wraps a recharge/consume result in the response envelope
pub fn balance_change_response(kind: RecordKind, result: Result<BalanceReceipt>) -> ApiResponse<BalanceChangeView> {
    let message = match kind {
        RecordKind::Recharge => "Recharge succeeded",
        RecordKind::Consume => "Consume succeeded",
    };
    ApiResponse::from_result(result.map(Into::into), message)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ledger;
    use crate::test_utils::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_balance_change_success() -> Result<()> {
        let store = setup_test_store().await?;
        funded_member(&store, "M001", "Alice", "100.00").await?;

        let result = ledger::consume(&store, "M001", dec!(20.5), Some("desk")).await;
        let response = balance_change_response(RecordKind::Consume, result);
        assert!(response.success);

        let json = serde_json::to_value(&response)?;
        assert_eq!(json["data"]["member_id"], "M001");
        assert_eq!(json["data"]["name"], "Alice");
        assert_eq!(json["data"]["amount"], "20.50");
        assert_eq!(json["data"]["new_balance"], "79.50");
        assert_eq!(json["data"]["operator"], "desk");
        assert!(json.get("error").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_carries_message_and_code() -> Result<()> {
        let store = setup_test_store().await?;
        create_test_member(&store, "M001", "Alice").await?;

        let result = ledger::consume(&store, "M001", dec!(1), None).await;
        let response = balance_change_response(RecordKind::Consume, result);
        assert!(!response.success);
        assert_eq!(response.error, Some("InsufficientBalance"));
        assert!(response.message.contains("Insufficient balance"));
        assert!(response.data.is_none());
        Ok(())
    }
}

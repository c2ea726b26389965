use serde_json::Value;
use shared::{domain::ApiGeneration, protocol::StatusVocabulary};

use crate::{
    error::ClientError,
    transport::{decode_record, ApiRequest, StoreTransport},
};

/// Fetches the order status vocabulary using the summary schema of the
/// configured API generation.
pub async fn fetch_status_vocabulary(
    transport: &dyn StoreTransport,
    generation: ApiGeneration,
) -> Result<StatusVocabulary, ClientError> {
    let response = transport
        .send(ApiRequest::get(generation.status_summary_path()))
        .await?;
    let body: Value = decode_record(response)?;
    parse_status_summary(&body, generation)
}

pub fn parse_status_summary(
    body: &Value,
    generation: ApiGeneration,
) -> Result<StatusVocabulary, ClientError> {
    let parsed = match generation {
        ApiGeneration::Dokan => StatusVocabulary::from_counts(body),
        ApiGeneration::WcV3 => StatusVocabulary::from_totals(body),
    };
    parsed.ok_or_else(|| {
        ClientError::Decode(format!(
            "unexpected status summary shape for {generation:?}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn dokan_summary_uses_count_keys_without_total() {
        let vocabulary = parse_status_summary(
            &json!({"wc-pending": 2, "wc-processing": "5", "total": 7}),
            ApiGeneration::Dokan,
        )
        .unwrap();
        let codes: Vec<_> = vocabulary.options.iter().map(|o| o.code.as_str()).collect();
        assert_eq!(codes, ["wc-pending", "wc-processing"]);
    }

    #[test]
    fn wc_v3_summary_uses_slug_and_name() {
        let vocabulary = parse_status_summary(
            &json!([
                {"slug": "pending", "name": "Pending payment", "total": 1},
                {"slug": "completed", "name": "Completed", "total": 4}
            ]),
            ApiGeneration::WcV3,
        )
        .unwrap();
        assert_eq!(vocabulary.options[0].code, "pending");
        assert_eq!(vocabulary.options[0].label, "Pending payment");
        assert_eq!(vocabulary.len(), 2);
    }

    #[test]
    fn schema_is_not_guessed_across_generations() {
        let err = parse_status_summary(&json!({"pending": 1}), ApiGeneration::WcV3).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));

        let err = parse_status_summary(&json!([{"slug": "pending"}]), ApiGeneration::Dokan)
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}

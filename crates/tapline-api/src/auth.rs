// Device authentication
//
// Each capture device holds one static API key, carried in the X-API-Key
// header out-of-band of the payload. Operator/dashboard auth is handled by
// an external collaborator and is not part of this service.

use axum::http::HeaderMap;
use tapline_storage::{DeviceRow, StorageBackend};

use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Resolve the submitting device from its API key header.
pub async fn authenticate_device(
    db: &StorageBackend,
    headers: &HeaderMap,
) -> Result<DeviceRow, ApiError> {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let device = db
        .get_device_by_key(key)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::Unauthorized)?;

    tracing::debug!(device_id = %device.device_id, "device authenticated");
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapline_storage::CreateDevice;

    async fn backend_with_device() -> StorageBackend {
        let db = StorageBackend::in_memory();
        db.create_device(CreateDevice {
            device_id: "GATE-1".to_string(),
            name: "Main gate".to_string(),
            location: "Lobby".to_string(),
            api_key: "secret-key".to_string(),
        })
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn valid_key_resolves_device() {
        let db = backend_with_device().await;
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, "secret-key".parse().unwrap());

        let device = authenticate_device(&db, &headers).await.unwrap();
        assert_eq!(device.device_id, "GATE-1");
    }

    #[tokio::test]
    async fn missing_or_wrong_key_is_unauthorized() {
        let db = backend_with_device().await;

        let err = authenticate_device(&db, &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, "wrong".parse().unwrap());
        let err = authenticate_device(&db, &headers).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}

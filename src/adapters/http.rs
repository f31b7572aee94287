use crate::domain::model::{
    NewSession, Plate, Session, Slot, SlotRef, Vehicle, Yard, YardId, YardRef,
};
use crate::domain::ports::{
    ConfigProvider, SessionRegistry, SlotRegistry, VehicleRegistry, YardRegistry,
};
use crate::utils::error::{AssignError, ConflictKind, RegistryError, RegistryResult, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const YARD_PAGE_SIZE: usize = 100;
const SLOT_PAGE_SIZE: usize = 500;
const ORPHAN_REMOVAL_ERROR: &str = "COLLECTION_ORPHAN_REMOVAL_ERROR";

// Wire shapes of the parking backend (Spring pages, Portuguese field names).

#[derive(Debug, Deserialize)]
struct Page<T> {
    content: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VehicleDto {
    id_veiculo: i64,
    placa: String,
    modelo: Option<String>,
    fabricante: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YardDto {
    id_patio: i64,
    nome_patio: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlotDto {
    id_box: i64,
    nome: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionVehicleDto {
    id_veiculo: i64,
    placa: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionSlotDto {
    id_box: i64,
    nome: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionYardDto {
    id_patio: i64,
    nome_patio: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDto {
    id_estacionamento: i64,
    veiculo: SessionVehicleDto,
    #[serde(rename = "box")]
    slot: SessionSlotDto,
    patio: SessionYardDto,
    esta_estacionado: bool,
    data_entrada: String,
    data_saida: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: Option<String>,
    error_type: Option<String>,
}

fn parse_timestamp(raw: &str) -> RegistryResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    // LocalDateTime without offset; the backend runs in UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| RegistryError::Decode {
            message: format!("bad timestamp '{}': {}", raw, e),
        })
}

impl TryFrom<SessionDto> for Session {
    type Error = RegistryError;

    fn try_from(dto: SessionDto) -> RegistryResult<Self> {
        let started_at = parse_timestamp(&dto.data_entrada)?;
        let ended_at = match dto.data_saida.as_deref() {
            Some(raw) => Some(parse_timestamp(raw)?),
            None if !dto.esta_estacionado => Some(started_at),
            None => None,
        };

        Ok(Session {
            id: dto.id_estacionamento,
            vehicle_id: dto.veiculo.id_veiculo,
            plate: dto.veiculo.placa,
            slot: SlotRef {
                id: dto.slot.id_box,
                name: dto.slot.nome,
            },
            yard: YardRef {
                id: dto.patio.id_patio,
                name: dto.patio.nome_patio,
            },
            started_at,
            ended_at,
        })
    }
}

fn classify_conflict(message: &str) -> Option<ConflictKind> {
    let lower = message.to_lowercase();
    if lower.contains("ocupado") || lower.contains("occupied") || lower.contains("disponível") {
        Some(ConflictKind::SlotTaken)
    } else if lower.contains("já está estacionad") || lower.contains("already parked") {
        Some(ConflictKind::VehicleParked)
    } else {
        None
    }
}

/// Maps a non-success response onto [`RegistryError`].
fn error_for_status(status: StatusCode, body: ErrorBody) -> RegistryError {
    let message = body
        .message
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());

    match status {
        StatusCode::NOT_FOUND => RegistryError::NotFound { message },
        StatusCode::CONFLICT => RegistryError::Conflict {
            kind: classify_conflict(&message).unwrap_or(ConflictKind::Unspecified),
            message,
        },
        StatusCode::BAD_REQUEST => match classify_conflict(&message) {
            Some(kind) => RegistryError::Conflict { kind, message },
            None => RegistryError::Rejected {
                status: status.as_u16(),
                message,
            },
        },
        StatusCode::INTERNAL_SERVER_ERROR
            if body.error_type.as_deref() == Some(ORPHAN_REMOVAL_ERROR)
                || message.contains("delete-orphan") =>
        {
            RegistryError::Conflict {
                kind: ConflictKind::Unspecified,
                message,
            }
        }
        _ => RegistryError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

/// Registry client for the parking backend's REST API.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: Client,
    base_url: Url,
}

impl HttpRegistry {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Self::with_headers(base_url, timeout, HeaderMap::new())
    }

    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in config.registry_headers() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                AssignError::InvalidConfigValueError {
                    field: "registry.headers".to_string(),
                    value: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(&value).map_err(|e| {
                AssignError::InvalidConfigValueError {
                    field: "registry.headers".to_string(),
                    value: name.as_str().to_string(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(name, value);
        }
        Self::with_headers(config.registry_url(), config.request_timeout(), headers)
    }

    pub fn with_headers(base_url: &str, timeout: Duration, headers: HeaderMap) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| AssignError::InvalidConfigValueError {
            field: "registry.base_url".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AssignError::InvalidConfigValueError {
                field: "registry.base_url".to_string(),
                value: base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AssignError::ConfigError {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> RegistryResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Registry responded {} for {}", status, response.url());

        if status.is_success() {
            return Ok(response);
        }
        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        Err(error_for_status(status, body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> RegistryResult<T> {
        tracing::debug!("GET {}", url);
        let response = self.send(self.client.get(url)).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl VehicleRegistry for HttpRegistry {
    async fn find_by_plate(&self, plate: &Plate) -> RegistryResult<Option<Vehicle>> {
        let mut url = self.endpoint(&["veiculos", "search"]);
        url.query_pairs_mut()
            .append_pair("placa", plate.as_str())
            .append_pair("page", "0")
            .append_pair("size", "1");

        let page: Page<VehicleDto> = self.get_json(url).await?;
        Ok(page
            .content
            .into_iter()
            .find(|v| v.placa.eq_ignore_ascii_case(plate.as_str()))
            .map(|v| Vehicle {
                id: v.id_veiculo,
                plate: v.placa.to_uppercase(),
                model: v.modelo,
                manufacturer: v.fabricante,
                status: v.status.unwrap_or_default(),
            }))
    }
}

#[async_trait]
impl YardRegistry for HttpRegistry {
    async fn list_yards(&self) -> RegistryResult<Vec<Yard>> {
        let mut url = self.endpoint(&["patios", "search"]);
        url.query_pairs_mut()
            .append_pair("page", "0")
            .append_pair("size", &YARD_PAGE_SIZE.to_string());

        let page: Page<YardDto> = self.get_json(url).await?;
        Ok(page
            .content
            .into_iter()
            .map(|y| Yard {
                id: y.id_patio,
                name: y.nome_patio,
                status: y.status.unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl SlotRegistry for HttpRegistry {
    async fn list_slots(&self, yard_id: YardId, yard_status: &str) -> RegistryResult<Vec<Slot>> {
        let id = yard_id.to_string();
        let mut url = self.endpoint(&["patios", &id, "status", yard_status, "boxes"]);
        url.query_pairs_mut()
            .append_pair("page", "0")
            .append_pair("size", &SLOT_PAGE_SIZE.to_string());

        let page: Page<SlotDto> = self.get_json(url).await?;
        Ok(page
            .content
            .into_iter()
            .map(|s| Slot {
                id: s.id_box,
                name: s.nome,
                yard_id,
                status: s.status.unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl SessionRegistry for HttpRegistry {
    async fn find_active_by_plate(&self, plate: &Plate) -> RegistryResult<Option<Session>> {
        let url = self.endpoint(&["estacionamentos", "placa", plate.as_str()]);
        match self.get_json::<SessionDto>(url).await {
            Ok(dto) => {
                let session = Session::try_from(dto)?;
                Ok(session.is_active().then_some(session))
            }
            Err(RegistryError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_active_by_yard(&self, yard_id: YardId) -> RegistryResult<Vec<Session>> {
        let id = yard_id.to_string();
        let url = self.endpoint(&["estacionamentos", "patio", &id, "ativos"]);
        let dtos: Vec<SessionDto> = self.get_json(url).await?;
        dtos.into_iter().map(Session::try_from).collect()
    }

    async fn create_session(&self, request: &NewSession) -> RegistryResult<Session> {
        let mut url = self.endpoint(&["estacionamentos", "estacionar"]);
        {
            let mut query = url.query_pairs_mut();
            if let Some(slot_id) = request.slot_id {
                query.append_pair("boxId", &slot_id.to_string());
            }
            if let Some(yard_id) = request.yard_id {
                query.append_pair("patioId", &yard_id.to_string());
            }
        }
        // An empty query string would still leave a trailing '?'.
        if url.query() == Some("") {
            url.set_query(None);
        }

        tracing::debug!("POST {}", url);
        let body = serde_json::json!({ "placa": request.plate });
        let response = self.send(self.client.post(url).json(&body)).await?;
        let dto: SessionDto = response.json().await?;
        Session::try_from(dto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_classification() {
        assert_eq!(
            classify_conflict("Box G001 já está ocupado por outro veículo."),
            Some(ConflictKind::SlotTaken)
        );
        assert_eq!(
            classify_conflict("Veículo já está estacionado"),
            Some(ConflictKind::VehicleParked)
        );
        assert_eq!(classify_conflict("Placa inválida."), None);
    }

    #[test]
    fn test_bad_request_without_marker_is_rejected() {
        let err = error_for_status(
            StatusCode::BAD_REQUEST,
            ErrorBody {
                message: Some("Placa inválida.".to_string()),
                error_type: None,
            },
        );
        assert!(matches!(err, RegistryError::Rejected { status: 400, .. }));
    }

    #[test]
    fn test_orphan_removal_error_is_conflict() {
        let err = error_for_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                message: Some("A collection with cascade=all-delete-orphan".to_string()),
                error_type: Some(ORPHAN_REMOVAL_ERROR.to_string()),
            },
        );
        assert!(matches!(err, RegistryError::Conflict { .. }));
    }

    #[test]
    fn test_parse_local_timestamp() {
        let ts = parse_timestamp("2025-10-01T08:30:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-10-01T08:30:00+00:00");
        assert!(parse_timestamp("2025-10-01T08:30:00.123Z").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let registry = HttpRegistry::new("http://localhost:8080/api/", Duration::from_secs(5)).unwrap();
        let url = registry.endpoint(&["estacionamentos", "placa", "ABC1234"]);
        assert_eq!(url.as_str(), "http://localhost:8080/api/estacionamentos/placa/ABC1234");
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Record Types
// ════════════════════════════════════════════════════════════════

/// Известные типы телеметрии. Набор advisory, не enforced:
/// store принимает и неизвестные типы, но snapshot всегда
/// содержит ключи для этих четырёх, даже до первого ingest.
pub const KNOWN_RECORD_TYPES: [&str; 4] = [
    "weather_data",
    "traffic_zones",
    "events_data",
    "system_status",
];

// ════════════════════════════════════════════════════════════════
//  TelemetryRecord
// ════════════════════════════════════════════════════════════════

/// Одна запись телеметрии: последний payload данного типа.
///
/// Payload — opaque JSON value. Core никогда не интерпретирует
/// его содержимое; типизированный доступ — забота потребителя.
/// `received_at` проставляется store'ом в момент ingest, никогда
/// producer'ом — это доверенные часы для freshness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub record_type: String,
    pub payload: serde_json::Value,
    /// Метка времени симуляции (opaque, от producer'а).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim_timestamp: Option<serde_json::Value>,
    /// Реальная метка времени producer'а (opaque).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_timestamp: Option<serde_json::Value>,
    /// Unix ms, когда store принял запись.
    pub received_at: i64,
}

/// Метаданные producer'а, передаваемые в store при ingest.
#[derive(Clone, Debug, Default)]
pub struct RecordMeta {
    pub sim_timestamp: Option<serde_json::Value>,
    pub real_timestamp: Option<serde_json::Value>,
}

// ════════════════════════════════════════════════════════════════
//  ConnectionStats
// ════════════════════════════════════════════════════════════════

/// Счётчики соединений процесса. Возвращаются по значению:
/// мутировать tracker через снимок нельзя.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub successful_posts: u64,
    /// Unix ms последнего успешного ingest. None до первого POST.
    pub last_foundry_connection: Option<i64>,
    /// Unix ms старта процесса. Фиксируется один раз.
    pub startup_time: i64,
}

// ════════════════════════════════════════════════════════════════
//  Wire Types
// ════════════════════════════════════════════════════════════════

/// Тело POST /api/simulation-data. Поля optional намеренно:
/// валидация (и различение missing vs malformed) — на boundary,
/// а не в serde.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IngestRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim_timestamp: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_timestamp: Option<serde_json::Value>,
}

/// Успешный ответ на ingest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestAck {
    pub success: bool,
    pub message: String,
    pub timestamp: i64,
}

/// Ответ GET: полный снимок store + статистика + вердикты freshness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub success: bool,
    pub data: HashMap<String, Option<TelemetryRecord>>,
    pub connection_stats: ConnectionStats,
    pub data_freshness: HashMap<String, bool>,
    pub last_updated: i64,
}

/// Тело любого error-ответа.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ════════════════════════════════════════════════════════════════
//  Time
// ════════════════════════════════════════════════════════════════

/// Текущее Unix-время в миллисекундах.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

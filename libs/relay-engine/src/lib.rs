use std::collections::HashMap;

use tokio::sync::Mutex;

use relay_api::{now_ms, ConnectionStats, RecordMeta, TelemetryRecord, KNOWN_RECORD_TYPES};

// ═══════════════════════════════════════════════════════════════
//  Freshness
// ═══════════════════════════════════════════════════════════════

/// Порог свежести записи в минутах.
pub const FRESH_THRESHOLD_MINUTES: i64 = 5;

/// Вердикт свежести записи. Чистая функция от входов.
///
/// `false` для отсутствующей записи, иначе строгое
/// `now - received_at < threshold`. Запись с `received_at` в будущем
/// (clock skew) даёт отрицательный возраст и считается свежей —
/// намеренно, а не defensive.
pub fn is_fresh(record: Option<&TelemetryRecord>, now_ms: i64, threshold_minutes: i64) -> bool {
    match record {
        Some(r) => now_ms - r.received_at < threshold_minutes * 60_000,
        None => false,
    }
}

// ═══════════════════════════════════════════════════════════════
//  RecordStore
// ═══════════════════════════════════════════════════════════════

/// Latest-value store: не более одной записи на тип.
///
/// Засеян известными типами → None, чтобы snapshot до первого
/// ingest всё равно перечислял их. Неизвестные типы принимаются
/// и добавляют ключ; ключи никогда не удаляются.
pub struct RecordStore {
    records: HashMap<String, Option<TelemetryRecord>>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        let records = KNOWN_RECORD_TYPES
            .iter()
            .map(|t| (t.to_string(), None))
            .collect();
        Self { records }
    }

    /// Перезаписать запись типа `record_type`. `received_at`
    /// проставляется здесь и только здесь. Строгий supersede,
    /// без merge. Возвращает сохранённую запись.
    pub fn put(
        &mut self,
        record_type: &str,
        payload: serde_json::Value,
        meta: RecordMeta,
    ) -> TelemetryRecord {
        let record = TelemetryRecord {
            record_type: record_type.to_string(),
            payload,
            sim_timestamp: meta.sim_timestamp,
            real_timestamp: meta.real_timestamp,
            received_at: now_ms(),
        };
        self.records
            .insert(record_type.to_string(), Some(record.clone()));
        record
    }

    /// Полное текущее содержимое: по одной entry на каждый
    /// когда-либо виденный тип, None для не присланных.
    pub fn snapshot(&self) -> HashMap<String, Option<TelemetryRecord>> {
        self.records.clone()
    }
}

// ═══════════════════════════════════════════════════════════════
//  ConnectionTracker
// ═══════════════════════════════════════════════════════════════

/// Счётчики запросов процесса. `startup_time` фиксируется при
/// создании; счётчики только растут, `last_foundry_connection`
/// только движется вперёд.
pub struct ConnectionTracker {
    stats: ConnectionStats,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            stats: ConnectionStats {
                total_requests: 0,
                successful_posts: 0,
                last_foundry_connection: None,
                startup_time: now_ms(),
            },
        }
    }

    /// Один inbound вызов — один инкремент, независимо от исхода.
    pub fn record_request(&mut self) {
        self.stats.total_requests += 1;
    }

    /// Только после успешного put.
    pub fn record_successful_ingest(&mut self) {
        self.stats.successful_posts += 1;
        self.stats.last_foundry_connection = Some(now_ms());
    }

    /// Снимок счётчиков по значению.
    pub fn read(&self) -> ConnectionStats {
        self.stats.clone()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Relay
// ═══════════════════════════════════════════════════════════════

/// Согласованный снимок пары store + tracker.
pub struct RelaySnapshot {
    pub data: HashMap<String, Option<TelemetryRecord>>,
    pub stats: ConnectionStats,
}

struct RelayInner {
    store: RecordStore,
    tracker: ConnectionTracker,
}

/// Ядро сервиса: store + tracker за одним mutex'ом.
///
/// Handlers axum'а работают конкурентно, а каждый запрос — включая
/// чтения — делает read-modify-write (total_requests), поэтому
/// Mutex, а не RwLock. Критические секции короткие: clone внутрь,
/// clone наружу, без await под локом.
///
/// Явно конструируемый объект, не глобал: тесты собирают
/// изолированные экземпляры.
pub struct Relay {
    inner: Mutex<RelayInner>,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RelayInner {
                store: RecordStore::new(),
                tracker: ConnectionTracker::new(),
            }),
        }
    }

    /// Учесть inbound вызов. Ровно один раз на запрос, до любой
    /// обработки.
    pub async fn record_request(&self) {
        self.inner.lock().await.tracker.record_request();
    }

    /// put + учёт успешного ingest под одним захватом лока:
    /// другие запросы не увидят store обновлённым, а счётчики — нет.
    pub async fn ingest(
        &self,
        record_type: &str,
        payload: serde_json::Value,
        meta: RecordMeta,
    ) -> TelemetryRecord {
        let mut inner = self.inner.lock().await;
        let record = inner.store.put(record_type, payload, meta);
        inner.tracker.record_successful_ingest();
        tracing::debug!(record_type, "stored record");
        record
    }

    /// Стабильное чтение: data и stats из одного захвата лока.
    pub async fn snapshot(&self) -> RelaySnapshot {
        let inner = self.inner.lock().await;
        RelaySnapshot {
            data: inner.store.snapshot(),
            stats: inner.tracker.read(),
        }
    }
}

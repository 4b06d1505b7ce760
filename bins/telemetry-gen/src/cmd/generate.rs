use std::time::Duration;

use super::config::Effective;
use super::domain::{new_sensors, Rng, Sensor};
use super::error::GenError;

// ═══════════════════════════════════════════════════════════════
//  Posting loop
// ═══════════════════════════════════════════════════════════════

pub async fn run(args: &Effective) -> Result<(), GenError> {
    let mut rng = Rng::new(args.seed);
    let mut sensors = new_sensors();

    if let Some(ref t) = args.record_type {
        sensors.retain(|s| s.name().eq_ignore_ascii_case(t));
        if sensors.is_empty() {
            let names: Vec<_> = new_sensors().iter().map(Sensor::name).collect();
            return Err(GenError::Config(format!(
                "unknown record type: {t}\navailable: {}",
                names.join(" ")
            )));
        }
    }

    let client = reqwest::Client::new();
    tracing::info!(url = %args.url, interval_ms = args.interval, "producer starting");

    let interval = Duration::from_millis(args.interval);
    let mut round: u64 = 0;

    loop {
        round += 1;
        for sensor in sensors.iter_mut() {
            sensor.tick(&mut rng);
            post_record(&client, args, sensor, round).await;
        }

        if args.count != 0 && round >= args.count {
            break;
        }
        tokio::time::sleep(interval).await;
    }

    tracing::info!(rounds = round, "done");
    Ok(())
}

/// Фиксированный интервал, без backoff: сбой доставки логируется
/// и пропускается, relay видит молчание как staleness.
async fn post_record(client: &reqwest::Client, args: &Effective, sensor: &Sensor, round: u64) {
    let request = sensor.to_request(round);
    match client.post(&args.url).json(&request).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!(record_type = sensor.name(), round, "sent");
        }
        Ok(resp) => {
            tracing::warn!(
                record_type = sensor.name(),
                status = %resp.status(),
                "relay rejected record"
            );
        }
        Err(e) => {
            tracing::warn!(record_type = sensor.name(), error = %e, "post failed");
        }
    }
}

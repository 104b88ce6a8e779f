use std::io::{self, Write};
use std::time::Instant;

use zscore_stream::config::StreamConfig;
use zscore_stream::stream::SyntheticStream;
use zscore_stream::{DetectorConfig, RollingAnomalyDetector};

fn main() {
    println!("=== Rolling Z-Score Throughput ===");
    println!("Seasonal stream with noise and injected spikes, default detector.\n");

    let total_samples: u64 = 5_000_000;
    let report_every: u64 = 500_000;

    let mut stream = SyntheticStream::new(StreamConfig {
        length: Some(total_samples),
        seed: Some(2024),
        ..Default::default()
    })
    .expect("stream config");

    let mut detector =
        RollingAnomalyDetector::with_config(DetectorConfig::default()).expect("detector config");

    println!(
        "{:<12} | {:<10} | {:<10} | {:<12}",
        "Samples", "Flagged", "Injected", "Rate (M/s)"
    );
    println!("{}", "-".repeat(52));

    let start = Instant::now();
    let mut flagged = 0u64;
    let mut seen = 0u64;

    while let Some(value) = stream.next() {
        if detector.ingest(value) {
            flagged += 1;
        }
        seen += 1;

        if seen % report_every == 0 {
            let rate = seen as f64 / start.elapsed().as_secs_f64() / 1e6;
            print!(
                "\r{:<12} | {:<10} | {:<10} | {:<12.2}",
                seen,
                flagged,
                stream.injected(),
                rate
            );
            io::stdout().flush().ok();
        }
    }

    let elapsed = start.elapsed();
    let injected = stream.injected();
    println!("\n\n=== Throughput Complete ===");
    println!("Samples Processed:  {}", seen);
    println!("Spikes Injected:    {}", injected);
    println!("Samples Flagged:    {}", flagged);
    println!(
        "Flag/Inject Ratio:  {:.2}",
        if injected > 0 { flagged as f64 / injected as f64 } else { 0.0 }
    );
    println!("Real Execution Time: {:?}", elapsed);
    println!(
        "Throughput:          {:.0} samples/sec",
        seen as f64 / elapsed.as_secs_f64()
    );
}

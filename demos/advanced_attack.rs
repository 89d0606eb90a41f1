use anyhow::Result;
use barrage::{Attacker, Target, calculate_metrics, encode};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_thread_names(true)
        .init();

    // Create multiple targets with different methods, used round-robin
    let targets = vec![
        Target::get("https://example.com/api/users")?.with_header("Accept", "application/json"),
        Target::post(
            "https://example.com/api/users",
            r#"{"name": "John Doe", "email": "john@example.com"}"#,
        )?
        .with_header("Content-Type", "application/json")
        .with_header("Accept", "application/json"),
        Target::new("PUT", "https://example.com/api/users/123")?
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"name": "Jane Doe", "email": "jane@example.com"}"#),
    ];

    let attacker = Attacker::builder()
        .timeout(Duration::from_secs(5))
        .max_redirects(5)
        .insecure(false)
        .keepalive(true)
        .header("User-Agent", "barrage-advanced-example")
        .build()?;

    // Warm up, then tighten the timeout for the measured run
    attacker.attack(&targets, 5.0, Duration::from_secs(2)).await?;
    attacker.set_timeout(Duration::from_secs(2));

    let results = attacker.attack(&targets, 20.0, Duration::from_secs(10)).await?;

    let Some(metrics) = calculate_metrics(&results) else {
        println!("No results collected");
        return Ok(());
    };

    println!("=== Attack Results ===");
    println!("Total requests: {}", metrics.requests);
    println!(
        "Successful requests: {} ({:.2}%)",
        metrics.success,
        metrics.success_rate * 100.0
    );
    println!("Duration: {:.2}s", metrics.duration.as_secs_f64());
    println!("Requests/second: {:.2}", metrics.rate);

    println!("\n=== Latency Statistics ===");
    println!("Min: {:.2}ms", metrics.min.as_secs_f64() * 1000.0);
    println!("Mean: {:.2}ms", metrics.mean.as_secs_f64() * 1000.0);
    println!("Max: {:.2}ms", metrics.max.as_secs_f64() * 1000.0);
    println!("50th percentile: {:.2}ms", metrics.p50.as_secs_f64() * 1000.0);
    println!("90th percentile: {:.2}ms", metrics.p90.as_secs_f64() * 1000.0);
    println!("95th percentile: {:.2}ms", metrics.p95.as_secs_f64() * 1000.0);
    println!("99th percentile: {:.2}ms", metrics.p99.as_secs_f64() * 1000.0);

    println!("\n=== Data Transfer ===");
    println!("Total data received: {} bytes", metrics.bytes_in);
    println!("Total data sent: {} bytes", metrics.bytes_out);

    println!("\n=== Status Code Distribution ===");
    for (code, count) in &metrics.status_codes {
        println!("{}: {} requests", code, count);
    }

    if !metrics.errors.is_empty() {
        println!("\n=== Error Distribution ===");
        for (error, count) in &metrics.errors {
            println!("{}: {} occurrences", error, count);
        }
    }

    println!("\n=== Attacker Counters ===");
    println!("{:?}", attacker.stats());

    let path = std::env::temp_dir().join("barrage-results.csv");
    let mut file = std::fs::File::create(&path)?;
    encode::write_csv(&results, &mut file)?;
    println!("\nResults written to {}", path.display());

    Ok(())
}

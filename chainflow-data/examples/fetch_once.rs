use chainflow_data::{
    ChainCache, ChainClient, ChainKey, DEFAULT_TTL, MemoryHistory, run_cycle,
};

#[tokio::main]
async fn main() {
    // Initialise INFO Tracing log subscriber
    init_logging();

    let symbol = std::env::args().nth(1).unwrap_or_else(|| "NIFTY".to_string());
    let key = ChainKey::index(&symbol);

    println!("Fetching one option-chain cycle for {}...", key.symbol);

    let client = match ChainClient::new() {
        Ok(client) => client,
        Err(error) => {
            eprintln!("Failed to build chain client: {error}");
            return;
        }
    };
    let cache = ChainCache::new(DEFAULT_TTL);
    let mut history = MemoryHistory::default();

    let frame = match run_cycle(&client, &cache, &mut history, &key).await {
        Ok(frame) => frame,
        Err(error) => {
            eprintln!("Cycle failed: {error}");
            return;
        }
    };

    if let Some(underlying) = frame.underlying {
        println!("Underlying: {underlying:.2}");
    }
    match frame.pcr_display {
        Some(pcr) => println!(
            "PCR ({}): {:.2} - {}",
            pcr.basis,
            pcr.value,
            pcr.sentiment().as_str()
        ),
        None => println!("PCR: N/A"),
    }
    match frame.max_pain {
        Some(mp) => println!("Max Pain: {} (total pain {:.0})", mp.strike, mp.total_pain),
        None => println!("Max Pain: N/A"),
    }

    println!("\nTop {} Call strikes by volume:", frame.top_calls.len());
    for record in &frame.top_calls {
        println!(
            "  strike {:>10.2}  vol {:>10}  OI {:>10}",
            record.strike, record.volume, record.open_interest
        );
    }
    println!("\nTop {} Put strikes by volume:", frame.top_puts.len());
    for record in &frame.top_puts {
        println!(
            "  strike {:>10.2}  vol {:>10}  OI {:>10}",
            record.strike, record.volume, record.open_interest
        );
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

use open5e_client::{CodexClient, CollectionType, FilterCategory, SortColumn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut client = CodexClient::new();

    // First request pulls every page of the spell list from the API.
    let start = std::time::Instant::now();
    let page = client.request_collection(CollectionType::Spells).await?;
    println!(
        "loaded {} spells ({} pages of {}) in {:?}",
        page.total_matches(),
        page.total_pages(),
        page.page_size(),
        start.elapsed()
    );

    // Second request is served from the cache.
    let start = std::time::Instant::now();
    client.request_collection(CollectionType::Spells).await?;
    println!("cached request took {:?}", start.elapsed());

    // Narrow to wizard spells from the SRD, sorted by level.
    client.set_filter(FilterCategory::SpellClass, ["Wizard".to_string()]);
    client.set_filter(FilterCategory::Source, ["SRD".to_string()]);
    let sorted = client.set_sort(SortColumn::Level).expect("collection is loaded");
    println!("{} wizard spells; first page:", sorted.total_matches());
    for record in sorted.records() {
        println!(
            "  {:<30} {:<12} {}",
            record.name(),
            record.str_field("level").unwrap_or("unknown"),
            record.source()
        );
    }

    // Detail lookups go straight to the API, uncached.
    let detail = client
        .fetch_detail(CollectionType::Spells, "fireball")
        .await?;
    println!("\nfireball: {}", detail.str_field("desc").unwrap_or(""));

    println!("\ncache stats: {:?}", client.cache_stats());
    Ok(())
}

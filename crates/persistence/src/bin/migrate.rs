#![deny(warnings)]

use persistence::default_sqlite_url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("PLAN_DATABASE_URL").unwrap_or_else(|_| default_sqlite_url().into());
    let pool = persistence::open_store(&url).await?;
    let plans = persistence::list_plans(&pool).await?;
    if plans.is_empty() {
        let id = persistence::create_plan(&pool, "default", Some("initialized")).await?;
        println!("DB migrated at {} | created plan {}", url, id);
    } else {
        println!("DB migrated at {} | {} plans", url, plans.len());
    }
    Ok(())
}

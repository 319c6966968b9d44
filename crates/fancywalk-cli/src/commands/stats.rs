use fancywalk_core::error::Result;
use fancywalk_core::{Config, Database};

use super::print_json;

pub fn run() -> Result<()> {
    let config = Config::load_or_default();
    let db = Database::open()?;
    let stats = db.fasting_stats(config.goal_secs())?;
    print_json(&stats)?;
    Ok(())
}

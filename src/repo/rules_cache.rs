use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::models::{CachedRules, NewCachedRules};
use crate::schema::brand_rules_cache;

pub fn get_cached_rules(
    conn: &mut PgConnection,
    checksum: &str,
) -> QueryResult<Option<CachedRules>> {
    brand_rules_cache::table
        .find(checksum)
        .first(conn)
        .optional()
}

pub fn cache_rules(
    conn: &mut PgConnection,
    checksum: &str,
    rules: serde_json::Value,
    total_rules: i32,
) -> QueryResult<usize> {
    let entry = NewCachedRules {
        checksum: checksum.to_string(),
        rules,
        total_rules,
    };
    diesel::insert_into(brand_rules_cache::table)
        .values(&entry)
        .on_conflict(brand_rules_cache::checksum)
        .do_update()
        .set((
            brand_rules_cache::rules.eq(&entry.rules),
            brand_rules_cache::total_rules.eq(entry.total_rules),
            brand_rules_cache::cached_at.eq(Utc::now()),
        ))
        .execute(conn)
}

pub fn purge_older_than(conn: &mut PgConnection, cutoff: DateTime<Utc>) -> QueryResult<usize> {
    diesel::delete(brand_rules_cache::table.filter(brand_rules_cache::cached_at.lt(cutoff)))
        .execute(conn)
}

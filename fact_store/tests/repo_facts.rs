mod common;

use diesel::prelude::*;
use fact_store::models::{AGE_ALL, MONTH_ANNUAL};
use fact_store::normalize::{FactRecord, RegionRef};
use fact_store::repo::query::FactFilters;
use fact_store::repo::{StoreError, facts, query, regions, snapshots, sources};
use fact_store::schema::demographic_facts::dsl as df;
use fact_store::schema::industrial_facts::dsl as inf;
use stat_ingestor::models::raw_page::RawPage;

use common::setup_db;

fn region(code: &str) -> RegionRef {
    RegionRef {
        code: code.to_string(),
        name: format!("Region {code}"),
    }
}

fn demo_fact(code: &str, year: i32, sex: &str, population: i64) -> FactRecord {
    FactRecord::Demographic {
        region: region(code),
        year,
        sex: sex.to_string(),
        age_min: Some(0),
        age_max: Some(5),
        population,
    }
}

fn industrial_fact(code: &str, year: i32, month: Option<u32>, value: f64) -> FactRecord {
    FactRecord::Industrial {
        region: region(code),
        year,
        month,
        nace: Some("C".to_string()),
        value,
        unit: Some("I21".to_string()),
    }
}

#[test]
fn double_upsert_is_idempotent() {
    let (_db, mut conn) = setup_db();
    let source = sources::get_or_create_source(&mut conn, "demo_pjan", "api").unwrap();

    let batch = vec![
        demo_fact("DE", 2023, "M", 2_000_000),
        demo_fact("DE", 2023, "F", 1_900_000),
    ];
    assert_eq!(facts::upsert_facts(&mut conn, source.id, &batch).unwrap(), 2);
    assert_eq!(facts::upsert_facts(&mut conn, source.id, &batch).unwrap(), 2);

    let rows: i64 = df::demographic_facts.count().get_result(&mut conn).unwrap();
    assert_eq!(rows, 2);
}

#[test]
fn replay_refreshes_the_value_in_place() {
    let (_db, mut conn) = setup_db();
    let source = sources::get_or_create_source(&mut conn, "demo_pjan", "api").unwrap();

    facts::upsert_facts(&mut conn, source.id, &[demo_fact("DE", 2023, "M", 100)]).unwrap();
    facts::upsert_facts(&mut conn, source.id, &[demo_fact("DE", 2023, "M", 250)]).unwrap();

    let rows: Vec<i64> = df::demographic_facts
        .select(df::population)
        .load(&mut conn)
        .unwrap();
    assert_eq!(rows, vec![250]);
}

#[test]
fn totals_share_one_natural_key() {
    let (_db, mut conn) = setup_db();
    let source = sources::get_or_create_source(&mut conn, "demo_pjan", "api").unwrap();

    let total = FactRecord::Demographic {
        region: region("DE"),
        year: 2023,
        sex: "Total".to_string(),
        age_min: None,
        age_max: None,
        population: 83_000_000,
    };
    facts::upsert_facts(&mut conn, source.id, std::slice::from_ref(&total)).unwrap();
    facts::upsert_facts(&mut conn, source.id, std::slice::from_ref(&total)).unwrap();

    let rows: Vec<(i32, i32)> = df::demographic_facts
        .select((df::age_min, df::age_max))
        .load(&mut conn)
        .unwrap();
    assert_eq!(rows, vec![(AGE_ALL, AGE_ALL)]);
}

#[test]
fn region_creation_is_first_write_wins() {
    let (_db, mut conn) = setup_db();

    let first = regions::get_or_create_region(&mut conn, "DE", "Germany", Some("country"), None)
        .unwrap();
    let second =
        regions::get_or_create_region(&mut conn, "DE", "Deutschland", None, None).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Germany");
    assert_eq!(second.level.as_deref(), Some("country"));
}

#[test]
fn delete_by_source_spares_other_sources_and_snapshots() {
    let (_db, mut conn) = setup_db();
    let demo = sources::get_or_create_source(&mut conn, "demo_pjan", "api").unwrap();
    let sts = sources::get_or_create_source(&mut conn, "sts_inpr_m", "api").unwrap();

    facts::upsert_facts(
        &mut conn,
        demo.id,
        &[demo_fact("DE", 2023, "M", 100), demo_fact("FR", 2023, "M", 90)],
    )
    .unwrap();
    facts::upsert_facts(
        &mut conn,
        sts.id,
        &[industrial_fact("DE", 2023, Some(3), 104.2)],
    )
    .unwrap();

    let page = RawPage::new(
        "demo_pjan",
        0,
        indexmap::IndexMap::new(),
        br#"{"value": []}"#.to_vec(),
    );
    snapshots::archive_snapshot(&mut conn, &page).unwrap();

    let removed = facts::delete_by_source(&mut conn, "demo_pjan").unwrap();
    assert_eq!(removed, 2);

    let demo_left: i64 = df::demographic_facts.count().get_result(&mut conn).unwrap();
    let ind_left: i64 = inf::industrial_facts.count().get_result(&mut conn).unwrap();
    assert_eq!(demo_left, 0);
    assert_eq!(ind_left, 1);

    // The audit trail is never purged.
    assert_eq!(snapshots::snapshot_count(&mut conn, None).unwrap(), 1);

    // The source row survives the purge with its identity intact, so a
    // later re-ingest reuses the same surrogate id.
    let kept = sources::find_by_name(&mut conn, "demo_pjan").unwrap().unwrap();
    assert_eq!(kept.id, demo.id);
    assert_eq!(kept.last_updated, demo.last_updated);

    // Purging an already-empty source is a no-op, not an error.
    assert_eq!(facts::delete_by_source(&mut conn, "demo_pjan").unwrap(), 0);

    let err = facts::delete_by_source(&mut conn, "never_ingested").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn failing_batch_rolls_back_as_a_unit() {
    use diesel::connection::SimpleConnection;

    let (_db, mut conn) = setup_db();
    let source = sources::get_or_create_source(&mut conn, "sts_inpr_m", "api").unwrap();
    conn.batch_execute("DROP TABLE industrial_facts").unwrap();

    let batch = vec![
        demo_fact("DE", 2023, "M", 100),
        industrial_fact("DE", 2023, Some(3), 104.2),
    ];
    assert!(facts::upsert_facts(&mut conn, source.id, &batch).is_err());

    // The demographic row and the region created ahead of the failure are
    // rolled back with the rest of the batch.
    let demo_rows: i64 = df::demographic_facts.count().get_result(&mut conn).unwrap();
    assert_eq!(demo_rows, 0);
    assert!(regions::find_by_code(&mut conn, "DE").unwrap().is_none());
}

#[test]
fn queries_return_envelopes_with_decoded_sentinels() {
    let (_db, mut conn) = setup_db();
    let demo = sources::get_or_create_source(&mut conn, "demo_pjan", "api").unwrap();
    let sts = sources::get_or_create_source(&mut conn, "sts_inpr_m", "api").unwrap();

    facts::upsert_facts(
        &mut conn,
        demo.id,
        &[
            demo_fact("DE", 2022, "M", 100),
            demo_fact("DE", 2023, "M", 110),
            FactRecord::Demographic {
                region: region("FR"),
                year: 2023,
                sex: "Total".to_string(),
                age_min: None,
                age_max: None,
                population: 68_000_000,
            },
        ],
    )
    .unwrap();
    facts::upsert_facts(
        &mut conn,
        sts.id,
        &[
            industrial_fact("DE", 2023, Some(3), 104.2),
            FactRecord::Industrial {
                region: region("DE"),
                year: 2023,
                month: None,
                nace: None,
                value: 101.0,
                unit: None,
            },
        ],
    )
    .unwrap();

    let filters = FactFilters {
        region_code: Some("FR".to_string()),
        ..FactFilters::default()
    };
    let response = query::query_demographics(&mut conn, &filters).unwrap();
    assert_eq!(response.count, 1);
    assert_eq!(response.data[0].region, "FR");
    assert_eq!(response.data[0].age_min, None);
    assert_eq!(response.data[0].age_max, None);

    let filters = FactFilters {
        year_from: Some(2023),
        ..FactFilters::default()
    };
    let response = query::query_demographics(&mut conn, &filters).unwrap();
    assert_eq!(response.count, 2);

    let response = query::query_industrial(&mut conn, &FactFilters::default()).unwrap();
    assert_eq!(response.count, 2);
    // Annual, all-activities row comes back with both axes absent.
    let annual = response
        .data
        .iter()
        .find(|row| row.month.is_none())
        .unwrap();
    assert_eq!(annual.nace_code, None);
    assert_eq!(annual.value, 101.0);

    // The sentinel encoding stays inside the store.
    let raw_months: Vec<i32> = inf::industrial_facts
        .select(inf::month)
        .load(&mut conn)
        .unwrap();
    assert!(raw_months.contains(&MONTH_ANNUAL));
}

#[test]
fn statistics_summarize_both_families() {
    let (_db, mut conn) = setup_db();

    let empty = query::statistics(&mut conn, &FactFilters::default()).unwrap();
    assert_eq!(empty.total_records, 0);
    assert_eq!(empty.years_covered, None);

    let demo = sources::get_or_create_source(&mut conn, "demo_pjan", "api").unwrap();
    let sts = sources::get_or_create_source(&mut conn, "sts_inpr_m", "api").unwrap();
    facts::upsert_facts(
        &mut conn,
        demo.id,
        &[demo_fact("DE", 2019, "M", 100), demo_fact("FR", 2021, "M", 90)],
    )
    .unwrap();
    facts::upsert_facts(
        &mut conn,
        sts.id,
        &[industrial_fact("DE", 2024, Some(1), 99.5)],
    )
    .unwrap();

    let summary = query::statistics(&mut conn, &FactFilters::default()).unwrap();
    assert_eq!(summary.demographic_records, 2);
    assert_eq!(summary.industrial_records, 1);
    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.years_covered, Some((2019, 2024)));
    assert_eq!(summary.region_count, 2);

    // Filtered view narrows both the counts and the year span.
    let filters = FactFilters {
        region_code: Some("DE".to_string()),
        ..FactFilters::default()
    };
    let summary = query::statistics(&mut conn, &filters).unwrap();
    assert_eq!(summary.total_records, 2);
    assert_eq!(summary.years_covered, Some((2019, 2024)));
    assert_eq!(summary.region_count, 1);

    let filters = FactFilters {
        region_code: Some("XX".to_string()),
        ..FactFilters::default()
    };
    let summary = query::statistics(&mut conn, &filters).unwrap();
    assert_eq!(summary.total_records, 0);
    assert_eq!(summary.region_count, 0);
}

#[test]
fn queries_filter_on_sex_and_nace() {
    let (_db, mut conn) = setup_db();
    let demo = sources::get_or_create_source(&mut conn, "demo_pjan", "api").unwrap();
    let sts = sources::get_or_create_source(&mut conn, "sts_inpr_m", "api").unwrap();

    facts::upsert_facts(
        &mut conn,
        demo.id,
        &[demo_fact("DE", 2023, "M", 100), demo_fact("DE", 2023, "F", 90)],
    )
    .unwrap();
    facts::upsert_facts(
        &mut conn,
        sts.id,
        &[
            industrial_fact("DE", 2023, Some(1), 100.0),
            FactRecord::Industrial {
                region: region("DE"),
                year: 2023,
                month: Some(1),
                nace: Some("B".to_string()),
                value: 95.0,
                unit: None,
            },
        ],
    )
    .unwrap();

    let filters = FactFilters {
        sex: Some("F".to_string()),
        ..FactFilters::default()
    };
    let response = query::query_demographics(&mut conn, &filters).unwrap();
    assert_eq!(response.count, 1);
    assert_eq!(response.data[0].population, 90);

    let filters = FactFilters {
        nace: Some("B".to_string()),
        ..FactFilters::default()
    };
    let response = query::query_industrial(&mut conn, &filters).unwrap();
    assert_eq!(response.count, 1);
    assert_eq!(response.data[0].value, 95.0);
}

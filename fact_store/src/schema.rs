//! Diesel table definitions for the fact store.

diesel::table! {
    regions (id) {
        id -> Integer,
        code -> Text,
        name -> Text,
        level -> Nullable<Text>,
        parent_code -> Nullable<Text>,
    }
}

diesel::table! {
    data_sources (id) {
        id -> Integer,
        name -> Text,
        source_type -> Text,
        last_updated -> Timestamp,
    }
}

diesel::table! {
    raw_snapshots (id) {
        id -> Integer,
        dataset_id -> Text,
        page -> Integer,
        params_json -> Text,
        fetched_at -> Timestamp,
        payload -> Binary,
        content_hash -> Text,
    }
}

diesel::table! {
    demographic_facts (id) {
        id -> Integer,
        source_id -> Integer,
        region_id -> Integer,
        year -> Integer,
        sex -> Text,
        age_min -> Integer,
        age_max -> Integer,
        population -> BigInt,
    }
}

diesel::table! {
    industrial_facts (id) {
        id -> Integer,
        source_id -> Integer,
        region_id -> Integer,
        year -> Integer,
        month -> Integer,
        nace_code -> Text,
        value -> Double,
        unit -> Nullable<Text>,
    }
}

diesel::joinable!(demographic_facts -> regions (region_id));
diesel::joinable!(demographic_facts -> data_sources (source_id));
diesel::joinable!(industrial_facts -> regions (region_id));
diesel::joinable!(industrial_facts -> data_sources (source_id));

diesel::allow_tables_to_appear_in_same_query!(
    regions,
    data_sources,
    raw_snapshots,
    demographic_facts,
    industrial_facts,
);

//! Diesel schema, grounded on the teacher's `coordinator/src/db/dlc_channels.rs`
//! `table!` usage. Mirrors the persisted state layout in spec §6 exactly;
//! no live database is required to typecheck this module.

diesel::table! {
    transactions (transaction_id) {
        transaction_id -> Text,
        source_account_ref -> Text,
        amount -> Numeric,
        currency -> Text,
        value_date -> Timestamptz,
        raw_remittance_data -> Text,
        customer_identifier -> Nullable<Text>,
        associated_document_uris -> Array<Text>,
        status -> Text,
        workflow_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        processed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    invoices (id) {
        id -> Uuid,
        invoice_id -> Text,
        erp_system -> Text,
        customer_id -> Text,
        original_amount -> Numeric,
        amount_due -> Numeric,
        currency -> Text,
        status -> Text,
        due_date -> Nullable<Timestamptz>,
        erp_record_id -> Text,
        fetched_at -> Timestamptz,
    }
}

diesel::table! {
    match_results (id) {
        id -> Uuid,
        transaction_id -> Text,
        status -> Text,
        unapplied_amount -> Numeric,
        discrepancy_code -> Text,
        confidence -> Double,
        algorithm_version -> Text,
        log_entry -> Text,
        requires_human_review -> Bool,
        processing_time_ms -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    invoice_payment_matches (id) {
        id -> Uuid,
        match_result_id -> Uuid,
        invoice_id -> Text,
        external_invoice_id -> Text,
        amount_applied -> Numeric,
    }
}

diesel::table! {
    communication_events (id) {
        id -> Uuid,
        transaction_id -> Nullable<Text>,
        kind -> Text,
        recipient -> Text,
        template_name -> Text,
        payload -> Jsonb,
        delivery_status -> Text,
        error -> Nullable<Text>,
        created_at -> Timestamptz,
        sent_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    audit_log (seq) {
        seq -> Int8,
        ts -> Timestamptz,
        event_type -> Text,
        source -> Text,
        correlation_id -> Text,
        transaction_id -> Nullable<Text>,
        data -> Jsonb,
    }
}

diesel::joinable!(invoice_payment_matches -> match_results (match_result_id));
diesel::allow_tables_to_appear_in_same_query!(match_results, invoice_payment_matches);

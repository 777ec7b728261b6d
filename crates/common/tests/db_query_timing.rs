use metrics_exporter_prometheus::PrometheusBuilder;

#[test]
fn database_call_named_records_latency_and_errors() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut db = common::db::Database::open(tmp.path().to_str().unwrap()).unwrap();
        db.run_migrations().unwrap();

        // Success path should record a histogram sample.
        let v: i64 = db
            .call_named("test.ok", |conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM score_runs", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(v, 0);

        // Error path should increment errors counter and record latency with status=err.
        let err: anyhow::Result<()> = db.call_named("test.err", |conn| {
            let _ = conn.execute("SELECT * FROM definitely_missing_table", [])?;
            Ok(())
        });
        assert!(err.is_err());
    });

    let rendered = handle.render();
    assert!(
        rendered.contains("scorer_db_query_latency_ms"),
        "expected scorer_db_query_latency_ms in rendered metrics, got:\n{rendered}"
    );
    assert!(
        rendered.contains("scorer_db_query_errors_total"),
        "expected scorer_db_query_errors_total in rendered metrics, got:\n{rendered}"
    );
}

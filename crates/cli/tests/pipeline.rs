use phishing_core::pipeline;
use phishing_core::features::FEATURE_COLUMNS;
use phishing_core::FeatureVector;
use storage::models::{NewUrl, SourceMetadata};

async fn seeded_pool() -> sqlx::SqlitePool {
    let pool = storage::connect("sqlite::memory:").await.unwrap();
    storage::migrate(&pool).await.unwrap();

    let list = "\
# mixed sample
https://www.test.com
http://192.168.0.1/login
http://localhost/admin
http://secure-login.paypa1.com/verify
";
    let mut rows = phishing_cli::import::parse_url_list(list, false);
    rows.push(NewUrl {
        url: "https://.com/".to_string(),
        is_phishing: true,
    });
    let metadata = SourceMetadata {
        name: "sample".to_string(),
        url: "file://sample.txt".to_string(),
    };
    storage::load_dataset(&pool, &metadata, &rows).await.unwrap();
    pool
}

#[tokio::test]
async fn build_features_isolates_bad_rows() {
    let pool = seeded_pool().await;

    let report = pipeline::run_build_features(&pool).await.unwrap();
    assert_eq!(report.processed, 5);
    assert_eq!(report.failed, 2);

    let rows = storage::fetch_urls(&pool).await.unwrap();
    let by_url = |u: &str| rows.iter().find(|r| r.url == u).unwrap();
    assert!(by_url("http://localhost/admin").features.is_none());
    assert!(by_url("https://.com/").features.is_none());

    let stored: FeatureVector =
        serde_json::from_str(by_url("https://www.test.com").features.as_deref().unwrap()).unwrap();
    assert_eq!(stored, phishing_core::extract_feature("https://www.test.com").unwrap());

    let ip: serde_json::Value =
        serde_json::from_str(by_url("http://192.168.0.1/login").features.as_deref().unwrap())
            .unwrap();
    assert_eq!(ip["is_ip"], 1);
    assert!(ip["tld"].is_null());
}

#[tokio::test]
async fn export_writes_every_row_with_nulls_for_failures() {
    let pool = seeded_pool().await;
    pipeline::run_build_features(&pool).await.unwrap();

    let mut out = Vec::new();
    let written = pipeline::export_dataset(&pool, &mut out).await.unwrap();
    assert_eq!(written, 5);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0]["url"], "https://www.test.com");
    assert_eq!(lines[0]["is_phishing"], 0);
    assert_eq!(lines[0]["tld"], "com");
    assert_eq!(lines[3]["domain"], "secure-login.paypa1.com");
    assert_eq!(lines[3]["no_of_digits"], 1);

    for (i, url, label) in [(2, "http://localhost/admin", 0), (4, "https://.com/", 1)] {
        let row = lines[i].as_object().unwrap();
        assert_eq!(row["url"], url);
        assert_eq!(row["is_phishing"], label);
        assert_eq!(row.len(), 2 + FEATURE_COLUMNS.len());
        for column in FEATURE_COLUMNS {
            assert!(row[column].is_null(), "{url}: {column} should be null");
        }
    }
}

#[tokio::test]
async fn failed_write_back_leaves_no_partial_features() {
    let pool = seeded_pool().await;
    sqlx::query(
        "CREATE TRIGGER reject_localhost BEFORE UPDATE ON url \
         WHEN NEW.url = 'http://localhost/admin' \
         BEGIN SELECT RAISE(ABORT, 'rejected'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    assert!(pipeline::run_build_features(&pool).await.is_err());

    let rows = storage::fetch_urls(&pool).await.unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.features.is_none()));
}

#[tokio::test]
async fn rebuilding_is_idempotent() {
    let pool = seeded_pool().await;
    pipeline::run_build_features(&pool).await.unwrap();
    let first: Vec<Option<String>> = storage::fetch_urls(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.features)
        .collect();

    pipeline::run_build_features(&pool).await.unwrap();
    let second: Vec<Option<String>> = storage::fetch_urls(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.features)
        .collect();
    assert_eq!(first, second);
}

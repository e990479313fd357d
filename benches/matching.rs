//! Benchmarks for request matching and cassette round-trips

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use indexmap::IndexMap;
use tempfile::TempDir;

use playback::cassette::{Cassette, Record};
use playback::mock::{Exchange, MockRequest, MockResponse};

fn sample_request(uri: &str) -> MockRequest {
    let mut headers = IndexMap::new();
    headers.insert("host".to_string(), "api.example.com".to_string());
    headers.insert("accept".to_string(), "application/json".to_string());
    headers.insert("user-agent".to_string(), "bench/1.0".to_string());

    MockRequest {
        method: "GET".to_string(),
        uri: uri.to_string(),
        content: None,
        headers: Some(headers),
        cookies: None,
    }
}

fn sample_exchange(uri: &str) -> Exchange {
    let mut response = MockResponse {
        status_code: 200,
        status_description: "OK".to_string(),
        ..MockResponse::default()
    };
    response.set_content("{\"status\":\"ok\",\"items\":[1,2,3]}".to_string());
    Exchange::new(sample_request(uri), response)
}

fn bench_request_matching(c: &mut Criterion) {
    let recorded = sample_request("https://api.example.com/users/u1");
    let live = sample_request("https://api.example.com/users/u1");
    let other = sample_request("https://api.example.com/users/u2");

    c.bench_function("request_match_hit", |b| {
        b.iter(|| black_box(recorded.matches(black_box(&live))));
    });

    c.bench_function("request_match_miss", |b| {
        b.iter(|| black_box(recorded.matches(black_box(&other))));
    });
}

fn bench_cassette_save(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();

    let mut record = Record::new("bench");
    for i in 0..50 {
        record.write(sample_exchange(&format!("https://api.example.com/items/{i}")));
    }

    c.bench_function("cassette_save_50_exchanges", |b| {
        b.iter(|| {
            let mut cassette = Cassette::new(temp_dir.path().join("bench.json")).unwrap();
            cassette.save(black_box(&record)).unwrap();
        });
    });
}

fn bench_cassette_load(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bench.json");

    let mut record = Record::new("bench");
    for i in 0..50 {
        record.write(sample_exchange(&format!("https://api.example.com/items/{i}")));
    }
    Cassette::new(&path).unwrap().save(&record).unwrap();

    c.bench_function("cassette_load_50_exchanges", |b| {
        b.iter(|| {
            let cassette = Cassette::new(black_box(&path)).unwrap();
            black_box(cassette.find("bench"))
        });
    });
}

criterion_group!(
    benches,
    bench_request_matching,
    bench_cassette_save,
    bench_cassette_load
);
criterion_main!(benches);

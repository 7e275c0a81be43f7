use std::fs::{self, File};
use std::path::{Path, PathBuf};

use dashboard_loader::conglomerate::{MergeOptions, MergeStrategy, build_report};
use dashboard_loader::dashboard::{BasicClient, Dashboard, Endpoint};
use dashboard_loader::error::LoaderError;
use dashboard_loader::metro_areas::MetroAreaRecord;
use dashboard_loader::ntd::{self, NtdTables};
use dashboard_loader::regions::RegionTable;
use dashboard_loader::{feeds, membership, output};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_merge_fixture_uzas() {
    let extraction = membership::extract_from_path(&fixture("Agency_UZAs.csv"), None).unwrap();
    assert!(extraction.warnings.is_empty());
    assert_eq!(extraction.membership.len(), 7);

    let report = build_report(&extraction.membership, &MergeOptions::default()).unwrap();
    let names: Vec<&str> = report.names().collect();

    assert_eq!(
        names,
        vec![
            "Boston-Providence-Worcester, MA-NH-RI-CT",
            "New York-Newark-Bridgeport-Stamford, NY-NJ-CT",
            "Dallas-Fort Worth-Arlington-Denton-Lewisville, TX",
        ]
    );
    assert_eq!(report.candidates, 5);
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(
        &report.warnings[0],
        LoaderError::GroupDropped { members, .. }
            if members == &vec!["Springfield".to_string(), "Chicopee, MA".to_string()]
    ));
}

#[test]
fn test_strategies_agree_on_fixture() {
    let extraction = membership::extract_from_path(&fixture("Agency_UZAs.csv"), None).unwrap();

    let union_find = build_report(&extraction.membership, &MergeOptions::default()).unwrap();
    let pairwise = build_report(
        &extraction.membership,
        &MergeOptions {
            strategy: MergeStrategy::Pairwise,
            ..Default::default()
        },
    )
    .unwrap();

    let mut a: Vec<Vec<&String>> = union_find
        .conglomerates
        .iter()
        .map(|c| {
            let mut members: Vec<&String> = c.members.iter().collect();
            members.sort();
            members
        })
        .collect();
    let mut b: Vec<Vec<&String>> = pairwise
        .conglomerates
        .iter()
        .map(|c| {
            let mut members: Vec<&String> = c.members.iter().collect();
            members.sort();
            members
        })
        .collect();
    a.sort();
    b.sort();

    assert_eq!(a, b);
    assert_eq!(union_find.warnings.len(), pairwise.warnings.len());
}

#[test]
fn test_known_agencies_filter_uza_rows() {
    let mut warnings = Vec::new();
    let known = ntd::load_agency_ids(&fixture("Agency_Information.csv"), &mut warnings).unwrap();
    assert!(warnings.is_empty());

    let extraction =
        membership::extract_from_path(&fixture("Agency_UZAs.csv"), Some(&known)).unwrap();

    assert_eq!(extraction.membership.len(), 6);
    assert!(matches!(
        extraction.warnings.as_slice(),
        [LoaderError::UnknownReference { agency_id, .. }] if agency_id == "0099"
    ));
}

#[test]
fn test_report_text_and_csv() {
    let extraction = membership::extract_from_path(&fixture("Agency_UZAs.csv"), None).unwrap();
    let report = build_report(&extraction.membership, &MergeOptions::default()).unwrap();

    let mut text = Vec::new();
    output::write_report(&mut text, &report).unwrap();
    let text = String::from_utf8(text).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "Conglomerate Metro Areas: 3");
    assert_eq!(lines[1], "Boston-Providence-Worcester, MA-NH-RI-CT");
    assert_eq!(lines[4], "Skipped 1 input(s):");
    assert!(lines[5].contains("Springfield; Chicopee, MA"), "{}", lines[5]);

    let csv_path = std::env::temp_dir().join("dashboard_loader_integration_conglomerates.csv");
    let _ = fs::remove_file(&csv_path);
    output::append_records(&csv_path, &report.conglomerates).unwrap();
    output::append_records(&csv_path, &report.conglomerates).unwrap();

    let written = fs::read_to_string(&csv_path).unwrap();
    let header_count = written
        .lines()
        .filter(|l| l.starts_with("name,members,member_count"))
        .count();
    assert_eq!(header_count, 1);
    assert_eq!(written.lines().count(), 7);
    fs::remove_file(csv_path).unwrap();
}

#[test]
fn test_load_ntd_fixture() {
    let agencies = fixture("Agency_Information.csv");
    let service = fixture("Service.csv");
    let uzas = fixture("Agency_UZAs.csv");

    let load = ntd::load(&NtdTables {
        agency_information: &agencies,
        service: &service,
        agency_uzas: &uzas,
    })
    .unwrap();

    assert_eq!(load.agencies.len(), 7);

    let mbta = &load.agencies["0001"];
    assert_eq!(mbta.population, 3_095_000);
    assert_eq!(mbta.ridership, Some(262_000_000));
    assert_eq!(mbta.passenger_miles, Some(900_000_000));
    assert_eq!(mbta.uza_names.len(), 2);

    let ripta = &load.agencies["0002"];
    assert_eq!(ripta.ridership, Some(19_000_000));
    assert_eq!(ripta.passenger_miles, None);

    let rural = &load.agencies["0004"];
    assert_eq!(rural.population, 0);
    assert!(rural.uza_names.is_empty());

    // empty population, empty miles, unknown service id, unknown UZA id
    assert_eq!(load.warnings.len(), 4);
}

#[test]
fn test_load_feed_fixture() {
    let regions = RegionTable::load(&fixture("regions.json")).unwrap();
    let file = File::open(fixture("feeds.json")).unwrap();
    let load = feeds::load(file, &regions, feeds::default_generated_at()).unwrap();

    assert_eq!(load.feeds.len(), 2);

    let capmetro = &load.feeds[0];
    assert_eq!(capmetro.country.as_deref(), Some("us"));
    assert_eq!(capmetro.state.as_deref(), Some("tx"));
    assert_eq!(capmetro.date_added.as_deref(), Some("2009-01-01T00:00:00Z"));
    assert_eq!(capmetro.expiration_date.as_deref(), Some("2012-07-25T12:00:00Z"));
    assert_eq!(capmetro.license_url, None);

    let go = &load.feeds[1];
    assert_eq!(go.country.as_deref(), Some("ca"));
    assert_eq!(go.state.as_deref(), Some("on"));
    assert_eq!(go.expiration_date.as_deref(), Some("2012-07-20T12:00:00Z"));

    let missing = load
        .warnings
        .iter()
        .filter(|w| matches!(w, LoaderError::MissingField { record, .. } if record == "agency GO Transit"))
        .count();
    assert_eq!(missing, 9);
    assert_eq!(load.warnings.len(), 9);
}

#[tokio::test]
async fn test_dry_run_publishes_nothing() {
    let extraction = membership::extract_from_path(&fixture("Agency_UZAs.csv"), None).unwrap();
    let report = build_report(&extraction.membership, &MergeOptions::default()).unwrap();
    let records: Vec<MetroAreaRecord> = report.conglomerates.iter().map(MetroAreaRecord::from).collect();

    let dashboard = Dashboard::new(BasicClient::new().unwrap(), "http://127.0.0.1:9")
        .unwrap()
        .with_dry_run(true);
    let summary = dashboard.publish(Endpoint::MetroAreas, &records).await.unwrap();

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.dry_run, 3);
    assert_eq!(summary.created, 0);
    assert_eq!(summary.rejected, 0);
    assert!(summary.warnings.is_empty());
}
